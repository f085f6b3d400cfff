//! In-memory opening book.
//!
//! The book is a set of normalized positions compiled from the opening TSV
//! files (`eco`, `name`, `pgn` columns). Compiling replays every line, so the
//! result can be cached as a bincode file for the next start.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ReviewError;
use crate::timeline::GameTimeline;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpeningBook {
    positions: HashSet<String>,
}

impl OpeningBook {
    pub fn from_positions<I, S>(fens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            positions: fens.into_iter().map(|f| normalize_fen(f.as_ref())).collect(),
        }
    }

    /// Compile every `*.tsv` file in `dir`.
    pub fn from_tsv_dir<P: AsRef<Path>>(dir: P) -> Result<Self, ReviewError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ReviewError::Config(format!(
                "openings directory not found: {}",
                dir.display()
            )));
        }

        let pattern = dir.join("*.tsv");
        let files: Vec<_> = glob::glob(&pattern.to_string_lossy())
            .map_err(|e| ReviewError::Config(format!("bad openings pattern: {e}")))?
            .filter_map(Result::ok)
            .collect();
        info!(count = files.len(), "Found opening TSV files");

        let mut book = Self::default();
        for path in files {
            let text = std::fs::read_to_string(&path)?;
            let lines = book.add_tsv(&text);
            debug!(file = %path.display(), lines, "Loaded opening file");
        }
        Ok(book)
    }

    /// Add the lines of one TSV file; returns how many lines were replayed.
    pub fn add_tsv(&mut self, text: &str) -> usize {
        let mut added = 0;
        // First row is the header
        for (row, line) in text.lines().enumerate().skip(1) {
            let Some(sequence) = line.split('\t').nth(2) else {
                continue;
            };
            let sans = chess_core::pgn::extract_san_moves(sequence.trim());
            match GameTimeline::replay(&sans) {
                Ok(timeline) => {
                    self.positions
                        .extend(timeline.positions.iter().map(|f| normalize_fen(f)));
                    added += 1;
                }
                Err(e) => debug!(row, error = %e, "Skipping unplayable opening line"),
            }
        }
        added
    }

    /// Load the compiled book from `cache` if present, otherwise compile
    /// `dir` and try to write the cache.
    ///
    /// Never fails: without opening data the book is empty and no move is
    /// ever classified as theory.
    pub fn load<P: AsRef<Path>>(dir: P, cache: Option<&Path>) -> Self {
        if let Some(cache) = cache {
            match read_cache(cache) {
                Ok(book) => {
                    info!(positions = book.len(), path = %cache.display(), "Loaded opening book cache");
                    return book;
                }
                Err(e) => debug!(error = %e, "No usable opening book cache"),
            }
        }

        let book = match Self::from_tsv_dir(dir) {
            Ok(book) => book,
            Err(e) => {
                warn!(error = %e, "Failed to load opening book");
                warn!("Book move detection will be disabled");
                return Self::default();
            }
        };
        info!(positions = book.len(), "Compiled opening book");

        if let Some(cache) = cache {
            if let Err(e) = write_cache(&book, cache) {
                warn!(error = %e, path = %cache.display(), "Failed to write opening book cache");
            }
        }
        book
    }

    pub fn is_book_position(&self, fen: &str) -> bool {
        self.positions.contains(&normalize_fen(fen))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn read_cache(path: &Path) -> Result<OpeningBook, ReviewError> {
    let reader = BufReader::new(File::open(path)?);
    bincode::deserialize_from(reader).map_err(|e| ReviewError::Analysis(e.to_string()))
}

fn write_cache(book: &OpeningBook, path: &Path) -> Result<(), ReviewError> {
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, book).map_err(|e| ReviewError::Analysis(e.to_string()))
}

/// Strips move counters from FEN, keeping only position + side + castling + ep.
pub fn normalize_fen(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}
