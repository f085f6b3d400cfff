//! PGN parsing utilities: a lightweight regex-based parser.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::game_data::{GameData, GameMetadata};

const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Shown when the record has no TimeControl header.
const DEFAULT_TIME_CONTROL: &str = "10:00";

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).expect("header pattern"));
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("tag pattern"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^}]*\}").expect("comment pattern"));
static LINE_COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";[^\n]*").expect("line comment pattern"));
static MOVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[KQRBN]?[a-h]?[1-8]?x?[a-h][1-8](?:=[QRBN])?[+#]?|O-O-O|O-O")
        .expect("move pattern")
});
static CLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[%clk\s+([\d:.]+)\]").expect("clock pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PgnError {
    #[error("empty game record")]
    Empty,

    #[error("non-standard start position: {0}")]
    NonStandardStart(String),
}

/// Parse a PGN string into a GameData struct.
///
/// A record with headers but no moves is valid and yields an empty move list.
pub fn parse_pgn(pgn: &str) -> Result<GameData, PgnError> {
    if pgn.trim().is_empty() {
        return Err(PgnError::Empty);
    }

    let mut white = "White".to_string();
    let mut black = "Black".to_string();
    let mut white_elo = "?".to_string();
    let mut black_elo = "?".to_string();
    let mut time_control = DEFAULT_TIME_CONTROL.to_string();
    let mut result = "*".to_string();
    let mut date = None;
    let mut event = None;
    let mut setup = None;
    let mut fen = None;

    for cap in HEADER_RE.captures_iter(pgn) {
        let key = &cap[1];
        let value = cap[2].to_string();
        match key {
            "White" => white = value,
            "Black" => black = value,
            "WhiteElo" if is_numeric(&value) => white_elo = value,
            "BlackElo" if is_numeric(&value) => black_elo = value,
            "TimeControl" if !value.is_empty() && value != "-" => time_control = value,
            "Result" => result = value,
            "Date" => date = Some(value),
            "Event" => event = Some(value),
            "SetUp" => setup = Some(value),
            "FEN" => fen = Some(value),
            _ => {}
        }
    }

    // Replay always starts from the initial position
    if setup.as_deref() == Some("1") {
        if let Some(f) = fen {
            if f != STANDARD_START_FEN {
                return Err(PgnError::NonStandardStart(f));
            }
        }
    }

    let metadata = GameMetadata {
        white,
        black,
        white_elo,
        black_elo,
        time_control,
        result,
        date,
        event,
    };

    Ok(GameData {
        metadata,
        moves: extract_san_moves(pgn),
        clocks: extract_clock_times(pgn),
    })
}

/// Extract SAN moves from PGN text (after removing headers, comments, variations).
///
/// Brace comments go first so a `;` or paren inside one is never read as
/// markup.
pub fn extract_san_moves(pgn: &str) -> Vec<String> {
    let no_headers = TAG_RE.replace_all(pgn, "");
    let no_comments = COMMENT_RE.replace_all(&no_headers, "");
    let no_line_comments = LINE_COMMENT_RE.replace_all(&no_comments, "");
    let main_line = strip_variations(&no_line_comments);

    MOVE_RE
        .find_iter(&main_line)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Drop every parenthesized variation, nested ones included.
///
/// An unclosed `(` swallows the rest of the text.
fn strip_variations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                // Keep moves on either side apart
                if depth == 0 {
                    out.push(' ');
                }
                depth += 1;
            }
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Extract `[%clk ...]` annotations in ply order.
///
/// A leading zero hour is dropped so "0:04:57" reads as "04:57".
pub fn extract_clock_times(pgn: &str) -> Vec<String> {
    CLOCK_RE
        .captures_iter(pgn)
        .map(|cap| {
            let raw = &cap[1];
            let trimmed = raw
                .strip_prefix("0:")
                .or_else(|| raw.strip_prefix("00:"))
                .unwrap_or(raw);
            trimmed.to_string()
        })
        .collect()
}

fn is_numeric(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}
