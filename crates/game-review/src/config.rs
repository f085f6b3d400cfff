//! Review configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::info;

use crate::engine_pool::{default_pool_size, FaultPolicy, PoolOptions};
use crate::error::ReviewError;
use crate::stockfish::EngineOptions;

#[derive(Clone, Debug)]
pub struct ReviewConfig {
    /// Path to Stockfish binary
    pub stockfish_path: String,

    /// Search depth for full-game analysis
    pub analysis_depth: u32,

    /// Search depth for single-position queries
    pub interactive_depth: u32,

    /// Number of engine workers
    pub pool_size: usize,

    pub engine: EngineOptions,

    /// Per-request limit; unset means requests may wait forever
    pub request_timeout: Option<Duration>,

    pub fault_policy: FaultPolicy,

    /// Directory holding the opening `*.tsv` files
    pub openings_dir: PathBuf,

    /// Compiled opening book cache
    pub book_cache: Option<PathBuf>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            stockfish_path: "stockfish".to_string(),
            analysis_depth: 14,
            interactive_depth: 10,
            pool_size: default_pool_size(),
            engine: EngineOptions::default(),
            request_timeout: None,
            fault_policy: FaultPolicy::default(),
            openings_dir: PathBuf::from("data/openings"),
            book_cache: None,
        }
    }
}

impl ReviewConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ReviewError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unparseable numbers fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ReviewError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let stockfish_path = lookup("STOCKFISH_PATH").unwrap_or(defaults.stockfish_path);

        let analysis_depth =
            parse_number::<u32, _>(&lookup, "ANALYSIS_DEPTH").unwrap_or(defaults.analysis_depth);

        let interactive_depth = parse_number::<u32, _>(&lookup, "INTERACTIVE_DEPTH")
            .unwrap_or(defaults.interactive_depth);

        let pool_size = parse_number::<usize, _>(&lookup, "ENGINE_POOL_SIZE")
            .filter(|&n| n > 0)
            .unwrap_or(defaults.pool_size);

        let hash_mb =
            parse_number::<u32, _>(&lookup, "ENGINE_HASH_MB").unwrap_or(defaults.engine.hash_mb);

        let request_timeout =
            parse_number::<u64, _>(&lookup, "ENGINE_TIMEOUT_MS").map(Duration::from_millis);

        let fault_policy = match lookup("ENGINE_FAULT_POLICY") {
            Some(v) => v.parse()?,
            None => defaults.fault_policy,
        };

        let openings_dir = lookup("OPENINGS_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.openings_dir);

        let book_cache = lookup("OPENING_BOOK_CACHE").map(PathBuf::from);

        let config = Self {
            stockfish_path,
            analysis_depth,
            interactive_depth,
            pool_size,
            engine: EngineOptions {
                threads: 1,
                hash_mb,
            },
            request_timeout,
            fault_policy,
            openings_dir,
            book_cache,
        };

        info!(
            pool_size = config.pool_size,
            analysis_depth = config.analysis_depth,
            fault_policy = ?config.fault_policy,
            "Configuration loaded"
        );
        Ok(config)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            request_timeout: self.request_timeout,
            fault_policy: self.fault_policy,
        }
    }
}

/// `None` when unset, unparseable, or out of range for `T`.
fn parse_number<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
