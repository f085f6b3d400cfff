//! Chess game review: engine pool, parallel evaluation, move classification.

pub mod analysis;
pub mod analyzer;
pub mod board_utils;
pub mod book_cache;
pub mod config;
pub mod engine_pool;
pub mod error;
pub mod evaluator;
pub mod oracle;
pub mod stockfish;
pub mod timeline;

pub use analyzer::{analyze_game, GameReport, MoveReview};
pub use book_cache::OpeningBook;
pub use config::ReviewConfig;
pub use engine_pool::{EnginePool, FaultPolicy, PoolOptions, WorkerLease, WorkerState};
pub use error::ReviewError;
pub use oracle::{EvalResult, ScoringOracle};
pub use stockfish::{EngineOptions, StockfishEngine};
