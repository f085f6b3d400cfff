//! The scoring oracle seam and score conventions.
//!
//! Scores are centipawns from the perspective of the side to move in the
//! position they were computed for. A forced mate in `k` is encoded as
//! `±(MATE_SCORE - k)` so it always dominates any material score.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::ReviewError;

/// Saturation point of the mate encoding.
pub const MATE_SCORE: i32 = 10_000;

/// Result of a single position evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalResult {
    /// Centipawn or mate-encoded score, side to move's perspective
    pub score: i32,
    /// Best move in UCI notation, absent when the side to move has no legal move
    pub best_move: Option<String>,
}

/// An external evaluator reachable through a request/response channel.
///
/// Implementations are stateful and serve one request at a time; the pool
/// guarantees a single caller per instance.
pub trait ScoringOracle: Send + 'static {
    fn evaluate(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> impl Future<Output = Result<i32, ReviewError>> + Send;

    fn evaluate_with_best_move(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> impl Future<Output = Result<EvalResult, ReviewError>> + Send;

    /// Best-effort teardown; never fails.
    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}

/// Convert a UCI `mate k` report into the saturating score.
///
/// `k > 0` means the side to move mates; `k <= 0` means it is being mated
/// (`mate 0` is reported for a position that is already checkmate).
pub fn mate_score(moves_to_mate: i32) -> i32 {
    if moves_to_mate > 0 {
        MATE_SCORE - moves_to_mate
    } else {
        -MATE_SCORE - moves_to_mate
    }
}

/// Is White to move in this FEN?
pub fn white_to_move(fen: &str) -> bool {
    fen.split_whitespace().nth(1) == Some("w")
}

/// Re-sign a side-to-move score so that positive is good for White.
pub fn white_perspective(fen: &str, score: i32) -> i32 {
    if white_to_move(fen) {
        score
    } else {
        -score
    }
}
