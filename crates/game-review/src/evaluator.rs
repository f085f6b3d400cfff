//! Parallel position scoring across the engine pool.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::engine_pool::EnginePool;
use crate::error::ReviewError;
use crate::oracle::{white_perspective, EvalResult, ScoringOracle};

/// Score every position, White-positive, in input order.
///
/// One task per position is spawned up front; the pool's checkout bounds how
/// many run at once. A position whose request fails scores 0 and its
/// siblings are unaffected.
pub async fn evaluate_all<E: ScoringOracle>(
    pool: &Arc<EnginePool<E>>,
    fens: &[String],
    depth: u32,
) -> Vec<i32> {
    let tasks: Vec<_> = fens
        .iter()
        .cloned()
        .enumerate()
        .map(|(index, fen)| {
            let pool = Arc::clone(pool);
            tokio::spawn(async move {
                match score_position(&pool, &fen, depth).await {
                    Ok(score) => score,
                    Err(e) => {
                        warn!(index, error = %e, "Position evaluation failed, scoring 0");
                        0
                    }
                }
            })
        })
        .collect();

    let scores: Vec<i32> = join_all(tasks)
        .await
        .into_iter()
        .enumerate()
        .map(|(index, joined)| {
            joined.unwrap_or_else(|e| {
                warn!(index, error = %e, "Evaluation task aborted, scoring 0");
                0
            })
        })
        .collect();

    debug!(positions = scores.len(), "Batch evaluation complete");
    scores
}

async fn score_position<E: ScoringOracle>(
    pool: &Arc<EnginePool<E>>,
    fen: &str,
    depth: u32,
) -> Result<i32, ReviewError> {
    let mut lease = pool.checkout().await?;
    let score = lease.evaluate(fen, depth).await?;
    Ok(white_perspective(fen, score))
}

/// Normalized score of a single position.
pub async fn evaluate_position<E: ScoringOracle>(
    pool: &Arc<EnginePool<E>>,
    fen: &str,
    depth: u32,
) -> Result<i32, ReviewError> {
    score_position(pool, fen, depth).await
}

/// Normalized score plus the engine's preferred move.
pub async fn best_move<E: ScoringOracle>(
    pool: &Arc<EnginePool<E>>,
    fen: &str,
    depth: u32,
) -> Result<EvalResult, ReviewError> {
    let mut lease = pool.checkout().await?;
    let result = lease.evaluate_with_best_move(fen, depth).await?;
    Ok(EvalResult {
        score: white_perspective(fen, result.score),
        best_move: result.best_move,
    })
}
