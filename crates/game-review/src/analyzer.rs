//! Core game review logic
//!
//! Scores every position of the game in parallel, then walks the moves in
//! order to label each one. The walk is sequential: punishment detection
//! looks at the previous move's loss, and leaving the book is permanent.

use std::sync::Arc;

use chess::Color;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::{self, MoveClassification};
use crate::board_utils::material_swing;
use crate::book_cache::OpeningBook;
use crate::engine_pool::EnginePool;
use crate::error::ReviewError;
use crate::evaluator::evaluate_all;
use crate::oracle::ScoringOracle;
use crate::timeline::GameTimeline;

/// Review of a single move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveReview {
    /// SAN as it appeared in the game
    #[serde(rename = "move")]
    pub move_san: String,
    pub centipawn_loss: i32,
    /// White-positive score after the move
    pub evaluation: i32,
    pub classification: MoveClassification,
    /// Position after the move
    pub fen: String,
    /// Engine's choice from the position before the move, UCI
    pub best_move: Option<String>,
    pub clock_time: Option<String>,
}

/// Full game review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameReport {
    pub accuracy: f64,
    pub moves: Vec<MoveReview>,
    pub white_player: String,
    pub black_player: String,
    pub white_elo: String,
    pub black_elo: String,
    pub time_control: String,
}

/// Review a PGN game record.
pub async fn analyze_game<E: ScoringOracle>(
    pool: &Arc<EnginePool<E>>,
    book: &OpeningBook,
    pgn: &str,
    depth: u32,
) -> Result<GameReport, ReviewError> {
    let game = chess_core::parse_pgn(pgn)?;
    let timeline = GameTimeline::replay(&game.moves)?;
    info!(
        white = %game.metadata.white,
        black = %game.metadata.black,
        move_count = timeline.len(),
        "Starting analysis"
    );

    let scores = evaluate_all(pool, &timeline.positions, depth).await;
    let moves = review_moves(pool, book, &timeline, &scores, &game.clocks, depth).await;

    let total_cp_loss: i64 = moves.iter().map(|m| m.centipawn_loss as i64).sum();
    let accuracy = analysis::calculate_accuracy(total_cp_loss, moves.len());
    info!(accuracy, "Analysis complete");

    let meta = game.metadata;
    Ok(GameReport {
        accuracy,
        moves,
        white_player: meta.white,
        black_player: meta.black,
        white_elo: meta.white_elo,
        black_elo: meta.black_elo,
        time_control: meta.time_control,
    })
}

/// Label every move of `timeline` from its White-positive `scores`.
///
/// `scores` has one entry per position. Moves short of the engine's choice
/// get a best-move lookup against the position before the move; a failed
/// lookup just leaves the suggestion empty.
pub async fn review_moves<E: ScoringOracle>(
    pool: &Arc<EnginePool<E>>,
    book: &OpeningBook,
    timeline: &GameTimeline,
    scores: &[i32],
    clocks: &[String],
    depth: u32,
) -> Vec<MoveReview> {
    let mut reviews = Vec::with_capacity(timeline.len());
    let mut in_book = true;
    let mut prev_cp_loss: Option<i32> = None;

    for (i, played) in timeline.moves.iter().enumerate() {
        let is_white = played.mover == Color::White;
        let eval_before = scores.get(i).copied().unwrap_or(0);
        let eval_after = scores.get(i + 1).copied().unwrap_or(0);
        let raw_cp_loss = analysis::calculate_cp_loss(eval_before, eval_after, is_white);

        let fen_after = &timeline.positions[i + 1];
        let swing = material_swing(&timeline.boards[i], &timeline.boards[i + 1], played.mover);
        let is_sacrifice = analysis::is_sacrifice(swing);
        let is_punishment = analysis::is_punishment(prev_cp_loss, raw_cp_loss);

        let (classification, cp_loss) = if in_book && book.is_book_position(fen_after) {
            (MoveClassification::Book, 0)
        } else {
            in_book = false;
            (
                analysis::classify_move(raw_cp_loss, is_sacrifice, is_punishment),
                raw_cp_loss,
            )
        };

        let best_move = if classification.wants_best_move() {
            lookup_best_move(pool, &timeline.positions[i], depth).await
        } else {
            None
        };

        debug!(
            ply = i + 1,
            san = %played.san,
            cp_loss,
            swing,
            classification = %classification,
            "Move reviewed"
        );

        reviews.push(MoveReview {
            move_san: played.san.clone(),
            centipawn_loss: cp_loss,
            evaluation: eval_after,
            classification,
            fen: fen_after.clone(),
            best_move,
            clock_time: clocks.get(i).cloned(),
        });
        prev_cp_loss = Some(raw_cp_loss);
    }

    reviews
}

async fn lookup_best_move<E: ScoringOracle>(
    pool: &Arc<EnginePool<E>>,
    fen: &str,
    depth: u32,
) -> Option<String> {
    let mut lease = pool.checkout().await.ok()?;
    match lease.evaluate_with_best_move(fen, depth).await {
        Ok(result) => result.best_move,
        Err(e) => {
            debug!(error = %e, "Best move lookup failed");
            None
        }
    }
}
