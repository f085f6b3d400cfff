//! Move analysis and classification, pure functions only
//! (No Board/Engine dependencies)

use serde::{Deserialize, Serialize};

/// Classification thresholds (centipawn loss, inclusive)
const THRESHOLD_EXCELLENT: i32 = 15;
const THRESHOLD_GOOD: i32 = 30;
const THRESHOLD_INACCURACY: i32 = 60;
const THRESHOLD_MISTAKE: i32 = 120;
const THRESHOLD_MISS: i32 = 250;

/// Net material the mover must give up for a move to count as a sacrifice
const SACRIFICE_SWING: i32 = -2;

/// Loss on the previous move that makes the reply a punishment chance
const PUNISHABLE_CP_LOSS: i32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveClassification {
    Book,
    Brilliant,
    Great,
    Best,
    Excellent,
    Good,
    Inaccuracy,
    Mistake,
    Miss,
    Blunder,
}

impl MoveClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveClassification::Book => "Book",
            MoveClassification::Brilliant => "Brilliant",
            MoveClassification::Great => "Great",
            MoveClassification::Best => "Best",
            MoveClassification::Excellent => "Excellent",
            MoveClassification::Good => "Good",
            MoveClassification::Inaccuracy => "Inaccuracy",
            MoveClassification::Mistake => "Mistake",
            MoveClassification::Miss => "Miss",
            MoveClassification::Blunder => "Blunder",
        }
    }

    /// Moves short of the engine's choice get a best-move suggestion.
    pub fn wants_best_move(&self) -> bool {
        matches!(
            self,
            MoveClassification::Excellent
                | MoveClassification::Good
                | MoveClassification::Inaccuracy
                | MoveClassification::Mistake
                | MoveClassification::Miss
                | MoveClassification::Blunder
        )
    }
}

impl std::fmt::Display for MoveClassification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Centipawn loss from the mover's perspective, floored at 0.
///
/// Both evals are White-positive.
pub fn calculate_cp_loss(eval_before: i32, eval_after: i32, is_white: bool) -> i32 {
    let cp_loss = if is_white {
        eval_before - eval_after
    } else {
        eval_after - eval_before
    };
    cp_loss.max(0)
}

/// `swing` is the mover's net material change after the worst immediate recapture.
pub fn is_sacrifice(swing: i32) -> bool {
    swing <= SACRIFICE_SWING
}

/// The opponent just lost a lot and this move is (near-)optimal.
pub fn is_punishment(prev_cp_loss: Option<i32>, cp_loss: i32) -> bool {
    matches!(prev_cp_loss, Some(prev) if prev >= PUNISHABLE_CP_LOSS)
        && cp_loss <= THRESHOLD_EXCELLENT
}

pub fn classify_move(cp_loss: i32, is_sacrifice: bool, is_punishment: bool) -> MoveClassification {
    if is_sacrifice {
        if cp_loss <= THRESHOLD_EXCELLENT {
            return MoveClassification::Brilliant;
        }
        if cp_loss <= THRESHOLD_GOOD {
            return MoveClassification::Great;
        }
    }
    if is_punishment && cp_loss <= THRESHOLD_EXCELLENT {
        return MoveClassification::Great;
    }

    if cp_loss == 0 {
        MoveClassification::Best
    } else if cp_loss <= THRESHOLD_EXCELLENT {
        MoveClassification::Excellent
    } else if cp_loss <= THRESHOLD_GOOD {
        MoveClassification::Good
    } else if cp_loss <= THRESHOLD_INACCURACY {
        MoveClassification::Inaccuracy
    } else if cp_loss <= THRESHOLD_MISTAKE {
        MoveClassification::Mistake
    } else if cp_loss <= THRESHOLD_MISS {
        MoveClassification::Miss
    } else {
        MoveClassification::Blunder
    }
}

/// `100 - ACPL / 10`, floored at 0. A game without moves scores 0.
pub fn calculate_accuracy(total_cp_loss: i64, move_count: usize) -> f64 {
    if move_count == 0 {
        return 0.0;
    }
    let acpl = total_cp_loss as f64 / move_count as f64;
    (100.0 - acpl / 10.0).max(0.0)
}
