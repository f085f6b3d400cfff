//! Material counting and capture detection on `chess` boards.

use chess::{BitBoard, Board, Color, Piece, Square, EMPTY};

pub const PAWN_VALUE: i32 = 1;
pub const KNIGHT_VALUE: i32 = 3;
pub const BISHOP_VALUE: i32 = 3;
pub const ROOK_VALUE: i32 = 5;
pub const QUEEN_VALUE: i32 = 9;

/// Kinds that count toward material; the king is priceless and left out.
const MATERIAL_PIECES: [Piece; 5] = [
    Piece::Pawn,
    Piece::Knight,
    Piece::Bishop,
    Piece::Rook,
    Piece::Queen,
];

/// Exchange value in pawns. Kings are worth 0.
pub fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PAWN_VALUE,
        Piece::Knight => KNIGHT_VALUE,
        Piece::Bishop => BISHOP_VALUE,
        Piece::Rook => ROOK_VALUE,
        Piece::Queen => QUEEN_VALUE,
        Piece::King => 0,
    }
}

/// Squares the piece standing on `square` covers, own pieces included.
///
/// Empty squares cover nothing.
pub fn attacks(board: &Board, square: Square) -> BitBoard {
    let (Some(piece), Some(color)) = (board.piece_on(square), board.color_on(square)) else {
        return EMPTY;
    };
    let occupied = *board.combined();

    match piece {
        Piece::Pawn => pawn_attacks(square, color),
        Piece::Knight => chess::get_knight_moves(square),
        Piece::King => chess::get_king_moves(square),
        Piece::Bishop => chess::get_bishop_moves(square, occupied),
        Piece::Rook => chess::get_rook_moves(square, occupied),
        Piece::Queen => {
            chess::get_bishop_moves(square, occupied) | chess::get_rook_moves(square, occupied)
        }
    }
}

/// Capture squares of a `color` pawn on `square`; pushes are not included.
pub fn pawn_attacks(square: Square, color: Color) -> BitBoard {
    let Some(ahead) = square.forward(color) else {
        return EMPTY;
    };
    [ahead.left(), ahead.right()]
        .into_iter()
        .flatten()
        .fold(EMPTY, |covered, sq| covered | BitBoard::from_square(sq))
}

/// Every `color` piece that could capture on `square` right now.
pub fn attackers(board: &Board, color: Color, square: Square) -> BitBoard {
    let occupied = *board.combined();
    let pieces = |kind: Piece| *board.pieces(kind);
    let diagonal = pieces(Piece::Bishop) | pieces(Piece::Queen);
    let straight = pieces(Piece::Rook) | pieces(Piece::Queen);

    // A pawn of `color` hits `square` exactly when a pawn of the other
    // color on `square` would hit it back
    let candidates = (pawn_attacks(square, !color) & pieces(Piece::Pawn))
        | (chess::get_knight_moves(square) & pieces(Piece::Knight))
        | (chess::get_king_moves(square) & pieces(Piece::King))
        | (chess::get_bishop_moves(square, occupied) & diagonal)
        | (chess::get_rook_moves(square, occupied) & straight);

    candidates & *board.color_combined(color)
}

/// Sum of piece values `color` has on the board.
pub fn material_count(board: &Board, color: Color) -> i32 {
    let side = *board.color_combined(color);
    MATERIAL_PIECES
        .iter()
        .map(|&kind| (*board.pieces(kind) & side).popcnt() as i32 * piece_value(kind))
        .sum()
}

/// `side`'s material minus the opponent's.
pub fn material_diff(board: &Board, side: Color) -> i32 {
    material_count(board, side) - material_count(board, !side)
}

/// A capture available to `attacker` against one of the victim's pieces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureThreat {
    pub from: Square,
    pub to: Square,
    pub capturing: Piece,
    pub captured: Piece,
}

/// Pseudo-legal captures `attacker` has against `victim` pieces.
///
/// Pins and checks are ignored. En passant never shows up because its
/// target square is empty.
pub fn capture_threats(board: &Board, attacker: Color) -> Vec<CaptureThreat> {
    let victims = *board.color_combined(!attacker);
    let mut threats = Vec::new();

    for from in *board.color_combined(attacker) {
        let Some(capturing) = board.piece_on(from) else {
            continue;
        };
        for to in attacks(board, from) & victims {
            if let Some(captured) = board.piece_on(to) {
                threats.push(CaptureThreat {
                    from,
                    to,
                    capturing,
                    captured,
                });
            }
        }
    }

    threats
}

/// Most material the opponent can win immediately from `mover`.
///
/// An undefended piece is lost outright; a defended one only costs the
/// excess of its value over the capturing piece.
pub fn max_material_loss(board_after: &Board, mover: Color) -> i32 {
    capture_threats(board_after, !mover)
        .into_iter()
        .map(|t| {
            let captured = piece_value(t.captured);
            if attackers(board_after, mover, t.to) == EMPTY {
                captured
            } else {
                (captured - piece_value(t.capturing)).max(0)
            }
        })
        .max()
        .unwrap_or(0)
}

/// Net material change for the mover once the worst immediate recapture is
/// accounted for: `(after - max_loss) - before`.
pub fn material_swing(board_before: &Board, board_after: &Board, mover: Color) -> i32 {
    let b1 = material_diff(board_before, mover);
    let b2 = material_diff(board_after, mover);
    let b3 = b2 - max_material_loss(board_after, mover);
    b3 - b1
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::{File, Rank};
    use std::str::FromStr;

    fn from_fen(fen: &str) -> Board {
        Board::from_str(fen).unwrap()
    }

    #[test]
    fn test_material_count_starting() {
        let board = Board::default();
        // 8 + 2*3 + 2*3 + 2*5 + 9
        assert_eq!(material_count(&board, Color::White), 39);
        assert_eq!(material_count(&board, Color::Black), 39);
        assert_eq!(material_diff(&board, Color::White), 0);
    }

    #[test]
    fn test_pawn_attacks() {
        let e4 = Square::make_square(Rank::Fourth, File::E);
        let white_atk = pawn_attacks(e4, Color::White);
        let d5 = Square::make_square(Rank::Fifth, File::D);
        let f5 = Square::make_square(Rank::Fifth, File::F);
        assert!((white_atk & BitBoard::from_square(d5)).popcnt() > 0);
        assert!((white_atk & BitBoard::from_square(f5)).popcnt() > 0);
        assert_eq!(white_atk.popcnt(), 2);

        let a8 = Square::make_square(Rank::Eighth, File::A);
        assert_eq!(pawn_attacks(a8, Color::White), EMPTY);

        let a5 = Square::make_square(Rank::Fifth, File::A);
        let b4 = Square::make_square(Rank::Fourth, File::B);
        assert_eq!(pawn_attacks(a5, Color::Black), BitBoard::from_square(b4));
    }

    #[test]
    fn test_attackers_reverse_lookup() {
        // After 2. Nf3 the knight eyes e5
        let board = from_fen("rnbqkbnr/pppppppp/8/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R b KQkq - 1 2");
        let e5 = Square::make_square(Rank::Fifth, File::E);
        let white_attackers = attackers(&board, Color::White, e5);
        let f3 = Square::make_square(Rank::Third, File::F);
        assert!((white_attackers & BitBoard::from_square(f3)).popcnt() > 0);
    }

    #[test]
    fn test_capture_threats_only_target_victims() {
        // Black pawn d5 can take the knight on e4; nothing else is in reach
        let board = from_fen("4k3/8/8/3p4/4N3/8/8/4K3 b - - 0 1");
        let threats = capture_threats(&board, Color::Black);
        assert_eq!(threats.len(), 1);
        assert_eq!(threats[0].capturing, Piece::Pawn);
        assert_eq!(threats[0].captured, Piece::Knight);
    }

    #[test]
    fn test_undefended_piece_is_lost_outright() {
        let board = from_fen("4k3/8/8/3p4/4N3/8/8/4K3 b - - 0 1");
        assert_eq!(max_material_loss(&board, Color::White), 3);
    }

    #[test]
    fn test_defended_piece_costs_only_the_excess() {
        // Knight on e4 is covered by the d3 pawn
        let board = from_fen("4k3/8/8/3p4/4N3/3P4/8/4K3 b - - 0 1");
        assert_eq!(max_material_loss(&board, Color::White), 2);

        // Defended queen attacked by a queen: an even trade
        let board = from_fen("4k3/4q3/8/8/4Q3/3P4/8/4K3 b - - 0 1");
        assert_eq!(max_material_loss(&board, Color::White), 0);
    }

    #[test]
    fn test_material_swing_for_hung_pawn_is_one() {
        let before = from_fen("4k3/8/8/3p4/8/8/4P3/4K3 w - - 0 1");
        let after = from_fen("4k3/8/8/3p4/4P3/8/8/4K3 b - - 0 1");
        assert_eq!(material_swing(&before, &after, Color::White), -1);
    }

    #[test]
    fn test_material_swing_for_hung_knight() {
        let before = from_fen("4k3/8/8/3p4/8/8/3N4/4K3 w - - 0 1");
        let after = from_fen("4k3/8/8/3p4/4N3/8/8/4K3 b - - 1 1");
        assert_eq!(material_swing(&before, &after, Color::White), -3);
    }
}
