//! SAN replay from the standard start position.
//!
//! Produces the position list the evaluator scores (moves + 1 entries) and
//! the per-ply move records the classifier walks.

use chess::{Board, ChessMove, Color, MoveGen, Piece};

use crate::error::ReviewError;

/// One ply of the game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub san: String,
    pub uci: String,
    pub mover: Color,
}

/// Boards and FENs of a replayed game.
///
/// `positions[i]` is the position before move `i`, `positions[i + 1]` the
/// one after it.
#[derive(Debug, Clone)]
pub struct GameTimeline {
    pub positions: Vec<String>,
    pub boards: Vec<Board>,
    pub moves: Vec<PlayedMove>,
}

impl GameTimeline {
    pub fn replay(san_moves: &[String]) -> Result<Self, ReviewError> {
        let mut board = Board::default();
        let mut halfmove: u32 = 0;
        let mut fullmove: u32 = 1;

        let mut positions = Vec::with_capacity(san_moves.len() + 1);
        let mut boards = Vec::with_capacity(san_moves.len() + 1);
        let mut moves = Vec::with_capacity(san_moves.len());

        positions.push(fen_with_counters(&board, halfmove, fullmove));
        boards.push(board);

        for (ply, san) in san_moves.iter().enumerate() {
            let chess_move = find_san_move(&board, san).map_err(|e| {
                ReviewError::Pgn(format!("move {} ({san}): {e}", ply + 1))
            })?;
            let mover = board.side_to_move();

            let resets_clock = board.piece_on(chess_move.get_source()) == Some(Piece::Pawn)
                || board.piece_on(chess_move.get_dest()).is_some();
            halfmove = if resets_clock { 0 } else { halfmove + 1 };
            if mover == Color::Black {
                fullmove += 1;
            }

            board = board.make_move_new(chess_move);
            positions.push(fen_with_counters(&board, halfmove, fullmove));
            boards.push(board);
            moves.push(PlayedMove {
                san: san.clone(),
                uci: to_uci(chess_move),
                mover,
            });
        }

        Ok(Self {
            positions,
            boards,
            moves,
        })
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// The board's FEN with its move counters replaced by the tracked ones.
fn fen_with_counters(board: &Board, halfmove: u32, fullmove: u32) -> String {
    let fen = board.to_string();
    let placement: Vec<&str> = fen.split_whitespace().take(4).collect();
    format!("{} {halfmove} {fullmove}", placement.join(" "))
}

pub fn to_uci(chess_move: ChessMove) -> String {
    let promotion = match chess_move.get_promotion() {
        Some(Piece::Queen) => "q",
        Some(Piece::Rook) => "r",
        Some(Piece::Bishop) => "b",
        Some(Piece::Knight) => "n",
        _ => "",
    };
    format!(
        "{}{}{}",
        chess_move.get_source(),
        chess_move.get_dest(),
        promotion
    )
}

/// Find the legal move matching a SAN string
pub fn find_san_move(board: &Board, san: &str) -> Result<ChessMove, String> {
    let clean = san.trim_end_matches(['+', '#', '!', '?']);
    let legal_moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();

    let castle_side = match clean {
        "O-O" | "0-0" => Some(true),
        "O-O-O" | "0-0-0" => Some(false),
        _ => None,
    };
    if let Some(kingside) = castle_side {
        return legal_moves
            .into_iter()
            .find(|m| {
                let src = m.get_source().get_file().to_index();
                let dst = m.get_dest().get_file().to_index();
                board.piece_on(m.get_source()) == Some(Piece::King)
                    && if kingside { dst == src + 2 } else { src == dst + 2 }
            })
            .ok_or_else(|| "castling is not legal here".to_string());
    }

    let Some(&first) = clean.as_bytes().first() else {
        return Err("empty move".to_string());
    };
    let (piece, rest) = if first.is_ascii_uppercase() {
        let piece = match first {
            b'K' => Piece::King,
            b'Q' => Piece::Queen,
            b'R' => Piece::Rook,
            b'B' => Piece::Bishop,
            b'N' => Piece::Knight,
            other => return Err(format!("unknown piece '{}'", other as char)),
        };
        (piece, &clean[1..])
    } else {
        (Piece::Pawn, clean)
    };

    let (rest, promotion) = match rest.find('=') {
        Some(eq) => {
            let promo = match rest.as_bytes().get(eq + 1) {
                Some(b'Q') => Some(Piece::Queen),
                Some(b'R') => Some(Piece::Rook),
                Some(b'B') => Some(Piece::Bishop),
                Some(b'N') => Some(Piece::Knight),
                _ => return Err("bad promotion piece".to_string()),
            };
            (&rest[..eq], promo)
        }
        None => (rest, None),
    };

    let rest = rest.replace('x', "");
    let bytes = rest.as_bytes();
    if bytes.len() < 2 {
        return Err("too short".to_string());
    }
    let (file, rank) = (bytes[bytes.len() - 2], bytes[bytes.len() - 1]);
    if !(b'a'..=b'h').contains(&file) || !(b'1'..=b'8').contains(&rank) {
        return Err("bad destination square".to_string());
    }
    let dest = chess::Square::make_square(
        chess::Rank::from_index((rank - b'1') as usize),
        chess::File::from_index((file - b'a') as usize),
    );
    let disambiguation = &bytes[..bytes.len() - 2];

    let candidates: Vec<ChessMove> = legal_moves
        .into_iter()
        .filter(|m| {
            m.get_dest() == dest
                && board.piece_on(m.get_source()) == Some(piece)
                && m.get_promotion() == promotion
        })
        .filter(|m| {
            let src = m.get_source();
            disambiguation.iter().all(|&b| match b {
                b'a'..=b'h' => src.get_file().to_index() == (b - b'a') as usize,
                b'1'..=b'8' => src.get_rank().to_index() == (b - b'1') as usize,
                _ => true,
            })
        })
        .collect();

    match candidates.as_slice() {
        [only] => Ok(*only),
        [] => Err("no legal move matches".to_string()),
        many => Err(format!("ambiguous ({} candidates)", many.len())),
    }
}
