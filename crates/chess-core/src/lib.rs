//! Game-record text handling shared by the review pipeline.

pub mod game_data;
pub mod pgn;

pub use game_data::{GameData, GameMetadata};
pub use pgn::{parse_pgn, PgnError};
