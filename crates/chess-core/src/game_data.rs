use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMetadata {
    pub white: String,
    pub black: String,
    pub white_elo: String, // "?" when the header is missing
    pub black_elo: String,
    pub time_control: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub date: Option<String>,
    pub event: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameData {
    pub metadata: GameMetadata,
    pub moves: Vec<String>,  // SAN notation
    pub clocks: Vec<String>, // remaining time per ply, from [%clk] comments
}

impl GameData {
    /// Clock annotation for ply `index`, if the record carried one.
    pub fn clock_for(&self, index: usize) -> Option<&str> {
        self.clocks.get(index).map(String::as_str)
    }
}
