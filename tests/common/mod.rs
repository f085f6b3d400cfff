//! Scripted in-process UCI engine for integration tests.
//!
//! Each fake engine speaks UCI over a `tokio::io::duplex` pipe and answers
//! `go` with the reply scripted for the current position (keyed by the
//! first four FEN fields). Engines built from the same `Script` share its
//! counters, so a test can observe how many searches ran at once.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use game_review::engine_pool::{EnginePool, PoolOptions};
use game_review::stockfish::{EngineOptions, StockfishEngine};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Clone)]
pub enum Reply {
    /// Emit these lines in order
    Lines(Vec<String>),
    /// Never answer
    Hang,
    /// Close both streams without answering
    Die,
}

impl Reply {
    pub fn cp(score: i32, best: &str) -> Self {
        Reply::Lines(vec![
            "info depth 1 score cp 0 nodes 20 pv a2a3".to_string(),
            format!("info depth 10 seldepth 14 score cp {score} nodes 9000 pv {best}"),
            format!("bestmove {best}"),
        ])
    }

    pub fn mate(moves: i32, best: Option<&str>) -> Self {
        Reply::Lines(vec![
            format!("info depth 10 score mate {moves}"),
            format!("bestmove {}", best.unwrap_or("(none)")),
        ])
    }

    pub fn malformed() -> Self {
        Reply::Lines(vec![
            "info depth 3 score cp ??? nodes 10".to_string(),
            "bestmove e2e4".to_string(),
        ])
    }
}

pub struct Script {
    replies: HashMap<String, Reply>,
    default: Reply,
    delay: Duration,
    searches: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Script {
    pub fn new() -> Self {
        Self {
            replies: HashMap::new(),
            default: Reply::cp(0, "e2e4"),
            delay: Duration::ZERO,
            searches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn reply(mut self, fen: &str, reply: Reply) -> Self {
        self.replies.insert(key(fen), reply);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn reply_for(&self, fen: &str) -> Reply {
        self.replies
            .get(&key(fen))
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

fn key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

/// Start a fake engine task and run the UCI handshake against it.
pub async fn fake_engine(script: Arc<Script>) -> StockfishEngine {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (client_read, client_write) = tokio::io::split(client);
    tokio::spawn(serve(script, server));
    StockfishEngine::from_streams(client_read, client_write, &EngineOptions::default())
        .await
        .expect("fake engine handshake")
}

pub async fn fake_pool(
    script: &Arc<Script>,
    size: usize,
    options: PoolOptions,
) -> Arc<EnginePool<StockfishEngine>> {
    let mut engines = Vec::with_capacity(size);
    for _ in 0..size {
        engines.push(fake_engine(Arc::clone(script)).await);
    }
    EnginePool::from_engines(engines, options).expect("pool")
}

async fn serve(script: Arc<Script>, stream: tokio::io::DuplexStream) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();
    let mut position = String::new();

    while let Ok(Some(line)) = lines.next_line().await {
        let out: Vec<String> = if line == "uci" {
            vec![
                "id name FakeFish 1.0".into(),
                "id author tests".into(),
                "uciok".into(),
            ]
        } else if line == "isready" {
            vec!["readyok".into()]
        } else if let Some(fen) = line.strip_prefix("position fen ") {
            position = fen.to_string();
            continue;
        } else if line.starts_with("go") {
            script.searches.fetch_add(1, Ordering::SeqCst);
            let now = script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            script.peak_in_flight.fetch_max(now, Ordering::SeqCst);
            if !script.delay.is_zero() {
                tokio::time::sleep(script.delay).await;
            }
            script.in_flight.fetch_sub(1, Ordering::SeqCst);

            match script.reply_for(&position) {
                Reply::Lines(lines) => lines,
                Reply::Hang => {
                    std::future::pending::<()>().await;
                    return;
                }
                Reply::Die => return,
            }
        } else if line == "quit" {
            return;
        } else {
            continue;
        };

        for l in out {
            if write.write_all(format!("{l}\n").as_bytes()).await.is_err() {
                return;
            }
        }
    }
}
