//! Stockfish engine wrapper using UCI protocol (async I/O)

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

use tracing::{debug, warn};

use crate::error::ReviewError;
use crate::oracle::{mate_score, EvalResult, ScoringOracle};

/// How long `quit` may take before the process is killed.
const QUIT_GRACE: Duration = Duration::from_secs(2);

type EngineReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type EngineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Options sent to each engine after the UCI handshake.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub threads: u32,
    pub hash_mb: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 64,
        }
    }
}

/// Stockfish engine instance
///
/// Any pair of byte streams speaking UCI works as a transport; `spawn`
/// wires it to a child process.
pub struct StockfishEngine {
    process: Option<Child>,
    stdin: EngineWriter,
    stdout: EngineReader,
    name: String,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn spawn(path: &str, options: &EngineOptions) -> Result<Self, ReviewError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| ReviewError::EngineStartup(format!("Failed to spawn {path}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| ReviewError::EngineStartup("engine stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| ReviewError::EngineStartup("engine stdout unavailable".into()))?;

        let mut engine = Self {
            process: Some(process),
            stdin: Box::new(stdin),
            stdout: BufReader::new(Box::new(stdout)),
            name: String::new(),
        };
        engine.handshake(options).await?;
        Ok(engine)
    }

    /// Run the handshake over an already-open channel (socket, pipe, in-process engine).
    pub async fn from_streams<R, W>(
        reader: R,
        writer: W,
        options: &EngineOptions,
    ) -> Result<Self, ReviewError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut engine = Self {
            process: None,
            stdin: Box::new(writer),
            stdout: BufReader::new(Box::new(reader)),
            name: String::new(),
        };
        engine.handshake(options).await?;
        Ok(engine)
    }

    /// Engine name as reported by `id name`.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn handshake(&mut self, options: &EngineOptions) -> Result<(), ReviewError> {
        let startup = |e: ReviewError| ReviewError::EngineStartup(e.to_string());

        self.send("uci").await.map_err(startup)?;
        self.wait_for("uciok").await.map_err(startup)?;

        self.send(&format!("setoption name Threads value {}", options.threads))
            .await
            .map_err(startup)?;
        self.send(&format!("setoption name Hash value {}", options.hash_mb))
            .await
            .map_err(startup)?;
        self.send("isready").await.map_err(startup)?;
        self.wait_for("readyok").await.map_err(startup)?;

        debug!(name = %self.name, "UCI handshake complete");
        Ok(())
    }

    /// Send a command to Stockfish
    async fn send(&mut self, cmd: &str) -> Result<(), ReviewError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| ReviewError::EngineTransport(format!("Failed to write to engine: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| ReviewError::EngineTransport(format!("Failed to flush engine stdin: {e}")))?;
        Ok(())
    }

    /// Read one trimmed line; `None` at end of stream.
    async fn read_line(&mut self) -> Result<Option<String>, ReviewError> {
        let mut line = String::new();
        let n = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| ReviewError::EngineTransport(format!("Failed to read from engine: {e}")))?;
        if n == 0 {
            return Ok(None);
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "SF >");
        Ok(Some(trimmed))
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), ReviewError> {
        loop {
            let line = self.read_line().await?.ok_or_else(|| {
                ReviewError::EngineTransport(format!("engine closed its output before {expected}"))
            })?;
            if let Some(name) = line.strip_prefix("id name ") {
                self.name = name.to_string();
            } else if line == expected {
                return Ok(());
            }
        }
    }

    /// Search a position to a fixed depth.
    ///
    /// Later score reports supersede earlier ones. A malformed score fails the
    /// request, but only after the terminating `bestmove` line has been
    /// consumed so the channel stays in step for the next caller.
    pub async fn search(&mut self, fen: &str, depth: u32) -> Result<EvalResult, ReviewError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut score = 0;
        let mut malformed: Option<String> = None;

        loop {
            let line = self.read_line().await?.ok_or_else(|| {
                ReviewError::EngineTransport("engine closed its output mid-search".into())
            })?;

            if line.starts_with("bestmove") {
                if let Some(reason) = malformed {
                    return Err(ReviewError::EngineProtocol(reason));
                }
                return Ok(EvalResult {
                    score,
                    best_move: parse_bestmove(&line),
                });
            }

            match parse_score(&line) {
                Ok(Some(s)) => score = s,
                Ok(None) => {}
                Err(reason) => {
                    warn!(line = %line, "Unparseable score report");
                    malformed.get_or_insert(reason);
                }
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        if let Err(e) = self.send("quit").await {
            debug!(error = %e, "quit not delivered");
        }
        let _ = self.stdin.shutdown().await;

        if let Some(mut process) = self.process.take() {
            match tokio::time::timeout(QUIT_GRACE, process.wait()).await {
                Ok(Ok(status)) => debug!(%status, "engine exited"),
                Ok(Err(e)) => warn!(error = %e, "failed to reap engine"),
                Err(_) => {
                    warn!("engine ignored quit, killing");
                    let _ = process.kill().await;
                }
            }
        }
    }
}

impl ScoringOracle for StockfishEngine {
    async fn evaluate(&mut self, fen: &str, depth: u32) -> Result<i32, ReviewError> {
        Ok(self.search(fen, depth).await?.score)
    }

    async fn evaluate_with_best_move(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> Result<EvalResult, ReviewError> {
        self.search(fen, depth).await
    }

    async fn shutdown(&mut self) {
        self.quit().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        if let Some(process) = self.process.as_mut() {
            let _ = process.start_kill();
        }
    }
}

/// Parse a `score cp N` or `score mate N` report.
///
/// `Ok(None)` for lines without a score, `Err` when the score token is malformed.
fn parse_score(line: &str) -> Result<Option<i32>, String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(i) = parts.iter().position(|p| *p == "score") else {
        return Ok(None);
    };

    let kind = parts.get(i + 1).copied();
    if !matches!(kind, Some("cp") | Some("mate")) {
        return Ok(None);
    }

    let value: i32 = parts
        .get(i + 2)
        .ok_or_else(|| format!("missing score value in: {line}"))?
        .parse()
        .map_err(|e| format!("bad score value in '{line}': {e}"))?;

    match kind {
        Some("mate") => Ok(Some(mate_score(value))),
        _ => Ok(Some(value)),
    }
}

/// Parse the move token of a `bestmove` line; `(none)` means no legal move.
fn parse_bestmove(line: &str) -> Option<String> {
    line.split_whitespace()
        .nth(1)
        .filter(|m| *m != "(none)")
        .map(str::to_string)
}
