//! Game review CLI
//!
//! Reviews a PGN game, or scores a single position, using a pool of local
//! Stockfish processes. Results are printed as JSON.

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;

use game_review::analyzer::analyze_game;
use game_review::book_cache::OpeningBook;
use game_review::config::ReviewConfig;
use game_review::engine_pool::EnginePool;
use game_review::evaluator;
use game_review::stockfish::StockfishEngine;

const USAGE: &str = "usage: game-review <analyze FILE.pgn | eval FEN | bestmove FEN>";

enum Command {
    Analyze(String),
    Eval(String),
    BestMove(String),
}

fn parse_args() -> anyhow::Result<Command> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((cmd, rest)) = args.split_first() else {
        bail!(USAGE);
    };
    // A FEN may arrive unquoted, as six arguments
    let operand = rest.join(" ");
    if operand.is_empty() {
        bail!(USAGE);
    }
    match cmd.as_str() {
        "analyze" => Ok(Command::Analyze(operand)),
        "eval" => Ok(Command::Eval(operand)),
        "bestmove" => Ok(Command::BestMove(operand)),
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Load .env file for local dev
    let _ = dotenvy::dotenv();

    let command = parse_args()?;
    let config = ReviewConfig::load()?;
    info!(stockfish_path = %config.stockfish_path, "Config loaded");

    let pool = EnginePool::launch(&config)
        .await
        .context("Failed to start engine pool")?;

    let result = run(command, &config, &pool).await;

    info!("Shutting down Stockfish engines");
    pool.shutdown_all().await;

    println!("{}", result?);
    Ok(())
}

async fn run(
    command: Command,
    config: &ReviewConfig,
    pool: &Arc<EnginePool<StockfishEngine>>,
) -> anyhow::Result<String> {
    let output = match command {
        Command::Analyze(path) => {
            let pgn = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {path}"))?;
            let book = OpeningBook::load(&config.openings_dir, config.book_cache.as_deref());
            let report = analyze_game(pool, &book, &pgn, config.analysis_depth).await?;
            serde_json::to_string_pretty(&report)?
        }
        Command::Eval(fen) => {
            let evaluation =
                evaluator::evaluate_position(pool, &fen, config.interactive_depth).await?;
            serde_json::json!({ "evaluation": evaluation }).to_string()
        }
        Command::BestMove(fen) => {
            let result = evaluator::best_move(pool, &fen, config.interactive_depth).await?;
            serde_json::json!({
                "evaluation": result.score,
                "best_move": result.best_move,
            })
            .to_string()
        }
    };
    Ok(output)
}
