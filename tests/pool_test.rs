//! Integration tests: engine pool and parallel evaluation.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fake_pool, Reply, Script};
use game_review::engine_pool::{FaultPolicy, PoolOptions, WorkerState};
use game_review::error::ReviewError;
use game_review::evaluator::{best_move, evaluate_all, evaluate_position};
use game_review::timeline::GameTimeline;

fn positions(moves: &str) -> Vec<String> {
    let sans: Vec<String> = moves.split_whitespace().map(String::from).collect();
    GameTimeline::replay(&sans).unwrap().positions
}

#[tokio::test]
async fn test_batch_larger_than_pool_keeps_input_order() {
    let fens = positions("e4 e5 Nf3 Nc6 Bb5 a6 Ba4 Nf6");
    assert_eq!(fens.len(), 9);

    // Raw score i * 10 from the side to move; Black-to-move scores flip sign
    let mut script = Script::new().delay(Duration::from_millis(5));
    for (i, fen) in fens.iter().enumerate() {
        script = script.reply(fen, Reply::cp(i as i32 * 10, "a2a3"));
    }
    let script = script.build();
    let pool = fake_pool(&script, 2, PoolOptions::default()).await;

    let scores = evaluate_all(&pool, &fens, 14).await;

    let expected: Vec<i32> = (0..9)
        .map(|i| if i % 2 == 0 { i * 10 } else { -(i * 10) })
        .collect();
    assert_eq!(scores, expected);
    assert_eq!(script.searches(), 9);
    assert!(script.peak_in_flight() <= 2);
    assert_eq!(pool.worker_states(), vec![WorkerState::Ready; 2]);
}

#[tokio::test]
async fn test_failed_request_scores_zero_and_releases_worker() {
    let fens = positions("d4 d5 c4");
    let script = Script::new()
        .reply(&fens[1], Reply::malformed())
        .reply(&fens[2], Reply::cp(30, "c2c4"))
        .reply(&fens[3], Reply::cp(-15, "e7e6"))
        .build();
    let pool = fake_pool(&script, 1, PoolOptions::default()).await;

    let scores = evaluate_all(&pool, &fens, 14).await;

    assert_eq!(scores, vec![0, 0, 30, 15]);
    assert_eq!(pool.live_workers(), 1);
    assert_eq!(pool.worker_states(), vec![WorkerState::Ready]);
}

#[tokio::test]
async fn test_dead_worker_returns_to_pool_by_default() {
    let fens = positions("e4");
    let script = Script::new().reply(&fens[0], Reply::Die).build();
    let pool = fake_pool(&script, 1, PoolOptions::default()).await;

    assert_eq!(evaluate_all(&pool, &fens, 14).await, vec![0, 0]);
    // Capacity is kept but the worker no longer answers
    assert_eq!(pool.live_workers(), 1);
    assert!(matches!(
        evaluate_position(&pool, &fens[1], 10).await,
        Err(ReviewError::EngineTransport(_))
    ));
}

#[tokio::test]
async fn test_retire_policy_shrinks_the_pool() {
    let fens = positions("e4");
    let script = Script::new().reply(&fens[0], Reply::Die).build();
    let options = PoolOptions {
        fault_policy: FaultPolicy::Retire,
        ..PoolOptions::default()
    };
    let pool = fake_pool(&script, 2, options).await;

    assert_eq!(evaluate_position(&pool, &fens[0], 14).await.ok(), None);
    assert_eq!(pool.live_workers(), 1);
    assert!(pool.worker_states().contains(&WorkerState::Closed));

    // The survivor still serves requests
    assert_eq!(evaluate_position(&pool, &fens[1], 14).await.unwrap(), 0);
}

#[tokio::test]
async fn test_timed_out_worker_is_retired() {
    let fens = positions("e4");
    let script = Script::new().reply(&fens[1], Reply::Hang).build();
    let options = PoolOptions {
        request_timeout: Some(Duration::from_millis(50)),
        ..PoolOptions::default()
    };
    let pool = fake_pool(&script, 1, options).await;

    let err = evaluate_position(&pool, &fens[1], 14).await.unwrap_err();
    assert!(matches!(err, ReviewError::EngineTimeout(50)));

    // Last worker gone: the pool is closed and batches degrade to zeros
    assert_eq!(pool.live_workers(), 0);
    assert!(matches!(
        evaluate_position(&pool, &fens[0], 14).await,
        Err(ReviewError::PoolClosed)
    ));
    assert_eq!(evaluate_all(&pool, &fens, 14).await, vec![0, 0]);
}

#[tokio::test]
async fn test_best_move_is_normalized() {
    let fens = positions("e4");
    let script = Script::new().reply(&fens[1], Reply::cp(40, "c7c5")).build();
    let pool = fake_pool(&script, 1, PoolOptions::default()).await;

    let result = best_move(&pool, &fens[1], 10).await.unwrap();
    assert_eq!(result.score, -40);
    assert_eq!(result.best_move.as_deref(), Some("c7c5"));
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_and_is_idempotent() {
    let fens = positions("e4");
    let script = Script::new()
        .reply(&fens[0], Reply::cp(25, "e2e4"))
        .delay(Duration::from_millis(100))
        .build();
    let pool = fake_pool(&script, 1, PoolOptions::default()).await;

    let in_flight = {
        let pool = Arc::clone(&pool);
        let fen = fens[0].clone();
        tokio::spawn(async move { evaluate_position(&pool, &fen, 14).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    pool.shutdown_all().await;
    pool.shutdown_all().await;

    assert_eq!(in_flight.await.unwrap().unwrap(), 25);
    assert!(pool.is_closed());
    assert_eq!(pool.live_workers(), 0);
    assert_eq!(pool.worker_states(), vec![WorkerState::Closed]);
    assert!(matches!(pool.checkout().await, Err(ReviewError::PoolClosed)));
}

#[tokio::test]
async fn test_empty_pool_is_a_startup_error() {
    let result = game_review::engine_pool::EnginePool::<game_review::StockfishEngine>::from_engines(
        Vec::new(),
        PoolOptions::default(),
    );
    assert!(matches!(result, Err(ReviewError::EngineStartup(_))));
}

#[tokio::test]
async fn test_leases_hold_distinct_workers() {
    let script = Script::new().build();
    let pool = fake_pool(&script, 2, PoolOptions::default()).await;

    let first = pool.checkout().await.unwrap();
    let second = pool.checkout().await.unwrap();
    let mut ids = vec![first.worker_id().unwrap(), second.worker_id().unwrap()];
    ids.sort_unstable();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(pool.worker_states(), vec![WorkerState::Busy, WorkerState::Busy]);

    drop(first);
    let states = pool.worker_states();
    assert_eq!(states.iter().filter(|s| **s == WorkerState::Ready).count(), 1);

    drop(second);
    assert_eq!(pool.worker_states(), vec![WorkerState::Ready, WorkerState::Ready]);
}
