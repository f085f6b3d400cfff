//! Bounded pool of long-lived engine workers.
//!
//! Capacity is a semaphore with one permit per live worker; the idle workers
//! sit in a mutex-guarded list. A checkout takes a permit and pops a worker,
//! and dropping the returned [`WorkerLease`] puts both back, so release
//! happens on every exit path.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::oracle::{EvalResult, ScoringOracle};
use crate::stockfish::StockfishEngine;

/// Default worker count: leave one core for the rest of the process.
pub fn default_pool_size() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerState {
    Starting,
    Ready,
    Busy,
    Closed,
}

/// What happens to a worker whose request failed.
///
/// Timeouts always retire the worker: the engine may still be writing the
/// abandoned search, so its stream can no longer be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Put the worker back as `Ready`. A dead engine keeps failing and
    /// those requests degrade to a score of 0.
    #[default]
    ReturnToPool,
    /// Shut the worker down and shrink the pool by one.
    Retire,
}

impl FromStr for FaultPolicy {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "return" | "return_to_pool" => Ok(FaultPolicy::ReturnToPool),
            "retire" => Ok(FaultPolicy::Retire),
            other => Err(ReviewError::Config(format!("unknown fault policy: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PoolOptions {
    /// Upper bound on a single request; `None` waits forever.
    pub request_timeout: Option<Duration>,
    pub fault_policy: FaultPolicy,
}

struct EngineWorker<E> {
    id: usize,
    engine: E,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    Transport,
    Desynchronized,
}

pub struct EnginePool<E: ScoringOracle> {
    idle: Mutex<Vec<EngineWorker<E>>>,
    states: Mutex<Vec<WorkerState>>,
    permits: Arc<Semaphore>,
    returned: Notify,
    size: usize,
    live: AtomicUsize,
    closed: AtomicBool,
    options: PoolOptions,
}

impl EnginePool<StockfishEngine> {
    /// Start `config.pool_size` Stockfish processes.
    ///
    /// Any worker failing to start is fatal; the ones already running are
    /// shut down before the error is returned.
    pub async fn launch(config: &ReviewConfig) -> Result<Arc<Self>, ReviewError> {
        info!(
            pool_size = config.pool_size,
            path = %config.stockfish_path,
            "Creating Stockfish engine pool"
        );

        let mut engines = Vec::with_capacity(config.pool_size);
        for i in 0..config.pool_size {
            match StockfishEngine::spawn(&config.stockfish_path, &config.engine).await {
                Ok(engine) => {
                    info!(engine_id = i, name = engine.name(), "Stockfish engine ready");
                    engines.push(engine);
                }
                Err(e) => {
                    for mut engine in engines {
                        engine.quit().await;
                    }
                    return Err(e);
                }
            }
        }

        Self::from_engines(engines, config.pool_options())
    }
}

impl<E: ScoringOracle> EnginePool<E> {
    /// Wrap already-initialized oracles.
    pub fn from_engines(engines: Vec<E>, options: PoolOptions) -> Result<Arc<Self>, ReviewError> {
        if engines.is_empty() {
            return Err(ReviewError::EngineStartup("pool needs at least one engine".into()));
        }

        let size = engines.len();
        let mut states = vec![WorkerState::Starting; size];
        let mut idle = Vec::with_capacity(size);
        for (id, engine) in engines.into_iter().enumerate() {
            states[id] = WorkerState::Ready;
            idle.push(EngineWorker { id, engine });
        }

        Ok(Arc::new(Self {
            idle: Mutex::new(idle),
            states: Mutex::new(states),
            permits: Arc::new(Semaphore::new(size)),
            returned: Notify::new(),
            size,
            live: AtomicUsize::new(size),
            closed: AtomicBool::new(false),
            options,
        }))
    }

    /// Number of workers the pool was built with.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Workers not yet retired or shut down.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.lock_states().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Wait for a free worker.
    ///
    /// Fails with `PoolClosed` after shutdown or once every worker has been
    /// retired.
    pub async fn checkout(self: &Arc<Self>) -> Result<WorkerLease<E>, ReviewError> {
        if self.is_closed() {
            return Err(ReviewError::PoolClosed);
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ReviewError::PoolClosed)?;

        // A permit always has an idle worker behind it
        let worker = self.lock_idle().pop().ok_or(ReviewError::PoolClosed)?;
        self.set_state(worker.id, WorkerState::Busy);
        debug!(worker_id = worker.id, "worker checked out");

        Ok(WorkerLease {
            pool: Arc::clone(self),
            worker: Some(worker),
            permit: Some(permit),
            fault: None,
        })
    }

    /// Stop handing out workers, wait for the busy ones, and quit every engine.
    ///
    /// Safe to call more than once; only the first call does anything.
    pub async fn shutdown_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        // Pending checkouts fail from here on
        self.permits.close();

        loop {
            let notified = self.returned.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let all_returned = self.lock_idle().len() >= self.live_workers();
            if all_returned {
                break;
            }
            notified.await;
        }

        let workers = std::mem::take(&mut *self.lock_idle());
        let count = workers.len();
        for mut worker in workers {
            worker.engine.shutdown().await;
            self.set_state(worker.id, WorkerState::Closed);
        }
        self.live.store(0, Ordering::Release);
        info!(count, "Engine pool shut down");
    }

    fn check_in(&self, worker: EngineWorker<E>) {
        self.set_state(worker.id, WorkerState::Ready);
        debug!(worker_id = worker.id, "worker checked in");
        self.lock_idle().push(worker);
        self.returned.notify_waiters();
    }

    fn retire(&self, worker: EngineWorker<E>, permit: OwnedSemaphorePermit) {
        permit.forget();
        self.set_state(worker.id, WorkerState::Closed);
        let remaining = self.live.fetch_sub(1, Ordering::AcqRel) - 1;
        warn!(worker_id = worker.id, remaining, "Retiring engine worker");
        if remaining == 0 {
            self.closed.store(true, Ordering::Release);
            self.permits.close();
        }
        self.returned.notify_waiters();

        let mut worker = worker;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    worker.engine.shutdown().await;
                });
            }
            // No runtime left to run the quit; dropping the engine is all we can do
            Err(_) => drop(worker),
        }
    }

    fn set_state(&self, id: usize, state: WorkerState) {
        if let Some(slot) = self.lock_states().get_mut(id) {
            *slot = state;
        }
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<EngineWorker<E>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_states(&self) -> MutexGuard<'_, Vec<WorkerState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive use of one worker; dropping it checks the worker back in.
pub struct WorkerLease<E: ScoringOracle> {
    pool: Arc<EnginePool<E>>,
    worker: Option<EngineWorker<E>>,
    permit: Option<OwnedSemaphorePermit>,
    fault: Option<Fault>,
}

impl<E: ScoringOracle> WorkerLease<E> {
    pub fn worker_id(&self) -> Option<usize> {
        self.worker.as_ref().map(|w| w.id)
    }

    pub async fn evaluate(&mut self, fen: &str, depth: u32) -> Result<i32, ReviewError> {
        let limit = self.pool.options.request_timeout;
        let engine = self.engine()?;
        let result = with_deadline(limit, engine.evaluate(fen, depth)).await;
        self.record(&result);
        result
    }

    pub async fn evaluate_with_best_move(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> Result<EvalResult, ReviewError> {
        let limit = self.pool.options.request_timeout;
        let engine = self.engine()?;
        let result = with_deadline(limit, engine.evaluate_with_best_move(fen, depth)).await;
        self.record(&result);
        result
    }

    fn engine(&mut self) -> Result<&mut E, ReviewError> {
        self.worker
            .as_mut()
            .map(|w| &mut w.engine)
            .ok_or(ReviewError::PoolClosed)
    }

    fn record<T>(&mut self, result: &Result<T, ReviewError>) {
        match result {
            Err(ReviewError::EngineTimeout(_)) => self.fault = Some(Fault::Desynchronized),
            Err(ReviewError::EngineTransport(_)) => {
                self.fault.get_or_insert(Fault::Transport);
            }
            _ => {}
        }
    }
}

impl<E: ScoringOracle> Drop for WorkerLease<E> {
    fn drop(&mut self) {
        let (Some(worker), Some(permit)) = (self.worker.take(), self.permit.take()) else {
            return;
        };

        let retire = match self.fault {
            Some(Fault::Desynchronized) => true,
            Some(Fault::Transport) => self.pool.options.fault_policy == FaultPolicy::Retire,
            None => false,
        };

        if retire {
            self.pool.retire(worker, permit);
        } else {
            // Worker goes back before the permit so the next holder finds it
            self.pool.check_in(worker);
            drop(permit);
        }
    }
}

async fn with_deadline<T>(
    limit: Option<Duration>,
    request: impl Future<Output = Result<T, ReviewError>>,
) -> Result<T, ReviewError> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, request)
            .await
            .unwrap_or_else(|_| Err(ReviewError::EngineTimeout(limit.as_millis() as u64))),
        None => request.await,
    }
}
