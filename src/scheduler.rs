//! Compute scheduler - debounced, cancellable compute dispatch
//!
//! Every control change funnels through [`ComputeScheduler::dispatch`].
//! Dispatches are debounced so a burst of slider movement issues a
//! single request, and superseded by design: each dispatch bumps a
//! generation counter and aborts the in-flight task, and a response is
//! only committed if its generation is still current. Observers follow
//! the pipeline through a watch channel of [`ComputeSnapshot`]s.
//!
//! The scheduler runs in one of two modes. `Live` posts to the compute
//! backend; `Static` reassembles the baseline from build artifacts.
//! A failed live request degrades to static once per request, and a
//! failed startup probe starts the session in static mode outright.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use footprint_core::ComputeResult;

use crate::artifacts::StaticAssembler;
use crate::transport::{ComputeRequest, ComputeTransport};

/// Where compute results come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeMode {
    Live,
    Static,
}

/// Lifecycle of the most recent dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputePhase {
    Idle,
    Loading,
    Success,
    Error,
}

/// Point-in-time view of the pipeline, published on every transition.
#[derive(Debug, Clone, Serialize)]
pub struct ComputeSnapshot {
    pub phase: ComputePhase,
    pub mode: ComputeMode,
    /// Last committed result. Retained across `Loading` so observers
    /// keep rendering stale-but-valid figures during recomputes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Arc<ComputeResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub generation: u64,
}

impl ComputeSnapshot {
    fn initial() -> Self {
        Self {
            phase: ComputePhase::Idle,
            mode: ComputeMode::Live,
            result: None,
            error: None,
            generation: 0,
        }
    }
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Default)]
struct SchedulerStats {
    dispatches: AtomicU64,
    completed: AtomicU64,
    superseded: AtomicU64,
    static_fallbacks: AtomicU64,
}

/// Serializable counter snapshot for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatsSnapshot {
    pub dispatches: u64,
    pub completed: u64,
    pub superseded: u64,
    pub static_fallbacks: u64,
}

// ============================================================================
// Scheduler
// ============================================================================

struct SchedulerInner {
    transport: Arc<dyn ComputeTransport>,
    assembler: Arc<StaticAssembler>,
    debounce: Duration,
    /// Monotonic dispatch counter; only the latest generation may
    /// commit its outcome.
    generation: AtomicU64,
    mode: RwLock<ComputeMode>,
    snapshot: watch::Sender<ComputeSnapshot>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Serializes generation checks against snapshot publication.
    commit: Mutex<()>,
    last_request: RwLock<Option<ComputeRequest>>,
    stats: SchedulerStats,
}

impl SchedulerInner {
    fn mode(&self) -> ComputeMode {
        self.mode.read().map(|m| *m).unwrap_or(ComputeMode::Static)
    }

    fn set_mode(&self, mode: ComputeMode) {
        if let Ok(mut current) = self.mode.write() {
            *current = mode;
        }
    }

    fn publish(&self, update: impl FnOnce(&mut ComputeSnapshot)) {
        self.snapshot.send_modify(update);
    }

    /// Commit an outcome, unless a newer dispatch superseded it.
    async fn commit_outcome(
        &self,
        generation: u64,
        outcome: std::result::Result<ComputeResult, String>,
    ) {
        let _guard = self.commit.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            self.stats.superseded.fetch_add(1, Ordering::Relaxed);
            debug!(generation, "Dropping superseded compute outcome");
            return;
        }
        let mode = self.mode();
        match outcome {
            Ok(result) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                info!(
                    generation,
                    mode = ?mode,
                    figures = result.figures.len(),
                    "Compute result committed"
                );
                self.publish(|snap| {
                    snap.phase = ComputePhase::Success;
                    snap.mode = mode;
                    snap.result = Some(Arc::new(result));
                    snap.error = None;
                    snap.generation = generation;
                });
            }
            Err(message) => {
                warn!(generation, error = %message, "Compute request failed");
                self.publish(|snap| {
                    snap.phase = ComputePhase::Error;
                    snap.mode = mode;
                    snap.error = Some(message);
                    snap.generation = generation;
                });
            }
        }
    }

    /// Run one request to completion in the current mode, degrading
    /// live failures to a single static attempt.
    async fn execute(&self, request: &ComputeRequest) -> std::result::Result<ComputeResult, String> {
        if self.mode() == ComputeMode::Live {
            match self.transport.compute(request).await {
                Ok(result) => return Ok(result),
                Err(live_error) => {
                    warn!(error = %live_error, "Live compute failed, degrading to static artifacts");
                    self.stats.static_fallbacks.fetch_add(1, Ordering::Relaxed);
                    self.set_mode(ComputeMode::Static);
                }
            }
        }
        self.assembler.assemble().await.map_err(|e| e.to_string())
    }
}

/// Debounced compute dispatch with latest-request-wins semantics.
pub struct ComputeScheduler {
    inner: Arc<SchedulerInner>,
    receiver: watch::Receiver<ComputeSnapshot>,
}

impl ComputeScheduler {
    pub fn new(
        transport: Arc<dyn ComputeTransport>,
        assembler: Arc<StaticAssembler>,
        debounce: Duration,
    ) -> Self {
        let (snapshot, receiver) = watch::channel(ComputeSnapshot::initial());
        Self {
            inner: Arc::new(SchedulerInner {
                transport,
                assembler,
                debounce,
                generation: AtomicU64::new(0),
                mode: RwLock::new(ComputeMode::Live),
                snapshot,
                task: Mutex::new(None),
                commit: Mutex::new(()),
                last_request: RwLock::new(None),
                stats: SchedulerStats::default(),
            }),
            receiver,
        }
    }

    /// Probe the live endpoint and settle the session's starting mode.
    /// A failed probe starts the session in static mode and loads the
    /// baseline immediately.
    pub async fn init(&self) {
        if self.inner.transport.probe().await {
            info!("Compute endpoint healthy, starting in live mode");
            self.inner.set_mode(ComputeMode::Live);
        } else {
            info!("Compute endpoint unreachable, starting in static mode");
            self.inner.set_mode(ComputeMode::Static);
            self.inner.publish(|snap| snap.mode = ComputeMode::Static);
            self.load_static_baseline().await;
        }
    }

    async fn load_static_baseline(&self) {
        let generation = self.next_generation().await;
        self.inner.publish(|snap| {
            snap.phase = ComputePhase::Loading;
            snap.generation = generation;
        });
        let outcome = self
            .inner
            .assembler
            .assemble()
            .await
            .map_err(|e| e.to_string());
        self.inner.commit_outcome(generation, outcome).await;
    }

    /// Schedule a compute request. Supersedes any pending or in-flight
    /// dispatch; the request only reaches the backend once the debounce
    /// window passes without a newer dispatch.
    pub async fn dispatch(&self, request: ComputeRequest) {
        self.dispatch_after(request, self.inner.debounce).await;
    }

    /// Force live mode and re-issue the last request immediately,
    /// bypassing the debounce window.
    pub async fn refresh(&self) {
        let last = self
            .inner
            .last_request
            .read()
            .map(|r| r.clone())
            .unwrap_or_default();
        let Some(request) = last else {
            debug!("Refresh requested before any dispatch, ignoring");
            return;
        };
        info!("Refresh requested, forcing live mode");
        self.inner.set_mode(ComputeMode::Live);
        self.dispatch_after(request, Duration::ZERO).await;
    }

    async fn dispatch_after(&self, request: ComputeRequest, delay: Duration) {
        if let Ok(mut last) = self.inner.last_request.write() {
            *last = Some(request.clone());
        }

        // Bump, publish, spawn and register under one guard: a
        // concurrent dispatch must not see the new generation before
        // its task is the registered one, or it would abort it.
        let _guard = self.inner.commit.lock().await;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.stats.dispatches.fetch_add(1, Ordering::Relaxed);
        self.inner.publish(|snap| {
            snap.phase = ComputePhase::Loading;
            snap.generation = generation;
        });

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let outcome = inner.execute(&request).await;
            inner.commit_outcome(generation, outcome).await;
        });

        if let Some(previous) = self.inner.task.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Bump the generation and abort the superseded task, serialized
    /// against outcome commits.
    async fn next_generation(&self) -> u64 {
        let _guard = self.inner.commit.lock().await;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = self.inner.task.lock().await.take() {
            previous.abort();
        }
        generation
    }

    /// Watch channel of pipeline snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ComputeSnapshot> {
        self.receiver.clone()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ComputeSnapshot {
        self.receiver.borrow().clone()
    }

    pub fn mode(&self) -> ComputeMode {
        self.inner.mode()
    }

    pub fn stats(&self) -> SchedulerStatsSnapshot {
        SchedulerStatsSnapshot {
            dispatches: self.inner.stats.dispatches.load(Ordering::Relaxed),
            completed: self.inner.stats.completed.load(Ordering::Relaxed),
            superseded: self.inner.stats.superseded.load(Ordering::Relaxed),
            static_fallbacks: self.inner.stats.static_fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Wait until the latest dispatch settles into `Success` or
    /// `Error`, and return that snapshot.
    pub async fn settled(&self) -> ComputeSnapshot {
        let mut receiver = self.subscribe();
        loop {
            {
                let snap = receiver.borrow_and_update();
                if snap.generation == self.inner.generation.load(Ordering::SeqCst)
                    && matches!(snap.phase, ComputePhase::Success | ComputePhase::Error)
                {
                    return snap.clone();
                }
            }
            if receiver.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}
