//! Scheduled publishing
//!
//! A [`PushRegistry`] owns one background task that wakes every step,
//! snapshots every meter of its [`MeterRegistry`] and hands the snapshots to
//! a [`Publisher`]. Publishing is strictly sequential: a tick never starts
//! while the previous one is still running, and a failing or panicking
//! publisher is logged and the schedule carries on.
//!
//! Lifecycle: `stopped -> running -> stopped`, and `closed` once
//! [`PushRegistry::close`] ran. `start` on a running registry restarts it.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use tally_common::{ExportError, PushRegistryConfig, Result, TallyError, TimeUnit};
use tally_core::{MeterRegistry, MeterSnapshot};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// A backend adapter, called once per step with the snapshot of every meter
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    /// Short backend name used in logs
    fn name(&self) -> &str;

    /// Unit timer values are converted to before `publish` sees them
    fn base_time_unit(&self) -> TimeUnit {
        TimeUnit::Milliseconds
    }

    /// Serialize and ship one step. Errors are logged by the caller and
    /// never stop the schedule.
    async fn publish(&self, snapshots: &[MeterSnapshot]) -> std::result::Result<(), ExportError>;
}

/// Counters describing the publish history of a [`PushRegistry`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PublishStats {
    /// Publish attempts, successful or not
    pub attempts: u64,
    /// Attempts where the publisher returned an error
    pub failures: u64,
    /// Attempts where the publisher panicked
    pub panics: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    attempts: AtomicU64,
    failures: AtomicU64,
    panics: AtomicU64,
}

const NOT_PUBLISHED: u64 = u64::MAX;

struct Shared<P> {
    registry: Arc<MeterRegistry>,
    publisher: Arc<P>,
    config: PushRegistryConfig,
    /// Held for the whole of one publish
    publishing: tokio::sync::Mutex<()>,
    /// Step index (wall time / step) during which the last publish ran
    last_published_step: AtomicU64,
    stats: StatsCounters,
}

impl<P: Publisher> Shared<P> {
    fn current_step(&self) -> u64 {
        self.registry.clock().wall_time_ms() / self.config.step_millis().max(1)
    }

    async fn publish_once(&self) -> std::result::Result<(), ExportError> {
        let _guard = self.publishing.lock().await;
        self.stats.attempts.fetch_add(1, Ordering::Relaxed);
        self.last_published_step
            .store(self.current_step(), Ordering::Release);

        let unit = self.publisher.base_time_unit();
        let outcome = AssertUnwindSafe(async {
            // gauge suppliers and custom meters run user code here
            let snapshots: Vec<MeterSnapshot> = self
                .registry
                .meters()
                .iter()
                .map(|meter| meter.snapshot(unit))
                .collect();
            debug!(
                publisher = self.publisher.name(),
                meters = snapshots.len(),
                "Publishing metrics"
            );
            self.publisher.publish(&snapshots).await
        })
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
            Err(payload) => {
                self.stats.panics.fetch_add(1, Ordering::Relaxed);
                Err(ExportError::Panicked(panic_message(payload.as_ref())))
            }
        }
    }

    /// Publish and log any failure once. Never fails.
    async fn publish_safely(&self) {
        match self.publish_once().await {
            Ok(()) => {}
            Err(ExportError::Panicked(message)) => {
                error!(
                    publisher = self.publisher.name(),
                    panic = %message,
                    "Publisher panicked; the schedule continues"
                );
            }
            Err(e) => {
                warn!(
                    publisher = self.publisher.name(),
                    error = %e,
                    "Failed to publish metrics"
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

struct Worker {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodically publishes a [`MeterRegistry`] through a [`Publisher`]
pub struct PushRegistry<P: Publisher> {
    shared: Arc<Shared<P>>,
    worker: Mutex<Option<Worker>>,
    closed: AtomicBool,
}

impl<P: Publisher> PushRegistry<P> {
    /// Wrap an existing registry.
    ///
    /// # Errors
    ///
    /// [`TallyError::InvalidConfiguration`] when the configuration is invalid
    /// or its step differs from the registry's step.
    pub fn new(
        registry: Arc<MeterRegistry>,
        publisher: P,
        config: PushRegistryConfig,
    ) -> Result<Self> {
        config.validate()?;
        if registry.step() != config.step {
            return Err(TallyError::InvalidConfiguration(format!(
                "publish step {:?} does not match registry step {:?}",
                config.step,
                registry.step()
            )));
        }

        Ok(Self {
            shared: Arc::new(Shared {
                registry,
                publisher: Arc::new(publisher),
                config,
                publishing: tokio::sync::Mutex::new(()),
                last_published_step: AtomicU64::new(NOT_PUBLISHED),
                stats: StatsCounters::default(),
            }),
            worker: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    /// Build a fresh registry with the configured step and the system clock
    pub fn from_config(publisher: P, config: PushRegistryConfig) -> Result<Self> {
        config.validate()?;
        let registry = MeterRegistry::builder().config(&config).build()?;
        Self::new(Arc::new(registry), publisher, config)
    }

    pub fn registry(&self) -> &Arc<MeterRegistry> {
        &self.shared.registry
    }

    pub fn publisher(&self) -> &Arc<P> {
        &self.shared.publisher
    }

    pub fn config(&self) -> &PushRegistryConfig {
        &self.shared.config
    }

    /// Start the periodic publish task on the current Tokio runtime. The
    /// first tick fires one step after this call.
    ///
    /// Does nothing when publishing is disabled or the registry is closed.
    ///
    /// # Errors
    ///
    /// [`TallyError::Scheduler`] when called outside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            warn!(
                publisher = self.shared.publisher.name(),
                "Ignoring start of a closed push registry"
            );
            return Ok(());
        }
        if !self.shared.config.enabled {
            info!(
                publisher = self.shared.publisher.name(),
                "Publishing is disabled, not starting"
            );
            return Ok(());
        }

        let runtime = Handle::try_current().map_err(|e| TallyError::Scheduler(e.to_string()))?;

        let mut worker = self.worker.lock();
        // close() flips `closed` under this lock
        if self.closed.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(previous) = worker.take() {
            debug!(
                publisher = self.shared.publisher.name(),
                "Restarting publish task"
            );
            let _ = previous.shutdown.send(());
        }

        let (shutdown, shutdown_rx) = oneshot::channel();
        let handle = runtime.spawn(run(self.shared.clone(), shutdown_rx));
        *worker = Some(Worker { shutdown, handle });

        info!(
            publisher = self.shared.publisher.name(),
            step_ms = self.shared.config.step_millis(),
            "Started publishing metrics"
        );
        Ok(())
    }

    /// Cancel the periodic task. A tick that is already publishing finishes;
    /// no further tick is scheduled. Safe to call repeatedly or when never
    /// started.
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.shutdown.send(());
            debug!(
                publisher = self.shared.publisher.name(),
                "Stopped publishing metrics"
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .map(|w| !w.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Publish immediately, outside the schedule, and report the outcome
    pub async fn publish_now(&self) -> Result<()> {
        self.shared.publish_once().await.map_err(TallyError::from)
    }

    /// Stop the schedule and, when configured, publish one last time.
    ///
    /// If no tick ran during the current step the last completed step is
    /// published first; then every meter's partial step is flushed and
    /// published. Failures are logged, never returned. Idempotent.
    #[instrument(skip(self), fields(publisher = self.shared.publisher.name()))]
    pub async fn close(&self) {
        let worker = {
            let mut worker = self.worker.lock();
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            worker.take()
        };
        if let Some(worker) = worker {
            let _ = worker.shutdown.send(());
            if let Err(e) = worker.handle.await {
                if e.is_panic() {
                    error!(error = %e, "Publish task panicked");
                }
            }
        }

        let config = &self.shared.config;
        if config.enabled && config.publish_on_close {
            let current = self.shared.current_step();
            if self.shared.last_published_step.load(Ordering::Acquire) != current {
                self.shared.publish_safely().await;
            }
            self.shared.registry.closing_rollover();
            self.shared.publish_safely().await;
        }

        info!("Closed push registry");
    }

    pub fn stats(&self) -> PublishStats {
        let counters = &self.shared.stats;
        PublishStats {
            attempts: counters.attempts.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
            panics: counters.panics.load(Ordering::Relaxed),
        }
    }
}

impl<P: Publisher> Drop for PushRegistry<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<P: Publisher> std::fmt::Debug for PushRegistry<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushRegistry")
            .field("publisher", &self.shared.publisher.name())
            .field("config", &self.shared.config)
            .field("closed", &self.is_closed())
            .finish()
    }
}

async fn run<P: Publisher>(shared: Arc<Shared<P>>, mut shutdown: oneshot::Receiver<()>) {
    let step = shared.config.step;
    let mut ticker = interval_at(Instant::now() + step, step);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            // also resolves when the sender is dropped
            _ = &mut shutdown => break,
            _ = ticker.tick() => shared.publish_safely().await,
        }
    }
}
