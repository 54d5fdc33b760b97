use std::io;
use std::sync::{Arc, Mutex, PoisonError, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use stockwatch_monitoring::{MonitoringEngine, MonitoringStore, ScanCycleResult, ScanError};

/// What the runner observed for one scheduled or triggered cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanReport {
    Completed(ScanCycleResult),
    /// Another cycle was already in flight; nothing was written.
    Skipped { reason: String },
    Failed { error: ScanError, attempt: u32 },
}

/// Sink for scan reports (dashboards, audit trail, tests).
pub trait ScanReportSink: Send + Sync + 'static {
    fn emit(&self, report: ScanReport);
}

/// In-memory sink for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryScanReportSink {
    inner: Mutex<Vec<ScanReport>>,
}

impl InMemoryScanReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<ScanReport> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn completed(&self) -> Vec<ScanCycleResult> {
        self.all()
            .into_iter()
            .filter_map(|report| match report {
                ScanReport::Completed(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}

impl ScanReportSink for InMemoryScanReportSink {
    fn emit(&self, report: ScanReport) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }
}

/// Longest interval the loop schedules; larger values are clamped.
pub const MAX_INTERVAL: Duration = Duration::from_secs(86_400);

/// Config for the background scan runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRunner {
    pub interval: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl Default for ScanRunner {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_retries: 5,
            base_backoff: Duration::from_millis(250),
        }
    }
}

/// Handle for the running scan loop (shutdown + trigger hook).
#[derive(Debug)]
pub struct ScanRunnerHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl ScanRunnerHandle {
    /// Request an extra cycle as soon as possible.
    ///
    /// Triggers are coalesced: while one is pending, further calls are no-ops.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Stop the loop and wait for the in-flight cycle (if any) to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl ScanRunner {
    /// Spawn the scan loop on a named thread.
    ///
    /// - Schedule: one cycle on start, then every `interval`
    /// - Trigger: `handle.trigger()` requests an extra cycle
    /// - Failures: data-access errors are retried with bounded exponential backoff;
    ///   deadline and cancellation failures are reported and wait for the next tick
    pub fn spawn<S, R>(
        &self,
        name: &'static str,
        engine: Arc<MonitoringEngine<S>>,
        sink: Arc<R>,
    ) -> io::Result<ScanRunnerHandle>
    where
        S: MonitoringStore + 'static,
        R: ScanReportSink,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runner_loop(name, cfg, shutdown_rx, trigger_rx, engine, sink))?;

        Ok(ScanRunnerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        })
    }
}

fn runner_loop<S, R>(
    name: &'static str,
    cfg: ScanRunner,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    engine: Arc<MonitoringEngine<S>>,
    sink: Arc<R>,
) where
    S: MonitoringStore + 'static,
    R: ScanReportSink,
{
    let interval = cfg.interval.clamp(Duration::from_millis(1), MAX_INTERVAL);
    info!(runner = name, interval_secs = interval.as_secs(), "scan runner started");

    let mut next_tick = Instant::now() + interval;
    let mut pending = true; // run once on startup
    let mut failures: u32 = 0;
    let mut backoff_until: Option<Instant> = None;

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_tick <= now {
                next_tick += interval;
            }
        }

        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if let Some(until) = backoff_until {
            if Instant::now() < until {
                thread::sleep(Duration::from_millis(50));
                continue;
            }
            backoff_until = None;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;

        match engine.run_scan() {
            Ok(result) => {
                failures = 0;
                sink.emit(ScanReport::Completed(result));
            }
            Err(ScanError::ConcurrencyConflict) => {
                debug!(runner = name, "scan skipped: another cycle is in flight");
                sink.emit(ScanReport::Skipped {
                    reason: ScanError::ConcurrencyConflict.to_string(),
                });
            }
            Err(error) => {
                failures += 1;
                warn!(runner = name, attempt = failures, error = %error, "scan cycle failed");
                let retryable = matches!(error, ScanError::DataAccess(_));
                sink.emit(ScanReport::Failed { error, attempt: failures });

                if retryable && failures <= cfg.max_retries {
                    pending = true;
                    backoff_until = Some(Instant::now() + backoff(cfg.base_backoff, failures));
                } else {
                    failures = 0;
                }
            }
        }
    }

    info!(runner = name, "scan runner stopped");
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    // Exponential backoff: base * 2^(attempt-1), capped.
    let pow = 1u32 << attempt.saturating_sub(1).min(10);
    let ms = base.as_millis().saturating_mul(u128::from(pow));
    Duration::from_millis(ms.min(10_000) as u64)
}
