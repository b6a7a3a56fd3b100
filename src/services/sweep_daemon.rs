//! Periodic completion sweep daemon.
//!
//! Drives `CompletionReconciler::daily_sweep` on a fixed interval. A sweep
//! whose enumeration fails is logged and retried on the next tick; the daemon
//! only gives up after a configured number of consecutive failures.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::domain::errors::DomainResult;
use crate::domain::models::{ReconcileConfig, SweepReport};
use crate::services::completion_reconciler::CompletionReconciler;

/// Configuration for the sweep daemon.
#[derive(Debug, Clone)]
pub struct SweepDaemonConfig {
    /// Interval between sweeps.
    pub sweep_interval: Duration,
    /// Whether to sweep immediately on start.
    pub run_on_startup: bool,
    /// Maximum consecutive failed sweeps before stopping.
    pub max_consecutive_failures: u32,
}

impl Default for SweepDaemonConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(24 * 60 * 60),
            run_on_startup: true,
            max_consecutive_failures: 5,
        }
    }
}

impl From<&ReconcileConfig> for SweepDaemonConfig {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            sweep_interval: config.sweep_interval(),
            run_on_startup: config.run_on_startup,
            max_consecutive_failures: config.max_consecutive_failures,
        }
    }
}

/// Event emitted by the sweep daemon.
#[derive(Debug, Clone)]
pub enum SweepDaemonEvent {
    Started,
    SweepStarted { run_number: u64 },
    SweepCompleted {
        run_number: u64,
        report: SweepReport,
        duration_ms: u64,
    },
    SweepFailed { run_number: u64, error: String },
    Stopped { reason: StopReason },
}

/// Reason a background loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TooManyFailures,
}

/// Status of the sweep daemon.
#[derive(Debug, Clone, Default)]
pub struct DaemonStatus {
    pub running: bool,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub last_run: Option<Instant>,
    /// Tests finalized across all sweeps.
    pub tests_completed: u64,
    /// Variations marked complete across all sweeps.
    pub variations_completed: u64,
}

/// Shared stop request for the background loops.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once `stop` has been called.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

/// Handle to control the sweep daemon.
#[derive(Clone)]
pub struct DaemonHandle {
    stop: StopSignal,
    status: Arc<RwLock<DaemonStatus>>,
}

impl DaemonHandle {
    /// Request the daemon to stop. An in-flight sweep finishes first.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.is_stopped()
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }
}

/// Periodic sweep driver.
pub struct SweepDaemon {
    reconciler: Arc<CompletionReconciler>,
    config: SweepDaemonConfig,
    status: Arc<RwLock<DaemonStatus>>,
    stop: StopSignal,
}

impl SweepDaemon {
    pub fn new(reconciler: Arc<CompletionReconciler>, config: SweepDaemonConfig) -> Self {
        Self {
            reconciler,
            config,
            status: Arc::new(RwLock::new(DaemonStatus::default())),
            stop: StopSignal::new(),
        }
    }

    /// Stop this daemon together with other loops sharing the signal.
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn handle(&self) -> DaemonHandle {
        DaemonHandle {
            stop: self.stop.clone(),
            status: self.status.clone(),
        }
    }

    /// Spawn the daemon, returning a channel for events.
    pub fn run(self) -> mpsc::Receiver<SweepDaemonEvent> {
        let (tx, rx) = mpsc::channel(100);
        tokio::spawn(async move {
            self.run_loop(tx).await;
        });
        rx
    }

    /// Run the daemon on the current task until it stops.
    pub async fn run_with_sender(self, tx: mpsc::Sender<SweepDaemonEvent>) {
        self.run_loop(tx).await;
    }

    async fn run_loop(self, tx: mpsc::Sender<SweepDaemonEvent>) {
        self.status.write().await.running = true;
        let _ = tx.send(SweepDaemonEvent::Started).await;
        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            "Sweep daemon started"
        );

        let mut consecutive_failures = 0u32;
        let period = self.config.sweep_interval.max(Duration::from_millis(10));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut reason = StopReason::Requested;
        let mut run_now = self.config.run_on_startup;

        loop {
            if run_now {
                self.run_sweep_cycle(&tx, &mut consecutive_failures).await;
                if consecutive_failures >= self.config.max_consecutive_failures.max(1) {
                    error!(consecutive_failures, "Too many failed sweeps; stopping daemon");
                    reason = StopReason::TooManyFailures;
                    break;
                }
            }
            if self.stop.is_stopped() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => run_now = true,
                () = self.stop.stopped() => break,
            }
        }

        self.status.write().await.running = false;
        info!(?reason, "Sweep daemon stopped");
        let _ = tx.send(SweepDaemonEvent::Stopped { reason }).await;
    }

    async fn run_sweep_cycle(&self, tx: &mpsc::Sender<SweepDaemonEvent>, consecutive_failures: &mut u32) {
        let run_number = {
            let mut status = self.status.write().await;
            status.total_runs += 1;
            status.total_runs
        };
        let _ = tx.send(SweepDaemonEvent::SweepStarted { run_number }).await;

        let start = Instant::now();
        let result = self.reconciler.daily_sweep().await;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(report) => {
                *consecutive_failures = 0;
                {
                    let mut status = self.status.write().await;
                    status.successful_runs += 1;
                    status.last_run = Some(Instant::now());
                    status.tests_completed += report.tests_completed as u64;
                    status.variations_completed += report.variations_completed as u64;
                }
                let _ = tx
                    .send(SweepDaemonEvent::SweepCompleted {
                        run_number,
                        report,
                        duration_ms,
                    })
                    .await;
            }
            Err(e) => {
                *consecutive_failures += 1;
                error!(run_number, error = %e, "Sweep failed; retrying on next tick");
                self.status.write().await.failed_runs += 1;
                let _ = tx
                    .send(SweepDaemonEvent::SweepFailed {
                        run_number,
                        error: e.to_string(),
                    })
                    .await;
            }
        }
    }

    /// Run one sweep outside the loop.
    pub async fn run_once(&self) -> DomainResult<SweepReport> {
        self.reconciler.daily_sweep().await
    }

    pub async fn status(&self) -> DaemonStatus {
        self.status.read().await.clone()
    }

    pub fn config(&self) -> &SweepDaemonConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteTestRepository, SqliteVariationRepository};
    use crate::domain::errors::DomainError;
    use crate::domain::models::{AbTest, ProviderStudyStatus, TestStatus, Variation, VariationType};
    use crate::domain::ports::{TestFilter, TestRepository, VariationRepository};
    use crate::services::completion_reconciler::fakes::{RecordingNotifier, ScriptedProvider};
    use crate::services::completion_reconciler::ReconcilerConfig;

    /// Test store whose listing fails or succeeds in a scripted order.
    /// Once the script runs out every listing fails.
    struct FlakyTests {
        script: Mutex<VecDeque<bool>>,
    }

    impl FlakyTests {
        fn new(succeeds: &[bool]) -> Self {
            Self {
                script: Mutex::new(succeeds.iter().copied().collect()),
            }
        }
    }

    #[async_trait]
    impl TestRepository for FlakyTests {
        async fn create(&self, _test: &AbTest) -> DomainResult<()> {
            Ok(())
        }

        async fn get(&self, _id: Uuid) -> DomainResult<Option<AbTest>> {
            Ok(None)
        }

        async fn list(&self, _filter: TestFilter) -> DomainResult<Vec<AbTest>> {
            if self.script.lock().unwrap().pop_front().unwrap_or(false) {
                Ok(Vec::new())
            } else {
                Err(DomainError::DatabaseError("database is locked".to_string()))
            }
        }

        async fn update_status(&self, _id: Uuid, _status: TestStatus) -> DomainResult<bool> {
            Ok(false)
        }

        async fn set_blocked(&self, _id: Uuid, _blocked: bool) -> DomainResult<()> {
            Ok(())
        }
    }

    async fn daemon_with_one_finishing_test(config: SweepDaemonConfig) -> (SweepDaemon, Arc<SqliteTestRepository>, Uuid) {
        let pool = create_migrated_test_pool().await.unwrap();
        let tests = Arc::new(SqliteTestRepository::new(pool.clone()));
        let variations = Arc::new(SqliteVariationRepository::new(pool));

        let test = AbTest::new("Mug colours").with_status(TestStatus::Active);
        tests.create(&test).await.unwrap();
        variations
            .upsert(&Variation::new(test.id, VariationType::A).dispatched("study-a"))
            .await
            .unwrap();

        let reconciler = CompletionReconciler::new(
            tests.clone(),
            variations,
            Arc::new(ScriptedProvider::new().status("study-a", ProviderStudyStatus::Completed)),
            Arc::new(RecordingNotifier::new()),
            ReconcilerConfig::default(),
        );
        (SweepDaemon::new(Arc::new(reconciler), config), tests, test.id)
    }

    #[test]
    fn test_config_from_reconcile_section() {
        let reconcile = ReconcileConfig {
            sweep_interval_secs: 3600,
            run_on_startup: false,
            max_consecutive_failures: 2,
            ..ReconcileConfig::default()
        };
        let config = SweepDaemonConfig::from(&reconcile);
        assert_eq!(config.sweep_interval, Duration::from_secs(3600));
        assert!(!config.run_on_startup);
        assert_eq!(config.max_consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_run_once_sweeps() {
        let (daemon, tests, test_id) = daemon_with_one_finishing_test(SweepDaemonConfig::default()).await;
        let report = daemon.run_once().await.unwrap();
        assert_eq!(report.tests_completed, 1);
        assert_eq!(tests.get(test_id).await.unwrap().unwrap().status, TestStatus::Complete);
    }

    #[tokio::test]
    async fn test_startup_sweep_then_stop() {
        let (daemon, tests, test_id) = daemon_with_one_finishing_test(SweepDaemonConfig::default()).await;
        let handle = daemon.handle();
        let mut events = daemon.run();

        assert!(matches!(events.recv().await, Some(SweepDaemonEvent::Started)));
        assert!(matches!(
            events.recv().await,
            Some(SweepDaemonEvent::SweepStarted { run_number: 1 })
        ));
        match events.recv().await {
            Some(SweepDaemonEvent::SweepCompleted { report, .. }) => assert_eq!(report.tests_completed, 1),
            other => panic!("unexpected event: {other:?}"),
        }

        handle.stop();
        match events.recv().await {
            Some(SweepDaemonEvent::Stopped { reason }) => assert_eq!(reason, StopReason::Requested),
            other => panic!("unexpected event: {other:?}"),
        }

        let status = handle.status().await;
        assert!(!status.running);
        assert_eq!(status.successful_runs, 1);
        assert_eq!(status.tests_completed, 1);
        assert_eq!(tests.get(test_id).await.unwrap().unwrap().status, TestStatus::Complete);
    }

    #[tokio::test]
    async fn test_failed_sweeps_retry_then_stop_after_limit() {
        let pool = create_migrated_test_pool().await.unwrap();
        let reconciler = CompletionReconciler::new(
            Arc::new(FlakyTests::new(&[false, true, false, false])),
            Arc::new(SqliteVariationRepository::new(pool)),
            Arc::new(ScriptedProvider::new()),
            Arc::new(RecordingNotifier::new()),
            ReconcilerConfig::default(),
        );
        let daemon = SweepDaemon::new(
            Arc::new(reconciler),
            SweepDaemonConfig {
                sweep_interval: Duration::from_millis(20),
                run_on_startup: true,
                max_consecutive_failures: 2,
            },
        );
        let handle = daemon.handle();
        let mut events = daemon.run();

        let mut outcomes = Vec::new();
        let stopped = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = events.recv().await {
                match event {
                    SweepDaemonEvent::SweepFailed { run_number, .. } => outcomes.push((run_number, false)),
                    SweepDaemonEvent::SweepCompleted { run_number, .. } => outcomes.push((run_number, true)),
                    SweepDaemonEvent::Stopped { reason } => return Some(reason),
                    SweepDaemonEvent::Started | SweepDaemonEvent::SweepStarted { .. } => {}
                }
            }
            None
        })
        .await
        .unwrap();

        // One failure, a success that resets the count, then two failures in a row.
        assert_eq!(outcomes, vec![(1, false), (2, true), (3, false), (4, false)]);
        assert_eq!(stopped, Some(StopReason::TooManyFailures));

        let status = handle.status().await;
        assert!(!status.running);
        assert_eq!(status.total_runs, 4);
        assert_eq!(status.successful_runs, 1);
        assert_eq!(status.failed_runs, 3);
    }

    #[tokio::test]
    async fn test_stop_signal_wakes_waiters() {
        let signal = StopSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.stopped().await })
        };
        signal.stop();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_stopped());
    }
}
