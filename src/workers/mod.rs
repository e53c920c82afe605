pub mod daily_maintenance;
pub mod weekly_maintenance;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::WorkerConfig;
use crate::lex::LexEngine;

/// Timeout for a single maintenance invocation.
const WORKER_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    DailyMaintenance,
    WeeklyMaintenance,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DailyMaintenance => "daily_maintenance",
            Self::WeeklyMaintenance => "weekly_maintenance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: String,
}

/// The external caller of the maintenance jobs: a cron scheduler that only
/// runs on the leader instance.
pub struct WorkerManager {
    engine: Arc<LexEngine>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
}

impl WorkerManager {
    pub fn new(
        engine: Arc<LexEngine>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            engine,
            shutdown_rx,
            config: config.clone(),
        }
    }

    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }
        vec![
            JobSpec {
                name: WorkerName::DailyMaintenance,
                cron: self.config.daily_maintenance_cron.clone(),
            },
            JobSpec {
                name: WorkerName::WeeklyMaintenance,
                cron: self.config.weekly_maintenance_cron.clone(),
            },
        ]
    }

    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        self.register_jobs(&scheduler).await;
        scheduler.start().await?;

        tracing::info!("Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            "Worker manager shutting down, draining for {}s",
            DRAIN_TIMEOUT.as_secs()
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in self.planned_jobs() {
            let engine = self.engine.clone();
            let name = spec.name.as_str();

            match spec.name {
                WorkerName::DailyMaintenance => {
                    add_job(scheduler, &spec.cron, name, move || {
                        let engine = engine.clone();
                        async move { daily_maintenance::run(&engine).await }
                    })
                    .await;
                }
                WorkerName::WeeklyMaintenance => {
                    add_job(scheduler, &spec.cron, name, move || {
                        let engine = engine.clone();
                        async move { weekly_maintenance::run(&engine).await }
                    })
                    .await;
                }
            }
            tracing::info!(name, cron = %spec.cron, "Registered worker");
        }
    }
}

/// Overlapping invocations are skipped; each run is bounded by `WORKER_TIMEOUT`.
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                worker = name,
                "Skipping worker invocation: previous run still in progress"
            );
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error = %err, cron, worker = name, "Failed to create worker job"),
    }
}
