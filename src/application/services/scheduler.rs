use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::application::config::SchedulerConfig;
use crate::application::services::alerts::AlertService;
use crate::application::services::dispatch::DispatchService;
use crate::application::services::discovery::DiscoveryService;
use crate::application::services::evaluator::EvaluatorService;
use crate::application::services::poller::PollerService;
use crate::application::services::retention::CleanupService;
use crate::application::services::summary::SummaryService;

/// Runs every recurring job on its own interval.
///
/// Each job ticks independently; a tick that arrives while the previous
/// run of the same job is still in flight is skipped, so a slow fleet
/// poll can never pile up behind itself.
pub struct Scheduler {
    poller: PollerService,
    discovery: Option<DiscoveryService>,
    evaluator: EvaluatorService,
    dispatcher: DispatchService,
    alert_manager: AlertService,
    summary: SummaryService,
    cleanup: CleanupService,
    config: SchedulerConfig,
}

impl Scheduler {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        poller: PollerService,
        discovery: Option<DiscoveryService>,
        evaluator: EvaluatorService,
        dispatcher: DispatchService,
        alert_manager: AlertService,
        summary: SummaryService,
        cleanup: CleanupService,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            poller,
            discovery,
            evaluator,
            dispatcher,
            alert_manager,
            summary,
            cleanup,
            config,
        }
    }

    /// Run until Ctrl+C, then abort every job and return.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown signal cannot be installed.
    pub async fn run(self) -> anyhow::Result<()> {
        let jobs = self.start();
        tracing::info!("scheduler started with {} job(s)", jobs.len());

        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown signal received, stopping jobs");
        for job in jobs {
            job.abort();
        }
        Ok(())
    }

    /// Spawn every job onto the current runtime. The first tick of each
    /// interval fires immediately.
    pub fn start(self) -> Vec<JoinHandle<()>> {
        let mut jobs = vec![];
        let cfg = self.config.clone();

        let poller = self.poller.clone();
        jobs.push(spawn_job("poll", cfg.poll_secs, move || {
            let poller = poller.clone();
            async move {
                if let Err(e) = poller.run_cycle().await {
                    tracing::error!("poll cycle failed: {e}");
                }
            }
        }));

        let poller = self.poller;
        jobs.push(spawn_job("supplies", cfg.supplies_secs, move || {
            let poller = poller.clone();
            async move {
                if let Err(e) = poller.refresh_supplies().await {
                    tracing::error!("supply refresh failed: {e}");
                }
            }
        }));

        if let Some(discovery) = self.discovery {
            jobs.push(spawn_job("discovery", cfg.discovery_secs, move || {
                let discovery = discovery.clone();
                async move {
                    if let Err(e) = discovery.run_sweep().await {
                        tracing::error!("discovery sweep failed: {e}");
                    }
                }
            }));
        }

        let evaluator = self.evaluator.clone();
        jobs.push(spawn_job("evaluate", cfg.evaluate_secs, move || {
            let evaluator = evaluator.clone();
            blocking("evaluate", move || evaluator.run_once(Utc::now()))
        }));

        let evaluator = self.evaluator;
        jobs.push(spawn_job("maintenance", cfg.maintenance_secs, move || {
            let evaluator = evaluator.clone();
            blocking("maintenance", move || evaluator.run_maintenance(Utc::now()))
        }));

        let dispatcher = self.dispatcher;
        jobs.push(spawn_job("dispatch", cfg.dispatch_secs, move || {
            let dispatcher = dispatcher.clone();
            blocking("dispatch", move || dispatcher.sweep(Utc::now()))
        }));

        let alert_manager = self.alert_manager;
        jobs.push(spawn_job("reconcile", cfg.sweep_secs, move || {
            let alert_manager = alert_manager.clone();
            blocking("reconcile", move || alert_manager.reconcile(Utc::now()))
        }));

        let summary = self.summary;
        jobs.push(spawn_job("summary", cfg.summary_secs, move || {
            let summary = summary.clone();
            blocking("summary", move || summary.run_once(Utc::now()))
        }));

        let cleanup = self.cleanup;
        jobs.push(spawn_job("cleanup", cfg.cleanup_secs, move || {
            let cleanup = cleanup.clone();
            blocking("cleanup", move || cleanup.run_once(Utc::now()))
        }));

        jobs
    }
}

/// Run a synchronous job body off the async runtime and log its outcome.
async fn blocking<T, E, F>(name: &'static str, body: F)
where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    match tokio::task::spawn_blocking(body).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => tracing::error!("{name} pass failed: {e}"),
        Err(e) => tracing::error!("{name} task panicked: {e}"),
    }
}

/// Tick `job` every `period_secs`, skipping ticks that land while the
/// previous run is still in flight. The body runs on a detached task, so
/// aborting the returned handle stops future ticks but lets an in-flight
/// run finish.
fn spawn_job<F, Fut>(name: &'static str, period_secs: u64, job: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(period_secs.max(1)));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let running = Arc::new(AtomicBool::new(false));

        loop {
            interval.tick().await;
            if running
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                tracing::debug!("{name} is still running, tick skipped");
                continue;
            }
            let done = running.clone();
            let work = job();
            tokio::spawn(async move {
                work.await;
                done.store(false, Ordering::SeqCst);
            });
        }
    })
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::application::config::SnmpConfig;
    use crate::application::services::ingest::IngestService;
    use crate::application::services::poller::test_support::ScriptedAgent;
    use crate::domain::entities::device::{Device, DeviceStatus};
    use crate::domain::ports::protocol::ProtocolValue;
    use crate::domain::ports::store::{DeviceStore, SampleStore};
    use crate::infrastructure::persistence::in_memory_store::InMemoryStore;
    use crate::infrastructure::snmp::oids;

    fn make_scheduler(store: &Arc<InMemoryStore>, config: SchedulerConfig) -> Scheduler {
        let agent = Arc::new(
            ScriptedAgent::new().with_value(oids::DEVICE_STATUS, ProtocolValue::Integer(2)),
        );
        let ingest = Arc::new(IngestService::new(
            store.clone(),
            store.clone(),
            store.clone(),
        ));
        let poller = PollerService::new(
            agent,
            store.clone(),
            store.clone(),
            ingest,
            SnmpConfig::default(),
        );
        let dispatcher =
            DispatchService::new(store.clone(), store.clone(), store.clone(), vec![], 3);
        let alert_manager =
            AlertService::new(store.clone(), store.clone(), dispatcher.clone());
        let evaluator = EvaluatorService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            alert_manager.clone(),
        );
        let summary = SummaryService::new(store.clone(), store.clone(), store.clone());
        let cleanup = CleanupService::new(store.clone(), store.clone(), 90);
        Scheduler::new(
            poller,
            None,
            evaluator,
            dispatcher,
            alert_manager,
            summary,
            cleanup,
            config,
        )
    }

    #[tokio::test]
    async fn jobs_fire_immediately_after_start() {
        let store = Arc::new(InMemoryStore::new());
        let device = store
            .add_device(&Device {
                id: 0,
                name: "print-lab".into(),
                model: "LaserJet M404".into(),
                serial_number: "CN777".into(),
                address: "10.0.0.1".parse().expect("ip"),
                snmp_community: "public".into(),
                snmp_port: 161,
                location: None,
                is_monitored: true,
                status: DeviceStatus::Active,
                last_seen: None,
                created_at: Utc::now(),
            })
            .expect("device");

        let scheduler = make_scheduler(&store, SchedulerConfig::default());
        let jobs = scheduler.start();
        // Every interval's first tick is immediate.
        tokio::time::sleep(Duration::from_millis(200)).await;
        for job in jobs {
            job.abort();
        }

        assert!(store.latest_sample(device.id).expect("sample").is_some());
    }

    #[tokio::test]
    async fn discovery_job_only_runs_when_enabled() {
        let store = Arc::new(InMemoryStore::new());
        let scheduler = make_scheduler(&store, SchedulerConfig::default());
        let jobs = scheduler.start();
        // poll, supplies, evaluate, maintenance, dispatch, reconcile,
        // summary, cleanup.
        assert_eq!(jobs.len(), 8);
        for job in jobs {
            job.abort();
        }
    }

    #[tokio::test]
    async fn overlapping_ticks_are_skipped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let job = spawn_job("slow", 1, move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                // Outlives several ticks.
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
        });

        tokio::time::sleep(Duration::from_millis(2500)).await;
        job.abort();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
