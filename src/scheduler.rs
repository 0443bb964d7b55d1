use anyhow::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::{Duration, Instant, interval_at};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::cache::CharacterCache;
use crate::config::CacheConfig;

/// Periodically rebuilds the character cache.
///
/// Started once the first generation has been published; ticks only fire
/// `refresh_cache`, never `initialize`.
pub struct Scheduler {
    cache: Arc<CharacterCache>,
    config: CacheConfig,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    #[must_use]
    pub fn new(cache: Arc<CharacterCache>, config: CacheConfig) -> Self {
        Self {
            cache,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.scheduler_enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);
        info!("Starting cache refresh scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let cache = Arc::clone(&self.cache);
        let running = Arc::clone(&self.running);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let cache = Arc::clone(&cache);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !running.load(Ordering::SeqCst) {
                    return;
                }
                refresh_job(&cache).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Cache refresh scheduled with cron: {}", cron_expr);

        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let refresh_hours = self.config.refresh_interval_hours.max(1);
        let period = Duration::from_secs(u64::from(refresh_hours) * 60 * 60);

        info!("Cache refresh scheduled every {}h", refresh_hours);

        // The first generation is built at startup, so the first tick is one
        // full period away.
        let mut refresh_interval = interval_at(Instant::now() + period, period);

        loop {
            refresh_interval.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            refresh_job(&self.cache).await;
        }

        Ok(())
    }

    pub fn stop(&self) {
        info!("Stopping scheduler...");
        self.running.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs one refresh immediately, outside the schedule.
    pub async fn run_once(&self) -> Result<()> {
        info!("Running manual cache refresh...");
        self.cache.refresh_cache().await?;
        Ok(())
    }
}

async fn refresh_job(cache: &CharacterCache) {
    let start = std::time::Instant::now();
    info!(
        event = "job_started",
        job_name = "refresh_cache",
        "Starting scheduled cache refresh"
    );

    match cache.refresh_cache().await {
        Ok(stats) => info!(
            event = "job_finished",
            job_name = "refresh_cache",
            total = stats.total,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Scheduled cache refresh finished"
        ),
        Err(e) => {
            if cache.is_loaded() {
                error!(event = "job_failed", job_name = "refresh_cache", error = %e, "Scheduled cache refresh failed");
            } else {
                warn!(event = "job_skipped", job_name = "refresh_cache", error = %e, "Cache not initialized yet, skipping refresh");
            }
        }
    }
}
