use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::producer::ScanProducer;
use crate::Result;

/// Drives the scan producer from a cron schedule.
pub struct ScanScheduler {
    scheduler: JobScheduler,
    producer: Arc<ScanProducer>,
    schedule: String,
    job_id: Option<Uuid>,
}

impl ScanScheduler {
    pub async fn new(producer: Arc<ScanProducer>, config: &SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            producer,
            schedule: config.scan_schedule.clone(),
            job_id: None,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let producer = Arc::clone(&self.producer);

        let job = Job::new_async(self.schedule.as_str(), move |_uuid, _l| {
            let producer = Arc::clone(&producer);
            Box::pin(async move {
                tracing::debug!("Starting scheduled scan");
                match producer.scan().await {
                    Ok(count) => tracing::info!("Scheduled scan enqueued {} check requests", count),
                    Err(e) => tracing::error!("Scheduled scan failed: {}", e),
                }
            })
        })?;

        self.job_id = Some(self.scheduler.add(job).await?);
        self.scheduler.start().await?;
        tracing::info!("Scan scheduler started with schedule: {}", self.schedule);
        Ok(())
    }

    pub async fn next_run(&mut self) -> Result<Option<DateTime<Utc>>> {
        match self.job_id {
            Some(id) => Ok(self.scheduler.next_tick_for_job(id).await?),
            None => Ok(None),
        }
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("Scan scheduler shutdown");
        Ok(())
    }
}
