use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{AppConfig, MailConfig, MailTransport};
use crate::mailer::{LogMailSender, MailSender, Mailer, SmtpMailSender};
use crate::producer::ScanProducer;
use crate::queue::{QueueConsumer, QueueSettings, SqliteQueue};
use crate::scheduler::ScanScheduler;
use crate::scraper::{HttpFetcher, PageFetcher};
use crate::storage::{connect, FsContentStore, SqliteSiteStore};
use crate::worker::ScrapeWorker;
use crate::Result;

/// Every pipeline component, wired against one database.
pub struct App {
    pub config: AppConfig,
    pub pool: SqlitePool,
    pub store: Arc<SqliteSiteStore>,
    pub check_requests: Arc<SqliteQueue>,
    pub notifications: Arc<SqliteQueue>,
    pub producer: Arc<ScanProducer>,
    pub worker: Arc<ScrapeWorker>,
    pub mailer: Arc<Mailer>,
}

impl App {
    pub async fn connect(config: AppConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(&config.scraper)?);
        let sender = build_mail_sender(&config.mail)?;
        Self::with_components(config, fetcher, sender).await
    }

    /// Same wiring as [`App::connect`] with the outbound edges supplied by the caller.
    pub async fn with_components(
        config: AppConfig,
        fetcher: Arc<dyn PageFetcher>,
        sender: Arc<dyn MailSender>,
    ) -> Result<Self> {
        let pool = connect(&config.database).await?;
        let settings = QueueSettings::from(&config.queues);

        let store = Arc::new(SqliteSiteStore::new(pool.clone()));
        let check_requests = Arc::new(SqliteQueue::new(pool.clone(), config.queues.check_requests.clone(), settings));
        let notifications = Arc::new(SqliteQueue::new(pool.clone(), config.queues.notifications.clone(), settings));

        let producer = Arc::new(ScanProducer::new(store.clone(), check_requests.clone()));

        let concurrency = config.scraper.max_concurrent_checks;
        let mut worker = ScrapeWorker::new(fetcher, store.clone(), notifications.clone(), concurrency);
        if let Some(dir) = &config.diagnostics.html_dir {
            info!("Keeping fetched documents in {}", dir);
            worker = worker.with_archive(Arc::new(FsContentStore::new(dir)));
        }

        let mailer = Arc::new(Mailer::new(sender, concurrency));

        Ok(Self {
            config,
            pool,
            store,
            check_requests,
            notifications,
            producer,
            worker: Arc::new(worker),
            mailer,
        })
    }

    pub fn worker_consumer(&self) -> QueueConsumer {
        QueueConsumer::new(
            self.check_requests.clone(),
            self.worker.clone(),
            self.config.queues.batch_size,
            Duration::from_millis(self.config.queues.poll_interval_ms),
        )
    }

    pub fn mail_consumer(&self) -> QueueConsumer {
        QueueConsumer::new(
            self.notifications.clone(),
            self.mailer.clone(),
            self.config.queues.batch_size,
            Duration::from_millis(self.config.queues.poll_interval_ms),
        )
    }

    pub async fn scheduler(&self) -> Result<ScanScheduler> {
        ScanScheduler::new(self.producer.clone(), &self.config.scheduler).await
    }
}

pub fn build_mail_sender(config: &MailConfig) -> Result<Arc<dyn MailSender>> {
    let sender: Arc<dyn MailSender> = match config.transport {
        MailTransport::Smtp => Arc::new(SmtpMailSender::new(config)?),
        MailTransport::Log => Arc::new(LogMailSender::new(config)),
    };
    Ok(sender)
}
