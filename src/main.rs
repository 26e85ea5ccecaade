use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use site_tracker::config::{LoggingConfig, MetricsConfig};
use site_tracker::models::CheckRequest;
use site_tracker::queue::QueueConsumer;
use site_tracker::storage::SiteStore;
use site_tracker::{App, AppConfig};

#[derive(Parser)]
#[command(name = "site-tracker", version, about = "Watches web pages for value changes and emails the owner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scheduler, scrape worker and mailer in one process
    Run,
    /// Enqueue a check request for every eligible site
    Scan,
    /// Consume check requests
    Work {
        /// Handle a single batch and exit
        #[arg(long)]
        once: bool,
    },
    /// Consume notifications and send email
    Mail {
        #[arg(long)]
        once: bool,
    },
    /// Check one stored site now
    Check { id: String },
    /// Fetch and extract without touching the store or queues
    Preview {
        #[arg(long)]
        url: String,
        #[arg(long)]
        selector: String,
        #[arg(long)]
        regex: String,
        #[arg(long, default_value = "")]
        expected: String,
    },
    /// Make a site eligible for checking again
    Rearm {
        id: String,
        /// Replace the expected value
        #[arg(long)]
        expected: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let _guard = init_tracing(&config.logging);
    init_metrics(&config.metrics);

    let app = App::connect(config).await?;

    match cli.command {
        Command::Run => run(&app).await?,
        Command::Scan => {
            let count = app.producer.scan().await?;
            println!("{}", scan_summary(count));
        }
        Command::Work { once } => consume(app.worker_consumer(), once).await?,
        Command::Mail { once } => consume(app.mail_consumer(), once).await?,
        Command::Check { id } => {
            let report = app.worker.check_site(&id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Preview {
            url,
            selector,
            regex,
            expected,
        } => {
            let request = CheckRequest {
                id: "preview".to_string(),
                url,
                selector,
                regex,
                expected,
                email: String::new(),
                should_check: true,
            };
            let inspection = app.worker.inspect(&request).await;
            println!("{}", serde_json::to_string_pretty(&inspection)?);
        }
        Command::Rearm { id, expected } => {
            let site = app.store.rearm(&id, expected.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&site)?);
        }
    }

    Ok(())
}

fn scan_summary(count: usize) -> String {
    format!("Checking {} sites", count)
}

async fn run(app: &App) -> Result<()> {
    info!("Starting site tracker");

    let mut scheduler = app.scheduler().await?;
    scheduler.start().await?;
    if let Some(next) = scheduler.next_run().await? {
        info!("Next scan at {}", next);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumers = [Arc::new(app.worker_consumer()), Arc::new(app.mail_consumer())];
    let handles: Vec<_> = consumers
        .into_iter()
        .map(|consumer| {
            let shutdown = shutdown_rx.clone();
            tokio::spawn(async move { consumer.run(shutdown).await })
        })
        .collect();

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    shutdown_tx.send(true)?;
    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Consumer task ended abnormally: {}", e);
        }
    }
    scheduler.shutdown().await?;

    Ok(())
}

async fn consume(consumer: QueueConsumer, once: bool) -> Result<()> {
    if once {
        let stats = consumer.poll_once().await?;
        println!(
            "Received {}, deleted {}, failed {}",
            stats.received, stats.deleted, stats.failed
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(async move { consumer.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    shutdown_tx.send(true)?;
    handle.await?;

    Ok(())
}

fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("site_tracker={},sqlx=warn", config.level)));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "site-tracker.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

fn init_metrics(config: &MetricsConfig) {
    if !config.enabled {
        return;
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => info!("Metrics exporter listening on {}", addr),
        Err(e) => warn!("Failed to install Prometheus recorder: {}", e),
    }
}
