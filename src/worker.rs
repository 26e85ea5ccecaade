//! Scrape worker: one check-request in, at most one notification out.
//!
//! Per request: fetch, extract, decide. A `changed` or `failed` decision
//! enqueues a notification and clears the site's should-check flag. The two
//! writes are independent: a failure in either is logged and the message
//! still completes. Redelivery of the same request can send a second email.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::decision::{decide, Classification, Decision};
use crate::extractor::{self, ExtractionOutcome};
use crate::models::{CheckRequest, Notification};
use crate::queue::{BatchHandler, BatchResponse, MessageQueue, QueueMessage};
use crate::scraper::{FetchResult, PageFetcher};
use crate::storage::{ContentStore, SiteStore};
use crate::utils::error::AppError;

pub const ITEM_NOT_FOUND: &str = "item not found";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckState {
    /// Unchanged; nothing written.
    SilentlyDone,
    NotifiedAndUpdated,
    /// Notification or flag update did not go through.
    PartiallyFailed,
    /// No such site in the store; nothing written.
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckReport {
    pub site_id: String,
    pub outcome: ExtractionOutcome,
    pub decision: Decision,
    pub state: CheckState,
    /// The notification could not be serialized; the delivery should be retried.
    pub retry: bool,
}

/// Fetch, extract and decide with no side effects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inspection {
    pub outcome: ExtractionOutcome,
    pub decision: Decision,
}

pub struct ScrapeWorker {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn SiteStore>,
    notifications: Arc<dyn MessageQueue>,
    archive: Option<Arc<dyn ContentStore>>,
    concurrency: usize,
}

impl ScrapeWorker {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn SiteStore>,
        notifications: Arc<dyn MessageQueue>,
        concurrency: usize,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifications,
            archive: None,
            concurrency: concurrency.max(1),
        }
    }

    /// Keep fetched documents of every non-unchanged check.
    pub fn with_archive(mut self, archive: Arc<dyn ContentStore>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub async fn inspect(&self, request: &CheckRequest) -> Inspection {
        self.run_inspection(request).await.0
    }

    async fn run_inspection(&self, request: &CheckRequest) -> (Inspection, FetchResult) {
        let fetched = self.fetcher.fetch(&request.url).await;
        let outcome = extractor::extract(&fetched, &request.selector, &request.regex);
        let decision = decide(&outcome, &request.expected);
        debug!(site_id = %request.id, ?outcome, classification = decision.classification.as_str(), "check decided");
        (Inspection { outcome, decision }, fetched)
    }

    /// Runs one check end to end.
    pub async fn check(&self, request: &CheckRequest) -> CheckReport {
        let (inspection, fetched) = self.run_inspection(request).await;
        let Inspection { outcome, decision } = inspection;

        metrics::counter!("site_tracker_checks_total", "classification" => decision.classification.as_str())
            .increment(1);

        let Some(status) = decision.classification.notification_status() else {
            info!(site_id = %request.id, "value unchanged");
            return CheckReport {
                site_id: request.id.clone(),
                outcome,
                decision,
                state: CheckState::SilentlyDone,
                retry: false,
            };
        };

        let notification = Notification {
            email: request.email.clone(),
            url: request.url.clone(),
            message: decision.message.clone().unwrap_or_default(),
            status,
        };

        let mut retry = false;
        let mut delivered = false;
        match serde_json::to_string(&notification) {
            Ok(payload) => match self.notifications.send(&payload).await {
                Ok(message_id) => {
                    info!(site_id = %request.id, %message_id, status = status.as_str(), "notification queued");
                    metrics::counter!("site_tracker_notifications_total", "result" => "queued").increment(1);
                    delivered = true;
                }
                Err(e) => {
                    error!(site_id = %request.id, "failed to send message to notification queue: {}", e);
                    metrics::counter!("site_tracker_notifications_total", "result" => "error").increment(1);
                }
            },
            // Not reachable with the current Notification fields
            Err(e) => {
                error!(site_id = %request.id, "failed to serialize notification: {}", e);
                retry = true;
            }
        }

        let updated = match self.store.set_should_check(&request.id, false).await {
            Ok(()) => true,
            Err(e) => {
                error!(site_id = %request.id, "failed to update should_check: {}", e);
                false
            }
        };

        if let Ok(page) = &fetched {
            self.archive_document(&request.id, page.body.as_bytes()).await;
        }

        CheckReport {
            site_id: request.id.clone(),
            outcome,
            decision,
            state: if delivered && updated {
                CheckState::NotifiedAndUpdated
            } else {
                CheckState::PartiallyFailed
            },
            retry,
        }
    }

    /// Loads a site from the store and checks it.
    pub async fn check_site(&self, id: &str) -> crate::Result<CheckReport> {
        match self.store.get(id).await {
            Ok(site) => Ok(self.check(&CheckRequest::from(&site)).await),
            Err(AppError::NotFound { .. }) => {
                warn!(site_id = id, "{}", ITEM_NOT_FOUND);
                Ok(CheckReport {
                    site_id: id.to_string(),
                    outcome: ExtractionOutcome::Invalid(ITEM_NOT_FOUND.to_string()),
                    decision: Decision {
                        classification: Classification::Failed,
                        message: Some(ITEM_NOT_FOUND.to_string()),
                    },
                    state: CheckState::NotFound,
                    retry: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn archive_document(&self, site_id: &str, content: &[u8]) {
        let Some(archive) = &self.archive else {
            return;
        };
        let key = format!("{}.html", site_id);
        match archive.put(&key, content).await {
            Ok(()) => debug!(site_id, %key, "uploaded document"),
            Err(e) => warn!(site_id, "failed to upload document: {}", e),
        }
    }

    async fn handle_message(&self, message: &QueueMessage) -> Option<String> {
        info!(message_id = %message.message_id, body = %message.body, "check request received");

        let request = match CheckRequest::from_body(&message.body) {
            Ok(request) => request,
            Err(e) => {
                // Dropped, not redelivered
                warn!(message_id = %message.message_id, "skipping malformed check request: {}", e);
                return None;
            }
        };

        let report = self.check(&request).await;
        batch_failure(&report, message)
    }
}

/// The id to put in the batch failure report, if this check asked for redelivery.
fn batch_failure(report: &CheckReport, message: &QueueMessage) -> Option<String> {
    report.retry.then(|| message.message_id.clone())
}

#[async_trait]
impl BatchHandler for ScrapeWorker {
    fn name(&self) -> &str {
        "scrape-worker"
    }

    async fn handle_batch(&self, messages: &[QueueMessage]) -> BatchResponse {
        let checks: Vec<_> = messages.iter().map(|message| self.handle_message(message)).collect();
        let failures: Vec<Option<String>> = stream::iter(checks)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut response = BatchResponse::default();
        for message_id in failures.into_iter().flatten() {
            response.fail(message_id);
        }
        response
    }
}
