use std::sync::Arc;
use tracing::{error, info};

use crate::models::CheckRequest;
use crate::queue::MessageQueue;
use crate::storage::SiteStore;
use crate::Result;

/// Enqueues one check request per eligible site.
pub struct ScanProducer {
    store: Arc<dyn SiteStore>,
    queue: Arc<dyn MessageQueue>,
}

impl ScanProducer {
    pub fn new(store: Arc<dyn SiteStore>, queue: Arc<dyn MessageQueue>) -> Self {
        Self { store, queue }
    }

    /// Returns how many requests were enqueued. Items that fail to serialize
    /// or enqueue are logged and skipped; only the store scan is fatal.
    pub async fn scan(&self) -> Result<usize> {
        let sites = self.store.scan_eligible().await?;
        info!(eligible = sites.len(), "scanning eligible sites");

        let mut enqueued = 0;
        for site in &sites {
            let request = CheckRequest::from(site);
            let body = match serde_json::to_string(&request) {
                Ok(body) => body,
                Err(e) => {
                    error!(site_id = %site.id, "failed to serialize check request: {}", e);
                    continue;
                }
            };

            match self.queue.send(&body).await {
                Ok(message_id) => {
                    info!(site_id = %site.id, %message_id, url = %site.url, "check request queued");
                    enqueued += 1;
                }
                Err(e) => error!(site_id = %site.id, "failed to send message to queue: {}", e),
            }
        }

        metrics::counter!("site_tracker_scan_enqueued_total").increment(enqueued as u64);
        info!("Checking {} sites", enqueued);
        Ok(enqueued)
    }
}
