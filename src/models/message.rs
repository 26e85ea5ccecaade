use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::TrackedSite;

/// Snapshot of a tracked site, enqueued by the scan producer for one check.
///
/// Field names follow the queue wire format. Capitalised aliases accept
/// bodies written by older producers that serialised without field tags.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    #[serde(alias = "ID")]
    #[validate(length(min = 1, message = "id is required"))]
    pub id: String,
    #[serde(alias = "URL")]
    #[validate(url(message = "url must be a valid URL"))]
    pub url: String,
    #[serde(alias = "Selector")]
    #[validate(length(min = 1, message = "selector is required"))]
    pub selector: String,
    #[serde(alias = "Regex")]
    #[validate(length(min = 1, message = "regex is required"))]
    pub regex: String,
    #[serde(default, alias = "Expected")]
    pub expected: String,
    #[serde(default, alias = "Email")]
    pub email: String,
    #[serde(default, alias = "ShouldCheck")]
    pub should_check: bool,
}

impl CheckRequest {
    /// Parses and validates a queue body. Errors here mean the message is dropped.
    pub fn from_body(body: &str) -> crate::Result<Self> {
        let request: CheckRequest = serde_json::from_str(body)?;
        request.validate()?;
        Ok(request)
    }
}

impl From<&TrackedSite> for CheckRequest {
    fn from(site: &TrackedSite) -> Self {
        Self {
            id: site.id.clone(),
            url: site.url.clone(),
            selector: site.selector.clone(),
            regex: site.pattern.clone(),
            expected: site.expected.clone(),
            email: site.notify_target.clone(),
            should_check: site.eligible,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Changed,
    Failed,
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Changed => "changed",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Unspecified => "",
        }
    }
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message from the scrape worker to the mailer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: NotificationStatus,
}
