use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::generate_id;

/// One monitored page, as held in the entity store.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackedSite {
    pub id: String,
    pub url: String,
    pub selector: String,
    #[serde(rename = "regex")]
    #[sqlx(rename = "regex")]
    pub pattern: String,
    pub expected: String,
    #[serde(rename = "email")]
    #[sqlx(rename = "email")]
    pub notify_target: String,
    /// Due for checking. Cleared by the scrape worker, set again only by a re-arm.
    #[serde(rename = "shouldCheck")]
    #[sqlx(rename = "should_check")]
    pub eligible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrackedSite {
    pub url: String,
    pub selector: String,
    pub pattern: String,
    pub expected: String,
    pub notify_target: String,
}

impl TrackedSite {
    pub fn new(new_site: NewTrackedSite) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            url: new_site.url,
            selector: new_site.selector,
            pattern: new_site.pattern,
            expected: new_site.expected,
            notify_target: new_site.notify_target,
            eligible: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}
