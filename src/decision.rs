use serde::{Deserialize, Serialize};

use crate::extractor::ExtractionOutcome;
use crate::models::NotificationStatus;

pub const SELECTOR_NOT_FOUND: &str = "selector not found";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Unchanged,
    Changed,
    Failed,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Unchanged => "unchanged",
            Classification::Changed => "changed",
            Classification::Failed => "failed",
        }
    }

    /// Status carried downstream; `None` for outcomes that stay silent.
    pub fn notification_status(&self) -> Option<NotificationStatus> {
        match self {
            Classification::Unchanged => None,
            Classification::Changed => Some(NotificationStatus::Changed),
            Classification::Failed => Some(NotificationStatus::Failed),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Decision {
    pub classification: Classification,
    pub message: Option<String>,
}

impl Decision {
    fn unchanged() -> Self {
        Self {
            classification: Classification::Unchanged,
            message: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            classification: Classification::Failed,
            message: Some(message.into()),
        }
    }

    pub fn should_notify(&self) -> bool {
        self.classification != Classification::Unchanged
    }
}

pub fn change_message(expected: &str, value: &str) -> String {
    format!("value changed from \"{}\" to \"{}\"", expected, value)
}

pub fn decide(outcome: &ExtractionOutcome, expected: &str) -> Decision {
    match outcome {
        ExtractionOutcome::FetchFailed(reason) => Decision::failed(reason.clone()),
        ExtractionOutcome::SelectorNotFound => Decision::failed(SELECTOR_NOT_FOUND),
        ExtractionOutcome::Invalid(reason) => Decision::failed(reason.clone()),
        ExtractionOutcome::Value(_) | ExtractionOutcome::NoMatch => {
            // observed_value is Some for both of these variants
            let value = outcome.observed_value().unwrap_or_default();
            if value == expected {
                Decision::unchanged()
            } else {
                Decision {
                    classification: Classification::Changed,
                    message: Some(change_message(expected, value)),
                }
            }
        }
    }
}
