//! Pulls one value out of a fetched page.
//!
//! The selector picks candidate elements in document order; the pattern runs
//! against each element's text and the last element visited decides the
//! outcome.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

use crate::scraper::FetchResult;

/// Value recorded when the selector matched but the pattern captured nothing.
pub const NO_MATCH_VALUE: &str = "N/A";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Value(String),
    NoMatch,
    FetchFailed(String),
    SelectorNotFound,
    /// Selector or pattern failed to compile.
    Invalid(String),
}

impl ExtractionOutcome {
    /// The value compared against the expected one, if the page yielded any.
    pub fn observed_value(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Value(value) => Some(value),
            ExtractionOutcome::NoMatch => Some(NO_MATCH_VALUE),
            _ => None,
        }
    }
}

pub fn parse_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("invalid selector '{}': {:?}", selector, e))
}

pub fn parse_pattern(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid regex '{}': {}", pattern, e))
}

/// Elements matching `selector`, in document order.
pub fn query<'a>(document: &'a Html, selector: &Selector) -> Vec<ElementRef<'a>> {
    document.select(selector).collect()
}

/// Concatenated text nodes of the element, untrimmed.
pub fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

pub fn extract_from_element(element: &ElementRef<'_>, pattern: &Regex) -> ExtractionOutcome {
    let text = element_text(element);
    match pattern.captures(&text).and_then(|captures| captures.get(1)) {
        Some(group) => ExtractionOutcome::Value(group.as_str().to_string()),
        None => ExtractionOutcome::NoMatch,
    }
}

pub fn extract_from_document(document: &Html, selector: &Selector, pattern: &Regex) -> ExtractionOutcome {
    query(document, selector)
        .iter()
        .map(|element| extract_from_element(element, pattern))
        .last()
        .unwrap_or(ExtractionOutcome::SelectorNotFound)
}

pub fn extract(fetched: &FetchResult, selector: &str, pattern: &str) -> ExtractionOutcome {
    let page = match fetched {
        Ok(page) => page,
        Err(e) => return ExtractionOutcome::FetchFailed(e.to_string()),
    };

    let selector = match parse_selector(selector) {
        Ok(selector) => selector,
        Err(reason) => return ExtractionOutcome::Invalid(reason),
    };
    let pattern = match parse_pattern(pattern) {
        Ok(pattern) => pattern,
        Err(reason) => return ExtractionOutcome::Invalid(reason),
    };

    let document = Html::parse_document(&page.body);
    extract_from_document(&document, &selector, &pattern)
}
