//! Search Backend Abstraction
//!
//! Research only ever calls `SearchBackend::search`. `CrossrefClient` queries the
//! public Crossref works API.

use crate::error::ApiError;
use crate::provider::build_http_client;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One unfiltered search hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawResult {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub doi: Option<String>,
    pub url: Option<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub venue: Option<String>,
}

/// Literature search collaborator
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawResult>, ApiError>;

    /// Name used in logs
    fn backend_name(&self) -> &str;
}

#[derive(Deserialize)]
struct WorksResponse {
    message: WorksMessage,
}

#[derive(Deserialize)]
struct WorksMessage {
    #[serde(default)]
    items: Vec<Work>,
}

#[derive(Deserialize)]
struct Work {
    #[serde(default)]
    title: Vec<String>,
    #[serde(default)]
    author: Vec<WorkAuthor>,
    issued: Option<DateParts>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
}

#[derive(Deserialize)]
struct WorkAuthor {
    given: Option<String>,
    family: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct DateParts {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i32>>>,
}

impl WorkAuthor {
    fn display_name(&self) -> Option<String> {
        let name = match (&self.given, &self.family, &self.name) {
            (Some(given), Some(family), _) => format!("{} {}", given.trim(), family.trim()),
            (None, Some(family), _) => family.trim().to_string(),
            (_, None, Some(name)) => name.trim().to_string(),
            _ => return None,
        };
        let name = name.trim().to_string();
        (!name.is_empty()).then_some(name)
    }
}

/// Client for the Crossref works API
pub struct CrossrefClient {
    client: Client,
    base_url: String,
    mailto: Option<String>,
    markup: Regex,
}

impl CrossrefClient {
    pub fn new(
        base_url: Option<String>,
        mailto: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = build_http_client(request_timeout)?;
        let markup = Regex::new(r"<[^>]+>")
            .map_err(|e| ApiError::ConfigError(format!("Invalid markup pattern: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or_else(|| "https://api.crossref.org".to_string())
                .trim_end_matches('/')
                .to_string(),
            mailto,
            markup,
        })
    }

    /// Remove JATS tags and collapse whitespace.
    fn strip_markup(&self, text: &str) -> String {
        let stripped = self.markup.replace_all(text, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn convert(&self, work: Work) -> RawResult {
        let year = work
            .issued
            .and_then(|issued| issued.date_parts.into_iter().next())
            .and_then(|parts| parts.into_iter().next().flatten());
        RawResult {
            title: work
                .title
                .into_iter()
                .next()
                .map(|t| self.strip_markup(&t))
                .unwrap_or_default(),
            authors: work.author.iter().filter_map(WorkAuthor::display_name).collect(),
            year,
            doi: work.doi,
            url: work.url,
            abstract_text: work
                .abstract_text
                .map(|a| self.strip_markup(&a))
                .unwrap_or_default(),
            venue: work.container_title.into_iter().next(),
        }
    }
}

#[async_trait]
impl SearchBackend for CrossrefClient {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawResult>, ApiError> {
        let url = format!("{}/works", self.base_url);
        let rows = max_results.to_string();
        let mut params = vec![("query", query), ("rows", rows.as_str())];
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.as_str()));
        }

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ApiError::SearchFailed(format!("Crossref request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ApiError::SearchFailed(format!(
                "Crossref returned status {}",
                status
            )));
        }

        let works: WorksResponse = response
            .json()
            .await
            .map_err(|e| ApiError::SearchFailed(format!("Failed to parse Crossref response: {}", e)))?;

        Ok(works
            .message
            .items
            .into_iter()
            .map(|work| self.convert(work))
            .collect())
    }

    fn backend_name(&self) -> &str {
        "crossref"
    }
}

// Scripted search backend for unit tests
#[cfg(test)]
pub struct MockSearch {
    results: std::collections::HashMap<String, Vec<RawResult>>,
    failing: Vec<String>,
    calls: parking_lot::Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockSearch {
    pub fn new() -> Self {
        Self {
            results: std::collections::HashMap::new(),
            failing: Vec::new(),
            calls: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(mut self, query: &str, results: Vec<RawResult>) -> Self {
        self.results.insert(query.to_string(), results);
        self
    }

    pub fn failing_on(mut self, query: &str) -> Self {
        self.failing.push(query.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl SearchBackend for MockSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<RawResult>, ApiError> {
        self.calls.lock().push(query.to_string());
        if self.failing.iter().any(|q| q == query) {
            return Err(ApiError::SearchFailed(format!("scripted failure for {}", query)));
        }
        Ok(self
            .results
            .get(query)
            .map(|r| r.iter().take(max_results).cloned().collect())
            .unwrap_or_default())
    }

    fn backend_name(&self) -> &str {
        "mock-search"
    }
}
