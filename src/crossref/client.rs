use std::time::Duration;

use reqwest::blocking::Client;
use tracing::{debug, instrument};

use super::model::{CitationCount, Envelope, WorkList};
use super::{Work, WorkSource, BOOK_TYPES};
use crate::citations::CitationSource;
use crate::config::CrossrefConfig;
use crate::rate_limit::RateLimiter;
use crate::{Error, Result};

const DOI_PREFIX: &str = "https://doi.org/";

/// Blocking client for the Crossref REST API.
///
/// Work searches are spaced by the configured rate limit. Citation lookups
/// are not, the caller paces those.
#[derive(Debug)]
pub struct CrossrefClient {
    http: Client,
    base_url: String,
    mailto: String,
    limiter: RateLimiter,
}

impl CrossrefClient {
    pub fn new(config: &CrossrefConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(format!(
                "bibkeeper/{} (mailto:{})",
                env!("CARGO_PKG_VERSION"),
                config.mailto
            ))
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mailto: config.mailto.clone(),
            limiter: RateLimiter::new(config.rate_limit()),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<T> {
        let mut request = self.http.get(url).query(query);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request.send()?;
        debug!("GET {} -> {}", response.url(), response.status());
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                service: "Crossref",
                status: status.as_u16(),
            });
        }
        Ok(response.json()?)
    }
}

/// Strips a resolver prefix so the DOI can be used as a path segment.
fn bare_doi(doi: &str) -> &str {
    let doi = doi.trim();
    doi.strip_prefix(DOI_PREFIX).unwrap_or(doi)
}

impl WorkSource for CrossrefClient {
    #[instrument(skip(self))]
    fn search_works(&mut self, author_query: &str, rows: usize) -> Result<Vec<Work>> {
        self.limiter.acquire();
        let filter = BOOK_TYPES
            .iter()
            .map(|kind| format!("type:{kind}"))
            .collect::<Vec<_>>()
            .join(",");
        let query = [
            ("query.author", author_query.to_string()),
            ("filter", filter),
            ("rows", rows.to_string()),
            ("mailto", self.mailto.clone()),
        ];
        let url = format!("{}/works", self.base_url);
        let envelope: Envelope<WorkList> = self.get_json(&url, &query, None)?;
        Ok(envelope.message.items)
    }
}

impl CitationSource for CrossrefClient {
    #[instrument(skip(self))]
    fn citation_count(&self, doi: &str) -> Result<u64> {
        let url = format!("{}/works/{}", self.base_url, bare_doi(doi));
        let envelope: Envelope<CitationCount> =
            self.get_json(&url, &[], Some(Duration::from_secs(10)))?;
        Ok(envelope.message.is_referenced_by_count)
    }
}
