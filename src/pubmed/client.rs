use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{parse_efetch, PubMedSource, Publication};
use crate::config::PubMedConfig;
use crate::rate_limit::RateLimiter;
use crate::{Error, Result};

/// `efetch` returns whole records, so it is given more time than a search.
const FETCH_TIMEOUT_FACTOR: u32 = 2;

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

/// Blocking client for the NCBI E-utilities `esearch` and `efetch` endpoints.
#[derive(Debug)]
pub struct EutilsClient {
    http: Client,
    base_url: String,
    email: String,
    api_key: Option<String>,
    timeout: Duration,
    limiter: RateLimiter,
}

impl EutilsClient {
    pub fn new(config: &PubMedConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("bibkeeper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            timeout: config.timeout(),
            limiter: RateLimiter::new(config.rate_limit()),
        })
    }

    fn params(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if !self.email.is_empty() {
            params.push(("email", self.email.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    fn get(
        &mut self,
        endpoint: &str,
        params: Vec<(&'static str, String)>,
        timeout: Duration,
    ) -> Result<reqwest::blocking::Response> {
        self.limiter.acquire();
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&self.params(params))
            .timeout(timeout)
            .send()?;
        debug!("GET {} -> {}", response.url(), response.status());
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Api {
                service: "PubMed",
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl PubMedSource for EutilsClient {
    #[instrument(skip(self))]
    fn search(&mut self, query: &str, retmax: usize, mindate: Option<&str>) -> Result<Vec<String>> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmode", "json".to_string()),
            ("retmax", retmax.to_string()),
        ];
        if let Some(mindate) = mindate {
            params.push(("mindate", mindate.to_string()));
            params.push(("datetype", "pdat".to_string()));
        }
        let timeout = self.timeout;
        let response: SearchResponse = self.get("esearch.fcgi", params, timeout)?.json()?;
        Ok(response.esearchresult.idlist)
    }

    #[instrument(skip(self, pmids), fields(count = pmids.len()))]
    fn fetch(&mut self, pmids: &[String]) -> Result<Vec<Publication>> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        let params = vec![
            ("db", "pubmed".to_string()),
            ("id", pmids.join(",")),
            ("retmode", "xml".to_string()),
        ];
        let timeout = self.timeout * FETCH_TIMEOUT_FACTOR;
        let xml = self.get("efetch.fcgi", params, timeout)?.text()?;
        parse_efetch(&xml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_carry_credentials() {
        let config = PubMedConfig {
            api_key: Some("secret".to_string()),
            ..PubMedConfig::default()
        };
        let client = EutilsClient::new(&config).unwrap();
        let params = client.params(vec![("db", "pubmed".to_string())]);
        assert_eq!(
            params,
            vec![
                ("db", "pubmed".to_string()),
                ("email", "bibliography@radboudumc.nl".to_string()),
                ("api_key", "secret".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let config = PubMedConfig {
            api_key: Some(String::new()),
            email: String::new(),
            ..PubMedConfig::default()
        };
        let client = EutilsClient::new(&config).unwrap();
        assert!(client.params(Vec::new()).is_empty());
    }
}
