//! HTTP client for the WFO Plant List GraphQL endpoint.

use crate::query;
use crate::{concept_id, suggestion_terms, LookupError, NameLookup};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::time::Duration;
use url::Url;
use wfo_pages_model::{parse_wfo_id, Name, Taxon};

pub const DEFAULT_API_URL: &str = "https://list.worldfloraonline.org/gql.php";
pub const DEFAULT_CLASSIFICATION_VERSION: &str = "2024-06";

/// Connection settings for [`WfoClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    /// Classification version appended to name ids, `yyyy-mm`.
    pub classification_version: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            classification_version: DEFAULT_CLASSIFICATION_VERSION.to_string(),
            timeout_secs: 30,
            user_agent: format!("wfo-pages/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct WfoClient {
    client: Client,
    api_url: Url,
    config: ClientConfig,
}

impl WfoClient {
    pub fn new(config: ClientConfig) -> Result<Self, LookupError> {
        let api_url = Url::parse(&config.api_url)
            .map_err(|e| LookupError::Client(format!("invalid api url {}: {e}", config.api_url)))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("wfo-pages")),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LookupError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn post_query(&self, query: &str) -> Result<Value, LookupError> {
        let url = self.api_url.as_str();
        tracing::debug!(%url, "posting graphql query");

        let resp = self
            .client
            .post(self.api_url.clone())
            .json(&query::request_body(query))
            .send()
            .map_err(|e| LookupError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(LookupError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Value>()
            .map_err(|e| LookupError::Decode(e.to_string()))
    }
}

impl NameLookup for WfoClient {
    fn suggest(&self, text: &str) -> Result<Vec<Name>, LookupError> {
        let Some(terms) = suggestion_terms(text) else {
            return Ok(Vec::new());
        };

        let result = self
            .post_query(&query::suggestion_query(terms))
            .and_then(query::decode_suggestions);
        match &result {
            Ok(names) => tracing::debug!(terms, count = names.len(), "name suggestions"),
            Err(e) => tracing::warn!(terms, "failed to find names: {e}"),
        }
        result
    }

    fn fetch_detail(&self, wfo_id: &str) -> Result<Taxon, LookupError> {
        let wfo_id = parse_wfo_id(wfo_id)?;
        let taxon_id = concept_id(&wfo_id, &self.config.classification_version);

        let result = self
            .post_query(&query::detail_query(&taxon_id))
            .and_then(query::decode_detail);
        match &result {
            Ok(_) => tracing::info!(%taxon_id, "fetched taxon"),
            Err(e) => tracing::warn!(%taxon_id, "failed to fetch taxon: {e}"),
        }
        result
    }
}
