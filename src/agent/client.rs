use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::{ClientError, FetchedPage, LanguageModel, PageFetcher, SearchHit, SearchKind, WebSearch};

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Credentials read from `keys.json`, a one-element array of
/// `{"hcai": .., "hcsearch": .., "model": ..}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiKeys {
    #[serde(rename = "hcai", default)]
    pub ai_key: String,
    #[serde(rename = "hcsearch", default)]
    pub search_key: String,
    #[serde(default)]
    pub model: String,
}

impl ApiKeys {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!(path = %path.display(), "keys file missing, clients are unconfigured");
            return Ok(Self::default());
        }

        let raw = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let entries: Vec<ApiKeys> = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(entries.into_iter().next().unwrap_or_default())
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// OpenAI-compatible chat completion endpoint.
pub struct ChatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(base_url: &str, keys: &ApiKeys) -> Result<Self> {
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: keys.ai_key.clone(),
            model: keys.model.clone(),
        })
    }
}

impl LanguageModel for ChatClient {
    fn ask(&self, prompt: &str) -> Result<String, ClientError> {
        if self.api_key.is_empty() || self.model.is_empty() {
            return Err(ClientError::NotConfigured("missing AI key or model".to_string()));
        }

        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });

        debug!(url = %url, prompt_chars = prompt.len(), "chat request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            if body.to_lowercase().contains("rate limit") {
                return Err(ClientError::RateLimited);
            }
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json()?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(ToOwned::to_owned)
            .ok_or_else(|| ClientError::Parse("missing choices[0].message.content".to_string()))
    }
}

pub struct SearchClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SearchClient {
    pub fn new(base_url: &str, keys: &ApiKeys) -> Result<Self> {
        Ok(Self {
            client: build_client(REQUEST_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: keys.search_key.clone(),
        })
    }
}

impl WebSearch for SearchClient {
    fn search(&self, query: &str, kind: SearchKind) -> Result<Vec<SearchHit>, ClientError> {
        if self.api_key.is_empty() {
            return Err(ClientError::NotConfigured("missing search key".to_string()));
        }

        let endpoint = match kind {
            SearchKind::Web => "web/search",
            SearchKind::Image => "images/search",
            SearchKind::News => "news/search",
        };
        let url = format!("{}/{endpoint}", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("q", query)])
            .bearer_auth(&self.api_key)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let payload: Value = response.json()?;
        let results = match kind {
            SearchKind::Web => &payload["web"]["results"],
            SearchKind::Image => &payload["results"],
            SearchKind::News => &payload["news"]["results"],
        };

        Ok(parse_hits(results))
    }
}

fn parse_hits(results: &Value) -> Vec<SearchHit> {
    results
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: build_client(FETCH_TIMEOUT)?,
        })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage, ClientError> {
        let response = self.client.get(url).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(FetchedPage { status, body })
    }
}
