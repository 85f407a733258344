//! Iterative flashcard generation driven by a language model.
//!
//! The model answers in free text and ends every reply with one call of a
//! tiny function protocol (`search`, `fetch`, `exit`, plus `respond` for a
//! status line). The session parses that call, runs it and feeds the result
//! back as research context until the model exits with a card list.

use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

mod client;
mod protocol;
mod session;
#[cfg(test)]
mod tests;

pub use client::{ApiKeys, ChatClient, HttpFetcher, SearchClient};
pub use session::{AgentOutcome, AgentRequest, CardAgent, DEFAULT_MAX_ITERATIONS};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("rate limited by provider")]
    RateLimited,
    #[error("API error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("client not configured: {0}")]
    NotConfigured(String),
}

pub trait LanguageModel {
    fn ask(&self, prompt: &str) -> Result<String, ClientError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Web,
    Image,
    News,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub trait WebSearch {
    fn search(&self, query: &str, kind: SearchKind) -> Result<Vec<SearchHit>, ClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

pub trait PageFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage, ClientError>;
}

/// Progress reported while a session runs. Completed cards are forwarded as
/// the model wrote them.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    Status(String),
    Complete(Vec<Value>),
    Error(String),
}

impl AgentEvent {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Status(status) => json!({ "status": status }),
            Self::Complete(cards) => json!({ "status": "complete", "cards": cards }),
            Self::Error(error) => json!({ "error": error }),
        }
    }

    /// Server-sent-event frame: `data: <json>` followed by a blank line.
    pub fn to_sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}
