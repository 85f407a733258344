use std::sync::LazyLock;

use regex::Regex;

static EXIT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)exit\((.*)\)").expect("valid exit call regex"));
static SEARCH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"search\(['"](.*?)['"]\)"#).expect("valid search call regex"));
static FETCH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"fetch\(['"](.*?)['"]\)"#).expect("valid fetch call regex"));
static RESPOND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"respond\(['"](.*?)['"]\)"#).expect("valid respond call regex"));

pub const DEFAULT_STATUS: &str = "Thinking...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    /// Cleaned JSON payload of `exit([...])`.
    Exit(String),
    Search(String),
    Fetch(String),
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub call: AgentCall,
    pub status: String,
}

/// Picks the call a reply ends with. `exit` wins over `search`, which wins
/// over `fetch`.
pub fn parse_reply(reply: &str) -> ParsedReply {
    let status = capture(&RESPOND_REGEX, reply)
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .unwrap_or(DEFAULT_STATUS)
        .to_string();

    let call = if let Some(payload) = exit_payload(reply) {
        AgentCall::Exit(payload)
    } else if let Some(query) = capture(&SEARCH_REGEX, reply) {
        AgentCall::Search(query.trim().to_string())
    } else if let Some(url) = capture(&FETCH_REGEX, reply) {
        AgentCall::Fetch(url.trim().to_string())
    } else {
        AgentCall::Missing
    };

    ParsedReply { call, status }
}

/// The `exit` argument runs to the last closing parenthesis, so `respond`
/// calls are removed first to keep a trailing status out of the payload.
pub fn exit_payload(reply: &str) -> Option<String> {
    let without_status = RESPOND_REGEX.replace_all(reply, "");
    capture(&EXIT_REGEX, &without_status).map(clean_json_payload)
}

fn clean_json_payload(raw: &str) -> String {
    raw.replace("```json", "").replace("```", "").trim().to_string()
}

fn capture<'a>(regex: &Regex, text: &'a str) -> Option<&'a str> {
    regex
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}
