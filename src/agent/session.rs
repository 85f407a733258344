use serde_json::Value;
use tracing::{debug, info, warn};

use super::protocol::{self, AgentCall};
use super::{AgentEvent, ClientError, LanguageModel, PageFetcher, SearchHit, SearchKind, WebSearch};

pub const DEFAULT_MAX_ITERATIONS: usize = 20;
const MAX_SEARCH_HITS: usize = 30;
const FETCH_PREVIEW_CHARS: usize = 500;

const NOTE_INVALID_EXIT: &str = "\nSystem Note: Your last exit() call had invalid JSON. Try again.";
const NOTE_MISSING_CALL: &str =
    "\nSystem Note: You didn't call search(\"...\") or exit([...]). Please output a valid function call.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    pub topic: String,
    pub target_cards: u32,
    /// JSON text of the cards the set already has.
    pub existing_cards: String,
    pub max_iterations: usize,
    pub search_kind: SearchKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    Completed(Vec<Value>),
    Failed(String),
}

pub struct CardAgent<'a, M, S, F> {
    model: &'a M,
    search: &'a S,
    fetcher: &'a F,
}

impl<'a, M, S, F> CardAgent<'a, M, S, F>
where
    M: LanguageModel,
    S: WebSearch,
    F: PageFetcher,
{
    pub fn new(model: &'a M, search: &'a S, fetcher: &'a F) -> Self {
        Self {
            model,
            search,
            fetcher,
        }
    }

    /// Runs one generation session, reporting progress through `emit`. The
    /// last event emitted is always `Complete` or `Error`.
    pub fn run(&self, request: &AgentRequest, emit: &mut dyn FnMut(&AgentEvent)) -> AgentOutcome {
        if request.topic.trim().is_empty() {
            return fail(emit, "No prompt provided".to_string());
        }

        let mut context = String::new();

        for iteration in 1..=request.max_iterations {
            let prompt = build_prompt(request, &context, iteration);

            let reply = match self.model.ask(&prompt) {
                Ok(reply) => reply,
                Err(ClientError::RateLimited) => {
                    return fail(emit, "Rate limited by AI provider".to_string());
                }
                Err(err) => {
                    warn!(iteration, error = %err, "model request failed");
                    emit(&AgentEvent::Status("AI request failed, retrying...".to_string()));
                    context.push_str(&format!("\nSystem Note: the previous request failed ({err})."));
                    continue;
                }
            };

            let parsed = protocol::parse_reply(reply.trim());
            debug!(iteration, call = ?parsed.call, "model reply parsed");

            match parsed.call {
                AgentCall::Exit(payload) => match serde_json::from_str::<Vec<Value>>(&payload) {
                    Ok(cards) => return complete(emit, cards),
                    Err(err) => {
                        debug!(iteration, error = %err, "exit payload rejected");
                        emit(&AgentEvent::Status("AI malformed JSON, retrying...".to_string()));
                        context.push_str(NOTE_INVALID_EXIT);
                    }
                },
                AgentCall::Search(query) => {
                    emit(&AgentEvent::Status(parsed.status));
                    info!(iteration, query = %query, "searching");
                    let hits = match self.search.search(&query, request.search_kind) {
                        Ok(hits) => hits,
                        Err(err) => return fail(emit, err.to_string()),
                    };
                    context.push('\n');
                    context.push_str(&format_hits(&hits));
                }
                AgentCall::Fetch(url) => {
                    emit(&AgentEvent::Status(parsed.status));
                    info!(iteration, url = %url, "fetching page");
                    context.push_str(&self.fetch_note(&url));
                }
                AgentCall::Missing => {
                    emit(&AgentEvent::Status("AI formatting error, correcting...".to_string()));
                    context.push_str(NOTE_MISSING_CALL);
                }
            }
        }

        self.final_attempt(request, &context, emit)
    }

    fn final_attempt(
        &self,
        request: &AgentRequest,
        context: &str,
        emit: &mut dyn FnMut(&AgentEvent),
    ) -> AgentOutcome {
        info!(iterations = request.max_iterations, "iteration limit reached, forcing exit");

        let mut prompt = build_prompt(request, context, request.max_iterations);
        prompt.push_str(
            "\n This is your last iteration. You MUST use the exit([...]) function with the cards in JSON format.",
        );

        let reply = match self.model.ask(&prompt) {
            Ok(reply) => reply,
            Err(ClientError::RateLimited) => {
                return fail(emit, "Rate limited by AI provider".to_string());
            }
            Err(err) => return fail(emit, err.to_string()),
        };

        match protocol::exit_payload(&reply) {
            Some(payload) => match serde_json::from_str::<Vec<Value>>(&payload) {
                Ok(cards) => complete(emit, cards),
                Err(_) => fail(emit, "Final output was not valid JSON.".to_string()),
            },
            None => fail(
                emit,
                "Failed to generate cards within iteration limit.".to_string(),
            ),
        }
    }

    fn fetch_note(&self, url: &str) -> String {
        match self.fetcher.fetch(url) {
            Ok(page) if page.status == 200 => {
                let preview: String = page.body.chars().take(FETCH_PREVIEW_CHARS).collect();
                format!("\nFetched Content from {url}:\n{preview}\n")
            }
            Ok(page) => format!("\nFailed to fetch {url}: Status code {}\n", page.status),
            Err(err) => format!("\nError fetching {url}: {err}\n"),
        }
    }
}

fn complete(emit: &mut dyn FnMut(&AgentEvent), cards: Vec<Value>) -> AgentOutcome {
    info!(cards = cards.len(), "agent completed");
    emit(&AgentEvent::Complete(cards.clone()));
    AgentOutcome::Completed(cards)
}

fn fail(emit: &mut dyn FnMut(&AgentEvent), message: String) -> AgentOutcome {
    warn!(error = %message, "agent failed");
    emit(&AgentEvent::Error(message.clone()));
    AgentOutcome::Failed(message)
}

fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .take(MAX_SEARCH_HITS)
        .map(|hit| {
            format!(
                "[{}]({})\n{}",
                hit.title.as_deref().unwrap_or_default(),
                hit.url.as_deref().unwrap_or_default(),
                hit.description.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn build_prompt(request: &AgentRequest, context: &str, iteration: usize) -> String {
    let research = if context.is_empty() {
        "No data yet."
    } else {
        context
    };

    format!(
        "Topic: {topic}\n\
         Research so far: {research}\n\n\
         You are building educational flashcards. Gather enough information to write \
         {target} new cards, then finish. Existing cards (never repeat their content): {existing}\n\
         Iteration {iteration} of {max}. Prefer facts taken from your searches.\n\n\
         Explain your reasoning briefly, then end with exactly ONE of these calls:\n\
         1. search(\"query of at most five words\") to research the web.\n\
         2. fetch(\"url\") to read a page found through search.\n\
         3. exit([{{\"question\": \"...\", \"answer\": \"...\", \"image\": null}}, ...]) \
         with the finished cards as a JSON array.\n\
         Always also include respond(\"short status for the user\") describing what you are doing.\n",
        topic = request.topic,
        target = request.target_cards,
        existing = request.existing_cards,
        max = request.max_iterations,
    )
}
