use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use super::protocol::{AgentCall, DEFAULT_STATUS, parse_reply};
use super::*;

struct ScriptedModel {
    replies: RefCell<VecDeque<Result<String, ClientError>>>,
    prompts: RefCell<Vec<String>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<&str, ClientError>>) -> Self {
        Self {
            replies: RefCell::new(
                replies
                    .into_iter()
                    .map(|reply| reply.map(str::to_string))
                    .collect(),
            ),
            prompts: RefCell::new(Vec::new()),
        }
    }
}

impl LanguageModel for ScriptedModel {
    fn ask(&self, prompt: &str) -> Result<String, ClientError> {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Ok("I have nothing to add.".to_string()))
    }
}

#[derive(Default)]
struct FakeSearch {
    queries: RefCell<Vec<String>>,
}

impl WebSearch for FakeSearch {
    fn search(&self, query: &str, _kind: SearchKind) -> Result<Vec<SearchHit>, ClientError> {
        self.queries.borrow_mut().push(query.to_string());
        Ok(vec![SearchHit {
            title: Some("Ant facts".to_string()),
            url: Some("https://example.org/ants".to_string()),
            description: Some("Ants live in colonies".to_string()),
        }])
    }
}

#[derive(Default)]
struct FakeFetcher {
    calls: Cell<usize>,
}

impl PageFetcher for FakeFetcher {
    fn fetch(&self, url: &str) -> Result<FetchedPage, ClientError> {
        self.calls.set(self.calls.get() + 1);
        if url.contains("missing") {
            return Ok(FetchedPage {
                status: 404,
                body: String::new(),
            });
        }
        Ok(FetchedPage {
            status: 200,
            body: "x".repeat(2000),
        })
    }
}

fn request(max_iterations: usize) -> AgentRequest {
    AgentRequest {
        topic: "ants".to_string(),
        target_cards: 2,
        existing_cards: "[]".to_string(),
        max_iterations,
        search_kind: SearchKind::Web,
    }
}

fn run(
    model: &ScriptedModel,
    search: &FakeSearch,
    fetcher: &FakeFetcher,
    request: &AgentRequest,
) -> (AgentOutcome, Vec<AgentEvent>) {
    let mut events = Vec::new();
    let outcome = CardAgent::new(model, search, fetcher)
        .run(request, &mut |event: &AgentEvent| events.push(event.clone()));
    (outcome, events)
}

const EXIT_REPLY: &str = r#"Done researching.
respond("Exiting with 1 card")
exit([{"question": "What do ants live in?", "answer": "Colonies", "image": null}])"#;

#[test]
fn parse_reply_prefers_exit_then_search_then_fetch() {
    let parsed = parse_reply(r#"search("ant colonies") fetch("https://a.example") respond("Looking")"#);
    assert_eq!(parsed.call, AgentCall::Search("ant colonies".to_string()));
    assert_eq!(parsed.status, "Looking");

    let parsed = parse_reply(r#"fetch('https://a.example/page')"#);
    assert_eq!(
        parsed.call,
        AgentCall::Fetch("https://a.example/page".to_string())
    );
    assert_eq!(parsed.status, DEFAULT_STATUS);

    let parsed = parse_reply("exit([]) search(\"ignored\")");
    assert!(matches!(parsed.call, AgentCall::Exit(_)));

    assert_eq!(parse_reply("just thinking").call, AgentCall::Missing);
}

#[test]
fn exit_payload_strips_code_fences_and_trailing_status() {
    let reply = "exit(```json\n[{\"question\": \"Q\", \"answer\": \"A\"}]\n```)\nrespond(\"Done\")";
    let parsed = parse_reply(reply);
    assert_eq!(
        parsed.call,
        AgentCall::Exit(r#"[{"question": "Q", "answer": "A"}]"#.to_string())
    );
    assert_eq!(parsed.status, "Done");
}

#[test]
fn blank_respond_falls_back_to_default_status() {
    let parsed = parse_reply(r#"search("ants") respond("   ")"#);
    assert_eq!(parsed.status, DEFAULT_STATUS);
}

#[test]
fn exit_with_valid_cards_completes() {
    let model = ScriptedModel::new(vec![Ok(EXIT_REPLY)]);
    let (outcome, events) = run(&model, &FakeSearch::default(), &FakeFetcher::default(), &request(5));

    let AgentOutcome::Completed(cards) = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["answer"], "Colonies");
    assert_eq!(events, vec![AgentEvent::Complete(cards)]);
}

#[test]
fn exit_cards_are_forwarded_as_written() {
    let model = ScriptedModel::new(vec![Ok(
        r#"exit([{"question": "2 + 2", "answer": 4, "image": null, "hint": "sum"}])"#,
    )]);
    let (outcome, events) = run(&model, &FakeSearch::default(), &FakeFetcher::default(), &request(5));

    let expected = vec![json!({"question": "2 + 2", "answer": 4, "image": null, "hint": "sum"})];
    assert_eq!(outcome, AgentOutcome::Completed(expected.clone()));
    assert_eq!(events, vec![AgentEvent::Complete(expected)]);
}

#[test]
fn search_results_feed_the_next_prompt() {
    let model = ScriptedModel::new(vec![
        Ok(r#"I need facts. search("ant colonies") respond("Searching ant colonies")"#),
        Ok(EXIT_REPLY),
    ]);
    let search = FakeSearch::default();
    let (outcome, events) = run(&model, &search, &FakeFetcher::default(), &request(5));

    assert!(matches!(outcome, AgentOutcome::Completed(_)));
    assert_eq!(*search.queries.borrow(), vec!["ant colonies".to_string()]);
    assert_eq!(
        events[0],
        AgentEvent::Status("Searching ant colonies".to_string())
    );

    let prompts = model.prompts.borrow();
    assert!(prompts[0].contains("No data yet."));
    assert!(prompts[1].contains("[Ant facts](https://example.org/ants)\nAnts live in colonies"));
}

#[test]
fn fetch_results_are_truncated_or_reported() {
    let model = ScriptedModel::new(vec![
        Ok(r#"fetch("https://example.org/ants") respond("Reading")"#),
        Ok(r#"fetch("https://example.org/missing") respond("Reading more")"#),
        Ok(EXIT_REPLY),
    ]);
    let fetcher = FakeFetcher::default();
    let (outcome, _) = run(&model, &FakeSearch::default(), &fetcher, &request(5));

    assert!(matches!(outcome, AgentOutcome::Completed(_)));
    assert_eq!(fetcher.calls.get(), 2);

    let prompts = model.prompts.borrow();
    let preview = format!("Fetched Content from https://example.org/ants:\n{}\n", "x".repeat(500));
    assert!(prompts[1].contains(&preview));
    assert!(!prompts[1].contains(&"x".repeat(501)));
    assert!(prompts[2].contains("Failed to fetch https://example.org/missing: Status code 404"));
}

#[test]
fn malformed_exit_and_missing_calls_are_retried() {
    let model = ScriptedModel::new(vec![
        Ok("exit([{not json}])"),
        Ok("I forgot the protocol"),
        Ok(EXIT_REPLY),
    ]);
    let (outcome, events) = run(&model, &FakeSearch::default(), &FakeFetcher::default(), &request(5));

    assert!(matches!(outcome, AgentOutcome::Completed(_)));
    assert_eq!(
        events[..2],
        [
            AgentEvent::Status("AI malformed JSON, retrying...".to_string()),
            AgentEvent::Status("AI formatting error, correcting...".to_string()),
        ]
    );

    let prompts = model.prompts.borrow();
    assert!(prompts[1].contains("last exit() call had invalid JSON"));
    assert!(prompts[2].contains("Please output a valid function call"));
}

#[test]
fn rate_limit_stops_immediately() {
    let model = ScriptedModel::new(vec![Err(ClientError::RateLimited), Ok(EXIT_REPLY)]);
    let (outcome, events) = run(&model, &FakeSearch::default(), &FakeFetcher::default(), &request(5));

    assert_eq!(
        outcome,
        AgentOutcome::Failed("Rate limited by AI provider".to_string())
    );
    assert_eq!(
        events,
        vec![AgentEvent::Error("Rate limited by AI provider".to_string())]
    );
    assert_eq!(model.prompts.borrow().len(), 1);
}

#[test]
fn exhausted_iterations_force_a_final_exit() {
    let model = ScriptedModel::new(vec![Ok("thinking"), Ok("still thinking"), Ok(EXIT_REPLY)]);
    let (outcome, _) = run(&model, &FakeSearch::default(), &FakeFetcher::default(), &request(2));

    assert!(matches!(outcome, AgentOutcome::Completed(_)));
    let prompts = model.prompts.borrow();
    assert_eq!(prompts.len(), 3);
    assert!(prompts[2].contains("This is your last iteration"));
}

#[test]
fn exhausted_iterations_without_exit_fail() {
    let model = ScriptedModel::new(vec![Ok("thinking"), Ok("no exit here")]);
    let (outcome, events) = run(&model, &FakeSearch::default(), &FakeFetcher::default(), &request(1));

    assert_eq!(
        outcome,
        AgentOutcome::Failed("Failed to generate cards within iteration limit.".to_string())
    );
    assert_eq!(
        events.last(),
        Some(&AgentEvent::Error(
            "Failed to generate cards within iteration limit.".to_string()
        ))
    );
}

#[test]
fn empty_topic_is_rejected_without_calling_the_model() {
    let model = ScriptedModel::new(Vec::new());
    let mut request = request(5);
    request.topic = "  ".to_string();

    let (outcome, _) = run(&model, &FakeSearch::default(), &FakeFetcher::default(), &request);
    assert_eq!(outcome, AgentOutcome::Failed("No prompt provided".to_string()));
    assert!(model.prompts.borrow().is_empty());
}

#[test]
fn events_serialize_as_sse_frames() {
    assert_eq!(
        AgentEvent::Status("Searching".to_string()).to_sse_frame(),
        "data: {\"status\":\"Searching\"}\n\n"
    );
    assert_eq!(
        AgentEvent::Error("boom".to_string()).to_sse_frame(),
        "data: {\"error\":\"boom\"}\n\n"
    );

    let frame = AgentEvent::Complete(Vec::new()).to_json();
    assert_eq!(frame, json!({"status": "complete", "cards": []}));
}
