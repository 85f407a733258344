use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::agent::{
    AgentEvent, AgentOutcome, AgentRequest, ApiKeys, CardAgent, ChatClient, HttpFetcher,
    SearchClient,
};
use crate::cli::GenerateArgs;
use crate::util::read_file;

pub fn run(args: GenerateArgs) -> Result<()> {
    let keys = ApiKeys::load(&args.data_root.join(&args.keys_path))?;
    let model = ChatClient::new(&args.llm_base_url, &keys)?;
    let search = SearchClient::new(&args.search_base_url, &keys)?;
    let fetcher = HttpFetcher::new()?;

    let existing_cards = match &args.cards {
        Some(path) => {
            let path = args.data_root.join(path);
            String::from_utf8(read_file(&path)?)
                .with_context(|| format!("{} is not valid UTF-8", path.display()))?
        }
        None => "[]".to_string(),
    };

    let request = AgentRequest {
        topic: args.message.clone(),
        target_cards: args.target,
        existing_cards,
        max_iterations: args.max_iterations,
        search_kind: args.search.kind(),
    };

    info!(
        topic = %request.topic,
        target = request.target_cards,
        max_iterations = request.max_iterations,
        "generation started"
    );

    let mut stdout = io::stdout().lock();
    let mut write_error = None;
    let outcome = CardAgent::new(&model, &search, &fetcher).run(&request, &mut |event: &AgentEvent| {
        if write_error.is_some() {
            return;
        }
        let written = stdout
            .write_all(event.to_sse_frame().as_bytes())
            .and_then(|()| stdout.flush());
        if let Err(err) = written {
            warn!(error = %err, "failed to write event");
            write_error = Some(err);
        }
    });

    if let Some(err) = write_error {
        return Err(err).context("failed to stream generation events");
    }

    match outcome {
        AgentOutcome::Completed(cards) => {
            info!(cards = cards.len(), "generation completed");
            Ok(())
        }
        AgentOutcome::Failed(message) => bail!("generation failed: {message}"),
    }
}
