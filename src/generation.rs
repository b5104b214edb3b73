//! Generation with memory: prompt assembly and the text-generation client.
//!
//! Retrieved memory text is prepended to the user's query as a context block;
//! the model is stopped at the next `User Query:` marker so it does not invent
//! the following turn.

use std::future::Future;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::memory::types::SearchHit;

/// Stop sequence passed with every prompt.
pub const STOP_MARKER: &str = "User Query:";

/// A text-generation capability.
pub trait Generator: Send + Sync {
    /// Continue `prompt`, producing at most `max_tokens` tokens and stopping
    /// early at any of `stop`.
    fn generate(
        &self,
        prompt: &str,
        max_tokens: usize,
        stop: &[&str],
    ) -> impl Future<Output = Result<String>> + Send;
}

/// `<context>\n\nUser Query: <query>\n\nResponse:`, without the context block
/// when there is none.
pub fn assemble_prompt(query: &str, context: Option<&str>) -> String {
    let tail = format!("{STOP_MARKER} {}\n\nResponse:", query.trim());
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!("{context}\n\n{tail}"),
        None => tail,
    }
}

/// Join retrieved entries, best first, into one context block.
pub fn context_from_hits(hits: &[SearchHit]) -> Option<String> {
    if hits.is_empty() {
        return None;
    }
    Some(
        hits.iter()
            .map(|hit| hit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n"),
    )
}

/// Answer `query`, optionally grounded in retrieved `context`. Returns the
/// trimmed generated text.
pub async fn answer<G: Generator>(
    generator: &G,
    query: &str,
    context: Option<&str>,
    max_tokens: usize,
) -> Result<String> {
    let prompt = assemble_prompt(query, context);
    tracing::debug!(
        prompt_chars = prompt.len(),
        with_context = context.is_some(),
        "sending prompt"
    );
    let text = generator.generate(&prompt, max_tokens, &[STOP_MARKER]).await?;
    Ok(text.trim().to_string())
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    n_predict: usize,
    stop: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: String,
}

/// Client for a llama.cpp-compatible server (`POST /completion`).
pub struct LlamaServerGenerator {
    client: reqwest::Client,
    endpoint: String,
}

impl LlamaServerGenerator {
    pub fn new(config: &GenerationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn completion_url(&self) -> String {
        format!("{}/completion", self.endpoint)
    }
}

impl Generator for LlamaServerGenerator {
    async fn generate(&self, prompt: &str, max_tokens: usize, stop: &[&str]) -> Result<String> {
        let url = self.completion_url();
        let response = self
            .client
            .post(&url)
            .json(&CompletionRequest {
                prompt,
                n_predict: max_tokens,
                stop,
            })
            .send()
            .await
            .with_context(|| format!("HTTP request failed for {url}"))?;

        anyhow::ensure!(
            response.status().is_success(),
            "generation failed with HTTP {}",
            response.status()
        );

        let body: CompletionResponse = response
            .json()
            .await
            .context("unexpected completion response")?;
        Ok(body.content)
    }
}
