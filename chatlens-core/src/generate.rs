//! External answer generation
//!
//! HTTP client for the Gemini `generateContent` API. The orchestrator treats
//! this path as best-effort: a single attempt per question, no retries, and
//! every failure is reported so the caller can fall back to the
//! statistics-based analyzer.

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::types::Message;
use serde_json::json;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

const PROMPT_HEADER: &str = "You are an assistant that analyzes group chat history. \
Answer the user's question using only the conversation data below.";

/// Text completion interface for the answer path.
///
/// The orchestrator only needs this one call; swapping the backing service
/// (or mocking it in tests) means implementing this trait.
pub trait AnswerGenerator: Send + Sync {
    fn generate(&self, question: &str, messages: &[Message]) -> Result<String>;
}

/// Create the default HTTP-backed generator.
///
/// Returns `None` when no API key is configured; the caller is expected to
/// serve answers from the fallback path alone in that case.
pub fn create_generator(config: &GeneratorConfig) -> Result<Option<Box<dyn AnswerGenerator>>> {
    if !config.is_ready() {
        return Ok(None);
    }
    Ok(Some(Box::new(GeminiGenerator::new(config)?)))
}

/// Gemini-backed [`AnswerGenerator`].
pub struct GeminiGenerator {
    model: String,
    endpoint: String,
    api_key: String,
    max_transcript_chars: usize,
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            Error::Config("generator.api_key (or GEMINI_API_KEY) is required".to_string())
        })?;
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Generation(format!("failed to build tokio runtime: {e}")))?;
        let timeout_secs = config.timeout_secs.max(1);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Generation(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            endpoint,
            api_key,
            max_transcript_chars: config.max_transcript_chars,
            runtime,
            http,
        })
    }
}

impl AnswerGenerator for GeminiGenerator {
    fn generate(&self, question: &str, messages: &[Message]) -> Result<String> {
        let prompt = build_prompt(question, messages, self.max_transcript_chars);

        self.runtime.block_on(async {
            let url = format!(
                "{}/v1beta/models/{}:generateContent?key={}",
                self.endpoint.trim_end_matches('/'),
                self.model,
                urlencoding::encode(&self.api_key)
            );

            let resp = self
                .http
                .post(url)
                .json(&json!({
                    "contents": [{ "parts": [{ "text": prompt }] }],
                }))
                .send()
                .await
                .map_err(|e| Error::Generation(format!("gemini request failed: {e}")))?;
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| Error::Generation(format!("gemini read body failed: {e}")))?;
            if !status.is_success() {
                return Err(status_error(status.as_u16(), &body));
            }

            extract_answer(&body)
        })
    }
}

/// Map a non-success HTTP status onto the error taxonomy. Quota exhaustion
/// is its own variant so callers can log it distinctly.
fn status_error(status: u16, body: &str) -> Error {
    if status == 429 {
        Error::RateLimited(format!("gemini returned 429: {}", body))
    } else {
        Error::Generation(format!("gemini returned {}: {}", status, body))
    }
}

/// Pull the answer text out of a `generateContent` response body.
fn extract_answer(body: &str) -> Result<String> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::Generation(format!("gemini response was not JSON: {e}")))?;

    json.get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get("parts"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("text"))
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| {
            Error::Generation("gemini response missing candidates[0].content.parts[0].text".to_string())
        })
}

fn build_prompt(question: &str, messages: &[Message], max_transcript_chars: usize) -> String {
    let transcript = format_transcript(messages, max_transcript_chars);

    format!(
        "{PROMPT_HEADER}\n\nConversation:\n{}\n\nQuestion:\n{}\n\nInstructions:\n\
         - Answer concretely from the conversation data\n\
         - Say so explicitly when the data is insufficient\n\
         - Include numbers when statistics support the answer\n\
         - Keep the answer short and clear\n\nAnswer:",
        transcript, question
    )
}

/// Render messages as numbered chronological lines.
fn format_transcript(messages: &[Message], max_chars: usize) -> String {
    if messages.is_empty() {
        return "No conversation data available.".to_string();
    }

    let mut ordered: Vec<&Message> = messages.iter().collect();
    ordered.sort_by_key(|m| m.timestamp);

    let mut transcript = String::new();
    for (index, message) in ordered.iter().enumerate() {
        let time = message
            .sent_at_local()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| message.timestamp.to_string());
        let line = format!(
            "{}. [{}] {}: {}\n",
            index + 1,
            time,
            message.display_name(),
            message.text.replace('\n', " ")
        );
        transcript.push_str(&line);
        if transcript.len() >= max_chars {
            // Cut must land on a char boundary; transcripts are frequently multi-byte
            let mut cut = max_chars.min(transcript.len());
            while !transcript.is_char_boundary(cut) {
                cut -= 1;
            }
            transcript.truncate(cut);
            transcript.push_str("\n...[truncated]");
            break;
        }
    }
    transcript
}
