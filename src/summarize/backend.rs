use std::env;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

/// Instructions used when the caller doesn't override the system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an email summarizer. Produce a crisp summary \
(4-6 bullet points) with: key points, action items, deadlines, links/IDs, sentiment. \
Keep it under 120 words, neutral tone.";

/// Hard cap on characters sent to a backend; a guard against pathological inputs.
pub const MAX_INPUT_CHARS: usize = 20_000;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
const TEMPERATURE: f64 = 0.2;

#[derive(Debug, Error)]
pub enum SummarizeError {
    /// Missing credentials or endpoint configuration; nothing was sent.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The request failed, returned a non-success status, or the response
    /// was missing the expected fields.
    #[error("backend error: {0}")]
    Backend(String),
}

/// One summarization backend. Implementations own their model id, endpoint
/// and timeout.
pub trait SummaryBackend {
    /// Summarize `text`, using `system_prompt` in place of the default when given.
    fn summarize(&self, text: &str, system_prompt: Option<&str>)
    -> Result<String, SummarizeError>;
}

/// Truncate on a char boundary after `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn build_http(timeout: Duration) -> Result<Client, SummarizeError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| SummarizeError::Backend(format!("http client: {e}")))
}

/// OpenAI chat-completions backend.
pub struct OpenAiBackend {
    http: Client,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    /// Reads `OPENAI_API_KEY`; fails before any request when it is missing.
    pub fn from_env(model: impl Into<String>) -> Result<Self, SummarizeError> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| SummarizeError::Configuration("OPENAI_API_KEY not set".to_string()))?;
        Ok(Self {
            http: build_http(Duration::from_secs(60))?,
            api_key,
            model: model.into(),
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl SummaryBackend for OpenAiBackend {
    fn summarize(
        &self,
        text: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, SummarizeError> {
        let system = system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": truncate_chars(text, MAX_INPUT_CHARS)},
            ],
            "temperature": TEMPERATURE,
        });

        let resp = self
            .http
            .post(OPENAI_CHAT_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|e| SummarizeError::Backend(format!("openai request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SummarizeError::Backend(format!(
                "openai returned {status}: {}",
                truncate_chars(&body, 500)
            )));
        }

        let parsed: ChatCompletion = resp
            .json()
            .map_err(|e| SummarizeError::Backend(format!("openai response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SummarizeError::Backend("openai response missing content".to_string()))?;
        Ok(content.trim().to_string())
    }
}

/// Local Ollama backend. Longer timeout than the hosted one, local inference
/// is slow.
pub struct OllamaBackend {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, SummarizeError> {
        let base_url: String = base_url.into();
        Ok(Self {
            http: build_http(Duration::from_secs(120))?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

impl SummaryBackend for OllamaBackend {
    fn summarize(
        &self,
        text: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, SummarizeError> {
        let system = system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT);
        let payload = json!({
            "model": self.model,
            "prompt": format!("{system}\n\nEmail:\n{}", truncate_chars(text, MAX_INPUT_CHARS)),
            "stream": false,
            "options": {"temperature": TEMPERATURE},
        });

        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&payload)
            .send()
            .map_err(|e| SummarizeError::Backend(format!("ollama request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(SummarizeError::Backend(format!(
                "ollama returned {status}: {}",
                truncate_chars(&body, 500)
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .map_err(|e| SummarizeError::Backend(format!("ollama response: {e}")))?;
        let response = parsed.response.ok_or_else(|| {
            SummarizeError::Backend("ollama response missing `response` field".to_string())
        })?;
        Ok(response.trim().to_string())
    }
}
