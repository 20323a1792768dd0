//! OpenRouter HTTP client

use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    stream::{Completion, CompletionEvent, CompletionStream},
    types::{Message, ModelInfo, Usage},
};

/// Default OpenRouter API base URL
pub const BASE_URL: &str = "https://openrouter.ai/api/v1";

/// OpenRouter API client
pub struct OpenRouter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenRouter {
    /// Create a new client with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        }
    }

    /// Create from the OPENROUTER_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY").map_err(|_| Error::MissingApiKey)?;
        if api_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }
        Ok(Self::new(api_key))
    }

    /// Override the base URL (for proxies and tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch the model catalog
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), body));
        }

        let list: ModelList = response.json().await?;
        Ok(list.data.into_iter().map(parse_model).collect())
    }

    /// Run a chat completion synchronously and return the full response
    pub async fn complete(&self, messages: &[Message], model: &str) -> Result<Completion> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.iter().map(WireMessage::from).collect(),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::from_status(status.as_u16(), body));
        }

        let body: ChatResponse = response.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        Ok(Completion {
            text,
            usage: body.usage.map(Usage::from),
        })
    }

    /// Start a streaming chat completion.
    ///
    /// Returns a lazy event stream; dropping it cancels the request.
    pub async fn stream_completion(
        &self,
        messages: &[Message],
        model: &str,
    ) -> Result<CompletionStream> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.iter().map(WireMessage::from).collect(),
            stream: true,
        };

        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "text/event-stream")
            .json(&request);

        let event_source = EventSource::new(builder)
            .map_err(|e| Error::Sse(format!("failed to open event source: {e}")))?;

        Ok(Box::pin(sse_events(event_source)))
    }
}

/// Adapt an SSE event source into a stream of completion events.
///
/// Malformed data lines are skipped; `[DONE]` terminates the stream.
fn sse_events(mut source: EventSource) -> impl tokio_stream::Stream<Item = Result<CompletionEvent>> {
    stream! {
        while let Some(event) = source.next().await {
            match event {
                Ok(Event::Open) => {}
                Ok(Event::Message(msg)) => {
                    if msg.data.trim() == "[DONE]" {
                        yield Ok(CompletionEvent::Done);
                        break;
                    }
                    match serde_json::from_str::<StreamChunk>(&msg.data) {
                        Ok(chunk) => {
                            for event in chunk_events(chunk) {
                                yield Ok(event);
                            }
                        }
                        Err(e) => {
                            tracing::debug!("skipping malformed stream chunk: {e}");
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => {
                    yield Ok(CompletionEvent::Done);
                    break;
                }
                Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                    let body = response.text().await.unwrap_or_default();
                    yield Err(Error::from_status(status.as_u16(), body));
                    break;
                }
                Err(reqwest_eventsource::Error::Transport(e)) => {
                    yield Err(Error::Http(e));
                    break;
                }
                Err(e) => {
                    yield Err(Error::Sse(e.to_string()));
                    break;
                }
            }
        }
        source.close();
    }
}

/// Translate one parsed chunk into zero or more completion events
fn chunk_events(chunk: StreamChunk) -> Vec<CompletionEvent> {
    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(delta) = choice.delta {
            if let Some(text) = delta.content {
                if !text.is_empty() {
                    events.push(CompletionEvent::Delta { text });
                }
            }
        }
    }
    if let Some(usage) = chunk.usage {
        events.push(CompletionEvent::Usage {
            usage: usage.into(),
        });
    }
    events
}

fn parse_model(raw: RawModel) -> ModelInfo {
    let (pricing_prompt, pricing_completion) = match raw.pricing {
        Some(p) => (parse_price(p.prompt), parse_price(p.completion)),
        None => (None, None),
    };
    ModelInfo {
        id: raw.id,
        context_length: raw.context_length,
        pricing_prompt,
        pricing_completion,
        description: raw.description,
    }
}

/// OpenRouter reports per-token prices as decimal strings
fn parse_price(value: Option<String>) -> Option<f64> {
    value.and_then(|s| s.parse::<f64>().ok()).filter(|p| *p >= 0.0)
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.name(),
            content: msg.content.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ResponseChoice {
    #[serde(default)]
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Usage as reported by the API. The total is recomputed locally so the
/// usage invariant holds even if the server disagrees with itself.
#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl From<WireUsage> for Usage {
    fn from(wire: WireUsage) -> Self {
        Usage::new(wire.prompt_tokens, wire.completion_tokens)
    }
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<RawModel>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    id: String,
    #[serde(default)]
    context_length: Option<u64>,
    #[serde(default)]
    pricing: Option<RawPricing>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPricing {
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    completion: Option<String>,
}
