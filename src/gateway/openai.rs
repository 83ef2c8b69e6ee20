//! OpenAI-compatible gateway (Groq by default)
//!
//! Sends `POST {api_base}/chat/completions` with `stream: true` and turns the
//! server-sent events of the reply into [`GatewayEvent`]s.

use crate::config::GatewayConfig;
use crate::error::{ChatError, GatewayFailure, Result};
use crate::gateway::sse::{SseDecoder, DONE_SENTINEL};
use crate::gateway::{
    build_system_prompt, failure_hint, resolve_model, ChatMessage, ChatRole, ConnectionInfo,
    EventStream, Gateway, GatewayEvent, GatewayRequest, TokenUsage,
};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc;

/// Provider name reported by connection checks
pub const PROVIDER_NAME: &str = "groq";

/// Prompt sent by the connection check
const CHECK_PROMPT: &str = "Say hello";

/// Token cap for the connection check
const CHECK_MAX_TOKENS: u32 = 10;

/// Error codes that identify an unusable model
const MODEL_ERROR_CODES: &[&str] = &["model_not_found", "model_decommissioned"];

/// Gateway backed by an OpenAI-compatible chat completions endpoint
///
/// # Examples
///
/// ```
/// use aio_chat::config::GatewayConfig;
/// use aio_chat::gateway::OpenAiGateway;
///
/// let gateway = OpenAiGateway::with_api_key(GatewayConfig::default(), Some("key".into()));
/// assert!(gateway.is_ok());
/// ```
pub struct OpenAiGateway {
    client: Client,
    config: GatewayConfig,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    x_groq: Option<GroqExtension>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GroqExtension {
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiGateway {
    /// Create a gateway reading the API key from `config.api_key_env`
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Config` if the HTTP client cannot be built
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let api_key = config.api_key();
        Self::with_api_key(config, api_key)
    }

    /// Create a gateway with an explicit API key
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Config` if the HTTP client cannot be built
    pub fn with_api_key(config: GatewayConfig, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("aio-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized gateway: api_base={}, default_model={}, credential={}",
            config.api_base,
            config.default_model,
            if api_key.is_some() { "set" } else { "missing" }
        );

        Ok(Self {
            client,
            config,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            ChatError::gateway(
                GatewayFailure::MissingCredential,
                "API key not configured",
                failure_hint(GatewayFailure::MissingCredential, &self.config.api_key_env),
            )
            .into()
        })
    }

    async fn post(&self, body: &CompletionRequest<'_>) -> Result<reqwest::Response> {
        let api_key = self.api_key()?;

        tracing::debug!(
            "Sending completion request: model={}, messages={}, stream={}",
            body.model,
            body.messages.len(),
            body.stream
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Completion request failed: {}", e);
                self.upstream_error(format!("Request to language model failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Upstream returned error {}: {}", status, error_text);
            return Err(self.classify_error(status, &error_text).into());
        }

        Ok(response)
    }

    fn upstream_error(&self, message: String) -> ChatError {
        ChatError::gateway(
            GatewayFailure::Upstream,
            message,
            failure_hint(GatewayFailure::Upstream, &self.config.api_key_env),
        )
    }

    /// Map a non-success response to a gateway failure
    fn classify_error(&self, status: StatusCode, body: &str) -> ChatError {
        let detail = serde_json::from_str::<ApiErrorBody>(body).ok().map(|b| b.error);
        let code = detail.as_ref().and_then(|d| d.code.clone());
        let message = detail
            .map(|d| d.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Upstream returned {}", status));

        let reason = match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayFailure::Unauthorized,
            StatusCode::NOT_FOUND => GatewayFailure::InvalidModel,
            _ if code
                .as_deref()
                .map_or(false, |c| MODEL_ERROR_CODES.contains(&c)) =>
            {
                GatewayFailure::InvalidModel
            }
            _ => GatewayFailure::Upstream,
        };

        ChatError::gateway(
            reason,
            message,
            failure_hint(reason, &self.config.api_key_env),
        )
    }

    fn completion_messages(&self, request: &GatewayRequest) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        messages.push(ChatMessage::new(
            ChatRole::System,
            build_system_prompt(&request.role_hints),
        ));
        messages.extend(
            request
                .messages
                .iter()
                .filter(|m| m.role != ChatRole::System)
                .cloned(),
        );
        messages
    }
}

/// Outcome of one decoded stream payload
enum ChunkOutcome {
    Delta(String),
    Done,
    Skip,
}

/// Accumulates the reply while the stream is decoded
#[derive(Default)]
struct ReplyAssembler {
    message: String,
    usage: Option<TokenUsage>,
}

impl ReplyAssembler {
    fn handle(&mut self, data: &str) -> std::result::Result<ChunkOutcome, String> {
        if data.trim() == DONE_SENTINEL {
            return Ok(ChunkOutcome::Done);
        }

        let value: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| format!("Malformed stream chunk: {}", e))?;
        if let Ok(body) = serde_json::from_value::<ApiErrorBody>(value.clone()) {
            return Err(body.error.message);
        }

        let chunk: StreamChunk = serde_json::from_value(value)
            .map_err(|e| format!("Unexpected stream chunk: {}", e))?;
        if let Some(usage) = chunk.usage.or(chunk.x_groq.and_then(|x| x.usage)) {
            self.usage = Some(usage);
        }

        let text: String = chunk
            .choices
            .into_iter()
            .filter_map(|c| c.delta.content)
            .collect();
        if text.is_empty() {
            Ok(ChunkOutcome::Skip)
        } else {
            self.message.push_str(&text);
            Ok(ChunkOutcome::Delta(text))
        }
    }

    fn finish(&mut self) -> GatewayEvent {
        GatewayEvent::Finish {
            message: std::mem::take(&mut self.message),
            usage: self.usage.take(),
        }
    }
}

/// Decode an SSE completion body, forwarding events to `tx`
async fn pump_stream(
    response: reqwest::Response,
    tx: mpsc::UnboundedSender<Result<GatewayEvent>>,
    hint: String,
) {
    let mut decoder = SseDecoder::new();
    let mut assembler = ReplyAssembler::default();
    let mut byte_stream = response.bytes_stream();

    while let Some(next) = byte_stream.next().await {
        let chunk = match next {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!("Stream interrupted: {}", e);
                let error = ChatError::gateway(
                    GatewayFailure::Upstream,
                    format!("Stream interrupted: {}", e),
                    hint,
                );
                let _ = tx.send(Err(error.into()));
                return;
            }
        };

        for data in decoder.push(&chunk) {
            if forward(&mut assembler, &data, &tx, &hint).is_break() {
                return;
            }
        }
    }

    if let Some(data) = decoder.finish() {
        if forward(&mut assembler, &data, &tx, &hint).is_break() {
            return;
        }
    }

    // Upstream closed without [DONE]; report what arrived.
    let _ = tx.send(Ok(assembler.finish()));
}

/// Handle one payload; `Break` ends the stream
fn forward(
    assembler: &mut ReplyAssembler,
    data: &str,
    tx: &mpsc::UnboundedSender<Result<GatewayEvent>>,
    hint: &str,
) -> ControlFlow<()> {
    match assembler.handle(data) {
        Ok(ChunkOutcome::Delta(text)) => {
            if tx.send(Ok(GatewayEvent::TextDelta(text))).is_err() {
                tracing::debug!("Stream consumer went away");
                return ControlFlow::Break(());
            }
            ControlFlow::Continue(())
        }
        Ok(ChunkOutcome::Skip) => ControlFlow::Continue(()),
        Ok(ChunkOutcome::Done) => {
            let _ = tx.send(Ok(assembler.finish()));
            ControlFlow::Break(())
        }
        Err(message) => {
            tracing::warn!("Upstream stream error: {}", message);
            let error = ChatError::gateway(GatewayFailure::Upstream, message, hint);
            let _ = tx.send(Err(error.into()));
            ControlFlow::Break(())
        }
    }
}

#[async_trait]
impl Gateway for OpenAiGateway {
    async fn stream_chat(&self, request: GatewayRequest) -> Result<EventStream> {
        let model = resolve_model(&request.model, &self.config.default_model);
        let body = CompletionRequest {
            model: &model,
            messages: self.completion_messages(&request),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: true,
        };

        let response = self.post(&body).await?;
        tracing::info!("Streaming reply from model {}", model);

        let (tx, rx) = mpsc::unbounded_channel();
        let hint = failure_hint(GatewayFailure::Upstream, &self.config.api_key_env);
        tokio::spawn(pump_stream(response, tx, hint));

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn check_connection(&self) -> Result<ConnectionInfo> {
        let model = resolve_model(&self.config.check_model, &self.config.default_model);
        let body = CompletionRequest {
            model: &model,
            messages: vec![ChatMessage::new(ChatRole::User, CHECK_PROMPT)],
            max_tokens: CHECK_MAX_TOKENS,
            temperature: self.config.temperature,
            stream: false,
        };

        let response = self.post(&body).await?;
        let completion: CompletionResponse = response.json().await.map_err(|e| {
            tracing::error!("Failed to parse completion response: {}", e);
            self.upstream_error(format!("Failed to parse completion response: {}", e))
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(ConnectionInfo {
            model: completion.model.unwrap_or(model),
            provider: PROVIDER_NAME.to_string(),
            response: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> OpenAiGateway {
        OpenAiGateway::with_api_key(GatewayConfig::default(), Some("test-key".to_string()))
            .unwrap()
    }

    fn reason_of(error: ChatError) -> GatewayFailure {
        match error {
            ChatError::Gateway { reason, .. } => reason,
            other => panic!("expected gateway error, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_unauthorized() {
        let error = gateway().classify_error(StatusCode::UNAUTHORIZED, "");
        assert_eq!(reason_of(error), GatewayFailure::Unauthorized);
    }

    #[test]
    fn test_classify_model_code_on_bad_request() {
        let body = r#"{"error":{"message":"The model `x` does not exist","code":"model_not_found"}}"#;
        let error = gateway().classify_error(StatusCode::BAD_REQUEST, body);
        match error {
            ChatError::Gateway {
                reason, message, ..
            } => {
                assert_eq!(reason, GatewayFailure::InvalidModel);
                assert!(message.contains("does not exist"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_classify_server_error_is_upstream() {
        let error = gateway().classify_error(StatusCode::BAD_GATEWAY, "oops");
        assert_eq!(reason_of(error), GatewayFailure::Upstream);
    }

    #[test]
    fn test_missing_key_is_reported_before_io() {
        let gateway = OpenAiGateway::with_api_key(GatewayConfig::default(), Some("  ".into()))
            .unwrap();
        let err = gateway.api_key().unwrap_err();
        assert!(err.to_string().contains("missing_credential"));
    }

    #[test]
    fn test_completion_messages_prepend_system_prompt() {
        let request = GatewayRequest {
            messages: vec![
                ChatMessage::new(ChatRole::System, "ignored"),
                ChatMessage::new(ChatRole::User, "hi"),
            ],
            model: String::new(),
            role_hints: vec!["Engineer".to_string()],
        };
        let messages = gateway().completion_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.contains("Engineer"));
        assert_eq!(messages[1].content, "hi");
    }

    #[test]
    fn test_assembler_reads_groq_usage() {
        let mut assembler = ReplyAssembler::default();
        let delta = r#"{"choices":[{"delta":{"content":"Hi"}}]}"#;
        let last = r#"{"choices":[{"delta":{}}],"x_groq":{"usage":{"prompt_tokens":4,"completion_tokens":1,"total_tokens":5}}}"#;

        assert!(matches!(assembler.handle(delta), Ok(ChunkOutcome::Delta(t)) if t == "Hi"));
        assert!(matches!(assembler.handle(last), Ok(ChunkOutcome::Skip)));
        assert!(matches!(assembler.handle("[DONE]"), Ok(ChunkOutcome::Done)));

        match assembler.finish() {
            GatewayEvent::Finish { message, usage } => {
                assert_eq!(message, "Hi");
                assert_eq!(usage.unwrap().total_tokens, 5);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_assembler_surfaces_error_payload() {
        let mut assembler = ReplyAssembler::default();
        let result = assembler.handle(r#"{"error":{"message":"rate limited"}}"#);
        assert_eq!(result.err().as_deref(), Some("rate limited"));
    }
}
