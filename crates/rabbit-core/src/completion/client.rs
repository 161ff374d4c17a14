//! ============================================================================
//! Completion Client - Chat completions with retry, streaming and cancel
//! ============================================================================
//! One call = one logical request. Transient failures (429, 5xx, transport)
//! are retried with exponential backoff; every await point also races the
//! cancellation token. The response body is owned by whichever read loop
//! consumes it and is dropped on every exit path.
//! ============================================================================

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::retry::{calculate_delay, RetryConfig, Sleeper, TokioSleeper};
use super::sse::{SseDecoder, SseEvent};
use super::transport::{BodyStream, ChatTransport, ReqwestTransport, TransportResponse};
use super::types::{ChatMessage, ChatRequest, ChatResponse, CompletionRequest};
use crate::error::{is_retryable_status, RabbitError, Result, EMPTY_COMPLETION};
use crate::task::TaskCompleter;
use crate::types::{ActionKind, Settings, TransformPayload};

/// Called with `(delta, accumulated)` for every streamed text delta
pub type ChunkCallback<'a> = &'a mut (dyn FnMut(&str, &str) + Send);

/// Only message of the credential check
const TEST_CONNECTION_MESSAGE: &str = "Test connection";
const TEST_CONNECTION_MAX_TOKENS: u32 = 10;

pub struct CompletionClient {
    transport: Arc<dyn ChatTransport>,
    sleeper: Arc<dyn Sleeper>,
    retry: RetryConfig,
}

impl CompletionClient {
    /// Client backed by reqwest and the tokio clock
    pub fn new() -> Self {
        Self::with_transport(Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(TokioSleeper),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Run one chat completion.
    ///
    /// Streams when the request asks for it or a callback is given; the
    /// callback fires in order, synchronously with the read loop.
    pub async fn complete(
        &self,
        request: &CompletionRequest,
        token: &CancelToken,
        on_chunk: Option<ChunkCallback<'_>>,
    ) -> Result<String> {
        request.validate()?;

        if token.is_cancelled() {
            debug!("Completion skipped: token already cancelled");
            return Err(RabbitError::Cancelled);
        }

        let stream = request.stream || on_chunk.is_some();
        let body = request.to_chat_request(stream)?;
        let url = request.endpoint_url();

        info!("Requesting completion from {} (model={})", url, request.model);

        self.execute(&url, &request.api_key, &body, token, on_chunk, &self.retry)
            .await
    }

    /// Send `body` and read the reply the way `body.stream` asks for
    async fn execute(
        &self,
        url: &str,
        api_key: &str,
        body: &ChatRequest,
        token: &CancelToken,
        on_chunk: Option<ChunkCallback<'_>>,
        retry: &RetryConfig,
    ) -> Result<String> {
        let stream = body.stream;
        let response = self
            .send_with_retry(url, api_key, body, token, retry)
            .await?;

        if !response.is_success() {
            let status = response.status;
            let text = read_body(response.body, token).await?;
            warn!("Completion failed with status {}", status);
            return Err(RabbitError::Api { status, body: text });
        }

        if stream {
            read_stream(response.body, token, on_chunk).await
        } else {
            let text = read_body(response.body, token).await?;
            let parsed: ChatResponse = serde_json::from_str(&text)
                .map_err(|e| RabbitError::InvalidResponse(e.to_string()))?;
            Ok(parsed
                .first_content()
                .unwrap_or_else(|| EMPTY_COMPLETION.to_string()))
        }
    }

    /// Rewrite/summarize/translate/explain `text` with the settings' defaults
    pub async fn transform(
        &self,
        settings: &Settings,
        mode: ActionKind,
        text: &str,
        token: &CancelToken,
        on_chunk: Option<ChunkCallback<'_>>,
    ) -> Result<String> {
        if !mode.is_transform() {
            return Err(RabbitError::Configuration(format!(
                "{} is not a text transform",
                mode
            )));
        }

        let payload = TransformPayload::from_settings(mode, text, settings);
        let request = CompletionRequest::from_settings(settings, serde_json::to_value(&payload)?);
        self.complete(&request, token, on_chunk).await
    }

    /// Minimal request to check that the credentials and endpoint work.
    /// One plain user message, one attempt: a failing key should fail fast.
    pub async fn test_connection(&self, settings: &Settings, token: &CancelToken) -> Result<()> {
        let request = CompletionRequest::from_settings(settings, Value::Null)
            .with_max_tokens(TEST_CONNECTION_MAX_TOKENS);
        request.validate()?;

        if token.is_cancelled() {
            return Err(RabbitError::Cancelled);
        }

        let body = ChatRequest {
            model: request.model.clone(),
            messages: vec![ChatMessage::new("user", TEST_CONNECTION_MESSAGE)],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };
        let single_attempt = RetryConfig {
            max_attempts: 1,
            ..self.retry.clone()
        };

        info!("Testing connection to {}", request.endpoint_url());
        self.execute(
            &request.endpoint_url(),
            &request.api_key,
            &body,
            token,
            None,
            &single_attempt,
        )
        .await
        .map(|_| ())
    }

    async fn send_with_retry(
        &self,
        url: &str,
        api_key: &str,
        body: &ChatRequest,
        token: &CancelToken,
        retry: &RetryConfig,
    ) -> Result<TransportResponse> {
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("Completion attempt {}/{}", attempt, max_attempts);

            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return Err(RabbitError::Cancelled),
                result = self.transport.post_json(url, api_key, body) => result,
            };
            let last_attempt = attempt >= max_attempts;

            match outcome {
                Ok(response) if is_retryable_status(response.status) && !last_attempt => {
                    warn!(
                        "Completion attempt {}/{} got status {}, retrying",
                        attempt, max_attempts, response.status
                    );
                }
                Ok(response) => return Ok(response),
                Err(e) if !last_attempt => {
                    warn!(
                        "Completion attempt {}/{} failed: {}, retrying",
                        attempt, max_attempts, e
                    );
                }
                Err(e) => return Err(RabbitError::Transport(e.to_string())),
            }

            let delay = calculate_delay(attempt, retry);
            debug!("Backing off {:?} before next attempt", delay);

            tokio::select! {
                biased;
                _ = token.cancelled() => return Err(RabbitError::Cancelled),
                _ = self.sleeper.sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

impl Default for CompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Collect a whole body as text
async fn read_body(mut body: BodyStream, token: &CancelToken) -> Result<String> {
    let mut bytes = Vec::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RabbitError::Cancelled),
            next = body.next() => next,
        };

        match next {
            Some(Ok(chunk)) => bytes.extend_from_slice(&chunk),
            Some(Err(e)) => return Err(RabbitError::Transport(e.to_string())),
            None => break,
        }
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode SSE frames into a growing buffer until `[DONE]` or end of body
async fn read_stream(
    mut body: BodyStream,
    token: &CancelToken,
    mut on_chunk: Option<ChunkCallback<'_>>,
) -> Result<String> {
    let mut decoder = SseDecoder::new();
    let mut accumulated = String::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RabbitError::Cancelled),
            next = body.next() => next,
        };

        let chunk = match next {
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) => return Err(RabbitError::Transport(e.to_string())),
            None => break,
        };

        for event in decoder.push(&chunk) {
            match event {
                SseEvent::Done => {
                    debug!("Stream finished with {} chars", accumulated.len());
                    return Ok(accumulated);
                }
                SseEvent::Delta(delta) => {
                    accumulated.push_str(&delta);
                    if let Some(callback) = on_chunk.as_deref_mut() {
                        callback(&delta, &accumulated);
                    }
                    // The callback may have cancelled
                    if token.is_cancelled() {
                        return Err(RabbitError::Cancelled);
                    }
                }
            }
        }
    }

    if let Some(SseEvent::Delta(delta)) = decoder.finish() {
        accumulated.push_str(&delta);
        if let Some(callback) = on_chunk.as_deref_mut() {
            callback(&delta, &accumulated);
        }
    }

    debug!("Stream ended with {} chars", accumulated.len());
    Ok(accumulated)
}

// ============================================================================
// Task generation seam
// ============================================================================

/// Runs task-generation prompts through a client with stored settings
pub struct SettingsCompleter<'a> {
    pub client: &'a CompletionClient,
    pub settings: &'a Settings,
    pub token: &'a CancelToken,
}

impl<'a> SettingsCompleter<'a> {
    pub fn new(client: &'a CompletionClient, settings: &'a Settings, token: &'a CancelToken) -> Self {
        Self {
            client,
            settings,
            token,
        }
    }
}

#[async_trait]
impl TaskCompleter for SettingsCompleter<'_> {
    async fn complete(
        &self,
        system_prompt: &str,
        user_payload: Value,
        temperature: f32,
    ) -> Result<String> {
        let request = CompletionRequest::from_settings(self.settings, user_payload)
            .with_system_prompt(system_prompt)
            .with_temperature(temperature);

        self.client.complete(&request, self.token, None).await
    }
}
