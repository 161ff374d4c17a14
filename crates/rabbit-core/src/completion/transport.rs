//! ============================================================================
//! Chat Transport - HTTP seam for the completion client
//! ============================================================================
//! The client only needs "POST this JSON, give me a status and a byte
//! stream". Keeping that behind a trait lets tests script responses and
//! observe when a body is dropped.
//! ============================================================================

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use tracing::debug;

use super::types::ChatRequest;

/// Response body as raw network chunks. Dropping it releases the connection.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

pub struct TransportResponse {
    pub status: u16,
    pub body: BodyStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send one request. `Err` means no HTTP response was received at all.
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &ChatRequest,
    ) -> Result<TransportResponse>;
}

/// reqwest-backed transport used outside tests
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ChatTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        api_key: &str,
        body: &ChatRequest,
    ) -> Result<TransportResponse> {
        debug!("POST {} (model={}, stream={})", url, body.model, body.stream);

        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to call completion API: {}", e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| anyhow!("Failed to read response body: {}", e)));

        Ok(TransportResponse {
            status,
            body: Box::pin(body),
        })
    }
}
