//! ============================================================================
//! Completion - OpenAI-compatible chat completion pipeline
//! ============================================================================
//! - types: request description and wire format
//! - retry: backoff policy and the sleeper seam
//! - cancel: per-request cancellation token
//! - transport: HTTP seam (reqwest in production)
//! - sse: streamed body decoding
//! - client: retry/stream/cancel orchestration
//! ============================================================================

mod cancel;
mod client;
mod retry;
mod sse;
mod transport;
mod types;

pub use cancel::CancelToken;
pub use client::{ChunkCallback, CompletionClient, SettingsCompleter};
pub use retry::{calculate_delay, RetryConfig, Sleeper, TokioSleeper};
pub use sse::{parse_line, SseDecoder, SseEvent, DONE_SENTINEL};
pub use transport::{BodyStream, ChatTransport, ReqwestTransport, TransportResponse};
pub use types::{ChatMessage, ChatRequest, CompletionRequest, DEFAULT_MAX_TOKENS};
