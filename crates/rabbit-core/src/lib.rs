//! ============================================================================
//! RABBIT-CORE: White Rabbit's request pipeline and progression engine
//! ============================================================================
//! This crate handles all backend logic behind the White Rabbit shell:
//! - OpenAI-compatible chat completions with retry, streaming and cancel
//! - Pure reward, level-up and daily bonus rules over a Profile
//! - Page content to validated interactive tasks
//! - Synced key-value storage contract (memory and redb backed)
//! - Subscription gating and the single-flight request slot
//! ============================================================================

pub mod access;
pub mod completion;
pub mod error;
pub mod progression;
pub mod session;
pub mod store;
pub mod task;
pub mod types;

// Re-export main types for convenience
pub use types::*;
pub use access::{Feature, SubscriptionTier};
pub use completion::{CancelToken, CompletionClient, CompletionRequest};
pub use error::{RabbitError, Result};
pub use progression::{apply_rewards, can_claim_daily, claim_daily, RewardOutcome};
pub use session::RequestSlot;
pub use store::{KeyValueStore, MemoryStore, RedbStore};
pub use task::{generate_task, InteractiveTask};
