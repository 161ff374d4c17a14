//! ============================================================================
//! Access Module - Subscription gating for White Rabbit
//! ============================================================================
//! ## Tiers
//! - **Free**: text transforms and the daily bonus
//! - **Premium**: interactive tasks, podcast mode, progress tracking,
//!   priority processing
//! ============================================================================

mod types;

pub use types::{upgrade_prompt, Feature, SubscriptionTier, UpgradePrompt};

use thiserror::Error;
use tracing::info;

/// A feature was requested above the user's subscription
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{} requires {} (current: {})",
    .feature.display_name(),
    .feature.required_tier().display_name(),
    .tier.display_name()
)]
pub struct FeatureLocked {
    pub feature: Feature,
    pub tier: SubscriptionTier,
}

impl FeatureLocked {
    pub fn upgrade_prompt(&self) -> UpgradePrompt {
        upgrade_prompt()
    }
}

/// Gate a feature by subscription tier
pub fn gate_feature(tier: SubscriptionTier, feature: Feature) -> Result<(), FeatureLocked> {
    if tier.can_use_feature(feature) {
        Ok(())
    } else {
        info!(
            "Feature {} denied for {} tier",
            feature.display_name(),
            tier.display_name()
        );
        Err(FeatureLocked { feature, tier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_feature() {
        assert!(gate_feature(SubscriptionTier::Free, Feature::Transform).is_ok());
        assert!(gate_feature(SubscriptionTier::Premium, Feature::InteractiveTasks).is_ok());

        let err = gate_feature(SubscriptionTier::Free, Feature::InteractiveTasks).unwrap_err();
        assert_eq!(err.to_string(), "Interactive Tasks requires Premium (current: Free)");
        assert_eq!(err.upgrade_prompt().action, "Upgrade to Premium");
    }
}
