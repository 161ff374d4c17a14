//! ============================================================================
//! Access Types - Subscription tiers and gated features
//! ============================================================================

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Subscription level, stored as `"free"` / `"premium"` under `subscription`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Premium,
}

impl SubscriptionTier {
    /// Check if this tier can use a specific feature
    pub fn can_use_feature(&self, feature: Feature) -> bool {
        *self >= feature.required_tier()
    }

    pub fn is_premium(&self) -> bool {
        *self == SubscriptionTier::Premium
    }

    fn rank(&self) -> u8 {
        match self {
            SubscriptionTier::Free => 0,
            SubscriptionTier::Premium => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "Free",
            SubscriptionTier::Premium => "Premium",
        }
    }
}

impl PartialOrd for SubscriptionTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SubscriptionTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(SubscriptionTier::Free),
            "premium" => Ok(SubscriptionTier::Premium),
            _ => Err(format!("Unknown subscription tier: {}", s)),
        }
    }
}

/// Features that can be gated by subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Rewrite, summarize, translate, explain
    Transform,
    DailyBonus,
    /// Page content to step-by-step tasks
    InteractiveTasks,
    /// Audio generation
    Podcast,
    ProgressTracking,
    PriorityProcessing,
}

impl Feature {
    /// Get the minimum tier required for this feature
    pub fn required_tier(&self) -> SubscriptionTier {
        match self {
            Feature::Transform | Feature::DailyBonus => SubscriptionTier::Free,
            Feature::InteractiveTasks
            | Feature::Podcast
            | Feature::ProgressTracking
            | Feature::PriorityProcessing => SubscriptionTier::Premium,
        }
    }

    /// Get human-readable feature name
    pub fn display_name(&self) -> &'static str {
        match self {
            Feature::Transform => "Text Transforms",
            Feature::DailyBonus => "Daily Bonus",
            Feature::InteractiveTasks => "Interactive Tasks",
            Feature::Podcast => "Podcast Mode",
            Feature::ProgressTracking => "Advanced Progress Tracking",
            Feature::PriorityProcessing => "Priority AI Processing",
        }
    }
}

/// Pitch shown to free users who hit a premium feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradePrompt {
    pub title: String,
    pub description: String,
    pub features: Vec<String>,
    pub action: String,
}

pub fn upgrade_prompt() -> UpgradePrompt {
    UpgradePrompt {
        title: "Upgrade to Premium".to_string(),
        description: "Interactive tasks are a Premium feature. Upgrade to unlock step-by-step learning from any webpage!".to_string(),
        features: vec![
            "Convert any webpage into interactive tasks".to_string(),
            "Personalized learning based on your profile".to_string(),
            "Audio generation (Podcast mode)".to_string(),
            "Advanced progress tracking".to_string(),
            "Priority AI processing".to_string(),
        ],
        action: "Upgrade to Premium".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(SubscriptionTier::Free < SubscriptionTier::Premium);
        assert_eq!(SubscriptionTier::default(), SubscriptionTier::Free);
    }

    #[test]
    fn test_feature_access() {
        assert!(SubscriptionTier::Free.can_use_feature(Feature::Transform));
        assert!(SubscriptionTier::Free.can_use_feature(Feature::DailyBonus));
        assert!(!SubscriptionTier::Free.can_use_feature(Feature::InteractiveTasks));
        assert!(!SubscriptionTier::Free.can_use_feature(Feature::Podcast));
        assert!(SubscriptionTier::Premium.can_use_feature(Feature::InteractiveTasks));
        assert!(SubscriptionTier::Premium.can_use_feature(Feature::Transform));
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(
            serde_json::to_value(SubscriptionTier::Premium).unwrap(),
            serde_json::json!("premium")
        );
        let tier: SubscriptionTier = serde_json::from_str("\"free\"").unwrap();
        assert_eq!(tier, SubscriptionTier::Free);
        assert_eq!("PREMIUM".parse::<SubscriptionTier>().unwrap(), SubscriptionTier::Premium);
        assert!("gold".parse::<SubscriptionTier>().is_err());
    }

    #[test]
    fn test_upgrade_prompt_lists_premium_features() {
        let prompt = upgrade_prompt();
        assert_eq!(prompt.features.len(), 5);
        assert!(prompt.description.contains("Premium"));
    }
}
