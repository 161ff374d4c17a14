//! ============================================================================
//! Progression Engine - Rewards, level-ups and the daily bonus
//! ============================================================================
//! Pure functions over a Profile. Nothing here reads the clock or touches
//! storage: `now` is passed in and the caller persists the returned Profile.
//!
//! Level rule: a profile at level L needs `100 * L` xp to advance. One reward
//! can cross several thresholds, each consuming its own level's requirement.
//! ============================================================================

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{ActionKind, Profile, RewardBundle, RewardTable, LEVEL_XP_STEP, VITALS_MAX};

/// Minimum time between two daily bonus claims
pub const DAILY_COOLDOWN_HOURS: i64 = 20;

/// Result of applying a reward bundle
#[derive(Debug, Clone, PartialEq)]
pub struct RewardOutcome {
    pub profile: Profile,
    pub leveled_up: bool,
}

/// The daily bonus cannot be claimed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Daily bonus available in {hours_left}h")]
pub struct DailyNotReady {
    /// Whole hours (rounded up) until the next claim
    pub hours_left: i64,
}

/// Apply a bundle and resolve any level-ups.
///
/// Health and food are clamped to `[0, VITALS_MAX]`. Arithmetic saturates, so
/// this never panics for any input.
pub fn apply_rewards(profile: &Profile, bundle: &RewardBundle) -> RewardOutcome {
    let mut next = profile.clone();

    next.xp = next.xp.saturating_add(bundle.xp);
    next.coins = next.coins.saturating_add(bundle.coins);
    next.health = next.health.saturating_add(bundle.health).clamp(0, VITALS_MAX);
    next.food = next.food.saturating_add(bundle.food).clamp(0, VITALS_MAX);

    if next.level < 1 {
        next.level = 1;
    }

    let mut leveled_up = false;
    loop {
        let required = LEVEL_XP_STEP.saturating_mul(next.level);
        if next.xp < required {
            break;
        }
        next.xp -= required;
        next.level = next.level.saturating_add(1);
        leveled_up = true;
    }

    if leveled_up {
        debug!("Level up: {} -> {}", profile.level, next.level);
    }

    RewardOutcome {
        profile: next,
        leveled_up,
    }
}

/// Parse `lastClaimISO`. `None` means never claimed or unreadable.
fn last_claim(profile: &Profile) -> Option<DateTime<Utc>> {
    let raw = profile.last_claim_iso.trim();
    if raw.is_empty() {
        return None;
    }

    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            warn!("Ignoring unparseable lastClaimISO {:?}: {}", raw, e);
            None
        }
    }
}

/// Whether at least 20 hours have passed since the last claim (inclusive)
pub fn can_claim_daily(profile: &Profile, now: DateTime<Utc>) -> bool {
    match last_claim(profile) {
        None => true,
        Some(last) => now - last >= Duration::hours(DAILY_COOLDOWN_HOURS),
    }
}

/// Hours (rounded up) until the daily bonus opens, `None` when claimable now
pub fn hours_until_daily(profile: &Profile, now: DateTime<Utc>) -> Option<i64> {
    let last = last_claim(profile)?;
    let remaining = (last + Duration::hours(DAILY_COOLDOWN_HOURS)) - now;
    let millis = remaining.num_milliseconds();

    if millis <= 0 {
        return None;
    }
    Some((millis + 3_599_999) / 3_600_000)
}

/// Record a claim at `now` and extend the streak.
///
/// Grants nothing by itself; callers gate on `can_claim_daily` first.
pub fn claim_daily(profile: &Profile, now: DateTime<Utc>) -> Profile {
    let mut next = profile.clone();
    next.last_claim_iso = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    next.streak = next.streak.saturating_add(1);
    next
}

/// Gate, record the claim, then grant the `daily` bundle
pub fn claim_daily_bonus(
    profile: &Profile,
    rewards: &RewardTable,
    now: DateTime<Utc>,
) -> Result<RewardOutcome, DailyNotReady> {
    if !can_claim_daily(profile, now) {
        return Err(DailyNotReady {
            hours_left: hours_until_daily(profile, now).unwrap_or(0),
        });
    }

    let claimed = claim_daily(profile, now);
    Ok(apply_rewards(&claimed, &rewards.bundle(ActionKind::Daily)))
}

/// Short text describing what a reward granted, e.g.
/// `Earned: +8 xp +3 coins +1 health +1 food`
pub fn reward_summary(bundle: &RewardBundle, outcome: &RewardOutcome) -> String {
    let parts: Vec<String> = [
        (bundle.xp, "xp"),
        (bundle.coins, "coins"),
        (bundle.health, "health"),
        (bundle.food, "food"),
    ]
    .iter()
    .filter(|(amount, _)| *amount > 0)
    .map(|(amount, name)| format!("+{} {}", amount, name))
    .collect();

    let mut summary = if parts.is_empty() {
        "Earned: nothing".to_string()
    } else {
        format!("Earned: {}", parts.join(" "))
    };

    if outcome.leveled_up {
        summary.push_str(&format!(" Level up! Now level {}", outcome.profile.level));
    }
    summary
}
