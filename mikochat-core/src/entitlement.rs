//! Subscription tiers and the image-generation rate limiter.
//!
//! The gate enforces a daily quota and a cooldown between generations. The
//! daily count resets lazily, on the first read after the local calendar date
//! changes. Methods taking `now` are the pure core; the others use the clock.

use crate::error::{Error, Result};
use crate::store::{KeyValueStore, SUBSCRIPTION_KEY};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A named rate-limit profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    #[default]
    Free,
    Usi,
    Vip,
}

/// Fixed limits and display text for one tier.
#[derive(Debug, PartialEq, Eq)]
pub struct PlanInfo {
    pub tier: Tier,
    pub name: &'static str,
    pub images_per_batch: usize,
    pub cooldown_secs: u32,
    /// `None` means unbounded
    pub daily_limit: Option<u32>,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

const FREE_PLAN: PlanInfo = PlanInfo {
    tier: Tier::Free,
    name: "Free Plan",
    images_per_batch: 1,
    cooldown_secs: 4,
    daily_limit: Some(5),
    description: "Basic access with limited features",
    features: &[
        "Generate 1 image every 4 seconds",
        "Maximum 5 images per day",
        "No activation code needed",
    ],
};

const USI_PLAN: PlanInfo = PlanInfo {
    tier: Tier::Usi,
    name: "USI Plan",
    images_per_batch: 4,
    cooldown_secs: 4,
    daily_limit: Some(50),
    description: "Enhanced access for USI members",
    features: &[
        "Generate 4 images every 4 seconds",
        "Up to 50 images per day",
        "Priority processing",
        "Higher quality results",
    ],
};

const VIP_PLAN: PlanInfo = PlanInfo {
    tier: Tier::Vip,
    name: "VIP Plan",
    images_per_batch: 4,
    cooldown_secs: 4,
    daily_limit: None,
    description: "Unlimited premium access",
    features: &[
        "Generate 4 images every 4 seconds",
        "Unlimited image generation",
        "Highest priority processing",
        "Maximum quality settings",
    ],
};

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Usi, Tier::Vip];

    pub fn info(&self) -> &'static PlanInfo {
        match self {
            Tier::Free => &FREE_PLAN,
            Tier::Usi => &USI_PLAN,
            Tier::Vip => &VIP_PLAN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "FREE",
            Tier::Usi => "USI",
            Tier::Vip => "VIP",
        }
    }

    /// The tier unlocked by an activation code, if any.
    pub fn for_code(code: &str) -> Option<Tier> {
        let code = code.trim();
        let (tier, rest) = if let Some(rest) = code.strip_prefix("USI-HAI-") {
            (Tier::Usi, rest)
        } else if let Some(rest) = code.strip_prefix("VIP-HMZ-") {
            (Tier::Vip, rest)
        } else {
            return None;
        };
        match (rest.len(), rest.parse::<u32>()) {
            (3, Ok(n)) if (1..=10).contains(&n) => Some(tier),
            _ => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a generation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    Cooldown { seconds: u32 },
    Quota { limit: u32 },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Cooldown { seconds } => {
                write!(f, "Please wait {seconds} seconds between generations")
            }
            DenialReason::Quota { limit } => write!(f, "Daily limit of {limit} images reached"),
        }
    }
}

/// Result of asking the gate for permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { images_per_batch: usize },
    Denied(DenialReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Current tier and usage, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStatus {
    pub tier: Tier,
    pub daily_count: u32,
    pub last_generated: Option<DateTime<Local>>,
}

impl PlanStatus {
    pub fn info(&self) -> &'static PlanInfo {
        self.tier.info()
    }

    /// Images left today, `None` when unbounded.
    pub fn remaining_today(&self) -> Option<u32> {
        self.info()
            .daily_limit
            .map(|limit| limit.saturating_sub(self.daily_count))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntitlement {
    #[serde(default)]
    plan: Tier,
    #[serde(default)]
    daily_count: u32,
    /// Epoch milliseconds; 0 when never generated
    #[serde(default)]
    last_generated: i64,
    #[serde(default)]
    last_updated: Option<String>,
}

/// The process-wide entitlement state and its storage.
pub struct EntitlementGate {
    store: Arc<dyn KeyValueStore>,
    tier: Tier,
    daily_count: u32,
    last_generated: Option<DateTime<Local>>,
    last_updated: Option<DateTime<Local>>,
}

impl EntitlementGate {
    /// A fresh FREE-tier gate.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            tier: Tier::Free,
            daily_count: 0,
            last_generated: None,
            last_updated: None,
        }
    }

    /// Rehydrate from storage. Unreadable records start a fresh FREE gate.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        Self::load_at(store, Local::now())
    }

    pub fn load_at(store: Arc<dyn KeyValueStore>, now: DateTime<Local>) -> Self {
        let mut gate = Self::new(store);
        match gate.read_stored() {
            Ok(Some(stored)) => {
                gate.tier = stored.plan;
                gate.daily_count = stored.daily_count;
                gate.last_generated = (stored.last_generated > 0)
                    .then(|| DateTime::from_timestamp_millis(stored.last_generated))
                    .flatten()
                    .map(|t| t.with_timezone(&Local));
                gate.last_updated = stored
                    .last_updated
                    .as_deref()
                    .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                    .map(|t| t.with_timezone(&Local));
                gate.roll_day(now);
                tracing::debug!(tier = %gate.tier, daily_count = gate.daily_count, "Loaded entitlement state");
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Ignoring unreadable entitlement state"),
        }
        gate
    }

    fn read_stored(&self) -> Result<Option<StoredEntitlement>> {
        match self.store.get(SUBSCRIPTION_KEY)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Write the current state back to storage.
    pub fn persist(&self) -> Result<()> {
        let stored = StoredEntitlement {
            plan: self.tier,
            daily_count: self.daily_count,
            last_generated: self.last_generated.map(|t| t.timestamp_millis()).unwrap_or(0),
            last_updated: Some(self.last_updated.unwrap_or_else(Local::now).to_rfc3339()),
        };
        self.store
            .set(SUBSCRIPTION_KEY, &serde_json::to_string(&stored)?)
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn status(&mut self) -> PlanStatus {
        self.status_at(Local::now())
    }

    pub fn status_at(&mut self, now: DateTime<Local>) -> PlanStatus {
        self.roll_day(now);
        PlanStatus {
            tier: self.tier,
            daily_count: self.daily_count,
            last_generated: self.last_generated,
        }
    }

    pub fn can_generate(&mut self) -> Decision {
        self.can_generate_at(Local::now())
    }

    /// Check quota, then cooldown.
    ///
    /// An exhausted quota is reported even while the cooldown is also active.
    pub fn can_generate_at(&mut self, now: DateTime<Local>) -> Decision {
        self.roll_day(now);
        let plan = self.tier.info();

        if let Some(limit) = plan.daily_limit {
            if self.daily_count >= limit {
                return Decision::Denied(DenialReason::Quota { limit });
            }
        }

        if let Some(last) = self.last_generated {
            let elapsed_ms = now.timestamp_millis() - last.timestamp_millis();
            if elapsed_ms < i64::from(plan.cooldown_secs) * 1000 {
                return Decision::Denied(DenialReason::Cooldown {
                    seconds: plan.cooldown_secs,
                });
            }
        }

        Decision::Allowed {
            images_per_batch: plan.images_per_batch,
        }
    }

    pub fn record_generation(&mut self, count: usize) {
        self.record_generation_at(count, Local::now());
    }

    /// Count `count` images against today's quota and restart the cooldown.
    pub fn record_generation_at(&mut self, count: usize, now: DateTime<Local>) {
        self.roll_day(now);
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        self.daily_count = self.daily_count.saturating_add(count);
        self.last_generated = Some(now);
        self.last_updated = Some(now);
        tracing::info!(tier = %self.tier, count, daily_count = self.daily_count, "Recorded image generation");
    }

    pub fn activate(&mut self, code: &str) -> Result<Tier> {
        self.activate_at(code, Local::now())
    }

    /// Switch tier for a valid code and reset today's count.
    ///
    /// Invalid codes leave the state untouched.
    pub fn activate_at(&mut self, code: &str, now: DateTime<Local>) -> Result<Tier> {
        let tier = Tier::for_code(code).ok_or(Error::InvalidActivationCode)?;
        self.tier = tier;
        self.daily_count = 0;
        self.last_updated = Some(now);
        tracing::info!(tier = %tier, "Activated plan");
        Ok(tier)
    }

    fn roll_day(&mut self, now: DateTime<Local>) {
        let same_day = self
            .last_updated
            .is_some_and(|last| last.date_naive() == now.date_naive());
        if !same_day {
            if self.daily_count > 0 {
                tracing::debug!(previous = self.daily_count, "New day, resetting generation count");
            }
            self.daily_count = 0;
            self.last_updated = Some(now);
        }
    }
}
