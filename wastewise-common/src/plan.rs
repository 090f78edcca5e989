//! Plan tiers and subscription status values
//!
//! Both are persisted as lowercase strings (`users.plan`, `subscriptions.status`).

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification quota for a free account
pub const FREE_USAGE_LIMIT: i64 = 30;

/// Classification quota for a premium account
pub const PREMIUM_USAGE_LIMIT: i64 = 10_000;

/// Price of one month of premium, in IDR
pub const PREMIUM_PRICE_IDR: i64 = 99_000;

/// Default currency for subscriptions
pub const DEFAULT_CURRENCY: &str = "IDR";

/// Subscription tier on a user account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Premium,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
        }
    }

    /// Usage limit granted by this plan
    pub fn usage_limit(&self) -> i64 {
        match self {
            Plan::Free => FREE_USAGE_LIMIT,
            Plan::Premium => PREMIUM_USAGE_LIMIT,
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "premium" => Ok(Plan::Premium),
            other => Err(format!("Unknown plan: {}", other)),
        }
    }
}

/// Lifecycle status of a subscription row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Failed,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "failed" => Ok(SubscriptionStatus::Failed),
            other => Err(format!("Unknown subscription status: {}", other)),
        }
    }
}

/// End date of a subscription period starting at `start`
///
/// One calendar month; day-of-month is clamped (Jan 31 → Feb 28/29).
pub fn one_month_after(start: DateTime<Utc>) -> DateTime<Utc> {
    start
        .checked_add_months(Months::new(1))
        .unwrap_or_else(|| start + chrono::Duration::days(30))
}
