//! Per-user daily message counter.

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// How many committed idempotency keys are remembered per counter.
pub const RECENT_KEYS_CAPACITY: usize = 32;

/// Daily usage record for one user, persisted in `usage_counters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageCounter {
    /// Owner of the counter.
    pub user_id: String,

    /// Messages sent since the last reset, across all models.
    pub daily_count: u32,

    /// Messages sent to pro-tier models since the last reset.
    pub daily_pro_count: u32,

    /// Moment the counters roll over to zero.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub reset_at: DateTime<Utc>,

    pub is_anonymous: bool,

    pub is_premium: bool,

    /// Idempotency keys of recently committed turns, oldest first.
    #[serde(default)]
    pub recent_request_keys: Vec<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

/// Start of the next UTC day after `now`.
pub fn next_reset(now: DateTime<Utc>) -> DateTime<Utc> {
    let tomorrow = now.date_naive() + Days::new(1);
    Utc.from_utc_datetime(&tomorrow.and_time(NaiveTime::default()))
}

impl UsageCounter {
    /// A zeroed counter that resets at the next day boundary.
    pub fn fresh(user_id: &str, is_anonymous: bool, is_premium: bool, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            daily_count: 0,
            daily_pro_count: 0,
            reset_at: next_reset(now),
            is_anonymous,
            is_premium,
            recent_request_keys: Vec::new(),
            updated_at: now,
        }
    }

    /// Zero the counters if the reset moment has passed. Returns true when a
    /// rollover happened.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.reset_at {
            return false;
        }
        self.daily_count = 0;
        self.daily_pro_count = 0;
        self.reset_at = next_reset(now);
        self.recent_request_keys.clear();
        true
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.recent_request_keys.iter().any(|k| k == key)
    }

    pub fn remember_key(&mut self, key: &str) {
        self.recent_request_keys.push(key.to_string());
        if self.recent_request_keys.len() > RECENT_KEYS_CAPACITY {
            let excess = self.recent_request_keys.len() - RECENT_KEYS_CAPACITY;
            self.recent_request_keys.drain(..excess);
        }
    }
}
