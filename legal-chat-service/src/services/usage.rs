//! Daily usage gate.
//!
//! `check` decides whether a user may start a turn and never writes.
//! `commit` records one successful turn; it is idempotent per request key,
//! so a retried commit does not double count.

use crate::config::UsageLimits;
use crate::models::{ModelConfig, ModelTier, UsageCounter};
use crate::services::error::ChatError;
use crate::services::metrics;
use crate::services::store::ChatStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::error::AppError;
use std::sync::Arc;

/// Outcome of a successful `check`, carried through to `commit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageAdmission {
    pub user_id: String,
    pub is_anonymous: bool,
    pub is_premium: bool,
    pub tier: ModelTier,
    pub limit: u32,
    pub count: u32,
    pub remaining: u32,
}

/// Read-only view for the rate-limits endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub daily_count: u32,
    pub daily_pro_count: u32,
    pub daily_limit: u32,
    pub remaining: u32,
    pub remaining_pro: u32,
}

#[derive(Clone)]
pub struct UsageGate {
    store: Arc<dyn ChatStore>,
    limits: UsageLimits,
}

impl UsageGate {
    pub fn new(store: Arc<dyn ChatStore>, limits: UsageLimits) -> Self {
        Self { store, limits }
    }

    /// Signed-out users may only use models flagged for anonymous access.
    pub fn ensure_model_allowed(
        &self,
        model: &ModelConfig,
        is_authenticated: bool,
    ) -> Result<(), ChatError> {
        if !is_authenticated && !model.anonymous_allowed {
            metrics::record_usage_rejection("login_required");
            return Err(ChatError::LoginRequired);
        }
        Ok(())
    }

    pub async fn check(
        &self,
        user_id: &str,
        is_authenticated: bool,
        tier: ModelTier,
    ) -> Result<UsageAdmission, AppError> {
        self.check_at(user_id, is_authenticated, tier, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        user_id: &str,
        is_authenticated: bool,
        tier: ModelTier,
        now: DateTime<Utc>,
    ) -> Result<UsageAdmission, AppError> {
        let counter = self.current(user_id, is_authenticated, now).await?;
        let limit = self.daily_limit(&counter);

        if counter.daily_count >= limit {
            tracing::info!(
                user_id = %user_id,
                count = counter.daily_count,
                limit,
                "Daily message limit reached"
            );
            metrics::record_usage_rejection("daily_limit");
            return Err(ChatError::DailyLimitReached {
                limit,
                count: counter.daily_count,
            }
            .into());
        }

        if tier == ModelTier::Pro && counter.daily_pro_count >= self.limits.pro {
            tracing::info!(
                user_id = %user_id,
                count = counter.daily_pro_count,
                limit = self.limits.pro,
                "Daily pro model limit reached"
            );
            metrics::record_usage_rejection("pro_limit");
            return Err(ChatError::DailyLimitReached {
                limit: self.limits.pro,
                count: counter.daily_pro_count,
            }
            .into());
        }

        Ok(UsageAdmission {
            user_id: user_id.to_string(),
            is_anonymous: counter.is_anonymous,
            is_premium: counter.is_premium,
            tier,
            limit,
            count: counter.daily_count,
            remaining: limit - counter.daily_count,
        })
    }

    /// Record one completed turn. A repeated `idempotency_key` is a no-op.
    pub async fn commit(
        &self,
        admission: &UsageAdmission,
        idempotency_key: Option<&str>,
    ) -> Result<UsageCounter, AppError> {
        self.commit_at(admission, idempotency_key, Utc::now()).await
    }

    pub async fn commit_at(
        &self,
        admission: &UsageAdmission,
        idempotency_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UsageCounter, AppError> {
        let mut counter = self
            .current(&admission.user_id, !admission.is_anonymous, now)
            .await?;

        if let Some(key) = idempotency_key {
            if counter.has_key(key) {
                tracing::debug!(
                    user_id = %admission.user_id,
                    key = %key,
                    "Usage already committed for request"
                );
                return Ok(counter);
            }
            counter.remember_key(key);
        }

        counter.daily_count += 1;
        if admission.tier == ModelTier::Pro {
            counter.daily_pro_count += 1;
        }
        counter.updated_at = now;

        self.store.save_usage(&counter).await?;

        tracing::debug!(
            user_id = %admission.user_id,
            daily_count = counter.daily_count,
            daily_pro_count = counter.daily_pro_count,
            "Usage committed"
        );
        Ok(counter)
    }

    pub async fn snapshot(
        &self,
        user_id: &str,
        is_authenticated: bool,
    ) -> Result<UsageSnapshot, AppError> {
        let counter = self.current(user_id, is_authenticated, Utc::now()).await?;
        let limit = self.daily_limit(&counter);
        Ok(UsageSnapshot {
            daily_count: counter.daily_count,
            daily_pro_count: counter.daily_pro_count,
            daily_limit: limit,
            remaining: limit.saturating_sub(counter.daily_count),
            remaining_pro: self.limits.pro.saturating_sub(counter.daily_pro_count),
        })
    }

    /// Stored counter (or a fresh one) with any due rollover applied in memory.
    /// The anonymous and premium flags follow the current request and user
    /// profile, not whatever was stored when the counter was created.
    async fn current(
        &self,
        user_id: &str,
        is_authenticated: bool,
        now: DateTime<Utc>,
    ) -> Result<UsageCounter, AppError> {
        let profile = self.store.get_user(user_id).await?;
        let mut counter = match self.store.get_usage(user_id).await? {
            Some(counter) => counter,
            None => UsageCounter::fresh(user_id, !is_authenticated, false, now),
        };

        counter.is_anonymous = !is_authenticated;
        if let Some(profile) = profile {
            counter.is_premium = profile.premium;
        }
        counter.roll_over(now);
        Ok(counter)
    }

    fn daily_limit(&self, counter: &UsageCounter) -> u32 {
        if counter.is_anonymous {
            self.limits.anonymous
        } else if counter.is_premium {
            self.limits.premium
        } else {
            self.limits.authenticated
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserProfile;
    use crate::services::memory::MemoryStore;
    use chrono::Duration;

    fn gate() -> (UsageGate, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let gate = UsageGate::new(store.clone(), UsageLimits::default());
        (gate, store)
    }

    #[tokio::test]
    async fn fresh_counter_is_admitted_without_writing() {
        let (gate, store) = gate();

        let admission = gate.check("u1", false, ModelTier::Free).await.unwrap();

        assert_eq!(admission.limit, 5);
        assert_eq!(admission.remaining, 5);
        assert!(store.get_usage("u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counter_at_ceiling_is_rejected_and_unchanged() {
        let (gate, store) = gate();
        let mut counter = UsageCounter::fresh("u1", true, false, Utc::now());
        counter.daily_count = 5;
        store.save_usage(&counter).await.unwrap();

        let result = gate.check("u1", false, ModelTier::Free).await;

        match result {
            Err(AppError::LimitExceeded { code, limit, count, .. }) => {
                assert_eq!(code, "DAILY_LIMIT_REACHED");
                assert_eq!(limit, 5);
                assert_eq!(count, 5);
            }
            other => panic!("expected limit error, got {:?}", other),
        }
        assert_eq!(store.get_usage("u1").await.unwrap(), Some(counter));
    }

    #[tokio::test]
    async fn expired_counter_resets_before_comparison() {
        let (gate, store) = gate();
        let yesterday = Utc::now() - Duration::days(1);
        let mut counter = UsageCounter::fresh("u1", true, false, yesterday - Duration::hours(1));
        counter.daily_count = 5;
        counter.reset_at = yesterday;
        store.save_usage(&counter).await.unwrap();

        let admission = gate.check("u1", false, ModelTier::Free).await.unwrap();

        assert_eq!(admission.count, 0);
        assert_eq!(admission.remaining, 5);
    }

    #[tokio::test]
    async fn authenticated_and_premium_limits_differ() {
        let (gate, store) = gate();
        let mut premium = UserProfile::guest("p1", "gemini-2.5-flash");
        premium.anonymous = false;
        premium.premium = true;
        store.insert_user_if_absent(&premium).await.unwrap();

        let regular = gate.check("a1", true, ModelTier::Free).await.unwrap();
        let paid = gate.check("p1", true, ModelTier::Free).await.unwrap();

        assert_eq!(regular.limit, 100);
        assert_eq!(paid.limit, 1000);
    }

    #[tokio::test]
    async fn pro_tier_has_its_own_ceiling() {
        let (gate, store) = gate();
        let mut counter = UsageCounter::fresh("u1", false, true, Utc::now());
        counter.daily_count = 150;
        counter.daily_pro_count = 150;
        store.save_usage(&counter).await.unwrap();

        assert!(gate.check("u1", true, ModelTier::Free).await.is_ok());
        let err = gate.check("u1", true, ModelTier::Pro).await.unwrap_err();
        assert!(matches!(err, AppError::LimitExceeded { limit: 150, .. }));
    }

    #[tokio::test]
    async fn commit_increments_once_per_key() {
        let (gate, store) = gate();
        let admission = gate.check("u1", true, ModelTier::Pro).await.unwrap();

        gate.commit(&admission, Some("req-1")).await.unwrap();
        gate.commit(&admission, Some("req-1")).await.unwrap();
        gate.commit(&admission, Some("req-2")).await.unwrap();

        let stored = store.get_usage("u1").await.unwrap().unwrap();
        assert_eq!(stored.daily_count, 2);
        assert_eq!(stored.daily_pro_count, 2);
    }

    #[tokio::test]
    async fn snapshot_reports_remaining() {
        let (gate, _store) = gate();
        let admission = gate.check("u1", true, ModelTier::Free).await.unwrap();
        gate.commit(&admission, None).await.unwrap();

        let snapshot = gate.snapshot("u1", true).await.unwrap();

        assert_eq!(
            snapshot,
            UsageSnapshot {
                daily_count: 1,
                daily_pro_count: 0,
                daily_limit: 100,
                remaining: 99,
                remaining_pro: 150,
            }
        );
    }

    #[tokio::test]
    async fn signing_in_lifts_the_anonymous_ceiling() {
        let (gate, store) = gate();
        let admission = gate.check("u1", false, ModelTier::Free).await.unwrap();
        gate.commit(&admission, None).await.unwrap();
        assert!(store.get_usage("u1").await.unwrap().unwrap().is_anonymous);

        let signed_in = gate.check("u1", true, ModelTier::Free).await.unwrap();

        assert_eq!(signed_in.limit, 100);
        assert_eq!(signed_in.count, 1);
        assert!(!signed_in.is_anonymous);
    }

    #[tokio::test]
    async fn premium_upgrade_applies_to_existing_counter() {
        let (gate, store) = gate();
        let admission = gate.check("u1", true, ModelTier::Free).await.unwrap();
        assert_eq!(admission.limit, 100);
        gate.commit(&admission, None).await.unwrap();

        let mut user = UserProfile::guest("u1", "gemini-2.5-flash");
        user.anonymous = false;
        user.premium = true;
        store.insert_user_if_absent(&user).await.unwrap();

        let upgraded = gate.check("u1", true, ModelTier::Free).await.unwrap();
        assert_eq!(upgraded.limit, 1000);
        assert_eq!(upgraded.count, 1);
        assert!(upgraded.is_premium);
    }

    #[test]
    fn anonymous_users_need_login_for_restricted_models() {
        let (gate, _store) = gate();
        let mut model = crate::models::builtin_models().remove(1);
        model.anonymous_allowed = false;

        assert!(matches!(
            gate.ensure_model_allowed(&model, false),
            Err(ChatError::LoginRequired)
        ));
        assert!(gate.ensure_model_allowed(&model, true).is_ok());
    }
}
