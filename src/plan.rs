use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::repository_traits::BillingStore;

/// Canonical billing tier, derived from a plan's raw display name and never
/// persisted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Pro,
    Premium,
    Unknown,
}

impl PlanTier {
    /// Pro and Premium both clear the paid-feature gate.
    pub fn is_pro(&self) -> bool {
        matches!(self, PlanTier::Pro | PlanTier::Premium)
    }
}

/// Map a raw plan name to a tier, case-insensitively. Absent names classify
/// as `Unknown`, empty ones as `Free`; neither is a paid tier.
pub fn classify(raw: Option<&str>) -> PlanTier {
    let Some(raw) = raw else {
        return PlanTier::Unknown;
    };
    let lowered = raw.to_lowercase();
    if lowered.contains("premium") {
        PlanTier::Premium
    } else if lowered.contains("pro") {
        PlanTier::Pro
    } else {
        PlanTier::Free
    }
}

/// Outcome of a plan lookup against the billing store, with the join-miss
/// and query-failure branches kept distinct so callers handle them
/// exhaustively.
#[derive(Debug)]
pub enum PlanLookup {
    Found(String),
    NotFound,
    Failed(GatewayError),
}

pub async fn lookup_plan(store: &dyn BillingStore, user_id: &str) -> PlanLookup {
    match store.plan_name(user_id).await {
        Ok(Some(name)) => PlanLookup::Found(name),
        Ok(None) => PlanLookup::NotFound,
        Err(e) => PlanLookup::Failed(e),
    }
}

/// Resolve a user's tier. Lookup failures fail closed to the
/// least-privileged tier rather than propagating: quota and role gating must
/// never fail open.
pub async fn resolve_tier(store: &dyn BillingStore, user_id: &str) -> PlanTier {
    match lookup_plan(store, user_id).await {
        PlanLookup::Found(name) => classify(Some(&name)),
        PlanLookup::NotFound => {
            tracing::debug!("No billing plan found for user {user_id}, treating as non-Pro");
            PlanTier::Free
        }
        PlanLookup::Failed(e) => {
            tracing::warn!("Plan lookup failed for user {user_id}: {e}, treating as non-Pro");
            PlanTier::Free
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository_traits::MockBillingStore;

    #[test]
    fn test_classify_pro_and_premium_names() {
        assert_eq!(classify(Some("Pro Monthly")), PlanTier::Pro);
        assert_eq!(classify(Some("Premium Annual")), PlanTier::Premium);
        assert_eq!(classify(Some("PREMIUM")), PlanTier::Premium);
        assert!(classify(Some("pro")).is_pro());
    }

    #[test]
    fn test_classify_non_pro_names() {
        assert_eq!(classify(Some("")), PlanTier::Free);
        assert_eq!(classify(Some("Starter")), PlanTier::Free);
        assert_eq!(classify(None), PlanTier::Unknown);
        assert!(!classify(Some("")).is_pro());
        assert!(!classify(None).is_pro());
    }

    #[tokio::test]
    async fn test_resolve_tier_found() {
        let mut store = MockBillingStore::new();
        store
            .expect_plan_name()
            .returning(|_| Ok(Some("Pro Monthly".to_string())));
        assert_eq!(resolve_tier(&store, "u1").await, PlanTier::Pro);
    }

    #[tokio::test]
    async fn test_resolve_tier_join_miss_is_non_pro() {
        let mut store = MockBillingStore::new();
        store.expect_plan_name().returning(|_| Ok(None));
        assert_eq!(resolve_tier(&store, "u1").await, PlanTier::Free);
    }

    #[tokio::test]
    async fn test_resolve_tier_fails_closed_on_store_error() {
        let mut store = MockBillingStore::new();
        store
            .expect_plan_name()
            .returning(|_| Err(GatewayError::Lookup("query timed out".to_string())));
        let tier = resolve_tier(&store, "u1").await;
        assert_eq!(tier, PlanTier::Free);
        assert!(!tier.is_pro());
    }
}
