use std::collections::HashMap;
use std::sync::Arc;

use ::redis::AsyncCommands;
use async_trait::async_trait;

use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::models::{MaintenanceRecord, UsageCounters};
use crate::redis::RedisManager;
use crate::repository_traits::{BillingStore, MaintenanceStore};

const BILLING_USER_KEY_PREFIX: &str = "billing:user:";
const BILLING_PLAN_KEY_PREFIX: &str = "billing:plan:";
const USAGE_KEY_PREFIX: &str = "usage:";

/// Redis-backed implementation of the maintenance and billing stores.
///
/// Maintenance records live in a sorted set scored by creation time, so the
/// latest record is a single ZREVRANGE away. Billing is a two-hop hash join:
/// user record to plan id, plan id to display name.
pub struct RedisStore {
    redis: Arc<RedisManager>,
    record_key: String,
}

impl RedisStore {
    pub fn new(redis: Arc<RedisManager>, config: &Config) -> Self {
        Self {
            redis,
            record_key: config.maintenance.record_key.clone(),
        }
    }

    async fn plan_name_inner(&self, user_id: &str) -> Result<Option<String>> {
        let mut conn = self.redis.get_connection().await?;
        let plan_id: Option<String> = conn
            .hget(format!("{BILLING_USER_KEY_PREFIX}{user_id}"), "plan_id")
            .await?;
        let Some(plan_id) = plan_id else {
            return Ok(None);
        };
        let name: Option<String> = conn
            .hget(format!("{BILLING_PLAN_KEY_PREFIX}{plan_id}"), "display_name")
            .await?;
        Ok(name)
    }

    async fn usage_counters_inner(&self, user_id: &str) -> Result<Option<UsageCounters>> {
        let mut conn = self.redis.get_connection().await?;
        let fields: HashMap<String, String> =
            conn.hgetall(format!("{USAGE_KEY_PREFIX}{user_id}")).await?;
        Ok(parse_counters(&fields))
    }
}

#[async_trait]
impl MaintenanceStore for RedisStore {
    async fn latest_record(&self) -> Result<Option<MaintenanceRecord>> {
        let mut conn = self.redis.get_connection().await?;
        // Highest score = most recently created record.
        let rows: Vec<String> = conn.zrevrange(&self.record_key, 0, 0).await?;
        match rows.into_iter().next() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BillingStore for RedisStore {
    async fn plan_name(&self, user_id: &str) -> Result<Option<String>> {
        self.plan_name_inner(user_id)
            .await
            .map_err(|e| GatewayError::Lookup(e.to_string()))
    }

    async fn usage_counters(&self, user_id: &str) -> Result<Option<UsageCounters>> {
        self.usage_counters_inner(user_id)
            .await
            .map_err(|e| GatewayError::Lookup(e.to_string()))
    }
}

/// An empty hash means the user has no usage row at all. Individual missing
/// fields fall back to workable defaults instead of failing the read.
fn parse_counters(fields: &HashMap<String, String>) -> Option<UsageCounters> {
    if fields.is_empty() {
        return None;
    }
    let current_usage = fields
        .get("current_usage")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let quota_limit = fields
        .get("quota_limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let can_use_ai = fields
        .get("can_use_ai")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(true);
    Some(UsageCounters {
        current_usage,
        quota_limit,
        can_use_ai,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_counters_empty_hash_is_none() {
        assert!(parse_counters(&HashMap::new()).is_none());
    }

    #[test]
    fn test_parse_counters_full_row() {
        let counters = parse_counters(&fields(&[
            ("current_usage", "42"),
            ("quota_limit", "100"),
            ("can_use_ai", "true"),
        ]))
        .unwrap();
        assert_eq!(counters.current_usage, 42);
        assert_eq!(counters.quota_limit, 100);
        assert!(counters.can_use_ai);
    }

    #[test]
    fn test_parse_counters_blocked_flag_variants() {
        let blocked = parse_counters(&fields(&[("current_usage", "1"), ("can_use_ai", "0")]));
        assert!(!blocked.unwrap().can_use_ai);
        let allowed = parse_counters(&fields(&[("current_usage", "1"), ("can_use_ai", "1")]));
        assert!(allowed.unwrap().can_use_ai);
    }

    #[test]
    fn test_maintenance_record_round_trips_from_row_json() {
        let raw = r#"{
            "id": "m1",
            "is_enabled": true,
            "title": "Scheduled maintenance",
            "message": "Back soon",
            "created_at": "2026-08-01T12:00:00Z"
        }"#;
        let record: MaintenanceRecord = serde_json::from_str(raw).unwrap();
        assert!(record.is_enabled);
        assert!(record.estimated_completion.is_none());
    }
}
