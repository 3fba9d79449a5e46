use serde::{Deserialize, Serialize};

use crate::models::{UsageCounters, UsageSnapshot};

/// Warning kicks in at 80% of quota, critical at 95%.
const WARNING_PERCENT: f64 = 80.0;
const CRITICAL_PERCENT: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuotaSeverity {
    Good,
    Warning,
    Critical,
}

/// Result of evaluating a usage pair against its quota.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub percentage: f64,
    pub remaining: u64,
    pub severity: QuotaSeverity,
    /// True iff the upstream `can_use_ai` decision is false. Independent of
    /// the percentage: a hard plan cutoff can block a user whose counter is
    /// nowhere near the limit.
    pub blocked: bool,
}

/// Pure mapping from (usage, limit, can_use_ai) to a quota status.
/// Re-derivable from its inputs alone; no hidden state.
pub fn evaluate(current_usage: u64, quota_limit: u64, can_use_ai: bool) -> QuotaStatus {
    let percentage = if quota_limit == 0 {
        0.0
    } else {
        current_usage as f64 / quota_limit as f64 * 100.0
    };
    let severity = if percentage >= CRITICAL_PERCENT {
        QuotaSeverity::Critical
    } else if percentage >= WARNING_PERCENT {
        QuotaSeverity::Warning
    } else {
        QuotaSeverity::Good
    };
    QuotaStatus {
        percentage,
        remaining: quota_limit.saturating_sub(current_usage),
        severity,
        blocked: !can_use_ai,
    }
}

pub fn evaluate_counters(counters: &UsageCounters) -> QuotaStatus {
    evaluate(
        counters.current_usage,
        counters.quota_limit,
        counters.can_use_ai,
    )
}

/// Build the per-request usage view shown alongside the quota status.
pub fn snapshot(counters: &UsageCounters, plan_name: &str) -> UsageSnapshot {
    UsageSnapshot {
        current_usage: counters.current_usage,
        quota_limit: counters.quota_limit,
        plan_name: plan_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_boundaries() {
        assert_eq!(evaluate(79, 100, true).severity, QuotaSeverity::Good);
        assert_eq!(evaluate(80, 100, true).severity, QuotaSeverity::Warning);
        assert_eq!(evaluate(94, 100, true).severity, QuotaSeverity::Warning);
        assert_eq!(evaluate(95, 100, true).severity, QuotaSeverity::Critical);
        assert_eq!(evaluate(100, 100, true).severity, QuotaSeverity::Critical);
    }

    #[test]
    fn test_remaining_never_negative() {
        assert_eq!(evaluate(40, 100, true).remaining, 60);
        assert_eq!(evaluate(100, 100, true).remaining, 0);
        assert_eq!(evaluate(150, 100, true).remaining, 0);
    }

    #[test]
    fn test_blocked_tracks_can_use_ai_only() {
        // Low percentage, externally blocked.
        assert!(evaluate(1, 100, false).blocked);
        // Over quota but upstream still allows usage.
        assert!(!evaluate(100, 100, true).blocked);
    }

    #[test]
    fn test_zero_limit_is_zero_percent() {
        let status = evaluate(10, 0, true);
        assert_eq!(status.percentage, 0.0);
        assert_eq!(status.severity, QuotaSeverity::Good);
    }

    #[test]
    fn test_critical_with_remaining_headroom() {
        let status = evaluate(96, 100, true);
        assert_eq!(status.percentage, 96.0);
        assert_eq!(status.remaining, 4);
        assert_eq!(status.severity, QuotaSeverity::Critical);
        assert!(!status.blocked);
    }
}
