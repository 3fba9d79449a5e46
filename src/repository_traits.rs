use async_trait::async_trait;

use crate::error::Result;
use crate::models::{MaintenanceRecord, UsageCounters};

#[cfg(test)]
use mockall::automock;

/// Read access to the site maintenance table.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MaintenanceStore: Send + Sync + 'static {
    /// Latest record by creation time. `Ok(None)` means the table has no
    /// rows, which is a valid non-error outcome.
    async fn latest_record(&self) -> Result<Option<MaintenanceRecord>>;
}

/// Read access to the user billing records and their plans.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BillingStore: Send + Sync + 'static {
    /// Display name of the user's plan. `Ok(None)` on a join miss at either
    /// the billing record or the plan row.
    async fn plan_name(&self, user_id: &str) -> Result<Option<String>>;

    /// Metered usage counters for the user, if any are recorded.
    async fn usage_counters(&self, user_id: &str) -> Result<Option<UsageCounters>>;
}
