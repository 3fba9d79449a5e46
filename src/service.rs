use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::dispatch::{ChatDispatcher, ChatRouter};
use crate::error::Result;
use crate::maintenance::{MaintenanceMonitor, MonitorState};
use crate::models::{ChatRequestDraft, Session, UsageSnapshot, UserNotification};
use crate::notify::NotificationSink;
use crate::plan::{self, PlanLookup, PlanTier};
use crate::quota::{self, QuotaStatus};
use crate::repository_traits::{BillingStore, MaintenanceStore};

/// Everything routing needs to gate one session's access.
#[derive(Debug, Serialize)]
pub struct AccessDecision {
    pub redirect_to_maintenance: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<crate::models::MaintenanceRecord>,
    pub tier: PlanTier,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quota: Option<QuotaStatus>,
}

/// Main service struct wiring the monitor, plan and quota policies and the
/// chat dispatcher around one injected store.
pub struct AccessService<S: MaintenanceStore + BillingStore> {
    config: Arc<Config>,
    store: Arc<S>,
    monitor: MaintenanceMonitor,
    dispatcher: ChatDispatcher,
    notifications: NotificationSink,
}

impl<S: MaintenanceStore + BillingStore> AccessService<S> {
    /// Create a new service instance. The monitor starts watching the given
    /// invalidation feed immediately and keeps doing so until the service is
    /// dropped.
    pub fn new(
        config: Arc<Config>,
        store: Arc<S>,
        router: Arc<dyn ChatRouter>,
        invalidations: mpsc::Receiver<()>,
    ) -> Self {
        let notifications = NotificationSink::new();
        let mut monitor = MaintenanceMonitor::new(store.clone() as Arc<dyn MaintenanceStore>);
        monitor.start(invalidations);
        let dispatcher = ChatDispatcher::new(router, notifications.clone());
        tracing::info!(name = %config.server.name, "Access service initialized");
        Self {
            config,
            store,
            monitor,
            dispatcher,
            notifications,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gate one session: maintenance redirect, plan tier and quota, in a
    /// single pass. Lookup failures never surface here; plan resolution
    /// fails closed and a usage read error just drops the quota view.
    pub async fn access_decision(&self, session: &Session) -> AccessDecision {
        let redirect_to_maintenance = self.monitor.should_redirect(session).await;
        let maintenance = match self.monitor.state().await {
            MonitorState::Known { record, .. } => record,
            _ => None,
        };
        let tier = plan::resolve_tier(self.store.as_ref(), &session.user_id).await;
        let quota = match self.store.usage_counters(&session.user_id).await {
            Ok(Some(counters)) => Some(quota::evaluate_counters(&counters)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Usage read failed for user {}: {e}", session.user_id);
                None
            }
        };
        AccessDecision {
            redirect_to_maintenance,
            maintenance,
            tier,
            quota,
        }
    }

    /// Per-request usage view; `None` when the user has no usage row.
    pub async fn usage_snapshot(&self, session: &Session) -> Result<Option<UsageSnapshot>> {
        let Some(counters) = self.store.usage_counters(&session.user_id).await? else {
            return Ok(None);
        };
        let plan_name = match plan::lookup_plan(self.store.as_ref(), &session.user_id).await {
            PlanLookup::Found(name) => name,
            PlanLookup::NotFound => "Free".to_string(),
            PlanLookup::Failed(e) => {
                tracing::warn!("Plan lookup failed for user {}: {e}", session.user_id);
                "Free".to_string()
            }
        };
        Ok(Some(quota::snapshot(&counters, &plan_name)))
    }

    pub async fn dispatch_chat(&self, draft: ChatRequestDraft) -> Result<Value> {
        self.dispatcher.send(draft).await
    }

    pub fn chat_in_flight(&self) -> bool {
        self.dispatcher.is_in_flight()
    }

    /// Force a maintenance refetch outside the change feed.
    pub async fn refresh_maintenance(&self) {
        self.monitor.refresh().await;
    }

    pub fn subscribe_notifications(&self) -> broadcast::Receiver<UserNotification> {
        self.notifications.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ChatRouter;
    use crate::error::GatewayError;
    use crate::models::{ChatRequestEnvelope, MaintenanceRecord, UsageCounters};
    use crate::quota::QuotaSeverity;
    use async_trait::async_trait;
    use chrono::Utc;
    use enumset::EnumSet;

    struct FakeStore {
        maintenance_enabled: bool,
        plan_name: Option<String>,
        counters: Option<UsageCounters>,
    }

    #[async_trait]
    impl MaintenanceStore for FakeStore {
        async fn latest_record(&self) -> Result<Option<MaintenanceRecord>> {
            Ok(Some(MaintenanceRecord {
                id: "m1".to_string(),
                is_enabled: self.maintenance_enabled,
                title: "Maintenance".to_string(),
                message: "Back soon".to_string(),
                estimated_completion: None,
                contact_info: None,
                created_at: Utc::now(),
            }))
        }
    }

    #[async_trait]
    impl BillingStore for FakeStore {
        async fn plan_name(&self, _user_id: &str) -> Result<Option<String>> {
            Ok(self.plan_name.clone())
        }

        async fn usage_counters(&self, _user_id: &str) -> Result<Option<UsageCounters>> {
            Ok(self.counters.clone())
        }
    }

    struct FailingRouter;

    #[async_trait]
    impl ChatRouter for FailingRouter {
        async fn route(&self, _envelope: &ChatRequestEnvelope) -> Result<Option<Value>> {
            Err(GatewayError::Transport("unreachable".to_string()))
        }
    }

    fn service(store: FakeStore) -> AccessService<FakeStore> {
        let (_tx, rx) = mpsc::channel(1);
        AccessService::new(
            Arc::new(Config::default()),
            Arc::new(store),
            Arc::new(FailingRouter),
            rx,
        )
    }

    fn session() -> Session {
        Session {
            user_id: "u1".to_string(),
            authenticated: true,
            is_admin: false,
            capabilities: EnumSet::empty(),
        }
    }

    #[tokio::test]
    async fn test_access_decision_composes_gates() {
        let svc = service(FakeStore {
            maintenance_enabled: true,
            plan_name: Some("Pro Monthly".to_string()),
            counters: Some(UsageCounters {
                current_usage: 96,
                quota_limit: 100,
                can_use_ai: true,
            }),
        });
        svc.refresh_maintenance().await;

        let decision = svc.access_decision(&session()).await;
        assert!(decision.redirect_to_maintenance);
        assert!(decision.maintenance.is_some());
        assert_eq!(decision.tier, PlanTier::Pro);
        let quota = decision.quota.unwrap();
        assert_eq!(quota.severity, QuotaSeverity::Critical);
        assert_eq!(quota.remaining, 4);
        assert!(!quota.blocked);
    }

    #[tokio::test]
    async fn test_admin_session_is_not_redirected() {
        let svc = service(FakeStore {
            maintenance_enabled: true,
            plan_name: None,
            counters: None,
        });
        svc.refresh_maintenance().await;

        let mut admin = session();
        admin.is_admin = true;
        let decision = svc.access_decision(&admin).await;
        assert!(!decision.redirect_to_maintenance);
        assert_eq!(decision.tier, PlanTier::Free);
        assert!(decision.quota.is_none());
    }

    #[tokio::test]
    async fn test_usage_snapshot_carries_plan_name() {
        let svc = service(FakeStore {
            maintenance_enabled: false,
            plan_name: Some("Premium Annual".to_string()),
            counters: Some(UsageCounters {
                current_usage: 10,
                quota_limit: 50,
                can_use_ai: true,
            }),
        });

        let snapshot = svc.usage_snapshot(&session()).await.unwrap().unwrap();
        assert_eq!(snapshot.plan_name, "Premium Annual");
        assert_eq!(snapshot.remaining(), 40);
        assert_eq!(snapshot.usage_percentage(), 20.0);
    }

    #[tokio::test]
    async fn test_dispatch_failure_notifies_subscribers() {
        let svc = service(FakeStore {
            maintenance_enabled: false,
            plan_name: None,
            counters: None,
        });
        let mut rx = svc.subscribe_notifications();

        let draft = ChatRequestDraft {
            message: "hi".to_string(),
            session_id: "s1".to_string(),
            selected_model_id: "m1".to_string(),
            conversation_history: vec![],
            conversation_id: None,
        };
        assert!(svc.dispatch_chat(draft).await.is_err());
        assert_eq!(rx.try_recv().unwrap().description, "unreachable");
    }
}
