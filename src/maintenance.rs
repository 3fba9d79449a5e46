use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::{MaintenanceRecord, Session};
use crate::repository_traits::MaintenanceStore;

/// Lifecycle of the maintenance view.
///
/// `Checking` is only observable before the first fetch resolves; later
/// refreshes keep the previous `Known` value until the replacement arrives,
/// so a fetch error never destroys what the caller already renders.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorState {
    Uninitialized,
    Checking,
    Known {
        enabled: bool,
        record: Option<MaintenanceRecord>,
    },
}

/// Non-admin authenticated sessions get redirected while maintenance is on.
pub fn redirect_required(enabled: bool, session: &Session) -> bool {
    enabled && session.authenticated && !session.is_admin
}

struct MonitorInner {
    store: Arc<dyn MaintenanceStore>,
    state: RwLock<MonitorState>,
    next_ticket: AtomicU64,
    applied: AtomicU64,
}

impl MonitorInner {
    async fn refresh(&self) {
        let ticket = self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.state.write().await;
            if matches!(*state, MonitorState::Uninitialized) {
                *state = MonitorState::Checking;
            }
        }
        let fetched = self.store.latest_record().await;
        self.apply(ticket, fetched).await;
    }

    /// Overlapping refreshes may resolve out of order; the ticket guard
    /// keeps a stale fetch from overwriting a fresher one.
    async fn apply(&self, ticket: u64, fetched: Result<Option<MaintenanceRecord>>) {
        let mut state = self.state.write().await;
        match fetched {
            Ok(record) => {
                if self.applied.load(Ordering::SeqCst) > ticket {
                    tracing::debug!("Discarding stale maintenance refresh (ticket {ticket})");
                    return;
                }
                self.applied.store(ticket, Ordering::SeqCst);
                let enabled = record.as_ref().map(|r| r.is_enabled).unwrap_or(false);
                if enabled {
                    tracing::warn!("Maintenance mode is enabled");
                }
                *state = MonitorState::Known { enabled, record };
            }
            Err(e) => {
                // Missing rows come back as Ok(None); anything here is a
                // real fetch failure, so keep whatever state we had.
                tracing::error!("Maintenance status fetch failed: {e}");
            }
        }
    }
}

/// Owns the single current maintenance record, refreshed on demand and on
/// change-feed notifications, and derives the redirect decision.
pub struct MaintenanceMonitor {
    inner: Arc<MonitorInner>,
    listener: Option<JoinHandle<()>>,
}

impl MaintenanceMonitor {
    pub fn new(store: Arc<dyn MaintenanceStore>) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                store,
                state: RwLock::new(MonitorState::Uninitialized),
                next_ticket: AtomicU64::new(0),
                applied: AtomicU64::new(0),
            }),
            listener: None,
        }
    }

    /// Start watching. Call once session auth resolution completes: performs
    /// the initial fetch, then refetches (full replace, no merge) for every
    /// invalidation signal until the monitor is dropped.
    pub fn start(&mut self, mut invalidations: mpsc::Receiver<()>) {
        let inner = Arc::clone(&self.inner);
        self.listener = Some(tokio::spawn(async move {
            inner.refresh().await;
            while invalidations.recv().await.is_some() {
                inner.refresh().await;
            }
            tracing::debug!("Maintenance change feed closed");
        }));
    }

    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    pub async fn state(&self) -> MonitorState {
        self.inner.state.read().await.clone()
    }

    pub async fn should_redirect(&self, session: &Session) -> bool {
        match &*self.inner.state.read().await {
            MonitorState::Known { enabled, .. } => redirect_required(*enabled, session),
            _ => false,
        }
    }
}

impl Drop for MaintenanceMonitor {
    fn drop(&mut self) {
        // One subscribe per monitor, released here; no leaked listeners
        // across remounts.
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}
