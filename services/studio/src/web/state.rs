//! services/studio/src/web/state.rs
//!
//! Defines the application's shared state and the admin login sessions.

use crate::config::Config;
use crate::sync::{VisitTracker, Workspace};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub workspace: Arc<Workspace>,
    pub config: Arc<Config>,
    pub visits: VisitTracker,
    pub auth_sessions: AuthSessions,
}

impl AppState {
    pub fn new(workspace: Arc<Workspace>, config: Arc<Config>) -> Self {
        Self {
            workspace,
            config,
            visits: VisitTracker::new(),
            auth_sessions: AuthSessions::default(),
        }
    }
}

//=========================================================================================
// AuthSessions
//=========================================================================================

/// Admin login sessions keyed by the id stored in the `session` cookie.
#[derive(Default)]
pub struct AuthSessions {
    expiries: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl AuthSessions {
    pub async fn create(&self, ttl: Duration) -> String {
        let id = Uuid::new_v4().to_string();
        self.expiries.write().await.insert(id.clone(), Utc::now() + ttl);
        id
    }

    /// True for a known, unexpired session. Expired sessions are dropped.
    pub async fn validate(&self, id: &str) -> bool {
        let expired = match self.expiries.read().await.get(id) {
            None => return false,
            Some(expires_at) => *expires_at <= Utc::now(),
        };
        if expired {
            self.expiries.write().await.remove(id);
        }
        !expired
    }

    /// Ends a session and reports whether any other session is still open.
    pub async fn revoke(&self, id: &str) -> bool {
        let mut expiries = self.expiries.write().await;
        expiries.remove(id);
        let now = Utc::now();
        expiries.retain(|_, expires_at| *expires_at > now);
        !expiries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_expire_and_revoke() {
        let sessions = AuthSessions::default();
        let live = sessions.create(Duration::days(30)).await;
        let stale = sessions.create(Duration::seconds(-1)).await;

        assert!(sessions.validate(&live).await);
        assert!(!sessions.validate(&stale).await);
        assert!(!sessions.validate("unknown").await);

        assert!(!sessions.revoke(&live).await);
        assert!(!sessions.validate(&live).await);
    }
}
