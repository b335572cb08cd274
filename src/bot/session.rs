//! Per-user session state.
//!
//! Each user gets one `Session` behind its own async mutex; the router
//! holds that lock for the whole handling of an event, so a user never
//! has two inputs in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use crate::channels::MessageRef;
use crate::wizard::WizardContext;

/// Ephemeral state of one chat user.
#[derive(Debug)]
pub struct Session {
    /// Chosen or inherited interface language.
    pub lang: Option<String>,
    /// Running wizard, if any.
    pub wizard: Option<WizardContext>,
    /// Menu message currently on screen; replaced by the next screen.
    pub screen: Option<MessageRef>,
    /// Filter menu page to return to after a filter wizard.
    pub filter_page: usize,
    last_active: Instant,
}

impl Session {
    fn new() -> Self {
        Self {
            lang: None,
            wizard: None,
            screen: None,
            filter_page: 0,
            last_active: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Drop everything except the on-screen message.
    pub fn reset(&mut self) {
        self.lang = None;
        self.wizard = None;
        self.filter_page = 0;
    }
}

/// All live sessions keyed by user id.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<i64, Arc<Mutex<Session>>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session for `user_id`, created on first use.
    pub async fn get(&self, user_id: i64) -> Arc<Mutex<Session>> {
        if let Some(session) = self.sessions.read().await.get(&user_id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(
            sessions
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(Session::new()))),
        )
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Forget sessions idle for longer than `max_idle`. Sessions in use
    /// are kept.
    pub async fn prune_stale(&self, max_idle: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| match session.try_lock() {
            Ok(s) => s.last_active.elapsed() <= max_idle,
            Err(_) => true,
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned idle sessions");
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_user_shares_one_session() {
        let store = SessionStore::new();
        let a = store.get(1).await;
        a.lock().await.lang = Some("pl".into());
        let b = store.get(1).await;
        assert_eq!(b.lock().await.lang.as_deref(), Some("pl"));
        store.get(2).await;
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn prune_keeps_recent_and_locked_sessions() {
        let store = SessionStore::new();
        let busy = store.get(1).await;
        let _guard = busy.lock().await;
        store.get(2).await;

        assert_eq!(store.prune_stale(Duration::from_secs(60)).await, 0);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.prune_stale(Duration::ZERO).await, 1);
        assert_eq!(store.len().await, 1);
    }

    #[test]
    fn reset_clears_wizard_state() {
        let mut s = Session::new();
        s.lang = Some("en".into());
        s.wizard = Some(WizardContext::registration("en"));
        s.filter_page = 1;
        s.reset();
        assert!(s.lang.is_none() && s.wizard.is_none());
        assert_eq!(s.filter_page, 0);
    }
}
