//! Per-browser session contents and their storage.
//!
//! Handlers resolve the [`SessionId`] from the cookie middleware, load the
//! [`SessionState`], hand it explicitly to cart and checkout operations and
//! save it back before responding.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shelf_http::SessionId;
use shelf_kernel::settings::SessionSettings;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;

use crate::modules::cart::Cart;
use crate::modules::checkout::CheckoutAttempt;

/// Held by a handler from load until save; requests of one session run one at a time.
pub type SessionGuard = OwnedMutexGuard<()>;

/// Minimum spacing between idle sweeps triggered by saves
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Authenticated storefront customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub email: String,
    /// Bearer token issued by the bookstore service
    pub token: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub cart: Cart,
    pub customer: Option<Customer>,
    pub checkout: Option<CheckoutAttempt>,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.customer.is_some()
    }

    fn is_blank(&self) -> bool {
        *self == Self::default()
    }
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Wait for exclusive use of a session.
    async fn lock(&self, id: &SessionId) -> SessionGuard;

    /// Load a session; unknown ids yield an empty state.
    async fn load(&self, id: &SessionId) -> anyhow::Result<SessionState>;

    async fn save(&self, id: &SessionId, state: SessionState) -> anyhow::Result<()>;
}

struct Entry {
    state: SessionState,
    last_seen: Instant,
}

/// Process-local session store. Contents are lost on restart and idle
/// sessions are dropped after the configured timeout.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Entry>>,
    locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
    idle_timeout: Duration,
    last_sweep: Mutex<Instant>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::from_settings(&SessionSettings::default())
    }

    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self::with_idle_timeout(Duration::from_secs(settings.idle_timeout_secs))
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            idle_timeout,
            last_sweep: Mutex::new(Instant::now()),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than the timeout, skipping any in use.
    /// Returns the number of sessions evicted.
    pub async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut locks = self.locks.lock().await;
        let mut sessions = self.sessions.write().await;

        let before = sessions.len();
        sessions.retain(|id, entry| {
            let in_use = locks.get(id).is_some_and(|lock| Arc::strong_count(lock) > 1);
            in_use || now.duration_since(entry.last_seen) < self.idle_timeout
        });
        locks.retain(|id, lock| Arc::strong_count(lock) > 1 || sessions.contains_key(id));

        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "evicted idle sessions");
        }
        evicted
    }

    async fn sweep_if_due(&self) {
        {
            let mut last_sweep = self.last_sweep.lock().await;
            if last_sweep.elapsed() < SWEEP_INTERVAL {
                return;
            }
            *last_sweep = Instant::now();
        }
        self.evict_idle().await;
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn lock(&self, id: &SessionId) -> SessionGuard {
        let lock = self.locks.lock().await.entry(id.clone()).or_default().clone();
        lock.lock_owned().await
    }

    async fn load(&self, id: &SessionId) -> anyhow::Result<SessionState> {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let expired = match sessions.get_mut(id) {
            Some(entry) if now.duration_since(entry.last_seen) < self.idle_timeout => {
                entry.last_seen = now;
                return Ok(entry.state.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            sessions.remove(id);
            tracing::debug!(session = %id, "session expired");
        }
        Ok(SessionState::default())
    }

    async fn save(&self, id: &SessionId, state: SessionState) -> anyhow::Result<()> {
        {
            let mut sessions = self.sessions.write().await;
            if state.is_blank() {
                sessions.remove(id);
            } else {
                sessions.insert(
                    id.clone(),
                    Entry {
                        state,
                        last_seen: Instant::now(),
                    },
                );
            }
        }
        self.sweep_if_due().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::cart::CartPolicy;
    use crate::modules::catalog::provider::testing::priced_book;

    #[tokio::test]
    async fn unknown_session_loads_empty() {
        let store = InMemorySessionStore::new();
        let state = store.load(&SessionId::generate()).await.unwrap();
        assert!(state.cart.is_empty());
        assert!(!state.is_authenticated());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = InMemorySessionStore::new();
        let (a, b) = (SessionId::generate(), SessionId::generate());

        let mut state = SessionState::default();
        state
            .cart
            .add_item(&priced_book("111", "Dune", Some(20.0)), 2, &CartPolicy::default());
        store.save(&a, state).await.unwrap();

        assert_eq!(store.load(&a).await.unwrap().cart.item_count(), 2);
        assert!(store.load(&b).await.unwrap().cart.is_empty());
    }

    #[tokio::test]
    async fn saving_blank_state_drops_the_entry() {
        let store = InMemorySessionStore::new();
        let id = SessionId::generate();

        let mut state = SessionState::default();
        state.customer = Some(Customer {
            email: "ana@example.com".into(),
            token: "t".into(),
        });
        store.save(&id, state).await.unwrap();
        assert_eq!(store.len().await, 1);

        store.save(&id, SessionState::default()).await.unwrap();
        assert_eq!(store.len().await, 0);
    }

    fn logged_in() -> SessionState {
        SessionState {
            customer: Some(Customer {
                email: "ana@example.com".into(),
                token: "t".into(),
            }),
            ..SessionState::default()
        }
    }

    #[tokio::test]
    async fn lock_serialises_one_session_only() {
        let store = Arc::new(InMemorySessionStore::new());
        let (a, b) = (SessionId::generate(), SessionId::generate());

        let guard = store.lock(&a).await;
        let _other = store.lock(&b).await;

        let waiter = tokio::spawn({
            let store = store.clone();
            let a = a.clone();
            async move {
                let _guard = store.lock(&a).await;
            }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire() {
        let store = InMemorySessionStore::with_idle_timeout(Duration::from_secs(600));
        let id = SessionId::generate();
        store.save(&id, logged_in()).await.unwrap();

        tokio::time::advance(Duration::from_secs(300)).await;
        assert!(store.load(&id).await.unwrap().is_authenticated());

        // loading refreshed the session
        tokio::time::advance(Duration::from_secs(400)).await;
        assert!(store.load(&id).await.unwrap().is_authenticated());

        tokio::time::advance(Duration::from_secs(601)).await;
        assert!(!store.load(&id).await.unwrap().is_authenticated());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn saves_sweep_abandoned_sessions() {
        let store = InMemorySessionStore::with_idle_timeout(Duration::from_secs(600));
        let (abandoned, active) = (SessionId::generate(), SessionId::generate());
        store.save(&abandoned, logged_in()).await.unwrap();

        tokio::time::advance(Duration::from_secs(700)).await;
        store.save(&active, logged_in()).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert!(store.load(&active).await.unwrap().is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_in_use_are_not_evicted() {
        let store = InMemorySessionStore::with_idle_timeout(Duration::from_secs(600));
        let id = SessionId::generate();
        store.save(&id, logged_in()).await.unwrap();
        tokio::time::advance(Duration::from_secs(700)).await;

        let guard = store.lock(&id).await;
        assert_eq!(store.evict_idle().await, 0);
        drop(guard);
        assert_eq!(store.evict_idle().await, 1);
    }
}
