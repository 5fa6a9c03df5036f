use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use tably_agent::ReservationSession;

/// Live sessions keyed by gateway call id. At most one session exists per
/// call id; each session sits behind its own lock so frames for one call
/// are processed strictly in order without blocking other calls.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<ReservationSession>>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lookup(&self, call_id: &str) -> Option<Arc<Mutex<ReservationSession>>> {
        self.inner.lock().await.get(call_id).cloned()
    }

    /// Binds a session to a call id unless one already exists; the existing
    /// session always wins, so a call id can be initialized only once.
    pub async fn bind(
        &self,
        call_id: &str,
        session: ReservationSession,
    ) -> Arc<Mutex<ReservationSession>> {
        let mut sessions = self.inner.lock().await;
        sessions
            .entry(call_id.to_owned())
            .or_insert_with(|| {
                debug!(call_id, "registered new call session");
                Arc::new(Mutex::new(session))
            })
            .clone()
    }

    pub async fn remove(&self, call_id: &str) -> bool {
        self.inner.lock().await.remove(call_id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
