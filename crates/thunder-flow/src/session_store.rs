//! Flow session store (§4.5, component C5): at-most-one-owner concurrent
//! access to a suspended flow by `flow_id`.

use dashmap::DashMap;
use std::sync::Arc;
use thunder_model::{FlowSession, ThunderError, ThunderResult};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Process-wide, in-memory flow session store. The repository this crate is
/// adapted from also supports SQLite/Postgres-backed stores (§4.5); those
/// are external collaborator concerns, not implemented here.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<Uuid, Arc<Mutex<FlowSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, session: FlowSession) -> Uuid {
        let flow_id = session.flow_id;
        self.sessions.insert(flow_id, Arc::new(Mutex::new(session)));
        flow_id
    }

    /// Acquires the per-flow lock without blocking. A second concurrent
    /// caller for the same `flow_id` gets `ConcurrentFlow` immediately
    /// rather than queueing behind the first (§4.5, §5 "At-most-one").
    pub async fn acquire(&self, flow_id: Uuid) -> ThunderResult<OwnedMutexGuard<FlowSession>> {
        let entry = self
            .sessions
            .get(&flow_id)
            .map(|e| e.clone())
            .ok_or_else(|| ThunderError::resource_not_found(format!("no flow session {flow_id}")))?;
        entry
            .try_lock_owned()
            .map_err(|_| ThunderError::concurrent_flow(flow_id))
    }

    pub fn delete(&self, flow_id: Uuid) {
        self.sessions.remove(&flow_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thunder_model::FlowType;

    fn sample_session() -> FlowSession {
        FlowSession::new("login", FlowType::Authentication, "start", "app1", None)
    }

    #[tokio::test]
    async fn second_concurrent_acquire_fails_fast() {
        let store = InMemorySessionStore::new();
        let flow_id = store.create(sample_session());

        let _first = store.acquire(flow_id).await.unwrap();
        let second = store.acquire(flow_id).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn acquire_after_release_succeeds() {
        let store = InMemorySessionStore::new();
        let flow_id = store.create(sample_session());

        {
            let _guard = store.acquire(flow_id).await.unwrap();
        }
        assert!(store.acquire(flow_id).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_flow_id_is_resource_not_found() {
        let store = InMemorySessionStore::new();
        assert!(store.acquire(Uuid::new_v4()).await.is_err());
    }
}
