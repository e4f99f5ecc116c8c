//! Shared handle to the inspection store.
//!
//! The store is mutated synchronously under a lock that is never held
//! across an `.await`; async completions take the lock when they land,
//! so mutations apply in completion order. Every mutation goes through
//! [`SharedStore::update`], which compares the state before and after
//! and broadcasts the resulting [`WorkflowEvent`]s.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use inspecta_core::step::Step;
use inspecta_core::store::InspectionStore;
use inspecta_core::types::SessionId;

use crate::events::{WorkflowEvent, EVENT_CHANNEL_CAPACITY};

#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<InspectionStore>>,
    events: broadcast::Sender<WorkflowEvent>,
}

struct Snapshot {
    session_id: SessionId,
    step: Step,
    aborted: bool,
    error: Option<String>,
}

impl Snapshot {
    fn of(store: &InspectionStore) -> Self {
        Self {
            session_id: store.session_id().clone(),
            step: store.step(),
            aborted: store.is_aborted(),
            error: store.error().map(str::to_string),
        }
    }
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new(InspectionStore::new())
    }
}

impl SharedStore {
    pub fn new(store: InspectionStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(store)),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    /// Read-only access.
    pub fn read<R>(&self, f: impl FnOnce(&InspectionStore) -> R) -> R {
        f(&self.lock())
    }

    pub fn session_id(&self) -> SessionId {
        self.read(|s| s.session_id().clone())
    }

    pub fn step(&self) -> Step {
        self.read(InspectionStore::step)
    }

    /// Mutate the store and broadcast what changed.
    pub fn update<R>(&self, f: impl FnOnce(&mut InspectionStore) -> R) -> R {
        let (result, before, after, abort_reason) = {
            let mut store = self.lock();
            let before = Snapshot::of(&store);
            let result = f(&mut store);
            let after = Snapshot::of(&store);
            let abort_reason = store.abort_state().map(|a| a.reason.clone());
            (result, before, after, abort_reason)
        };

        if after.session_id != before.session_id {
            self.emit(WorkflowEvent::SessionReset {
                session_id: after.session_id.clone(),
            });
        }
        if after.step != before.step {
            self.emit(WorkflowEvent::StepChanged {
                from: before.step,
                to: after.step,
            });
        }
        if after.aborted && !before.aborted {
            self.emit(WorkflowEvent::Aborted {
                reason: abort_reason.unwrap_or_default(),
            });
        }
        if let Some(message) = after.error.filter(|m| before.error.as_ref() != Some(m)) {
            self.emit(WorkflowEvent::ErrorRaised { message });
        }
        result
    }

    /// Mutate the store only if it still belongs to `session_id`.
    ///
    /// Returns `None` when the session was reset in the meantime.
    pub fn update_if_session<R>(
        &self,
        session_id: &SessionId,
        f: impl FnOnce(&mut InspectionStore) -> R,
    ) -> Option<R> {
        let mut f = Some(f);
        self.update(|store| {
            if store.session_id() != session_id {
                return None;
            }
            f.take().map(|f| f(store))
        })
    }

    pub fn emit(&self, event: WorkflowEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, InspectionStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
