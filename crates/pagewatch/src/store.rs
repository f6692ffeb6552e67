//! The single current snapshot, shared between the fetch cycle and readers.
//!
//! Snapshots are immutable and held behind an `Arc`; writing swaps the
//! pointer under a lock that is only ever held for that swap or for a pointer
//! clone. Readers therefore get either the old snapshot or the new one in
//! full, and keep it for as long as they like without holding anything up.

use std::sync::{Arc, PoisonError, RwLock};

use crate::mirror::SnapshotMirror;
use crate::types::{PersistResult, Snapshot};

/// In-memory snapshot slot with an optional durable mirror.
#[derive(Debug)]
pub struct SnapshotStore {
    current: RwLock<Arc<Snapshot>>,
    mirror: Option<SnapshotMirror>,
}

impl SnapshotStore {
    /// An empty store for `source_url` with no durable mirror.
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::empty(source_url))),
            mirror: None,
        }
    }

    /// An empty store that mirrors every committed snapshot to `mirror`.
    pub fn with_mirror(source_url: impl Into<String>, mirror: SnapshotMirror) -> Self {
        Self {
            mirror: Some(mirror),
            ..Self::new(source_url)
        }
    }

    pub fn mirror(&self) -> Option<&SnapshotMirror> {
        self.mirror.as_ref()
    }

    /// The current snapshot.
    pub fn read(&self) -> Arc<Snapshot> {
        // A panic elsewhere cannot leave the slot half-written: the only
        // mutation is a pointer assignment.
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the current snapshot in one step.
    pub fn write(&self, snapshot: Snapshot) {
        self.swap(Arc::new(snapshot));
    }

    fn swap(&self, next: Arc<Snapshot>) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    /// Mirror `snapshot` to disk. A no-op without a mirror.
    ///
    /// Failure is returned for the caller to record; the in-memory snapshot
    /// is never touched here.
    pub fn persist(&self, snapshot: &Snapshot) -> PersistResult<()> {
        match &self.mirror {
            Some(mirror) => mirror.write(snapshot),
            None => Ok(()),
        }
    }

    /// Publish `snapshot` to readers, then mirror it.
    ///
    /// The in-memory write always happens first and always sticks; the
    /// result only reports whether the durable copy caught up.
    pub fn commit(&self, snapshot: Snapshot) -> PersistResult<()> {
        let snapshot = Arc::new(snapshot);
        self.swap(Arc::clone(&snapshot));
        self.persist(&snapshot)
    }
}
