//! Concurrency-safe registry of live connections.
//!
//! Membership is a single insertion-ordered list behind a reader/writer
//! lock. The lock is held only for the collection mutation or copy — never
//! across I/O or hook invocations, which is why the mutating operations
//! hand removed handles back to the caller instead of disposing them.

use std::sync::Arc;

use parking_lot::RwLock;
use portico_core::ConnectionId;

use crate::connection::ConnectionHandle;

/// Result of [`ConnectionRegistry::add`].
pub struct AddReport {
    /// Number of registered connections after the add.
    pub connections: usize,
    /// Dead entries drained under the same write-lock acquisition. The
    /// caller owns their disposal.
    pub evicted: Vec<Arc<ConnectionHandle>>,
}

/// Result of [`ConnectionRegistry::purge`].
pub struct PurgeReport {
    /// Number of entries removed.
    pub purged: usize,
    /// Number of entries present before the purge.
    pub total: usize,
    /// The removed handles. The caller owns their disposal.
    pub removed: Vec<Arc<ConnectionHandle>>,
}

/// Ordered set of live connection handles (insertion order = acceptance
/// order; informational only).
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<Vec<Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection, draining dead entries first under the same
    /// write-lock acquisition so connections that died without an explicit
    /// removal cannot accumulate.
    ///
    /// Released handles and duplicates (by ID) are never added.
    pub fn add(&self, handle: Arc<ConnectionHandle>) -> AddReport {
        let mut connections = self.connections.write();
        let evicted = Self::drain(&mut connections, |c| !c.is_open());
        let duplicate = connections.iter().any(|c| c.id() == handle.id());
        if !duplicate && !handle.is_released() {
            connections.push(handle);
        }
        AddReport {
            connections: connections.len(),
            evicted,
        }
    }

    /// Remove a connection by ID, returning it if present.
    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let mut connections = self.connections.write();
        let index = connections.iter().position(|c| c.id() == id)?;
        Some(connections.remove(index))
    }

    /// Point-in-time copy of the membership, in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<ConnectionHandle>> {
        self.connections.read().clone()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Remove every handle matching `predicate`, preserving the relative
    /// order of the survivors.
    pub fn purge(&self, predicate: impl Fn(&ConnectionHandle) -> bool) -> PurgeReport {
        let mut connections = self.connections.write();
        let total = connections.len();
        let removed = Self::drain(&mut connections, predicate);
        PurgeReport {
            purged: removed.len(),
            total,
            removed,
        }
    }

    fn drain(
        connections: &mut Vec<Arc<ConnectionHandle>>,
        predicate: impl Fn(&ConnectionHandle) -> bool,
    ) -> Vec<Arc<ConnectionHandle>> {
        let mut removed = Vec::new();
        connections.retain(|c| {
            if predicate(c) {
                removed.push(c.clone());
                false
            } else {
                true
            }
        });
        removed
    }
}
