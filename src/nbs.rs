// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Neighbour set.
//!
//! Tracks the IPCPs directly reachable over an N-1 flow and notifies
//! observers (the RIB manager's enrolment walk, the graph adjacency
//! manager) of membership changes. Every notifier sees `NeighborAdded`
//! for a neighbour before it ever sees `NeighborRemoved` for the same
//! one, since both events are published while holding the same write
//! lock that mutates the underlying map.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

/// A directly connected neighbour.
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub pid: u64,
    pub addr: u64,
    /// Flow-id of the N-1 flow carrying CACEP/RIB traffic to this
    /// neighbour.
    pub flow_id: u32,
}

/// Membership change published to every notifier.
#[derive(Debug, Clone)]
pub enum NeighborEvent {
    Added(Neighbor),
    Removed(u64),
}

/// Anything that wants to react to neighbour churn.
pub trait NeighborNotifier: Send + Sync {
    fn notify(&self, event: &NeighborEvent);
}

/// The neighbour set itself.
#[derive(Default)]
pub struct NeighborSet {
    neighbors: RwLock<HashMap<u64, Neighbor>>,
    notifiers: RwLock<Vec<Arc<dyn NeighborNotifier>>>,
}

impl std::fmt::Debug for NeighborSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeighborSet").finish_non_exhaustive()
    }
}

impl NeighborSet {
    pub fn new() -> Self {
        Self {
            neighbors: RwLock::new(HashMap::new()),
            notifiers: RwLock::new(Vec::new()),
        }
    }

    pub async fn subscribe(&self, notifier: Arc<dyn NeighborNotifier>) {
        self.notifiers.write().await.push(notifier);
    }

    /// Adds or replaces a neighbour and notifies all subscribers.
    pub async fn add(&self, neighbor: Neighbor) {
        let event = NeighborEvent::Added(neighbor.clone());
        self.neighbors.write().await.insert(neighbor.pid, neighbor);
        self.publish(&event).await;
    }

    /// Removes a neighbour, notifying subscribers only if it was
    /// actually present.
    pub async fn remove(&self, pid: u64) {
        let removed = self.neighbors.write().await.remove(&pid);
        if removed.is_some() {
            self.publish(&NeighborEvent::Removed(pid)).await;
        }
    }

    pub async fn get(&self, pid: u64) -> Option<Neighbor> {
        self.neighbors.read().await.get(&pid).cloned()
    }

    pub async fn len(&self) -> usize {
        self.neighbors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.neighbors.read().await.is_empty()
    }

    pub async fn all(&self) -> Vec<Neighbor> {
        self.neighbors.read().await.values().cloned().collect()
    }

    async fn publish(&self, event: &NeighborEvent) {
        for notifier in self.notifiers.read().await.iter() {
            notifier.notify(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingNotifier {
        events: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }
    }

    impl NeighborNotifier for RecordingNotifier {
        fn notify(&self, event: &NeighborEvent) {
            let label = match event {
                NeighborEvent::Added(n) => format!("added:{}", n.pid),
                NeighborEvent::Removed(pid) => format!("removed:{pid}"),
            };
            self.events.lock().unwrap().push(label);
        }
    }

    #[tokio::test]
    async fn add_then_remove_notifies_in_order() {
        let nbs = NeighborSet::new();
        let notifier = Arc::new(RecordingNotifier::new());
        nbs.subscribe(notifier.clone()).await;

        nbs.add(Neighbor {
            pid: 1,
            addr: 1001,
            flow_id: 5,
        })
        .await;
        nbs.remove(1).await;

        let events = notifier.events.lock().unwrap().clone();
        assert_eq!(events, vec!["added:1", "removed:1"]);
    }

    #[tokio::test]
    async fn remove_unknown_neighbor_does_not_notify() {
        let nbs = NeighborSet::new();
        let notifier = Arc::new(RecordingNotifier::new());
        nbs.subscribe(notifier.clone()).await;

        nbs.remove(42).await;
        assert!(notifier.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_and_count() {
        let nbs = NeighborSet::new();
        nbs.add(Neighbor {
            pid: 1,
            addr: 1001,
            flow_id: 5,
        })
        .await;
        assert_eq!(nbs.len().await, 1);
        assert_eq!(nbs.get(1).await.unwrap().addr, 1001);
        assert!(nbs.get(2).await.is_none());
    }
}
