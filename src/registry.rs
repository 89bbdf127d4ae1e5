// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Name registry and registration rendezvous.
//!
//! An application registers a name with `reg_instance`; the IRMd then
//! wakes exactly one sleeping registration instance whenever a flow
//! request arrives for that name (`flow_req_arr`), and wakes the rest
//! only once more flows arrive or the registration is torn down. A
//! name with no instance currently sleeping on it, and not configured
//! for auto-accept/auto-exec, rejects incoming flow requests with
//! `NotBound`.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{Notify, RwLock};

use crate::error::AriError;

/// What a registration does when a flow request arrives and no
/// application is currently blocked in `flow_accept`.
#[derive(Debug, Clone)]
pub enum AutoMode {
    /// No instance sleeping: reject immediately.
    None,
    /// Queue the flow and let a future `flow_accept` pick it up.
    AutoAccept,
    /// Spawn a fresh process to handle the flow.
    AutoExec { command: String, args: Vec<String> },
}

/// Lifecycle of a single registered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryState {
    /// Name registered, no instance currently blocked on it.
    Idle,
    /// At least one instance asleep in `flow_accept`.
    FlowAccept,
    /// A flow request has arrived and is waiting to be claimed.
    FlowArrived,
}

struct RegistryEntry {
    name: String,
    state: RegistryState,
    auto: AutoMode,
    /// Flow-ids that have arrived and are waiting to be claimed by a
    /// waiting or future `flow_accept` call, FIFO.
    arrived: VecDeque<u32>,
    /// Instances parked in `flow_accept`, each woken in turn as flows
    /// arrive. Exactly one waiter is notified per arrival.
    sleepers: VecDeque<Arc<Notify>>,
}

impl RegistryEntry {
    fn new(name: String, auto: AutoMode) -> Self {
        Self {
            name,
            state: RegistryState::Idle,
            auto,
            arrived: VecDeque::new(),
            sleepers: VecDeque::new(),
        }
    }
}

/// The name registry: maps application names to their registration
/// state and mediates rendezvous between `flow_alloc` (arriving flows)
/// and `flow_accept` (applications blocked waiting for one).
#[derive(Debug, Default)]
pub struct Registry {
    entries: RwLock<HashMap<String, RegistryEntry>>,
}

impl std::fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("arrived", &self.arrived)
            .field("sleepers", &self.sleepers.len())
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a name with the given auto-behavior. Re-registering
    /// an already-registered name is rejected; `unregister` first.
    pub async fn reg_instance(&self, name: String, auto: AutoMode) -> Result<(), AriError> {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&name) {
            return Err(AriError::State(format!("name '{name}' already registered")));
        }
        entries.insert(name.clone(), RegistryEntry::new(name, auto));
        Ok(())
    }

    pub async fn unregister(&self, name: &str) -> Result<(), AriError> {
        let mut entries = self.entries.write().await;
        entries
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AriError::NotFound(format!("name '{name}'")))
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.entries.read().await.contains_key(name)
    }

    /// A flow request arrives for `name`. Wakes exactly one sleeping
    /// `flow_accept` waiter if one exists; otherwise queues the
    /// flow-id for a future `flow_accept` call, unless the name's auto
    /// mode is `None`, in which case this returns `NotBound`.
    pub async fn flow_req_arr(&self, name: &str, flow_id: u32) -> Result<(), AriError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| AriError::NotFound(format!("name '{name}'")))?;

        if matches!(entry.auto, AutoMode::None) && entry.sleepers.is_empty() {
            return Err(AriError::NotBound(format!("name '{name}' has no listener")));
        }

        entry.arrived.push_back(flow_id);
        entry.state = RegistryState::FlowArrived;

        if let Some(waiter) = entry.sleepers.pop_front() {
            waiter.notify_one();
        }
        Ok(())
    }

    /// Blocks until a flow arrives for `name`, returning its flow-id.
    /// If one is already queued, returns immediately without
    /// registering a new sleeper — this is what guarantees exactly one
    /// waiter is woken per arrival rather than a thundering herd.
    pub async fn flow_accept(&self, name: &str) -> Result<u32, AriError> {
        loop {
            let signal = {
                let mut entries = self.entries.write().await;
                let entry = entries
                    .get_mut(name)
                    .ok_or_else(|| AriError::NotFound(format!("name '{name}'")))?;

                if let Some(flow_id) = entry.arrived.pop_front() {
                    if entry.arrived.is_empty() {
                        entry.state = RegistryState::Idle;
                    }
                    return Ok(flow_id);
                }

                let signal = Arc::new(Notify::new());
                entry.sleepers.push_back(signal.clone());
                entry.state = RegistryState::FlowAccept;
                signal
            };
            signal.notified().await;
        }
    }

    pub async fn state(&self, name: &str) -> Option<RegistryState> {
        self.entries.read().await.get(name).map(|e| e.state)
    }

    pub async fn sleeper_count(&self, name: &str) -> usize {
        self.entries
            .read()
            .await
            .get(name)
            .map(|e| e.sleepers.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn flow_req_without_listener_is_not_bound() {
        let registry = Registry::new();
        registry
            .reg_instance("app".to_string(), AutoMode::None)
            .await
            .unwrap();

        let err = registry.flow_req_arr("app", 1).await;
        assert!(matches!(err, Err(AriError::NotBound(_))));
    }

    #[tokio::test]
    async fn flow_accept_returns_already_arrived_flow() {
        let registry = Registry::new();
        registry
            .reg_instance("app".to_string(), AutoMode::AutoAccept)
            .await
            .unwrap();

        registry.flow_req_arr("app", 42).await.unwrap();
        let flow_id = registry.flow_accept("app").await.unwrap();
        assert_eq!(flow_id, 42);
        assert_eq!(registry.state("app").await, Some(RegistryState::Idle));
    }

    #[tokio::test]
    async fn flow_req_wakes_exactly_one_sleeping_waiter() {
        let registry = Arc::new(Registry::new());
        registry
            .reg_instance("app".to_string(), AutoMode::AutoAccept)
            .await
            .unwrap();

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.flow_accept("app").await.unwrap() })
            })
            .collect();

        // Give every task a chance to register as a sleeper before the
        // single arrival fires.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(registry.sleeper_count("app").await, 3);

        registry.flow_req_arr("app", 7).await.unwrap();

        let mut results = Vec::new();
        for _ in 0..3 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        // Only one of the three tasks should have completed; cancel
        // the rest to observe which finished.
        let mut finished = 0;
        for w in waiters {
            if w.is_finished() {
                finished += 1;
                results.push(w.await.unwrap());
            } else {
                w.abort();
            }
        }
        assert_eq!(finished, 1);
        assert_eq!(results, vec![7]);
    }

    #[tokio::test]
    async fn reregistering_same_name_is_rejected() {
        let registry = Registry::new();
        registry
            .reg_instance("app".to_string(), AutoMode::None)
            .await
            .unwrap();
        let err = registry
            .reg_instance("app".to_string(), AutoMode::None)
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn unregister_then_lookup_not_found() {
        let registry = Registry::new();
        registry
            .reg_instance("app".to_string(), AutoMode::None)
            .await
            .unwrap();
        registry.unregister("app").await.unwrap();
        assert!(!registry.is_registered("app").await);
        assert!(matches!(
            registry.flow_accept("app").await,
            Err(AriError::NotFound(_))
        ));
    }
}
