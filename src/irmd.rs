// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! IPC Resource Manager daemon (IRMd).
//!
//! Ties the port/flow descriptor table ([`FlowAllocator`]) and the
//! name registry ([`Registry`]) together into the flow allocation
//! protocol: `flow_alloc` draws a port-id and delivers the request to
//! whatever is registered under the destination name; `flow_accept`
//! is the registered side picking it up; `flow_alloc_reply` is its
//! accept/reject decision, which unblocks any `flow_alloc_res` caller
//! waiting on the same port-id.

use std::sync::Arc;

use crate::error::AriError;
use crate::fal::{FlowAllocator, PortEntry, PortState};
use crate::registry::{AutoMode, Registry};

/// The IPC Resource Manager daemon.
#[derive(Debug)]
pub struct Irmd {
    port_map: Arc<FlowAllocator>,
    registry: Arc<Registry>,
}

impl Default for Irmd {
    fn default() -> Self {
        Self::new()
    }
}

impl Irmd {
    pub fn new() -> Self {
        Self {
            port_map: Arc::new(FlowAllocator::new()),
            registry: Arc::new(Registry::new()),
        }
    }

    pub fn port_map(&self) -> Arc<FlowAllocator> {
        self.port_map.clone()
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Registers `name` so `flow_alloc` calls against it can be
    /// delivered to a `flow_accept` caller.
    pub async fn reg(&self, name: String, auto: AutoMode) -> Result<(), AriError> {
        self.registry.reg_instance(name, auto).await
    }

    pub async fn unreg(&self, name: &str) -> Result<(), AriError> {
        self.registry.unregister(name).await
    }

    /// Initiates a flow allocation from `src_api` to `dst_name`.
    /// Draws a fresh port-id, marks it `Pending`, and delivers the
    /// request to the destination's registration. Returns
    /// `NotBound` if nothing is listening and the name has no
    /// auto-accept/auto-exec configured.
    pub async fn flow_alloc(&self, src_api: u64, dst_name: &str) -> Result<u32, AriError> {
        let port_id = self.port_map.allocate().await?;
        self.port_map.insert(port_id, src_api, 0).await?;

        if let Err(e) = self.registry.flow_req_arr(dst_name, port_id).await {
            // Roll back the port-id: a rejected request must not leak
            // a bitmap bit.
            let _ = self.port_map.release(port_id).await;
            return Err(e);
        }
        Ok(port_id)
    }

    /// Blocks until `port_id`'s pending allocation is resolved,
    /// returning the terminal state (`Allocated` or `Null`).
    pub async fn flow_alloc_res(&self, port_id: u32) -> Result<PortState, AriError> {
        self.port_map.wait_terminal(port_id).await
    }

    /// Blocks for the next flow request addressed to a registered
    /// `name`, returning its port-id.
    pub async fn flow_accept(&self, name: &str) -> Result<u32, AriError> {
        self.registry.flow_accept(name).await
    }

    /// The accepting application's accept/reject decision for
    /// `port_id`, unblocking any `flow_alloc_res` waiter on it.
    pub async fn flow_alloc_reply(&self, port_id: u32, accept: bool) -> Result<(), AriError> {
        let new_state = if accept {
            PortState::Allocated
        } else {
            PortState::Null
        };
        self.port_map.transition(port_id, new_state).await
    }

    /// Tears a flow down and releases its port-id.
    pub async fn flow_dealloc(&self, port_id: u32) -> Result<(), AriError> {
        let _ = self.port_map.transition(port_id, PortState::Null).await;
        self.port_map.release(port_id).await
    }

    pub async fn flow_entry(&self, port_id: u32) -> Option<PortEntry> {
        self.port_map.lookup(port_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_allocation_round_trip() {
        let irmd = Irmd::new();
        irmd.reg("app".to_string(), AutoMode::AutoAccept)
            .await
            .unwrap();

        let port_id = irmd.flow_alloc(1, "app").await.unwrap();
        assert_eq!(irmd.flow_accept("app").await.unwrap(), port_id);

        irmd.flow_alloc_reply(port_id, true).await.unwrap();
        let state = irmd.flow_alloc_res(port_id).await.unwrap();
        assert_eq!(state, PortState::Allocated);

        irmd.flow_dealloc(port_id).await.unwrap();
        assert!(irmd.flow_entry(port_id).await.is_none());
    }

    #[tokio::test]
    async fn rejected_allocation_resolves_to_null() {
        let irmd = Irmd::new();
        irmd.reg("app".to_string(), AutoMode::AutoAccept)
            .await
            .unwrap();

        let port_id = irmd.flow_alloc(1, "app").await.unwrap();
        irmd.flow_accept("app").await.unwrap();
        irmd.flow_alloc_reply(port_id, false).await.unwrap();

        let state = irmd.flow_alloc_res(port_id).await.unwrap();
        assert_eq!(state, PortState::Null);
    }

    #[tokio::test]
    async fn alloc_to_unbound_name_releases_port_id() {
        let irmd = Irmd::new();
        irmd.reg("app".to_string(), AutoMode::None).await.unwrap();

        let err = irmd.flow_alloc(1, "app").await;
        assert!(matches!(err, Err(AriError::NotBound(_))));

        // The bitmap must not have leaked a bit for the rolled-back port.
        let retry = irmd.port_map.allocate().await.unwrap();
        assert_eq!(retry, 0);
    }

    #[tokio::test]
    async fn alloc_to_unknown_name_is_not_found() {
        let irmd = Irmd::new();
        let err = irmd.flow_alloc(1, "ghost").await;
        assert!(matches!(err, Err(AriError::NotFound(_))));
    }
}
