// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Flow manager.
//!
//! Bridges the N side (applications writing/reading SDUs over a
//! `port_id`) and the N-1 side (PDUs relayed over an underlying
//! flow-id) by consulting the port/flow descriptor table, the CEP-ID
//! bijection and the PDU Forwarding Function. Every lookup drops its
//! lock before the caller does any actual I/O: `n_write` returns the
//! framed PDU and next-hop rather than sending it itself, so the PFF
//! and EFCP locks are never held across a socket write.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::efcp::Efcp;
use crate::error::AriError;
use crate::fal::{FlowAllocator, PortState};
use crate::pdu::Pdu;
use crate::rmt::Pff;

/// Bridges port-ids (N side) to flow-ids (N-1 side).
pub struct FlowManager {
    port_map: Arc<FlowAllocator>,
    efcp: Arc<RwLock<Efcp>>,
    pff: Arc<Pff>,
}

impl std::fmt::Debug for FlowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowManager").finish_non_exhaustive()
    }
}

impl FlowManager {
    pub fn new(port_map: Arc<FlowAllocator>, efcp: Arc<RwLock<Efcp>>, pff: Arc<Pff>) -> Self {
        Self {
            port_map,
            efcp,
            pff,
        }
    }

    /// N interface: an application wrote `payload` to `port_id`.
    /// Frames it into a PDU and resolves the next hop to relay it to,
    /// without performing the send itself.
    pub async fn n_write(&self, port_id: u32, payload: Vec<u8>) -> Result<(Pdu, u32), AriError> {
        let entry = self
            .port_map
            .lookup(port_id)
            .await
            .ok_or_else(|| AriError::NotFound(format!("port_id {port_id}")))?;
        if entry.state != PortState::Allocated {
            return Err(AriError::State(format!(
                "port_id {port_id} not allocated (state {:?})",
                entry.state
            )));
        }

        let next_hop = self
            .pff
            .nhop(entry.n_1_api, 0)
            .await
            .ok_or_else(|| AriError::NotFound(format!("no PFF route to {}", entry.n_1_api)))?;

        let mut efcp = self.efcp.write().await;
        let pdu = efcp
            .fmgr_np1_post_sdu(port_id, payload)
            .map_err(AriError::IpcpFailure)?;
        drop(efcp);

        Ok((pdu, next_hop))
    }

    /// N-1 interface: a PDU arrived on `flow_id`. Hands it to EFCP for
    /// reassembly/ack handling and returns a fully reassembled SDU, if
    /// one is ready.
    pub async fn n_1_read(&self, flow_id: u32, pdu: Pdu) -> Result<Option<Vec<u8>>, AriError> {
        let mut efcp = self.efcp.write().await;
        efcp.fmgr_np1_post_buf(flow_id, pdu)
            .map_err(AriError::IpcpFailure)
    }
}

/// Rotates fairly across a fixed set of ports, so an N-reader or
/// N-1-reader loop servicing many flows can't let one starve the
/// others. `next_port` advances regardless of whether the caller
/// found anything to read on the port it returned.
#[derive(Debug, Default)]
pub struct RoundRobinCursor {
    ports: Vec<u32>,
    next: usize,
}

impl RoundRobinCursor {
    pub fn new(ports: Vec<u32>) -> Self {
        Self { ports, next: 0 }
    }

    pub fn next_port(&mut self) -> Option<u32> {
        if self.ports.is_empty() {
            return None;
        }
        let port = self.ports[self.next % self.ports.len()];
        self.next = (self.next + 1) % self.ports.len();
        Some(port)
    }

    pub fn set_ports(&mut self, ports: Vec<u32>) {
        self.ports = ports;
        self.next = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efcp::FlowConfig;

    async fn make_manager() -> (Arc<FlowAllocator>, FlowManager) {
        let port_map = Arc::new(FlowAllocator::new());
        let efcp = Arc::new(RwLock::new(Efcp::new()));
        let pff = Arc::new(Pff::new());
        let fmgr = FlowManager::new(port_map.clone(), efcp, pff);
        (port_map, fmgr)
    }

    #[tokio::test]
    async fn n_write_rejects_unallocated_port() {
        let (port_map, fmgr) = make_manager().await;
        let port_id = port_map.allocate().await.unwrap();
        port_map.insert(port_id, 1, 2).await.unwrap();

        let err = fmgr.n_write(port_id, vec![1, 2, 3]).await;
        assert!(matches!(err, Err(AriError::State(_))));
    }

    #[tokio::test]
    async fn n_write_rejects_missing_pff_route() {
        let (port_map, fmgr) = make_manager().await;
        let port_id = port_map.allocate().await.unwrap();
        port_map.insert(port_id, 1, 2).await.unwrap();
        port_map
            .transition(port_id, PortState::Allocated)
            .await
            .unwrap();

        let err = fmgr.n_write(port_id, vec![1, 2, 3]).await;
        assert!(matches!(err, Err(AriError::NotFound(_))));
    }

    #[tokio::test]
    async fn n_write_then_n_1_read_round_trip() {
        let port_map = Arc::new(FlowAllocator::new());
        let efcp = Arc::new(RwLock::new(Efcp::new()));
        let pff = Arc::new(Pff::new());

        let flow_id = {
            let mut efcp = efcp.write().await;
            efcp.allocate_flow(100, 200, FlowConfig::default())
        };

        let port_id = port_map.allocate().await.unwrap();
        port_map.insert(port_id, 1, 200).await.unwrap();
        port_map
            .transition(port_id, PortState::Allocated)
            .await
            .unwrap();
        pff.add(200, 0, flow_id).await.unwrap();

        let fmgr = FlowManager::new(port_map, efcp.clone(), pff);
        let (pdu, next_hop) = fmgr.n_write(port_id, vec![9, 9]).await.unwrap();
        assert_eq!(next_hop, flow_id);

        // Deliver to a fresh remote EFCP instance simulating the peer.
        let remote_efcp = Arc::new(RwLock::new(Efcp::new()));
        let remote_flow = {
            let mut remote = remote_efcp.write().await;
            remote.allocate_flow(200, 100, FlowConfig::default())
        };
        let remote_fmgr = FlowManager::new(Arc::new(FlowAllocator::new()), remote_efcp, pff_stub());
        let delivered = remote_fmgr.n_1_read(remote_flow, pdu).await.unwrap();
        assert_eq!(delivered, Some(vec![9, 9]));
    }

    fn pff_stub() -> Arc<Pff> {
        Arc::new(Pff::new())
    }

    #[test]
    fn round_robin_cursor_cycles() {
        let mut cursor = RoundRobinCursor::new(vec![1, 2, 3]);
        assert_eq!(cursor.next_port(), Some(1));
        assert_eq!(cursor.next_port(), Some(2));
        assert_eq!(cursor.next_port(), Some(3));
        assert_eq!(cursor.next_port(), Some(1));
    }

    #[test]
    fn round_robin_cursor_empty_returns_none() {
        let mut cursor = RoundRobinCursor::new(vec![]);
        assert_eq!(cursor.next_port(), None);
    }
}
