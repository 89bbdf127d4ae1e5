// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Error and Flow Control Protocol (EFCP)
//!
//! EFCP provides reliable and unreliable data transfer with flow control,
//! error detection, and retransmission capabilities. It's the core data
//! transfer protocol in RINA.

use crate::pdu::{Pdu, PduType};
use std::collections::{HashMap, VecDeque};
use std::time::{SystemTime, UNIX_EPOCH};

/// Flow state and configuration
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Maximum PDU size
    pub max_pdu_size: usize,
    /// Window size for flow control
    pub window_size: u64,
    /// Whether to use reliable transfer (ACKs and retransmission)
    pub reliable: bool,
    /// Timeout for retransmission (milliseconds)
    pub retransmit_timeout_ms: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            max_pdu_size: 1500,
            window_size: 64,
            reliable: true,
            retransmit_timeout_ms: 1000,
        }
    }
}

/// Represents a flow connection
#[derive(Debug)]
pub struct Flow {
    /// Flow identifier (port-id)
    pub flow_id: u32,
    /// Local CEP-ID
    pub local_cep_id: u32,
    /// Remote CEP-ID
    pub remote_cep_id: u32,
    /// Local address
    pub local_addr: u64,
    /// Remote address
    pub remote_addr: u64,
    /// Flow configuration
    pub config: FlowConfig,
    /// Next sequence number to send
    next_seq_num: u64,
    /// Expected next sequence number to receive
    expected_seq_num: u64,
    /// Send window: PDUs sent but not yet ACKed
    send_window: HashMap<u64, (Pdu, u64)>, // (PDU, timestamp)
    /// Receive buffer for out-of-order PDUs
    receive_buffer: VecDeque<Pdu>,
}

impl Flow {
    /// Creates a new flow
    pub fn new(
        flow_id: u32,
        local_cep_id: u32,
        remote_cep_id: u32,
        local_addr: u64,
        remote_addr: u64,
        config: FlowConfig,
    ) -> Self {
        Self {
            flow_id,
            local_cep_id,
            remote_cep_id,
            local_addr,
            remote_addr,
            config,
            next_seq_num: 0,
            expected_seq_num: 0,
            send_window: HashMap::new(),
            receive_buffer: VecDeque::new(),
        }
    }

    /// Prepares a PDU for sending data
    pub fn send_data(&mut self, payload: Vec<u8>) -> Result<Pdu, String> {
        if payload.len() > self.config.max_pdu_size {
            return Err(format!(
                "Payload size {} exceeds max PDU size {}",
                payload.len(),
                self.config.max_pdu_size
            ));
        }

        if self.send_window.len() >= self.config.window_size as usize {
            return Err("Send window is full".to_string());
        }

        let pdu = Pdu::new_data(
            self.local_addr,
            self.remote_addr,
            self.local_cep_id,
            self.remote_cep_id,
            self.next_seq_num,
            payload,
        );

        if self.config.reliable {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64;
            self.send_window
                .insert(self.next_seq_num, (pdu.clone(), timestamp));
        }

        self.next_seq_num += 1;
        Ok(pdu)
    }

    fn handle_data_pdu(&mut self, pdu: Pdu) -> Result<Option<Vec<u8>>, String> {
        if pdu.sequence_num == self.expected_seq_num {
            // In-order PDU
            self.expected_seq_num += 1;

            if self.config.reliable {
                // Generate ACK (caller should send this)
                // In a real implementation, we'd queue this for sending
            }

            Ok(Some(pdu.payload))
        } else if pdu.sequence_num > self.expected_seq_num {
            // Out-of-order PDU - buffer it
            self.receive_buffer.push_back(pdu);
            Ok(None)
        } else {
            // Duplicate or old PDU - discard
            Ok(None)
        }
    }

    fn handle_ack_pdu(&mut self, pdu: Pdu) -> Result<Option<Vec<u8>>, String> {
        let ack_num = pdu.sequence_num;

        // Remove ACKed PDUs from send window
        self.send_window.retain(|seq_num, _| *seq_num > ack_num);

        Ok(None)
    }

    fn handle_control_pdu(&mut self, _pdu: Pdu) -> Result<Option<Vec<u8>>, String> {
        // TODO: Handle control PDUs (e.g., flow control updates)
        Ok(None)
    }

    fn handle_management_pdu(&mut self, _pdu: Pdu) -> Result<Option<Vec<u8>>, String> {
        // Management PDUs should be handled by enrolment/cdap layers
        Ok(None)
    }

    /// Processes a received PDU
    pub fn receive_pdu(&mut self, pdu: Pdu) -> Result<Option<Vec<u8>>, String> {
        match pdu.pdu_type {
            PduType::Data => self.handle_data_pdu(pdu),
            PduType::Ack => self.handle_ack_pdu(pdu),
            PduType::Control => self.handle_control_pdu(pdu),
            PduType::Management => self.handle_management_pdu(pdu),
        }
    }

    /// Checks for PDUs that need retransmission
    pub fn check_retransmits(&self) -> Vec<Pdu> {
        if !self.config.reliable {
            return Vec::new();
        }

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;

        self.send_window
            .values()
            .filter(|(_, timestamp)| now - timestamp > self.config.retransmit_timeout_ms)
            .map(|(pdu, _)| pdu.clone())
            .collect()
    }

    /// Returns the current send window size
    pub fn send_window_size(&self) -> usize {
        self.send_window.len()
    }
}

/// Bijective flow-id <-> local-CEP-ID table. Each live flow owns
/// exactly one local CEP-ID and each local CEP-ID belongs to exactly
/// one flow; `bind`/`release` keep both maps in lockstep so the
/// mapping can never go one-sided.
#[derive(Debug, Default)]
pub struct CepTable {
    fd_to_cep: HashMap<u32, u32>,
    cep_to_fd: HashMap<u32, u32>,
    next_cep_id: u32,
}

impl CepTable {
    pub fn new() -> Self {
        Self {
            fd_to_cep: HashMap::new(),
            cep_to_fd: HashMap::new(),
            next_cep_id: 1,
        }
    }

    /// Assigns a fresh local CEP-ID to `fd`. Rejects a flow-id that is
    /// already bound; call `release` first to rebind it.
    pub fn bind(&mut self, fd: u32) -> Result<u32, String> {
        if self.fd_to_cep.contains_key(&fd) {
            return Err(format!("flow {fd} already bound to a CEP-ID"));
        }
        let cep_id = self.next_cep_id;
        self.next_cep_id += 1;
        self.fd_to_cep.insert(fd, cep_id);
        self.cep_to_fd.insert(cep_id, fd);
        Ok(cep_id)
    }

    pub fn cep_for(&self, fd: u32) -> Option<u32> {
        self.fd_to_cep.get(&fd).copied()
    }

    pub fn fd_for(&self, cep_id: u32) -> Option<u32> {
        self.cep_to_fd.get(&cep_id).copied()
    }

    pub fn release(&mut self, fd: u32) {
        if let Some(cep_id) = self.fd_to_cep.remove(&fd) {
            self.cep_to_fd.remove(&cep_id);
        }
    }

    pub fn len(&self) -> usize {
        self.fd_to_cep.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fd_to_cep.is_empty()
    }
}

/// EFCP instance managing multiple flows
#[derive(Debug)]
pub struct Efcp {
    /// Active flows, keyed by flow ID
    flows: HashMap<u32, Flow>,
    /// Next available flow ID
    next_flow_id: u32,
    /// flow-id <-> local CEP-ID bijection
    cep_table: CepTable,
}

impl Efcp {
    /// Creates a new EFCP instance
    pub fn new() -> Self {
        Self {
            flows: HashMap::new(),
            next_flow_id: 1,
            cep_table: CepTable::new(),
        }
    }

    /// Allocates a new flow, binding it a fresh local CEP-ID via the
    /// bijection table rather than reusing the flow-id directly.
    pub fn allocate_flow(&mut self, local_addr: u64, remote_addr: u64, config: FlowConfig) -> u32 {
        let flow_id = self.next_flow_id;
        self.next_flow_id += 1;

        let local_cep_id = self
            .cep_table
            .bind(flow_id)
            .expect("fresh flow_id cannot already be bound");

        let flow = Flow::new(
            flow_id,
            local_cep_id,
            0, // Remote CEP-ID will be set during connection
            local_addr,
            remote_addr,
            config,
        );

        self.flows.insert(flow_id, flow);
        flow_id
    }

    /// Gets a mutable reference to a flow
    pub fn get_flow_mut(&mut self, flow_id: u32) -> Option<&mut Flow> {
        self.flows.get_mut(&flow_id)
    }

    /// Gets a reference to a flow
    pub fn get_flow(&self, flow_id: u32) -> Option<&Flow> {
        self.flows.get(&flow_id)
    }

    /// Deallocates a flow, releasing its CEP-ID binding.
    pub fn deallocate_flow(&mut self, flow_id: u32) -> Result<(), String> {
        let removed = self
            .flows
            .remove(&flow_id)
            .map(|_| ())
            .ok_or_else(|| format!("Flow {} not found", flow_id));
        self.cep_table.release(flow_id);
        removed
    }

    /// Returns the number of active flows
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Local CEP-ID bound to a flow-id, if any.
    pub fn cep_id_for(&self, flow_id: u32) -> Option<u32> {
        self.cep_table.cep_for(flow_id)
    }

    /// Flow-id bound to a local CEP-ID, if any.
    pub fn flow_id_for_cep(&self, cep_id: u32) -> Option<u32> {
        self.cep_table.fd_for(cep_id)
    }

    /// N-1 interface: requests allocation of a flow underneath the
    /// flow manager's current connection. Thin alias over
    /// `allocate_flow` named for the caller's role.
    pub fn fmgr_np1_alloc(&mut self, local_addr: u64, remote_addr: u64, config: FlowConfig) -> u32 {
        self.allocate_flow(local_addr, remote_addr, config)
    }

    /// N-1 interface: records the peer's CEP-ID once the allocation
    /// response arrives.
    pub fn fmgr_np1_alloc_resp(&mut self, flow_id: u32, remote_cep_id: u32) -> Result<(), String> {
        let flow = self
            .flows
            .get_mut(&flow_id)
            .ok_or_else(|| format!("Flow {flow_id} not found"))?;
        flow.remote_cep_id = remote_cep_id;
        Ok(())
    }

    /// N-1 interface: tears down a flow the flow manager no longer
    /// needs.
    pub fn fmgr_np1_dealloc(&mut self, flow_id: u32) -> Result<(), String> {
        self.deallocate_flow(flow_id)
    }

    /// N-1 interface: hands an SDU down to be framed into a PDU for
    /// sending over `flow_id`.
    pub fn fmgr_np1_post_sdu(&mut self, flow_id: u32, payload: Vec<u8>) -> Result<Pdu, String> {
        let flow = self
            .get_flow_mut(flow_id)
            .ok_or_else(|| format!("Flow {flow_id} not found"))?;
        flow.send_data(payload)
    }

    /// N-1 interface: hands a PDU arriving on `flow_id` up to EFCP for
    /// reassembly/ack handling.
    pub fn fmgr_np1_post_buf(&mut self, flow_id: u32, pdu: Pdu) -> Result<Option<Vec<u8>>, String> {
        let flow = self
            .get_flow_mut(flow_id)
            .ok_or_else(|| format!("Flow {flow_id} not found"))?;
        flow.receive_pdu(pdu)
    }
}

impl Default for Efcp {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::Pdu;

    #[test]
    fn test_flow_send_data() {
        let mut flow = Flow::new(1, 10, 20, 100, 200, FlowConfig::default());

        let payload = vec![0xAA, 0xBB, 0xCC];
        let pdu = flow.send_data(payload.clone()).unwrap();

        assert_eq!(pdu.sequence_num, 0);
        assert_eq!(pdu.payload, payload);
        assert_eq!(flow.next_seq_num, 1);
    }

    #[test]
    fn test_flow_receive_in_order() {
        let mut flow = Flow::new(1, 10, 20, 100, 200, FlowConfig::default());

        let pdu = Pdu::new_data(200, 100, 20, 10, 0, vec![1, 2, 3]);
        let result = flow.receive_pdu(pdu).unwrap();

        assert!(result.is_some());
        assert_eq!(result.unwrap(), vec![1, 2, 3]);
        assert_eq!(flow.expected_seq_num, 1);
    }

    #[test]
    fn test_flow_receive_out_of_order() {
        let mut flow = Flow::new(1, 10, 20, 100, 200, FlowConfig::default());

        // Receive PDU with seq_num 2 (expecting 0)
        let pdu = Pdu::new_data(200, 100, 20, 10, 2, vec![1, 2, 3]);
        let result = flow.receive_pdu(pdu).unwrap();

        // Should buffer it
        assert!(result.is_none());
        assert_eq!(flow.receive_buffer.len(), 1);
    }

    #[test]
    fn test_efcp_flow_allocation() {
        let mut efcp = Efcp::new();

        let flow_id1 = efcp.allocate_flow(100, 200, FlowConfig::default());
        let flow_id2 = efcp.allocate_flow(100, 300, FlowConfig::default());

        assert_eq!(flow_id1, 1);
        assert_eq!(flow_id2, 2);
        assert_eq!(efcp.flow_count(), 2);
    }

    #[test]
    fn test_efcp_flow_deallocation() {
        let mut efcp = Efcp::new();

        let flow_id = efcp.allocate_flow(100, 200, FlowConfig::default());
        assert_eq!(efcp.flow_count(), 1);

        efcp.deallocate_flow(flow_id).unwrap();
        assert_eq!(efcp.flow_count(), 0);
    }

    #[test]
    fn test_ack_handling() {
        let mut flow = Flow::new(1, 10, 20, 100, 200, FlowConfig::default());

        // Send some data
        flow.send_data(vec![1]).unwrap();
        flow.send_data(vec![2]).unwrap();
        assert_eq!(flow.send_window_size(), 2);

        // Receive ACK for seq_num 0
        let ack = Pdu::new_ack(200, 100, 20, 10, 0);
        flow.receive_pdu(ack).unwrap();

        // Window should be reduced
        assert_eq!(flow.send_window_size(), 1);
    }

    #[test]
    fn test_window_full() {
        let config = FlowConfig {
            window_size: 2,
            ..Default::default()
        };
        let mut flow = Flow::new(1, 10, 20, 100, 200, config);

        // Fill the window
        flow.send_data(vec![1]).unwrap();
        flow.send_data(vec![2]).unwrap();

        // Try to send one more - should fail
        let result = flow.send_data(vec![3]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cep_table_is_bijective() {
        let mut table = CepTable::new();
        let cep1 = table.bind(1).unwrap();
        let cep2 = table.bind(2).unwrap();

        assert_ne!(cep1, cep2);
        assert_eq!(table.cep_for(1), Some(cep1));
        assert_eq!(table.fd_for(cep1), Some(1));
        assert_eq!(table.cep_for(2), Some(cep2));
        assert_eq!(table.fd_for(cep2), Some(2));
    }

    #[test]
    fn test_cep_table_rejects_double_bind() {
        let mut table = CepTable::new();
        table.bind(1).unwrap();
        assert!(table.bind(1).is_err());
    }

    #[test]
    fn test_cep_table_release_clears_both_directions() {
        let mut table = CepTable::new();
        let cep_id = table.bind(1).unwrap();
        table.release(1);
        assert_eq!(table.cep_for(1), None);
        assert_eq!(table.fd_for(cep_id), None);
    }

    #[test]
    fn test_efcp_allocate_flow_binds_cep_id() {
        let mut efcp = Efcp::new();
        let flow_id = efcp.allocate_flow(100, 200, FlowConfig::default());

        let cep_id = efcp.cep_id_for(flow_id).unwrap();
        assert_eq!(efcp.flow_id_for_cep(cep_id), Some(flow_id));
        assert_eq!(efcp.get_flow(flow_id).unwrap().local_cep_id, cep_id);
    }

    #[test]
    fn test_efcp_deallocate_releases_cep_id() {
        let mut efcp = Efcp::new();
        let flow_id = efcp.allocate_flow(100, 200, FlowConfig::default());
        let cep_id = efcp.cep_id_for(flow_id).unwrap();

        efcp.deallocate_flow(flow_id).unwrap();
        assert_eq!(efcp.cep_id_for(flow_id), None);
        assert_eq!(efcp.flow_id_for_cep(cep_id), None);
    }

    #[test]
    fn test_fmgr_np1_post_sdu_and_buf_roundtrip() {
        let mut local = Efcp::new();
        let mut remote = Efcp::new();

        let local_flow = local.fmgr_np1_alloc(100, 200, FlowConfig::default());
        let remote_flow = remote.fmgr_np1_alloc(200, 100, FlowConfig::default());

        let local_cep = local.cep_id_for(local_flow).unwrap();
        let remote_cep = remote.cep_id_for(remote_flow).unwrap();
        local.fmgr_np1_alloc_resp(local_flow, remote_cep).unwrap();
        remote.fmgr_np1_alloc_resp(remote_flow, local_cep).unwrap();

        let pdu = local.fmgr_np1_post_sdu(local_flow, vec![9, 9]).unwrap();
        let delivered = remote.fmgr_np1_post_buf(remote_flow, pdu).unwrap();
        assert_eq!(delivered, Some(vec![9, 9]));
    }
}
