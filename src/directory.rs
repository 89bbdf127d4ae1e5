// SPDX-License-Identifier: EUPL-1.2-or-later
// Copyright © 2026-present ARI Contributors

//! Directory Service
//!
//! Provides name resolution and registration for RINA.
//! Maps application names to IPCP addresses.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

/// A naming entry in the directory
#[derive(Debug, Clone)]
pub struct DirectoryEntry {
    /// Application or process name
    pub name: String,
    /// List of addresses where this name is registered
    pub addresses: Vec<u64>,
    /// Timestamp of registration (Unix epoch seconds)
    pub timestamp: u64,
}

/// Directory Service for name resolution
#[derive(Debug, Clone)]
pub struct Directory {
    /// Map of names to directory entries
    entries: Arc<RwLock<HashMap<String, DirectoryEntry>>>,
}

impl Directory {
    /// Creates a new directory service
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Registers a name at a specific address
    pub fn register(&self, name: String, address: u64) -> Result<(), String> {
        let mut entries = self.entries.write().unwrap();
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();

        entries
            .entry(name.clone())
            .and_modify(|e| {
                if !e.addresses.contains(&address) {
                    e.addresses.push(address);
                }
                e.timestamp = timestamp;
            })
            .or_insert(DirectoryEntry {
                name,
                addresses: vec![address],
                timestamp,
            });

        Ok(())
    }

    /// Unregisters a name from a specific address
    pub fn unregister(&self, name: &str, address: u64) -> Result<(), String> {
        let mut entries = self.entries.write().unwrap();

        if let Some(entry) = entries.get_mut(name) {
            entry.addresses.retain(|&addr| addr != address);
            if entry.addresses.is_empty() {
                entries.remove(name);
            }
            Ok(())
        } else {
            Err(format!("Name '{}' not found", name))
        }
    }

    /// Resolves a name to a list of addresses
    pub fn resolve(&self, name: &str) -> Option<Vec<u64>> {
        let entries = self.entries.read().unwrap();
        entries.get(name).map(|e| e.addresses.clone())
    }

    /// Lists all registered names
    pub fn list_names(&self) -> Vec<String> {
        let entries = self.entries.read().unwrap();
        entries.keys().cloned().collect()
    }

    /// Returns the number of registered names
    pub fn count(&self) -> usize {
        let entries = self.entries.read().unwrap();
        entries.len()
    }

    /// Clears all entries
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap();
        entries.clear();
    }
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

/// Allocates RINA addresses from an inclusive range to members joining a
/// DIF through a bootstrap IPCP during enrolment.
///
/// Grounded on the same `Arc<RwLock<..>>` ownership pattern as [`Directory`];
/// the allocation set plays the role the port-id bitmap plays for flow
/// descriptors (§4.1 of the design), scaled down to the much smaller
/// address-pool cardinality.
#[derive(Debug)]
pub struct AddressPool {
    start: u64,
    end: u64,
    allocated: RwLock<HashSet<u64>>,
    next_hint: RwLock<u64>,
}

impl AddressPool {
    /// Creates a new address pool over the inclusive range `[start, end]`.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end,
            allocated: RwLock::new(HashSet::new()),
            next_hint: RwLock::new(start),
        }
    }

    /// Allocates the next free address in the pool.
    pub fn allocate(&self) -> Result<u64, String> {
        let mut allocated = self.allocated.write().unwrap();
        if allocated.len() as u64 > self.end - self.start {
            return Err("address pool exhausted".to_string());
        }

        let mut hint = self.next_hint.write().unwrap();
        let mut candidate = *hint;
        loop {
            if !allocated.contains(&candidate) {
                allocated.insert(candidate);
                *hint = if candidate == self.end {
                    self.start
                } else {
                    candidate + 1
                };
                return Ok(candidate);
            }
            candidate = if candidate == self.end {
                self.start
            } else {
                candidate + 1
            };
            if candidate == *hint {
                return Err("address pool exhausted".to_string());
            }
        }
    }

    /// Releases a previously allocated address back to the pool.
    pub fn release(&self, address: u64) {
        let mut allocated = self.allocated.write().unwrap();
        allocated.remove(&address);
    }

    /// Returns whether an address is currently allocated.
    pub fn is_allocated(&self, address: u64) -> bool {
        let allocated = self.allocated.read().unwrap();
        allocated.contains(&address)
    }

    /// Number of addresses currently allocated.
    pub fn allocated_count(&self) -> usize {
        self.allocated.read().unwrap().len()
    }

    /// Total capacity of the pool.
    pub fn capacity(&self) -> u64 {
        self.end - self.start + 1
    }
}
