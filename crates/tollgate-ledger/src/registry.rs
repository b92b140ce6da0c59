use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tollgate_core::{Address, HostEntry};

use crate::error::LedgerError;

/// Host endpoints keyed by operator, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRegistry {
    hosts: IndexMap<Address, HostEntry>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `operator`'s endpoint as active. Re-registering an operator
    /// replaces url and weight, reactivates the entry, and keeps its
    /// position.
    pub fn add(&mut self, url: impl Into<String>, operator: Address, weight: u64) -> HostEntry {
        let entry = HostEntry {
            operator,
            url: url.into(),
            weight,
            active: true,
        };
        self.hosts.insert(operator, entry.clone());
        entry
    }

    /// Remove `operator`'s entry, preserving the order of the rest.
    pub fn remove(&mut self, operator: &Address) -> Result<HostEntry, LedgerError> {
        self.hosts
            .shift_remove(operator)
            .ok_or(LedgerError::NotFound(*operator))
    }

    pub fn set_active(&mut self, operator: &Address, active: bool) -> Result<HostEntry, LedgerError> {
        let entry = self
            .hosts
            .get_mut(operator)
            .ok_or(LedgerError::NotFound(*operator))?;
        entry.active = active;
        Ok(entry.clone())
    }

    pub fn get(&self, operator: &Address) -> Result<HostEntry, LedgerError> {
        self.hosts
            .get(operator)
            .cloned()
            .ok_or(LedgerError::NotFound(*operator))
    }

    /// Every entry, paused or not.
    pub fn all(&self) -> Vec<HostEntry> {
        self.hosts.values().cloned().collect()
    }

    /// Entries eligible for traffic.
    pub fn active(&self) -> Vec<HostEntry> {
        self.hosts.values().filter(|h| h.active).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
