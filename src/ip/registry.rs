//! IP address registry.
//!
//! Keeps a topology-wide record of which device owns which address so that
//! no address is ever handed out twice, even across segments.

use std::collections::{BTreeMap, HashMap};
use std::net::Ipv4Addr;

use super::block::AddressError;

/// Global IP Registry for centralized address bookkeeping across all segments
#[derive(Debug, Default)]
pub struct GlobalIpRegistry {
    /// Address -> owner label (e.g. "n5/dev0")
    assigned_ips: HashMap<Ipv4Addr, String>,
}

impl GlobalIpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `address` as owned by `owner`.
    ///
    /// Re-registering the same address for the same owner is a no-op; any
    /// other collision is an error.
    pub fn register(&mut self, address: Ipv4Addr, owner: &str) -> Result<(), AddressError> {
        match self.assigned_ips.get(&address) {
            Some(existing) if existing == owner => Ok(()),
            Some(existing) => Err(AddressError::DuplicateAddress {
                address,
                owner: existing.clone(),
            }),
            None => {
                self.assigned_ips.insert(address, owner.to_string());
                Ok(())
            }
        }
    }

    pub fn owner_of(&self, address: Ipv4Addr) -> Option<&str> {
        self.assigned_ips.get(&address).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.assigned_ips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned_ips.is_empty()
    }

    /// All assignments in address order, for logging and debugging
    pub fn assignments(&self) -> BTreeMap<Ipv4Addr, &str> {
        self.assigned_ips
            .iter()
            .map(|(ip, owner)| (*ip, owner.as_str()))
            .collect()
    }
}
