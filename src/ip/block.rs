//! IPv4 address blocks.
//!
//! An [`AddressBlock`] is a network address plus a prefix length. Hosts are
//! numbered from the first usable address (network + 1) upward; the network
//! and broadcast addresses are never handed out for prefixes shorter than /31.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors raised while planning or assigning address blocks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Invalid address block '{0}'")]
    InvalidBlock(String),
    #[error("Prefix length /{0} is out of range (expected 0-32)")]
    InvalidPrefix(u8),
    #[error("Address block {block} has room for {capacity} hosts but segment '{segment}' has {requested} devices")]
    BlockExhausted {
        segment: String,
        block: AddressBlock,
        capacity: u64,
        requested: usize,
    },
    #[error("Address blocks {0} and {1} overlap")]
    OverlappingBlocks(AddressBlock, AddressBlock),
    #[error("No address space left after {0}")]
    SpaceExhausted(AddressBlock),
    #[error("Address {address} already assigned to {owner}")]
    DuplicateAddress { address: Ipv4Addr, owner: String },
}

/// A contiguous IPv4 network, e.g. `10.1.1.0/24`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressBlock {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl AddressBlock {
    /// Build a block; host bits of `network` are cleared.
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self, AddressError> {
        if prefix_len > 32 {
            return Err(AddressError::InvalidPrefix(prefix_len));
        }
        let mask = Self::mask_bits(prefix_len);
        Ok(AddressBlock {
            network: Ipv4Addr::from(u32::from(network) & mask),
            prefix_len,
        })
    }

    /// Build a block from a network address and a dotted mask like `255.255.255.0`
    pub fn with_mask(network: Ipv4Addr, mask: Ipv4Addr) -> Result<Self, AddressError> {
        let bits = u32::from(mask);
        let prefix_len = bits.leading_ones() as u8;
        if bits.count_ones() != prefix_len as u32 {
            return Err(AddressError::InvalidBlock(format!("{}/{}", network, mask)));
        }
        Self::new(network, prefix_len)
    }

    fn mask_bits(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - prefix_len as u32)
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn mask(&self) -> Ipv4Addr {
        Ipv4Addr::from(Self::mask_bits(self.prefix_len))
    }

    /// Number of addresses covered by the block, including network and broadcast
    pub fn size(&self) -> u64 {
        1u64 << (32 - self.prefix_len as u32)
    }

    /// Number of assignable host addresses
    pub fn host_capacity(&self) -> u64 {
        match self.prefix_len {
            32 => 1,
            31 => 2,
            _ => self.size() - 2,
        }
    }

    /// First address handed to a device
    pub fn first_host(&self) -> Ipv4Addr {
        if self.prefix_len >= 31 {
            self.network
        } else {
            Ipv4Addr::from(u32::from(self.network) + 1)
        }
    }

    /// The `index`-th host address (0-based), if it fits in the block
    pub fn host(&self, index: u64) -> Option<Ipv4Addr> {
        if index >= self.host_capacity() {
            return None;
        }
        Some(Ipv4Addr::from(u32::from(self.first_host()) + index as u32))
    }

    fn last_address(&self) -> u32 {
        u32::from(self.network) + (self.size() - 1) as u32
    }

    pub fn contains(&self, address: Ipv4Addr) -> bool {
        u32::from(address) & Self::mask_bits(self.prefix_len) == u32::from(self.network)
    }

    pub fn overlaps(&self, other: &AddressBlock) -> bool {
        u32::from(self.network) <= other.last_address() && u32::from(other.network) <= self.last_address()
    }

    /// The block of the same size that immediately follows this one
    pub fn next(&self) -> Option<AddressBlock> {
        let next = u64::from(u32::from(self.network)) + self.size();
        if next > u64::from(u32::MAX) {
            return None;
        }
        Some(AddressBlock {
            network: Ipv4Addr::from(next as u32),
            prefix_len: self.prefix_len,
        })
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for AddressBlock {
    type Err = AddressError;

    /// Accepts `10.1.1.0/24` or `10.1.1.0/255.255.255.0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AddressError::InvalidBlock(s.to_string());
        let (network, suffix) = s.trim().split_once('/').ok_or_else(invalid)?;
        let network: Ipv4Addr = network.parse().map_err(|_| invalid())?;

        if let Ok(prefix_len) = suffix.parse::<u8>() {
            Self::new(network, prefix_len)
        } else {
            let mask: Ipv4Addr = suffix.parse().map_err(|_| invalid())?;
            Self::with_mask(network, mask)
        }
    }
}

impl TryFrom<String> for AddressBlock {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AddressBlock> for String {
    fn from(block: AddressBlock) -> Self {
        block.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_forms() {
        let a: AddressBlock = "10.1.1.0/24".parse().unwrap();
        let b: AddressBlock = "10.1.1.0/255.255.255.0".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.mask(), Ipv4Addr::new(255, 255, 255, 0));
        assert!("10.1.1.0".parse::<AddressBlock>().is_err());
        assert!("10.1.1.0/33".parse::<AddressBlock>().is_err());
        assert!("10.1.1.0/255.0.255.0".parse::<AddressBlock>().is_err());
    }

    #[test]
    fn test_host_numbering() {
        let block: AddressBlock = "10.1.2.0/24".parse().unwrap();
        assert_eq!(block.host_capacity(), 254);
        assert_eq!(block.first_host(), Ipv4Addr::new(10, 1, 2, 1));
        assert_eq!(block.host(253), Some(Ipv4Addr::new(10, 1, 2, 254)));
        assert_eq!(block.host(254), None);

        let p2p: AddressBlock = "10.0.0.0/31".parse().unwrap();
        assert_eq!(p2p.host_capacity(), 2);
        assert_eq!(p2p.host(1), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn test_host_bits_are_cleared() {
        let block = AddressBlock::new(Ipv4Addr::new(10, 1, 3, 77), 24).unwrap();
        assert_eq!(block.network(), Ipv4Addr::new(10, 1, 3, 0));
    }

    #[test]
    fn test_overlap_and_next() {
        let a: AddressBlock = "10.1.1.0/24".parse().unwrap();
        let b = a.next().unwrap();
        assert_eq!(b.to_string(), "10.1.2.0/24");
        assert!(!a.overlaps(&b));

        let wide: AddressBlock = "10.1.0.0/16".parse().unwrap();
        assert!(wide.overlaps(&a));
        assert!(a.overlaps(&wide));
        assert!(wide.contains(Ipv4Addr::new(10, 1, 200, 3)));

        let last: AddressBlock = "255.255.255.0/24".parse().unwrap();
        assert_eq!(last.next(), None);
    }
}
