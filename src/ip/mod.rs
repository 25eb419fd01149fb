//! IP address allocation and management module.
//!
//! This module hands out non-overlapping address blocks to segments and
//! host addresses to devices, and keeps a registry that guarantees no address
//! is assigned twice across the whole topology.

pub mod allocator;
pub mod block;
pub mod registry;

// Re-export commonly used types
pub use allocator::{plan_hosts, AddressAllocator};
pub use block::{AddressBlock, AddressError};
pub use registry::GlobalIpRegistry;
