//! Shared utilities: data-rate units and address plan validation.

pub mod units;
pub mod validation;

pub use units::DataRate;
pub use validation::validate_address_plan;
