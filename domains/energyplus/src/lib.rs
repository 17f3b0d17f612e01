//! Energy-simulation (EnergyPlus) domain extension.
//!
//! Input envelopes carry [`EnergyPlusInputs`] and output envelopes carry
//! [`EnergyPlusOutputs`]; both are checked against the contracts under
//! `contracts/domains/energyplus/`.

pub mod envelopes;
pub mod models;

pub use envelopes::*;
pub use models::*;
