//! Model-exchange (FMI) domain extension.
//!
//! Workers simulate an uploaded FMU with [`FmiInputs`] and report
//! [`FmiOutputs`]. [`FmiProbeResult`] covers the metadata-only check the
//! platform runs before an FMU is approved.

pub mod envelopes;
pub mod probe;

pub use envelopes::*;
pub use probe::*;
