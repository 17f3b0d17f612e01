//! # Job Envelopes
//!
//! Typed, self-validating messages exchanged between the validation platform
//! and its validator workers. The platform sends a [`ValidationInputEnvelope`]
//! describing a job; the worker answers with a [`ValidationOutputEnvelope`]
//! and optionally POSTs a [`ValidationCallback`].
//!
//! Every decode and every build runs the same rule set: the JSON contracts
//! under `contracts/` plus the cross-field checks in [`codec`]. A failure
//! lists every violated field, never just the first.
//!
//! ```rust
//! use job_envelope::*;
//!
//! let text = r#"{
//!     "run_id": "run-123",
//!     "validator": {"id": "v1", "type": "basic", "version": "1.0"},
//!     "input_files": [],
//!     "inputs": {},
//!     "context": {}
//! }"#;
//!
//! let envelope: ValidationInputEnvelope = deserialize(text).expect("valid envelope");
//! assert_eq!(envelope.run_id, "run-123");
//!
//! let output = OutputEnvelopeBuilder::answering(&envelope)
//!     .success()
//!     .add_info("OK")
//!     .add_metric(ValidationMetric::new("checked_files", 0.0))
//!     .build()
//!     .expect("valid output");
//! assert!(output.to_json().is_ok());
//! ```
//!
//! ## Domains
//!
//! A domain swaps the open `inputs` / `outputs` maps for its own types:
//!
//! ```rust,ignore
//! #[derive(Debug, Clone, PartialEq, Domain)]
//! #[domain(
//!     name = "energy_simulation",
//!     types(EnergySimulation),
//!     inputs = EnergyPlusInputs,
//!     outputs = EnergyPlusOutputs,
//!     inputs_schema = "../../contracts/domains/energyplus/inputs.v1.json",
//!     outputs_schema = "../../contracts/domains/energyplus/outputs.v1.json",
//! )]
//! pub struct EnergyPlus;
//!
//! let envelope: ValidationInputEnvelope<EnergyPlus> = deserialize(text)?;
//! ```

pub mod builder;
pub mod codec;
pub mod domain;
pub mod envelope;
pub mod probe;
pub mod validation;

pub use builder::*;
pub use codec::{
    deserialize, deserialize_with, from_value_with, serialize, serialize_pretty, validate,
    Envelope,
};
pub use domain::*;
pub use envelope::*;
pub use probe::*;
pub use validation::*;

pub use job_envelope_derive::Domain;
