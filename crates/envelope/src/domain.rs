//! Domain extensions.
//!
//! A domain replaces the open `inputs` / `outputs` maps of the base envelope
//! with its own typed payloads and declares which validator types it serves.
//! Everything else on the envelope is shared, so code written against
//! [`InputHeader`] / [`OutputHeader`] works for every domain.

use crate::envelope::{
    ExecutionContext, InputFileItem, ValidationArtifact, ValidationCallback,
    ValidationInputEnvelope, ValidationMessage, ValidationMetric, ValidationOutputEnvelope,
    ValidationStatus, ValidatorInfo, ValidatorType, Severity,
};
use crate::validation::EnvelopeError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Debug;

const GENERIC_PAYLOAD_SCHEMA: &str =
    include_str!("../../../contracts/domains/generic/payload.v1.json");

/// Open key/value payload used by the base envelope.
pub type Payload = serde_json::Map<String, Value>;

pub trait Domain: Debug + Clone + PartialEq + Send + Sync + 'static {
    type Inputs: Serialize + DeserializeOwned + Debug + Clone + PartialEq + Default + Send + Sync;
    type Outputs: Serialize + DeserializeOwned + Debug + Clone + PartialEq + Send + Sync;

    /// Short name used in violation messages and logs.
    const NAME: &'static str;

    fn validator_types() -> &'static [ValidatorType];

    /// JSON Schema (Draft 7) for `inputs`.
    fn inputs_schema() -> &'static str;

    /// JSON Schema (Draft 7) for a non-null `outputs`.
    fn outputs_schema() -> &'static str;

    fn inputs_required() -> bool {
        true
    }

    fn serves(validator_type: ValidatorType) -> bool {
        Self::validator_types().contains(&validator_type)
    }
}

/// The structural floor: open maps for `inputs` and `outputs`, every
/// validator type accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Generic;

impl Domain for Generic {
    type Inputs = Payload;
    type Outputs = Payload;

    const NAME: &'static str = "generic";

    fn validator_types() -> &'static [ValidatorType] {
        &ValidatorType::ALL
    }

    fn inputs_schema() -> &'static str {
        GENERIC_PAYLOAD_SCHEMA
    }

    fn outputs_schema() -> &'static str {
        GENERIC_PAYLOAD_SCHEMA
    }

    fn inputs_required() -> bool {
        false
    }
}

pub trait InputHeader {
    fn run_id(&self) -> &str;
    fn validator(&self) -> &ValidatorInfo;
    fn input_files(&self) -> &[InputFileItem];
    fn context(&self) -> &ExecutionContext;

    fn validator_type(&self) -> ValidatorType {
        self.validator().validator_type
    }

    fn file_with_role(&self, role: &str) -> Option<&InputFileItem> {
        self.input_files()
            .iter()
            .find(|f| f.role.as_deref() == Some(role))
    }
}

pub trait OutputHeader {
    fn run_id(&self) -> &str;
    fn validator(&self) -> Option<&ValidatorInfo>;
    fn status(&self) -> ValidationStatus;
    fn messages(&self) -> &[ValidationMessage];
    fn metrics(&self) -> &[ValidationMetric];
    fn artifacts(&self) -> &[ValidationArtifact];
    fn execution_seconds(&self) -> Option<f64>;
    fn has_outputs(&self) -> bool;

    fn messages_with(&self, severity: Severity) -> Vec<&ValidationMessage> {
        self.messages()
            .iter()
            .filter(|m| m.severity == severity)
            .collect()
    }

    fn has_errors(&self) -> bool {
        self.messages().iter().any(|m| m.severity == Severity::Error)
    }

    /// True when an `error` status still carries domain outputs. Accepted
    /// by the contract but usually a worker bug.
    fn is_suspicious(&self) -> bool {
        self.status() == ValidationStatus::Error && self.has_outputs()
    }
}

impl<D: Domain> InputHeader for ValidationInputEnvelope<D> {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn validator(&self) -> &ValidatorInfo {
        &self.validator
    }

    fn input_files(&self) -> &[InputFileItem] {
        &self.input_files
    }

    fn context(&self) -> &ExecutionContext {
        &self.context
    }
}

impl<D: Domain> OutputHeader for ValidationOutputEnvelope<D> {
    fn run_id(&self) -> &str {
        &self.run_id
    }

    fn validator(&self) -> Option<&ValidatorInfo> {
        self.validator.as_ref()
    }

    fn status(&self) -> ValidationStatus {
        self.status
    }

    fn messages(&self) -> &[ValidationMessage] {
        &self.messages
    }

    fn metrics(&self) -> &[ValidationMetric] {
        &self.metrics
    }

    fn artifacts(&self) -> &[ValidationArtifact] {
        &self.artifacts
    }

    fn execution_seconds(&self) -> Option<f64> {
        self.execution_seconds
    }

    fn has_outputs(&self) -> bool {
        self.outputs.is_some()
    }
}

fn to_payload<T: Serialize>(value: &T, field: &str) -> Result<Payload, EnvelopeError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(EnvelopeError::Encode {
            message: format!("{field} serialized to {other}, expected an object"),
        }),
        Err(e) => Err(EnvelopeError::Encode {
            message: e.to_string(),
        }),
    }
}

impl<D: Domain> ValidationInputEnvelope<D> {
    /// Erases the domain, keeping `inputs` as an open map.
    pub fn into_generic(self) -> Result<ValidationInputEnvelope<Generic>, EnvelopeError> {
        let inputs = to_payload(&self.inputs, "inputs")?;
        Ok(ValidationInputEnvelope {
            schema_version: self.schema_version,
            run_id: self.run_id,
            validator: self.validator,
            org: self.org,
            workflow: self.workflow,
            input_files: self.input_files,
            resource_files: self.resource_files,
            inputs,
            context: self.context,
        })
    }
}

impl<D: Domain> ValidationOutputEnvelope<D> {
    /// Erases the domain, keeping `outputs` as an open map.
    pub fn into_generic(self) -> Result<ValidationOutputEnvelope<Generic>, EnvelopeError> {
        let outputs = self
            .outputs
            .as_ref()
            .map(|outputs| to_payload(outputs, "outputs"))
            .transpose()?;
        Ok(ValidationOutputEnvelope {
            schema_version: self.schema_version,
            run_id: self.run_id,
            validator: self.validator,
            status: self.status,
            timing: self.timing,
            messages: self.messages,
            metrics: self.metrics,
            artifacts: self.artifacts,
            raw_outputs: self.raw_outputs,
            outputs,
            execution_seconds: self.execution_seconds,
        })
    }
}

impl<D: Domain> ValidationCallback<D> {
    pub fn into_generic(self) -> Result<ValidationCallback<Generic>, EnvelopeError> {
        Ok(ValidationCallback {
            run_id: self.run_id,
            callback_id: self.callback_id,
            status: self.status,
            result_uri: self.result_uri,
            output: self.output.map(|o| o.into_generic()).transpose()?,
        })
    }
}
