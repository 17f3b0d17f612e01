use job_envelope::{require_failure_reasons, ProbeReport, ProbeStatus, SchemaValidationError};
use serde::{Deserialize, Serialize};

/// One variable declared in `modelDescription.xml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FmiVariableMeta {
    pub name: String,
    pub causality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variability: Option<String>,
    #[serde(default)]
    pub value_reference: u32,
    pub value_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl FmiVariableMeta {
    pub fn new(
        name: impl Into<String>,
        causality: impl Into<String>,
        value_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            causality: causality.into(),
            variability: None,
            value_reference: 0,
            value_type: value_type.into(),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_value_reference(mut self, value_reference: u32) -> Self {
        self.value_reference = value_reference;
        self
    }
}

/// Result of vetting an FMU before it is approved for use. Probing only
/// reads metadata, so it never runs inside a worker envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FmiProbeResult {
    #[serde(default)]
    pub status: ProbeStatus,
    #[serde(default)]
    pub variables: Vec<FmiVariableMeta>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub messages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_seconds: Option<f64>,
}

impl FmiProbeResult {
    pub fn success(
        variables: Vec<FmiVariableMeta>,
        execution_seconds: Option<f64>,
        messages: Vec<String>,
    ) -> Self {
        Self {
            status: ProbeStatus::Success,
            variables,
            errors: Vec::new(),
            messages,
            execution_seconds,
        }
    }

    /// Fails with `RequiredFieldEmpty` at `errors` when no reason is given.
    pub fn failure(
        errors: Vec<String>,
        messages: Vec<String>,
    ) -> Result<Self, SchemaValidationError> {
        require_failure_reasons(&errors)?;
        Ok(Self {
            status: ProbeStatus::Error,
            variables: Vec::new(),
            errors,
            messages,
            execution_seconds: None,
        })
    }

    pub fn variables_with_causality<'a>(
        &'a self,
        causality: &'a str,
    ) -> impl Iterator<Item = &'a FmiVariableMeta> + 'a {
        self.variables
            .iter()
            .filter(move |v| v.causality == causality)
    }
}

impl ProbeReport for FmiProbeResult {
    fn status(&self) -> ProbeStatus {
        self.status
    }

    fn errors(&self) -> &[String] {
        &self.errors
    }

    fn messages(&self) -> &[String] {
        &self.messages
    }
}
