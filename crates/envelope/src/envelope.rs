use crate::domain::{Domain, Generic};
use crate::validation::{SchemaValidationError, Violation, ViolationReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const INPUT_SCHEMA_VERSION: &str = "job.input.v1";
pub const OUTPUT_SCHEMA_VERSION: &str = "job.output.v1";

fn input_schema_version() -> String {
    INPUT_SCHEMA_VERSION.to_string()
}

fn output_schema_version() -> String {
    OUTPUT_SCHEMA_VERSION.to_string()
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Closed set of validator kinds. Adding a domain means adding a member here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ValidatorType {
    Basic,
    JsonSchema,
    XmlSchema,
    EnergySimulation,
    ModelExchange,
    CustomValidator,
    AiAssist,
}

impl ValidatorType {
    pub const ALL: [ValidatorType; 7] = [
        ValidatorType::Basic,
        ValidatorType::JsonSchema,
        ValidatorType::XmlSchema,
        ValidatorType::EnergySimulation,
        ValidatorType::ModelExchange,
        ValidatorType::CustomValidator,
        ValidatorType::AiAssist,
    ];

    /// Tokens used before the energy-simulation and model-exchange domains
    /// were renamed. Only honoured under `LegacyTypePolicy::AcceptAliases`.
    pub const LEGACY_ALIASES: [(&'static str, ValidatorType); 2] = [
        ("energyplus", ValidatorType::EnergySimulation),
        ("fmu", ValidatorType::ModelExchange),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::JsonSchema => "json_schema",
            Self::XmlSchema => "xml_schema",
            Self::EnergySimulation => "energy_simulation",
            Self::ModelExchange => "model_exchange",
            Self::CustomValidator => "custom_validator",
            Self::AiAssist => "ai_assist",
        }
    }

    pub fn allowed_tokens() -> Vec<String> {
        Self::ALL.iter().map(|t| t.as_str().to_string()).collect()
    }

    pub fn from_legacy_alias(token: &str) -> Option<Self> {
        Self::LEGACY_ALIASES
            .iter()
            .find(|(alias, _)| *alias == token)
            .map(|(_, canonical)| *canonical)
    }
}

impl fmt::Display for ValidatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidatorType {
    type Err = SchemaValidationError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == token)
            .ok_or_else(|| {
                SchemaValidationError::single(Violation::new(
                    "type",
                    ViolationReason::InvalidEnumValue {
                        value: token.to_string(),
                        allowed: Self::allowed_tokens(),
                    },
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// `Failure` means the subject failed validation; `Error` means the worker
/// could not complete the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    Success,
    Failure,
    Error,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }
}

/// MIME types the shipped validators know how to process. `mime_type` stays a
/// free-form string on the wire; these are conveniences for producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedMimeType {
    ApplicationXml,
    TextXml,
    EnergyPlusIdf,
    EnergyPlusEpJson,
    EnergyPlusEpw,
    Fmu,
}

impl SupportedMimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApplicationXml => "application/xml",
            Self::TextXml => "text/xml",
            Self::EnergyPlusIdf => "application/vnd.energyplus.idf",
            Self::EnergyPlusEpJson => "application/vnd.energyplus.epjson",
            Self::EnergyPlusEpw => "application/vnd.energyplus.epw",
            Self::Fmu => "application/vnd.fmi.fmu",
        }
    }
}

impl From<SupportedMimeType> for String {
    fn from(mime: SupportedMimeType) -> Self {
        mime.as_str().to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidatorInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub validator_type: ValidatorType,
    pub version: String,
}

impl ValidatorInfo {
    pub fn new(
        id: impl Into<String>,
        validator_type: ValidatorType,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            validator_type,
            version: version.into(),
        }
    }

    /// Builds validator identity from an untrusted type token.
    pub fn parse(
        id: impl Into<String>,
        validator_type: &str,
        version: impl Into<String>,
    ) -> Result<Self, SchemaValidationError> {
        let validator_type = validator_type.parse::<ValidatorType>()?;
        Ok(Self::new(id, validator_type, version))
    }
}

/// A reference to a user-submitted file. Never the bytes themselves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputFileItem {
    pub name: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub uri: String,
}

impl InputFileItem {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            role: None,
            uri: uri.into(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Auxiliary file managed by administrators (weather data, libraries).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceFileItem {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub uri: String,
}

impl ResourceFileItem {
    pub fn new(
        id: impl Into<String>,
        resource_type: impl Into<String>,
        uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            uri: uri.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowInfo {
    pub id: String,
    pub step_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_name: Option<String>,
}

/// Operational parameters for a run. A missing `timeout_seconds` defers to
/// the scheduler's default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub skip_callback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_bundle_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    /// Assigns a fresh idempotency key that the worker echoes in its callback.
    pub fn with_generated_callback_id(mut self) -> Self {
        self.callback_id = Some(uuid::Uuid::new_v4().to_string());
        self
    }

    pub fn with_execution_bundle_uri(mut self, uri: impl Into<String>) -> Self {
        self.execution_bundle_uri = Some(uri.into());
        self
    }

    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn skipping_callback(mut self) -> Self {
        self.skip_callback = true;
        self
    }

    pub fn should_post_callback(&self) -> bool {
        self.callback_url.is_some() && !self.skip_callback
    }
}

/// Input envelope. `inputs` is an open map for [`Generic`] and the domain's
/// typed configuration otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct ValidationInputEnvelope<D: Domain = Generic> {
    #[serde(default = "input_schema_version")]
    pub schema_version: String,
    pub run_id: String,
    pub validator: ValidatorInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<OrganizationInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowInfo>,
    #[serde(default)]
    pub input_files: Vec<InputFileItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_files: Vec<ResourceFileItem>,
    #[serde(default)]
    pub inputs: D::Inputs,
    pub context: ExecutionContext,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationMessage {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ValidationMessage {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            code: None,
            text: text.into(),
            location: None,
            tags: Vec::new(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(Severity::Error, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(Severity::Warning, text)
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(Severity::Info, text)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationMetric {
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ValidationMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
            unit: None,
            category: None,
            tags: Vec::new(),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A worker-produced file (report, log, database) referenced by URI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationArtifact {
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl ValidationArtifact {
    pub fn new(name: impl Into<String>, role: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            mime_type: None,
            uri: uri.into(),
            size_bytes: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_size_bytes(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RawOutputFormat {
    Directory,
    Archive,
}

/// Points at a manifest listing every raw output file, instead of one
/// artifact per file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawOutputs {
    pub format: RawOutputFormat,
    pub manifest_uri: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationTiming {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ValidationTiming {
    pub fn running_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let finished = self.finished_at?;
        let elapsed = finished.signed_duration_since(started);
        Some(elapsed.num_milliseconds() as f64 / 1000.0)
    }
}

/// Output envelope. `outputs` is absent when the worker never produced a
/// domain result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct ValidationOutputEnvelope<D: Domain = Generic> {
    #[serde(default = "output_schema_version")]
    pub schema_version: String,
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<ValidatorInfo>,
    pub status: ValidationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<ValidationTiming>,
    #[serde(default)]
    pub messages: Vec<ValidationMessage>,
    #[serde(default)]
    pub metrics: Vec<ValidationMetric>,
    #[serde(default)]
    pub artifacts: Vec<ValidationArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_outputs: Option<RawOutputs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<D::Outputs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_seconds: Option<f64>,
}

impl<D: Domain> ValidationOutputEnvelope<D> {
    /// Metric names are a soft convention: duplicates are allowed and
    /// reported here rather than rejected.
    pub fn duplicate_metric_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for metric in &self.metrics {
            let name = metric.name.as_str();
            if !seen.insert(name) && !duplicates.contains(&name) {
                duplicates.push(name);
            }
        }
        duplicates
    }

    pub fn metric(&self, name: &str) -> Option<&ValidationMetric> {
        self.metrics.iter().find(|m| m.name == name)
    }
}

/// Completion notice POSTed to `context.callback_url`. Carries a pointer to
/// the stored output (`result_uri`), the output itself, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct ValidationCallback<D: Domain = Generic> {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_id: Option<String>,
    pub status: ValidationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ValidationOutputEnvelope<D>>,
}

impl<D: Domain> ValidationCallback<D> {
    /// Minimal notice pointing at an output stored elsewhere.
    pub fn for_stored_output(
        output: &ValidationOutputEnvelope<D>,
        callback_id: Option<String>,
        result_uri: impl Into<String>,
    ) -> Self {
        Self {
            run_id: output.run_id.clone(),
            callback_id,
            status: output.status,
            result_uri: Some(result_uri.into()),
            output: None,
        }
    }

    /// Notice carrying the whole output envelope.
    pub fn embedding(output: ValidationOutputEnvelope<D>, callback_id: Option<String>) -> Self {
        Self {
            run_id: output.run_id.clone(),
            callback_id,
            status: output.status,
            result_uri: None,
            output: Some(output),
        }
    }
}
