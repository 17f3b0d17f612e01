//! Every known domain behind one type.
//!
//! Consumers that must handle whatever a worker sends decode into
//! [`AnyInputEnvelope`] / [`AnyOutputEnvelope`] / [`AnyCallback`] and match
//! exhaustively. Dispatch follows `validator.type`; anything without a
//! dedicated domain decodes as [`Generic`].

use envelope_energyplus::{EnergyPlus, EnergyPlusInputEnvelope, EnergyPlusOutputEnvelope};
use envelope_fmi::{Fmi, FmiInputEnvelope, FmiOutputEnvelope};
use job_envelope::{
    from_value_with, Domain, EnvelopeError, ExecutionContext, Generic, InputFileItem, InputHeader,
    LegacyTypePolicy, OutputHeader, ValidationArtifact, ValidationCallback,
    ValidationInputEnvelope, ValidationMessage, ValidationMetric, ValidationOptions,
    ValidationOutputEnvelope, ValidationStatus, ValidatorInfo, ValidatorType,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

/// Which envelope family a validator type decodes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    EnergySimulation,
    ModelExchange,
    Generic,
}

impl DomainKind {
    pub fn for_type(validator_type: ValidatorType) -> Self {
        if EnergyPlus::serves(validator_type) {
            Self::EnergySimulation
        } else if Fmi::serves(validator_type) {
            Self::ModelExchange
        } else {
            Self::Generic
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::EnergySimulation => EnergyPlus::NAME,
            Self::ModelExchange => Fmi::NAME,
            Self::Generic => Generic::NAME,
        }
    }
}

/// Reads `validator.type` without trusting anything else in the payload.
/// Unknown tokens fall through to the generic contract, which reports them.
fn peek_validator_type(
    validator: Option<&Value>,
    options: &ValidationOptions,
) -> Option<ValidatorType> {
    let token = validator?.get("type")?.as_str()?;
    token.parse().ok().or_else(|| {
        (options.legacy_validator_types == LegacyTypePolicy::AcceptAliases)
            .then(|| ValidatorType::from_legacy_alias(token))
            .flatten()
    })
}

fn parse(text: &str) -> Result<Value, EnvelopeError> {
    serde_json::from_str(text).map_err(|e| EnvelopeError::Json {
        message: e.to_string(),
    })
}

macro_rules! each_domain {
    ($value:expr, $envelope:ident => $body:expr) => {
        match $value {
            Self::EnergySimulation($envelope) => $body,
            Self::ModelExchange($envelope) => $body,
            Self::Generic($envelope) => $body,
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyInputEnvelope {
    EnergySimulation(EnergyPlusInputEnvelope),
    ModelExchange(FmiInputEnvelope),
    Generic(ValidationInputEnvelope<Generic>),
}

impl AnyInputEnvelope {
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        Self::decode_with(text, &ValidationOptions::default())
    }

    #[instrument(skip(text), fields(len = text.len()))]
    pub fn decode_with(text: &str, options: &ValidationOptions) -> Result<Self, EnvelopeError> {
        let value = parse(text)?;
        let kind = peek_validator_type(value.get("validator"), options)
            .map(DomainKind::for_type)
            .unwrap_or(DomainKind::Generic);
        debug!(domain = kind.name(), "dispatching input envelope");

        match kind {
            DomainKind::EnergySimulation => {
                from_value_with(value, options).map(Self::EnergySimulation)
            }
            DomainKind::ModelExchange => from_value_with(value, options).map(Self::ModelExchange),
            DomainKind::Generic => from_value_with(value, options).map(Self::Generic),
        }
    }

    pub fn kind(&self) -> DomainKind {
        match self {
            Self::EnergySimulation(_) => DomainKind::EnergySimulation,
            Self::ModelExchange(_) => DomainKind::ModelExchange,
            Self::Generic(_) => DomainKind::Generic,
        }
    }

    pub fn into_generic(self) -> Result<ValidationInputEnvelope<Generic>, EnvelopeError> {
        each_domain!(self, e => e.into_generic())
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        each_domain!(self, e => e.to_json())
    }
}

impl InputHeader for AnyInputEnvelope {
    fn run_id(&self) -> &str {
        each_domain!(self, e => &e.run_id)
    }

    fn validator(&self) -> &ValidatorInfo {
        each_domain!(self, e => &e.validator)
    }

    fn input_files(&self) -> &[InputFileItem] {
        each_domain!(self, e => &e.input_files)
    }

    fn context(&self) -> &ExecutionContext {
        each_domain!(self, e => &e.context)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyOutputEnvelope {
    EnergySimulation(EnergyPlusOutputEnvelope),
    ModelExchange(FmiOutputEnvelope),
    Generic(ValidationOutputEnvelope<Generic>),
}

impl AnyOutputEnvelope {
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        Self::decode_with(text, &ValidationOptions::default())
    }

    /// Outputs without a `validator` decode as generic.
    #[instrument(skip(text), fields(len = text.len()))]
    pub fn decode_with(text: &str, options: &ValidationOptions) -> Result<Self, EnvelopeError> {
        let value = parse(text)?;
        let validator_type = peek_validator_type(value.get("validator"), options);
        Self::dispatch(value, validator_type, options)
    }

    fn dispatch(
        value: Value,
        validator_type: Option<ValidatorType>,
        options: &ValidationOptions,
    ) -> Result<Self, EnvelopeError> {
        let kind = validator_type
            .map(DomainKind::for_type)
            .unwrap_or(DomainKind::Generic);
        debug!(domain = kind.name(), "dispatching output envelope");

        match kind {
            DomainKind::EnergySimulation => {
                from_value_with(value, options).map(Self::EnergySimulation)
            }
            DomainKind::ModelExchange => from_value_with(value, options).map(Self::ModelExchange),
            DomainKind::Generic => from_value_with(value, options).map(Self::Generic),
        }
    }

    pub fn kind(&self) -> DomainKind {
        match self {
            Self::EnergySimulation(_) => DomainKind::EnergySimulation,
            Self::ModelExchange(_) => DomainKind::ModelExchange,
            Self::Generic(_) => DomainKind::Generic,
        }
    }

    pub fn into_generic(self) -> Result<ValidationOutputEnvelope<Generic>, EnvelopeError> {
        each_domain!(self, e => e.into_generic())
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        each_domain!(self, e => e.to_json())
    }
}

/// Decodes an output whose validator type the caller already knows, e.g.
/// from the input envelope it answers. Overrides whatever the output says.
pub fn decode_output_for(
    validator_type: ValidatorType,
    text: &str,
    options: &ValidationOptions,
) -> Result<AnyOutputEnvelope, EnvelopeError> {
    let value = parse(text)?;
    AnyOutputEnvelope::dispatch(value, Some(validator_type), options)
}

impl OutputHeader for AnyOutputEnvelope {
    fn run_id(&self) -> &str {
        each_domain!(self, e => &e.run_id)
    }

    fn validator(&self) -> Option<&ValidatorInfo> {
        each_domain!(self, e => e.validator.as_ref())
    }

    fn status(&self) -> ValidationStatus {
        each_domain!(self, e => e.status)
    }

    fn messages(&self) -> &[ValidationMessage] {
        each_domain!(self, e => &e.messages)
    }

    fn metrics(&self) -> &[ValidationMetric] {
        each_domain!(self, e => &e.metrics)
    }

    fn artifacts(&self) -> &[ValidationArtifact] {
        each_domain!(self, e => &e.artifacts)
    }

    fn execution_seconds(&self) -> Option<f64> {
        each_domain!(self, e => e.execution_seconds)
    }

    fn has_outputs(&self) -> bool {
        each_domain!(self, e => e.outputs.is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyCallback {
    EnergySimulation(ValidationCallback<EnergyPlus>),
    ModelExchange(ValidationCallback<Fmi>),
    Generic(ValidationCallback<Generic>),
}

impl AnyCallback {
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        Self::decode_with(text, &ValidationOptions::default())
    }

    /// Dispatches on the embedded output's validator. A callback that only
    /// carries `result_uri` decodes as generic.
    #[instrument(skip(text), fields(len = text.len()))]
    pub fn decode_with(text: &str, options: &ValidationOptions) -> Result<Self, EnvelopeError> {
        let value = parse(text)?;
        let validator = value.get("output").and_then(|o| o.get("validator"));
        let kind = peek_validator_type(validator, options)
            .map(DomainKind::for_type)
            .unwrap_or(DomainKind::Generic);
        debug!(domain = kind.name(), "dispatching callback");

        match kind {
            DomainKind::EnergySimulation => {
                from_value_with(value, options).map(Self::EnergySimulation)
            }
            DomainKind::ModelExchange => from_value_with(value, options).map(Self::ModelExchange),
            DomainKind::Generic => from_value_with(value, options).map(Self::Generic),
        }
    }

    pub fn run_id(&self) -> &str {
        each_domain!(self, c => &c.run_id)
    }

    pub fn status(&self) -> ValidationStatus {
        each_domain!(self, c => c.status)
    }

    pub fn result_uri(&self) -> Option<&str> {
        each_domain!(self, c => c.result_uri.as_deref())
    }

    pub fn into_generic(self) -> Result<ValidationCallback<Generic>, EnvelopeError> {
        each_domain!(self, c => c.into_generic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_domain_kind_for_every_type() {
        for ty in ValidatorType::ALL {
            let expected = match ty {
                ValidatorType::EnergySimulation => DomainKind::EnergySimulation,
                ValidatorType::ModelExchange => DomainKind::ModelExchange,
                _ => DomainKind::Generic,
            };
            assert_eq!(DomainKind::for_type(ty), expected, "{ty}");
        }
    }

    #[test]
    fn test_peek_honours_alias_policy() {
        let validator = json!({ "id": "v", "type": "energyplus", "version": "1" });
        assert_eq!(
            peek_validator_type(Some(&validator), &ValidationOptions::strict()),
            None
        );
        assert_eq!(
            peek_validator_type(Some(&validator), &ValidationOptions::lenient()),
            Some(ValidatorType::EnergySimulation)
        );
    }
}
