use crate::domain::Domain;
use crate::envelope::{
    ValidationCallback, ValidationInputEnvelope, ValidationOutputEnvelope, ValidatorType,
};
use crate::validation::{
    Contract, EnvelopeError, FieldPath, LegacyTypePolicy, SchemaValidationError,
    ValidationOptions, Violation, ViolationReason,
};
use serde::de::DeserializeOwned;
use chrono::DateTime;
use serde::Serialize;
use serde_json::Value;
use serde_path_to_error::Segment;
use tracing::{debug, instrument, warn};

const INPUT_ENVELOPE_SCHEMA: &str = include_str!("../../../contracts/envelopes/input.v1.json");
const OUTPUT_ENVELOPE_SCHEMA: &str = include_str!("../../../contracts/envelopes/output.v1.json");
const CALLBACK_SCHEMA: &str = include_str!("../../../contracts/envelopes/callback.v1.json");

const TIMESTAMP_FIELDS: [&str; 3] = ["queued_at", "started_at", "finished_at"];

/// A message shape this crate can check and decode.
pub trait Envelope: Serialize + DeserializeOwned {
    /// Collects every violation in a raw JSON value, prefixed with `at`.
    /// May rewrite legacy tokens in place when `options` allows it.
    fn inspect(
        value: &mut Value,
        at: &FieldPath,
        options: &ValidationOptions,
        violations: &mut Vec<Violation>,
    ) -> Result<(), EnvelopeError>;
}

impl<D: Domain> Envelope for ValidationInputEnvelope<D> {
    fn inspect(
        value: &mut Value,
        at: &FieldPath,
        options: &ValidationOptions,
        violations: &mut Vec<Violation>,
    ) -> Result<(), EnvelopeError> {
        normalize_validator_type(value, options);

        Contract::compile("input envelope", INPUT_ENVELOPE_SCHEMA)?
            .check(value, at, options, violations);
        if !value.is_object() {
            return Ok(());
        }

        match value.get("inputs") {
            Some(inputs) => Contract::compile(D::NAME, D::inputs_schema())?.check(
                inputs,
                &at.field("inputs"),
                options,
                violations,
            ),
            None if D::inputs_required() => violations.push(Violation::new(
                at.field("inputs"),
                ViolationReason::MissingField,
            )),
            None => {}
        }

        check_domain_type::<D>(value.get("validator"), at, violations);
        Ok(())
    }
}

impl<D: Domain> Envelope for ValidationOutputEnvelope<D> {
    fn inspect(
        value: &mut Value,
        at: &FieldPath,
        options: &ValidationOptions,
        violations: &mut Vec<Violation>,
    ) -> Result<(), EnvelopeError> {
        normalize_validator_type(value, options);

        Contract::compile("output envelope", OUTPUT_ENVELOPE_SCHEMA)?
            .check(value, at, options, violations);
        if !value.is_object() {
            return Ok(());
        }

        let outputs = value.get("outputs").filter(|o| !o.is_null());
        if let Some(outputs) = outputs {
            Contract::compile(D::NAME, D::outputs_schema())?.check(
                outputs,
                &at.field("outputs"),
                options,
                violations,
            );

            if value.get("status").and_then(Value::as_str) == Some("error") {
                let run_id = value.get("run_id").and_then(Value::as_str).unwrap_or_default();
                warn!(run_id, domain = D::NAME, "error envelope carries domain outputs");
            }
        }

        if let Some(timing) = value.get("timing").filter(|t| t.is_object()) {
            check_timestamps(timing, &at.field("timing"), violations);
        }

        if let Some(validator) = value.get("validator").filter(|v| !v.is_null()) {
            check_domain_type::<D>(Some(validator), at, violations);
        }
        Ok(())
    }
}

impl<D: Domain> Envelope for ValidationCallback<D> {
    fn inspect(
        value: &mut Value,
        at: &FieldPath,
        options: &ValidationOptions,
        violations: &mut Vec<Violation>,
    ) -> Result<(), EnvelopeError> {
        Contract::compile("callback", CALLBACK_SCHEMA)?.check(value, at, options, violations);
        let Some(callback) = value.as_object_mut() else {
            return Ok(());
        };

        let present = |v: Option<&Value>| v.map_or(false, |v| !v.is_null());
        if !present(callback.get("result_uri")) && !present(callback.get("output")) {
            violations.push(Violation::new(
                at.field("result_uri"),
                ViolationReason::MissingField,
            ));
        }

        let run_id = callback
            .get("run_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(output) = callback.get_mut("output").filter(|o| o.is_object()) {
            let output_at = at.field("output");
            ValidationOutputEnvelope::<D>::inspect(output, &output_at, options, violations)?;

            let output_run_id = output.get("run_id").and_then(Value::as_str);
            if let (Some(expected), Some(found)) = (run_id.as_deref(), output_run_id) {
                if expected != found {
                    violations.push(Violation::new(
                        output_at.field("run_id"),
                        ViolationReason::RunIdMismatch {
                            expected: expected.to_string(),
                            found: found.to_string(),
                        },
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Rewrites a retired `validator.type` token to its canonical value.
fn normalize_validator_type(envelope: &mut Value, options: &ValidationOptions) {
    if options.legacy_validator_types != LegacyTypePolicy::AcceptAliases {
        return;
    }
    let Some(token) = envelope
        .get_mut("validator")
        .and_then(|validator| validator.get_mut("type"))
    else {
        return;
    };
    let Some(canonical) = token.as_str().and_then(ValidatorType::from_legacy_alias) else {
        return;
    };

    let alias = token.as_str().unwrap_or_default();
    warn!(alias, canonical = canonical.as_str(), "accepting legacy validator type alias");
    *token = Value::String(canonical.as_str().to_string());
}

/// The contract pattern only checks timestamp syntax; this catches calendar
/// errors such as `2024-02-30` or hour `24`.
fn check_timestamps(timing: &Value, at: &FieldPath, violations: &mut Vec<Violation>) {
    for field in TIMESTAMP_FIELDS {
        let Some(text) = timing.get(field).and_then(Value::as_str) else {
            continue;
        };
        let path = at.field(field);
        if DateTime::parse_from_rfc3339(text).is_ok() || violations.iter().any(|v| v.path == path)
        {
            continue;
        }
        violations.push(Violation::new(
            path,
            ViolationReason::InvalidFormat {
                value: text.to_string(),
                pattern: "RFC 3339 date-time".to_string(),
            },
        ));
    }
}

fn check_domain_type<D: Domain>(
    validator: Option<&Value>,
    at: &FieldPath,
    violations: &mut Vec<Violation>,
) {
    let Some(token) = validator
        .and_then(|v| v.get("type"))
        .and_then(Value::as_str)
    else {
        return;
    };
    // Unknown tokens were already reported by the contract.
    let Ok(validator_type) = token.parse::<ValidatorType>() else {
        return;
    };
    if !D::serves(validator_type) {
        violations.push(Violation::new(
            at.field("validator").field("type"),
            ViolationReason::DomainMismatch {
                domain: D::NAME.to_string(),
                found: token.to_string(),
            },
        ));
    }
}

/// Decodes `text` as `T` with strict options.
pub fn deserialize<T: Envelope>(text: &str) -> Result<T, EnvelopeError> {
    deserialize_with(text, &ValidationOptions::default())
}

#[instrument(skip(text), fields(len = text.len()))]
pub fn deserialize_with<T: Envelope>(
    text: &str,
    options: &ValidationOptions,
) -> Result<T, EnvelopeError> {
    let value: Value = serde_json::from_str(text).map_err(|e| EnvelopeError::Json {
        message: e.to_string(),
    })?;
    from_value_with(value, options)
}

/// Checks a parsed value and decodes it. Nothing is returned unless every
/// rule passes.
pub fn from_value_with<T: Envelope>(
    mut value: Value,
    options: &ValidationOptions,
) -> Result<T, EnvelopeError> {
    let mut violations = Vec::new();
    T::inspect(&mut value, &FieldPath::root(), options, &mut violations)?;

    match serde_path_to_error::deserialize::<_, T>(&value) {
        Ok(envelope) if violations.is_empty() => {
            debug!("envelope accepted");
            return Ok(envelope);
        }
        Ok(_) => {}
        Err(err) => {
            let violation = decode_violation(&err);
            // A field the contract already rejected usually fails decoding too.
            if !violations.iter().any(|v| v.path.overlaps(&violation.path)) {
                violations.push(violation);
            }
        }
    }

    debug!(count = violations.len(), "envelope rejected");
    Err(SchemaValidationError::new(violations).into())
}

/// Turns a typed decode failure into a violation at the failing field.
fn decode_violation(err: &serde_path_to_error::Error<serde_json::Error>) -> Violation {
    let mut path = FieldPath::root();
    for segment in err.path().iter() {
        path = match segment {
            Segment::Seq { index } => path.index(*index),
            Segment::Map { key } => path.field(key.as_str()),
            Segment::Enum { variant } => path.field(variant.as_str()),
            Segment::Unknown => path,
        };
    }

    let message = err.inner().to_string();
    let reason = if message.starts_with("invalid type") {
        ViolationReason::TypeMismatch { message }
    } else {
        ViolationReason::Invalid { message }
    };
    Violation::new(path, reason)
}

/// Runs the full rule set against an envelope built in code.
pub fn validate<T: Envelope>(envelope: &T) -> Result<(), EnvelopeError> {
    let mut value = serde_json::to_value(envelope).map_err(|e| EnvelopeError::Encode {
        message: e.to_string(),
    })?;
    let mut violations = Vec::new();
    T::inspect(
        &mut value,
        &FieldPath::root(),
        &ValidationOptions::strict(),
        &mut violations,
    )?;
    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaValidationError::new(violations).into())
    }
}

/// Compact JSON in declaration order. Invalid envelopes are never written.
pub fn serialize<T: Envelope>(envelope: &T) -> Result<String, EnvelopeError> {
    validate(envelope)?;
    serde_json::to_string(envelope).map_err(|e| EnvelopeError::Encode {
        message: e.to_string(),
    })
}

pub fn serialize_pretty<T: Envelope>(envelope: &T) -> Result<String, EnvelopeError> {
    validate(envelope)?;
    serde_json::to_string_pretty(envelope).map_err(|e| EnvelopeError::Encode {
        message: e.to_string(),
    })
}

macro_rules! envelope_methods {
    ($ty:ident) => {
        impl<D: Domain> $ty<D> {
            pub fn from_json(text: &str) -> Result<Self, EnvelopeError> {
                deserialize(text)
            }

            pub fn from_json_with(
                text: &str,
                options: &ValidationOptions,
            ) -> Result<Self, EnvelopeError> {
                deserialize_with(text, options)
            }

            pub fn to_json(&self) -> Result<String, EnvelopeError> {
                serialize(self)
            }

            pub fn validate(&self) -> Result<(), EnvelopeError> {
                validate(self)
            }
        }
    };
}

envelope_methods!(ValidationInputEnvelope);
envelope_methods!(ValidationOutputEnvelope);
envelope_methods!(ValidationCallback);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Generic;
    use serde_json::json;

    fn minimal_input() -> Value {
        json!({
            "run_id": "run-1",
            "validator": { "id": "v1", "type": "basic", "version": "1" },
            "context": {}
        })
    }

    #[test]
    fn test_contracts_compile() {
        assert!(Contract::compile("input", INPUT_ENVELOPE_SCHEMA).is_ok());
        assert!(Contract::compile("output", OUTPUT_ENVELOPE_SCHEMA).is_ok());
        assert!(Contract::compile("callback", CALLBACK_SCHEMA).is_ok());
    }

    #[test]
    fn test_contract_validator_types_match_enum() {
        let schema: Value = serde_json::from_str(INPUT_ENVELOPE_SCHEMA).unwrap();
        let tokens: Vec<String> = schema["definitions"]["ValidatorInfo"]["properties"]["type"]
            ["enum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert_eq!(tokens, ValidatorType::allowed_tokens());
    }

    #[test]
    fn test_generic_inputs_default_to_empty_map() {
        let envelope: ValidationInputEnvelope =
            from_value_with(minimal_input(), &ValidationOptions::strict()).unwrap();
        assert!(envelope.inputs.is_empty());
        assert_eq!(envelope.schema_version, crate::INPUT_SCHEMA_VERSION);
    }

    #[test]
    fn test_non_object_payload_reports_single_type_violation() {
        let err = from_value_with::<ValidationInputEnvelope<Generic>>(
            json!([1, 2]),
            &ValidationOptions::strict(),
        )
        .unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].reason.code(), "type_mismatch");
    }

    #[test]
    fn test_legacy_alias_is_rewritten_when_allowed() {
        let mut value = minimal_input();
        value["validator"]["type"] = json!("fmu");

        let strict = from_value_with::<ValidationInputEnvelope>(
            value.clone(),
            &ValidationOptions::strict(),
        );
        assert!(strict.is_err());

        let options =
            ValidationOptions::strict().with_legacy_validator_types(LegacyTypePolicy::AcceptAliases);
        let envelope: ValidationInputEnvelope = from_value_with(value, &options).unwrap();
        assert_eq!(
            envelope.validator.validator_type,
            ValidatorType::ModelExchange
        );
    }

    #[test]
    fn test_decode_failure_points_at_the_field() {
        let value = json!({
            "run_id": "r",
            "status": "success",
            "artifacts": [
                { "name": "a", "role": "log", "uri": "gs://b/a" },
                { "name": "b", "role": "log", "uri": "gs://b/b", "size_bytes": 5.0 }
            ]
        });
        let err = serde_path_to_error::deserialize::<_, ValidationOutputEnvelope>(&value)
            .unwrap_err();

        let violation = decode_violation(&err);
        assert_eq!(violation.path, "artifacts[1].size_bytes");
        assert_eq!(violation.reason.code(), "type_mismatch");
    }

    #[test]
    fn test_calendar_check_skips_fields_already_reported() {
        let timing = json!({ "started_at": "2024-02-30T10:00:00Z", "finished_at": "nope" });
        let at = FieldPath::root().field("timing");
        let mut violations = vec![Violation::new(
            at.field("finished_at"),
            ViolationReason::RequiredFieldEmpty,
        )];

        check_timestamps(&timing, &at, &mut violations);

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[1].path, "timing.started_at");
        assert_eq!(violations[1].reason.code(), "invalid_format");
    }

    #[test]
    fn test_invalid_json_is_not_a_schema_error() {
        let err = deserialize::<ValidationInputEnvelope>("{ nope").unwrap_err();
        assert!(matches!(err, EnvelopeError::Json { .. }));
        assert!(err.violations().is_empty());
    }
}
