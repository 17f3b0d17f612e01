use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Dotted path to a field inside an envelope, e.g. `messages[2].severity`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldPath(Vec<PathSegment>);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn field(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Field(name.into()));
        Self(segments)
    }

    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(PathSegment::Index(index));
        Self(segments)
    }

    pub fn join(&self, other: &FieldPath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    /// True when one path is a prefix of the other.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.0.starts_with(&other.0) || other.0.starts_with(&self.0)
    }

    /// Converts a JSON pointer (`/messages/2/severity`) into a field path,
    /// walking `instance` so that numeric keys of an object stay fields.
    /// Segments past the end of the instance are read as fields.
    pub fn from_json_pointer(pointer: &str, instance: &Value) -> Self {
        let mut node = Some(instance);
        let segments = pointer
            .split('/')
            .skip(1)
            .filter(|s| !s.is_empty())
            .map(|raw| {
                let segment = raw.replace("~1", "/").replace("~0", "~");
                match (node, segment.parse::<usize>()) {
                    (Some(Value::Array(items)), Ok(index)) => {
                        node = items.get(index);
                        PathSegment::Index(index)
                    }
                    _ => {
                        node = node.and_then(|n| n.get(segment.as_str()));
                        PathSegment::Field(segment)
                    }
                }
            })
            .collect();
        Self(segments)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (position, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) if position == 0 => write!(f, "{name}")?,
                PathSegment::Field(name) => write!(f, ".{name}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        let mut parsed = FieldPath::root();
        for part in path.split('.').filter(|p| !p.is_empty()) {
            let (name, rest) = match part.find('[') {
                Some(at) => part.split_at(at),
                None => (part, ""),
            };
            if !name.is_empty() {
                parsed = parsed.field(name);
            }
            for index in rest
                .split(|c| c == '[' || c == ']')
                .filter(|s| !s.is_empty())
            {
                parsed = match index.parse::<usize>() {
                    Ok(i) => parsed.index(i),
                    Err(_) => parsed.field(index),
                };
            }
        }
        parsed
    }
}

impl PartialEq<&str> for FieldPath {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

impl PartialEq<str> for FieldPath {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

/// Why a single field was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationReason {
    InvalidEnumValue { value: String, allowed: Vec<String> },
    RequiredFieldEmpty,
    NumericRangeViolation { bound: String },
    /// A key the receiving schema does not declare (strict mode only).
    UnknownField,
    MissingField,
    TypeMismatch { message: String },
    InvalidUri { value: String },
    InvalidFormat { value: String, pattern: String },
    /// A typed domain envelope received a validator type it does not serve.
    DomainMismatch { domain: String, found: String },
    RunIdMismatch { expected: String, found: String },
    Invalid { message: String },
}

impl ViolationReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidEnumValue { .. } => "invalid_enum_value",
            Self::RequiredFieldEmpty => "required_field_empty",
            Self::NumericRangeViolation { .. } => "numeric_range_violation",
            Self::UnknownField => "unknown_field",
            Self::MissingField => "missing_field",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::InvalidUri { .. } => "invalid_uri",
            Self::InvalidFormat { .. } => "invalid_format",
            Self::DomainMismatch { .. } => "domain_mismatch",
            Self::RunIdMismatch { .. } => "run_id_mismatch",
            Self::Invalid { .. } => "invalid",
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnumValue { value, allowed } => write!(
                f,
                "'{}' is not one of the allowed values [{}]",
                value,
                allowed.join(", ")
            ),
            Self::RequiredFieldEmpty => f.write_str("must not be empty or blank"),
            Self::NumericRangeViolation { bound } => write!(f, "must be {bound}"),
            Self::UnknownField => f.write_str("is not a recognised field"),
            Self::MissingField => f.write_str("is required"),
            Self::TypeMismatch { message } => f.write_str(message),
            Self::InvalidUri { value } => write!(
                f,
                "'{value}' is not an absolute, scheme-qualified URI"
            ),
            Self::InvalidFormat { value, pattern } => {
                write!(f, "'{value}' does not match the expected format {pattern}")
            }
            Self::DomainMismatch { domain, found } => write!(
                f,
                "validator type '{found}' is not served by the {domain} domain"
            ),
            Self::RunIdMismatch { expected, found } => {
                write!(f, "run_id '{found}' does not match '{expected}'")
            }
            Self::Invalid { message } => f.write_str(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: FieldPath,
    pub reason: ViolationReason,
}

impl Violation {
    pub fn new(path: impl Into<FieldPath>, reason: ViolationReason) -> Self {
        Self {
            path: path.into(),
            reason,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

fn format_violations(violations: &[Violation]) -> String {
    let listed = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    format!("{} violation(s): {}", violations.len(), listed)
}

/// Every field-level violation found in one envelope or sub-object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", format_violations(.violations))]
pub struct SchemaValidationError {
    pub violations: Vec<Violation>,
}

impl SchemaValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn single(violation: Violation) -> Self {
        Self::new(vec![violation])
    }

    pub fn has_reason(&self, code: &str) -> bool {
        self.violations.iter().any(|v| v.reason.code() == code)
    }

    pub fn unknown_fields(&self) -> Vec<&FieldPath> {
        self.violations
            .iter()
            .filter(|v| v.reason == ViolationReason::UnknownField)
            .map(|v| &v.path)
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.path.to_string()).collect()
    }

    pub fn find(&self, path: &str) -> Option<&Violation> {
        self.violations.iter().find(|v| v.path == path)
    }
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Envelope is not valid JSON: {message}")]
    Json { message: String },

    #[error("Envelope validation failed with {0}")]
    Schema(#[from] SchemaValidationError),

    #[error("Envelope encoding failed: {message}")]
    Encode { message: String },

    #[error("Contract compilation failed: {message}")]
    SchemaCompilationFailed { message: String },
}

impl EnvelopeError {
    /// Violations carried by a schema failure; empty for every other kind.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Schema(err) => &err.violations,
            _ => &[],
        }
    }

    pub fn as_schema(&self) -> Option<&SchemaValidationError> {
        match self {
            Self::Schema(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnknownFieldPolicy {
    #[default]
    Reject,
    Ignore,
}

/// What to do with `validator.type` tokens retired by a domain rename.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LegacyTypePolicy {
    #[default]
    Reject,
    AcceptAliases,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ValidationOptions {
    pub unknown_fields: UnknownFieldPolicy,
    pub legacy_validator_types: LegacyTypePolicy,
}

impl ValidationOptions {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn lenient() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::Ignore,
            legacy_validator_types: LegacyTypePolicy::AcceptAliases,
        }
    }

    pub fn with_unknown_fields(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_fields = policy;
        self
    }

    pub fn with_legacy_validator_types(mut self, policy: LegacyTypePolicy) -> Self {
        self.legacy_validator_types = policy;
        self
    }
}

/// A compiled JSON Schema contract for one envelope or payload shape.
pub struct Contract {
    name: &'static str,
    schema: JSONSchema,
}

impl Contract {
    pub fn compile(name: &'static str, source: &str) -> Result<Self, EnvelopeError> {
        let schema_value: Value =
            serde_json::from_str(source).map_err(|e| EnvelopeError::SchemaCompilationFailed {
                message: format!("{name}: {e}"),
            })?;

        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema_value)
            .map_err(|e| EnvelopeError::SchemaCompilationFailed {
                message: format!("{name}: {e}"),
            })?;

        Ok(Self { name, schema })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Appends one violation per schema error, prefixed with `at`.
    pub fn check(
        &self,
        value: &Value,
        at: &FieldPath,
        options: &ValidationOptions,
        violations: &mut Vec<Violation>,
    ) {
        let Err(errors) = self.schema.validate(value) else {
            return;
        };

        for error in errors {
            let path = at.join(&FieldPath::from_json_pointer(
                &error.instance_path.to_string(),
                value,
            ));
            let instance = error.instance.as_ref();

            match &error.kind {
                ValidationErrorKind::AdditionalProperties { unexpected } => {
                    if options.unknown_fields == UnknownFieldPolicy::Ignore {
                        continue;
                    }
                    for key in unexpected {
                        violations.push(Violation::new(
                            path.field(key.as_str()),
                            ViolationReason::UnknownField,
                        ));
                    }
                }
                ValidationErrorKind::Required { property } => {
                    let property = property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string());
                    violations.push(Violation::new(
                        path.field(property),
                        ViolationReason::MissingField,
                    ));
                }
                ValidationErrorKind::Enum { options: allowed } => {
                    let allowed = allowed
                        .as_array()
                        .map(|values| values.iter().map(display_token).collect())
                        .unwrap_or_default();
                    violations.push(Violation::new(
                        path,
                        ViolationReason::InvalidEnumValue {
                            value: display_token(instance),
                            allowed,
                        },
                    ));
                }
                ValidationErrorKind::Pattern { pattern } => {
                    violations.push(Violation::new(path, pattern_reason(instance, pattern)));
                }
                ValidationErrorKind::Minimum { limit } => violations.push(Violation::new(
                    path,
                    ViolationReason::NumericRangeViolation {
                        bound: format!(">= {limit}"),
                    },
                )),
                ValidationErrorKind::ExclusiveMinimum { limit } => {
                    violations.push(Violation::new(
                        path,
                        ViolationReason::NumericRangeViolation {
                            bound: format!("> {limit}"),
                        },
                    ))
                }
                ValidationErrorKind::Maximum { limit } => violations.push(Violation::new(
                    path,
                    ViolationReason::NumericRangeViolation {
                        bound: format!("<= {limit}"),
                    },
                )),
                ValidationErrorKind::Type { .. } => violations.push(Violation::new(
                    path,
                    ViolationReason::TypeMismatch {
                        message: error.to_string(),
                    },
                )),
                _ => violations.push(Violation::new(
                    path,
                    ViolationReason::Invalid {
                        message: error.to_string(),
                    },
                )),
            }
        }
    }
}

fn display_token(value: &Value) -> String {
    value
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| value.to_string())
}

/// Contracts use `pattern` for three things: non-blank strings, absolute
/// URIs and timestamps. Blank input is always reported as empty.
fn pattern_reason(instance: &Value, pattern: &str) -> ViolationReason {
    let text = display_token(instance);
    if text.trim().is_empty() {
        ViolationReason::RequiredFieldEmpty
    } else if pattern.contains("://") {
        ViolationReason::InvalidUri { value: text }
    } else {
        ViolationReason::InvalidFormat {
            value: text,
            pattern: pattern.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SAMPLE: &str = r#"{
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "name": { "type": "string", "pattern": "\\S" },
            "kind": { "enum": ["a", "b"] },
            "count": { "type": "integer", "exclusiveMinimum": 0 },
            "link": { "type": "string", "pattern": "^[A-Za-z][A-Za-z0-9+.-]*://\\S+$" },
            "items": { "type": "array", "items": { "type": "number", "minimum": 0 } }
        },
        "required": ["name"],
        "additionalProperties": false
    }"#;

    #[test]
    fn test_contract_creation() {
        assert!(Contract::compile("sample", SAMPLE).is_ok());
        assert!(matches!(
            Contract::compile("broken", "{ not json"),
            Err(EnvelopeError::SchemaCompilationFailed { .. })
        ));
    }

    #[test]
    fn test_every_violation_is_collected() {
        let contract = Contract::compile("sample", SAMPLE).unwrap();
        let value = json!({
            "name": "   ",
            "kind": "c",
            "count": 0,
            "link": "relative/path.txt",
            "items": [1.0, -2.0],
            "extra": true
        });

        let mut violations = Vec::new();
        contract.check(
            &value,
            &FieldPath::root(),
            &ValidationOptions::strict(),
            &mut violations,
        );

        let error = SchemaValidationError::new(violations);
        assert_eq!(error.violations.len(), 6, "{error}");
        assert_eq!(
            error.find("name").unwrap().reason,
            ViolationReason::RequiredFieldEmpty
        );
        assert!(matches!(
            error.find("kind").unwrap().reason,
            ViolationReason::InvalidEnumValue { .. }
        ));
        assert!(matches!(
            error.find("count").unwrap().reason,
            ViolationReason::NumericRangeViolation { .. }
        ));
        assert!(matches!(
            error.find("link").unwrap().reason,
            ViolationReason::InvalidUri { .. }
        ));
        assert!(matches!(
            error.find("items[1]").unwrap().reason,
            ViolationReason::NumericRangeViolation { .. }
        ));
        assert_eq!(error.unknown_fields(), vec![&FieldPath::from("extra")]);
    }

    #[test]
    fn test_missing_field_points_at_the_field() {
        let contract = Contract::compile("sample", SAMPLE).unwrap();
        let mut violations = Vec::new();
        contract.check(
            &json!({}),
            &FieldPath::root().field("inputs"),
            &ValidationOptions::strict(),
            &mut violations,
        );
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "inputs.name");
        assert_eq!(violations[0].reason, ViolationReason::MissingField);
    }

    #[test]
    fn test_ignore_policy_drops_unknown_fields() {
        let contract = Contract::compile("sample", SAMPLE).unwrap();
        let mut violations = Vec::new();
        contract.check(
            &json!({ "name": "ok", "foo": 1 }),
            &FieldPath::root(),
            &ValidationOptions::lenient(),
            &mut violations,
        );
        assert!(violations.is_empty());
    }

    #[test]
    fn test_field_path_rendering() {
        let instance = json!({ "messages": [{}, {}, { "severity": "loud" }] });
        let path = FieldPath::from_json_pointer("/messages/2/severity", &instance);
        assert_eq!(path.to_string(), "messages[2].severity");
        assert_eq!(FieldPath::from("messages[2].severity"), path);
        assert_eq!(FieldPath::root().to_string(), "<root>");
        assert_eq!(
            FieldPath::from_json_pointer("/inputs/a~1b", &json!({})).to_string(),
            "inputs.a/b"
        );
    }

    #[test]
    fn test_numeric_object_key_stays_a_field() {
        let contract = Contract::compile(
            "open map",
            r#"{
                "type": "object",
                "properties": {
                    "values": {
                        "type": "object",
                        "additionalProperties": { "type": "number", "minimum": 0 }
                    },
                    "series": { "type": "array", "items": { "type": "number", "minimum": 0 } }
                }
            }"#,
        )
        .unwrap();
        let mut violations = Vec::new();
        contract.check(
            &json!({ "values": { "42": -1 }, "series": [0, -1] }),
            &FieldPath::root().field("inputs"),
            &ValidationOptions::strict(),
            &mut violations,
        );

        let mut paths = SchemaValidationError::new(violations).paths();
        paths.sort();
        assert_eq!(paths, vec!["inputs.series[1]", "inputs.values.42"]);
    }

    #[test]
    fn test_overlapping_paths() {
        let parent = FieldPath::from("timing");
        let child = FieldPath::from("timing.started_at");
        assert!(parent.overlaps(&child));
        assert!(child.overlaps(&parent));
        assert!(FieldPath::root().overlaps(&child));
        assert!(!child.overlaps(&FieldPath::from("timing.finished_at")));
    }

    #[test]
    fn test_options_deserialize_from_host_config() {
        let options: ValidationOptions =
            serde_json::from_value(json!({ "legacy_validator_types": "accept_aliases" }))
                .unwrap();
        assert_eq!(options.unknown_fields, UnknownFieldPolicy::Reject);
        assert_eq!(
            options.legacy_validator_types,
            LegacyTypePolicy::AcceptAliases
        );
    }
}
