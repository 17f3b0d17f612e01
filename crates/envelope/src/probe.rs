//! Domain result helpers.
//!
//! A probe report is what a worker builds before it knows how the result
//! will be wrapped. Its status and the envelope's `status` are separate
//! fields; [`ProbeReport::is_consistent_with`] reports drift between them
//! but nothing enforces it.

use crate::envelope::{ValidationMessage, ValidationStatus};
use crate::validation::{FieldPath, SchemaValidationError, Violation, ViolationReason};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Success,
    #[default]
    Error,
}

pub trait ProbeReport {
    fn status(&self) -> ProbeStatus;
    fn errors(&self) -> &[String];
    fn messages(&self) -> &[String];

    fn is_success(&self) -> bool {
        self.status() == ProbeStatus::Success
    }

    /// A probe error means the subject failed, so it maps to `failure`.
    fn envelope_status(&self) -> ValidationStatus {
        match self.status() {
            ProbeStatus::Success => ValidationStatus::Success,
            ProbeStatus::Error => ValidationStatus::Failure,
        }
    }

    fn is_consistent_with(&self, status: ValidationStatus) -> bool {
        match self.status() {
            ProbeStatus::Success => status == ValidationStatus::Success,
            ProbeStatus::Error => status != ValidationStatus::Success,
        }
    }

    /// Errors first, then informational notes, in their original order.
    fn to_validation_messages(&self) -> Vec<ValidationMessage> {
        self.errors()
            .iter()
            .map(ValidationMessage::error)
            .chain(self.messages().iter().map(ValidationMessage::info))
            .collect()
    }
}

/// A failure with no explanation is not actionable.
pub fn require_failure_reasons(errors: &[String]) -> Result<(), SchemaValidationError> {
    let at = FieldPath::root().field("errors");
    if errors.is_empty() {
        return Err(SchemaValidationError::single(Violation::new(
            at,
            ViolationReason::RequiredFieldEmpty,
        )));
    }

    let violations: Vec<Violation> = errors
        .iter()
        .enumerate()
        .filter(|(_, reason)| reason.trim().is_empty())
        .map(|(i, _)| Violation::new(at.index(i), ViolationReason::RequiredFieldEmpty))
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(SchemaValidationError::new(violations))
    }
}
