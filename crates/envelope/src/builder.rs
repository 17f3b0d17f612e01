use crate::domain::Domain;
use crate::envelope::*;
use crate::validation::EnvelopeError;
use std::time::Instant;

pub struct InputEnvelopeBuilder<D: Domain> {
    run_id: Option<String>,
    validator: Option<ValidatorInfo>,
    org: Option<OrganizationInfo>,
    workflow: Option<WorkflowInfo>,
    input_files: Vec<InputFileItem>,
    resource_files: Vec<ResourceFileItem>,
    inputs: Option<D::Inputs>,
    context: ExecutionContext,
}

impl<D: Domain> Default for InputEnvelopeBuilder<D> {
    fn default() -> Self {
        Self {
            run_id: None,
            validator: None,
            org: None,
            workflow: None,
            input_files: Vec::new(),
            resource_files: Vec::new(),
            inputs: None,
            context: ExecutionContext::default(),
        }
    }
}

impl<D: Domain> InputEnvelopeBuilder<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn validator(mut self, validator: ValidatorInfo) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn org(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.org = Some(OrganizationInfo {
            id: id.into(),
            name: name.into(),
        });
        self
    }

    pub fn workflow(mut self, workflow: WorkflowInfo) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn add_input_file(mut self, file: InputFileItem) -> Self {
        self.input_files.push(file);
        self
    }

    pub fn add_resource_file(mut self, file: ResourceFileItem) -> Self {
        self.resource_files.push(file);
        self
    }

    pub fn inputs(mut self, inputs: D::Inputs) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Missing `inputs` fall back to the domain's defaults.
    pub fn build(self) -> Result<ValidationInputEnvelope<D>, BuildError> {
        let run_id = self.run_id.ok_or(BuildError::MissingField("run_id"))?;
        let validator = self.validator.ok_or(BuildError::MissingField("validator"))?;

        let envelope = ValidationInputEnvelope {
            schema_version: INPUT_SCHEMA_VERSION.to_string(),
            run_id,
            validator,
            org: self.org,
            workflow: self.workflow,
            input_files: self.input_files,
            resource_files: self.resource_files,
            inputs: self.inputs.unwrap_or_default(),
            context: self.context,
        };
        envelope.validate()?;
        Ok(envelope)
    }
}

pub struct OutputEnvelopeBuilder<D: Domain> {
    run_id: Option<String>,
    validator: Option<ValidatorInfo>,
    status: Option<ValidationStatus>,
    timing: Option<ValidationTiming>,
    messages: Vec<ValidationMessage>,
    metrics: Vec<ValidationMetric>,
    artifacts: Vec<ValidationArtifact>,
    raw_outputs: Option<RawOutputs>,
    outputs: Option<D::Outputs>,
    execution_seconds: Option<f64>,
}

impl<D: Domain> Default for OutputEnvelopeBuilder<D> {
    fn default() -> Self {
        Self {
            run_id: None,
            validator: None,
            status: None,
            timing: None,
            messages: Vec::new(),
            metrics: Vec::new(),
            artifacts: Vec::new(),
            raw_outputs: None,
            outputs: None,
            execution_seconds: None,
        }
    }
}

impl<D: Domain> OutputEnvelopeBuilder<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts an output that answers `input`: same run_id and validator.
    pub fn answering(input: &ValidationInputEnvelope<D>) -> Self {
        Self::new()
            .run_id(input.run_id.clone())
            .validator(input.validator.clone())
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn validator(mut self, validator: ValidatorInfo) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn status(mut self, status: ValidationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn success(self) -> Self {
        self.status(ValidationStatus::Success)
    }

    pub fn failure(self) -> Self {
        self.status(ValidationStatus::Failure)
    }

    pub fn error(self) -> Self {
        self.status(ValidationStatus::Error)
    }

    pub fn timing(mut self, timing: ValidationTiming) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn add_message(mut self, message: ValidationMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn add_info(self, text: impl Into<String>) -> Self {
        self.add_message(ValidationMessage::info(text))
    }

    pub fn add_warning(self, text: impl Into<String>) -> Self {
        self.add_message(ValidationMessage::warning(text))
    }

    pub fn add_error(self, text: impl Into<String>) -> Self {
        self.add_message(ValidationMessage::error(text))
    }

    pub fn messages(mut self, messages: Vec<ValidationMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn add_metric(mut self, metric: ValidationMetric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn add_artifact(mut self, artifact: ValidationArtifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn raw_outputs(mut self, format: RawOutputFormat, manifest_uri: impl Into<String>) -> Self {
        self.raw_outputs = Some(RawOutputs {
            format,
            manifest_uri: manifest_uri.into(),
        });
        self
    }

    pub fn outputs(mut self, outputs: D::Outputs) -> Self {
        self.outputs = Some(outputs);
        self
    }

    pub fn execution_seconds(mut self, seconds: f64) -> Self {
        self.execution_seconds = Some(seconds);
        self
    }

    /// Runs `f` and records its wall-clock time as `execution_seconds`.
    pub fn with_timing<F, R>(self, f: F) -> (Self, R)
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed().as_secs_f64();

        (self.execution_seconds(elapsed), result)
    }

    pub fn build(self) -> Result<ValidationOutputEnvelope<D>, BuildError> {
        let run_id = self.run_id.ok_or(BuildError::MissingField("run_id"))?;
        let status = self.status.ok_or(BuildError::MissingField("status"))?;

        let envelope = ValidationOutputEnvelope {
            schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
            run_id,
            validator: self.validator,
            status,
            timing: self.timing,
            messages: self.messages,
            metrics: self.metrics,
            artifacts: self.artifacts,
            raw_outputs: self.raw_outputs,
            outputs: self.outputs,
            execution_seconds: self.execution_seconds,
        };
        envelope.validate()?;
        Ok(envelope)
    }
}

pub struct CallbackBuilder<D: Domain> {
    run_id: Option<String>,
    callback_id: Option<String>,
    status: Option<ValidationStatus>,
    result_uri: Option<String>,
    output: Option<ValidationOutputEnvelope<D>>,
}

impl<D: Domain> Default for CallbackBuilder<D> {
    fn default() -> Self {
        Self {
            run_id: None,
            callback_id: None,
            status: None,
            result_uri: None,
            output: None,
        }
    }
}

impl<D: Domain> CallbackBuilder<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echoes the idempotency key the platform put in the input context.
    pub fn replying_to(input: &ValidationInputEnvelope<D>) -> Self {
        let mut builder = Self::new().run_id(input.run_id.clone());
        builder.callback_id = input.context.callback_id.clone();
        builder
    }

    pub fn run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn callback_id(mut self, callback_id: impl Into<String>) -> Self {
        self.callback_id = Some(callback_id.into());
        self
    }

    pub fn status(mut self, status: ValidationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn result_uri(mut self, uri: impl Into<String>) -> Self {
        self.result_uri = Some(uri.into());
        self
    }

    /// Embeds the output. Status defaults to the output's own status.
    pub fn output(mut self, output: ValidationOutputEnvelope<D>) -> Self {
        if self.status.is_none() {
            self.status = Some(output.status);
        }
        self.output = Some(output);
        self
    }

    pub fn build(self) -> Result<ValidationCallback<D>, BuildError> {
        let run_id = self.run_id.ok_or(BuildError::MissingField("run_id"))?;
        let status = self.status.ok_or(BuildError::MissingField("status"))?;

        let callback = ValidationCallback {
            run_id,
            callback_id: self.callback_id,
            status,
            result_uri: self.result_uri,
            output: self.output,
        };
        callback.validate()?;
        Ok(callback)
    }
}

impl<D: Domain> ValidationInputEnvelope<D> {
    pub fn builder() -> InputEnvelopeBuilder<D> {
        InputEnvelopeBuilder::new()
    }
}

impl<D: Domain> ValidationOutputEnvelope<D> {
    pub fn builder() -> OutputEnvelopeBuilder<D> {
        OutputEnvelopeBuilder::new()
    }
}

impl<D: Domain> ValidationCallback<D> {
    pub fn builder() -> CallbackBuilder<D> {
        CallbackBuilder::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("{0} is required to build an envelope")]
    MissingField(&'static str),

    #[error(transparent)]
    Invalid(#[from] EnvelopeError),
}

impl BuildError {
    pub fn violations(&self) -> &[crate::validation::Violation] {
        match self {
            Self::Invalid(err) => err.violations(),
            Self::MissingField(_) => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Generic;

    fn validator() -> ValidatorInfo {
        ValidatorInfo::new("v1", ValidatorType::Basic, "1.0.0")
    }

    #[test]
    fn test_input_builder_requires_run_id() {
        let result = InputEnvelopeBuilder::<Generic>::new()
            .validator(validator())
            .build();
        assert!(matches!(result, Err(BuildError::MissingField("run_id"))));
    }

    #[test]
    fn test_input_builder_validates_nested_fields() {
        let err = InputEnvelopeBuilder::<Generic>::new()
            .run_id("run-1")
            .validator(validator())
            .add_input_file(InputFileItem::new("model.idf", "text/plain", "model.idf"))
            .context(ExecutionContext::new().with_timeout_seconds(0))
            .build()
            .unwrap_err();

        let mut paths: Vec<String> = err.violations().iter().map(|v| v.path.to_string()).collect();
        paths.sort();
        assert_eq!(paths, vec!["context.timeout_seconds", "input_files[0].uri"]);
    }

    #[test]
    fn test_output_builder_with_timing() {
        let (builder, value) = OutputEnvelopeBuilder::<Generic>::new()
            .run_id("run-1")
            .success()
            .with_timing(|| 7);
        let envelope = builder.build().unwrap();

        assert_eq!(value, 7);
        assert!(envelope.execution_seconds.unwrap() >= 0.0);
    }

    #[test]
    fn test_output_builder_keeps_message_order() {
        let envelope = OutputEnvelopeBuilder::<Generic>::new()
            .run_id("run-1")
            .failure()
            .add_error("first")
            .add_warning("second")
            .add_info("third")
            .build()
            .unwrap();

        let texts: Vec<&str> = envelope.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["first", "second", "third"]);
    }

    #[test]
    fn test_callback_builder_needs_a_result() {
        let err = CallbackBuilder::<Generic>::new()
            .run_id("run-1")
            .status(ValidationStatus::Success)
            .build()
            .unwrap_err();
        assert_eq!(err.violations().len(), 1);
        assert_eq!(err.violations()[0].path, "result_uri");
    }

    #[test]
    fn test_callback_builder_takes_status_from_output() {
        let output = OutputEnvelopeBuilder::<Generic>::new()
            .run_id("run-1")
            .failure()
            .build()
            .unwrap();
        let callback = CallbackBuilder::new()
            .run_id("run-1")
            .output(output)
            .build()
            .unwrap();
        assert_eq!(callback.status, ValidationStatus::Failure);
    }
}
