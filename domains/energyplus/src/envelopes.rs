use crate::models::{
    EnergyPlusSimulationLogs, EnergyPlusSimulationMetrics, EnergyPlusSimulationOutputs,
    InvocationMode,
};
use job_envelope::{
    require_failure_reasons, BuildError, Domain, OutputEnvelopeBuilder, ProbeReport, ProbeStatus,
    SchemaValidationError, ValidationInputEnvelope, ValidationOutputEnvelope,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Role of the building model in `input_files`.
pub const PRIMARY_MODEL_ROLE: &str = "primary-model";
/// Role of the EPW weather file in `input_files`.
pub const WEATHER_ROLE: &str = "weather";

fn default_timestep_per_hour() -> u32 {
    4
}

/// How to run the simulation. Model and weather files are passed in the
/// envelope's `input_files`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnergyPlusInputs {
    /// 4 means 15-minute intervals. Must be within 1..=60.
    #[serde(default = "default_timestep_per_hour")]
    pub timestep_per_hour: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_period_days: Option<u32>,
    #[serde(default)]
    pub invocation_mode: InvocationMode,
}

impl Default for EnergyPlusInputs {
    fn default() -> Self {
        Self {
            timestep_per_hour: default_timestep_per_hour(),
            run_period_days: None,
            invocation_mode: InvocationMode::default(),
        }
    }
}

/// Execution details that do not fit the generic envelope fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnergyPlusOutputs {
    #[serde(default)]
    pub outputs: EnergyPlusSimulationOutputs,
    #[serde(default)]
    pub metrics: EnergyPlusSimulationMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<EnergyPlusSimulationLogs>,
    pub energyplus_returncode: i32,
    pub execution_seconds: f64,
    pub invocation_mode: InvocationMode,
}

impl EnergyPlusOutputs {
    pub fn new(
        energyplus_returncode: i32,
        execution_seconds: f64,
        invocation_mode: InvocationMode,
    ) -> Self {
        Self {
            outputs: EnergyPlusSimulationOutputs::default(),
            metrics: EnergyPlusSimulationMetrics::default(),
            logs: None,
            energyplus_returncode,
            execution_seconds,
            invocation_mode,
        }
    }

    pub fn with_files(mut self, outputs: EnergyPlusSimulationOutputs) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_metrics(mut self, metrics: EnergyPlusSimulationMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_logs(mut self, logs: EnergyPlusSimulationLogs) -> Self {
        self.logs = Some(logs);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Domain)]
#[domain(
    name = "energy_simulation",
    types(EnergySimulation),
    inputs = EnergyPlusInputs,
    outputs = EnergyPlusOutputs,
    inputs_schema = "../../contracts/domains/energyplus/inputs.v1.json",
    outputs_schema = "../../contracts/domains/energyplus/outputs.v1.json"
)]
pub struct EnergyPlus;

pub type EnergyPlusInputEnvelope = ValidationInputEnvelope<EnergyPlus>;
pub type EnergyPlusOutputEnvelope = ValidationOutputEnvelope<EnergyPlus>;

/// Outcome of one simulation, before it is wrapped in an output envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyPlusRun {
    status: ProbeStatus,
    outputs: EnergyPlusOutputs,
    errors: Vec<String>,
    messages: Vec<String>,
}

impl EnergyPlusRun {
    pub fn success(outputs: EnergyPlusOutputs) -> Self {
        Self {
            status: ProbeStatus::Success,
            outputs,
            errors: Vec::new(),
            messages: Vec::new(),
        }
    }

    /// Fails with `RequiredFieldEmpty` at `errors` when no reason is given.
    pub fn failure(
        errors: Vec<String>,
        outputs: EnergyPlusOutputs,
    ) -> Result<Self, SchemaValidationError> {
        require_failure_reasons(&errors)?;
        Ok(Self {
            status: ProbeStatus::Error,
            outputs,
            errors,
            messages: Vec::new(),
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.messages.push(message.into());
        self
    }

    pub fn outputs(&self) -> &EnergyPlusOutputs {
        &self.outputs
    }

    /// Builds the answer to `input`. Status, messages and the flattened
    /// metrics all come from this run.
    pub fn into_output_envelope(
        self,
        input: &EnergyPlusInputEnvelope,
    ) -> Result<EnergyPlusOutputEnvelope, BuildError> {
        let mut builder = OutputEnvelopeBuilder::answering(input)
            .status(self.envelope_status())
            .messages(self.to_validation_messages())
            .execution_seconds(self.outputs.execution_seconds);
        for metric in self.outputs.metrics.to_validation_metrics() {
            builder = builder.add_metric(metric);
        }

        let envelope = builder.outputs(self.outputs).build()?;
        debug!(
            run_id = %envelope.run_id,
            status = envelope.status.as_str(),
            "energy simulation output built"
        );
        Ok(envelope)
    }
}

impl ProbeReport for EnergyPlusRun {
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
