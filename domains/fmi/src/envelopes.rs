use job_envelope::{
    BuildError, Domain, ExecutionContext, InputFileItem, SupportedMimeType,
    ValidationInputEnvelope, ValidationOutputEnvelope, ValidatorInfo, WorkflowInfo,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Role of the FMU archive in `input_files`.
pub const FMU_ROLE: &str = "fmu";

fn default_stop_time() -> f64 {
    1.0
}

fn default_step_size() -> f64 {
    0.01
}

/// Simulation time window and solver settings, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FmiSimulationConfig {
    #[serde(default)]
    pub start_time: f64,
    #[serde(default = "default_stop_time")]
    pub stop_time: f64,
    #[serde(default = "default_step_size")]
    pub step_size: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl Default for FmiSimulationConfig {
    fn default() -> Self {
        Self {
            start_time: 0.0,
            stop_time: default_stop_time(),
            step_size: default_step_size(),
            tolerance: None,
        }
    }
}

impl FmiSimulationConfig {
    pub fn steps(&self) -> u64 {
        ((self.stop_time - self.start_time) / self.step_size).ceil().max(0.0) as u64
    }
}

/// Resolved inputs plus simulation settings, keyed by catalog slugs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FmiInputs {
    #[serde(default)]
    pub input_values: Map<String, Value>,
    #[serde(default)]
    pub simulation: FmiSimulationConfig,
    /// Slugs to capture. Empty means every output slug.
    #[serde(default)]
    pub output_variables: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FmiOutputs {
    #[serde(default)]
    pub output_values: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fmu_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fmi_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    pub execution_seconds: f64,
    pub simulation_time_reached: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fmu_log: Option<String>,
}

impl FmiOutputs {
    pub fn new(execution_seconds: f64, simulation_time_reached: f64) -> Self {
        Self {
            output_values: Map::new(),
            fmu_guid: None,
            fmi_version: None,
            model_name: None,
            execution_seconds,
            simulation_time_reached,
            fmu_log: None,
        }
    }

    pub fn with_value(mut self, slug: impl Into<String>, value: impl Into<Value>) -> Self {
        self.output_values.insert(slug.into(), value.into());
        self
    }

    /// True when the run stopped at or past the requested stop time.
    pub fn reached(&self, config: &FmiSimulationConfig) -> bool {
        self.simulation_time_reached >= config.stop_time
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Domain)]
#[domain(
    name = "model_exchange",
    types(ModelExchange),
    inputs = FmiInputs,
    outputs = FmiOutputs,
    inputs_schema = "../../contracts/domains/fmi/inputs.v1.json",
    outputs_schema = "../../contracts/domains/fmi/outputs.v1.json"
)]
pub struct Fmi;

pub type FmiInputEnvelope = ValidationInputEnvelope<Fmi>;
/// `outputs` is absent when the simulation never completed.
pub type FmiOutputEnvelope = ValidationOutputEnvelope<Fmi>;

/// Everything the platform knows when it dispatches an FMU run.
#[derive(Debug, Clone)]
pub struct FmiInputRequest {
    pub run_id: String,
    pub validator: ValidatorInfo,
    pub org_id: String,
    pub org_name: String,
    pub workflow_id: String,
    pub step_id: String,
    pub step_name: Option<String>,
    pub fmu_uri: String,
    pub input_values: Map<String, Value>,
    pub callback_url: String,
    pub execution_bundle_uri: String,
    pub simulation: Option<FmiSimulationConfig>,
    pub output_variables: Vec<String>,
}

/// Assembles and validates the input envelope for one FMU run. The FMU is
/// the single input file, under the `fmu` role.
#[instrument(skip(request), fields(run_id = %request.run_id))]
pub fn build_fmi_input_envelope(request: FmiInputRequest) -> Result<FmiInputEnvelope, BuildError> {
    let fmu = InputFileItem::new("model.fmu", SupportedMimeType::Fmu, request.fmu_uri)
        .with_role(FMU_ROLE);
    let inputs = FmiInputs {
        input_values: request.input_values,
        simulation: request.simulation.unwrap_or_default(),
        output_variables: request.output_variables,
    };
    let context = ExecutionContext::new()
        .with_callback_url(request.callback_url)
        .with_execution_bundle_uri(request.execution_bundle_uri);

    let envelope = FmiInputEnvelope::builder()
        .run_id(request.run_id)
        .validator(request.validator)
        .org(request.org_id, request.org_name)
        .workflow(WorkflowInfo {
            id: request.workflow_id,
            step_id: request.step_id,
            step_name: request.step_name,
        })
        .add_input_file(fmu)
        .inputs(inputs)
        .context(context)
        .build()?;

    debug!(inputs = envelope.inputs.input_values.len(), "fmi input envelope built");
    Ok(envelope)
}
