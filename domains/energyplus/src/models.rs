use job_envelope::ValidationMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Characters of stdout/stderr kept in an envelope.
pub const STDOUT_TAIL_CHARS: usize = 4000;
/// Lines of `eplusout.err` kept in an envelope.
pub const LOG_TAIL_LINES: usize = 200;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    PythonApi,
    #[default]
    Cli,
}

/// Standard files written by a simulation, relative to the run directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnergyPlusSimulationOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eplusout_sql: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eplusout_err: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eplusout_csv: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eplusout_eso: Option<PathBuf>,
}

impl EnergyPlusSimulationOutputs {
    /// The conventional `eplusout.*` names inside `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            eplusout_sql: Some(dir.join("eplusout.sql")),
            eplusout_err: Some(dir.join("eplusout.err")),
            eplusout_csv: Some(dir.join("eplusout.csv")),
            eplusout_eso: Some(dir.join("eplusout.eso")),
        }
    }
}

/// Signals extracted from `eplusout.sql`. Names match the validator catalog
/// keys that workflow assertions bind to.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnergyPlusSimulationMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_electricity_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_natural_gas_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_district_cooling_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_district_heating_kwh: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_eui_kwh_m2: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heating_energy_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooling_energy_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interior_lighting_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fans_energy_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pumps_energy_kwh: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_systems_kwh: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmet_heating_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unmet_cooling_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_electric_demand_w: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor_area_m2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_count: Option<u32>,
}

impl EnergyPlusSimulationMetrics {
    /// Flattens the populated signals into generic envelope metrics, in
    /// declaration order.
    pub fn to_validation_metrics(&self) -> Vec<ValidationMetric> {
        let signals: [(&str, Option<f64>, &str, &str); 16] = [
            ("site_electricity_kwh", self.site_electricity_kwh, "kWh", "energy"),
            ("site_natural_gas_kwh", self.site_natural_gas_kwh, "kWh", "energy"),
            ("site_district_cooling_kwh", self.site_district_cooling_kwh, "kWh", "energy"),
            ("site_district_heating_kwh", self.site_district_heating_kwh, "kWh", "energy"),
            ("site_eui_kwh_m2", self.site_eui_kwh_m2, "kWh/m2", "intensity"),
            ("heating_energy_kwh", self.heating_energy_kwh, "kWh", "end_use"),
            ("cooling_energy_kwh", self.cooling_energy_kwh, "kWh", "end_use"),
            ("interior_lighting_kwh", self.interior_lighting_kwh, "kWh", "end_use"),
            ("fans_energy_kwh", self.fans_energy_kwh, "kWh", "end_use"),
            ("pumps_energy_kwh", self.pumps_energy_kwh, "kWh", "end_use"),
            ("water_systems_kwh", self.water_systems_kwh, "kWh", "end_use"),
            ("unmet_heating_hours", self.unmet_heating_hours, "h", "comfort"),
            ("unmet_cooling_hours", self.unmet_cooling_hours, "h", "comfort"),
            ("peak_electric_demand_w", self.peak_electric_demand_w, "W", "comfort"),
            ("floor_area_m2", self.floor_area_m2, "m2", "building"),
            ("zone_count", self.zone_count.map(f64::from), "", "building"),
        ];

        signals
            .into_iter()
            .filter_map(|(name, value, unit, category)| {
                let metric = ValidationMetric::new(name, value?).with_category(category);
                Some(if unit.is_empty() {
                    metric
                } else {
                    metric.with_unit(unit)
                })
            })
            .collect()
    }
}

/// Tails of process output, kept short so envelopes stay small.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnergyPlusSimulationLogs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout_tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub err_tail: Option<String>,
}

impl EnergyPlusSimulationLogs {
    pub fn capture(stdout: &str, stderr: &str, err_file: Option<&str>) -> Self {
        let non_empty = |s: String| (!s.is_empty()).then_some(s);
        Self {
            stdout_tail: non_empty(tail_chars(stdout, STDOUT_TAIL_CHARS)),
            stderr_tail: non_empty(tail_chars(stderr, STDOUT_TAIL_CHARS)),
            err_tail: err_file
                .map(|text| tail_lines(text, LOG_TAIL_LINES))
                .and_then(non_empty),
        }
    }
}

/// Last `max` characters of `text`.
pub fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

/// Last `max` lines of `text`, joined with `\n`.
pub fn tail_lines(text: &str, max: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(max);
    lines[start..].join("\n")
}
