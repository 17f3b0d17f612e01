use job_envelope::*;
use std::path::Path;

const FIXTURES_DIR: &str = "../../contracts/fixtures/envelopes";

fn read_fixture(name: &str) -> String {
    let fixture_path = Path::new(FIXTURES_DIR).join(name);
    std::fs::read_to_string(&fixture_path)
        .unwrap_or_else(|e| panic!("Should be able to read {}: {e}", fixture_path.display()))
}

#[test]
fn given_minimal_input_fixture_when_deserializing_then_matches_contract() {
    let envelope: ValidationInputEnvelope =
        deserialize(&read_fixture("input_energy_simulation.json")).expect("Should deserialize");

    assert_eq!(envelope.run_id, "run-123");
    assert_eq!(envelope.validator_type(), ValidatorType::EnergySimulation);
    assert_eq!(envelope.inputs["timestep_per_hour"], 4);
    assert!(envelope.org.is_none());
    assert!(envelope.context.should_post_callback());
    assert!(envelope.file_with_role("primary-model").is_some());

    assert!(envelope.validate().is_ok());
}

#[test]
fn given_full_input_fixture_when_deserializing_then_every_section_is_populated() {
    let envelope: ValidationInputEnvelope =
        deserialize(&read_fixture("input_full.json")).expect("Should deserialize");

    assert_eq!(envelope.org.as_ref().unwrap().name, "Northwind Energy");
    assert_eq!(
        envelope.workflow.as_ref().unwrap().step_name.as_deref(),
        Some("Annual simulation")
    );
    assert_eq!(envelope.resource_files.len(), 1);
    assert_eq!(envelope.resource_files[0].resource_type, "energyplus_weather");
    assert_eq!(envelope.context.timeout_seconds, Some(3600));
    assert_eq!(envelope.context.callback_id.as_deref(), Some("cb-0001"));
    assert_eq!(envelope.context.tags, ["nightly"]);
}

#[test]
fn given_minimal_output_fixture_when_deserializing_then_generic_fields_are_readable() {
    let envelope: ValidationOutputEnvelope =
        deserialize(&read_fixture("output_success_minimal.json")).expect("Should deserialize");

    assert_eq!(envelope.status(), ValidationStatus::Success);
    assert!(envelope.validator.is_none());
    assert!(envelope.artifacts.is_empty());
    assert_eq!(envelope.metric("eui_kbtu_per_sqft").unwrap().value, 42.1);
    assert_eq!(envelope.execution_seconds, Some(12.4));
}

#[test]
fn given_full_output_fixture_when_deserializing_then_timing_and_raw_outputs_decode() {
    let envelope: ValidationOutputEnvelope =
        deserialize(&read_fixture("output_energy_simulation.json")).expect("Should deserialize");

    let timing = envelope.timing.as_ref().unwrap();
    assert_eq!(timing.running_seconds(), Some(192.25));
    assert_eq!(
        envelope.raw_outputs.as_ref().unwrap().format,
        RawOutputFormat::Directory
    );
    assert_eq!(envelope.artifacts[0].size_bytes, Some(5_242_880));
    assert_eq!(envelope.messages_with(Severity::Warning).len(), 1);
    assert!(!envelope.has_errors());
}

#[test]
fn given_error_output_fixture_when_deserializing_then_outputs_are_absent() {
    let envelope: ValidationOutputEnvelope =
        deserialize(&read_fixture("output_model_exchange_error.json")).expect("Should deserialize");

    assert_eq!(envelope.status, ValidationStatus::Error);
    assert!(envelope.outputs.is_none());
    assert!(envelope.has_errors());
    assert!(!envelope.is_suspicious());
}

#[test]
fn given_callback_fixture_when_deserializing_then_points_at_stored_output() {
    let callback: ValidationCallback =
        deserialize(&read_fixture("callback_result_uri.json")).expect("Should deserialize");

    assert_eq!(
        callback.result_uri.as_deref(),
        Some("gs://bucket/run-123/output.json")
    );
    assert!(callback.output.is_none());
}

#[test]
fn given_many_violations_fixture_when_deserializing_then_each_is_listed() {
    let err = deserialize::<ValidationInputEnvelope>(&read_fixture("input_many_violations.json"))
        .unwrap_err();

    let mut paths = err.as_schema().expect("schema error").paths();
    paths.sort();
    assert_eq!(
        paths,
        [
            "context.timeout_seconds",
            "foo",
            "input_files[0].uri",
            "run_id",
            "validator.type",
        ]
    );
}

#[test]
fn given_every_fixture_when_reserializing_then_it_decodes_to_the_same_value() {
    for name in [
        "input_energy_simulation.json",
        "input_full.json",
    ] {
        let envelope: ValidationInputEnvelope = deserialize(&read_fixture(name)).unwrap();
        let again: ValidationInputEnvelope = deserialize(&serialize(&envelope).unwrap()).unwrap();
        assert_eq!(again, envelope, "{name}");
    }

    for name in [
        "output_success_minimal.json",
        "output_energy_simulation.json",
        "output_model_exchange_error.json",
    ] {
        let envelope: ValidationOutputEnvelope = deserialize(&read_fixture(name)).unwrap();
        let again: ValidationOutputEnvelope =
            deserialize(&serialize_pretty(&envelope).unwrap()).unwrap();
        assert_eq!(again, envelope, "{name}");
    }
}
