mod common;

use rstest::rstest;
use serde_json::{json, Value};
use stockforge::config::{ModelConfig, RunParams};
use stockforge::error::StockForgeError;
use stockforge::model::{Model, ModelContext, RunMode};

fn build_error(value: Value, mode: RunMode) -> String {
    let config = common::config_from(value);
    match Model::new(&config, ModelContext::new(mode, common::SEED)) {
        Ok(_) => panic!("model should not build"),
        Err(StockForgeError::Config(errors)) => errors.to_string(),
        Err(other) => panic!("unexpected error: {}", other),
    }
}

#[rstest]
#[case::unknown_category("/processes/0/categories/0", json!("ghost"), "process[Ageing]: category ghost does not exist")]
#[case::unknown_selectivity("/processes/2/selectivities/0", json!("Nope"), "process[Mortality]: selectivity Nope does not exist")]
#[case::unknown_penalty("/processes/3/penalty", json!("Missing"), "process[Fishing]: penalty Missing does not exist")]
#[case::unknown_time_step_process("/model/time_steps/0/processes/0", json!("Spawning"), "time_step[annual]: process Spawning does not exist")]
#[case::unknown_observation_time_step("/observations/0/time_step", json!("spring"), "observation[Survey]")]
#[case::bad_start_year("/model/start_year", json!(2020), "start_year (2020) is after final_year (2009)")]
#[case::abundance_length("/categories/0/initial_abundance", json!([1.0, 2.0]), "initial_abundance has 2 values but the category spans 5 ages")]
#[case::proportions("/processes/1/proportions/0", json!(0.5), "process[Recruitment]")]
#[case::estimate_target("/estimates/0/parameter", json!("process[Ghost].r0"), "process[Ghost] does not exist")]
#[case::estimate_name("/estimates/0/parameter", json!("process[Recruitment].r1"), "is not an estimable parameter")]
#[case::estimate_bounds("/estimates/0/lower_bound", json!(2000.0), "is outside the bounds")]
#[case::observation_year_repeated("/observations/0/years/1", json!(2002), "observation[Survey]: year 2002 has been specified more than once")]
fn test_single_problem_is_reported(
    #[case] pointer: &str,
    #[case] replacement: Value,
    #[case] expected: &str,
) {
    let mut value = common::base_json();
    *value.pointer_mut(pointer).expect("pointer should exist") = replacement;
    let message = build_error(value, RunMode::Basic);
    assert!(message.contains(expected), "{}", message);
}

#[test]
fn test_problems_in_one_phase_are_reported_together() {
    let mut value = common::base_json();
    value["processes"][3]["u_max"] = json!(1.2);
    value["observations"][0]["q"] = json!(-1.0);
    value["selectivities"][1]["label"] = json!("One");
    value["penalties"][0]["multiplier"] = json!(-2.0);

    let message = build_error(value, RunMode::Basic);
    assert!(message.contains("u_max (1.2)"), "{}", message);
    assert!(message.contains("q (-1) must be greater than 0"), "{}", message);
    assert!(message.contains("selectivity[One]: label is defined more than once"));
    assert!(message.contains("multiplier (-2) cannot be negative"));
    assert_eq!(message.lines().count(), 4, "{}", message);
}

#[rstest]
#[case(RunMode::Estimation)]
#[case(RunMode::Mcmc)]
#[case(RunMode::Profiling)]
fn test_fitting_modes_need_estimates(#[case] mode: RunMode) {
    let mut value = common::base_json();
    value["estimates"] = json!([]);
    let message = build_error(value, mode);
    assert!(message.contains(&format!("run mode {} requires at least one estimate", mode)));
}

#[test]
fn test_simulation_needs_observations() {
    let mut value = common::base_json();
    value["observations"] = json!([]);
    value["estimates"] = json!([]);
    let message = build_error(value, RunMode::Simulation);
    assert!(message.contains("simulation requires at least one observation"));
}

#[test]
fn test_defaults_are_filled_in() {
    let config = common::base_config();
    assert_eq!(config.model.threads, 1);
    assert_eq!(config.minimiser.population_size, 0);
    assert!((config.mcmc.max_correlation - 0.8).abs() < f64::EPSILON);
    assert_eq!(config.simulation.candidates, 1);
    assert!(config.profile.is_none());
}

#[test]
fn test_mean_weight_by_time_step() {
    let mut value = common::base_json();
    value["categories"][0]["mean_weight"] = json!([[1.0, 1.0, 1.0, 1.0, 1.0]]);
    let config = common::config_from(value);
    let model = Model::new(&config, ModelContext::new(RunMode::Basic, 1)).unwrap();
    assert_eq!(model.partition().category(0).mean_weight(0, 3), 1.0);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.json");
    std::fs::write(&path, common::base_json().to_string()).unwrap();

    let config = ModelConfig::load_from_file(&path).unwrap();
    assert_eq!(config.processes.len(), 4);

    let missing = ModelConfig::load_from_file(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(missing, StockForgeError::Io(_)));

    std::fs::write(&path, "{ \"model\": 3 }").unwrap();
    let bad = ModelConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(bad, StockForgeError::Json(_)));
}

#[rstest]
#[case("basic", RunMode::Basic)]
#[case("MCMC", RunMode::Mcmc)]
#[case("Estimation", RunMode::Estimation)]
fn test_run_mode_parses_case_insensitively(#[case] text: &str, #[case] mode: RunMode) {
    assert_eq!(text.parse::<RunMode>().unwrap(), mode);
}

#[test]
fn test_run_params_defaults() {
    let params = RunParams::new("model.json", RunMode::Basic);
    assert_eq!(params.seed, stockforge::consts::DEFAULT_SEED);
    assert!(params.threads.is_none());
    assert!(!params.tabular);
}
