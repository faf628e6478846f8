mod common;

use serde_json::json;
use stockforge::config::RunParams;
use stockforge::error::StockForgeError;
use stockforge::model::RunMode;
use stockforge::runner::{RunSummary, Runner};

fn params(mode: RunMode, threads: usize) -> RunParams {
    let mut params = RunParams::new("unused.json", mode);
    params.threads = Some(threads);
    params.seed = common::SEED;
    params
}

fn go(value: serde_json::Value, params: RunParams) -> RunSummary {
    Runner::new(params, common::config_from(value))
        .go()
        .expect("run should succeed")
}

#[test]
fn test_basic_run_scores_once() {
    let summary = go(common::base_json(), params(RunMode::Basic, 1));
    assert_eq!(summary.run_mode, RunMode::Basic);
    assert_eq!(summary.evaluations, 1);
    assert!(summary.score.is_finite());
    assert_eq!(summary.estimates.len(), 1);
    assert_eq!(summary.estimates[0].0, "r0");
    assert!((summary.estimates[0].1 - 1000.0).abs() < 1e-6);
}

#[test]
fn test_estimation_improves_on_the_start() {
    let basic = go(common::base_json(), params(RunMode::Basic, 1));
    let fitted = go(common::base_json(), params(RunMode::Estimation, 2));
    assert!(fitted.score <= basic.score + 1e-9);
    assert!(fitted.evaluations > 1);
    let r0 = fitted.estimates[0].1;
    assert!((100.0..=10000.0).contains(&r0));
}

#[test]
fn test_estimation_is_identical_across_thread_counts() {
    let one = go(common::base_json(), params(RunMode::Estimation, 1));
    let three = go(common::base_json(), params(RunMode::Estimation, 3));
    assert_eq!(one.score.to_bits(), three.score.to_bits());
    assert_eq!(one.estimates, three.estimates);
    assert_eq!(one.evaluations, three.evaluations);
}

#[test]
fn test_mcmc_keeps_links_after_burn_in() {
    let summary = go(common::base_json(), params(RunMode::Mcmc, 2));
    assert_eq!(summary.chain_length, 25);
    let rate = summary.acceptance_rate.unwrap();
    assert!((0.0..=1.0).contains(&rate));
}

#[test]
fn test_mcmc_rejects_bad_correlation_limit() {
    let mut value = common::base_json();
    value["mcmc"]["max_correlation"] = json!(1.5);
    let err = Runner::new(params(RunMode::Mcmc, 1), common::config_from(value))
        .go()
        .unwrap_err();
    assert!(matches!(err, StockForgeError::Config(_)));
    assert!(err.to_string().contains("max_correlation"));
}

#[test]
fn test_simulation_runs_each_candidate() {
    let mut p = params(RunMode::Simulation, 1);
    p.simulations = Some(3);
    let summary = go(common::base_json(), p);
    assert_eq!(summary.simulations, 3);
    assert_eq!(summary.evaluations, 3);
}

#[test]
fn test_profile_reports_natural_scale_values() {
    let mut value = common::base_json();
    value["profile"] = json!({
        "parameter": "r0",
        "steps": 3,
        "lower_bound": 500.0,
        "upper_bound": 1500.0
    });
    value["minimiser"]["max_generations"] = json!(3);
    let summary = go(value, params(RunMode::Profiling, 2));

    assert_eq!(summary.profile.len(), 3);
    let values: Vec<f64> = summary.profile.iter().map(|s| s.value).collect();
    for (got, want) in values.iter().zip([500.0, 1000.0, 1500.0]) {
        assert!((got - want).abs() < 1e-9, "{} != {}", got, want);
    }
}

#[test]
fn test_profiling_without_definition_fails() {
    let err = Runner::new(params(RunMode::Profiling, 1), common::base_config())
        .go()
        .unwrap_err();
    assert!(err.to_string().contains("profile"));
}

#[test]
fn test_projection_and_query_are_rejected() {
    for mode in [RunMode::Projection, RunMode::Query] {
        let err = Runner::new(params(mode, 1), common::base_config())
            .go()
            .unwrap_err();
        assert!(matches!(err, StockForgeError::RunMode(_)), "{:?}", mode);
    }
}

#[test]
fn test_fitting_without_estimates_fails_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("objective.txt");
    let mut value = common::base_json();
    value["estimates"] = json!([]);
    value["reports"] = json!([
        { "label": "obj", "type": "objective_function", "file_name": out }
    ]);

    let err = Runner::new(params(RunMode::Estimation, 1), common::config_from(value))
        .go()
        .unwrap_err();
    assert!(err.to_string().contains("requires at least one estimate"));
    assert!(!out.exists());
}

#[test]
fn test_reports_from_definition_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("fishing.txt");
    let mut value = common::base_json();
    value["reports"] = json!([
        { "label": "fishing", "type": "process", "process": "Fishing", "file_name": out }
    ]);

    go(value, params(RunMode::Basic, 1));
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("*process[fishing]\nprocess: Fishing\nsub_type: mortality_event_biomass\n"));
    assert!(text.contains("exploitation_rate:"));
    assert!(text.ends_with("*end\n"));
}
