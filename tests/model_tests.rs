mod common;

use serde_json::json;
use stockforge::model::{Model, ModelContext, RunMode};

fn build(value: serde_json::Value, mode: RunMode, seed: u64) -> Model {
    Model::new(&common::config_from(value), ModelContext::new(mode, seed)).unwrap()
}

fn assert_all_close(got: &[f64], want: &[f64]) {
    assert_eq!(got.len(), want.len());
    for (g, w) in got.iter().zip(want) {
        assert!((g - w).abs() < 1e-9, "{:?} != {:?}", got, want);
    }
}

#[test]
fn test_repeated_iterations_are_bit_identical() {
    let mut model = common::model(RunMode::Basic);
    let values = model.fitting_values();
    let first = model.evaluate(&values);
    let partition_after_first = model.partition().category(0).data.clone();
    let second = model.evaluate(&values);

    assert_eq!(first.to_bits(), second.to_bits());
    assert_eq!(model.partition().category(0).data, partition_after_first);
    assert_eq!(model.iterations(), 2);

    let mut other = common::model(RunMode::Basic);
    assert_eq!(other.evaluate(&values).to_bits(), first.to_bits());
}

#[test]
fn test_recruitment_and_ageing_fill_the_plus_group() {
    let value = json!({
        "model": {
            "start_year": 2000,
            "final_year": 2009,
            "time_steps": [ { "label": "annual", "processes": ["Recruitment", "Ageing"] } ]
        },
        "categories": [{
            "name": "stock",
            "min_age": 1,
            "max_age": 5,
            "initial_abundance": [0.0, 0.0, 0.0, 0.0, 0.0],
            "mean_weight": [1.0, 1.0, 1.0, 1.0, 1.0]
        }],
        "processes": [
            { "label": "Ageing", "type": "ageing", "categories": ["stock"] },
            {
                "label": "Recruitment",
                "type": "recruitment_constant",
                "categories": ["stock"],
                "proportions": [1.0],
                "r0": 100.0
            }
        ]
    });
    let mut model = build(value, RunMode::Basic, 1);
    model.full_iteration();

    assert_all_close(
        &model.partition().category(0).data,
        &[0.0, 100.0, 100.0, 100.0, 700.0],
    );
    assert!((model.partition().total_abundance() - 1000.0).abs() < 1e-9);
}

#[test]
fn test_maturation_moves_a_share_between_categories() {
    let value = json!({
        "model": {
            "start_year": 2000,
            "final_year": 2000,
            "time_steps": [ { "label": "annual", "processes": ["Maturation"] } ]
        },
        "categories": [
            {
                "name": "immature",
                "min_age": 1,
                "max_age": 3,
                "initial_abundance": [10.0, 20.0, 30.0],
                "mean_weight": [1.0, 1.0, 1.0]
            },
            {
                "name": "mature",
                "min_age": 1,
                "max_age": 3,
                "initial_abundance": [0.0, 0.0, 0.0],
                "mean_weight": [1.0, 1.0, 1.0]
            }
        ],
        "selectivities": [ { "label": "One", "type": "constant", "c": 1.0 } ],
        "processes": [{
            "label": "Maturation",
            "type": "maturation",
            "from": "immature",
            "to": "mature",
            "rate": 0.25,
            "selectivity": "One"
        }]
    });
    let mut model = build(value, RunMode::Basic, 1);
    model.full_iteration();

    let partition = model.partition();
    assert_all_close(&partition.get("immature").unwrap().data, &[7.5, 15.0, 22.5]);
    assert_all_close(&partition.get("mature").unwrap().data, &[2.5, 5.0, 7.5]);
}

#[test]
fn test_natural_mortality_follows_exponential_decay() {
    let value = json!({
        "model": {
            "start_year": 2000,
            "final_year": 2001,
            "time_steps": [ { "label": "annual", "processes": ["Mortality"] } ]
        },
        "categories": [{
            "name": "stock",
            "min_age": 1,
            "max_age": 2,
            "initial_abundance": [100.0, 50.0],
            "mean_weight": [1.0, 1.0]
        }],
        "selectivities": [ { "label": "Half", "type": "constant", "c": 0.5 } ],
        "processes": [{
            "label": "Mortality",
            "type": "mortality_constant",
            "categories": ["stock"],
            "m": [0.2],
            "selectivities": ["Half"]
        }]
    });
    let mut model = build(value, RunMode::Basic, 1);
    model.full_iteration();

    let survival = (-0.2f64 * 0.5 * 2.0).exp();
    assert_all_close(
        &model.partition().category(0).data,
        &[100.0 * survival, 50.0 * survival],
    );
}

#[test]
fn test_bare_vector_name_estimates_every_element() {
    let mut value = common::base_json();
    value["estimates"] = json!([
        { "parameter": "process[Mortality].m", "lower_bound": 0.05, "upper_bound": 0.5 }
    ]);
    let mut model = build(value, RunMode::Estimation, 1);
    assert_eq!(model.estimates()[0].label, "process[Mortality].m");

    let low = model.evaluate(&[0.1]);
    let high = model.evaluate(&[0.4]);
    assert_ne!(low.to_bits(), high.to_bits());
}

#[test]
fn test_year_indexed_estimate() {
    let mut value = common::base_json();
    value["estimates"] = json!([
        {
            "parameter": "process[Fishing].catches{2002}",
            "label": "catch_2002",
            "lower_bound": 0.0,
            "upper_bound": 1000.0
        }
    ]);
    let mut model = build(value, RunMode::Estimation, 1);
    assert_eq!(model.estimate_index("catch_2002"), Some(0));
    assert_eq!(model.estimate_index("process[Fishing].catches{2002}"), Some(0));
    assert_all_close(&model.fitting_values(), &[300.0]);

    let (lower, upper) = model.fitting_bounds();
    assert_all_close(&lower, &[0.0]);
    assert_all_close(&upper, &[1000.0]);

    model.evaluate(&[0.0]);
    assert!((model.estimates()[0].value() - 0.0).abs() < 1e-12);
}

#[test]
fn test_undefined_vector_element_is_a_configuration_error() {
    let mut value = common::base_json();
    value["estimates"] = json!([
        { "parameter": "process[Mortality].m(2)", "lower_bound": 0.05, "upper_bound": 0.5 }
    ]);
    let err = Model::new(
        &common::config_from(value),
        ModelContext::new(RunMode::Basic, 1),
    )
    .err()
    .expect("index 2 does not exist");
    assert!(err.to_string().contains("index 2 is out of range"), "{}", err);
}

#[test]
fn test_simulated_observations_depend_only_on_seed() {
    let simulate = |seed: u64| {
        let mut model = build(common::base_json(), RunMode::Simulation, seed);
        let values = model.fitting_values();
        model.evaluate(&values);
        model.simulate_observations();
        model.observations()[0].observed().clone()
    };

    let configured = common::base_config().observations.len();
    assert_eq!(configured, 1);

    let a = simulate(11);
    let b = simulate(11);
    let c = simulate(12);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.values().all(|v| *v > 0.0));
    assert_eq!(a.keys().copied().collect::<Vec<_>>(), vec![2002, 2004, 2006, 2008]);
}

#[test]
fn test_objective_components_add_up() {
    let mut model = common::model(RunMode::Basic);
    let values = model.fitting_values();
    let total = model.evaluate(&values);
    let objective = model.objective();
    let sum: f64 = objective.components.iter().map(|c| c.score).sum();
    assert!((sum - total).abs() < 1e-9);
    assert!(objective
        .components
        .iter()
        .any(|c| c.label == "CatchPenalty"));
}
