#![allow(dead_code)]

use serde_json::{json, Value};
use stockforge::config::ModelConfig;
use stockforge::model::{Model, ModelContext, RunMode};

pub const SEED: u64 = 7;

/// A one-category model with recruitment, natural mortality, a biomass fishery and
/// a biomass survey, running 2000-2009 in a single time step.
pub fn base_json() -> Value {
    json!({
        "model": {
            "start_year": 2000,
            "final_year": 2009,
            "time_steps": [
                { "label": "annual", "processes": ["Recruitment", "Mortality", "Fishing", "Ageing"] }
            ],
            "initialisation": { "years": 10, "exclude_processes": ["Fishing"] }
        },
        "categories": [
            {
                "name": "stock",
                "min_age": 1,
                "max_age": 5,
                "initial_abundance": [0.0, 0.0, 0.0, 0.0, 0.0],
                "mean_weight": [0.5, 1.0, 1.5, 2.0, 2.5]
            }
        ],
        "selectivities": [
            { "label": "One", "type": "constant", "c": 1.0 },
            { "label": "Fishery", "type": "knife_edge", "e": 2.0 }
        ],
        "processes": [
            { "label": "Ageing", "type": "ageing", "categories": ["stock"] },
            {
                "label": "Recruitment",
                "type": "recruitment_constant",
                "categories": ["stock"],
                "proportions": [1.0],
                "r0": 1000.0
            },
            {
                "label": "Mortality",
                "type": "mortality_constant",
                "categories": ["stock"],
                "m": [0.2],
                "selectivities": ["One"]
            },
            {
                "label": "Fishing",
                "type": "mortality_event_biomass",
                "categories": ["stock"],
                "selectivities": ["Fishery"],
                "years": [2000, 2001, 2002, 2003, 2004],
                "catches": [200.0, 250.0, 300.0, 250.0, 200.0],
                "penalty": "CatchPenalty"
            }
        ],
        "penalties": [ { "label": "CatchPenalty", "log_scale": true } ],
        "observations": [
            {
                "label": "Survey",
                "type": "biomass",
                "time_step": "annual",
                "categories": ["stock"],
                "selectivities": ["One"],
                "q": 0.001,
                "years": [2002, 2004, 2006, 2008],
                "obs": [5.0, 4.6, 4.8, 5.1],
                "error_values": [0.2, 0.2, 0.2, 0.2]
            }
        ],
        "estimates": [
            {
                "parameter": "process[Recruitment].r0",
                "label": "r0",
                "lower_bound": 100.0,
                "upper_bound": 10000.0,
                "transformation": { "type": "log" }
            }
        ],
        "minimiser": { "max_generations": 15 },
        "mcmc": { "length": 30, "burn_in": 5, "start_from_mpd": false }
    })
}

pub fn config_from(value: Value) -> ModelConfig {
    serde_json::from_value(value).expect("test model definition should deserialize")
}

pub fn base_config() -> ModelConfig {
    config_from(base_json())
}

pub fn model(mode: RunMode) -> Model {
    Model::new(&base_config(), ModelContext::new(mode, SEED)).expect("base model should build")
}

pub fn models(mode: RunMode, count: usize) -> Vec<Model> {
    let config = base_config();
    (1..=count)
        .map(|id| {
            Model::new(&config, ModelContext::new(mode, SEED).with_id(id))
                .expect("worker model should build")
        })
        .collect()
}

/// Candidates spread across the fitting range of r0 (log scale).
pub fn r0_candidates(count: usize) -> Vec<Vec<f64>> {
    let (lo, hi) = (100f64.ln(), 10000f64.ln());
    (0..count)
        .map(|k| vec![lo + (hi - lo) * (k as f64 + 0.5) / count as f64])
        .collect()
}
