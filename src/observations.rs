use crate::config::{ObservationConfig, ObservationKindConfig};
use crate::error::ConfigErrors;
use crate::estimates::addressable::Addressable;
use crate::math::{standard_normal, zero_fun};
use crate::model::partition::Partition;
use crate::processes::{join_values, resolve_categories, resolve_selectivities};
use crate::selectivities::Selectivity;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

/// Relative biomass index, `expected = q · Σ N·sel·w`, compared to the observed index
/// with a lognormal likelihood.
#[derive(Debug, Clone)]
pub struct Observation {
    pub label: String,
    time_step_label: String,
    time_step: usize,
    category_labels: Vec<String>,
    selectivity_labels: Vec<String>,
    categories: Vec<usize>,
    selectivities: Vec<usize>,
    q: f64,
    observed: BTreeMap<u32, f64>,
    cvs: BTreeMap<u32, f64>,
    expected: BTreeMap<u32, f64>,
    scores: BTreeMap<u32, f64>,
}

impl Observation {
    pub fn new(
        cfg: &ObservationConfig,
        model_years: &[u32],
        errors: &mut ConfigErrors,
    ) -> Option<Self> {
        let location = format!("observation[{}]", cfg.label);
        let before = errors.len();

        let ObservationKindConfig::Biomass {
            time_step,
            categories,
            selectivities,
            q,
            years,
            obs,
            error_values,
        } = &cfg.kind;

        if categories.len() != selectivities.len() {
            errors.push(
                &location,
                format!(
                    "number of selectivities ({}) does not match the number of categories ({})",
                    selectivities.len(),
                    categories.len()
                ),
            );
        }
        if obs.len() != years.len() || error_values.len() != years.len() {
            errors.push(
                &location,
                format!(
                    "years ({}), obs ({}) and error_values ({}) must have the same length",
                    years.len(),
                    obs.len(),
                    error_values.len()
                ),
            );
        }
        if *q <= 0.0 {
            errors.push(&location, format!("q ({}) must be greater than 0", q));
        }
        if let Some(y) = years.iter().find(|y| !model_years.contains(y)) {
            errors.push(&location, format!("year {} is outside the model years", y));
        }
        let mut seen = HashSet::new();
        for year in years.iter().filter(|y| !seen.insert(**y)) {
            errors.push(&location, format!("year {} has been specified more than once", year));
        }
        if let Some(o) = obs.iter().find(|o| **o <= 0.0) {
            errors.push(&location, format!("observation ({}) must be greater than 0", o));
        }
        if let Some(cv) = error_values.iter().find(|cv| **cv <= 0.0) {
            errors.push(&location, format!("error value ({}) must be greater than 0", cv));
        }
        if errors.len() > before {
            return None;
        }

        Some(Self {
            label: cfg.label.clone(),
            time_step_label: time_step.clone(),
            time_step: 0,
            category_labels: categories.clone(),
            selectivity_labels: selectivities.clone(),
            categories: Vec::new(),
            selectivities: Vec::new(),
            q: *q,
            observed: years.iter().copied().zip(obs.iter().copied()).collect(),
            cvs: years.iter().copied().zip(error_values.iter().copied()).collect(),
            expected: BTreeMap::new(),
            scores: BTreeMap::new(),
        })
    }

    pub fn location(&self) -> String {
        format!("observation[{}]", self.label)
    }

    pub fn build(
        &mut self,
        time_step_labels: &[String],
        partition: &Partition,
        selectivities: &[Selectivity],
        errors: &mut ConfigErrors,
    ) {
        let location = self.location();
        match time_step_labels
            .iter()
            .position(|l| l == &self.time_step_label)
        {
            Some(i) => self.time_step = i,
            None => errors.push(
                &location,
                format!("time step {} does not exist", self.time_step_label),
            ),
        }
        self.categories = resolve_categories(&location, &self.category_labels, partition, errors);
        self.selectivities =
            resolve_selectivities(&location, &self.selectivity_labels, selectivities, errors);
    }

    pub fn reset(&mut self) {
        self.expected.clear();
        self.scores.clear();
    }

    /// Records the expected index when the model reaches this observation's time step
    /// in an observed year.
    pub fn execute(
        &mut self,
        partition: &Partition,
        year: u32,
        time_step: usize,
        selectivities: &[Selectivity],
    ) {
        if time_step != self.time_step || !self.observed.contains_key(&year) {
            return;
        }
        let mut biomass = 0.0;
        for (&ci, &si) in self.categories.iter().zip(&self.selectivities) {
            let category = partition.category(ci);
            let selectivity = &selectivities[si];
            for (age, n) in category.ages().zip(&category.data) {
                biomass += n * selectivity.age_result(age) * category.mean_weight(time_step, age);
            }
        }
        self.expected.insert(year, self.q * biomass);
    }

    fn sigma(cv: f64) -> f64 {
        (1.0 + cv * cv).ln().sqrt()
    }

    /// Lognormal negative log-likelihood summed over the observed years.
    pub fn calculate_score(&mut self) -> f64 {
        self.scores.clear();
        let mut total = 0.0;
        for (&year, &obs) in &self.observed {
            let expected = zero_fun(self.expected.get(&year).copied().unwrap_or(0.0));
            let sigma = Self::sigma(self.cvs[&year]);
            let z = (obs / expected).ln() / sigma + 0.5 * sigma;
            let score = sigma.ln() + 0.5 * z * z;
            self.scores.insert(year, score);
            total += score;
        }
        total
    }

    /// Replaces the observed values with draws around the current expectations.
    pub fn simulate(&mut self, rng: &mut fastrand::Rng) {
        for (year, obs) in self.observed.iter_mut() {
            let expected = zero_fun(self.expected.get(year).copied().unwrap_or(0.0));
            let sigma = Self::sigma(self.cvs[year]);
            *obs = expected * (sigma * standard_normal(rng) - 0.5 * sigma * sigma).exp();
        }
    }

    pub fn observed(&self) -> &BTreeMap<u32, f64> {
        &self.observed
    }

    pub fn expected(&self) -> &BTreeMap<u32, f64> {
        &self.expected
    }

    pub fn addressable(&mut self, name: &str) -> Option<Addressable<'_>> {
        match name {
            "q" => Some(Addressable::Single(&mut self.q)),
            _ => None,
        }
    }

    pub fn fill_report_cache(&self, cache: &mut String) {
        let _ = writeln!(cache, "time_step: {}", self.time_step_label);
        let _ = writeln!(cache, "q: {}", self.q);
        let _ = writeln!(cache, "years: {}", join_values(self.observed.keys()));
        let _ = writeln!(cache, "observed: {}", join_values(self.observed.values()));
        let _ = writeln!(cache, "expected: {}", join_values(self.expected.values()));
        let residuals = self.observed.iter().map(|(year, obs)| {
            let expected = zero_fun(self.expected.get(year).copied().unwrap_or(0.0));
            (obs / expected).ln()
        });
        let _ = writeln!(cache, "log_residuals: {}", join_values(residuals));
        let _ = writeln!(cache, "scores: {}", join_values(self.scores.values()));
    }
}
