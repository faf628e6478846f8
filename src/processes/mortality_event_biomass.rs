use super::{
    join_values, resolve_categories, resolve_selectivities, BuildContext, ExecutionContext,
    Process, ProcessType,
};
use crate::error::ConfigErrors;
use crate::estimates::addressable::Addressable;
use crate::math::zero_fun;
use crate::model::partition::Partition;
use crate::reports::tabular_line;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write;

/// Removes a biomass catch from the vulnerable part of the partition, limiting the
/// exploitation rate to `u_max`.
pub struct MortalityEventBiomass {
    label: String,
    category_labels: Vec<String>,
    selectivity_labels: Vec<String>,
    categories: Vec<usize>,
    selectivities: Vec<usize>,
    catches: BTreeMap<u32, f64>,
    u_max: f64,
    penalty_label: Option<String>,
    penalty: Option<usize>,
    actual_catches: BTreeMap<u32, f64>,
    exploitation_by_year: BTreeMap<u32, f64>,
}

impl MortalityEventBiomass {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        label: &str,
        categories: &[String],
        selectivities: &[String],
        years: &[u32],
        catches: &[f64],
        u_max: f64,
        penalty: Option<&str>,
        model_years: &[u32],
        errors: &mut ConfigErrors,
    ) -> Option<Self> {
        let location = format!("process[{}]", label);
        let before = errors.len();

        if categories.is_empty() {
            errors.push(&location, "at least one category is required");
        }
        if categories.len() != selectivities.len() {
            errors.push(
                &location,
                format!(
                    "number of selectivities provided ({}) does not match the number of categories provided ({})",
                    selectivities.len(),
                    categories.len()
                ),
            );
        }
        if years.len() != catches.len() {
            errors.push(
                &location,
                format!(
                    "number of catches provided ({}) does not match the number of years provided ({})",
                    catches.len(),
                    years.len()
                ),
            );
        }
        if u_max <= 0.0 || u_max >= 1.0 {
            errors.push(
                &location,
                format!("u_max ({}) must be greater than 0.0 and less than 1.0", u_max),
            );
        }

        let mut seen = HashSet::new();
        for year in years {
            if !seen.insert(*year) {
                errors.push(&location, format!("year {} has been specified more than once", year));
            }
            if !model_years.contains(year) {
                errors.push(
                    &location,
                    format!("year {} is outside the model years", year),
                );
            }
        }
        if let Some(c) = catches.iter().find(|c| **c < 0.0) {
            errors.push(&location, format!("catch ({}) cannot be negative", c));
        }

        if errors.len() > before {
            return None;
        }

        let mut catch_by_year: BTreeMap<u32, f64> =
            years.iter().copied().zip(catches.iter().copied()).collect();
        for year in model_years {
            catch_by_year.entry(*year).or_insert(0.0);
        }

        Some(Self {
            label: label.to_string(),
            category_labels: categories.to_vec(),
            selectivity_labels: selectivities.to_vec(),
            categories: Vec::new(),
            selectivities: Vec::new(),
            catches: catch_by_year,
            u_max,
            penalty_label: penalty.map(str::to_string),
            penalty: None,
            actual_catches: BTreeMap::new(),
            exploitation_by_year: BTreeMap::new(),
        })
    }

    pub fn actual_catches(&self) -> &BTreeMap<u32, f64> {
        &self.actual_catches
    }

    pub fn exploitation_by_year(&self) -> &BTreeMap<u32, f64> {
        &self.exploitation_by_year
    }

    pub fn u_max(&self) -> f64 {
        self.u_max
    }
}

impl Process for MortalityEventBiomass {
    fn label(&self) -> &str {
        &self.label
    }

    fn process_type(&self) -> ProcessType {
        ProcessType::MortalityEventBiomass
    }

    fn build(&mut self, ctx: &BuildContext<'_>, errors: &mut ConfigErrors) {
        let location = self.location();
        self.categories =
            resolve_categories(&location, &self.category_labels, ctx.partition, errors);
        self.selectivities =
            resolve_selectivities(&location, &self.selectivity_labels, ctx.selectivities, errors);

        if let Some(name) = &self.penalty_label {
            self.penalty = ctx.penalties.iter().position(|p| &p.label == name);
            if self.penalty.is_none() {
                errors.push(&location, format!("penalty {} does not exist", name));
            }
        }
    }

    fn reset(&mut self) {
        self.exploitation_by_year.clear();
        self.actual_catches.clear();
    }

    fn execute(&mut self, partition: &mut Partition, ctx: &mut ExecutionContext<'_>) {
        if ctx.initialising {
            return;
        }
        let catch = self.catches.get(&ctx.year).copied().unwrap_or(0.0);
        if catch == 0.0 {
            return;
        }

        let mut vulnerable = 0.0;
        for (&ci, &si) in self.categories.iter().zip(&self.selectivities) {
            let category = partition.category(ci);
            let selectivity = &ctx.selectivities[si];
            for (age, n) in category.ages().zip(&category.data) {
                vulnerable +=
                    n * selectivity.age_result(age) * category.mean_weight(ctx.time_step, age);
            }
        }

        let mut exploitation = catch / zero_fun(vulnerable);
        if exploitation > self.u_max {
            exploitation = self.u_max;
            let achieved = vulnerable * self.u_max;
            self.actual_catches.insert(ctx.year, achieved);
            if let Some(p) = self.penalty {
                ctx.penalties[p].trigger(&self.label, catch, achieved);
            }
        } else {
            self.actual_catches.insert(ctx.year, catch);
        }

        if exploitation < 0.0 {
            panic!(
                "process[{}]: exploitation rate ({}) in year {} is negative",
                self.label, exploitation, ctx.year
            );
        }
        self.exploitation_by_year.insert(ctx.year, exploitation);

        for (&ci, &si) in self.categories.iter().zip(&self.selectivities) {
            let category = partition.category_mut(ci);
            let selectivity = &ctx.selectivities[si];
            let min_age = category.min_age;
            for (offset, n) in category.data.iter_mut().enumerate() {
                *n -= *n * selectivity.age_result(min_age + offset as u32) * exploitation;
            }
        }
    }

    fn addressable(&mut self, name: &str) -> Option<Addressable<'_>> {
        match name {
            "catches" => Some(Addressable::YearMap(&mut self.catches)),
            "u_max" => Some(Addressable::Single(&mut self.u_max)),
            _ => None,
        }
    }

    fn fill_report_cache(&self, cache: &mut String) {
        let _ = writeln!(cache, "years: {}", join_values(self.actual_catches.keys()));
        let _ = writeln!(
            cache,
            "actual_catches: {}",
            join_values(self.actual_catches.values())
        );
        let _ = writeln!(
            cache,
            "exploitation_rate: {}",
            join_values(self.exploitation_by_year.values())
        );
    }

    fn fill_tabular_report_cache(&self, cache: &mut String, first_run: bool) {
        if first_run {
            let header = self
                .actual_catches
                .keys()
                .map(|y| format!("actual_catches[{}][{}]", self.label, y))
                .chain(
                    self.exploitation_by_year
                        .keys()
                        .map(|y| format!("exploitation[{}][{}]", self.label, y)),
                );
            cache.push_str(&tabular_line(header));
        }
        let values = self
            .actual_catches
            .values()
            .chain(self.exploitation_by_year.values())
            .map(|v| v.to_string());
        cache.push_str(&tabular_line(values));
    }
}
