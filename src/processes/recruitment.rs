use super::{
    join_values, resolve_categories, BuildContext, ExecutionContext, Process, ProcessType,
};
use crate::error::ConfigErrors;
use crate::estimates::addressable::Addressable;
use crate::model::partition::Partition;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Adds a constant number of recruits to the youngest age of each category.
pub struct RecruitmentConstant {
    label: String,
    category_labels: Vec<String>,
    categories: Vec<usize>,
    proportions: Vec<f64>,
    r0: f64,
    recruits: BTreeMap<u32, f64>,
}

impl RecruitmentConstant {
    pub fn new(
        label: &str,
        categories: &[String],
        proportions: &[f64],
        r0: f64,
        errors: &mut ConfigErrors,
    ) -> Option<Self> {
        let location = format!("process[{}]", label);
        let before = errors.len();

        if categories.is_empty() {
            errors.push(&location, "at least one category is required");
        }
        if proportions.len() != categories.len() {
            errors.push(
                &location,
                format!(
                    "number of proportions ({}) does not match the number of categories ({})",
                    proportions.len(),
                    categories.len()
                ),
            );
        }
        let total: f64 = proportions.iter().sum();
        if (total - 1.0).abs() > 1e-6 {
            errors.push(&location, format!("proportions sum to {} instead of 1.0", total));
        }
        if r0 < 0.0 {
            errors.push(&location, format!("r0 ({}) cannot be negative", r0));
        }
        if errors.len() > before {
            return None;
        }

        Some(Self {
            label: label.to_string(),
            category_labels: categories.to_vec(),
            categories: Vec::new(),
            proportions: proportions.to_vec(),
            r0,
            recruits: BTreeMap::new(),
        })
    }
}

impl Process for RecruitmentConstant {
    fn label(&self) -> &str {
        &self.label
    }

    fn process_type(&self) -> ProcessType {
        ProcessType::RecruitmentConstant
    }

    fn build(&mut self, ctx: &BuildContext<'_>, errors: &mut ConfigErrors) {
        let location = self.location();
        self.categories =
            resolve_categories(&location, &self.category_labels, ctx.partition, errors);
    }

    fn reset(&mut self) {
        self.recruits.clear();
    }

    fn execute(&mut self, partition: &mut Partition, ctx: &mut ExecutionContext<'_>) {
        for (&ci, &proportion) in self.categories.iter().zip(&self.proportions) {
            partition.category_mut(ci).data[0] += self.r0 * proportion;
        }
        if !ctx.initialising {
            *self.recruits.entry(ctx.year).or_insert(0.0) += self.r0;
        }
    }

    fn addressable(&mut self, name: &str) -> Option<Addressable<'_>> {
        match name {
            "r0" => Some(Addressable::Single(&mut self.r0)),
            "proportions" => Some(Addressable::Vector(&mut self.proportions)),
            _ => None,
        }
    }

    fn fill_report_cache(&self, cache: &mut String) {
        let _ = writeln!(cache, "r0: {}", self.r0);
        let _ = writeln!(cache, "years: {}", join_values(self.recruits.keys()));
        let _ = writeln!(cache, "recruits: {}", join_values(self.recruits.values()));
    }
}
