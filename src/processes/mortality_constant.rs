use super::{
    join_values, resolve_categories, resolve_selectivities, BuildContext, ExecutionContext,
    Process, ProcessType,
};
use crate::error::ConfigErrors;
use crate::estimates::addressable::Addressable;
use crate::model::partition::Partition;
use std::fmt::Write;

/// Instantaneous natural mortality, `N ← N·exp(−M·ratio·sel(age))`.
pub struct MortalityConstant {
    label: String,
    category_labels: Vec<String>,
    selectivity_labels: Vec<String>,
    categories: Vec<usize>,
    selectivities: Vec<usize>,
    m: Vec<f64>,
    time_step_ratio: f64,
}

impl MortalityConstant {
    pub fn new(
        label: &str,
        categories: &[String],
        m: &[f64],
        selectivities: &[String],
        time_step_ratio: f64,
        errors: &mut ConfigErrors,
    ) -> Option<Self> {
        let location = format!("process[{}]", label);
        let before = errors.len();

        if categories.is_empty() {
            errors.push(&location, "at least one category is required");
        }
        if selectivities.len() != categories.len() {
            errors.push(
                &location,
                format!(
                    "number of selectivities ({}) does not match the number of categories ({})",
                    selectivities.len(),
                    categories.len()
                ),
            );
        }
        // A single M is shared by every category.
        let m = if m.len() == 1 {
            vec![m[0]; categories.len()]
        } else {
            m.to_vec()
        };
        if m.len() != categories.len() {
            errors.push(
                &location,
                format!(
                    "number of m values ({}) does not match the number of categories ({})",
                    m.len(),
                    categories.len()
                ),
            );
        }
        if let Some(v) = m.iter().find(|v| **v < 0.0) {
            errors.push(&location, format!("m ({}) cannot be negative", v));
        }
        if time_step_ratio <= 0.0 || time_step_ratio > 1.0 {
            errors.push(
                &location,
                format!("time_step_ratio ({}) must be in (0, 1]", time_step_ratio),
            );
        }
        if errors.len() > before {
            return None;
        }

        Some(Self {
            label: label.to_string(),
            category_labels: categories.to_vec(),
            selectivity_labels: selectivities.to_vec(),
            categories: Vec::new(),
            selectivities: Vec::new(),
            m,
            time_step_ratio,
        })
    }
}

impl Process for MortalityConstant {
    fn label(&self) -> &str {
        &self.label
    }

    fn process_type(&self) -> ProcessType {
        ProcessType::MortalityConstant
    }

    fn build(&mut self, ctx: &BuildContext<'_>, errors: &mut ConfigErrors) {
        let location = self.location();
        self.categories =
            resolve_categories(&location, &self.category_labels, ctx.partition, errors);
        self.selectivities =
            resolve_selectivities(&location, &self.selectivity_labels, ctx.selectivities, errors);
    }

    fn execute(&mut self, partition: &mut Partition, ctx: &mut ExecutionContext<'_>) {
        for ((&ci, &si), &m) in self.categories.iter().zip(&self.selectivities).zip(&self.m) {
            let category = partition.category_mut(ci);
            let selectivity = &ctx.selectivities[si];
            let min_age = category.min_age;
            for (offset, n) in category.data.iter_mut().enumerate() {
                let z = m * self.time_step_ratio * selectivity.age_result(min_age + offset as u32);
                *n *= (-z).exp();
            }
        }
    }

    fn addressable(&mut self, name: &str) -> Option<Addressable<'_>> {
        match name {
            "m" => Some(Addressable::Vector(&mut self.m)),
            _ => None,
        }
    }

    fn fill_report_cache(&self, cache: &mut String) {
        let _ = writeln!(cache, "m: {}", join_values(&self.m));
        let _ = writeln!(cache, "time_step_ratio: {}", self.time_step_ratio);
    }
}
