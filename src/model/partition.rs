use crate::config::{CategoryConfig, MeanWeightConfig};
use crate::error::ConfigErrors;
use std::collections::HashMap;

/// One category of the partition: abundance by age plus the mean weight table used to
/// turn numbers into biomass.
#[derive(Debug, Clone)]
pub struct Category {
    pub name: String,
    pub min_age: u32,
    pub max_age: u32,
    pub data: Vec<f64>,
    initial: Vec<f64>,
    // [time_step][age - min_age]
    mean_weights: Vec<Vec<f64>>,
}

impl Category {
    pub fn age_count(&self) -> usize {
        (self.max_age - self.min_age + 1) as usize
    }

    pub fn ages(&self) -> impl Iterator<Item = u32> {
        self.min_age..=self.max_age
    }

    #[inline]
    pub fn mean_weight(&self, time_step: usize, age: u32) -> f64 {
        self.mean_weights[time_step][(age - self.min_age) as usize]
    }

    pub fn mean_weights_for(&self, time_step: usize) -> &[f64] {
        &self.mean_weights[time_step]
    }

    pub fn initial(&self) -> &[f64] {
        &self.initial
    }

    pub fn abundance(&self) -> f64 {
        self.data.iter().sum()
    }

    pub fn biomass(&self, time_step: usize) -> f64 {
        self.data
            .iter()
            .zip(&self.mean_weights[time_step])
            .map(|(n, w)| n * w)
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Partition {
    categories: Vec<Category>,
    lookup: HashMap<String, usize>,
}

impl Partition {
    pub fn from_config(
        configs: &[CategoryConfig],
        time_step_count: usize,
        errors: &mut ConfigErrors,
    ) -> Self {
        let mut partition = Partition::default();

        if configs.is_empty() {
            errors.push("categories", "at least one category must be defined");
        }

        for cfg in configs {
            let location = format!("category[{}]", cfg.name);

            if partition.lookup.contains_key(&cfg.name) {
                errors.push(&location, "category name is defined more than once");
                continue;
            }
            if cfg.min_age > cfg.max_age {
                errors.push(
                    &location,
                    format!("min_age ({}) is greater than max_age ({})", cfg.min_age, cfg.max_age),
                );
                continue;
            }

            let age_count = (cfg.max_age - cfg.min_age + 1) as usize;
            if cfg.initial_abundance.len() != age_count {
                errors.push(
                    &location,
                    format!(
                        "initial_abundance has {} values but the category spans {} ages",
                        cfg.initial_abundance.len(),
                        age_count
                    ),
                );
                continue;
            }
            if let Some(n) = cfg.initial_abundance.iter().find(|n| **n < 0.0) {
                errors.push(&location, format!("initial_abundance ({}) cannot be negative", n));
            }

            let mean_weights = match &cfg.mean_weight {
                MeanWeightConfig::Constant(row) => vec![row.clone(); time_step_count],
                MeanWeightConfig::ByTimeStep(rows) => {
                    if rows.len() != time_step_count {
                        errors.push(
                            &location,
                            format!(
                                "mean_weight has {} rows but the model has {} time steps",
                                rows.len(),
                                time_step_count
                            ),
                        );
                        continue;
                    }
                    rows.clone()
                }
            };
            if mean_weights.iter().any(|row| row.len() != age_count) {
                errors.push(
                    &location,
                    format!("every mean_weight row must have {} values", age_count),
                );
                continue;
            }

            partition
                .lookup
                .insert(cfg.name.clone(), partition.categories.len());
            partition.categories.push(Category {
                name: cfg.name.clone(),
                min_age: cfg.min_age,
                max_age: cfg.max_age,
                data: cfg.initial_abundance.clone(),
                initial: cfg.initial_abundance.clone(),
                mean_weights,
            });
        }

        partition
    }

    /// Restores every category to its initial abundance.
    pub fn reset(&mut self) {
        for category in &mut self.categories {
            category.data.copy_from_slice(&category.initial);
        }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn category(&self, index: usize) -> &Category {
        &self.categories[index]
    }

    pub fn category_mut(&mut self, index: usize) -> &mut Category {
        &mut self.categories[index]
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.index_of(name).map(|i| &self.categories[i])
    }

    /// Mutable access to two distinct categories at once.
    pub fn pair_mut(&mut self, a: usize, b: usize) -> (&mut Category, &mut Category) {
        assert_ne!(a, b, "pair_mut requires two distinct categories");
        if a < b {
            let (left, right) = self.categories.split_at_mut(b);
            (&mut left[a], &mut right[0])
        } else {
            let (left, right) = self.categories.split_at_mut(a);
            (&mut right[0], &mut left[b])
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn total_abundance(&self) -> f64 {
        self.categories.iter().map(Category::abundance).sum()
    }
}
