use super::{resolve_categories, BuildContext, ExecutionContext, Process, ProcessType};
use crate::error::ConfigErrors;
use crate::model::partition::Partition;

/// Moves every age class up by one; the oldest class is a plus group.
pub struct Ageing {
    label: String,
    category_labels: Vec<String>,
    categories: Vec<usize>,
}

impl Ageing {
    pub fn new(label: &str, categories: &[String], errors: &mut ConfigErrors) -> Option<Self> {
        if categories.is_empty() {
            errors.push(format!("process[{}]", label), "at least one category is required");
            return None;
        }
        Some(Self {
            label: label.to_string(),
            category_labels: categories.to_vec(),
            categories: Vec::new(),
        })
    }
}

impl Process for Ageing {
    fn label(&self) -> &str {
        &self.label
    }

    fn process_type(&self) -> ProcessType {
        ProcessType::Ageing
    }

    fn build(&mut self, ctx: &BuildContext<'_>, errors: &mut ConfigErrors) {
        let location = self.location();
        self.categories =
            resolve_categories(&location, &self.category_labels, ctx.partition, errors);
    }

    fn execute(&mut self, partition: &mut Partition, _ctx: &mut ExecutionContext<'_>) {
        for &ci in &self.categories {
            let data = &mut partition.category_mut(ci).data;
            let last = data.len() - 1;
            if last == 0 {
                continue;
            }
            let plus_group = data[last] + data[last - 1];
            for i in (1..last).rev() {
                data[i] = data[i - 1];
            }
            data[0] = 0.0;
            data[last] = plus_group;
        }
    }
}
