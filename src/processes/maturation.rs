use super::{BuildContext, ExecutionContext, Process, ProcessType};
use crate::error::ConfigErrors;
use crate::estimates::addressable::Addressable;
use crate::model::partition::Partition;
use std::fmt::Write;

/// Moves a share of one category into another with the same age range.
pub struct Maturation {
    label: String,
    from_label: String,
    to_label: String,
    selectivity_label: String,
    from: usize,
    to: usize,
    selectivity: usize,
    rate: f64,
}

impl Maturation {
    pub fn new(
        label: &str,
        from: &str,
        to: &str,
        rate: f64,
        selectivity: &str,
        errors: &mut ConfigErrors,
    ) -> Option<Self> {
        let location = format!("process[{}]", label);
        let before = errors.len();
        if from == to {
            errors.push(&location, "from and to must be different categories");
        }
        if !(0.0..=1.0).contains(&rate) {
            errors.push(&location, format!("rate ({}) must be between 0.0 and 1.0", rate));
        }
        if errors.len() > before {
            return None;
        }
        Some(Self {
            label: label.to_string(),
            from_label: from.to_string(),
            to_label: to.to_string(),
            selectivity_label: selectivity.to_string(),
            from: 0,
            to: 0,
            selectivity: 0,
            rate,
        })
    }
}

impl Process for Maturation {
    fn label(&self) -> &str {
        &self.label
    }

    fn process_type(&self) -> ProcessType {
        ProcessType::Maturation
    }

    fn build(&mut self, ctx: &BuildContext<'_>, errors: &mut ConfigErrors) {
        let location = self.location();
        let from = ctx.partition.index_of(&self.from_label);
        let to = ctx.partition.index_of(&self.to_label);
        match (from, to) {
            (Some(f), Some(t)) => {
                let (a, b) = (ctx.partition.category(f), ctx.partition.category(t));
                if a.min_age != b.min_age || a.max_age != b.max_age {
                    errors.push(
                        &location,
                        format!(
                            "categories {} and {} must span the same ages",
                            self.from_label, self.to_label
                        ),
                    );
                }
                self.from = f;
                self.to = t;
            }
            _ => {
                for (label, idx) in [(&self.from_label, from), (&self.to_label, to)] {
                    if idx.is_none() {
                        errors.push(&location, format!("category {} does not exist", label));
                    }
                }
            }
        }

        match ctx
            .selectivities
            .iter()
            .position(|s| s.label == self.selectivity_label)
        {
            Some(i) => self.selectivity = i,
            None => errors.push(
                &location,
                format!("selectivity {} does not exist", self.selectivity_label),
            ),
        }
    }

    fn execute(&mut self, partition: &mut Partition, ctx: &mut ExecutionContext<'_>) {
        let selectivity = &ctx.selectivities[self.selectivity];
        let (from, to) = partition.pair_mut(self.from, self.to);
        let min_age = from.min_age;
        for (offset, (src, dst)) in from.data.iter_mut().zip(to.data.iter_mut()).enumerate() {
            let moved = *src * self.rate * selectivity.age_result(min_age + offset as u32);
            *src -= moved;
            *dst += moved;
        }
    }

    fn addressable(&mut self, name: &str) -> Option<Addressable<'_>> {
        match name {
            "rate" => Some(Addressable::Single(&mut self.rate)),
            _ => None,
        }
    }

    fn fill_report_cache(&self, cache: &mut String) {
        let _ = writeln!(cache, "from: {}", self.from_label);
        let _ = writeln!(cache, "to: {}", self.to_label);
        let _ = writeln!(cache, "rate: {}", self.rate);
    }
}
