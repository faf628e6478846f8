pub mod ageing;
pub mod maturation;
pub mod mortality_constant;
pub mod mortality_event_biomass;
pub mod recruitment;

pub use self::ageing::Ageing;
pub use self::maturation::Maturation;
pub use self::mortality_constant::MortalityConstant;
pub use self::mortality_event_biomass::MortalityEventBiomass;
pub use self::recruitment::RecruitmentConstant;

use crate::config::{ProcessConfig, ProcessKindConfig};
use crate::error::ConfigErrors;
use crate::estimates::addressable::Addressable;
use crate::model::partition::Partition;
use crate::penalties::Penalty;
use crate::selectivities::Selectivity;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ProcessType {
    Ageing,
    RecruitmentConstant,
    MortalityConstant,
    Maturation,
    MortalityEventBiomass,
}

/// Objects a process can resolve labels against while the model is being built.
pub struct BuildContext<'a> {
    pub partition: &'a Partition,
    pub selectivities: &'a [Selectivity],
    pub penalties: &'a [Penalty],
    pub model_years: &'a [u32],
}

/// Per time-step state handed to each process as it runs.
pub struct ExecutionContext<'a> {
    pub year: u32,
    pub time_step: usize,
    /// True while the initialisation phase is running the annual cycle
    pub initialising: bool,
    pub selectivities: &'a [Selectivity],
    pub penalties: &'a mut [Penalty],
}

pub trait Process: Send {
    fn label(&self) -> &str;

    fn process_type(&self) -> ProcessType;

    fn location(&self) -> String {
        format!("process[{}]", self.label())
    }

    /// Resolves labels to indices. Missing references are configuration errors.
    fn build(&mut self, ctx: &BuildContext<'_>, errors: &mut ConfigErrors);

    /// Clears per-iteration result caches.
    fn reset(&mut self) {}

    fn execute(&mut self, partition: &mut Partition, ctx: &mut ExecutionContext<'_>);

    fn addressable(&mut self, _name: &str) -> Option<Addressable<'_>> {
        None
    }

    fn fill_report_cache(&self, _cache: &mut String) {}

    fn fill_tabular_report_cache(&self, cache: &mut String, _first_run: bool) {
        self.fill_report_cache(cache);
    }
}

/// Builds a process from its configuration, recording validation problems in `errors`.
pub fn create(
    cfg: &ProcessConfig,
    model_years: &[u32],
    errors: &mut ConfigErrors,
) -> Option<Box<dyn Process>> {
    let label = cfg.label.as_str();
    let process: Box<dyn Process> = match &cfg.kind {
        ProcessKindConfig::Ageing { categories } => Box::new(Ageing::new(label, categories, errors)?),
        ProcessKindConfig::RecruitmentConstant {
            categories,
            proportions,
            r0,
        } => Box::new(RecruitmentConstant::new(
            label,
            categories,
            proportions,
            *r0,
            errors,
        )?),
        ProcessKindConfig::MortalityConstant {
            categories,
            m,
            selectivities,
            time_step_ratio,
        } => Box::new(MortalityConstant::new(
            label,
            categories,
            m,
            selectivities,
            *time_step_ratio,
            errors,
        )?),
        ProcessKindConfig::Maturation {
            from,
            to,
            rate,
            selectivity,
        } => Box::new(Maturation::new(label, from, to, *rate, selectivity, errors)?),
        ProcessKindConfig::MortalityEventBiomass {
            categories,
            selectivities,
            years,
            catches,
            u_max,
            penalty,
        } => Box::new(MortalityEventBiomass::new(
            label,
            categories,
            selectivities,
            years,
            catches,
            *u_max,
            penalty.as_deref(),
            model_years,
            errors,
        )?),
    };
    Some(process)
}

pub(crate) fn resolve_categories(
    location: &str,
    labels: &[String],
    partition: &Partition,
    errors: &mut ConfigErrors,
) -> Vec<usize> {
    labels
        .iter()
        .filter_map(|label| {
            let idx = partition.index_of(label);
            if idx.is_none() {
                errors.push(location, format!("category {} does not exist", label));
            }
            idx
        })
        .collect()
}

pub(crate) fn resolve_selectivities(
    location: &str,
    labels: &[String],
    selectivities: &[Selectivity],
    errors: &mut ConfigErrors,
) -> Vec<usize> {
    labels
        .iter()
        .filter_map(|label| {
            let idx = selectivities.iter().position(|s| &s.label == label);
            if idx.is_none() {
                errors.push(location, format!("selectivity {} does not exist", label));
            }
            idx
        })
        .collect()
}

pub(crate) fn join_values<T: std::fmt::Display>(values: impl IntoIterator<Item = T>) -> String {
    values
        .into_iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
