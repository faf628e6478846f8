use super::{tabular_line, ReportBody};
use crate::consts::{LIST_END, LIST_START, REPORT_END};
use crate::error::ConfigErrors;
use crate::model::{Model, RunMode, RunModeSet, State};
use crate::processes::join_values;
use std::fmt::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Run modes that execute the model at its point estimate.
fn point_estimate_modes() -> RunModeSet {
    RunModeSet::of(&[
        RunMode::Basic,
        RunMode::Estimation,
        RunMode::Simulation,
        RunMode::Profiling,
        RunMode::Projection,
        RunMode::Testing,
    ])
}

pub struct StandardHeader {
    started: u64,
}

impl StandardHeader {
    pub fn new() -> Self {
        let started = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self { started }
    }
}

impl Default for StandardHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportBody for StandardHeader {
    fn type_name(&self) -> &'static str {
        "standard_header"
    }

    fn prepare_only(&self) -> bool {
        true
    }

    fn prepare(&mut self, model: &Model, cache: &mut String) {
        let _ = writeln!(cache, "*{}", env!("CARGO_PKG_NAME"));
        let _ = writeln!(cache, "version: {}", env!("CARGO_PKG_VERSION"));
        let call: Vec<String> = std::env::args().collect();
        let _ = writeln!(cache, "call: {}", call.join(" "));
        let _ = writeln!(cache, "run_mode: {}", model.run_mode());
        let _ = writeln!(cache, "start_time: {}", self.started);
        let _ = writeln!(cache, "{}", REPORT_END);
    }

    fn execute(&mut self, _model: &Model, _cache: &mut String) {}
}

pub struct PartitionReport;

impl ReportBody for PartitionReport {
    fn type_name(&self) -> &'static str {
        "partition"
    }

    fn default_run_modes(&self) -> RunModeSet {
        point_estimate_modes()
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        let _ = writeln!(cache, "year: {}", model.current_year());
        let labels = model.time_step_labels();
        if let Some(label) = labels.get(model.current_time_step()) {
            let _ = writeln!(cache, "time_step: {}", label);
        }
        let _ = writeln!(cache, "values {}", LIST_START);
        for category in model.partition().categories() {
            let _ = writeln!(cache, "category {}", join_values(category.ages()));
            let _ = writeln!(cache, "{} {}", category.name, join_values(&category.data));
        }
        let _ = writeln!(cache, "{}", LIST_END);
    }
}

pub struct PartitionMeanWeight;

impl ReportBody for PartitionMeanWeight {
    fn type_name(&self) -> &'static str {
        "partition_mean_weight"
    }

    fn default_run_modes(&self) -> RunModeSet {
        RunModeSet::of(&[
            RunMode::Basic,
            RunMode::Projection,
            RunMode::Simulation,
            RunMode::Estimation,
            RunMode::Profiling,
        ])
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        let time_step = model.current_time_step();
        let _ = writeln!(cache, "year: {}", model.current_year());
        for category in model.partition().categories() {
            let _ = writeln!(cache, "{} {}", category.name, LIST_START);
            let _ = writeln!(cache, "mean_weights {}", LIST_START);
            let _ = writeln!(
                cache,
                "values: {}",
                join_values(category.mean_weights_for(time_step))
            );
            let _ = writeln!(cache, "{}", LIST_END);
            let _ = writeln!(cache, "{}", LIST_END);
        }
    }
}

pub struct ProcessReport {
    process: String,
}

impl ProcessReport {
    pub fn new(process: &str) -> Self {
        Self {
            process: process.to_string(),
        }
    }
}

impl ReportBody for ProcessReport {
    fn type_name(&self) -> &'static str {
        "process"
    }

    fn default_run_modes(&self) -> RunModeSet {
        point_estimate_modes()
    }

    fn default_state(&self) -> Option<State> {
        Some(State::IterationComplete)
    }

    fn supports_tabular(&self) -> bool {
        true
    }

    fn build(&mut self, model: &Model, location: &str, errors: &mut ConfigErrors) {
        if model.process(&self.process).is_none() {
            errors.push(location, format!("process {} does not exist", self.process));
        }
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        if let Some(process) = model.process(&self.process) {
            let _ = writeln!(cache, "process: {}", process.label());
            let _ = writeln!(cache, "sub_type: {}", process.process_type());
            process.fill_report_cache(cache);
        }
    }

    fn execute_tabular(&mut self, model: &Model, cache: &mut String, first_run: bool) {
        if let Some(process) = model.process(&self.process) {
            process.fill_tabular_report_cache(cache, first_run);
        }
    }
}

pub struct EstimateSummary;

impl ReportBody for EstimateSummary {
    fn type_name(&self) -> &'static str {
        "estimate_summary"
    }

    fn default_run_modes(&self) -> RunModeSet {
        RunModeSet::of(&[RunMode::Basic, RunMode::Estimation])
    }

    fn default_state(&self) -> Option<State> {
        Some(State::Finalise)
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        for estimate in model.estimates() {
            let _ = writeln!(cache, "{} {}", estimate.path, LIST_START);
            let _ = writeln!(cache, "lower_bound: {}", estimate.lower_bound);
            let _ = writeln!(cache, "upper_bound: {}", estimate.upper_bound);
            let _ = writeln!(cache, "value: {}", estimate.value());
            let _ = writeln!(cache, "{}", LIST_END);
        }
    }
}

pub struct EstimateValue;

impl ReportBody for EstimateValue {
    fn type_name(&self) -> &'static str {
        "estimate_value"
    }

    fn default_run_modes(&self) -> RunModeSet {
        point_estimate_modes()
    }

    fn default_state(&self) -> Option<State> {
        Some(State::IterationComplete)
    }

    fn supports_tabular(&self) -> bool {
        true
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        for estimate in model.estimates() {
            let _ = writeln!(cache, "{}: {}", estimate.path, estimate.value());
        }
    }

    fn execute_tabular(&mut self, model: &Model, cache: &mut String, first_run: bool) {
        if first_run {
            cache.push_str(&tabular_line(
                model.estimates().iter().map(|e| e.path.to_string()),
            ));
        }
        cache.push_str(&tabular_line(
            model.estimates().iter().map(|e| e.value().to_string()),
        ));
    }
}

pub struct ObjectiveFunction;

impl ReportBody for ObjectiveFunction {
    fn type_name(&self) -> &'static str {
        "objective_function"
    }

    fn default_run_modes(&self) -> RunModeSet {
        point_estimate_modes()
    }

    fn default_state(&self) -> Option<State> {
        Some(State::IterationComplete)
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        let objective = model.objective();
        let _ = writeln!(cache, "values {}", LIST_START);
        for component in &objective.components {
            let _ = writeln!(
                cache,
                "{}[{}] {}",
                component.kind, component.label, component.score
            );
        }
        let _ = writeln!(cache, "{}", LIST_END);
        let _ = writeln!(cache, "total_score: {}", objective.total());
    }
}

pub struct ObservationReport {
    observation: String,
}

impl ObservationReport {
    pub fn new(observation: &str) -> Self {
        Self {
            observation: observation.to_string(),
        }
    }
}

impl ReportBody for ObservationReport {
    fn type_name(&self) -> &'static str {
        "observation"
    }

    fn default_state(&self) -> Option<State> {
        Some(State::IterationComplete)
    }

    fn default_run_modes(&self) -> RunModeSet {
        point_estimate_modes()
    }

    fn build(&mut self, model: &Model, location: &str, errors: &mut ConfigErrors) {
        if !model
            .observations()
            .iter()
            .any(|o| o.label == self.observation)
        {
            errors.push(location, format!("observation {} does not exist", self.observation));
        }
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        if let Some(obs) = model
            .observations()
            .iter()
            .find(|o| o.label == self.observation)
        {
            let _ = writeln!(cache, "observation: {}", obs.label);
            obs.fill_report_cache(cache);
        }
    }
}

/// Kept chain links, one row per link.
pub struct McmcSample;

impl ReportBody for McmcSample {
    fn type_name(&self) -> &'static str {
        "mcmc_sample"
    }

    fn default_run_modes(&self) -> RunModeSet {
        RunModeSet::of(&[RunMode::Mcmc])
    }

    fn default_state(&self) -> Option<State> {
        Some(State::IterationComplete)
    }

    fn always_tabular(&self) -> bool {
        true
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        self.execute_tabular(model, cache, false);
    }

    fn execute_tabular(&mut self, model: &Model, cache: &mut String, first_run: bool) {
        if first_run {
            cache.push_str(&tabular_line(
                model.estimates().iter().map(|e| e.path.to_string()),
            ));
        }
        if let Some(link) = model.chain().last() {
            cache.push_str(&tabular_line(link.values.iter().map(|v| v.to_string())));
        }
    }
}

pub struct McmcObjective;

impl ReportBody for McmcObjective {
    fn type_name(&self) -> &'static str {
        "mcmc_objective"
    }

    fn default_run_modes(&self) -> RunModeSet {
        RunModeSet::of(&[RunMode::Mcmc])
    }

    fn default_state(&self) -> Option<State> {
        Some(State::IterationComplete)
    }

    fn always_tabular(&self) -> bool {
        true
    }

    fn execute(&mut self, model: &Model, cache: &mut String) {
        self.execute_tabular(model, cache, false);
    }

    fn execute_tabular(&mut self, model: &Model, cache: &mut String, first_run: bool) {
        if first_run {
            cache.push_str(&tabular_line([
                "sample",
                "objective_score",
                "acceptance_rate",
                "step_size",
            ]));
        }
        if let Some(link) = model.chain().last() {
            cache.push_str(&tabular_line([
                link.iteration.to_string(),
                link.score.to_string(),
                link.acceptance_rate.to_string(),
                link.step_size.to_string(),
            ]));
        }
    }
}
