pub mod partition;

use self::partition::Partition;
use crate::config::ModelConfig;
use crate::error::{ConfigErrors, SfResult};
use crate::estimates::addressable::{AddressHandle, Addressable, Shape, Target};
use crate::estimates::Estimate;
use crate::fitting::ChainLink;
use crate::objective::{ComponentKind, ObjectiveScore};
use crate::observations::Observation;
use crate::penalties::Penalty;
use crate::processes::{self, BuildContext, ExecutionContext, Process};
use crate::reports::ReportManager;
use crate::selectivities::Selectivity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::debug;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RunMode {
    Basic,
    Estimation,
    Mcmc,
    Simulation,
    Profiling,
    Projection,
    Testing,
    Query,
}

impl RunMode {
    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Modes that score many candidates and therefore may use the evaluation pool.
    pub fn is_fitting(self) -> bool {
        matches!(self, RunMode::Estimation | RunMode::Mcmc | RunMode::Profiling)
    }
}

/// Set of run modes, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RunModeSet(u16);

impl RunModeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Every mode that actually runs a model.
    pub fn all() -> Self {
        RunMode::iter().filter(|m| *m != RunMode::Query).collect()
    }

    pub fn of(modes: &[RunMode]) -> Self {
        modes.iter().copied().collect()
    }

    pub fn with(self, mode: RunMode) -> Self {
        Self(self.0 | mode.bit())
    }

    pub fn contains(self, mode: RunMode) -> bool {
        self.0 & mode.bit() == mode.bit()
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<RunMode> for RunModeSet {
    fn from_iter<I: IntoIterator<Item = RunMode>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), RunModeSet::with)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum State {
    Initialise,
    Validate,
    Build,
    Verify,
    PreExecute,
    Execute,
    PostExecute,
    IterationComplete,
    Finalise,
    Reset,
}

/// How a model is created: run mode, seed and, for the primary model only, the
/// shared report manager.
#[derive(Clone)]
pub struct ModelContext {
    pub id: usize,
    pub run_mode: RunMode,
    pub seed: u64,
    pub reports: Option<Arc<ReportManager>>,
}

impl ModelContext {
    pub fn new(run_mode: RunMode, seed: u64) -> Self {
        Self {
            id: 0,
            run_mode,
            seed,
            reports: None,
        }
    }

    pub fn with_id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    pub fn with_reports(mut self, reports: Arc<ReportManager>) -> Self {
        self.reports = Some(reports);
        self
    }
}

#[derive(Debug, Clone)]
pub struct TimeStep {
    pub label: String,
    processes: Vec<usize>,
}

struct Initialisation {
    years: u32,
    // Per time step, with excluded processes removed.
    processes: Vec<Vec<usize>>,
}

/// One population model instance: partition, ordered processes, observations and
/// estimates. Each worker owns its own instance.
pub struct Model {
    id: usize,
    run_mode: RunMode,
    state: State,
    start_year: u32,
    final_year: u32,
    years: Vec<u32>,
    time_steps: Vec<TimeStep>,
    initialisation: Option<Initialisation>,
    partition: Partition,
    processes: Vec<Box<dyn Process>>,
    selectivities: Vec<Selectivity>,
    penalties: Vec<Penalty>,
    observations: Vec<Observation>,
    estimates: Vec<Estimate>,
    objective: ObjectiveScore,
    rng: fastrand::Rng,
    reports: Option<Arc<ReportManager>>,
    current_year: u32,
    current_time_step: usize,
    iterations: u64,
    chain: Vec<ChainLink>,
}

impl Model {
    /// Initialise, validate, build and verify a model. Configuration problems found in
    /// a phase are reported together at the end of that phase.
    pub fn new(config: &ModelConfig, ctx: ModelContext) -> SfResult<Self> {
        let mut errors = ConfigErrors::new();
        let settings = &config.model;

        // Validate
        if settings.start_year > settings.final_year {
            errors.push(
                "model",
                format!(
                    "start_year ({}) is after final_year ({})",
                    settings.start_year, settings.final_year
                ),
            );
        }
        if settings.time_steps.is_empty() {
            errors.push("model", "at least one time step must be defined");
        }
        let years: Vec<u32> = (settings.start_year..=settings.final_year).collect();

        let partition =
            Partition::from_config(&config.categories, settings.time_steps.len(), &mut errors);

        let selectivities: Vec<Selectivity> = config
            .selectivities
            .iter()
            .map(|cfg| Selectivity::new(cfg, &mut errors))
            .collect();
        check_unique("selectivity", selectivities.iter().map(|s| s.label.as_str()), &mut errors);

        let penalties: Vec<Penalty> = config
            .penalties
            .iter()
            .map(|cfg| Penalty::new(cfg, &mut errors))
            .collect();
        check_unique("penalty", penalties.iter().map(|p| p.label.as_str()), &mut errors);

        let processes: Vec<Box<dyn Process>> = config
            .processes
            .iter()
            .filter_map(|cfg| processes::create(cfg, &years, &mut errors))
            .collect();
        check_unique("process", config.processes.iter().map(|p| p.label.as_str()), &mut errors);

        let observations: Vec<Observation> = config
            .observations
            .iter()
            .filter_map(|cfg| Observation::new(cfg, &years, &mut errors))
            .collect();
        check_unique("observation", observations.iter().map(|o| o.label.as_str()), &mut errors);

        let estimates: Vec<Estimate> = config
            .estimates
            .iter()
            .filter_map(|cfg| Estimate::new(cfg, &mut errors))
            .collect();
        check_unique("estimate", estimates.iter().map(|e| e.label.as_str()), &mut errors);

        errors.into_result()?;

        let mut model = Model {
            id: ctx.id,
            run_mode: ctx.run_mode,
            state: State::Validate,
            start_year: settings.start_year,
            final_year: settings.final_year,
            years,
            time_steps: Vec::new(),
            initialisation: None,
            partition,
            processes,
            selectivities,
            penalties,
            observations,
            estimates,
            objective: ObjectiveScore::default(),
            rng: fastrand::Rng::with_seed(ctx.seed.wrapping_add(ctx.id as u64)),
            reports: ctx.reports,
            current_year: settings.start_year,
            current_time_step: 0,
            iterations: 0,
            chain: Vec::new(),
        };

        model.build(config)?;
        model.verify()?;
        debug!(
            "Model {} built: {} processes, {} estimates",
            model.id,
            model.processes.len(),
            model.estimates.len()
        );
        Ok(model)
    }

    fn build(&mut self, config: &ModelConfig) -> SfResult<()> {
        self.state = State::Build;
        let mut errors = ConfigErrors::new();

        let process_index = |label: &str, errors: &mut ConfigErrors, location: &str| {
            let idx = self.processes.iter().position(|p| p.label() == label);
            if idx.is_none() {
                errors.push(location, format!("process {} does not exist", label));
            }
            idx
        };

        let mut time_steps = Vec::new();
        for ts in &config.model.time_steps {
            let location = format!("time_step[{}]", ts.label);
            let indices = ts
                .processes
                .iter()
                .filter_map(|p| process_index(p, &mut errors, &location))
                .collect();
            time_steps.push(TimeStep {
                label: ts.label.clone(),
                processes: indices,
            });
        }

        let initialisation = config.model.initialisation.as_ref().map(|init| {
            let excluded: Vec<usize> = init
                .exclude_processes
                .iter()
                .filter_map(|p| process_index(p, &mut errors, "initialisation"))
                .collect();
            Initialisation {
                years: init.years,
                processes: time_steps
                    .iter()
                    .map(|ts: &TimeStep| {
                        ts.processes
                            .iter()
                            .copied()
                            .filter(|i| !excluded.contains(i))
                            .collect()
                    })
                    .collect(),
            }
        });
        self.time_steps = time_steps;
        self.initialisation = initialisation;

        let ctx = BuildContext {
            partition: &self.partition,
            selectivities: &self.selectivities,
            penalties: &self.penalties,
            model_years: &self.years,
        };
        for process in self.processes.iter_mut() {
            process.build(&ctx, &mut errors);
        }

        let labels = self.time_step_labels();
        for observation in self.observations.iter_mut() {
            observation.build(&labels, &self.partition, &self.selectivities, &mut errors);
        }

        self.build_estimates(&mut errors);
        errors.into_result()
    }

    /// Resolves every estimate's address once so that later writes are uniform.
    fn build_estimates(&mut self, errors: &mut ConfigErrors) {
        let Model {
            estimates,
            processes,
            selectivities,
            observations,
            ..
        } = self;

        let mut seen = HashSet::new();
        for estimate in estimates.iter_mut() {
            let path = estimate.path.clone();
            let location = estimate.location();

            let target = match path.object_type.as_str() {
                "process" => processes
                    .iter()
                    .position(|p| p.label() == path.label)
                    .map(Target::Process),
                "selectivity" => selectivities
                    .iter()
                    .position(|s| s.label == path.label)
                    .map(Target::Selectivity),
                "observation" => observations
                    .iter()
                    .position(|o| o.label == path.label)
                    .map(Target::Observation),
                other => {
                    errors.push(&location, format!("object type {} cannot be estimated", other));
                    continue;
                }
            };
            let Some(target) = target else {
                errors.push(
                    &location,
                    format!("{}[{}] does not exist", path.object_type, path.label),
                );
                continue;
            };

            let Some(addressable) =
                addressable_of(processes, selectivities, observations, target, &path.name)
            else {
                errors.push(
                    &location,
                    format!("{} is not an estimable parameter", path),
                );
                continue;
            };
            // A bare name on a vector or year map sets every element.
            let shape = match (&addressable, path.shape) {
                (Addressable::Single(_), shape) => shape,
                (_, Shape::Single) => Shape::All,
                (_, shape) => shape,
            };
            if let Err(msg) = addressable.check(shape) {
                errors.push(&location, format!("{}: {}", path, msg));
                continue;
            }
            let Some(initial) = addressable.read(shape) else {
                errors.push(&location, format!("{} has no value", path));
                continue;
            };

            if !seen.insert(path.to_string()) {
                errors.push(&location, format!("{} is estimated more than once", path));
                continue;
            }

            let handle = AddressHandle {
                target,
                name: path.name.clone(),
                shape,
            };
            estimate.bind(handle, initial, errors);
        }
    }

    fn verify(&mut self) -> SfResult<()> {
        self.state = State::Verify;
        let mut errors = ConfigErrors::new();
        if self.run_mode.is_fitting() && self.estimates.is_empty() {
            errors.push(
                "model",
                format!("run mode {} requires at least one estimate", self.run_mode),
            );
        }
        if self.run_mode == RunMode::Simulation && self.observations.is_empty() {
            errors.push("model", "simulation requires at least one observation");
        }
        errors.into_result()
    }

    // ------------------------------------------------------------------
    // Iteration
    // ------------------------------------------------------------------

    fn reset(&mut self) {
        self.state = State::Reset;
        self.partition.reset();
        for process in self.processes.iter_mut() {
            process.reset();
        }
        for penalty in self.penalties.iter_mut() {
            penalty.reset();
        }
        for observation in self.observations.iter_mut() {
            observation.reset();
        }
    }

    /// Runs the processes of one time step, followed by the observations when the
    /// model is not initialising.
    fn run_time_step(&mut self, year: u32, time_step: usize, initialising: bool) {
        let Model {
            partition,
            processes,
            selectivities,
            penalties,
            observations,
            time_steps,
            initialisation,
            ..
        } = self;

        let order = match (initialising, initialisation.as_ref()) {
            (true, Some(init)) => &init.processes[time_step],
            _ => &time_steps[time_step].processes,
        };

        let mut ctx = ExecutionContext {
            year,
            time_step,
            initialising,
            selectivities,
            penalties,
        };
        for &i in order {
            processes[i].execute(partition, &mut ctx);
        }

        if !initialising {
            for observation in observations.iter_mut() {
                observation.execute(partition, year, time_step, selectivities);
            }
        }
    }

    /// Reset, run every year and time step, then compute the objective score.
    pub fn full_iteration(&mut self) {
        self.reset();

        let init_years = self.initialisation.as_ref().map_or(0, |init| init.years);
        for _ in 0..init_years {
            for ts in 0..self.time_steps.len() {
                self.run_time_step(self.start_year, ts, true);
            }
        }

        let reports = self.reports.clone();
        self.state = State::PreExecute;
        if let Some(r) = &reports {
            r.execute_state(self, State::PreExecute);
        }

        self.state = State::Execute;
        for year in self.start_year..=self.final_year {
            self.current_year = year;
            for ts in 0..self.time_steps.len() {
                self.current_time_step = ts;
                self.run_time_step(year, ts, false);
                if let Some(r) = &reports {
                    r.execute_time_step(self, year, &self.time_steps[ts].label);
                }
            }
        }

        self.state = State::PostExecute;
        if let Some(r) = &reports {
            r.execute_state(self, State::PostExecute);
        }

        self.calculate_score();
        self.iterations += 1;
    }

    fn calculate_score(&mut self) -> f64 {
        let mut objective = ObjectiveScore::default();
        for observation in self.observations.iter_mut() {
            let score = observation.calculate_score();
            objective.add(ComponentKind::Likelihood, &observation.label, score);
        }
        for estimate in &self.estimates {
            objective.add(ComponentKind::Prior, &estimate.label, estimate.prior_score());
            if estimate.transformation().is_some() {
                objective.add(ComponentKind::Jacobian, &estimate.label, estimate.jacobian());
            }
        }
        for penalty in &self.penalties {
            objective.add(ComponentKind::Penalty, &penalty.label, penalty.score());
        }
        self.objective = objective;
        self.objective.total()
    }

    /// Scores one candidate: write it into the estimates, restore to the natural scale,
    /// run a full iteration, score it, transform back.
    ///
    /// # Panics
    /// When the candidate length differs from the number of estimates.
    pub fn evaluate(&mut self, candidate: &[f64]) -> f64 {
        if candidate.len() != self.estimates.len() {
            panic!(
                "model {}: candidate has {} values but {} parameters are estimated",
                self.id,
                candidate.len(),
                self.estimates.len()
            );
        }
        for (estimate, &value) in self.estimates.iter_mut().zip(candidate) {
            estimate.set_fitting_value(value);
        }
        self.restore_estimates();
        self.full_iteration();
        let score = self.objective.total();
        self.transform_estimates();
        score
    }

    pub fn restore_estimates(&mut self) {
        let Model {
            estimates,
            processes,
            selectivities,
            observations,
            ..
        } = self;
        for estimate in estimates.iter_mut() {
            estimate.restore();
            let Some(handle) = estimate.handle() else {
                panic!("{} was never bound to a parameter", estimate.location());
            };
            let addressable =
                addressable_of(processes, selectivities, observations, handle.target, &handle.name);
            let result = match addressable {
                Some(a) => a.assign(handle.shape, estimate.value()),
                None => Err("target no longer exposes the parameter".to_string()),
            };
            if let Err(msg) = result {
                panic!("{}: {}", estimate.location(), msg);
            }
        }
    }

    pub fn transform_estimates(&mut self) {
        for estimate in self.estimates.iter_mut() {
            estimate.transform();
        }
    }

    /// Fires IterationComplete reports on the primary model.
    pub fn iteration_complete(&mut self) {
        self.state = State::IterationComplete;
        if let Some(r) = self.reports.clone() {
            r.execute_state(self, State::IterationComplete);
        }
    }

    pub fn finalise(&mut self) {
        self.state = State::Finalise;
        if let Some(r) = self.reports.clone() {
            r.execute_state(self, State::Finalise);
            r.finalise(self);
        }
    }

    /// Redraws every observation around its current expectation.
    pub fn simulate_observations(&mut self) {
        for observation in self.observations.iter_mut() {
            observation.simulate(&mut self.rng);
        }
    }

    pub fn record_chain_link(&mut self, link: ChainLink) {
        self.chain.push(link);
        self.iteration_complete();
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn years(&self) -> &[u32] {
        &self.years
    }

    pub fn current_year(&self) -> u32 {
        self.current_year
    }

    pub fn current_time_step(&self) -> usize {
        self.current_time_step
    }

    pub fn time_step_labels(&self) -> Vec<String> {
        self.time_steps.iter().map(|t| t.label.clone()).collect()
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn processes(&self) -> &[Box<dyn Process>] {
        &self.processes
    }

    pub fn process(&self, label: &str) -> Option<&dyn Process> {
        self.processes
            .iter()
            .find(|p| p.label() == label)
            .map(|p| p.as_ref())
    }

    pub fn penalties(&self) -> &[Penalty] {
        &self.penalties
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn estimates(&self) -> &[Estimate] {
        &self.estimates
    }

    pub fn objective(&self) -> &ObjectiveScore {
        &self.objective
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn chain(&self) -> &[ChainLink] {
        &self.chain
    }

    pub fn reports(&self) -> Option<&Arc<ReportManager>> {
        self.reports.as_ref()
    }

    /// Current estimate values on the fitting scale.
    pub fn fitting_values(&self) -> Vec<f64> {
        self.estimates.iter().map(Estimate::fitting_value).collect()
    }

    pub fn fitting_bounds(&self) -> (Vec<f64>, Vec<f64>) {
        self.estimates.iter().map(Estimate::fitting_bounds).unzip()
    }

    pub fn estimate_index(&self, label_or_parameter: &str) -> Option<usize> {
        self.estimates.iter().position(|e| {
            e.label == label_or_parameter || e.path.to_string() == label_or_parameter
        })
    }
}

fn addressable_of<'a>(
    processes: &'a mut [Box<dyn Process>],
    selectivities: &'a mut [Selectivity],
    observations: &'a mut [Observation],
    target: Target,
    name: &str,
) -> Option<Addressable<'a>> {
    match target {
        Target::Process(i) => processes[i].addressable(name),
        Target::Selectivity(i) => selectivities[i].addressable(name),
        Target::Observation(i) => observations[i].addressable(name),
    }
}

fn check_unique<'a>(kind: &str, labels: impl Iterator<Item = &'a str>, errors: &mut ConfigErrors) {
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label) {
            errors.push(
                format!("{}[{}]", kind, label),
                "label is defined more than once",
            );
        }
    }
}
