use crate::config::{ModelConfig, RunParams};
use crate::error::{ConfigErrors, SfResult, StockForgeError};
use crate::fitting::{self, DifferentialEvolution, ProfileStep, RandomWalkMetropolis};
use crate::model::{Model, ModelContext, RunMode, State};
use crate::reports::kinds::{McmcObjective, McmcSample};
use crate::reports::{Report, ReportManager};
use crate::threadpool::{CandidateEvaluator, EvaluationPool};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// What a run produced, for the caller to print or inspect.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_mode: RunMode,
    pub threads: usize,
    pub score: f64,
    /// Estimate label and natural-scale value at the end of the run
    pub estimates: Vec<(String, f64)>,
    pub evaluations: usize,
    pub chain_length: usize,
    pub acceptance_rate: Option<f64>,
    pub simulations: usize,
    pub profile: Vec<ProfileStep>,
    pub elapsed_ms: u128,
}

impl RunSummary {
    fn new(run_mode: RunMode, threads: usize) -> Self {
        Self {
            run_mode,
            threads,
            score: 0.0,
            estimates: Vec::new(),
            evaluations: 0,
            chain_length: 0,
            acceptance_rate: None,
            simulations: 0,
            profile: Vec::new(),
            elapsed_ms: 0,
        }
    }
}

pub struct Runner {
    params: RunParams,
    config: ModelConfig,
    reports: Arc<ReportManager>,
}

impl Runner {
    pub fn new(params: RunParams, config: ModelConfig) -> Self {
        Self {
            params,
            config,
            reports: Arc::new(ReportManager::new()),
        }
    }

    pub fn from_params(params: RunParams) -> SfResult<Self> {
        let config = ModelConfig::load_from_file(&params.config)?;
        Ok(Self::new(params, config))
    }

    pub fn report_manager(&self) -> Arc<ReportManager> {
        Arc::clone(&self.reports)
    }

    pub fn threads(&self) -> usize {
        self.params
            .threads
            .unwrap_or(self.config.model.threads)
            .max(1)
    }

    /// Validates and builds everything, runs the selected mode, then shuts the report
    /// thread and any worker threads down. Configuration errors are returned before any
    /// iteration runs or any report is written.
    pub fn go(&mut self) -> SfResult<RunSummary> {
        let mode = self.params.mode;
        match mode {
            RunMode::Query => {
                return Err(StockForgeError::RunMode(
                    "query mode is handled by the query command".to_string(),
                ))
            }
            RunMode::Projection => {
                return Err(StockForgeError::RunMode(
                    "projection needs project definitions, which this engine does not support"
                        .to_string(),
                ))
            }
            _ => {}
        }

        let started = Instant::now();
        let threads = self.threads();
        let seed = self.params.seed;
        info!("🚀 Starting {} run ({} threads, seed {})", mode, threads, seed);

        for cfg in &self.config.reports {
            self.reports.add(Report::from_config(cfg, self.params.tabular));
        }
        self.check_run_settings(mode)?;

        let ctx = ModelContext::new(mode, seed).with_reports(Arc::clone(&self.reports));
        let mut primary = Model::new(&self.config, ctx)?;
        self.reports.validate()?;
        self.reports.build(&primary)?;

        let mut evaluator = self.build_evaluator(mode, threads, seed)?;

        let flush_thread = self.reports.spawn_flush_thread()?;
        self.reports.prepare(&primary);

        let mut summary = RunSummary::new(mode, threads);
        let outcome = self.dispatch(mode, &mut primary, evaluator.as_mut(), &mut summary);

        primary.finalise();
        self.reports.wait_for_reports_to_finish();
        self.reports.stop_thread();
        if flush_thread.join().is_err() {
            error!("❌ Report flush thread panicked");
        }
        if let Some(e) = evaluator.as_mut() {
            e.shutdown();
        }

        outcome?;
        summary.estimates = primary
            .estimates()
            .iter()
            .map(|e| (e.label.clone(), e.value()))
            .collect();
        summary.elapsed_ms = started.elapsed().as_millis();
        info!("✅ Run finished in {} ms", summary.elapsed_ms);
        Ok(summary)
    }

    fn check_run_settings(&self, mode: RunMode) -> SfResult<()> {
        let mut errors = ConfigErrors::new();
        match mode {
            RunMode::Mcmc => RandomWalkMetropolis::from(&self.config.mcmc).validate(&mut errors),
            RunMode::Profiling => match &self.config.profile {
                None => errors.push("profile", "profiling requires a profile definition"),
                Some(p) => {
                    if p.steps == 0 {
                        errors.push("profile", "steps must be greater than 0");
                    }
                    if p.lower_bound > p.upper_bound {
                        errors.push(
                            "profile",
                            format!(
                                "lower_bound ({}) is greater than upper_bound ({})",
                                p.lower_bound, p.upper_bound
                            ),
                        );
                    }
                }
            },
            _ => {}
        }
        if mode.is_fitting() && self.config.minimiser.max_generations == 0 {
            warn!("⚠️  minimiser.max_generations is 0, the starting values will be returned");
        }
        errors.into_result()
    }

    /// One model scored on this thread, or a pool of worker threads.
    fn build_evaluator(
        &self,
        mode: RunMode,
        threads: usize,
        seed: u64,
    ) -> SfResult<Option<Box<dyn CandidateEvaluator>>> {
        if !mode.is_fitting() {
            return Ok(None);
        }
        let config = &self.config;
        let models = (1..=threads)
            .into_par_iter()
            .map(|id| Model::new(config, ModelContext::new(mode, seed).with_id(id)))
            .collect::<SfResult<Vec<_>>>()?;

        if threads == 1 {
            let model = models.into_iter().next().ok_or_else(|| {
                StockForgeError::RunMode("no model available for evaluation".to_string())
            })?;
            Ok(Some(Box::new(model)))
        } else {
            Ok(Some(Box::new(EvaluationPool::new(models)?)))
        }
    }

    fn dispatch(
        &self,
        mode: RunMode,
        primary: &mut Model,
        evaluator: Option<&mut Box<dyn CandidateEvaluator>>,
        summary: &mut RunSummary,
    ) -> SfResult<()> {
        let mut rng = fastrand::Rng::with_seed(self.params.seed);

        match (mode, evaluator) {
            (RunMode::Basic | RunMode::Testing, _) => {
                let values = primary.fitting_values();
                summary.score = primary.evaluate(&values);
                summary.evaluations = 1;
                primary.iteration_complete();
            }
            (RunMode::Simulation, _) => {
                let count = self
                    .params
                    .simulations
                    .unwrap_or(self.config.simulation.candidates);
                let values = primary.fitting_values();
                for _ in 0..count {
                    summary.score = primary.evaluate(&values);
                    primary.simulate_observations();
                    primary.iteration_complete();
                }
                summary.evaluations = count;
                summary.simulations = count;
            }
            (RunMode::Estimation, Some(evaluator)) => {
                let (lower, upper) = primary.fitting_bounds();
                let start = primary.fitting_values();
                let minimiser = DifferentialEvolution::from(&self.config.minimiser);
                let result = minimiser.minimise(&start, &lower, &upper, &mut rng, |batch| {
                    evaluator.evaluate_batch(batch)
                });
                summary.evaluations = result.evaluations;
                summary.score = primary.evaluate(&result.values);
                primary.iteration_complete();
            }
            (RunMode::Mcmc, Some(evaluator)) => {
                self.add_mcmc_reports(primary)?;

                let (lower, upper) = primary.fitting_bounds();
                let mut start = primary.fitting_values();
                let mut covariance = None;
                if self.config.mcmc.start_from_mpd {
                    let minimiser = DifferentialEvolution::from(&self.config.minimiser);
                    let result = minimiser.minimise(&start, &lower, &upper, &mut rng, |batch| {
                        evaluator.evaluate_batch(batch)
                    });
                    summary.evaluations += result.evaluations;
                    start = result.values;
                    covariance = result.covariance;
                }

                let sampler = RandomWalkMetropolis::from(&self.config.mcmc);
                let result = sampler.run(
                    &start,
                    &lower,
                    &upper,
                    covariance.as_deref(),
                    &mut rng,
                    |batch| evaluator.evaluate_batch(batch),
                    |link| primary.record_chain_link(link.clone()),
                );
                summary.evaluations += result.evaluations;
                summary.chain_length = result.links.len();
                summary.acceptance_rate = Some(result.acceptance_rate);
                summary.score = result.links.last().map_or(f64::NAN, |l| l.score);
            }
            (RunMode::Profiling, Some(evaluator)) => {
                let Some(profile) = &self.config.profile else {
                    return Err(StockForgeError::RunMode(
                        "profiling requires a profile definition".to_string(),
                    ));
                };
                let index = primary.estimate_index(&profile.parameter).ok_or_else(|| {
                    StockForgeError::RunMode(format!(
                        "profile parameter {} is not an estimate",
                        profile.parameter
                    ))
                })?;
                let estimate = &primary.estimates()[index];
                let natural =
                    fitting::profile_values(profile.lower_bound, profile.upper_bound, profile.steps);
                let values: Vec<f64> = natural
                    .iter()
                    .map(|&v| estimate.to_fitting_scale(v))
                    .collect();

                let (lower, upper) = primary.fitting_bounds();
                let start = primary.fitting_values();
                let minimiser = DifferentialEvolution::from(&self.config.minimiser);
                let mut steps = fitting::profile(
                    &minimiser,
                    index,
                    &values,
                    &start,
                    &lower,
                    &upper,
                    &mut rng,
                    |batch| evaluator.evaluate_batch(batch),
                );
                for (step, value) in steps.iter_mut().zip(&natural) {
                    summary.score = primary.evaluate(&step.values);
                    primary.iteration_complete();
                    step.value = *value;
                }
                summary.evaluations = steps.len();
                summary.profile = steps;
            }
            (mode, _) => {
                return Err(StockForgeError::RunMode(format!(
                    "run mode {} cannot be dispatched",
                    mode
                )))
            }
        }
        Ok(())
    }

    /// The sampler's output reports are added while the flush loop is paused.
    fn add_mcmc_reports(&self, primary: &Model) -> SfResult<()> {
        self.reports.pause();
        if !self.reports.has_type("mcmc_sample") {
            self.reports
                .add(Report::new("mcmc_sample", Box::new(McmcSample)).with_state(State::IterationComplete));
        }
        if !self.reports.has_type("mcmc_objective") {
            self.reports.add(
                Report::new("mcmc_objective", Box::new(McmcObjective))
                    .with_state(State::IterationComplete),
            );
        }
        let built = self.reports.build(primary);
        self.reports.resume();
        built
    }
}
