use crate::consts::{DEFAULT_SEED, DEFAULT_U_MAX};
use crate::error::SfResult;
use crate::estimates::priors::Prior;
use crate::estimates::transformations::TransformationKind;
use crate::model::{RunMode, State};
use crate::reports::WriteMode;
use crate::selectivities::SelectivityKind;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn one() -> f64 {
    1.0
}

fn default_u_max() -> f64 {
    DEFAULT_U_MAX
}

fn default_threads() -> usize {
    1
}

// ---------------------------------------------------------------------------
// Run parameters (command line)
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Model definition (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    #[arg(short, long, default_value = "basic")]
    pub mode: RunMode,

    /// Overrides `model.threads` from the model definition
    #[arg(short, long)]
    pub threads: Option<usize>,

    #[arg(short = 'S', long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Render reports that support it as space-delimited tables
    #[arg(long, default_value_t = false)]
    pub tabular: bool,

    /// Overrides `simulation.candidates`
    #[arg(long)]
    pub simulations: Option<usize>,
}

impl RunParams {
    pub fn new(config: impl Into<PathBuf>, mode: RunMode) -> Self {
        Self {
            config: config.into(),
            mode,
            threads: None,
            seed: DEFAULT_SEED,
            tabular: false,
            simulations: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Model definition (JSON)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model: ModelSettings,
    pub categories: Vec<CategoryConfig>,
    #[serde(default)]
    pub selectivities: Vec<SelectivityConfig>,
    pub processes: Vec<ProcessConfig>,
    #[serde(default)]
    pub penalties: Vec<PenaltyConfig>,
    #[serde(default)]
    pub observations: Vec<ObservationConfig>,
    #[serde(default)]
    pub estimates: Vec<EstimateConfig>,
    #[serde(default)]
    pub reports: Vec<ReportConfig>,
    #[serde(default)]
    pub minimiser: MinimiserConfig,
    #[serde(default)]
    pub mcmc: McmcConfig,
    #[serde(default)]
    pub profile: Option<ProfileConfig>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl ModelConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> SfResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> SfResult<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub start_year: u32,
    pub final_year: u32,
    pub time_steps: Vec<TimeStepConfig>,
    #[serde(default)]
    pub initialisation: Option<InitialisationConfig>,
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeStepConfig {
    pub label: String,
    pub processes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialisationConfig {
    pub years: u32,
    #[serde(default)]
    pub exclude_processes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub min_age: u32,
    pub max_age: u32,
    pub initial_abundance: Vec<f64>,
    pub mean_weight: MeanWeightConfig,
}

/// Either one row of weights by age (shared by every time step) or one row per time step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeanWeightConfig {
    ByTimeStep(Vec<Vec<f64>>),
    Constant(Vec<f64>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectivityConfig {
    pub label: String,
    #[serde(flatten)]
    pub kind: SelectivityKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    pub label: String,
    #[serde(flatten)]
    pub kind: ProcessKindConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessKindConfig {
    Ageing {
        categories: Vec<String>,
    },
    RecruitmentConstant {
        categories: Vec<String>,
        proportions: Vec<f64>,
        r0: f64,
    },
    MortalityConstant {
        categories: Vec<String>,
        m: Vec<f64>,
        selectivities: Vec<String>,
        #[serde(default = "one")]
        time_step_ratio: f64,
    },
    Maturation {
        from: String,
        to: String,
        rate: f64,
        selectivity: String,
    },
    MortalityEventBiomass {
        categories: Vec<String>,
        selectivities: Vec<String>,
        years: Vec<u32>,
        catches: Vec<f64>,
        #[serde(default = "default_u_max")]
        u_max: f64,
        #[serde(default)]
        penalty: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyConfig {
    pub label: String,
    #[serde(default = "one")]
    pub multiplier: f64,
    #[serde(default)]
    pub log_scale: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationConfig {
    pub label: String,
    #[serde(flatten)]
    pub kind: ObservationKindConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObservationKindConfig {
    Biomass {
        time_step: String,
        categories: Vec<String>,
        selectivities: Vec<String>,
        #[serde(default = "one")]
        q: f64,
        years: Vec<u32>,
        obs: Vec<f64>,
        error_values: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateConfig {
    /// Address of the parameter, e.g. `process[Recruitment].r0` or
    /// `process[Fishing].catches{2001}`.
    pub parameter: String,
    #[serde(default)]
    pub label: Option<String>,
    pub lower_bound: f64,
    pub upper_bound: f64,
    #[serde(default)]
    pub prior: Prior,
    #[serde(default)]
    pub transformation: Option<TransformationConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationConfig {
    #[serde(rename = "type")]
    pub kind: TransformationKind,
    #[serde(default)]
    pub jacobian: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub label: String,
    #[serde(flatten)]
    pub kind: ReportKindConfig,
    #[serde(default)]
    pub run_modes: Option<Vec<RunMode>>,
    #[serde(default)]
    pub model_state: Option<State>,
    #[serde(default)]
    pub time_step: Option<String>,
    #[serde(default)]
    pub years: Option<Vec<u32>>,
    #[serde(default)]
    pub file_name: Option<PathBuf>,
    #[serde(default)]
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReportKindConfig {
    StandardHeader,
    Partition,
    PartitionMeanWeight,
    Process { process: String },
    EstimateSummary,
    EstimateValue,
    ObjectiveFunction,
    Observation { observation: String },
    McmcSample,
    McmcObjective,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimiserConfig {
    /// 0 picks ten members per estimated parameter
    pub population_size: usize,
    pub max_generations: usize,
    pub crossover_probability: f64,
    pub difference_scale: f64,
    pub tolerance: f64,
}

impl Default for MinimiserConfig {
    fn default() -> Self {
        Self {
            population_size: 0,
            max_generations: 200,
            crossover_probability: 0.9,
            difference_scale: 0.7,
            tolerance: 1e-8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McmcConfig {
    pub length: usize,
    pub keep: usize,
    pub burn_in: usize,
    pub step_size: Option<f64>,
    pub max_correlation: f64,
    pub start_from_mpd: bool,
}

impl Default for McmcConfig {
    fn default() -> Self {
        Self {
            length: 2000,
            keep: 1,
            burn_in: 0,
            step_size: None,
            max_correlation: 0.8,
            start_from_mpd: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub parameter: String,
    #[serde(default = "default_profile_steps")]
    pub steps: usize,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

fn default_profile_steps() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub candidates: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { candidates: 1 }
    }
}
