pub mod kinds;
pub mod manager;

pub use self::manager::ReportManager;

use crate::config::{ReportConfig, ReportKindConfig};
use crate::consts::{REPORT_END, TABULAR_DATA};
use crate::error::ConfigErrors;
use crate::model::{Model, RunMode, RunModeSet, State};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use strum_macros::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WriteMode {
    /// Truncate on the first write of the run, append afterwards
    #[default]
    Overwrite,
    Append,
    /// Write to the first `file_name.N` that does not exist yet
    IncrementalSuffix,
}

/// In-memory report destination, shareable with whoever reads it.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<String>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn append(&self, text: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }
}

#[derive(Debug)]
pub enum ReportTarget {
    Stdout,
    File {
        path: PathBuf,
        mode: WriteMode,
        resolved: Option<PathBuf>,
    },
    Buffer(SharedBuffer),
}

impl ReportTarget {
    pub fn file(path: impl Into<PathBuf>, mode: WriteMode) -> Self {
        ReportTarget::File {
            path: path.into(),
            mode,
            resolved: None,
        }
    }

    fn write(&mut self, text: &str) -> io::Result<()> {
        match self {
            ReportTarget::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes())?;
                out.flush()
            }
            ReportTarget::Buffer(buffer) => {
                buffer.append(text);
                Ok(())
            }
            ReportTarget::File {
                path,
                mode,
                resolved,
            } => {
                let mut file = match resolved {
                    Some(existing) => OpenOptions::new().append(true).open(existing)?,
                    None => {
                        let (target, file) = open_first(path, *mode)?;
                        *resolved = Some(target);
                        file
                    }
                };
                file.write_all(text.as_bytes())?;
                file.flush()
            }
        }
    }

    fn resolved_path(&self) -> Option<&Path> {
        match self {
            ReportTarget::File { resolved, .. } => resolved.as_deref(),
            _ => None,
        }
    }
}

fn open_first(path: &Path, mode: WriteMode) -> io::Result<(PathBuf, File)> {
    match mode {
        WriteMode::Overwrite => Ok((path.to_path_buf(), File::create(path)?)),
        WriteMode::Append => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok((path.to_path_buf(), file))
        }
        WriteMode::IncrementalSuffix => {
            let mut suffix = 1u32;
            loop {
                let mut name = path.as_os_str().to_owned();
                name.push(format!(".{}", suffix));
                let candidate = PathBuf::from(name);
                match OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&candidate)
                {
                    Ok(file) => return Ok((candidate, file)),
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

/// One space-delimited row terminated by a newline.
pub fn tabular_line<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b' ')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    if writer.write_record(fields).is_err() {
        return String::new();
    }
    match writer.into_inner() {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}

/// Content of a report kind. The surrounding `Report` handles headers, triggering and
/// output; a body only renders.
pub trait ReportBody: Send {
    fn type_name(&self) -> &'static str;

    fn default_run_modes(&self) -> RunModeSet {
        RunModeSet::all()
    }

    fn default_state(&self) -> Option<State> {
        None
    }

    /// Renders during `prepare` only and is never triggered by states or time steps.
    fn prepare_only(&self) -> bool {
        false
    }

    /// Always rendered as a table, regardless of the run's tabular setting.
    fn always_tabular(&self) -> bool {
        false
    }

    fn supports_tabular(&self) -> bool {
        false
    }

    fn build(&mut self, _model: &Model, _location: &str, _errors: &mut ConfigErrors) {}

    fn prepare(&mut self, _model: &Model, _cache: &mut String) {}

    fn execute(&mut self, model: &Model, cache: &mut String);

    fn execute_tabular(&mut self, model: &Model, cache: &mut String, _first_run: bool) {
        self.execute(model, cache);
    }
}

pub struct Report {
    label: String,
    body: Box<dyn ReportBody>,
    run_modes: RunModeSet,
    model_state: Option<State>,
    time_step: Option<String>,
    years: Vec<u32>,
    target: Arc<Mutex<ReportTarget>>,
    tabular: bool,
    cache: String,
    ready_for_writing: bool,
    first_run: bool,
    built: bool,
}

impl Report {
    pub fn new(label: impl Into<String>, body: Box<dyn ReportBody>) -> Self {
        let run_modes = body.default_run_modes();
        let model_state = body.default_state();
        Self {
            label: label.into(),
            body,
            run_modes,
            model_state,
            time_step: None,
            years: Vec::new(),
            target: Arc::new(Mutex::new(ReportTarget::Stdout)),
            tabular: false,
            cache: String::new(),
            ready_for_writing: false,
            first_run: true,
            built: false,
        }
    }

    pub fn from_config(cfg: &ReportConfig, tabular: bool) -> Self {
        let body: Box<dyn ReportBody> = match &cfg.kind {
            ReportKindConfig::StandardHeader => Box::new(kinds::StandardHeader::new()),
            ReportKindConfig::Partition => Box::new(kinds::PartitionReport),
            ReportKindConfig::PartitionMeanWeight => Box::new(kinds::PartitionMeanWeight),
            ReportKindConfig::Process { process } => Box::new(kinds::ProcessReport::new(process)),
            ReportKindConfig::EstimateSummary => Box::new(kinds::EstimateSummary),
            ReportKindConfig::EstimateValue => Box::new(kinds::EstimateValue),
            ReportKindConfig::ObjectiveFunction => Box::new(kinds::ObjectiveFunction),
            ReportKindConfig::Observation { observation } => {
                Box::new(kinds::ObservationReport::new(observation))
            }
            ReportKindConfig::McmcSample => Box::new(kinds::McmcSample),
            ReportKindConfig::McmcObjective => Box::new(kinds::McmcObjective),
        };

        let mut report = Report::new(cfg.label.clone(), body);
        if let Some(modes) = &cfg.run_modes {
            report.run_modes = RunModeSet::of(modes);
        }
        if cfg.model_state.is_some() || cfg.time_step.is_some() {
            report.model_state = cfg.model_state;
        }
        report.time_step = cfg.time_step.clone();
        report.years = cfg.years.clone().unwrap_or_default();
        if let Some(path) = &cfg.file_name {
            report.target = Arc::new(Mutex::new(ReportTarget::file(path, cfg.write_mode)));
        }
        report.tabular = tabular;
        report
    }

    pub fn with_run_modes(mut self, modes: RunModeSet) -> Self {
        self.run_modes = modes;
        self
    }

    pub fn with_state(mut self, state: State) -> Self {
        self.model_state = Some(state);
        self.time_step = None;
        self
    }

    pub fn with_time_step(mut self, label: impl Into<String>, years: Vec<u32>) -> Self {
        self.model_state = None;
        self.time_step = Some(label.into());
        self.years = years;
        self
    }

    pub fn with_target(mut self, target: ReportTarget) -> Self {
        self.target = Arc::new(Mutex::new(target));
        self
    }

    pub fn with_tabular(mut self, tabular: bool) -> Self {
        self.tabular = tabular;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn type_name(&self) -> &'static str {
        self.body.type_name()
    }

    pub fn location(&self) -> String {
        format!("report[{}]", self.label)
    }

    pub fn model_state(&self) -> Option<State> {
        self.model_state
    }

    pub fn time_step(&self) -> Option<&str> {
        self.time_step.as_deref()
    }

    /// Where a file target ended up writing, once it has written.
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .resolved_path()
            .map(Path::to_path_buf)
    }

    pub fn is_ready(&self) -> bool {
        self.ready_for_writing
    }

    pub fn applies_to(&self, mode: RunMode) -> bool {
        self.run_modes.contains(mode)
    }

    pub fn has_year(&self, year: u32) -> bool {
        self.years.is_empty() || self.years.contains(&year)
    }

    fn is_tabular(&self) -> bool {
        self.body.always_tabular() || (self.tabular && self.body.supports_tabular())
    }

    pub fn validate(&self, errors: &mut ConfigErrors) {
        let location = self.location();
        if self.run_modes.is_empty() {
            errors.push(&location, "run_modes cannot be empty");
        }
        if self.body.prepare_only() {
            return;
        }
        match (&self.model_state, &self.time_step) {
            (Some(_), Some(_)) => {
                errors.push(&location, "specify either model_state or time_step, not both")
            }
            (None, None) => errors.push(&location, "model_state or time_step must be specified"),
            _ => {}
        }
        if !self.years.is_empty() && self.time_step.is_none() {
            errors.push(&location, "years can only be used with time_step");
        }
    }

    pub fn build(&mut self, model: &Model, errors: &mut ConfigErrors) {
        if self.built {
            return;
        }
        let location = self.location();
        if let Some(ts) = &self.time_step {
            if !model.time_step_labels().iter().any(|l| l == ts) {
                errors.push(&location, format!("time step {} does not exist", ts));
            }
        }
        if let Some(year) = self.years.iter().find(|y| !model.years().contains(y)) {
            errors.push(&location, format!("year {} is outside the model years", year));
        }
        self.body.build(model, &location, errors);
        self.built = true;
    }

    fn header(&mut self) {
        self.cache
            .push_str(&format!("*{}[{}]\n", self.body.type_name(), self.label));
    }

    pub fn prepare(&mut self, model: &Model) {
        self.body.prepare(model, &mut self.cache);
        if !self.cache.is_empty() {
            self.ready_for_writing = true;
        }
    }

    pub fn execute(&mut self, model: &Model) {
        if self.body.prepare_only() {
            return;
        }
        if self.is_tabular() {
            if self.first_run {
                self.header();
                self.cache.push_str(&format!("values {}\n", TABULAR_DATA));
            }
            self.body
                .execute_tabular(model, &mut self.cache, self.first_run);
            self.first_run = false;
        } else {
            self.header();
            self.body.execute(model, &mut self.cache);
            self.cache.push_str(REPORT_END);
            self.cache.push('\n');
        }
        self.ready_for_writing = true;
    }

    pub fn finalise(&mut self, _model: &Model) {
        if self.is_tabular() && !self.first_run {
            self.cache.push_str(REPORT_END);
            self.cache.push('\n');
            self.ready_for_writing = true;
        }
    }

    /// Moves the rendered cache out and clears the ready flag. The returned write
    /// holds no borrow of the report, so it can run after the collection is unlocked.
    pub(crate) fn take_ready(&mut self) -> Option<PendingWrite> {
        if !self.ready_for_writing {
            return None;
        }
        self.ready_for_writing = false;
        Some(PendingWrite {
            location: self.location(),
            text: std::mem::take(&mut self.cache),
            target: Arc::clone(&self.target),
        })
    }

    /// Writes the cache out and clears it. The cache is dropped even when the write
    /// fails.
    pub fn flush(&mut self) -> io::Result<()> {
        match self.take_ready() {
            Some(pending) => pending.write(),
            None => Ok(()),
        }
    }
}

/// Rendered output waiting to be written to its report's target.
pub(crate) struct PendingWrite {
    location: String,
    text: String,
    target: Arc<Mutex<ReportTarget>>,
}

impl PendingWrite {
    pub(crate) fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn write(self) -> io::Result<()> {
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(&self.text)
    }
}
