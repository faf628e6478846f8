//! Owns every report and writes their output from a background thread.
//!
//! Reports are rendered on the model's thread into per-report caches and marked ready.
//! The flush loop takes the ready caches out under the collection lock and writes them
//! after releasing it, so the simulation never waits on report I/O. The collection may only be changed while the
//! loop is not running or is paused.

use super::Report;
use crate::error::{ConfigErrors, SfResult};
use crate::model::{Model, State};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

#[derive(Default)]
struct ReportCollection {
    objects: Vec<Report>,
    by_state: HashMap<State, Vec<usize>>,
    by_time_step: HashMap<String, Vec<usize>>,
}

impl ReportCollection {
    fn insert(&mut self, report: Report) {
        let index = self.objects.len();
        if let Some(state) = report.model_state() {
            self.by_state.entry(state).or_default().push(index);
        }
        if let Some(label) = report.time_step() {
            self.by_time_step
                .entry(label.to_string())
                .or_default()
                .push(index);
        }
        self.objects.push(report);
    }
}

#[derive(Default)]
struct FlushControl {
    running: bool,
    pause_requested: bool,
    paused: bool,
    stop_requested: bool,
    /// Some report became ready since the last pass
    pending: bool,
    /// A caller is waiting for one complete pass
    waiting: bool,
    stats: FlushStats,
}

/// Counters kept by the flush loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub passes: u64,
    pub reports_written: u64,
    pub write_errors: u64,
}

#[derive(Default)]
pub struct ReportManager {
    collection: Mutex<ReportCollection>,
    control: Mutex<FlushControl>,
    signal: Condvar,
}

impl ReportManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_collection(&self) -> MutexGuard<'_, ReportCollection> {
        self.collection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_control(&self) -> MutexGuard<'_, FlushControl> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, FlushControl>) -> MutexGuard<'a, FlushControl> {
        self.signal
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// # Panics
    /// When called while the flush loop is running and not paused.
    fn assert_mutable(&self, action: &str) {
        let ctl = self.lock_control();
        if ctl.running && !ctl.paused {
            panic!(
                "report collection {} while the flush loop is active; pause() first",
                action
            );
        }
    }

    /// Adds a report. Only allowed before the flush loop starts or while it is paused.
    pub fn add(&self, report: Report) {
        self.assert_mutable("modified");
        self.lock_collection().insert(report);
    }

    pub fn len(&self) -> usize {
        self.lock_collection().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_type(&self, type_name: &str) -> bool {
        self.lock_collection()
            .objects
            .iter()
            .any(|r| r.type_name() == type_name)
    }

    pub fn validate(&self) -> SfResult<()> {
        let mut errors = ConfigErrors::new();
        let collection = self.lock_collection();
        let mut labels = HashSet::new();
        for report in &collection.objects {
            if !labels.insert(report.label()) {
                errors.push(report.location(), "label is defined more than once");
            }
            report.validate(&mut errors);
        }
        errors.into_result()
    }

    /// Builds every report not built yet against `model`.
    pub fn build(&self, model: &Model) -> SfResult<()> {
        self.assert_mutable("built");
        let mut errors = ConfigErrors::new();
        for report in self.lock_collection().objects.iter_mut() {
            report.build(model, &mut errors);
        }
        errors.into_result()
    }

    fn notify_pending(&self) {
        let mut ctl = self.lock_control();
        ctl.pending = true;
        self.signal.notify_all();
    }

    pub fn prepare(&self, model: &Model) {
        let mode = model.run_mode();
        {
            let mut collection = self.lock_collection();
            for report in collection.objects.iter_mut().filter(|r| r.applies_to(mode)) {
                report.prepare(model);
            }
        }
        self.notify_pending();
    }

    /// Renders the reports registered for `state`.
    pub fn execute_state(&self, model: &Model, state: State) {
        let mode = model.run_mode();
        let mut fired = false;
        {
            let mut collection = self.lock_collection();
            let ReportCollection {
                objects, by_state, ..
            } = &mut *collection;
            if let Some(indices) = by_state.get(&state) {
                for &i in indices {
                    let report = &mut objects[i];
                    if report.applies_to(mode) {
                        report.execute(model);
                        fired = true;
                    }
                }
            }
        }
        if fired {
            self.notify_pending();
        }
    }

    /// Renders the reports registered for the time step `label` in `year`.
    pub fn execute_time_step(&self, model: &Model, year: u32, label: &str) {
        let mode = model.run_mode();
        let mut fired = false;
        {
            let mut collection = self.lock_collection();
            let ReportCollection {
                objects,
                by_time_step,
                ..
            } = &mut *collection;
            if let Some(indices) = by_time_step.get(label) {
                for &i in indices {
                    let report = &mut objects[i];
                    if report.applies_to(mode) && report.has_year(year) {
                        report.execute(model);
                        fired = true;
                    }
                }
            }
        }
        if fired {
            self.notify_pending();
        }
    }

    pub fn finalise(&self, model: &Model) {
        let mode = model.run_mode();
        {
            let mut collection = self.lock_collection();
            for report in collection.objects.iter_mut().filter(|r| r.applies_to(mode)) {
                report.finalise(model);
            }
        }
        self.notify_pending();
    }

    /// Takes every ready cache under the collection lock, then writes with the lock
    /// released so rendering never waits on a target.
    fn flush_ready(&self) -> (u64, u64) {
        let pending: Vec<_> = self
            .lock_collection()
            .objects
            .iter_mut()
            .filter_map(Report::take_ready)
            .collect();

        let mut written = 0;
        let mut failed = 0;
        for write in pending {
            let location = write.location().to_string();
            match write.write() {
                Ok(()) => written += 1,
                Err(e) => {
                    failed += 1;
                    error!("❌ Failed to write {}: {}", location, e);
                }
            }
        }
        (written, failed)
    }

    /// The flush loop. Runs on the calling thread until `stop_thread` is called.
    pub fn flush_reports(&self) {
        let mut ctl = self.lock_control();
        ctl.running = true;
        self.signal.notify_all();
        debug!("Report flush loop started");

        loop {
            while !(ctl.pause_requested || ctl.stop_requested || ctl.pending || ctl.waiting) {
                ctl = self.wait(ctl);
            }

            if ctl.pause_requested {
                ctl.paused = true;
                self.signal.notify_all();
                while ctl.pause_requested {
                    ctl = self.wait(ctl);
                }
                ctl.paused = false;
                // Anything added or rendered while paused gets a pass.
                ctl.pending = true;
                continue;
            }

            let record_waiting = ctl.waiting;
            let do_break = ctl.stop_requested;
            ctl.pending = false;
            drop(ctl);

            let (written, failed) = self.flush_ready();

            ctl = self.lock_control();
            ctl.stats.passes += 1;
            ctl.stats.reports_written += written;
            ctl.stats.write_errors += failed;
            if record_waiting {
                ctl.waiting = false;
                self.signal.notify_all();
            }
            if do_break {
                break;
            }
        }

        ctl.running = false;
        ctl.paused = false;
        self.signal.notify_all();
        debug!(
            "Report flush loop stopped after {} passes",
            ctl.stats.passes
        );
    }

    /// Starts `flush_reports` on a dedicated thread.
    pub fn spawn_flush_thread(self: &Arc<Self>) -> SfResult<JoinHandle<()>> {
        {
            let mut ctl = self.lock_control();
            ctl.running = true;
            ctl.stop_requested = false;
        }
        let manager = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("report-flush".to_string())
            .spawn(move || manager.flush_reports());
        match spawned {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.lock_control().running = false;
                Err(e.into())
            }
        }
    }

    /// Blocks until the flush loop has acknowledged the pause. No flush is in progress
    /// when this returns and none starts until `resume`.
    pub fn pause(&self) {
        let mut ctl = self.lock_control();
        ctl.pause_requested = true;
        self.signal.notify_all();
        while ctl.running && !ctl.paused {
            ctl = self.wait(ctl);
        }
    }

    pub fn resume(&self) {
        let mut ctl = self.lock_control();
        ctl.pause_requested = false;
        self.signal.notify_all();
    }

    pub fn is_paused(&self) -> bool {
        let ctl = self.lock_control();
        ctl.pause_requested && (ctl.paused || !ctl.running)
    }

    pub fn is_running(&self) -> bool {
        self.lock_control().running
    }

    /// Blocks until every report that was ready when this was called has been written.
    /// Without a running loop the reports are written on the calling thread.
    ///
    /// Calling this while paused blocks until `resume`.
    pub fn wait_for_reports_to_finish(&self) {
        let mut ctl = self.lock_control();
        if !ctl.running {
            drop(ctl);
            let (written, failed) = self.flush_ready();
            let mut ctl = self.lock_control();
            ctl.stats.reports_written += written;
            ctl.stats.write_errors += failed;
            return;
        }
        ctl.waiting = true;
        self.signal.notify_all();
        while ctl.waiting && ctl.running {
            ctl = self.wait(ctl);
        }
    }

    /// Asks the flush loop to make a final pass and exit. A pending pause is released.
    pub fn stop_thread(&self) {
        let mut ctl = self.lock_control();
        ctl.stop_requested = true;
        ctl.pause_requested = false;
        self.signal.notify_all();
    }

    pub fn stats(&self) -> FlushStats {
        self.lock_control().stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::model::{ModelContext, RunMode};
    use crate::reports::kinds::ObjectiveFunction;
    use crate::reports::{ReportTarget, SharedBuffer};
    use serde_json::json;
    use std::sync::mpsc;
    use std::time::Duration;

    fn recruitment_model(manager: &Arc<ReportManager>) -> Model {
        let config: ModelConfig = serde_json::from_value(json!({
            "model": {
                "start_year": 2000,
                "final_year": 2001,
                "time_steps": [ { "label": "annual", "processes": ["Recruitment", "Ageing"] } ]
            },
            "categories": [{
                "name": "stock",
                "min_age": 1,
                "max_age": 3,
                "initial_abundance": [0.0, 0.0, 0.0],
                "mean_weight": [1.0, 1.0, 1.0]
            }],
            "processes": [
                { "label": "Ageing", "type": "ageing", "categories": ["stock"] },
                {
                    "label": "Recruitment",
                    "type": "recruitment_constant",
                    "categories": ["stock"],
                    "proportions": [1.0],
                    "r0": 100.0
                }
            ]
        }))
        .unwrap();
        let ctx = ModelContext::new(RunMode::Basic, 1).with_reports(Arc::clone(manager));
        Model::new(&config, ctx).unwrap()
    }

    #[test]
    fn test_rendering_does_not_wait_on_a_slow_target() {
        let slow = SharedBuffer::new();
        let manager = Arc::new(ReportManager::new());
        manager.add(
            Report::new("slow", Box::new(ObjectiveFunction))
                .with_target(ReportTarget::Buffer(slow.clone())),
        );
        let mut model = recruitment_model(&manager);
        manager.build(&model).unwrap();
        let handle = manager.spawn_flush_thread().unwrap();

        // Writes to the buffer block while this guard is held.
        let stall = slow.0.lock().unwrap();
        model.iteration_complete();
        while manager.lock_collection().objects[0].is_ready() {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));

        let (tx, rx) = mpsc::channel();
        let renderer = thread::spawn(move || {
            model.iteration_complete();
            tx.send(()).unwrap();
            model
        });
        let rendered = rx.recv_timeout(Duration::from_millis(500));
        drop(stall);
        assert!(rendered.is_ok(), "rendering waited on the flush thread's write");
        renderer.join().unwrap();

        manager.wait_for_reports_to_finish();
        manager.stop_thread();
        handle.join().unwrap();
        assert_eq!(slow.contents().matches("*objective_function[slow]").count(), 2);
    }
}
