pub mod worker;

pub use self::worker::Worker;

use self::worker::PoolSignal;
use crate::error::SfResult;
use crate::model::Model;
use std::sync::Arc;
use tracing::info;

/// Anything that can score a batch of candidates, returning scores in input order.
pub trait CandidateEvaluator {
    fn evaluate_batch(&mut self, candidates: &[Vec<f64>]) -> Vec<f64>;

    /// Releases threads or other resources. Further batches are not allowed.
    fn shutdown(&mut self) {}
}

impl CandidateEvaluator for Model {
    fn evaluate_batch(&mut self, candidates: &[Vec<f64>]) -> Vec<f64> {
        candidates.iter().map(|c| self.evaluate(c)).collect()
    }
}

/// Fixed set of workers, one model each.
pub struct EvaluationPool {
    workers: Vec<Worker>,
    signal: Arc<PoolSignal>,
}

impl EvaluationPool {
    pub fn new(models: Vec<Model>) -> SfResult<Self> {
        assert!(!models.is_empty(), "an evaluation pool needs at least one model");
        let signal = Arc::new(PoolSignal::default());
        let workers = models
            .into_iter()
            .enumerate()
            .map(|(id, model)| Worker::launch_with_signal(id + 1, model, Arc::clone(&signal)))
            .collect::<SfResult<Vec<_>>>()?;
        info!("🧵 Launched {} evaluation workers", workers.len());
        Ok(Self { workers, signal })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Blocks until some worker is idle and returns its index.
    fn next_idle(&self) -> usize {
        loop {
            let guard = self.signal.lock();
            if let Some(i) = self.workers.iter().position(Worker::is_idle) {
                return i;
            }
            if let Some(w) = self.workers.iter().find(|w| w.is_faulted()) {
                panic!("worker {} terminated abnormally", w.id());
            }
            // Workers bump the counter under this lock after going idle, so a
            // completion between the scan and the wait is not lost.
            drop(self.signal.wait(guard));
        }
    }

    /// Scores every candidate. `result[i]` belongs to `candidates[i]` whatever order
    /// the workers finish in.
    ///
    /// # Panics
    /// When a worker thread panics during evaluation.
    pub fn run_batch(&mut self, candidates: &[Vec<f64>]) -> Vec<f64> {
        let mut scores = vec![f64::NAN; candidates.len()];
        // Candidate index each worker is currently holding.
        let mut assigned: Vec<Option<usize>> = vec![None; self.workers.len()];

        for (i, candidate) in candidates.iter().enumerate() {
            let w = self.next_idle();
            if let Some(previous) = assigned[w].take() {
                scores[previous] = self.workers[w].score();
            }
            self.workers[w].submit(candidate.clone());
            assigned[w] = Some(i);
        }

        for (w, slot) in assigned.iter_mut().enumerate() {
            if let Some(index) = slot.take() {
                scores[index] = self.workers[w].wait_until_idle();
            }
        }
        scores
    }

    /// Signals every worker, then joins every thread.
    pub fn terminate_all(&mut self) {
        for worker in &self.workers {
            worker.terminate();
        }
        let joined = self
            .workers
            .iter_mut()
            .map(|w| w.join())
            .filter(|joined| *joined)
            .count();
        if joined > 0 {
            info!("🧵 Joined {} evaluation workers", joined);
        }
    }

    /// Worker threads not yet joined.
    pub fn active_threads(&self) -> usize {
        self.workers.iter().filter(|w| !w.is_joined()).count()
    }
}

impl CandidateEvaluator for EvaluationPool {
    fn evaluate_batch(&mut self, candidates: &[Vec<f64>]) -> Vec<f64> {
        self.run_batch(candidates)
    }

    fn shutdown(&mut self) {
        self.terminate_all();
    }
}

impl Drop for EvaluationPool {
    fn drop(&mut self) {
        self.terminate_all();
    }
}
