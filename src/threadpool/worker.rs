use crate::error::SfResult;
use crate::model::Model;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Idle,
    Busy,
    Faulted,
}

struct Slot {
    pending: Option<Vec<f64>>,
    status: Status,
    score: f64,
    terminate: bool,
    evaluations: u64,
}

/// Completion signal shared by all workers of a pool. The counter increases every time
/// any worker goes idle or faults.
#[derive(Default)]
pub(crate) struct PoolSignal {
    completions: Mutex<u64>,
    cond: Condvar,
}

impl PoolSignal {
    pub(crate) fn lock(&self) -> MutexGuard<'_, u64> {
        self.completions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn wait<'a>(&self, guard: MutexGuard<'a, u64>) -> MutexGuard<'a, u64> {
        self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        *self.lock() += 1;
        self.cond.notify_all();
    }
}

struct Shared {
    slot: Mutex<Slot>,
    cond: Condvar,
    pool: Arc<PoolSignal>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Slot>) -> MutexGuard<'a, Slot> {
        self.cond.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }
}

/// Marks the worker faulted if its model panics mid-evaluation, so callers waiting on
/// it fail instead of blocking forever.
struct FaultGuard<'a>(&'a Shared);

impl Drop for FaultGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.lock().status = Status::Faulted;
            self.0.cond.notify_all();
            self.0.pool.notify();
        }
    }
}

/// A thread bound to one model. Candidates are handed over through a single-slot
/// inbox; the score of the last candidate stays readable until the next submit.
pub struct Worker {
    id: usize,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn launch(id: usize, model: Model) -> SfResult<Self> {
        Self::launch_with_signal(id, model, Arc::new(PoolSignal::default()))
    }

    pub(crate) fn launch_with_signal(
        id: usize,
        mut model: Model,
        pool: Arc<PoolSignal>,
    ) -> SfResult<Self> {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot {
                pending: None,
                status: Status::Idle,
                score: 0.0,
                terminate: false,
                evaluations: 0,
            }),
            cond: Condvar::new(),
            pool,
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || run(&thread_shared, &mut model))?;

        Ok(Self {
            id,
            shared,
            handle: Some(handle),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Hands a candidate to the worker and returns immediately.
    ///
    /// # Panics
    /// When the worker is still busy with a previous candidate or has faulted.
    pub fn submit(&self, candidate: Vec<f64>) {
        let mut slot = self.shared.lock();
        match slot.status {
            Status::Idle => {}
            Status::Busy => panic!("worker {} was given a candidate while busy", self.id),
            Status::Faulted => panic!("worker {} terminated abnormally", self.id),
        }
        slot.pending = Some(candidate);
        slot.status = Status::Busy;
        self.shared.cond.notify_all();
    }

    pub fn is_idle(&self) -> bool {
        self.shared.lock().status == Status::Idle
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.shared.lock().status == Status::Faulted
    }

    /// Score of the last completed candidate.
    pub fn score(&self) -> f64 {
        self.shared.lock().score
    }

    pub fn evaluations(&self) -> u64 {
        self.shared.lock().evaluations
    }

    /// Blocks until the current candidate is scored and returns the score.
    ///
    /// # Panics
    /// When the worker thread panicked while evaluating.
    pub fn wait_until_idle(&self) -> f64 {
        let mut slot = self.shared.lock();
        while slot.status == Status::Busy {
            slot = self.shared.wait(slot);
        }
        if slot.status == Status::Faulted {
            panic!("worker {} terminated abnormally", self.id);
        }
        slot.score
    }

    /// Asks the thread to exit once it is back at the top of its loop. A running
    /// evaluation is not interrupted.
    pub fn terminate(&self) {
        let mut slot = self.shared.lock();
        slot.terminate = true;
        self.shared.cond.notify_all();
    }

    /// Waits for the thread to exit. Returns false if it had already been joined.
    pub fn join(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                if handle.join().is_err() {
                    debug!("Worker {} exited after a panic", self.id);
                }
                true
            }
            None => false,
        }
    }

    pub fn is_joined(&self) -> bool {
        self.handle.is_none()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.terminate();
        self.join();
    }
}

fn run(shared: &Shared, model: &mut Model) {
    loop {
        let candidate = {
            let mut slot = shared.lock();
            loop {
                if slot.terminate {
                    return;
                }
                if let Some(candidate) = slot.pending.take() {
                    break candidate;
                }
                slot = shared.wait(slot);
            }
        };

        let guard = FaultGuard(shared);
        let score = model.evaluate(&candidate);
        drop(guard);

        {
            let mut slot = shared.lock();
            slot.score = score;
            slot.status = Status::Idle;
            slot.evaluations += 1;
            shared.cond.notify_all();
        }
        shared.pool.notify();
    }
}
