//! Fitting algorithms. Each one only sees a batch scoring function, so the same code
//! runs against a single model or the evaluation pool.

pub mod mcmc;
pub mod minimiser;
pub mod profile;

pub use self::mcmc::{McmcResult, RandomWalkMetropolis};
pub use self::minimiser::{DifferentialEvolution, MinimiserResult};
pub use self::profile::{profile, profile_values, ProfileStep};

/// One kept sample of an MCMC chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainLink {
    pub iteration: usize,
    pub score: f64,
    pub acceptance_rate: f64,
    pub step_size: f64,
    pub values: Vec<f64>,
}

/// Orders NaN after every number so a broken candidate never wins.
pub(crate) fn sanitise(score: f64) -> f64 {
    if score.is_nan() {
        f64::INFINITY
    } else {
        score
    }
}

pub(crate) fn clamp_to_bounds(values: &mut [f64], lower: &[f64], upper: &[f64]) {
    for ((v, lo), hi) in values.iter_mut().zip(lower).zip(upper) {
        *v = v.clamp(*lo, *hi);
    }
}
