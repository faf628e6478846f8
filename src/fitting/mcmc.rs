use super::{clamp_to_bounds, sanitise, ChainLink};
use crate::config::McmcConfig;
use crate::error::ConfigErrors;
use crate::math::{cholesky, standard_normal};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct McmcResult {
    pub links: Vec<ChainLink>,
    pub acceptance_rate: f64,
    pub evaluations: usize,
}

/// Random-walk Metropolis with a multivariate normal proposal.
#[derive(Debug, Clone)]
pub struct RandomWalkMetropolis {
    pub length: usize,
    pub keep: usize,
    pub burn_in: usize,
    pub step_size: Option<f64>,
    pub max_correlation: f64,
}

impl From<&McmcConfig> for RandomWalkMetropolis {
    fn from(cfg: &McmcConfig) -> Self {
        Self {
            length: cfg.length,
            keep: cfg.keep,
            burn_in: cfg.burn_in,
            step_size: cfg.step_size,
            max_correlation: cfg.max_correlation,
        }
    }
}

impl RandomWalkMetropolis {
    pub fn validate(&self, errors: &mut ConfigErrors) {
        if self.max_correlation <= 0.0 || self.max_correlation > 1.0 {
            errors.push(
                "mcmc",
                format!(
                    "max_correlation ({}) must be between 0.0 (exclusive) and 1.0 (inclusive)",
                    self.max_correlation
                ),
            );
        }
        if self.length == 0 {
            errors.push("mcmc", "length must be greater than 0");
        }
        if self.keep == 0 {
            errors.push("mcmc", "keep must be greater than 0");
        }
        if self.burn_in >= self.length {
            errors.push(
                "mcmc",
                format!(
                    "burn_in ({}) must be less than length ({})",
                    self.burn_in, self.length
                ),
            );
        }
        if let Some(step) = self.step_size {
            if step <= 0.0 {
                errors.push("mcmc", format!("step_size ({}) must be greater than 0", step));
            }
        }
    }

    pub fn step_size_for(&self, dims: usize) -> f64 {
        self.step_size
            .unwrap_or_else(|| 2.4 / (dims.max(1) as f64).sqrt())
    }

    /// Proposal covariance: the supplied covariance (or a diagonal from the bounds)
    /// with correlations limited to `±max_correlation`, scaled by the step size.
    pub fn proposal_covariance(
        &self,
        lower: &[f64],
        upper: &[f64],
        covariance: Option<&[Vec<f64>]>,
    ) -> Vec<Vec<f64>> {
        let dims = lower.len();
        let mut cov = match covariance {
            Some(c) if c.len() == dims => c.to_vec(),
            _ => {
                let mut diag = vec![vec![0.0; dims]; dims];
                for d in 0..dims {
                    let width = (upper[d] - lower[d]) / 4.0;
                    diag[d][d] = width * width;
                }
                diag
            }
        };

        for d in 0..dims {
            if cov[d][d] <= 0.0 || !cov[d][d].is_finite() {
                let width = ((upper[d] - lower[d]) / 4.0).max(1e-6);
                cov[d][d] = width * width;
            }
        }

        for i in 0..dims {
            for j in 0..i {
                let scale = (cov[i][i] * cov[j][j]).sqrt();
                let corr = cov[i][j] / scale;
                if corr.abs() > self.max_correlation {
                    let clamped = self.max_correlation.copysign(corr) * scale;
                    cov[i][j] = clamped;
                    cov[j][i] = clamped;
                }
            }
        }

        let step = self.step_size_for(dims);
        cov.iter()
            .map(|row| row.iter().map(|c| c * step * step).collect())
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn run<F, L>(
        &self,
        start: &[f64],
        lower: &[f64],
        upper: &[f64],
        covariance: Option<&[Vec<f64>]>,
        rng: &mut fastrand::Rng,
        mut score: F,
        mut on_link: L,
    ) -> McmcResult
    where
        F: FnMut(&[Vec<f64>]) -> Vec<f64>,
        L: FnMut(&ChainLink),
    {
        let dims = start.len();
        let proposal = self.proposal_covariance(lower, upper, covariance);
        let factor = cholesky(&proposal).unwrap_or_else(|| {
            warn!("⚠️  Proposal covariance is not positive definite, using its diagonal");
            (0..dims)
                .map(|i| {
                    (0..dims)
                        .map(|j| if i == j { proposal[i][i].sqrt() } else { 0.0 })
                        .collect()
                })
                .collect()
        });
        let step_size = self.step_size_for(dims);

        let mut current = start.to_vec();
        clamp_to_bounds(&mut current, lower, upper);
        let mut current_score = score(&[current.clone()])
            .first()
            .copied()
            .map_or(f64::INFINITY, sanitise);
        let mut evaluations = 1;
        let mut accepted = 0usize;
        let mut links = Vec::new();

        for iteration in 1..=self.length {
            let z: Vec<f64> = (0..dims).map(|_| standard_normal(rng)).collect();
            let candidate: Vec<f64> = (0..dims)
                .map(|i| current[i] + (0..=i).map(|j| factor[i][j] * z[j]).sum::<f64>())
                .collect();

            let in_bounds = candidate
                .iter()
                .zip(lower.iter().zip(upper))
                .all(|(v, (lo, hi))| v >= lo && v <= hi);

            if in_bounds {
                let candidate_score = score(&[candidate.clone()])
                    .first()
                    .copied()
                    .map_or(f64::INFINITY, sanitise);
                evaluations += 1;
                let accept = candidate_score.is_finite()
                    && (candidate_score <= current_score
                        || rng.f64().ln() < current_score - candidate_score);
                if accept {
                    current = candidate;
                    current_score = candidate_score;
                    accepted += 1;
                }
            }

            if iteration > self.burn_in && (iteration - self.burn_in) % self.keep == 0 {
                let link = ChainLink {
                    iteration,
                    score: current_score,
                    acceptance_rate: accepted as f64 / iteration as f64,
                    step_size,
                    values: current.clone(),
                };
                on_link(&link);
                links.push(link);
            }
        }

        let acceptance_rate = accepted as f64 / self.length.max(1) as f64;
        info!(
            "🔗 MCMC kept {} of {} samples, acceptance rate {:.3}",
            links.len(),
            self.length,
            acceptance_rate
        );

        McmcResult {
            links,
            acceptance_rate,
            evaluations,
        }
    }
}
