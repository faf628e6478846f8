use super::{clamp_to_bounds, sanitise};
use crate::config::MinimiserConfig;
use crate::math::mean;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct MinimiserResult {
    pub values: Vec<f64>,
    pub score: f64,
    pub generations: usize,
    pub evaluations: usize,
    pub converged: bool,
    /// Sample covariance of the final population
    pub covariance: Option<Vec<Vec<f64>>>,
}

/// Bounded differential evolution (rand/1/bin). Each generation is scored as one batch.
#[derive(Debug, Clone)]
pub struct DifferentialEvolution {
    pub population_size: usize,
    pub max_generations: usize,
    pub crossover_probability: f64,
    pub difference_scale: f64,
    pub tolerance: f64,
}

impl From<&MinimiserConfig> for DifferentialEvolution {
    fn from(cfg: &MinimiserConfig) -> Self {
        Self {
            population_size: cfg.population_size,
            max_generations: cfg.max_generations,
            crossover_probability: cfg.crossover_probability,
            difference_scale: cfg.difference_scale,
            tolerance: cfg.tolerance,
        }
    }
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self::from(&MinimiserConfig::default())
    }
}

impl DifferentialEvolution {
    fn population_for(&self, dims: usize) -> usize {
        let size = if self.population_size == 0 {
            10 * dims
        } else {
            self.population_size
        };
        size.max(4)
    }

    pub fn minimise<F>(
        &self,
        start: &[f64],
        lower: &[f64],
        upper: &[f64],
        rng: &mut fastrand::Rng,
        mut score: F,
    ) -> MinimiserResult
    where
        F: FnMut(&[Vec<f64>]) -> Vec<f64>,
    {
        let dims = start.len();
        if dims == 0 {
            let s = score(&[Vec::new()]);
            return MinimiserResult {
                values: Vec::new(),
                score: s.first().copied().map_or(f64::INFINITY, sanitise),
                generations: 0,
                evaluations: 1,
                converged: true,
                covariance: None,
            };
        }

        let np = self.population_for(dims);
        let mut population: Vec<Vec<f64>> = Vec::with_capacity(np);
        let mut first = start.to_vec();
        clamp_to_bounds(&mut first, lower, upper);
        population.push(first);
        while population.len() < np {
            population.push(
                lower
                    .iter()
                    .zip(upper)
                    .map(|(lo, hi)| lo + rng.f64() * (hi - lo))
                    .collect(),
            );
        }

        let mut fitness: Vec<f64> = score(&population).into_iter().map(sanitise).collect();
        let mut evaluations = np;
        let mut generations = 0;
        let mut converged = false;

        while generations < self.max_generations {
            generations += 1;

            let trials: Vec<Vec<f64>> = (0..np)
                .map(|i| self.trial(i, &population, lower, upper, rng))
                .collect();
            let trial_scores = score(&trials);
            evaluations += trials.len();

            for (i, (trial, s)) in trials.into_iter().zip(trial_scores).enumerate() {
                let s = sanitise(s);
                if s <= fitness[i] {
                    population[i] = trial;
                    fitness[i] = s;
                }
            }

            let (best, worst) = fitness
                .iter()
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
                    (lo.min(*f), hi.max(*f))
                });
            debug!("Generation {}: best {:.6} spread {:.3e}", generations, best, worst - best);
            if (worst - best).abs() <= self.tolerance * (best.abs() + self.tolerance) {
                converged = true;
                break;
            }
        }

        let best = fitness
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap_or(0);

        info!(
            "📉 Minimiser finished after {} generations ({} evaluations): {:.6}{}",
            generations,
            evaluations,
            fitness[best],
            if converged { "" } else { " (not converged)" }
        );

        MinimiserResult {
            values: population[best].clone(),
            score: fitness[best],
            generations,
            evaluations,
            converged,
            covariance: Some(covariance(&population)),
        }
    }

    fn trial(
        &self,
        target: usize,
        population: &[Vec<f64>],
        lower: &[f64],
        upper: &[f64],
        rng: &mut fastrand::Rng,
    ) -> Vec<f64> {
        let np = population.len();
        let mut pick = |exclude: &[usize]| loop {
            let r = rng.usize(0..np);
            if !exclude.contains(&r) {
                break r;
            }
        };
        let r1 = pick(&[target]);
        let r2 = pick(&[target, r1]);
        let r3 = pick(&[target, r1, r2]);

        let dims = population[target].len();
        let forced = rng.usize(0..dims);
        (0..dims)
            .map(|d| {
                if d == forced || rng.f64() < self.crossover_probability {
                    let mutant = population[r1][d]
                        + self.difference_scale * (population[r2][d] - population[r3][d]);
                    // Out of range components land between the bound and the parent.
                    if mutant < lower[d] {
                        lower[d] + rng.f64() * (population[target][d] - lower[d])
                    } else if mutant > upper[d] {
                        upper[d] - rng.f64() * (upper[d] - population[target][d])
                    } else {
                        mutant
                    }
                } else {
                    population[target][d]
                }
            })
            .collect()
    }
}

fn covariance(samples: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = samples.len();
    let dims = samples.first().map_or(0, Vec::len);
    let means: Vec<f64> = (0..dims)
        .map(|d| mean(&samples.iter().map(|s| s[d]).collect::<Vec<_>>()))
        .collect();
    let denom = (n.max(2) - 1) as f64;
    let mut cov = vec![vec![0.0; dims]; dims];
    for i in 0..dims {
        for j in 0..=i {
            let c = samples
                .iter()
                .map(|s| (s[i] - means[i]) * (s[j] - means[j]))
                .sum::<f64>()
                / denom;
            cov[i][j] = c;
            cov[j][i] = c;
        }
    }
    cov
}
