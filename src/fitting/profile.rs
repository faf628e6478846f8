use super::minimiser::DifferentialEvolution;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileStep {
    /// Profiled parameter value
    pub value: f64,
    pub score: f64,
    pub values: Vec<f64>,
}

/// Evenly spaced values from `low` to `high` inclusive.
pub fn profile_values(low: f64, high: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![low],
        _ => (0..steps)
            .map(|k| low + (high - low) * k as f64 / (steps - 1) as f64)
            .collect(),
    }
}

/// Minimises once per profile value with parameter `index` pinned to that value.
#[allow(clippy::too_many_arguments)]
pub fn profile<F>(
    minimiser: &DifferentialEvolution,
    index: usize,
    values: &[f64],
    start: &[f64],
    lower: &[f64],
    upper: &[f64],
    rng: &mut fastrand::Rng,
    mut score: F,
) -> Vec<ProfileStep>
where
    F: FnMut(&[Vec<f64>]) -> Vec<f64>,
{
    let mut steps = Vec::with_capacity(values.len());
    for (k, &value) in values.iter().enumerate() {
        let mut lo = lower.to_vec();
        let mut hi = upper.to_vec();
        let mut begin = start.to_vec();
        lo[index] = value;
        hi[index] = value;
        begin[index] = value;

        let result = minimiser.minimise(&begin, &lo, &hi, rng, &mut score);
        info!(
            "📈 Profile step {}/{}: {} -> {:.6}",
            k + 1,
            values.len(),
            value,
            result.score
        );
        steps.push(ProfileStep {
            value,
            score: result.score,
            values: result.values,
        });
    }
    steps
}
