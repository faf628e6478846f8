use crate::consts::ZERO_FUN_DELTA;

/// Keeps a denominator strictly positive. Values at or above `delta` pass through,
/// smaller values (including zero and negatives) map onto `(0, delta)`.
#[inline]
pub fn zero_fun(x: f64) -> f64 {
    zero_fun_with(x, ZERO_FUN_DELTA)
}

#[inline]
pub fn zero_fun_with(x: f64, delta: f64) -> f64 {
    if x >= delta {
        x
    } else {
        delta / (2.0 - (x / delta))
    }
}

/// Standard normal draw (Box-Muller).
pub fn standard_normal(rng: &mut fastrand::Rng) -> f64 {
    // f64() is in [0, 1); shift away from zero for the log.
    let u1 = 1.0 - rng.f64();
    let u2 = rng.f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Lower-triangular Cholesky factor of a symmetric matrix, `None` when the matrix
/// is not positive definite.
pub fn cholesky(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let n = matrix.len();
    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = matrix[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 || !sum.is_finite() {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
