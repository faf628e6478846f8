use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Maps a natural-scale parameter `x` onto the scale the fitting algorithms search.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransformationKind {
    Log,
    Inverse,
    LogOdds,
    SquareRoot,
}

impl TransformationKind {
    pub fn transform(self, x: f64) -> f64 {
        match self {
            TransformationKind::Log => x.ln(),
            TransformationKind::Inverse => 1.0 / x,
            TransformationKind::LogOdds => (x / (1.0 - x)).ln(),
            TransformationKind::SquareRoot => x.sqrt(),
        }
    }

    pub fn restore(self, theta: f64) -> f64 {
        match self {
            TransformationKind::Log => theta.exp(),
            TransformationKind::Inverse => 1.0 / theta,
            TransformationKind::LogOdds => 1.0 / (1.0 + (-theta).exp()),
            TransformationKind::SquareRoot => theta * theta,
        }
    }

    /// `-ln |dx/dθ|` evaluated at the natural value `x`.
    pub fn jacobian(self, x: f64) -> f64 {
        match self {
            TransformationKind::Log => -x.ln(),
            TransformationKind::Inverse => -(x * x).ln(),
            TransformationKind::LogOdds => -(x * (1.0 - x)).ln(),
            TransformationKind::SquareRoot => -(2.0 * x.sqrt()).ln(),
        }
    }

    /// Checks the natural-scale bounds lie inside the transformation's domain.
    pub fn check_bounds(self, lower: f64, upper: f64) -> Result<(), String> {
        let ok = match self {
            TransformationKind::Log | TransformationKind::Inverse => lower > 0.0,
            TransformationKind::LogOdds => lower > 0.0 && upper < 1.0,
            TransformationKind::SquareRoot => lower >= 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(format!(
                "bounds [{}, {}] are outside the domain of the {} transformation",
                lower, upper, self
            ))
        }
    }

    /// Bounds on the transformed scale, ordered low to high.
    pub fn bounds(self, lower: f64, upper: f64) -> (f64, f64) {
        let a = self.transform(lower);
        let b = self.transform(upper);
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn restore_inverts_transform() {
        for kind in TransformationKind::iter() {
            for x in [0.1, 0.25, 0.5, 0.9] {
                let back = kind.restore(kind.transform(x));
                assert!((back - x).abs() < 1e-12, "{} failed at {}", kind, x);
            }
        }
    }

    #[test]
    fn inverse_bounds_are_swapped() {
        assert_eq!(TransformationKind::Inverse.bounds(0.5, 2.0), (0.5, 2.0));
        assert_eq!(TransformationKind::Inverse.bounds(0.25, 1.0), (1.0, 4.0));
    }
}
