use serde::{Deserialize, Serialize};
use strum_macros::Display;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Display)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Prior {
    #[default]
    Uniform,
    UniformLog,
    Normal {
        mu: f64,
        cv: f64,
    },
    Lognormal {
        mu: f64,
        cv: f64,
    },
}

impl Prior {
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            Prior::Normal { mu, cv } => {
                if cv <= 0.0 {
                    return Err(format!("normal prior cv ({}) must be greater than 0", cv));
                }
                if mu == 0.0 {
                    return Err("normal prior mu cannot be 0".to_string());
                }
            }
            Prior::Lognormal { mu, cv } => {
                if cv <= 0.0 {
                    return Err(format!("lognormal prior cv ({}) must be greater than 0", cv));
                }
                if mu <= 0.0 {
                    return Err(format!("lognormal prior mu ({}) must be greater than 0", mu));
                }
            }
            Prior::Uniform | Prior::UniformLog => {}
        }
        Ok(())
    }

    /// Negative log prior density (up to a constant) at `x`.
    pub fn score(&self, x: f64) -> f64 {
        match *self {
            Prior::Uniform => 0.0,
            Prior::UniformLog => x.ln(),
            Prior::Normal { mu, cv } => {
                let z = (x - mu) / (cv * mu);
                0.5 * z * z
            }
            Prior::Lognormal { mu, cv } => {
                let sigma = (1.0 + cv * cv).ln().sqrt();
                let z = (x / mu).ln() / sigma + 0.5 * sigma;
                x.ln() + 0.5 * z * z
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_prior_is_zero_at_mean() {
        let p = Prior::Normal { mu: 10.0, cv: 0.2 };
        assert_eq!(p.score(10.0), 0.0);
        assert!((p.score(12.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn lognormal_requires_positive_mu() {
        assert!(Prior::Lognormal { mu: 0.0, cv: 0.1 }.validate().is_err());
        assert!(Prior::Lognormal { mu: 1.0, cv: 0.1 }.validate().is_ok());
    }
}
