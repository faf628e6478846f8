use crate::config::PenaltyConfig;
use crate::error::ConfigErrors;
use crate::math::zero_fun;

/// A single trigger recorded during the current iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct FlaggedPenalty {
    pub source: String,
    pub requested: f64,
    pub achieved: f64,
    pub score: f64,
}

impl FlaggedPenalty {
    pub fn shortfall(&self) -> f64 {
        self.requested - self.achieved
    }
}

#[derive(Debug, Clone)]
pub struct Penalty {
    pub label: String,
    pub multiplier: f64,
    pub log_scale: bool,
    flagged: Vec<FlaggedPenalty>,
}

impl Penalty {
    pub fn new(cfg: &PenaltyConfig, errors: &mut ConfigErrors) -> Self {
        if cfg.multiplier < 0.0 {
            errors.push(
                format!("penalty[{}]", cfg.label),
                format!("multiplier ({}) cannot be negative", cfg.multiplier),
            );
        }
        Self {
            label: cfg.label.clone(),
            multiplier: cfg.multiplier,
            log_scale: cfg.log_scale,
            flagged: Vec::new(),
        }
    }

    /// Flags that `source` could only achieve `achieved` of the `requested` amount.
    pub fn trigger(&mut self, source: &str, requested: f64, achieved: f64) {
        let diff = if self.log_scale {
            zero_fun(requested).ln() - zero_fun(achieved).ln()
        } else {
            requested - achieved
        };
        self.flagged.push(FlaggedPenalty {
            source: source.to_string(),
            requested,
            achieved,
            score: diff * diff * self.multiplier,
        });
    }

    pub fn flagged(&self) -> &[FlaggedPenalty] {
        &self.flagged
    }

    pub fn score(&self) -> f64 {
        self.flagged.iter().map(|f| f.score).sum()
    }

    pub fn reset(&mut self) {
        self.flagged.clear();
    }
}
