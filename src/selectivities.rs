use crate::config::SelectivityConfig;
use crate::error::ConfigErrors;
use crate::estimates::addressable::Addressable;
use serde::{Deserialize, Serialize};

fn one() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectivityKind {
    Constant {
        c: f64,
    },
    Logistic {
        a50: f64,
        ato95: f64,
        #[serde(default = "one")]
        alpha: f64,
    },
    KnifeEdge {
        e: f64,
        #[serde(default = "one")]
        alpha: f64,
    },
}

#[derive(Debug, Clone)]
pub struct Selectivity {
    pub label: String,
    pub kind: SelectivityKind,
}

impl Selectivity {
    pub fn new(cfg: &SelectivityConfig, errors: &mut ConfigErrors) -> Self {
        let location = format!("selectivity[{}]", cfg.label);
        match &cfg.kind {
            SelectivityKind::Constant { c } if *c < 0.0 => {
                errors.push(&location, format!("c ({}) cannot be negative", c));
            }
            SelectivityKind::Logistic { ato95, alpha, .. } => {
                if *ato95 <= 0.0 {
                    errors.push(&location, format!("ato95 ({}) must be greater than 0", ato95));
                }
                if *alpha <= 0.0 {
                    errors.push(&location, format!("alpha ({}) must be greater than 0", alpha));
                }
            }
            SelectivityKind::KnifeEdge { alpha, .. } if *alpha <= 0.0 => {
                errors.push(&location, format!("alpha ({}) must be greater than 0", alpha));
            }
            _ => {}
        }

        Self {
            label: cfg.label.clone(),
            kind: cfg.kind.clone(),
        }
    }

    pub fn constant(label: &str, c: f64) -> Self {
        Self {
            label: label.to_string(),
            kind: SelectivityKind::Constant { c },
        }
    }

    #[inline]
    pub fn age_result(&self, age: u32) -> f64 {
        let age = age as f64;
        match self.kind {
            SelectivityKind::Constant { c } => c,
            SelectivityKind::Logistic { a50, ato95, alpha } => {
                let threshold = (a50 - age) / ato95;
                if threshold > 5.0 {
                    0.0
                } else if threshold < -5.0 {
                    alpha
                } else {
                    alpha / (1.0 + 19.0_f64.powf(threshold))
                }
            }
            SelectivityKind::KnifeEdge { e, alpha } => {
                if age >= e {
                    alpha
                } else {
                    0.0
                }
            }
        }
    }

    pub fn addressable(&mut self, name: &str) -> Option<Addressable<'_>> {
        let value = match (&mut self.kind, name) {
            (SelectivityKind::Constant { c }, "c") => c,
            (SelectivityKind::Logistic { a50, .. }, "a50") => a50,
            (SelectivityKind::Logistic { ato95, .. }, "ato95") => ato95,
            (SelectivityKind::Logistic { alpha, .. }, "alpha") => alpha,
            (SelectivityKind::KnifeEdge { e, .. }, "e") => e,
            (SelectivityKind::KnifeEdge { alpha, .. }, "alpha") => alpha,
            _ => return None,
        };
        Some(Addressable::Single(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logistic_is_half_alpha_at_a50() {
        let sel = Selectivity {
            label: "s".into(),
            kind: SelectivityKind::Logistic {
                a50: 4.0,
                ato95: 2.0,
                alpha: 1.0,
            },
        };
        assert!((sel.age_result(4) - 0.5).abs() < 1e-12);
        assert!((sel.age_result(6) - 0.95).abs() < 1e-12);
        assert_eq!(sel.age_result(40), 1.0);
    }

    #[test]
    fn knife_edge_switches_on_at_e() {
        let sel = Selectivity {
            label: "k".into(),
            kind: SelectivityKind::KnifeEdge { e: 3.0, alpha: 0.8 },
        };
        assert_eq!(sel.age_result(2), 0.0);
        assert_eq!(sel.age_result(3), 0.8);
    }
}
