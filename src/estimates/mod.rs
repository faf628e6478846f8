pub mod addressable;
pub mod priors;
pub mod transformations;

use self::addressable::{AddressHandle, ParameterPath};
use self::priors::Prior;
use self::transformations::TransformationKind;
use crate::config::EstimateConfig;
use crate::error::ConfigErrors;

/// A free parameter of the model.
///
/// `value` is on the natural scale and is what gets written into the owning object.
/// `fitting_value` is what minimisers and samplers see; the two only differ when a
/// transformation is configured.
#[derive(Debug, Clone)]
pub struct Estimate {
    pub label: String,
    pub path: ParameterPath,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub prior: Prior,
    transformation: Option<TransformationKind>,
    jacobian: bool,
    handle: Option<AddressHandle>,
    value: f64,
    fitting_value: f64,
}

impl Estimate {
    pub fn new(cfg: &EstimateConfig, errors: &mut ConfigErrors) -> Option<Self> {
        let label = cfg.label.clone().unwrap_or_else(|| cfg.parameter.clone());
        let location = format!("estimate[{}]", label);

        let path = match ParameterPath::parse(&cfg.parameter) {
            Ok(p) => p,
            Err(msg) => {
                errors.push(&location, msg);
                return None;
            }
        };

        let mut valid = true;
        if cfg.lower_bound > cfg.upper_bound {
            errors.push(
                &location,
                format!(
                    "lower_bound ({}) is greater than upper_bound ({})",
                    cfg.lower_bound, cfg.upper_bound
                ),
            );
            valid = false;
        }
        if let Err(msg) = cfg.prior.validate() {
            errors.push(&location, msg);
            valid = false;
        }
        if let Some(t) = &cfg.transformation {
            if let Err(msg) = t.kind.check_bounds(cfg.lower_bound, cfg.upper_bound) {
                errors.push(&location, msg);
                valid = false;
            }
        }
        if !valid {
            return None;
        }

        Some(Self {
            label,
            path,
            lower_bound: cfg.lower_bound,
            upper_bound: cfg.upper_bound,
            prior: cfg.prior.clone(),
            transformation: cfg.transformation.as_ref().map(|t| t.kind),
            jacobian: cfg.transformation.as_ref().is_some_and(|t| t.jacobian),
            handle: None,
            value: 0.0,
            fitting_value: 0.0,
        })
    }

    pub fn location(&self) -> String {
        format!("estimate[{}]", self.label)
    }

    /// Attaches the resolved handle and takes the configured value as the starting point.
    pub fn bind(&mut self, handle: AddressHandle, initial: f64, errors: &mut ConfigErrors) {
        if initial < self.lower_bound || initial > self.upper_bound {
            errors.push(
                self.location(),
                format!(
                    "configured value ({}) of {} is outside the bounds [{}, {}]",
                    initial, self.path, self.lower_bound, self.upper_bound
                ),
            );
        }
        self.handle = Some(handle);
        self.value = initial;
        self.transform();
    }

    pub fn handle(&self) -> Option<&AddressHandle> {
        self.handle.as_ref()
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn fitting_value(&self) -> f64 {
        self.fitting_value
    }

    pub fn set_fitting_value(&mut self, value: f64) {
        self.fitting_value = value;
    }

    pub fn transformation(&self) -> Option<TransformationKind> {
        self.transformation
    }

    /// Fitting scale to natural scale.
    pub fn restore(&mut self) {
        self.value = match self.transformation {
            Some(kind) => kind.restore(self.fitting_value),
            None => self.fitting_value,
        };
    }

    /// Natural scale to fitting scale.
    pub fn transform(&mut self) {
        self.fitting_value = self.to_fitting_scale(self.value);
    }

    pub fn to_fitting_scale(&self, x: f64) -> f64 {
        match self.transformation {
            Some(kind) => kind.transform(x),
            None => x,
        }
    }

    pub fn fitting_bounds(&self) -> (f64, f64) {
        match self.transformation {
            Some(kind) => kind.bounds(self.lower_bound, self.upper_bound),
            None => (self.lower_bound, self.upper_bound),
        }
    }

    pub fn prior_score(&self) -> f64 {
        self.prior.score(self.value)
    }

    pub fn jacobian(&self) -> f64 {
        match self.transformation {
            Some(kind) if self.jacobian => kind.jacobian(self.value),
            _ => 0.0,
        }
    }
}
