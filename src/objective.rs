use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ComponentKind {
    Likelihood,
    Prior,
    Penalty,
    Jacobian,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveComponent {
    pub kind: ComponentKind,
    pub label: String,
    pub score: f64,
}

/// Objective function value of the last full iteration with its breakdown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectiveScore {
    pub likelihoods: f64,
    pub priors: f64,
    pub penalties: f64,
    pub jacobians: f64,
    pub components: Vec<ObjectiveComponent>,
}

impl ObjectiveScore {
    pub fn add(&mut self, kind: ComponentKind, label: &str, score: f64) {
        match kind {
            ComponentKind::Likelihood => self.likelihoods += score,
            ComponentKind::Prior => self.priors += score,
            ComponentKind::Penalty => self.penalties += score,
            ComponentKind::Jacobian => self.jacobians += score,
        }
        self.components.push(ObjectiveComponent {
            kind,
            label: label.to_string(),
            score,
        });
    }

    pub fn total(&self) -> f64 {
        self.likelihoods + self.priors + self.penalties + self.jacobians
    }
}
