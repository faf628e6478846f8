use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockForgeError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error:\n{0}")]
    Config(ConfigErrors),

    #[error("Run Mode Error: {0}")]
    RunMode(String),
}

pub type SfResult<T> = Result<T, StockForgeError>;

/// User configuration problems collected across a lifecycle phase so they can be
/// reported together instead of one at a time.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConfigErrors {
    messages: Vec<String>,
}

impl ConfigErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message against an object location such as `process[Fishing]`.
    pub fn push(&mut self, location: impl fmt::Display, message: impl fmt::Display) {
        self.messages.push(format!("{}: {}", location, message));
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// Aggregation point: any recorded message turns into a single error.
    pub fn into_result(self) -> SfResult<()> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(StockForgeError::Config(self))
        }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, msg) in self.messages.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "  - {}", msg)?;
        }
        Ok(())
    }
}
