/// Inclusive range of acceptable readings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// The bound a reading violates, if any.
    pub fn violated_bound(&self, value: f64) -> Option<f64> {
        if value < self.min {
            Some(self.min)
        } else if value > self.max {
            Some(self.max)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub warning: Band,
    pub error: Band,
}

impl Thresholds {
    pub const fn new(warning: Band, error: Band) -> Self {
        Self { warning, error }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdEvaluation {
    Ok,
    Warning { threshold: f64 },
    Error { threshold: f64 },
}

impl ThresholdEvaluation {
    /// Classify a reading. The error band is tested first and wins over the warning band.
    pub fn evaluate(value: f64, thresholds: &Thresholds) -> ThresholdEvaluation {
        if let Some(threshold) = thresholds.error.violated_bound(value) {
            return ThresholdEvaluation::Error { threshold };
        }

        if let Some(threshold) = thresholds.warning.violated_bound(value) {
            return ThresholdEvaluation::Warning { threshold };
        }

        ThresholdEvaluation::Ok
    }
}
