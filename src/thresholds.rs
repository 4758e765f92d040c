//! Threshold evaluation
//!
//! Pure classification of a sampled value against a configured
//! warning/critical pair. No side effects; dedup and routing live in the
//! alert dispatcher.

use serde::{Deserialize, Serialize};

use crate::Severity;

/// A warning/critical threshold pair for one metric.
///
/// `critical > warning` is enforced by [`ThresholdPair::validate`] at
/// configuration load, never silently at evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning: f64,
    pub critical: f64,
}

impl ThresholdPair {
    pub const fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    pub fn validate(&self, metric: &str) -> anyhow::Result<()> {
        if self.critical <= self.warning {
            anyhow::bail!(
                "invalid thresholds for {metric}: critical ({}) must be greater than warning ({})",
                self.critical,
                self.warning
            );
        }
        Ok(())
    }

    pub fn classify(&self, value: f64) -> Severity {
        classify(value, self.warning, self.critical)
    }
}

/// Map a measured value onto a severity tier.
///
/// Total over all finite inputs: `value >= critical` is `Critical`,
/// `value >= warning` is `Warning`, anything else is `Ok`.
pub fn classify(value: f64, warning: f64, critical: f64) -> Severity {
    if value >= critical {
        Severity::Critical
    } else if value >= warning {
        Severity::Warning
    } else {
        Severity::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_maps_value_onto_tiers() {
        // the worked example from the operator docs: warning=80, critical=95
        assert_eq!(classify(82.0, 80.0, 95.0), Severity::Warning);
        assert_eq!(classify(96.0, 80.0, 95.0), Severity::Critical);
        assert_eq!(classify(50.0, 80.0, 95.0), Severity::Ok);
    }

    #[test]
    fn classify_boundaries_are_inclusive() {
        assert_eq!(classify(80.0, 80.0, 95.0), Severity::Warning);
        assert_eq!(classify(95.0, 80.0, 95.0), Severity::Critical);
        assert_eq!(classify(79.999, 80.0, 95.0), Severity::Ok);
    }

    #[test]
    fn validate_rejects_inverted_pair() {
        assert!(ThresholdPair::new(90.0, 80.0).validate("disk").is_err());
        assert!(ThresholdPair::new(80.0, 80.0).validate("disk").is_err());
        assert!(ThresholdPair::new(80.0, 95.0).validate("disk").is_ok());
    }
}
