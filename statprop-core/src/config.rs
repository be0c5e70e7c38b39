//! Propagation configuration.

use serde::{Deserialize, Serialize};

use crate::{Result, StatPropError};

/// Configuration for the propagation loop.
///
/// Every field is optional; the `effective_*` accessors supply defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct PropagationConfig {
    /// Minimum relative width reduction of a real variable that re-schedules
    /// its constraints. Default: 0.01.
    pub ratio: Option<f64>,
    /// Maximum number of propagator invocations per `propagate` call.
    /// Default: 100 000.
    pub max_steps: Option<usize>,
    /// Precision assigned to constants and to reals created without an
    /// explicit ε. Default: 1e-6.
    pub default_precision: Option<f64>,
}

impl PropagationConfig {
    /// Parse and validate a TOML document.
    ///
    /// ```
    /// use statprop_core::PropagationConfig;
    /// let cfg = PropagationConfig::from_toml_str("ratio = 0.05").unwrap();
    /// assert_eq!(cfg.effective_ratio(), 0.05);
    /// assert_eq!(cfg.effective_max_steps(), 100_000);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: PropagationConfig =
            toml::from_str(source).map_err(|e| StatPropError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every present field is in range.
    pub fn validate(&self) -> Result<()> {
        if let Some(r) = self.ratio {
            if !(0.0..1.0).contains(&r) {
                return Err(StatPropError::Config(format!(
                    "ratio must be in [0, 1), got {r}"
                )));
            }
        }
        if self.max_steps == Some(0) {
            return Err(StatPropError::Config("max_steps must be positive".into()));
        }
        if let Some(p) = self.default_precision {
            if !(p.is_finite() && p > 0.0) {
                return Err(StatPropError::Config(format!(
                    "default_precision must be positive and finite, got {p}"
                )));
            }
        }
        Ok(())
    }

    /// Returns the effective ratio, defaulting to 0.01.
    pub fn effective_ratio(&self) -> f64 {
        self.ratio.unwrap_or(0.01)
    }

    /// Returns the effective step cap, defaulting to 100 000.
    pub fn effective_max_steps(&self) -> usize {
        self.max_steps.unwrap_or(100_000)
    }

    /// Returns the effective default precision, defaulting to 1e-6.
    pub fn effective_default_precision(&self) -> f64 {
        self.default_precision.unwrap_or(1e-6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = PropagationConfig::default();
        assert_eq!(cfg.effective_ratio(), 0.01);
        assert_eq!(cfg.effective_max_steps(), 100_000);
        assert_eq!(cfg.effective_default_precision(), 1e-6);
    }

    #[test]
    fn parses_all_fields() {
        let cfg = PropagationConfig::from_toml_str(
            "ratio = 0.1\nmax_steps = 500\ndefault_precision = 1e-9\n",
        )
        .unwrap();
        assert_eq!(cfg.effective_ratio(), 0.1);
        assert_eq!(cfg.effective_max_steps(), 500);
        assert_eq!(cfg.effective_default_precision(), 1e-9);
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let err = PropagationConfig::from_toml_str("ratio = 1.5").unwrap_err();
        assert!(matches!(err, StatPropError::Config(_)));
    }

    #[test]
    fn rejects_non_positive_precision() {
        assert!(PropagationConfig::from_toml_str("default_precision = 0.0").is_err());
        assert!(PropagationConfig::from_toml_str("max_steps = 0").is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(PropagationConfig::from_toml_str("ratio = [").is_err());
    }
}
