// Copyright 2026 The Quiver Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use serde::Deserialize;

use quiver_core::common::{Error, ErrorCode, ErrorKind, Result};
use quiver_core::config_err;

pub const DEFAULT_STEP_SIZE: f64 = 0.01;
pub const DEFAULT_EPSILON: f64 = 0.00001;
pub const DEFAULT_BATCH_STEPS: usize = 2000;
pub const DEFAULT_MAX_BATCHES: usize = 64;
pub const DEFAULT_MERGE_TOLERANCE: f64 = 0.1;

/// Tuning knobs for relaxation and unification.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    /// Gradient descent step size used by every `relax` step.
    pub step_size: f64,
    /// `settle` stops once the total error is at or below this.
    pub epsilon: f64,
    /// Steps per `relax_and_sync` call made by `settle`.
    pub batch_steps: usize,
    /// Upper bound on `relax_and_sync` calls made by one `settle`.
    pub max_batches: usize,
    /// Distance under which two arrows count as coincident.
    pub merge_tolerance: f64,
    /// Share one pinned wire between constants of identical value.
    pub dedupe_constants: bool,
    /// Group coincident arrows by transitive closure instead of scan order.
    pub transitive_coincidences: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            step_size: DEFAULT_STEP_SIZE,
            epsilon: DEFAULT_EPSILON,
            batch_steps: DEFAULT_BATCH_STEPS,
            max_batches: DEFAULT_MAX_BATCHES,
            merge_tolerance: DEFAULT_MERGE_TOLERANCE,
            dedupe_constants: false,
            transitive_coincidences: false,
        }
    }
}

impl SolverConfig {
    pub fn from_json(contents: &str) -> Result<Self> {
        let config: SolverConfig = serde_json::from_str(contents).map_err(|err| {
            Error::new(
                ErrorKind::Config,
                ErrorCode::BadConfig,
                Some(err.to_string()),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step_size.is_finite() && self.step_size > 0.0) {
            return config_err!(format!(
                "step_size must be positive and finite, got {}",
                self.step_size
            ));
        }
        if !(self.epsilon.is_finite() && self.epsilon >= 0.0) {
            return config_err!(format!("epsilon must be non-negative, got {}", self.epsilon));
        }
        if self.batch_steps == 0 {
            return config_err!("batch_steps must be at least 1".to_string());
        }
        if !(self.merge_tolerance.is_finite() && self.merge_tolerance > 0.0) {
            return config_err!(format!(
                "merge_tolerance must be positive and finite, got {}",
                self.merge_tolerance
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_interactive_protocol() {
        let config = SolverConfig::default();
        assert_eq!(0.01, config.step_size);
        assert_eq!(1e-5, config.epsilon);
        assert_eq!(2000, config.batch_steps);
        assert!(!config.dedupe_constants);
        assert!(!config.transitive_coincidences);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SolverConfig::from_json(r#"{"step_size": 0.02, "dedupe_constants": true}"#)
            .unwrap();
        assert_eq!(0.02, config.step_size);
        assert!(config.dedupe_constants);
        assert_eq!(DEFAULT_BATCH_STEPS, config.batch_steps);
        assert_eq!(DEFAULT_MERGE_TOLERANCE, config.merge_tolerance);
    }

    #[test]
    fn rejects_bad_values() {
        let err = SolverConfig::from_json(r#"{"step_size": -1}"#).unwrap_err();
        assert_eq!(ErrorCode::BadConfig, err.code);
        assert_eq!(ErrorKind::Config, err.kind);

        let err = SolverConfig::from_json(r#"{"batch_steps": 0}"#).unwrap_err();
        assert_eq!(ErrorCode::BadConfig, err.code);

        let err = SolverConfig::from_json(r#"{"stepsize": 0.1}"#).unwrap_err();
        assert!(err.get_details().unwrap().contains("stepsize"));

        let err = SolverConfig::from_json("not json").unwrap_err();
        assert_eq!(ErrorCode::BadConfig, err.code);
    }
}
