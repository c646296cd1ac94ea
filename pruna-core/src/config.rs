//! Configuration for two-phase sparse search
//!
//! [`TwoPhaseConfig`] is the validated runtime form. [`TwoPhaseParameter`] is
//! the JSON form found under `two_phase_parameter` in a processor definition;
//! missing keys take the defaults below.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default fraction of the max query weight a term needs to stay high-impact
pub const DEFAULT_PRUNE_RATIO: f32 = 0.4;
/// Default multiplier from requested result count to rescore window
pub const DEFAULT_WINDOW_EXPANSION: f32 = 5.0;
/// Default upper bound on the rescore window
pub const DEFAULT_MAX_WINDOW_SIZE: usize = 10_000;
/// Smallest accepted `max_window_size`
pub const MIN_MAX_WINDOW_SIZE: usize = 50;

fn default_enabled() -> bool {
    true
}

fn default_prune_ratio() -> f32 {
    DEFAULT_PRUNE_RATIO
}

fn default_expansion_rate() -> f32 {
    DEFAULT_WINDOW_EXPANSION
}

fn default_max_window_size() -> i64 {
    DEFAULT_MAX_WINDOW_SIZE as i64
}

/// Validated two-phase settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoPhaseConfig {
    enabled: bool,
    prune_ratio: f32,
    window_expansion: f32,
    max_window_size: usize,
}

impl Default for TwoPhaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prune_ratio: DEFAULT_PRUNE_RATIO,
            window_expansion: DEFAULT_WINDOW_EXPANSION,
            max_window_size: DEFAULT_MAX_WINDOW_SIZE,
        }
    }
}

impl TwoPhaseConfig {
    pub fn new(
        enabled: bool,
        prune_ratio: f32,
        window_expansion: f32,
        max_window_size: usize,
    ) -> Result<Self> {
        if !prune_ratio.is_finite() || !(0.0..=1.0).contains(&prune_ratio) {
            return Err(Error::InvalidConfiguration(format!(
                "prune_ratio must be within [0, 1], got {}",
                prune_ratio
            )));
        }
        if !window_expansion.is_finite() || window_expansion < 1.0 {
            return Err(Error::InvalidConfiguration(format!(
                "expansion_rate must be a finite value >= 1.0, got {}",
                window_expansion
            )));
        }
        if max_window_size < MIN_MAX_WINDOW_SIZE {
            return Err(Error::InvalidConfiguration(format!(
                "max_window_size must be >= {}, got {}",
                MIN_MAX_WINDOW_SIZE, max_window_size
            )));
        }
        Ok(Self {
            enabled,
            prune_ratio,
            window_expansion,
            max_window_size,
        })
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn prune_ratio(&self) -> f32 {
        self.prune_ratio
    }

    pub fn window_expansion(&self) -> f32 {
        self.window_expansion
    }

    pub fn max_window_size(&self) -> usize {
        self.max_window_size
    }

    /// Whether the processor would leave every request untouched
    pub fn is_noop(&self) -> bool {
        !self.enabled || self.prune_ratio == 0.0
    }

    /// Build from the JSON form, validating every field
    pub fn from_parameter(enabled: bool, parameter: &TwoPhaseParameter) -> Result<Self> {
        let max_window_size = usize::try_from(parameter.max_window_size).map_err(|_| {
            Error::InvalidConfiguration(format!(
                "max_window_size must be >= {}, got {}",
                MIN_MAX_WINDOW_SIZE, parameter.max_window_size
            ))
        })?;
        Self::new(
            enabled,
            parameter.prune_ratio,
            parameter.expansion_rate,
            max_window_size,
        )
    }
}

/// JSON form of the two-phase tuning parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwoPhaseParameter {
    #[serde(default = "default_prune_ratio")]
    pub prune_ratio: f32,
    #[serde(default = "default_expansion_rate")]
    pub expansion_rate: f32,
    /// Signed; negative values are rejected by validation
    #[serde(default = "default_max_window_size")]
    pub max_window_size: i64,
}

impl Default for TwoPhaseParameter {
    fn default() -> Self {
        Self {
            prune_ratio: default_prune_ratio(),
            expansion_rate: default_expansion_rate(),
            max_window_size: default_max_window_size(),
        }
    }
}

/// JSON body of a `neural_sparse_two_phase_processor` definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwoPhaseProcessorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub ignore_failure: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub two_phase_parameter: TwoPhaseParameter,
}

impl TwoPhaseProcessorSpec {
    pub fn config(&self) -> Result<TwoPhaseConfig> {
        TwoPhaseConfig::from_parameter(self.enabled, &self.two_phase_parameter)
    }
}
