//! Fusion tunables, stored in TOML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;
use crate::core::model::EngineId;

/// Axis along which a multi-character run is split into per-character boxes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunLayout {
    /// Uniform-width slots, left to right.
    #[default]
    Horizontal,
    /// Uniform-height slots, top to bottom.
    Vertical,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FusionConfig {
    /// Fraction of the smaller height two boxes must share to sit on one line.
    pub line_overlap_threshold: f64,
    /// Gaps below this many character heights are soft-wrap continuations.
    pub small_gap_ratio: f64,
    /// Gaps above this many character heights start a new paragraph.
    pub large_gap_ratio: f64,
    /// Confidence differences at or below this are ties.
    pub tie_epsilon: f64,
    /// Winner when a tie survives the oracle.
    pub preferred_engine: EngineId,
    pub line_gap_penalty: f64,
    pub char_gap_penalty: f64,
    /// Substitution cost floor for two characters with different symbols.
    pub symbol_mismatch_penalty: f64,
    pub run_layout: RunLayout,
    pub include_debug: bool,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            line_overlap_threshold: 0.5,
            small_gap_ratio: 0.3,
            large_gap_ratio: 1.5,
            tie_epsilon: 0.05,
            preferred_engine: EngineId::A,
            line_gap_penalty: 0.45,
            char_gap_penalty: 0.45,
            symbol_mismatch_penalty: 0.5,
            run_layout: RunLayout::Horizontal,
            include_debug: false,
        }
    }
}

impl FusionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("line_overlap_threshold", self.line_overlap_threshold, 0.0, 1.0)?;
        check_range("tie_epsilon", self.tie_epsilon, 0.0, 1.0)?;
        check_range("symbol_mismatch_penalty", self.symbol_mismatch_penalty, 0.0, 1.0)?;
        check_range("small_gap_ratio", self.small_gap_ratio, 0.0, f64::MAX)?;
        check_range("large_gap_ratio", self.large_gap_ratio, 0.0, f64::MAX)?;
        if self.small_gap_ratio > self.large_gap_ratio {
            return Err(ConfigError::Invalid {
                field: "small_gap_ratio",
                reason: format!(
                    "{} exceeds large_gap_ratio {}",
                    self.small_gap_ratio, self.large_gap_ratio
                ),
            });
        }
        check_penalty("line_gap_penalty", self.line_gap_penalty)?;
        check_penalty("char_gap_penalty", self.char_gap_penalty)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} is outside [{min}, {max}]"),
        })
    }
}

fn check_penalty(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            field,
            reason: format!("{value} must be a positive finite cost"),
        })
    }
}
