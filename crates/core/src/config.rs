use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Engine tuning knobs. Hosts load these from JSON; every field has a
/// default so a partial (or empty) object is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backing-surface multiplier for scrolling containers. The extra
    /// `(factor - 1) * parent_height` is split evenly above and below the
    /// visible region.
    pub overdraw_factor: f64,
    /// Narrowest width, in CSS pixels, any data element is drawn with.
    pub min_rendered_width_px: f64,
    /// Quiet period before a changed area selection is broadcast.
    pub selection_debounce_ms: f64,
    /// Minimum spacing between visible-window broadcasts.
    pub visible_window_rate_limit_ms: f64,
    /// Width of the track-name column left of the timeline area.
    pub track_shell_width: f64,
    /// Collect per-phase and per-panel timing statistics.
    pub perf_debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            overdraw_factor: 1.2,
            min_rendered_width_px: 1.0,
            selection_debounce_ms: 100.0,
            visible_window_rate_limit_ms: 50.0,
            track_shell_width: 0.0,
            perf_debug: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.overdraw_factor.is_nan() || self.overdraw_factor < 1.0 {
            return Err(EngineError::InvalidConfig(format!(
                "overdraw_factor must be >= 1, got {}",
                self.overdraw_factor
            )));
        }
        if self.min_rendered_width_px < 0.0 {
            return Err(EngineError::InvalidConfig(
                "min_rendered_width_px must not be negative".into(),
            ));
        }
        if self.selection_debounce_ms < 0.0 || self.visible_window_rate_limit_ms < 0.0 {
            return Err(EngineError::InvalidConfig(
                "timer intervals must not be negative".into(),
            ));
        }
        Ok(())
    }
}
