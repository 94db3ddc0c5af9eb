//! Configuration for the radsim engine.
//!
//! Every tunable number the quiz depends on (angular tolerance, countdown
//! budget, restore delay, placement boundary) lives here rather than as a
//! literal in the logic. Exercises may override some of them individually.

use std::path::Path;

use radsim_report::ReportFormat;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::geometry::Boundary;

/// The default config file name.
const CONFIG_FILE_NAME: &str = "radsim.json";

/// Default rotation tolerance in radians.
pub const DEFAULT_ROTATION_EPSILON: f64 = 0.01;

/// Default per-exercise countdown in seconds.
pub const DEFAULT_TIME_BUDGET_SECS: u32 = 60;

/// Default delay before the instruction text is restored after a miss.
pub const DEFAULT_RESTORE_DELAY_MS: u64 = 2000;

/// Default camera distance from the target along +Z.
pub const DEFAULT_CAMERA_DISTANCE: f64 = 60.0;

const fn default_rotation_epsilon() -> f64 {
    DEFAULT_ROTATION_EPSILON
}

const fn default_time_budget() -> u32 {
    DEFAULT_TIME_BUDGET_SECS
}

const fn default_restore_delay() -> u64 {
    DEFAULT_RESTORE_DELAY_MS
}

const fn default_camera_distance() -> f64 {
    DEFAULT_CAMERA_DISTANCE
}

#[allow(clippy::unnecessary_wraps)]
fn default_backdrop_model() -> Option<String> {
    Some("/models/xray.glb".to_string())
}

fn default_output_dir() -> String {
    ".".to_string()
}

fn default_report_formats() -> Vec<ReportFormat> {
    vec![ReportFormat::Json, ReportFormat::Markdown]
}

/// Main configuration for a quiz session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Rotation tolerance in radians, per axis.
    #[serde(default = "default_rotation_epsilon")]
    pub rotation_epsilon: f64,

    /// Countdown budget for each exercise in seconds.
    #[serde(default = "default_time_budget")]
    pub time_budget_secs: u32,

    /// Delay before the instruction text replaces a failure message.
    #[serde(default = "default_restore_delay")]
    pub restore_delay_ms: u64,

    /// Cuboid that dragged positions are clamped into.
    #[serde(default)]
    pub boundary: Boundary,

    /// Backdrop prop loaded behind every exercise model.
    #[serde(default = "default_backdrop_model")]
    pub backdrop_model: Option<String>,

    /// Camera distance from the exercise target along +Z.
    #[serde(default = "default_camera_distance")]
    pub camera_distance: f64,

    /// Output directory for generated reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Report formats written on export.
    #[serde(default = "default_report_formats")]
    pub report_formats: Vec<ReportFormat>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rotation_epsilon: default_rotation_epsilon(),
            time_budget_secs: default_time_budget(),
            restore_delay_ms: default_restore_delay(),
            boundary: Boundary::default(),
            backdrop_model: default_backdrop_model(),
            camera_distance: default_camera_distance(),
            output_dir: default_output_dir(),
            report_formats: default_report_formats(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `radsim.json`; falls back to defaults when it is absent.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            SimError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `radsim.json` in the given directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns the default configuration.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ConfigParseError` if the file exists but is not
    /// valid JSON, and `SimError::ConfigValidationError` if a value is out
    /// of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(SimError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| SimError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<()> {
        if !(self.rotation_epsilon.is_finite() && self.rotation_epsilon > 0.0) {
            return Err(SimError::config_validation(
                "rotationEpsilon must be a positive number",
                "Set rotationEpsilon to a small positive value such as 0.01 in your radsim.json",
            ));
        }

        if self.time_budget_secs == 0 {
            return Err(SimError::config_validation(
                "timeBudgetSecs must be greater than 0",
                "Set timeBudgetSecs to at least 1 second in your radsim.json",
            ));
        }

        if self.restore_delay_ms == 0 {
            return Err(SimError::config_validation(
                "restoreDelayMs must be greater than 0",
                "Set restoreDelayMs to at least 1 millisecond in your radsim.json",
            ));
        }

        if !(self.boundary.min.is_finite()
            && self.boundary.max.is_finite()
            && self.boundary.min < self.boundary.max)
        {
            return Err(SimError::config_validation(
                format!(
                    "boundary min ({}) must be below max ({})",
                    self.boundary.min, self.boundary.max
                ),
                "Use a boundary such as {\"min\": -10, \"max\": 10} in your radsim.json",
            ));
        }

        if !(self.camera_distance.is_finite() && self.camera_distance > 0.0) {
            return Err(SimError::config_validation(
                "cameraDistance must be a positive number",
                "Set cameraDistance to a positive value such as 60 in your radsim.json",
            ));
        }

        if self.output_dir.trim().is_empty() {
            return Err(SimError::config_validation(
                "outputDir must not be empty",
                "Provide a valid output directory path in your radsim.json (use '.' for current directory)",
            ));
        }

        Ok(())
    }
}
