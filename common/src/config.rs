use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine settings. Fixed before the first frame and never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub single_frame_only: bool,
    /// Seconds, measured from the first frame's timestamp.
    #[serde(default)]
    pub lead_in_time: f64,
    #[serde(flatten)]
    pub thresholds: Thresholds,
    #[serde(default)]
    pub format: AnalysisFormat,
    #[serde(default)]
    pub aggregate_image_path: Option<PathBuf>,
    #[serde(default)]
    pub aggregate_image_variance_path: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            single_frame_only: false,
            lead_in_time: 0.0,
            thresholds: Thresholds::default(),
            format: AnalysisFormat::default(),
            aggregate_image_path: None,
            aggregate_image_variance_path: None,
        }
    }
}

/// Classification thresholds. Serialized into every report so it is self-describing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f64,
    #[serde(default = "default_single_color_threshold")]
    pub single_color_threshold: f64,
    #[serde(default = "default_saturation_threshold")]
    pub saturation_threshold: f64,
    #[serde(default = "default_brightness_threshold")]
    pub brightness_threshold: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            motion_threshold: default_motion_threshold(),
            single_color_threshold: default_single_color_threshold(),
            saturation_threshold: default_saturation_threshold(),
            brightness_threshold: default_brightness_threshold(),
        }
    }
}

/// Output format of the analysis summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisFormat {
    /// Multi-line human readable text.
    #[default]
    Default,
    Xml,
    Json,
    /// Single condensed line.
    Quick,
    /// Nothing at all; useful when only the aggregate image matters.
    None,
}

impl FromStr for AnalysisFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" | "text" => Ok(Self::Default),
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            "quick" => Ok(Self::Quick),
            "none" => Ok(Self::None),
            other => Err(ConfigError::UnknownFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Four-character code ("BGRA", "420v") or a numeric pixel format tag.
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,
    pub width: u32,
    pub height: u32,
    /// Defaults to the tight stride for the pixel format.
    #[serde(default)]
    pub bytes_per_row: Option<u32>,
    #[serde(default = "default_fps")]
    pub fps: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        if config.analysis.lead_in_time < 0.0 || !config.analysis.lead_in_time.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "lead_in_time must be a non-negative number of seconds, got {}",
                config.analysis.lead_in_time
            )));
        }
        if config.source.fps <= 0.0 || !config.source.fps.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "source fps must be positive, got {}",
                config.source.fps
            )));
        }
        Ok(config)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("unknown analysis format {0:?}, expected default, xml, json, quick or none")]
    UnknownFormat(String),
}

// Default value functions
fn default_motion_threshold() -> f64 {
    5.0
}
fn default_single_color_threshold() -> f64 {
    15.0
}
fn default_saturation_threshold() -> f64 {
    0.075
}
fn default_brightness_threshold() -> f64 {
    0.25
}
fn default_pixel_format() -> String {
    "BGRA".into()
}
fn default_fps() -> f64 {
    30.0
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = Config::parse(
            r#"
            [source]
            path = "frames.raw"
            width = 4
            height = 2
            "#,
        )
        .unwrap();
        assert!(!config.analysis.single_frame_only);
        assert_eq!(config.analysis.lead_in_time, 0.0);
        assert_eq!(config.analysis.thresholds, Thresholds::default());
        assert_eq!(config.analysis.format, AnalysisFormat::Default);
        assert_eq!(config.source.pixel_format, "BGRA");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn analysis_section_overrides() {
        let config = Config::parse(
            r#"
            [analysis]
            single_frame_only = true
            lead_in_time = 1.5
            motion_threshold = 2.0
            format = "json"
            aggregate_image_path = "mean.png"

            [source]
            path = "frames.raw"
            pixel_format = "420v"
            width = 640
            height = 480
            fps = 25.0
            "#,
        )
        .unwrap();
        assert!(config.analysis.single_frame_only);
        assert_eq!(config.analysis.lead_in_time, 1.5);
        assert_eq!(config.analysis.thresholds.motion_threshold, 2.0);
        assert_eq!(config.analysis.thresholds.brightness_threshold, 0.25);
        assert_eq!(config.analysis.format, AnalysisFormat::Json);
        assert_eq!(
            config.analysis.aggregate_image_path.as_deref(),
            Some(Path::new("mean.png"))
        );
        assert!(config.analysis.aggregate_image_variance_path.is_none());
    }

    #[test]
    fn negative_lead_in_rejected() {
        let result = Config::parse(
            r#"
            [analysis]
            lead_in_time = -1.0
            [source]
            path = "frames.raw"
            width = 4
            height = 2
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn format_from_str() {
        assert_eq!("XML".parse::<AnalysisFormat>().unwrap(), AnalysisFormat::Xml);
        assert_eq!("quick".parse::<AnalysisFormat>().unwrap(), AnalysisFormat::Quick);
        assert!("yaml".parse::<AnalysisFormat>().is_err());
    }
}
