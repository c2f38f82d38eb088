//! Analysis summary and its serializations.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use video_check_common::config::{AnalysisFormat, Thresholds};

use crate::error::{Result, VideoCheckError};

const XML_ROOT: &str = "video-check";
const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Final snapshot of a stream's statistics.
///
/// XML and JSON carry the same field set; both parse back into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub pixel_format: String,
    pub pixel_format_description: String,
    pub width: u32,
    pub height: u32,
    /// Frames folded into the statistics.
    pub frame_count: u64,
    pub lead_in_frames: u64,
    pub dropped_frames: u64,
    /// Average of R, G, B in 8-bit levels.
    pub mean_pixel_value: f64,
    pub mean_color: ColorSummary,
    /// Average frame-internal variance of the pixel value.
    pub mean_frame_variance: f64,
    pub mean_interframe_variance: f64,
    pub motion_rms: f64,
    pub motion_detected: bool,
    pub single_color: bool,
    pub hue: MetricSummary,
    pub saturation: MetricSummary,
    pub brightness: MetricSummary,
    pub thresholds: Thresholds,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSummary {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

/// Cross-frame view of one colour metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    /// Average frame-internal variance.
    pub mean_variance: f64,
    /// Cross-frame variance of the per-frame mean.
    pub variance_of_mean: f64,
    /// Cross-frame variance of the frame-internal variance.
    pub variance_of_variance: f64,
}

impl AnalysisReport {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| VideoCheckError::Parse {
            format: "json",
            message: e.to_string(),
        })
    }

    pub fn from_xml(text: &str) -> Result<Self> {
        quick_xml::de::from_str(text).map_err(|e| VideoCheckError::Parse {
            format: "xml",
            message: e.to_string(),
        })
    }
}

/// Render `report` in `format`. [`AnalysisFormat::None`] yields no bytes.
pub fn render(report: &AnalysisReport, format: AnalysisFormat) -> Result<Vec<u8>> {
    match format {
        AnalysisFormat::None => Ok(Vec::new()),
        AnalysisFormat::Quick => Ok(render_quick(report).into_bytes()),
        AnalysisFormat::Default => Ok(report.to_string().into_bytes()),
        AnalysisFormat::Json => {
            let mut bytes = serde_json::to_vec_pretty(report).map_err(|e| VideoCheckError::Render {
                format: "json",
                message: e.to_string(),
            })?;
            bytes.push(b'\n');
            Ok(bytes)
        }
        AnalysisFormat::Xml => {
            let body = quick_xml::se::to_string_with_root(XML_ROOT, report).map_err(|e| {
                VideoCheckError::Render {
                    format: "xml",
                    message: e.to_string(),
                }
            })?;
            Ok(format!("{XML_DECLARATION}{body}\n").into_bytes())
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn render_quick(r: &AnalysisReport) -> String {
    format!(
        "frames={} motion={} rms={:.4} single-color={} hue={:.4} saturation={:.6} brightness={:.6}\n",
        r.frame_count,
        yes_no(r.motion_detected),
        r.motion_rms,
        yes_no(r.single_color),
        r.hue.variance_of_variance,
        r.saturation.variance_of_variance,
        r.brightness.variance_of_variance,
    )
}

/// Default multi-line text form.
impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.thresholds;
        writeln!(f, "Video check summary ({})", self.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true))?;
        writeln!(f, "  pixel format:              {} ({})", self.pixel_format, self.pixel_format_description)?;
        writeln!(f, "  frame size:                {} x {}", self.width, self.height)?;
        writeln!(f, "  frames analyzed:           {}", self.frame_count)?;
        writeln!(f, "  frames skipped (lead-in):  {}", self.lead_in_frames)?;
        writeln!(f, "  frames dropped:            {}", self.dropped_frames)?;
        writeln!(
            f,
            "  mean color (R, G, B):      {:.3}, {:.3}, {:.3}",
            self.mean_color.red, self.mean_color.green, self.mean_color.blue
        )?;
        writeln!(f, "  mean pixel value:          {:.3}", self.mean_pixel_value)?;
        writeln!(f, "  mean frame variance:       {:.3}", self.mean_frame_variance)?;
        writeln!(f, "  mean interframe variance:  {:.3}", self.mean_interframe_variance)?;
        writeln!(
            f,
            "  motion:                    {} (rms {:.4}, threshold {})",
            yes_no(self.motion_detected),
            self.motion_rms,
            t.motion_threshold
        )?;
        for (name, metric, threshold) in [
            ("hue", &self.hue, t.single_color_threshold),
            ("saturation", &self.saturation, t.saturation_threshold),
            ("brightness", &self.brightness, t.brightness_threshold),
        ] {
            writeln!(
                f,
                "  {name:<11} mean {:.4}  variance {:.6}  variance of mean {:.6}  variance of variance {:.6}  (threshold {threshold})",
                metric.mean, metric.mean_variance, metric.variance_of_mean, metric.variance_of_variance
            )?;
        }
        writeln!(f, "  single color:              {}", yes_no(self.single_color))
    }
}
