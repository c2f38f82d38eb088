use video_check_common::config::Thresholds;

use crate::stats::{MetricStatistics, RunningStatistics};

/// Boolean verdicts derived from the accumulated statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Square root of the mean interframe variance, in 8-bit levels.
    pub motion_rms: f64,
    pub motion_detected: bool,
    pub single_color: bool,
}

/// Read-only evaluation of `stats` against `thresholds`.
///
/// Every comparison is strict: a value sitting exactly on its threshold
/// neither flags motion nor counts as narrow.
pub fn classify(stats: &RunningStatistics, thresholds: &Thresholds) -> Classification {
    let motion_rms = stats.mean_interframe_variance().max(0.0).sqrt();
    let motion_detected = motion_rms > thresholds.motion_threshold;

    let single_color = is_narrow(stats.hue(), thresholds.single_color_threshold)
        && is_narrow(stats.saturation(), thresholds.saturation_threshold)
        && is_narrow(stats.brightness(), thresholds.brightness_threshold);

    Classification {
        motion_rms,
        motion_detected,
        single_color,
    }
}

/// A metric is narrow when every frame is internally flat, the flatness is
/// consistent between frames, and the level itself does not drift.
fn is_narrow(metric: &MetricStatistics, threshold: f64) -> bool {
    metric.variance_of_variance() < threshold
        && metric.mean_variance() < threshold
        && metric.variance_of_mean() < threshold
}
