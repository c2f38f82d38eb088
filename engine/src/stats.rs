//! Streaming statistics.
//!
//! Every accumulator here uses Welford's update: `mean += (x - mean) / n` and
//! `m2 += (x - mean_old) * (x - mean_new)`, so the variance never comes from
//! subtracting two large sums.

use tracing::trace;

use crate::decode::DecodedPixel;

const HUE_PERIOD: f64 = 360.0;

/// Incremental mean and variance of a scalar series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStat {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStat {
    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Push a sample of an angular quantity. Deltas are taken along the
    /// shorter arc so that 359° and 1° average to 0°, not 180°.
    pub fn push_periodic(&mut self, x: f64, period: f64) {
        self.count += 1;
        let delta = wrap(x - self.mean, period);
        let mut mean = (self.mean + delta / self.count as f64).rem_euclid(period);
        if mean >= period {
            mean = 0.0;
        }
        self.mean = mean;
        self.m2 += delta * wrap(x - self.mean, period);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance (divides by n).
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.m2 / self.count as f64).max(0.0)
        }
    }

    /// Sample variance (divides by n - 1). Zero with fewer than two samples.
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).max(0.0)
        }
    }
}

/// Map a difference into [-period/2, period/2).
fn wrap(delta: f64, period: f64) -> f64 {
    let half = period / 2.0;
    (delta + half).rem_euclid(period) - half
}

/// Cross-frame accumulators for one colour metric (hue, saturation or brightness).
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricStatistics {
    /// Series of per-frame means.
    pub frame_mean: RunningStat,
    /// Series of per-frame (frame-internal) variances.
    pub frame_variance: RunningStat,
}

impl MetricStatistics {
    pub fn mean(&self) -> f64 {
        self.frame_mean.mean()
    }

    /// Average frame-internal variance.
    pub fn mean_variance(&self) -> f64 {
        self.frame_variance.mean()
    }

    /// How much the per-frame mean drifts between frames.
    pub fn variance_of_mean(&self) -> f64 {
        self.frame_mean.sample_variance()
    }

    /// How much the frame-internal variance changes between frames.
    pub fn variance_of_variance(&self) -> f64 {
        self.frame_variance.sample_variance()
    }
}

/// Scalars measured on a single frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameStatistics {
    /// Mean squared difference to the previous frame, in 8-bit levels.
    /// `None` for the first frame.
    pub interframe_variance: Option<f64>,
    pub pixel_mean: f64,
    pub pixel_variance: f64,
    pub hue_variance: f64,
    pub saturation_variance: f64,
    pub brightness_variance: f64,
}

/// Running state for the whole stream. Count only ever increases.
#[derive(Debug, Clone, Default)]
pub struct RunningStatistics {
    frames: u64,
    /// Previous frame's levels, one entry per pixel position.
    previous: Vec<[f32; 3]>,
    interframe: RunningStat,
    pixel_value: RunningStat,
    pixel_variance: RunningStat,
    channels: [RunningStat; 3],
    hue: MetricStatistics,
    saturation: MetricStatistics,
    brightness: MetricStatistics,
}

impl RunningStatistics {
    pub fn with_capacity(pixel_count: usize) -> Self {
        Self {
            previous: Vec::with_capacity(pixel_count),
            ..Self::default()
        }
    }

    /// Fold one frame into the running state in a single pass over its pixels.
    pub fn ingest<I>(&mut self, pixels: I) -> FrameStatistics
    where
        I: IntoIterator<Item = DecodedPixel>,
    {
        let mut value = RunningStat::default();
        let mut hue = RunningStat::default();
        let mut saturation = RunningStat::default();
        let mut brightness = RunningStat::default();
        let mut channel_sums = [0.0f64; 3];
        let mut squared_diff = 0.0f64;
        let mut compared = 0usize;

        for (index, pixel) in pixels.into_iter().enumerate() {
            let levels = pixel.levels();
            let current = levels.map(|l| l as f32);

            match self.previous.get_mut(index) {
                Some(prev) if self.frames > 0 => {
                    for c in 0..3 {
                        let d = current[c] as f64 - prev[c] as f64;
                        squared_diff += d * d;
                    }
                    compared += 1;
                    *prev = current;
                }
                Some(prev) => *prev = current,
                None => self.previous.push(current),
            }

            for (sum, level) in channel_sums.iter_mut().zip(levels) {
                *sum += level;
            }
            value.push((levels[0] + levels[1] + levels[2]) / 3.0);
            hue.push_periodic(pixel.hue, HUE_PERIOD);
            saturation.push(pixel.saturation);
            brightness.push(pixel.brightness);
        }

        let interframe_variance = (compared > 0).then(|| squared_diff / (compared * 3) as f64);
        if let Some(v) = interframe_variance {
            self.interframe.push(v);
        }

        let n = value.count().max(1) as f64;
        for (channel, sum) in self.channels.iter_mut().zip(channel_sums) {
            channel.push(sum / n);
        }
        self.pixel_value.push(value.mean());
        self.pixel_variance.push(value.variance());
        self.hue.frame_mean.push_periodic(hue.mean(), HUE_PERIOD);
        self.hue.frame_variance.push(hue.variance());
        self.saturation.frame_mean.push(saturation.mean());
        self.saturation.frame_variance.push(saturation.variance());
        self.brightness.frame_mean.push(brightness.mean());
        self.brightness.frame_variance.push(brightness.variance());
        self.frames += 1;

        let frame = FrameStatistics {
            interframe_variance,
            pixel_mean: value.mean(),
            pixel_variance: value.variance(),
            hue_variance: hue.variance(),
            saturation_variance: saturation.variance(),
            brightness_variance: brightness.variance(),
        };
        trace!(frame = self.frames, ?frame, "frame folded into running statistics");
        frame
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Mean of the per-frame interframe variances. Zero until two frames arrived.
    pub fn mean_interframe_variance(&self) -> f64 {
        self.interframe.mean()
    }

    /// Mean pixel value (average of R, G, B in 8-bit levels) over the stream.
    pub fn mean_pixel_value(&self) -> f64 {
        self.pixel_value.mean()
    }

    /// Average frame-internal variance of the pixel value.
    pub fn mean_frame_variance(&self) -> f64 {
        self.pixel_variance.mean()
    }

    /// Mean R, G, B levels over the stream.
    pub fn mean_color(&self) -> [f64; 3] {
        self.channels.map(|c| c.mean())
    }

    pub fn hue(&self) -> &MetricStatistics {
        &self.hue
    }

    pub fn saturation(&self) -> &MetricStatistics {
        &self.saturation
    }

    pub fn brightness(&self) -> &MetricStatistics {
        &self.brightness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(rgb: [u8; 3], n: usize) -> Vec<DecodedPixel> {
        vec![DecodedPixel::from_rgb8(rgb); n]
    }

    #[test]
    fn running_stat_matches_batch() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mut stat = RunningStat::default();
        for s in samples {
            stat.push(s);
        }
        assert_eq!(stat.count(), 8);
        assert!((stat.mean() - 5.0).abs() < 1e-12);
        assert!((stat.variance() - 4.0).abs() < 1e-12);
        assert!((stat.sample_variance() - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn running_stat_is_stable_with_large_offset() {
        let mut stat = RunningStat::default();
        for i in 0..10_000 {
            stat.push(1e9 + (i % 2) as f64);
        }
        assert!((stat.variance() - 0.25).abs() < 1e-6);
    }

    #[test]
    fn empty_and_single_sample_variances_are_zero() {
        let mut stat = RunningStat::default();
        assert_eq!(stat.variance(), 0.0);
        stat.push(3.0);
        assert_eq!(stat.variance(), 0.0);
        assert_eq!(stat.sample_variance(), 0.0);
    }

    #[test]
    fn periodic_mean_wraps_around_zero() {
        let mut stat = RunningStat::default();
        stat.push_periodic(359.0, 360.0);
        stat.push_periodic(1.0, 360.0);
        assert!(stat.mean() < 1e-9 || (360.0 - stat.mean()) < 1e-9);
        assert!((stat.variance() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn identical_frames_have_zero_interframe_variance() {
        let mut stats = RunningStatistics::default();
        let first = stats.ingest(flat([10, 200, 30], 16));
        assert_eq!(first.interframe_variance, None);
        for _ in 0..5 {
            let frame = stats.ingest(flat([10, 200, 30], 16));
            assert_eq!(frame.interframe_variance, Some(0.0));
        }
        assert_eq!(stats.frame_count(), 6);
        assert_eq!(stats.interframe.count(), 5);
        assert_eq!(stats.mean_interframe_variance(), 0.0);
    }

    #[test]
    fn interframe_variance_compares_with_previous_frame() {
        let mut stats = RunningStatistics::default();
        stats.ingest(flat([0, 0, 0], 4));
        stats.ingest(flat([255, 255, 255], 4));
        let third = stats.ingest(flat([255, 255, 255], 4));
        // Third frame equals its predecessor even though it differs from the running mean.
        assert_eq!(third.interframe_variance, Some(0.0));
        assert!((stats.mean_interframe_variance() - 65025.0 / 2.0).abs() < 1e-9);
    }

    #[test]
    fn frame_internal_variances() {
        let mut stats = RunningStatistics::default();
        let mut pixels = flat([0, 0, 0], 2);
        pixels.extend(flat([255, 255, 255], 2));
        let frame = stats.ingest(pixels);
        assert!((frame.brightness_variance - 0.25).abs() < 1e-12);
        assert_eq!(frame.saturation_variance, 0.0);
        assert_eq!(frame.hue_variance, 0.0);
        assert!((frame.pixel_mean - 127.5).abs() < 1e-9);
    }

    #[test]
    fn metric_statistics_track_drift_between_frames() {
        let mut stats = RunningStatistics::default();
        for i in 0..10 {
            let level = if i % 2 == 0 { 0 } else { 255 };
            stats.ingest(flat([level, level, level], 4));
        }
        let brightness = stats.brightness();
        assert_eq!(brightness.mean_variance(), 0.0);
        assert_eq!(brightness.variance_of_variance(), 0.0);
        assert!((brightness.mean() - 0.5).abs() < 1e-12);
        assert!((brightness.variance_of_mean() - 2.5 / 9.0).abs() < 1e-12);
        let [r, g, b] = stats.mean_color();
        assert!((r - 127.5).abs() < 1e-9 && (g - 127.5).abs() < 1e-9 && (b - 127.5).abs() < 1e-9);
    }
}
