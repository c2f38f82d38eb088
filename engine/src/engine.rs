use std::io::Write;
use std::path::Path;

use tracing::{debug, info, warn};
use video_check_common::config::{AnalysisConfig, AnalysisFormat, Thresholds};
use video_check_common::frame::{FrameDescriptor, FrameError, PixelFormat, RawFrame};

use crate::aggregate::{AggregateImage, AggregateView};
use crate::classify::classify;
use crate::controller::{Gate, StreamController, StreamState};
use crate::decode::PixelDecoder;
use crate::error::{Result, VideoCheckError};
use crate::report::{render, AnalysisReport, ColorSummary, MetricSummary};
use crate::stats::{MetricStatistics, RunningStatistics};

/// What happened to a frame handed to [`VideoCheck::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Arrived during the lead-in window. The buffer is checked against the
    /// stream's format and layout, which is everything decoding it could
    /// reject, and its pixels are never read.
    LeadIn,
    /// Folded into the statistics and the aggregate image.
    Analyzed,
    /// The stream is finished; the frame was not looked at.
    Ignored,
    /// The buffer did not match the stream's layout.
    Dropped,
}

/// Accumulators, allocated when the first frame reaches the active state.
#[derive(Debug)]
struct Analysis {
    descriptor: FrameDescriptor,
    stats: RunningStatistics,
    aggregate: AggregateImage,
}

impl Analysis {
    fn new(descriptor: FrameDescriptor) -> Self {
        Self {
            descriptor,
            stats: RunningStatistics::with_capacity(descriptor.pixel_count()),
            aggregate: AggregateImage::new(descriptor.width, descriptor.height),
        }
    }
}

/// Streaming frame analyzer bound to a single pixel format.
///
/// Frames are pushed one at a time in arrival order. Once the stream has
/// ended (or single-frame mode captured its frame) the engine is read-only
/// and can be summarized.
#[derive(Debug)]
pub struct VideoCheck {
    decoder: PixelDecoder,
    config: AnalysisConfig,
    controller: StreamController,
    analysis: Option<Analysis>,
    lead_in_frames: u64,
    dropped_frames: u64,
    ignored_frames: u64,
}

impl VideoCheck {
    /// Build an engine for a raw pixel format tag.
    pub fn for_pixel_format(fourcc: u32, config: AnalysisConfig) -> Result<Self> {
        let format = PixelFormat::from_fourcc(fourcc)
            .ok_or(VideoCheckError::UnsupportedPixelFormat { fourcc })?;
        Ok(Self::new(format, config))
    }

    pub fn new(format: PixelFormat, config: AnalysisConfig) -> Self {
        info!(
            pixel_format = %format.tag(),
            description = format.description(),
            lead_in_time = config.lead_in_time,
            single_frame_only = config.single_frame_only,
            "video check engine configured"
        );
        Self {
            decoder: PixelDecoder::new(format),
            controller: StreamController::new(config.lead_in_time, config.single_frame_only),
            config,
            analysis: None,
            lead_in_frames: 0,
            dropped_frames: 0,
            ignored_frames: 0,
        }
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.decoder.format()
    }

    pub fn pixel_format_description(&self) -> &'static str {
        self.decoder.format().description()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.config.thresholds
    }

    pub fn state(&self) -> StreamState {
        self.controller.state()
    }

    pub fn is_finished(&self) -> bool {
        self.controller.is_finished()
    }

    /// Frames folded into the statistics.
    pub fn frame_count(&self) -> u64 {
        self.analysis.as_ref().map_or(0, |a| a.stats.frame_count())
    }

    pub fn lead_in_frames(&self) -> u64 {
        self.lead_in_frames
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }

    pub fn ignored_frames(&self) -> u64 {
        self.ignored_frames
    }

    /// Zero until the first frame has been analyzed.
    pub fn aggregate_image_width(&self) -> u32 {
        self.analysis.as_ref().map_or(0, |a| a.aggregate.width())
    }

    pub fn aggregate_image_height(&self) -> u32 {
        self.analysis.as_ref().map_or(0, |a| a.aggregate.height())
    }

    /// Push one frame. Malformed frames are counted and dropped; they never
    /// stop the stream.
    pub fn ingest(&mut self, frame: &RawFrame) -> FrameOutcome {
        if self.controller.is_finished() {
            self.ignored_frames += 1;
            return FrameOutcome::Ignored;
        }

        if let Err(error) = self.check_layout(frame) {
            self.dropped_frames += 1;
            warn!(
                seq = frame.seq,
                ts = frame.captured_at_ms,
                dropped = self.dropped_frames,
                %error,
                "malformed frame dropped"
            );
            return FrameOutcome::Dropped;
        }

        match self.controller.admit(frame.captured_at_ms) {
            Gate::LeadIn => {
                self.lead_in_frames += 1;
                FrameOutcome::LeadIn
            }
            Gate::Ignore => {
                self.ignored_frames += 1;
                FrameOutcome::Ignored
            }
            Gate::Forward => self.analyze(frame),
        }
    }

    fn check_layout(&self, frame: &RawFrame) -> Result<(), FrameError> {
        if let Some(analysis) = &self.analysis {
            let expected = analysis.descriptor;
            if (expected.width, expected.height) != (frame.descriptor.width, frame.descriptor.height) {
                return Err(FrameError::DimensionsChanged {
                    width: expected.width,
                    height: expected.height,
                    got_width: frame.descriptor.width,
                    got_height: frame.descriptor.height,
                });
            }
        }
        self.decoder.validate(&frame.descriptor, &frame.data)
    }

    fn analyze(&mut self, frame: &RawFrame) -> FrameOutcome {
        let pixels = match self.decoder.decode(&frame.descriptor, &frame.data) {
            Ok(pixels) => pixels,
            Err(error) => {
                self.dropped_frames += 1;
                warn!(seq = frame.seq, %error, "frame failed to decode, dropped");
                return FrameOutcome::Dropped;
            }
        };

        let analysis = self
            .analysis
            .get_or_insert_with(|| Analysis::new(frame.descriptor));
        let aggregate = &mut analysis.aggregate;
        aggregate.begin_frame();
        let measured = analysis.stats.ingest(pixels.enumerate().map(|(index, pixel)| {
            aggregate.accumulate(index, &pixel);
            pixel
        }));

        debug!(
            frame = analysis.stats.frame_count(),
            seq = frame.seq,
            interframe_variance = measured.interframe_variance,
            pixel_mean = measured.pixel_mean,
            hue_variance = measured.hue_variance,
            saturation_variance = measured.saturation_variance,
            brightness_variance = measured.brightness_variance,
            "frame analyzed"
        );

        self.controller.frame_analyzed();
        FrameOutcome::Analyzed
    }

    /// The producer has no more frames. The engine becomes read-only.
    pub fn end_of_stream(&mut self) {
        self.controller.end_of_stream();
        info!(
            frames = self.frame_count(),
            lead_in = self.lead_in_frames,
            dropped = self.dropped_frames,
            ignored = self.ignored_frames,
            "stream finished"
        );
    }

    fn analysis(&self) -> Result<&Analysis> {
        self.analysis
            .as_ref()
            .filter(|a| a.stats.frame_count() > 0)
            .ok_or(VideoCheckError::InsufficientData)
    }

    /// Snapshot of the statistics gathered so far.
    pub fn report(&self) -> Result<AnalysisReport> {
        let analysis = self.analysis()?;
        let stats = &analysis.stats;
        let thresholds = self.config.thresholds;
        let verdict = classify(stats, &thresholds);
        let [red, green, blue] = stats.mean_color();
        let format = self.pixel_format();

        Ok(AnalysisReport {
            generated_at: chrono::Utc::now(),
            pixel_format: format.tag(),
            pixel_format_description: format.description().to_string(),
            width: analysis.descriptor.width,
            height: analysis.descriptor.height,
            frame_count: stats.frame_count(),
            lead_in_frames: self.lead_in_frames,
            dropped_frames: self.dropped_frames,
            mean_pixel_value: stats.mean_pixel_value(),
            mean_color: ColorSummary { red, green, blue },
            mean_frame_variance: stats.mean_frame_variance(),
            mean_interframe_variance: stats.mean_interframe_variance(),
            motion_rms: verdict.motion_rms,
            motion_detected: verdict.motion_detected,
            single_color: verdict.single_color,
            hue: summarize_metric(stats.hue()),
            saturation: summarize_metric(stats.saturation()),
            brightness: summarize_metric(stats.brightness()),
            thresholds,
        })
    }

    pub fn render_report(&self, format: AnalysisFormat) -> Result<Vec<u8>> {
        render(&self.report()?, format)
    }

    /// Running mean of every pixel position as RGB8.
    pub fn aggregate_image(&self) -> Result<AggregateView> {
        Ok(self.analysis()?.aggregate.mean_view())
    }

    /// Per-position standard deviation as RGB8.
    pub fn aggregate_variance_image(&self) -> Result<AggregateView> {
        Ok(self.analysis()?.aggregate.variance_view())
    }

    pub fn save_aggregate_image(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.aggregate_image()?
            .save(path)
            .map_err(|e| VideoCheckError::io(path.display().to_string(), e))?;
        info!(path = %path.display(), "aggregate image saved");
        Ok(())
    }

    pub fn save_aggregate_variance_image(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.aggregate_variance_image()?
            .save(path)
            .map_err(|e| VideoCheckError::io(path.display().to_string(), e))?;
        info!(path = %path.display(), "aggregate variance image saved");
        Ok(())
    }

    /// Write the report in the configured format to `out`, then save the
    /// aggregate images to their configured paths, if any.
    pub fn summarize_analysis<W: Write>(&self, out: &mut W) -> Result<()> {
        let bytes = self.render_report(self.config.format)?;
        out.write_all(&bytes)
            .and_then(|()| out.flush())
            .map_err(|e| VideoCheckError::io("analysis report", e))?;

        if let Some(path) = &self.config.aggregate_image_path {
            self.save_aggregate_image(path)?;
        }
        if let Some(path) = &self.config.aggregate_image_variance_path {
            self.save_aggregate_variance_image(path)?;
        }
        Ok(())
    }
}

fn summarize_metric(metric: &MetricStatistics) -> MetricSummary {
    MetricSummary {
        mean: metric.mean(),
        mean_variance: metric.mean_variance(),
        variance_of_mean: metric.variance_of_mean(),
        variance_of_variance: metric.variance_of_variance(),
    }
}
