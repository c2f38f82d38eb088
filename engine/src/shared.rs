use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use video_check_common::config::AnalysisFormat;
use video_check_common::frame::RawFrame;

use crate::engine::{FrameOutcome, VideoCheck};
use crate::error::Result;
use crate::report::AnalysisReport;

/// Cloneable handle to one engine shared between a frame-delivery task and a
/// reporting task.
///
/// Every call holds the lock for its whole duration, so a report never sees
/// a frame half folded into the accumulators.
#[derive(Debug, Clone)]
pub struct SharedVideoCheck {
    inner: Arc<Mutex<VideoCheck>>,
}

impl SharedVideoCheck {
    pub fn new(engine: VideoCheck) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VideoCheck> {
        // A panic mid-ingest leaves at worst one partially folded frame;
        // the statistics are still readable.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn ingest(&self, frame: &RawFrame) -> FrameOutcome {
        self.lock().ingest(frame)
    }

    pub fn end_of_stream(&self) {
        self.lock().end_of_stream();
    }

    pub fn is_finished(&self) -> bool {
        self.lock().is_finished()
    }

    pub fn frame_count(&self) -> u64 {
        self.lock().frame_count()
    }

    pub fn report(&self) -> Result<AnalysisReport> {
        self.lock().report()
    }

    pub fn render_report(&self, format: AnalysisFormat) -> Result<Vec<u8>> {
        self.lock().render_report(format)
    }

    pub fn summarize_analysis<W: Write>(&self, out: &mut W) -> Result<()> {
        self.lock().summarize_analysis(out)
    }

    /// Run `f` with exclusive read access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&VideoCheck) -> R) -> R {
        f(&self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use video_check_common::config::AnalysisConfig;
    use video_check_common::frame::{FrameDescriptor, PixelFormat};

    #[test]
    fn concurrent_reports_see_whole_frames() {
        let shared = SharedVideoCheck::new(VideoCheck::new(
            PixelFormat::Rgb24,
            AnalysisConfig::default(),
        ));
        let desc = FrameDescriptor::packed(PixelFormat::Rgb24, 8, 8);

        let producer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for seq in 0..200u64 {
                    let level = if seq % 2 == 0 { 0 } else { 255 };
                    let frame = RawFrame::new(desc, vec![level; 192], seq as i64 * 33, seq);
                    shared.ingest(&frame);
                }
                shared.end_of_stream();
            })
        };

        while !shared.is_finished() {
            if let Ok(report) = shared.report() {
                // Every frame is flat, so a torn read would show up as a
                // non-zero frame-internal variance.
                assert_eq!(report.mean_frame_variance, 0.0);
            }
        }
        producer.join().unwrap();
        assert_eq!(shared.frame_count(), 200);
        assert!(shared.with(|engine| engine.report()).unwrap().motion_detected);
    }
}
