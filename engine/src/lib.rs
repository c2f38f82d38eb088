//! Streaming statistics for raw camera frames.
//!
//! Frames are pushed into a [`VideoCheck`] one at a time. Each frame is decoded,
//! folded into running mean/variance accumulators and into a per-pixel
//! aggregate image, so memory stays proportional to one frame no matter how
//! long the stream runs. When the stream ends the engine classifies the
//! stream (motion, single colour) and renders a report.

pub mod aggregate;
pub mod classify;
pub mod controller;
pub mod decode;
pub mod engine;
pub mod error;
pub mod report;
pub mod shared;
pub mod stats;

pub use aggregate::AggregateView;
pub use controller::StreamState;
pub use engine::{FrameOutcome, VideoCheck};
pub use error::{Result, VideoCheckError};
pub use report::AnalysisReport;
pub use shared::SharedVideoCheck;
