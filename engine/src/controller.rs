use tracing::{debug, info};

/// Where the stream currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Waiting for the capture hardware to settle. `started_at_ms` is the
    /// timestamp of the first frame, once one has arrived.
    LeadIn { started_at_ms: Option<i64> },
    /// Frames are analyzed.
    Active,
    /// Single-frame mode captured its frame. Everything after is ignored.
    Terminated,
    /// The producer signalled end of stream.
    Draining,
}

/// What to do with an arriving frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Validate only, keep out of every accumulator.
    LeadIn,
    /// Analyze.
    Forward,
    /// The stream is finished; drop silently.
    Ignore,
}

/// Lead-in and single-frame gating in front of the accumulators.
#[derive(Debug, Clone)]
pub struct StreamController {
    state: StreamState,
    lead_in_ms: i64,
    single_frame_only: bool,
}

impl StreamController {
    pub fn new(lead_in_secs: f64, single_frame_only: bool) -> Self {
        let lead_in_ms = if lead_in_secs.is_finite() && lead_in_secs > 0.0 {
            (lead_in_secs * 1000.0).round() as i64
        } else {
            0
        };
        let state = if lead_in_ms > 0 {
            StreamState::LeadIn {
                started_at_ms: None,
            }
        } else {
            StreamState::Active
        };
        Self {
            state,
            lead_in_ms,
            single_frame_only,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Terminated | StreamState::Draining)
    }

    /// Decide the fate of a frame captured at `captured_at_ms`.
    pub fn admit(&mut self, captured_at_ms: i64) -> Gate {
        match self.state {
            StreamState::LeadIn { started_at_ms } => {
                let started = started_at_ms.unwrap_or(captured_at_ms);
                let elapsed = captured_at_ms.saturating_sub(started);
                if elapsed >= self.lead_in_ms {
                    info!(
                        elapsed_ms = elapsed,
                        lead_in_ms = self.lead_in_ms,
                        "LEAD-IN→ACTIVE: capture settled, analysis starts"
                    );
                    self.state = StreamState::Active;
                    Gate::Forward
                } else {
                    debug!(elapsed_ms = elapsed, lead_in_ms = self.lead_in_ms, "LEAD-IN: frame skipped");
                    self.state = StreamState::LeadIn {
                        started_at_ms: Some(started),
                    };
                    Gate::LeadIn
                }
            }
            StreamState::Active => Gate::Forward,
            StreamState::Terminated | StreamState::Draining => Gate::Ignore,
        }
    }

    /// Called after a forwarded frame has been folded into the accumulators.
    pub fn frame_analyzed(&mut self) {
        if self.single_frame_only && self.state == StreamState::Active {
            info!("ACTIVE→TERMINATED: single frame captured");
            self.state = StreamState::Terminated;
        }
    }

    pub fn end_of_stream(&mut self) {
        match self.state {
            StreamState::Terminated | StreamState::Draining => {}
            previous => {
                info!(?previous, "end of stream, analysis is now read-only");
                self.state = StreamState::Draining;
            }
        }
    }
}
