//! Frame clock and GPU frame-time sampling.
//!
//! The clock hands out per-frame deltas and decides when a measurement window
//! is due. Measurements are read one window late: a frame that is due first
//! resolves the previous closed window (if its result has landed) and only then
//! opens a new one, so the GPU is never stalled waiting for a result.

use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::types::ViewerEvent;

/// Timing snapshot for the frame being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Time since the clock base; feeds the shader's `iTime`.
    pub elapsed: Duration,
    /// Time since the previous frame.
    pub delta: Duration,
    /// A measurement window should be opened around this frame's draw.
    pub sample_due: bool,
}

#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last_frame: Instant,
    last_sample: Instant,
    query_interval: Duration,
    pending_window: bool,
    reset_requested: bool,
}

impl FrameClock {
    pub fn new(now: Instant, query_interval: Duration) -> Self {
        Self {
            start: now,
            last_frame: now,
            last_sample: now,
            query_interval,
            pending_window: false,
            reset_requested: false,
        }
    }

    pub fn tick(&mut self, now: Instant) -> FrameTick {
        if self.reset_requested {
            self.start = now;
            self.reset_requested = false;
        }
        let delta = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;
        FrameTick {
            elapsed: now.saturating_duration_since(self.start),
            delta,
            sample_due: now.saturating_duration_since(self.last_sample) > self.query_interval,
        }
    }

    /// Zeroes the shader time base at the next tick. Frame deltas and the
    /// sampling cadence are unaffected.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    /// Whether a closed window is waiting to be read back.
    pub fn has_pending_window(&self) -> bool {
        self.pending_window
    }

    /// Records that a window was opened and closed around this frame's draw.
    pub fn window_closed(&mut self, now: Instant) {
        self.pending_window = true;
        self.last_sample = now;
    }

    /// Records that the pending window has been read (or abandoned).
    pub fn window_resolved(&mut self) {
        self.pending_window = false;
    }
}

pub fn nanos_to_micros(nanoseconds: u64) -> u32 {
    (nanoseconds / 1000).min(u64::from(u32::MAX)) as u32
}

/// Producer side of the viewer-to-host notification channel.
///
/// Delivery never blocks the render loop: when the host falls behind, newer
/// events are dropped rather than queued without bound. Frame-time samples
/// carry a sequence number so a consumer can ignore anything out of order.
#[derive(Debug, Clone)]
pub struct ViewerEvents {
    sender: Sender<ViewerEvent>,
    next_sequence: u64,
}

impl ViewerEvents {
    pub fn channel(capacity: usize) -> (Self, Receiver<ViewerEvent>) {
        let (sender, receiver) = bounded(capacity.max(1));
        (
            Self {
                sender,
                next_sequence: 0,
            },
            receiver,
        )
    }

    pub fn frame_time(&mut self, microseconds: u32) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.push(ViewerEvent::FrameTime {
            sequence,
            microseconds,
        });
    }

    pub fn diagnostic(&mut self, stage: &'static str, message: impl Into<String>) {
        self.push(ViewerEvent::Diagnostic {
            stage,
            message: message.into(),
        });
    }

    fn push(&self, event: ViewerEvent) {
        match self.sender.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(event)) => {
                tracing::trace!(?event, "viewer event queue full; dropping event");
            }
        }
    }
}
