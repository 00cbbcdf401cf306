//! Timestamp-query measurement of the draw pass.
//!
//! One two-entry query set is reused for every window. After the pass, the
//! timestamps are resolved and copied into a mappable buffer whose mapping is
//! requested right after submission; the result is collected by a later,
//! non-blocking poll. No new window opens until the previous readback lands.

use crossbeam_channel::{bounded, Receiver, TryRecvError};

use crate::backend::TimerPoll;

const QUERY_COUNT: u32 = 2;
const TIMESTAMP_BYTES: wgpu::BufferAddress =
    QUERY_COUNT as wgpu::BufferAddress * std::mem::size_of::<u64>() as wgpu::BufferAddress;

enum TimerState {
    Idle,
    Encoded,
    Mapping(Receiver<Result<(), wgpu::BufferAsyncError>>),
}

pub(crate) struct FrameTimer {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    readback_buffer: wgpu::Buffer,
    period_ns: f32,
    state: TimerState,
}

impl FrameTimer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("frame timer queries"),
            ty: wgpu::QueryType::Timestamp,
            count: QUERY_COUNT,
        });
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame timer resolve"),
            size: TIMESTAMP_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame timer readback"),
            size: TIMESTAMP_BYTES,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            query_set,
            resolve_buffer,
            readback_buffer,
            period_ns: queue.get_timestamp_period(),
            state: TimerState::Idle,
        }
    }

    /// Opens a window for the next pass; refused while a readback is in flight.
    pub fn open_window(&mut self) -> bool {
        if !matches!(self.state, TimerState::Idle) {
            return false;
        }
        self.state = TimerState::Encoded;
        true
    }

    pub fn timestamp_writes(&self) -> wgpu::RenderPassTimestampWrites<'_> {
        wgpu::RenderPassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: Some(1),
        }
    }

    /// Records the resolve and copy of a closed window into `encoder`.
    pub fn close_window(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.resolve_query_set(&self.query_set, 0..QUERY_COUNT, &self.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &self.resolve_buffer,
            0,
            &self.readback_buffer,
            0,
            TIMESTAMP_BYTES,
        );
    }

    /// Requests the mapping once the commands that close the window are submitted.
    pub fn submitted(&mut self) {
        if !matches!(self.state, TimerState::Encoded) {
            return;
        }
        let (sender, receiver) = bounded(1);
        self.readback_buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        self.state = TimerState::Mapping(receiver);
    }

    /// Abandons a window whose pass was never submitted.
    pub fn abandon(&mut self) {
        if matches!(self.state, TimerState::Encoded) {
            self.state = TimerState::Idle;
        }
    }

    pub fn poll(&mut self, device: &wgpu::Device) -> TimerPoll {
        let TimerState::Mapping(receiver) = &self.state else {
            return TimerPoll::Idle;
        };
        if let Err(err) = device.poll(wgpu::PollType::Poll) {
            tracing::debug!(error = %err, "device poll failed");
        }
        let mapped = match receiver.try_recv() {
            Ok(mapped) => mapped,
            Err(TryRecvError::Empty) => return TimerPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.state = TimerState::Idle;
                return TimerPoll::Idle;
            }
        };
        self.state = TimerState::Idle;
        if let Err(err) = mapped {
            tracing::warn!(error = %err, "failed to map timestamp readback");
            return TimerPoll::Idle;
        }

        let slice = self.readback_buffer.slice(..);
        let (begin, end) = {
            let view = slice.get_mapped_range();
            let begin: u64 = bytemuck::pod_read_unaligned(&view[0..8]);
            let end: u64 = bytemuck::pod_read_unaligned(&view[8..16]);
            (begin, end)
        };
        self.readback_buffer.unmap();
        TimerPoll::Ready(ticks_to_nanos(begin, end, self.period_ns))
    }

    pub fn destroy(&self) {
        self.resolve_buffer.destroy();
        self.readback_buffer.destroy();
    }
}

/// Converts a pair of raw timestamps into nanoseconds. Timestamps that run
/// backwards (counter reset, reordered passes) yield zero.
pub(crate) fn ticks_to_nanos(begin: u64, end: u64, period_ns: f32) -> u64 {
    let ticks = end.saturating_sub(begin);
    (ticks as f64 * f64::from(period_ns)).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_scale_by_period() {
        assert_eq!(ticks_to_nanos(100, 1_100, 1.0), 1_000);
        assert_eq!(ticks_to_nanos(0, 1_000, 83.333), 83_333);
        assert_eq!(ticks_to_nanos(5_000, 4_000, 1.0), 0);
    }

    #[test]
    fn readback_holds_two_timestamps() {
        assert_eq!(TIMESTAMP_BYTES, 16);
    }
}
