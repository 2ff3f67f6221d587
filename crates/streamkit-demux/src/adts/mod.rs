//! Frame-sync scanner for ADTS elementary audio streams.
//!
//! The scanner owns an append-only byte queue. Each call to
//! [`FrameScanner::parse`] appends the new bytes and emits every frame it can
//! confirm; a candidate syncword counts as a frame only when a second
//! syncword sits exactly `frame_length` bytes later, so payload bytes that
//! happen to look like a header are skipped one byte at a time. The final
//! frame of a stream has no successor to confirm it and is emitted by
//! [`FrameScanner::flush`] instead.

mod header;
mod timestamp;

pub use header::AudioConfig;

use crate::buffer::StreamBuffer;
use crate::error::{Error, Result};
use bytes::{Buf, BytesMut};
use header::HeaderScan;
use streamkit_common::{TimeDelta, TrackType};
use timestamp::AudioTimestampHelper;

/// Callback invoked when the stream's audio parameters change.
pub type NewConfigCallback = Box<dyn FnMut(&AudioConfig)>;

/// Callback invoked with each confirmed frame.
pub type BufferCallback = Box<dyn FnMut(StreamBuffer)>;

/// Incremental scanner turning an ADTS byte stream into timed buffers.
pub struct FrameScanner {
    track_id: u64,
    queue: BytesMut,
    config: Option<AudioConfig>,
    helper: Option<AudioTimestampHelper>,
    /// Base timestamp waiting to be applied at the next confirmed frame.
    pending_base: Option<TimeDelta>,
    /// Decode-minus-presentation offset applied to emitted buffers.
    dts_offset: Option<TimeDelta>,
    on_new_config: NewConfigCallback,
    on_buffer: BufferCallback,
}

impl FrameScanner {
    /// Create a scanner emitting buffers tagged with `track_id`.
    pub fn new(track_id: u64, on_new_config: NewConfigCallback, on_buffer: BufferCallback) -> Self {
        FrameScanner {
            track_id,
            queue: BytesMut::new(),
            config: None,
            helper: None,
            pending_base: None,
            dts_offset: None,
            on_new_config,
            on_buffer,
        }
    }

    /// Append `data` to the scan queue and emit every confirmable frame.
    ///
    /// A `pts` seeds (or re-seeds) the timeline at the next confirmed frame;
    /// frames confirmed before any seed are dropped. A `dts` may accompany a
    /// `pts` to give emitted buffers a fixed decode-time offset.
    pub fn parse(
        &mut self,
        data: &[u8],
        pts: Option<TimeDelta>,
        dts: Option<TimeDelta>,
    ) -> Result<()> {
        if let Some(pts) = pts {
            if pts.is_negative() {
                return Err(Error::invalid_frame_header(format!(
                    "negative seed timestamp {pts}"
                )));
            }
            self.pending_base = Some(pts);
            self.dts_offset = dts.map(|dts| dts - pts);
        }
        self.queue.extend_from_slice(data);
        self.scan(true);
        Ok(())
    }

    /// Emit the trailing frame, if a complete one is queued.
    ///
    /// End of stream is the one place a frame needs no confirming successor.
    /// Any leftover bytes are discarded.
    pub fn flush(&mut self) {
        self.scan(false);
        if !self.queue.is_empty() {
            tracing::debug!(
                track_id = self.track_id,
                bytes = self.queue.len(),
                "discarding unparsed trailing bytes"
            );
            self.queue.clear();
        }
    }

    /// Current audio parameters, once a frame has been confirmed.
    pub fn config(&self) -> Option<&AudioConfig> {
        self.config.as_ref()
    }

    fn scan(&mut self, confirm: bool) {
        loop {
            let frame = match header::parse_frame_header(&self.queue) {
                HeaderScan::NeedMoreData => break,
                HeaderScan::NotAHeader => {
                    self.queue.advance(1);
                    continue;
                }
                HeaderScan::Frame(frame) => frame,
            };

            if confirm {
                let Some(next) = self.queue.get(frame.frame_length..frame.frame_length + 2)
                else {
                    break;
                };
                if !header::starts_with_syncword(next) {
                    // A payload byte pattern masquerading as a header.
                    self.queue.advance(1);
                    continue;
                }
            } else if self.queue.len() < frame.frame_length {
                break;
            }

            self.emit_frame(&frame);
            self.queue.advance(frame.frame_length);
        }
    }

    fn emit_frame(&mut self, frame: &header::FrameHeader) {
        if self.config != Some(frame.config) {
            // Carry the running timestamp across the rate change so the new
            // helper continues the same timeline.
            let running = self.helper.as_ref().and_then(|h| h.timestamp());
            let mut helper = AudioTimestampHelper::new(frame.config.sample_rate);
            if let Some(ts) = running {
                helper.set_base_timestamp(ts);
            }
            self.helper = Some(helper);
            self.config = Some(frame.config);
            (self.on_new_config)(&frame.config);
        }
        // Presence is guaranteed: the branch above created it.
        let Some(helper) = &mut self.helper else {
            return;
        };

        if let Some(base) = self.pending_base.take() {
            helper.set_base_timestamp(base);
        }
        let Some(timestamp) = helper.timestamp() else {
            tracing::debug!(
                track_id = self.track_id,
                "dropping frame before any seed timestamp"
            );
            return;
        };

        let mut buf = StreamBuffer::copy_from(
            &self.queue[..frame.frame_length],
            None,
            true,
            TrackType::Audio,
            self.track_id,
        );
        buf.set_timestamp(timestamp);
        buf.set_duration(Some(helper.frame_duration(header::SAMPLES_PER_FRAME)));
        if let Some(offset) = self.dts_offset {
            buf.set_decode_timestamp(timestamp + offset);
        }
        helper.add_frames(header::SAMPLES_PER_FRAME);
        (self.on_buffer)(buf);
    }
}
