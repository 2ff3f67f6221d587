//! Timed decode buffers.
//!
//! A `StreamBuffer` is an immutable payload plus the timing and identity a
//! decoder needs: presentation/decode timestamps, duration, keyframe flag,
//! track identity, and optionally a decrypt config, a splice group, or a
//! preroll buffer.
//!
//! Ownership is exclusive: a buffer lives in exactly one of a track's pending
//! queue, a ready queue, a splice list, or a preroll slot at any instant.
//! Splice conversion is the only place buffers are duplicated, and it does so
//! via explicit deep copies (`Clone`).

use crate::error::{Error, Result};
use streamkit_common::{TimeDelta, TrackType};

/// Decryption metadata stripped from an encrypted container block.
///
/// Key negotiation and the actual decryption are out of scope; this only
/// carries what the block header declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptConfig {
    /// Key identifier from the track configuration.
    pub key_id: Vec<u8>,
    /// Initialization vector from the block header. Empty for a clear block
    /// inside an encrypted track.
    pub iv: Vec<u8>,
}

/// A timed, per-track decode buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamBuffer {
    data: Vec<u8>,
    side_data: Option<Vec<u8>>,
    is_keyframe: bool,
    track_type: TrackType,
    track_id: u64,
    timestamp: TimeDelta,
    decode_timestamp: Option<TimeDelta>,
    duration: Option<TimeDelta>,
    config_id: Option<i32>,
    splice_timestamp: Option<TimeDelta>,
    splice_buffers: Vec<StreamBuffer>,
    preroll: Option<Box<StreamBuffer>>,
    discard_padding: Option<(TimeDelta, TimeDelta)>,
    decrypt_config: Option<DecryptConfig>,
    end_of_stream: bool,
}

impl StreamBuffer {
    /// Create a buffer by copying the given payload and optional side data.
    ///
    /// The decode timestamp starts unset (it falls back to the presentation
    /// timestamp) and the duration starts unknown.
    pub fn copy_from(
        data: &[u8],
        side_data: Option<&[u8]>,
        is_keyframe: bool,
        track_type: TrackType,
        track_id: u64,
    ) -> Self {
        StreamBuffer {
            data: data.to_vec(),
            side_data: side_data.map(|s| s.to_vec()),
            is_keyframe,
            track_type,
            track_id,
            timestamp: TimeDelta::ZERO,
            decode_timestamp: None,
            duration: None,
            config_id: None,
            splice_timestamp: None,
            splice_buffers: Vec::new(),
            preroll: None,
            discard_padding: None,
            decrypt_config: None,
            end_of_stream: false,
        }
    }

    /// Create an end-of-stream marker for a track.
    pub fn end_of_stream(track_type: TrackType, track_id: u64) -> Self {
        let mut buf = Self::copy_from(&[], None, true, track_type, track_id);
        buf.end_of_stream = true;
        buf
    }

    /// Payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Optional side data carried alongside the payload.
    pub fn side_data(&self) -> Option<&[u8]> {
        self.side_data.as_deref()
    }

    /// Whether this is an end-of-stream marker.
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Whether the buffer starts a decodable unit.
    pub fn is_keyframe(&self) -> bool {
        self.is_keyframe
    }

    /// Logical stream kind.
    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    /// Track identifier.
    pub fn track_id(&self) -> u64 {
        self.track_id
    }

    /// Presentation timestamp.
    pub fn timestamp(&self) -> TimeDelta {
        self.timestamp
    }

    /// Set the presentation timestamp.
    pub fn set_timestamp(&mut self, timestamp: TimeDelta) {
        self.timestamp = timestamp;
    }

    /// Decode timestamp: when the buffer must reach the decoder. Falls back
    /// to the presentation timestamp while unset.
    pub fn decode_timestamp(&self) -> TimeDelta {
        self.decode_timestamp.unwrap_or(self.timestamp)
    }

    /// Set the decode timestamp. Propagates one level into the preroll
    /// buffer, never recursively; frozen splice copies are not updated.
    pub fn set_decode_timestamp(&mut self, dts: TimeDelta) {
        self.decode_timestamp = Some(dts);
        if let Some(preroll) = &mut self.preroll {
            preroll.decode_timestamp = Some(dts);
        }
    }

    /// Duration of the decoded output, if known.
    pub fn duration(&self) -> Option<TimeDelta> {
        self.duration
    }

    /// Set or clear the duration.
    pub fn set_duration(&mut self, duration: Option<TimeDelta>) {
        self.duration = duration;
    }

    /// End of the buffer's presentation interval, if the duration is known.
    pub fn end_timestamp(&self) -> Option<TimeDelta> {
        self.duration.map(|d| self.timestamp + d)
    }

    /// Decoder-configuration identifier, if assigned.
    pub fn config_id(&self) -> Option<i32> {
        self.config_id
    }

    /// Set the decoder-configuration identifier. Propagates one level into
    /// the preroll buffer, never recursively.
    pub fn set_config_id(&mut self, config_id: i32) {
        self.config_id = Some(config_id);
        if let Some(preroll) = &mut self.preroll {
            preroll.config_id = Some(config_id);
        }
    }

    /// The splice point this buffer belongs to, if any.
    pub fn splice_timestamp(&self) -> Option<TimeDelta> {
        self.splice_timestamp
    }

    /// Buffers to be consumed atomically for a gapless crossfade. Empty
    /// unless this buffer has undergone splice conversion.
    pub fn splice_buffers(&self) -> &[StreamBuffer] {
        &self.splice_buffers
    }

    /// The decode-but-discard buffer priming the decoder for this one.
    pub fn preroll(&self) -> Option<&StreamBuffer> {
        self.preroll.as_deref()
    }

    /// Sub-interval of the decoded output to drop: (front, back).
    pub fn discard_padding(&self) -> Option<(TimeDelta, TimeDelta)> {
        self.discard_padding
    }

    /// Set the discard padding interval.
    pub fn set_discard_padding(&mut self, front: TimeDelta, back: TimeDelta) {
        self.discard_padding = Some((front, back));
    }

    /// Decryption metadata, if the block was encrypted.
    pub fn decrypt_config(&self) -> Option<&DecryptConfig> {
        self.decrypt_config.as_ref()
    }

    /// Attach decryption metadata.
    pub fn set_decrypt_config(&mut self, config: DecryptConfig) {
        self.decrypt_config = Some(config);
    }

    /// Convert this buffer into a splice buffer wrapping `pre_splice`.
    ///
    /// The buffer's identity is rewritten to match the first pre-splice
    /// buffer, and `splice_buffers` is populated with deep copies of every
    /// pre-splice buffer followed by a copy of the original ("overlap")
    /// buffer. A decoder consumes the group atomically to produce a gapless
    /// crossfade across the splice point.
    pub fn convert_to_splice_buffer(&mut self, pre_splice: Vec<StreamBuffer>) -> Result<()> {
        if !self.splice_buffers.is_empty() {
            return Err(Error::invalid_splice("buffer already has a splice list"));
        }
        if self.end_of_stream {
            return Err(Error::invalid_splice(
                "end-of-stream buffer cannot be spliced",
            ));
        }
        if pre_splice.is_empty() {
            return Err(Error::invalid_splice("pre-splice list is empty"));
        }
        for buf in &pre_splice {
            if buf.end_of_stream {
                return Err(Error::invalid_splice(
                    "pre-splice buffer is an end-of-stream marker",
                ));
            }
            if !buf.splice_buffers.is_empty() || buf.splice_timestamp.is_some() {
                return Err(Error::invalid_splice("pre-splice buffer is itself spliced"));
            }
            if buf.preroll.is_some() {
                return Err(Error::invalid_splice("pre-splice buffer has a preroll"));
            }
        }
        let first = &pre_splice[0];
        if first.timestamp > self.timestamp {
            return Err(Error::invalid_splice(
                "pre-splice starts after the overlapping buffer",
            ));
        }

        // Deep-copy this buffer into the trailing overlap entry. The overlap
        // keeps the preroll, and its own splice timestamp stays cleared.
        let mut overlap = self.clone();
        overlap.splice_timestamp = None;
        overlap.preroll = self.preroll.take();

        let overlap_end = overlap.end_timestamp().ok_or_else(|| {
            Error::invalid_splice("overlapping buffer has unknown duration")
        })?;
        let last_end = pre_splice
            .last()
            .and_then(|b| b.end_timestamp())
            .ok_or_else(|| Error::invalid_splice("pre-splice buffer has unknown duration"))?;

        // Rewrite identity to match the first pre-splice buffer.
        self.decode_timestamp = first.decode_timestamp;
        self.config_id = first.config_id;
        self.timestamp = first.timestamp;
        self.is_keyframe = first.is_keyframe;
        self.track_type = first.track_type;
        self.track_id = first.track_id;

        self.splice_timestamp = Some(overlap.timestamp);
        self.duration = Some(overlap_end.max(last_end) - first.timestamp);

        self.splice_buffers = pre_splice;
        for buf in &mut self.splice_buffers {
            buf.splice_timestamp = Some(overlap.timestamp);
        }
        self.splice_buffers.push(overlap);
        Ok(())
    }

    /// Bind a preroll buffer: decoded before this buffer solely to warm
    /// stateful decoder context, never presented.
    pub fn set_preroll(&mut self, mut preroll: StreamBuffer) -> Result<()> {
        if self.preroll.is_some() {
            return Err(Error::invalid_preroll("buffer already has a preroll"));
        }
        if self.end_of_stream || preroll.end_of_stream {
            return Err(Error::invalid_preroll(
                "end-of-stream buffers cannot participate in preroll",
            ));
        }
        if preroll.splice_timestamp.is_some() || !preroll.splice_buffers.is_empty() {
            return Err(Error::invalid_preroll("preroll buffer is spliced"));
        }
        if preroll.timestamp > self.timestamp {
            return Err(Error::invalid_preroll("preroll follows its parent in time"));
        }
        if preroll.discard_padding.is_some() {
            return Err(Error::invalid_preroll("preroll already has discard padding"));
        }
        if preroll.track_type != self.track_type {
            return Err(Error::invalid_preroll("preroll track type mismatch"));
        }
        if preroll.track_id != self.track_id {
            return Err(Error::invalid_preroll("preroll track id mismatch"));
        }

        preroll.timestamp = self.timestamp;
        preroll.decode_timestamp = self.decode_timestamp;
        // The whole decoded output is discardable; only decoder state matters.
        preroll.discard_padding = Some((TimeDelta::MAX, TimeDelta::ZERO));
        self.preroll = Some(Box::new(preroll));
        Ok(())
    }
}
