//! Incremental WebM/Matroska cluster demuxer.
//!
//! `ClusterDemuxer` consumes one cluster per lifecycle: feed it slices via
//! [`ClusterDemuxer::parse`], pull released buffers from the getters, and
//! call [`ClusterDemuxer::reset`] at the cluster boundary before feeding the
//! next one. Track metadata (track numbers, defaults, key IDs) comes from an
//! external demuxer-configuration collaborator; TRACKS/INFO parsing is out of
//! scope here.
//!
//! Buffers are released across tracks only below a shared "ready window":
//! the minimum held-back decode timestamp over all audio/video tracks. This
//! guarantees that no consumer can observe cross-track buffers whose relative
//! order a later duration resolution could still change.

mod ebml;
mod keyframe;

pub use keyframe::VideoCodec;

use crate::buffer::{DecryptConfig, StreamBuffer};
use crate::error::{Error, Result};
use crate::metrics::MetricsSink;
use crate::track::Track;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use streamkit_common::{TimeDelta, TrackType};

const CLUSTER_ID: u32 = 0x1F43_B675;
const TIMECODE_ID: u32 = 0xE7;
const SIMPLE_BLOCK_ID: u32 = 0xA3;
const BLOCK_GROUP_ID: u32 = 0xA0;
const BLOCK_ID: u32 = 0xA1;
const BLOCK_DURATION_ID: u32 = 0x9B;
const REFERENCE_BLOCK_ID: u32 = 0xFB;
const DISCARD_PADDING_ID: u32 = 0x75A2;
const BLOCK_ADDITIONS_ID: u32 = 0x75A1;
const BLOCK_MORE_ID: u32 = 0xA6;
const BLOCK_ADD_ID: u32 = 0xEE;
const BLOCK_ADDITIONAL_ID: u32 = 0xA5;

/// Segment-level element IDs that terminate a cluster of unknown size.
const TOP_LEVEL_IDS: [u32; 9] = [
    CLUSTER_ID,
    0x1A45_DFA3, // EBML header
    0x1853_8067, // Segment
    0x114D_9B74, // SeekHead
    0x1549_A966, // Info
    0x1654_AE6B, // Tracks
    0x1C53_BB6B, // Cues
    0x1043_A770, // Chapters
    0x1254_C367, // Tags
];

/// Signal-byte flag marking an encrypted frame.
const ENCRYPTED_FRAME_FLAG: u8 = 0x01;
/// Initialization vector size declared by the encryption scheme.
const IV_SIZE: usize = 8;

/// Block flag bits.
const KEYFRAME_FLAG: u8 = 0x80;
const LACING_MASK: u8 = 0x06;

/// Configuration for one timed text track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTrackConfig {
    /// Text kind (subtitles, captions, ...).
    pub kind: Option<String>,
    /// Human-readable track name.
    pub name: Option<String>,
    /// BCP 47 language tag.
    pub language: Option<String>,
}

/// Construction-time configuration supplied by the demuxer-configuration
/// collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterDemuxerConfig {
    /// Nanoseconds per container timecode unit.
    pub timecode_scale_ns: u64,
    /// Audio track number, if the stream has audio.
    pub audio_track_num: Option<u64>,
    /// Default audio buffer duration from track metadata.
    pub audio_default_duration: Option<TimeDelta>,
    /// Video track number, if the stream has video.
    pub video_track_num: Option<u64>,
    /// Default video buffer duration from track metadata.
    pub video_default_duration: Option<TimeDelta>,
    /// Video codec, used to probe grouped blocks for keyframes.
    pub video_codec: VideoCodec,
    /// Timed text tracks by track number.
    pub text_tracks: BTreeMap<u64, TextTrackConfig>,
    /// Track numbers whose blocks are silently dropped.
    pub ignored_tracks: HashSet<u64>,
    /// Encryption key ID for the audio track; empty for a clear track.
    pub audio_encryption_key_id: Vec<u8>,
    /// Encryption key ID for the video track; empty for a clear track.
    pub video_encryption_key_id: Vec<u8>,
}

impl Default for ClusterDemuxerConfig {
    fn default() -> Self {
        ClusterDemuxerConfig {
            timecode_scale_ns: 1_000_000,
            audio_track_num: None,
            audio_default_duration: None,
            video_track_num: None,
            video_default_duration: None,
            video_codec: VideoCodec::default(),
            text_tracks: BTreeMap::new(),
            ignored_tracks: HashSet::new(),
            audio_encryption_key_id: Vec::new(),
            video_encryption_key_id: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Waiting for the cluster's own element header.
    Header,
    /// Consuming the cluster's children.
    Body,
    /// The cluster has fully ended; `reset` starts the next one.
    Ended,
}

/// Demuxes the blocks of one cluster into per-track timed buffers.
pub struct ClusterDemuxer {
    config: ClusterDemuxerConfig,
    metrics: Box<dyn MetricsSink>,
    state: State,
    /// Remaining payload bytes for a known-size cluster.
    cluster_bytes_left: Option<u64>,
    /// Cluster base timecode in raw timecode units.
    cluster_timecode: Option<i64>,
    /// Absolute timecode of the previous block in this cluster.
    last_block_timecode: Option<i64>,
    audio: Option<Track>,
    video: Option<Track>,
    text: BTreeMap<u64, Track>,
    ready_computed: bool,
}

impl ClusterDemuxer {
    /// Create a demuxer for the configured track layout.
    pub fn new(config: ClusterDemuxerConfig, metrics: Box<dyn MetricsSink>) -> Self {
        let audio = config
            .audio_track_num
            .map(|num| Track::new(num, TrackType::Audio, config.audio_default_duration));
        let video = config
            .video_track_num
            .map(|num| Track::new(num, TrackType::Video, config.video_default_duration));
        let text = config
            .text_tracks
            .keys()
            .map(|&num| (num, Track::new(num, TrackType::Text, None)))
            .collect();

        ClusterDemuxer {
            config,
            metrics,
            state: State::Header,
            cluster_bytes_left: None,
            cluster_timecode: None,
            last_block_timecode: None,
            audio,
            video,
            text,
            ready_computed: false,
        }
    }

    /// Whether the current cluster has fully ended.
    pub fn cluster_ended(&self) -> bool {
        self.state == State::Ended
    }

    /// Feed the next slice of the cluster byte stream.
    ///
    /// Returns the number of bytes consumed. `Ok(0)` means no complete
    /// element was available yet; call again with more data. An `Err` is
    /// fatal for this cluster. Once the cluster has ended, remaining bytes
    /// belong to the next unit and are left unconsumed until `reset`.
    pub fn parse(&mut self, data: &[u8]) -> Result<usize> {
        self.begin_cycle();
        let mut pos = 0;

        loop {
            match self.state {
                State::Header => {
                    let Some((id, id_len)) = ebml::parse_element_id(&data[pos..])? else {
                        break;
                    };
                    if id != CLUSTER_ID {
                        return Err(Error::invalid_cluster(format!(
                            "expected cluster, found element 0x{id:X}"
                        )));
                    }
                    let Some((size, size_len)) = ebml::parse_element_size(&data[pos + id_len..])?
                    else {
                        break;
                    };
                    if size == Some(0) {
                        return Err(Error::invalid_cluster("zero-size cluster"));
                    }
                    self.cluster_bytes_left = size;
                    self.state = State::Body;
                    pos += id_len + size_len;
                }
                State::Body => {
                    if self.cluster_bytes_left == Some(0) {
                        self.state = State::Ended;
                        continue;
                    }
                    let rest = &data[pos..];
                    let Some((id, id_len)) = ebml::parse_element_id(rest)? else {
                        break;
                    };
                    if self.cluster_bytes_left.is_none() && TOP_LEVEL_IDS.contains(&id) {
                        // An unknown-size cluster ends at the next top-level
                        // element; leave it for the caller.
                        self.state = State::Ended;
                        continue;
                    }
                    let Some((size, size_len)) = ebml::parse_element_size(&rest[id_len..])? else {
                        break;
                    };
                    let Some(size) = size else {
                        return Err(Error::invalid_cluster(
                            "cluster child element with unknown size",
                        ));
                    };
                    let total = id_len + size_len + size as usize;
                    if let Some(left) = self.cluster_bytes_left {
                        if total as u64 > left {
                            return Err(Error::invalid_cluster(
                                "child element overruns cluster bounds",
                            ));
                        }
                    }
                    if rest.len() < total {
                        break;
                    }

                    let body = &rest[id_len + size_len..total];
                    match id {
                        TIMECODE_ID => {
                            self.cluster_timecode = Some(ebml::read_uint(body)? as i64);
                        }
                        SIMPLE_BLOCK_ID => self.on_simple_block(body)?,
                        BLOCK_GROUP_ID => self.on_block_group(body)?,
                        _ => {
                            tracing::debug!(element_id = id, "skipping cluster child");
                        }
                    }

                    pos += total;
                    if let Some(left) = &mut self.cluster_bytes_left {
                        *left -= total as u64;
                    }
                }
                State::Ended => break,
            }
        }

        Ok(pos)
    }

    /// Audio buffers released below the current ready window.
    pub fn audio_buffers(&mut self) -> &[StreamBuffer] {
        self.update_ready_buffers();
        self.audio.as_ref().map(|t| t.ready()).unwrap_or(&[])
    }

    /// Video buffers released below the current ready window.
    pub fn video_buffers(&mut self) -> &[StreamBuffer] {
        self.update_ready_buffers();
        self.video.as_ref().map(|t| t.ready()).unwrap_or(&[])
    }

    /// Released text buffers, grouped by track number.
    pub fn text_buffers(&mut self) -> BTreeMap<u64, &[StreamBuffer]> {
        self.update_ready_buffers();
        self.text.iter().map(|(&num, t)| (num, t.ready())).collect()
    }

    /// Discard per-cluster state and prepare for the next cluster.
    ///
    /// Pending and held-back buffers are dropped; per-track duration
    /// estimates survive (only a full reconfiguration clears them).
    pub fn reset(&mut self) {
        if let Some(track) = &mut self.audio {
            track.reset();
        }
        if let Some(track) = &mut self.video {
            track.reset();
        }
        for track in self.text.values_mut() {
            track.reset();
        }
        self.state = State::Header;
        self.cluster_bytes_left = None;
        self.cluster_timecode = None;
        self.last_block_timecode = None;
        self.ready_computed = false;
    }

    fn begin_cycle(&mut self) {
        if let Some(track) = &mut self.audio {
            track.clear_ready();
        }
        if let Some(track) = &mut self.video {
            track.clear_ready();
        }
        for track in self.text.values_mut() {
            track.clear_ready();
        }
        self.ready_computed = false;
    }

    /// Compute the shared ready window and release buffers below it.
    ///
    /// Runs at most once per parse/reset cycle. If the cluster has ended,
    /// trailing held-back buffers get their duration estimates and the bound
    /// is infinite; otherwise the bound is the minimum held-back decode
    /// timestamp across audio/video tracks. Text tracks never hold back
    /// buffers and so never bound the window, but they are extracted with it.
    fn update_ready_buffers(&mut self) {
        if self.ready_computed {
            return;
        }
        self.ready_computed = true;

        let bound = if self.state == State::Ended {
            if let Some(track) = &mut self.audio {
                track.apply_duration_estimate_if_needed(self.metrics.as_mut());
            }
            if let Some(track) = &mut self.video {
                track.apply_duration_estimate_if_needed(self.metrics.as_mut());
            }
            TimeDelta::MAX
        } else {
            let mut bound = TimeDelta::MAX;
            if let Some(track) = &self.audio {
                bound = bound.min(track.ready_upper_bound());
            }
            if let Some(track) = &self.video {
                bound = bound.min(track.ready_upper_bound());
            }
            bound
        };

        if let Some(track) = &mut self.audio {
            track.extract_ready_buffers(bound);
        }
        if let Some(track) = &mut self.video {
            track.extract_ready_buffers(bound);
        }
        for track in self.text.values_mut() {
            track.extract_ready_buffers(bound);
        }
    }

    fn on_simple_block(&mut self, body: &[u8]) -> Result<()> {
        let header = parse_block_header(body)?;
        self.on_block(&header, true, None, None, None)
    }

    fn on_block_group(&mut self, body: &[u8]) -> Result<()> {
        let mut block_body: Option<&[u8]> = None;
        let mut duration_units: Option<u64> = None;
        let mut discard_padding_ns: Option<i64> = None;
        let mut additional: Option<&[u8]> = None;

        let mut pos = 0;
        while pos < body.len() {
            let (id, child) = next_child(body, &mut pos)?;
            match id {
                BLOCK_ID => {
                    if block_body.is_some() {
                        return Err(Error::invalid_block(
                            "more than one block in a block group",
                        ));
                    }
                    block_body = Some(child);
                }
                BLOCK_DURATION_ID => {
                    duration_units = Some(ebml::read_uint(child)?);
                }
                DISCARD_PADDING_ID => {
                    discard_padding_ns = Some(ebml::read_sint(child)?);
                }
                BLOCK_ADDITIONS_ID => {
                    additional = parse_block_additions(child, additional)?;
                }
                REFERENCE_BLOCK_ID => {}
                _ => {
                    tracing::debug!(element_id = id, "skipping block group child");
                }
            }
        }

        let Some(block_body) = block_body else {
            return Err(Error::invalid_block("block group without a block"));
        };
        let header = parse_block_header(block_body)?;
        self.on_block(&header, false, duration_units, discard_padding_ns, additional)
    }

    fn on_block(
        &mut self,
        header: &BlockHeader<'_>,
        is_simple: bool,
        duration_units: Option<u64>,
        discard_padding_ns: Option<i64>,
        additional: Option<&[u8]>,
    ) -> Result<()> {
        let Some(cluster_timecode) = self.cluster_timecode else {
            return Err(Error::invalid_block(
                "block before the cluster timecode is known",
            ));
        };
        // Negative relative offsets are fine; a negative absolute timecode
        // or an intra-cluster regression is not.
        let timecode = cluster_timecode + header.timecode_rel as i64;
        if timecode < 0 {
            return Err(Error::invalid_block(format!(
                "negative block timecode {timecode}"
            )));
        }
        if let Some(last) = self.last_block_timecode {
            if timecode < last {
                return Err(Error::invalid_block(format!(
                    "block timecode {timecode} regresses below {last}"
                )));
            }
        }
        self.last_block_timecode = Some(timecode);

        if self.config.ignored_tracks.contains(&header.track_num) {
            self.metrics.block_ignored(header.track_num);
            return Ok(());
        }

        let scale_ns = self.config.timecode_scale_ns;
        let video_codec = self.config.video_codec;

        // Resolve the track once; its state carries the type, so presence
        // and kind cannot disagree.
        let (track, key_id): (Option<&mut Track>, &[u8]) =
            if self.config.audio_track_num == Some(header.track_num) {
                (self.audio.as_mut(), &self.config.audio_encryption_key_id)
            } else if self.config.video_track_num == Some(header.track_num) {
                (self.video.as_mut(), &self.config.video_encryption_key_id)
            } else {
                (self.text.get_mut(&header.track_num), &[])
            };
        let Some(track) = track else {
            return Err(Error::UnknownTrack(header.track_num));
        };
        let track_type = track.track_type();

        let (frame, decrypt_config) = if key_id.is_empty() {
            (header.payload, None)
        } else {
            let (frame, config) = strip_encryption(header.payload, key_id)?;
            (frame, Some(config))
        };

        let is_keyframe = if is_simple {
            header.flags & KEYFRAME_FLAG != 0
        } else {
            match track_type {
                TrackType::Video => keyframe::is_video_keyframe(video_codec, frame),
                _ => true,
            }
        };

        let duration = match duration_units {
            Some(units) => Some(timecode_to_delta(units as i64, scale_ns)),
            None if track_type == TrackType::Text => {
                return Err(Error::MissingTextDuration(header.track_num));
            }
            None => track.default_duration(),
        };

        let mut buf =
            StreamBuffer::copy_from(frame, additional, is_keyframe, track_type, header.track_num);
        buf.set_timestamp(timecode_to_delta(timecode, scale_ns));
        buf.set_duration(duration);
        if let Some(config) = decrypt_config {
            buf.set_decrypt_config(config);
        }
        if let Some(padding_ns) = discard_padding_ns {
            if padding_ns >= 0 {
                buf.set_discard_padding(TimeDelta::ZERO, TimeDelta::from_nanos(padding_ns));
            } else {
                buf.set_discard_padding(TimeDelta::from_nanos(-padding_ns), TimeDelta::ZERO);
            }
        }

        track.add_buffer(buf)
    }
}

fn timecode_to_delta(units: i64, scale_ns: u64) -> TimeDelta {
    let nanos = units as i128 * scale_ns as i128;
    TimeDelta::from_micros((nanos / 1_000) as i64)
}

/// Decoded common block framing: track vint, 16-bit signed relative
/// timecode, flags byte, then the payload.
struct BlockHeader<'a> {
    track_num: u64,
    timecode_rel: i16,
    flags: u8,
    payload: &'a [u8],
}

fn parse_block_header(body: &[u8]) -> Result<BlockHeader<'_>> {
    let Some((track_num, vint_len)) = ebml::parse_block_vint(body)? else {
        return Err(Error::invalid_block("truncated block header"));
    };
    if body.len() < vint_len + 3 {
        return Err(Error::invalid_block("truncated block header"));
    }
    let timecode_rel = i16::from_be_bytes([body[vint_len], body[vint_len + 1]]);
    let flags = body[vint_len + 2];

    if flags & LACING_MASK != 0 {
        return Err(Error::unsupported("block lacing"));
    }

    Ok(BlockHeader {
        track_num,
        timecode_rel,
        flags,
        payload: &body[vint_len + 3..],
    })
}

/// Read the next complete child element from a fully-buffered parent body.
fn next_child<'a>(body: &'a [u8], pos: &mut usize) -> Result<(u32, &'a [u8])> {
    let rest = &body[*pos..];
    let Some((id, id_len)) = ebml::parse_element_id(rest)? else {
        return Err(Error::invalid_block("truncated child element"));
    };
    let Some((size, size_len)) = ebml::parse_element_size(&rest[id_len..])? else {
        return Err(Error::invalid_block("truncated child element"));
    };
    let Some(size) = size else {
        return Err(Error::invalid_block("child element with unknown size"));
    };
    let total = id_len + size_len + size as usize;
    if rest.len() < total {
        return Err(Error::invalid_block("child element overruns its parent"));
    }
    *pos += total;
    Ok((id, &rest[id_len + size_len..total]))
}

/// Extract the single BlockAdditional payload from a BlockAdditions element.
/// More than one attachment in a group is rejected.
fn parse_block_additions<'a>(
    body: &'a [u8],
    existing: Option<&'a [u8]>,
) -> Result<Option<&'a [u8]>> {
    let mut additional = existing;
    let mut pos = 0;
    while pos < body.len() {
        let (id, more_body) = next_child(body, &mut pos)?;
        if id != BLOCK_MORE_ID {
            continue;
        }
        let mut inner = 0;
        while inner < more_body.len() {
            let (inner_id, payload) = next_child(more_body, &mut inner)?;
            match inner_id {
                BLOCK_ADDITIONAL_ID => {
                    if additional.is_some() {
                        return Err(Error::invalid_block(
                            "more than one additional data attachment",
                        ));
                    }
                    additional = Some(payload);
                }
                BLOCK_ADD_ID => {}
                _ => {}
            }
        }
    }
    Ok(additional)
}

/// Strip the leading encryption signal byte (and IV when the frame is
/// encrypted) and build the decrypt metadata.
fn strip_encryption<'a>(payload: &'a [u8], key_id: &[u8]) -> Result<(&'a [u8], DecryptConfig)> {
    let Some(&signal) = payload.first() else {
        return Err(Error::invalid_block("missing encryption signal byte"));
    };
    if signal & ENCRYPTED_FRAME_FLAG != 0 {
        if payload.len() < 1 + IV_SIZE {
            return Err(Error::invalid_block(
                "encrypted block shorter than signal byte plus IV",
            ));
        }
        Ok((
            &payload[1 + IV_SIZE..],
            DecryptConfig {
                key_id: key_id.to_vec(),
                iv: payload[1..1 + IV_SIZE].to_vec(),
            },
        ))
    } else {
        Ok((
            &payload[1..],
            DecryptConfig {
                key_id: key_id.to_vec(),
                iv: Vec::new(),
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NullMetrics;

    fn demuxer(config: ClusterDemuxerConfig) -> ClusterDemuxer {
        ClusterDemuxer::new(config, Box::new(NullMetrics))
    }

    fn av_config() -> ClusterDemuxerConfig {
        ClusterDemuxerConfig {
            audio_track_num: Some(1),
            video_track_num: Some(2),
            ..Default::default()
        }
    }

    /// Append an element with a 1-byte size vint.
    fn push_element(out: &mut Vec<u8>, id: u32, body: &[u8]) {
        assert!(body.len() < 0x7F);
        if id > 0xFF {
            out.extend_from_slice(&id.to_be_bytes()[2..]);
        } else {
            out.push(id as u8);
        }
        out.push(0x80 | body.len() as u8);
        out.extend_from_slice(body);
    }

    fn simple_block(track: u8, timecode_rel: i16, flags: u8, frame: &[u8]) -> Vec<u8> {
        let mut body = vec![0x80 | track];
        body.extend_from_slice(&timecode_rel.to_be_bytes());
        body.push(flags);
        body.extend_from_slice(frame);
        body
    }

    /// Build a complete known-size cluster from already-encoded children.
    fn cluster(timecode: u8, children: &[Vec<u8>]) -> Vec<u8> {
        let mut body = Vec::new();
        push_element(&mut body, TIMECODE_ID, &[timecode]);
        for child in children {
            body.extend_from_slice(child);
        }

        let mut out = CLUSTER_ID.to_be_bytes().to_vec();
        // 2-byte size vint keeps room for larger test clusters.
        assert!(body.len() < 0x3FFF);
        out.push(0x40 | (body.len() >> 8) as u8);
        out.push((body.len() & 0xFF) as u8);
        out.extend_from_slice(&body);
        out
    }

    fn encoded_simple_block(track: u8, timecode_rel: i16, flags: u8, frame: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        push_element(
            &mut out,
            SIMPLE_BLOCK_ID,
            &simple_block(track, timecode_rel, flags, frame),
        );
        out
    }

    #[test]
    fn test_single_simple_block() {
        let data = cluster(0, &[encoded_simple_block(1, 10, 0x80, &[0xAA, 0xBB])]);
        let mut demux = demuxer(av_config());

        let consumed = demux.parse(&data).unwrap();
        assert_eq!(consumed, data.len());
        assert!(demux.cluster_ended());

        let audio = demux.audio_buffers();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].timestamp(), TimeDelta::from_millis(10));
        assert!(audio[0].is_keyframe());
        assert_eq!(audio[0].data(), &[0xAA, 0xBB]);
        // No explicit duration: the end-of-cluster estimate applied.
        assert!(audio[0].duration().is_some());
    }

    #[test]
    fn test_need_more_data_is_zero() {
        let data = cluster(0, &[encoded_simple_block(1, 0, 0x80, &[0x01])]);
        let mut demux = demuxer(av_config());
        // Cluster header is 6 bytes (4-byte ID + 2-byte size); a 3-byte
        // prefix holds no complete element.
        assert_eq!(demux.parse(&data[..3]).unwrap(), 0);
    }

    #[test]
    fn test_eight_byte_size_vint_child() {
        // Muxers may pick the widest size encoding; this timecode element
        // declares its 1-byte body with an 8-byte size vint.
        let mut body = vec![0xE7, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x0A];
        body.extend_from_slice(&encoded_simple_block(1, 0, 0x80, &[0x01]));

        let mut data = CLUSTER_ID.to_be_bytes().to_vec();
        data.push(0x80 | body.len() as u8);
        data.extend_from_slice(&body);

        let mut demux = demuxer(av_config());
        assert_eq!(demux.parse(&data).unwrap(), data.len());
        assert_eq!(
            demux.audio_buffers()[0].timestamp(),
            TimeDelta::from_millis(10)
        );
    }

    #[test]
    fn test_wrong_top_level_element_is_fatal() {
        let mut demux = demuxer(av_config());
        // Segment ID instead of a cluster.
        assert!(demux.parse(&[0x18, 0x53, 0x80, 0x67, 0x81, 0x00]).is_err());
    }

    #[test]
    fn test_lacing_is_fatal() {
        // Flags 0x06: EBML lacing.
        let data = cluster(0, &[encoded_simple_block(1, 0, 0x86, &[0x01, 0x02])]);
        let mut demux = demuxer(av_config());
        assert!(matches!(
            demux.parse(&data).unwrap_err(),
            Error::Unsupported(_)
        ));
    }

    #[test]
    fn test_block_before_timecode_is_fatal() {
        let mut body = Vec::new();
        push_element(
            &mut body,
            SIMPLE_BLOCK_ID,
            &simple_block(1, 0, 0x80, &[0x01]),
        );
        let mut data = CLUSTER_ID.to_be_bytes().to_vec();
        data.push(0x80 | body.len() as u8);
        data.extend_from_slice(&body);

        let mut demux = demuxer(av_config());
        assert!(demux.parse(&data).is_err());
    }

    #[test]
    fn test_negative_absolute_timecode_is_fatal() {
        let data = cluster(5, &[encoded_simple_block(1, -10, 0x80, &[0x01])]);
        let mut demux = demuxer(av_config());
        assert!(demux.parse(&data).is_err());
    }

    #[test]
    fn test_negative_relative_timecode_is_accepted() {
        let data = cluster(50, &[encoded_simple_block(1, -10, 0x80, &[0x01])]);
        let mut demux = demuxer(av_config());
        demux.parse(&data).unwrap();
        assert_eq!(
            demux.audio_buffers()[0].timestamp(),
            TimeDelta::from_millis(40)
        );
    }

    #[test]
    fn test_timecode_regression_is_fatal() {
        let data = cluster(
            0,
            &[
                encoded_simple_block(1, 20, 0x80, &[0x01]),
                encoded_simple_block(1, 10, 0x80, &[0x02]),
            ],
        );
        let mut demux = demuxer(av_config());
        assert!(demux.parse(&data).is_err());
    }

    #[test]
    fn test_unknown_track_is_fatal() {
        let data = cluster(0, &[encoded_simple_block(7, 0, 0x80, &[0x01])]);
        let mut demux = demuxer(av_config());
        assert!(matches!(
            demux.parse(&data).unwrap_err(),
            Error::UnknownTrack(7)
        ));
    }

    #[test]
    fn test_ignored_track_is_dropped_silently() {
        let mut config = av_config();
        config.ignored_tracks.insert(7);
        let data = cluster(
            0,
            &[
                encoded_simple_block(7, 0, 0x80, &[0x01]),
                encoded_simple_block(1, 10, 0x80, &[0x02]),
            ],
        );
        let mut demux = demuxer(config);
        assert_eq!(demux.parse(&data).unwrap(), data.len());
        assert_eq!(demux.audio_buffers().len(), 1);
    }

    #[test]
    fn test_block_group_with_duration() {
        let mut group = Vec::new();
        push_element(&mut group, BLOCK_ID, &simple_block(1, 10, 0x00, &[0xAA]));
        push_element(&mut group, BLOCK_DURATION_ID, &[0x14]); // 20 units

        let mut encoded = Vec::new();
        push_element(&mut encoded, BLOCK_GROUP_ID, &group);
        let data = cluster(0, &[encoded]);

        let mut demux = demuxer(av_config());
        demux.parse(&data).unwrap();
        let audio = demux.audio_buffers();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].duration(), Some(TimeDelta::from_millis(20)));
        // Grouped audio blocks are keyframes regardless of the flag bit.
        assert!(audio[0].is_keyframe());
    }

    #[test]
    fn test_block_group_discard_padding() {
        let mut group = Vec::new();
        push_element(&mut group, BLOCK_ID, &simple_block(1, 0, 0x00, &[0xAA]));
        push_element(&mut group, BLOCK_DURATION_ID, &[0x0A]);
        // 2_000_000 ns = 2ms back padding.
        push_element(&mut group, DISCARD_PADDING_ID, &[0x1E, 0x84, 0x80]);

        let mut encoded = Vec::new();
        push_element(&mut encoded, BLOCK_GROUP_ID, &group);
        let data = cluster(0, &[encoded]);

        let mut demux = demuxer(av_config());
        demux.parse(&data).unwrap();
        assert_eq!(
            demux.audio_buffers()[0].discard_padding(),
            Some((TimeDelta::ZERO, TimeDelta::from_millis(2)))
        );
    }

    #[test]
    fn test_block_group_with_two_blocks_is_fatal() {
        let mut group = Vec::new();
        push_element(&mut group, BLOCK_ID, &simple_block(1, 0, 0x00, &[0xAA]));
        push_element(&mut group, BLOCK_ID, &simple_block(1, 5, 0x00, &[0xBB]));

        let mut encoded = Vec::new();
        push_element(&mut encoded, BLOCK_GROUP_ID, &group);
        let data = cluster(0, &[encoded]);

        let mut demux = demuxer(av_config());
        assert!(demux.parse(&data).is_err());
    }

    #[test]
    fn test_block_additional_becomes_side_data() {
        let mut more = Vec::new();
        push_element(&mut more, BLOCK_ADD_ID, &[0x01]);
        push_element(&mut more, BLOCK_ADDITIONAL_ID, &[0xDE, 0xAD]);
        let mut additions = Vec::new();
        push_element(&mut additions, BLOCK_MORE_ID, &more);

        let mut group = Vec::new();
        push_element(&mut group, BLOCK_ID, &simple_block(1, 0, 0x00, &[0xAA]));
        push_element(&mut group, BLOCK_DURATION_ID, &[0x0A]);
        push_element(&mut group, BLOCK_ADDITIONS_ID, &additions);

        let mut encoded = Vec::new();
        push_element(&mut encoded, BLOCK_GROUP_ID, &group);
        let data = cluster(0, &[encoded]);

        let mut demux = demuxer(av_config());
        demux.parse(&data).unwrap();
        assert_eq!(demux.audio_buffers()[0].side_data(), Some(&[0xDE, 0xAD][..]));
    }

    #[test]
    fn test_text_track_requires_duration() {
        let mut config = av_config();
        config.text_tracks.insert(3, TextTrackConfig::default());

        // Text via SimpleBlock has no BlockDuration.
        let data = cluster(0, &[encoded_simple_block(3, 0, 0x80, b"hi")]);
        let mut demux = demuxer(config.clone());
        assert!(matches!(
            demux.parse(&data).unwrap_err(),
            Error::MissingTextDuration(3)
        ));

        // Text via BlockGroup with a duration parses.
        let mut group = Vec::new();
        push_element(&mut group, BLOCK_ID, &simple_block(3, 0, 0x00, b"hi"));
        push_element(&mut group, BLOCK_DURATION_ID, &[0x32]);
        let mut encoded = Vec::new();
        push_element(&mut encoded, BLOCK_GROUP_ID, &group);
        let data = cluster(0, &[encoded]);

        let mut demux = demuxer(config);
        demux.parse(&data).unwrap();
        let text = demux.text_buffers();
        assert_eq!(text[&3].len(), 1);
        assert_eq!(text[&3][0].duration(), Some(TimeDelta::from_millis(50)));
    }

    #[test]
    fn test_encrypted_block_strips_signal_and_iv() {
        let mut config = av_config();
        config.audio_encryption_key_id = vec![0x11, 0x22];

        let mut payload = vec![0x01]; // signal: encrypted
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]); // IV
        payload.extend_from_slice(&[0xCA, 0xFE]);
        let data = cluster(0, &[encoded_simple_block(1, 0, 0x80, &payload)]);

        let mut demux = demuxer(config);
        demux.parse(&data).unwrap();
        let audio = demux.audio_buffers();
        assert_eq!(audio[0].data(), &[0xCA, 0xFE]);
        let decrypt = audio[0].decrypt_config().unwrap();
        assert_eq!(decrypt.key_id, vec![0x11, 0x22]);
        assert_eq!(decrypt.iv, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_encrypted_block_too_short_is_fatal() {
        let mut config = av_config();
        config.audio_encryption_key_id = vec![0x11];

        // Signal byte claims encryption but only 7 IV bytes follow.
        let mut payload = vec![0x01];
        payload.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7]);
        let data = cluster(0, &[encoded_simple_block(1, 0, 0x80, &payload)]);

        let mut demux = demuxer(config);
        assert!(demux.parse(&data).is_err());
    }

    #[test]
    fn test_clear_block_in_encrypted_track() {
        let mut config = av_config();
        config.audio_encryption_key_id = vec![0x11];

        let payload = vec![0x00, 0xAB]; // signal: clear
        let data = cluster(0, &[encoded_simple_block(1, 0, 0x80, &payload)]);

        let mut demux = demuxer(config);
        demux.parse(&data).unwrap();
        let audio = demux.audio_buffers();
        assert_eq!(audio[0].data(), &[0xAB]);
        assert!(audio[0].decrypt_config().unwrap().iv.is_empty());
    }

    #[test]
    fn test_cross_track_withholding() {
        // Audio at 0 and 30 with a hold at 30; video at 10 with explicit
        // duration via block group.
        let mut group = Vec::new();
        push_element(&mut group, BLOCK_ID, &simple_block(2, 10, 0x00, &[0x10]));
        push_element(&mut group, BLOCK_DURATION_ID, &[0x0A]);
        let mut video_block = Vec::new();
        push_element(&mut video_block, BLOCK_GROUP_ID, &group);

        let data = cluster(
            0,
            &[
                encoded_simple_block(1, 0, 0x80, &[0x01]),
                video_block,
                encoded_simple_block(1, 30, 0x80, &[0x02]),
            ],
        );

        // Truncate the cluster so it has not ended: rebuild with a larger
        // declared size than provided.
        let mut open = data.clone();
        // Patch the 2-byte size vint to claim 60 more bytes.
        let declared = ((open[4] as usize & 0x3F) << 8 | open[5] as usize) + 60;
        open[4] = 0x40 | (declared >> 8) as u8;
        open[5] = (declared & 0xFF) as u8;

        let mut demux = demuxer(av_config());
        demux.parse(&open).unwrap();
        assert!(!demux.cluster_ended());

        // Audio holds back its buffer at 30ms (unknown duration); the bound
        // is 30ms, so audio@0 and video@10 release but nothing at/after 30.
        assert_eq!(demux.audio_buffers().len(), 1);
        assert_eq!(demux.video_buffers().len(), 1);
    }

    #[test]
    fn test_unknown_size_cluster_ends_at_next_cluster() {
        let mut data = CLUSTER_ID.to_be_bytes().to_vec();
        data.push(0xFF); // unknown size
        push_element(&mut data, TIMECODE_ID, &[0x00]);
        push_element(
            &mut data,
            SIMPLE_BLOCK_ID,
            &simple_block(1, 5, 0x80, &[0x01]),
        );
        let tail = cluster(100, &[encoded_simple_block(1, 0, 0x80, &[0x02])]);
        data.extend_from_slice(&tail);

        let mut demux = demuxer(av_config());
        let consumed = demux.parse(&data).unwrap();
        // Stops at the next cluster header without consuming it.
        assert_eq!(consumed, data.len() - tail.len());
        assert!(demux.cluster_ended());
        assert_eq!(demux.audio_buffers().len(), 1);
    }

    #[test]
    fn test_parse_after_end_consumes_nothing() {
        let data = cluster(0, &[encoded_simple_block(1, 0, 0x80, &[0x01])]);
        let mut demux = demuxer(av_config());
        demux.parse(&data).unwrap();
        assert!(demux.cluster_ended());
        assert_eq!(demux.parse(&data).unwrap(), 0);

        demux.reset();
        assert_eq!(demux.parse(&data).unwrap(), data.len());
    }

    #[test]
    fn test_getters_memoized_within_cycle() {
        let data = cluster(0, &[encoded_simple_block(1, 0, 0x80, &[0x01])]);
        let mut demux = demuxer(av_config());
        demux.parse(&data).unwrap();
        assert_eq!(demux.audio_buffers().len(), 1);
        // Second access within the same cycle sees the same release.
        assert_eq!(demux.audio_buffers().len(), 1);
    }
}
