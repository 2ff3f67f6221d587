//! Streamkit-Demux: container demuxing and buffer timing
//!
//! This crate turns raw per-block payloads extracted from streamed media
//! containers into per-track, ordered, uniformly timed decode buffers.
//!
//! # Modules
//!
//! - `buffer` - Timed decode buffers with splice and preroll support
//! - `track` - Per-track buffering state machine with duration inference
//! - `webm` - Incremental WebM/Matroska cluster demuxer
//! - `adts` - Frame-sync scanner for ADTS elementary audio streams
//! - `metrics` - Injected metrics-collector seam
//!
//! # Architecture
//!
//! Parsing is single-threaded, synchronous, and push-style: the caller owns
//! the byte queue and feeds slices into `ClusterDemuxer::parse` (or
//! `FrameScanner::parse`), which consume as much as they can and report how
//! many bytes they took. `Ok(0)` means "need more data"; an `Err` is fatal
//! for the current container unit, and the caller must resynchronize at the
//! next unit boundary or rebuild the parser.
//!
//! The cluster demuxer releases buffers across tracks only below a shared
//! "ready window" bound, so a consumer can never observe cross-track buffers
//! whose relative order could still be perturbed by a later duration
//! resolution on another track.

pub mod adts;
pub mod buffer;
pub mod error;
pub mod metrics;
pub mod track;
pub mod webm;

pub use adts::{AudioConfig, FrameScanner};
pub use buffer::{DecryptConfig, StreamBuffer};
pub use error::{Error, Result};
pub use metrics::{MetricsSink, NullMetrics};
pub use track::Track;
pub use webm::{ClusterDemuxer, ClusterDemuxerConfig, TextTrackConfig, VideoCodec};
