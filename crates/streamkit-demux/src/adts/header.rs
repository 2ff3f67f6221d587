//! ADTS fixed-header decoding.
//!
//! Header layout (56 bits, protection-absent form):
//!
//! ```text
//! syncword(12) id(1) layer(2) protection_absent(1)
//! profile(2) sampling_frequency_index(4) private(1) channel_configuration(3)
//! original(1) home(1) copyright_id(1) copyright_start(1)
//! frame_length(13) buffer_fullness(11) frames_minus_one(2)
//! ```
//!
//! When `protection_absent` is 0 a 16-bit CRC follows, making the header
//! 9 bytes instead of 7. `frame_length` counts the whole frame, header
//! included.

use serde::{Deserialize, Serialize};

/// PCM samples per AAC frame.
pub(crate) const SAMPLES_PER_FRAME: u64 = 1_024;

/// Sampling frequencies by `sampling_frequency_index`. Indices 13-15 are
/// reserved.
const FREQUENCY_TABLE: [u32; 13] = [
    96_000, 88_200, 64_000, 48_000, 44_100, 32_000, 24_000, 22_050, 16_000, 12_000, 11_025, 8_000,
    7_350,
];

/// Decoder-relevant audio parameters extracted from a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioConfig {
    /// AAC audio object type (profile + 1).
    pub object_type: u8,
    /// Sampling frequency in Hz.
    pub sample_rate: u32,
    /// Channel configuration (1-7).
    pub channels: u8,
}

/// One decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub config: AudioConfig,
    /// Total frame size in bytes, header included.
    pub frame_length: usize,
    /// 7 bytes, or 9 with the CRC present.
    pub header_size: usize,
}

/// Outcome of probing a byte position for a frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HeaderScan {
    /// Fewer bytes than a fixed header; retry with more data.
    NeedMoreData,
    /// The bytes cannot be a frame header; advance one byte and rescan.
    NotAHeader,
    Frame(FrameHeader),
}

/// Whether `data` begins with the 12-bit syncword followed by the required
/// all-zero layer field.
pub(crate) fn starts_with_syncword(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0xFF && data[1] & 0xF6 == 0xF0
}

/// Probe `data` for a frame header at offset zero.
pub(crate) fn parse_frame_header(data: &[u8]) -> HeaderScan {
    if data.len() < 7 {
        return HeaderScan::NeedMoreData;
    }
    if !starts_with_syncword(data) {
        return HeaderScan::NotAHeader;
    }

    let protection_absent = data[1] & 0x01 != 0;
    let profile = data[2] >> 6;
    let frequency_index = ((data[2] >> 2) & 0x0F) as usize;
    let channels = ((data[2] & 0x01) << 2) | (data[3] >> 6);
    let frame_length = (((data[3] & 0x03) as usize) << 11)
        | ((data[4] as usize) << 3)
        | ((data[5] as usize) >> 5);

    let Some(&sample_rate) = FREQUENCY_TABLE.get(frequency_index) else {
        return HeaderScan::NotAHeader;
    };
    if channels == 0 {
        return HeaderScan::NotAHeader;
    }

    let header_size = if protection_absent { 7 } else { 9 };
    if frame_length <= header_size {
        return HeaderScan::NotAHeader;
    }

    HeaderScan::Frame(FrameHeader {
        config: AudioConfig {
            object_type: profile + 1,
            sample_rate,
            channels,
        },
        frame_length,
        header_size,
    })
}

/// Build a protection-absent fixed header for tests.
#[cfg(test)]
pub(crate) fn header_bytes(frequency_index: u8, channels: u8, frame_length: usize) -> [u8; 7] {
    [
        0xFF,
        0xF1, // MPEG-4, layer 0, protection absent
        (0x01 << 6) | (frequency_index << 2) | (channels >> 2), // AAC LC
        ((channels & 0x03) << 6) | ((frame_length >> 11) & 0x03) as u8,
        ((frame_length >> 3) & 0xFF) as u8,
        (((frame_length & 0x07) as u8) << 5) | 0x1F,
        0xFC,
    ]
}
