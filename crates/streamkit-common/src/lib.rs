//! Streamkit-Common: Shared time and track types.
//!
//! This crate provides the small vocabulary shared by every streamkit
//! parser:
//!
//! - **`TimeDelta`**: a signed, microsecond-precision quantity used for both
//!   presentation/decode timestamps and durations
//! - **`TrackType`**: the logical stream kinds a demuxer can produce
//!
//! # Examples
//!
//! ```
//! use streamkit_common::{TimeDelta, TrackType};
//!
//! let ts = TimeDelta::from_millis(40);
//! assert_eq!(ts + TimeDelta::from_millis(2), TimeDelta::from_micros(42_000));
//! assert_eq!(TrackType::Audio.to_string(), "audio");
//! ```

pub mod time;
pub mod types;

pub use time::TimeDelta;
pub use types::TrackType;
