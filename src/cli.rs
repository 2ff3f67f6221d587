use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "streamkit")]
#[command(author, version, about = "Media container demuxing inspection tool")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Demux a raw cluster stream and print the released buffers
    Clusters {
        /// File containing raw WebM cluster data
        #[arg(required = true)]
        input: PathBuf,

        /// Audio track number
        #[arg(long)]
        audio_track: Option<u64>,

        /// Video track number
        #[arg(long)]
        video_track: Option<u64>,

        /// Text track number (may be repeated)
        #[arg(long)]
        text_track: Vec<u64>,

        /// Nanoseconds per container timecode unit
        #[arg(long, default_value = "1000000")]
        timecode_scale: u64,

        /// Video codec for keyframe probing (vp8 or vp9)
        #[arg(long, default_value = "vp8")]
        video_codec: String,
    },

    /// Scan an ADTS audio stream and print configs and frame timing
    Adts {
        /// File containing a raw ADTS stream
        #[arg(required = true)]
        input: PathBuf,

        /// Presentation timestamp of the first frame, in milliseconds
        #[arg(long, default_value = "0")]
        start_pts_ms: i64,
    },

    /// Display version information
    Version,
}
