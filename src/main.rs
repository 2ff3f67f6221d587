mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use streamkit_common::TimeDelta;
use streamkit_demux::{
    ClusterDemuxer, ClusterDemuxerConfig, FrameScanner, NullMetrics, StreamBuffer,
    TextTrackConfig, VideoCodec,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG if set, otherwise pick defaults from the verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "streamkit=trace,streamkit_demux=trace,streamkit_common=debug".to_string()
        } else {
            "streamkit=info,streamkit_demux=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Clusters {
            input,
            audio_track,
            video_track,
            text_track,
            timecode_scale,
            video_codec,
        } => inspect_clusters(
            &input,
            audio_track,
            video_track,
            &text_track,
            timecode_scale,
            &video_codec,
        ),
        Commands::Adts {
            input,
            start_pts_ms,
        } => inspect_adts(&input, start_pts_ms),
        Commands::Version => {
            println!("streamkit {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn inspect_clusters(
    input: &Path,
    audio_track: Option<u64>,
    video_track: Option<u64>,
    text_tracks: &[u64],
    timecode_scale: u64,
    video_codec: &str,
) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }
    if audio_track.is_none() && video_track.is_none() && text_tracks.is_empty() {
        anyhow::bail!("Specify at least one of --audio-track, --video-track, --text-track");
    }
    let video_codec = match video_codec {
        "vp8" => VideoCodec::Vp8,
        "vp9" => VideoCodec::Vp9,
        other => anyhow::bail!("Unknown video codec: {}", other),
    };

    let data = std::fs::read(input)?;
    tracing::info!("Read {} bytes from {:?}", data.len(), input);

    let config = ClusterDemuxerConfig {
        timecode_scale_ns: timecode_scale,
        audio_track_num: audio_track,
        video_track_num: video_track,
        video_codec,
        text_tracks: text_tracks
            .iter()
            .map(|&num| (num, TextTrackConfig::default()))
            .collect(),
        ..Default::default()
    };
    let mut demux = ClusterDemuxer::new(config, Box::new(NullMetrics));

    println!("cluster  kind   track  pts            dur            key  size");

    let mut pos = 0;
    let mut cluster_index = 0usize;
    let mut total = 0usize;
    while pos < data.len() {
        let consumed = demux
            .parse(&data[pos..])
            .map_err(|e| anyhow::anyhow!("Parse error at byte {}: {}", pos, e))?;

        for buf in demux.audio_buffers() {
            print_buffer(cluster_index, buf);
            total += 1;
        }
        for buf in demux.video_buffers() {
            print_buffer(cluster_index, buf);
            total += 1;
        }
        for bufs in demux.text_buffers().values() {
            for buf in *bufs {
                print_buffer(cluster_index, buf);
                total += 1;
            }
        }

        pos += consumed;
        if demux.cluster_ended() {
            demux.reset();
            cluster_index += 1;
        } else if consumed == 0 {
            anyhow::bail!("Truncated cluster stream at byte {}", pos);
        }
    }

    println!("\n{} buffers from {} clusters", total, cluster_index);
    Ok(())
}

fn print_buffer(cluster_index: usize, buf: &StreamBuffer) {
    let duration = buf
        .duration()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!(
        "{:>7}  {:<5}  {:>5}  {:>13}  {:>13}  {}  {} bytes",
        cluster_index,
        buf.track_type(),
        buf.track_id(),
        buf.timestamp().to_string(),
        duration,
        if buf.is_keyframe() { "yes" } else { "no " },
        buf.data().len(),
    );
}

fn inspect_adts(input: &Path, start_pts_ms: i64) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {:?}", input);
    }

    let data = std::fs::read(input)?;
    tracing::info!("Read {} bytes from {:?}", data.len(), input);

    let frames = Rc::new(RefCell::new(0usize));
    let counted = frames.clone();

    let mut scanner = FrameScanner::new(
        1,
        Box::new(|config| {
            println!(
                "config: object_type={} sample_rate={}Hz channels={}",
                config.object_type, config.sample_rate, config.channels
            );
        }),
        Box::new(move |buf| {
            let duration = buf
                .duration()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!(
                "frame  pts {:>13}  dur {:>9}  {} bytes",
                buf.timestamp().to_string(),
                duration,
                buf.data().len(),
            );
            *counted.borrow_mut() += 1;
        }),
    );

    scanner
        .parse(&data, Some(TimeDelta::from_millis(start_pts_ms)), None)
        .map_err(|e| anyhow::anyhow!("Scan error: {}", e))?;
    scanner.flush();

    println!("\n{} frames", frames.borrow());
    Ok(())
}
