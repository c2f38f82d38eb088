mod source;

use source::RawFrameReader;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use video_check_common::config::Config;
use video_check_common::frame::{parse_fourcc, FrameDescriptor, RawFrame};
use video_check_engine::{FrameOutcome, SharedVideoCheck, VideoCheck, VideoCheckError};

/// Frames buffered between the file reader and the engine.
const FRAME_QUEUE_DEPTH: usize = 8;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("video-check.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    let Some(fourcc) = parse_fourcc(&config.source.pixel_format) else {
        error!(pixel_format = config.source.pixel_format, "unreadable pixel format tag");
        std::process::exit(1);
    };
    let engine = match VideoCheck::for_pixel_format(fourcc, config.analysis.clone()) {
        Ok(engine) => engine,
        Err(e) => {
            error!(error = %e, pixel_format = config.source.pixel_format, "cannot analyze this stream");
            std::process::exit(1);
        }
    };

    let format = engine.pixel_format();
    let descriptor = FrameDescriptor {
        width: config.source.width,
        height: config.source.height,
        format,
        bytes_per_row: config
            .source
            .bytes_per_row
            .map(|b| b as usize)
            .unwrap_or_else(|| format.min_bytes_per_row(config.source.width)),
    };

    info!(
        path = %config.source.path.display(),
        pixel_format = %format.tag(),
        width = descriptor.width,
        height = descriptor.height,
        fps = config.source.fps,
        "starting video check"
    );

    let reader = match RawFrameReader::open(&config.source.path, descriptor, config.source.fps).await {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "failed to open frame source");
            std::process::exit(1);
        }
    };

    let shared = SharedVideoCheck::new(engine);
    let (tx, rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
    let reader_task = tokio::spawn(source::run_reader(reader, tx));
    let ingest_task = tokio::task::spawn_blocking({
        let shared = shared.clone();
        move || ingest_frames(&shared, rx)
    });

    let source_failed = tokio::select! {
        result = ingest_task => {
            if let Err(e) = result {
                error!(error = %e, "frame ingest task failed");
            }
            match source::join_reader(reader_task).await {
                Ok(sent) => {
                    debug!(sent, "frame reader finished");
                    false
                }
                Err(e) => {
                    error!(error = %e, "frame source failed, the report covers a truncated stream");
                    true
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, summarizing the frames seen so far");
            reader_task.abort();
            false
        }
    };

    shared.end_of_stream();

    let mut stdout = std::io::stdout().lock();
    match shared.summarize_analysis(&mut stdout) {
        Ok(()) if source_failed => std::process::exit(1),
        Ok(()) => {}
        Err(VideoCheckError::InsufficientData) => {
            error!("no frames were analyzed, nothing to summarize");
            std::process::exit(2);
        }
        Err(e) => {
            error!(error = %e, "failed to summarize analysis");
            std::process::exit(1);
        }
    }
}

/// Runs on a blocking thread, the way a capture callback would deliver frames.
fn ingest_frames(shared: &SharedVideoCheck, mut rx: mpsc::Receiver<RawFrame>) {
    let mut analyzed = 0u64;
    let mut total = 0u64;

    while let Some(frame) = rx.blocking_recv() {
        total += 1;
        if shared.ingest(&frame) == FrameOutcome::Analyzed {
            analyzed += 1;
        }
        if total % 100 == 0 {
            info!(total, analyzed, "frames processed");
        }
        if shared.is_finished() {
            info!("engine finished early, closing frame queue");
            break;
        }
    }
    info!(total, analyzed, "frame delivery ended");
}
