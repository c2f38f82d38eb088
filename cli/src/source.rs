use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use video_check_common::frame::{FrameDescriptor, RawFrame};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open frame file {0}: {1}")]
    Open(PathBuf, std::io::Error),
    #[error("failed to read frame file: {0}")]
    Read(#[from] std::io::Error),
    #[error("frame reader task ended abnormally: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Reads back-to-back raw frames of a fixed layout from a file.
pub struct RawFrameReader {
    reader: BufReader<File>,
    descriptor: FrameDescriptor,
    frame_len: usize,
    fps: f64,
    seq: u64,
    exhausted: bool,
}

impl RawFrameReader {
    pub async fn open(path: &Path, descriptor: FrameDescriptor, fps: f64) -> Result<Self, SourceError> {
        let file = File::open(path)
            .await
            .map_err(|e| SourceError::Open(path.to_path_buf(), e))?;
        Ok(Self {
            reader: BufReader::new(file),
            descriptor,
            frame_len: descriptor.required_len(),
            fps,
            seq: 0,
            exhausted: false,
        })
    }

    /// Next frame, or `None` at end of file. A trailing partial frame is
    /// returned as-is so the engine can account for it.
    pub async fn next_frame(&mut self) -> Result<Option<RawFrame>, SourceError> {
        if self.exhausted {
            return Ok(None);
        }
        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                self.exhausted = true;
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < buf.len() {
            warn!(got = filled, expected = self.frame_len, "trailing partial frame");
            buf.truncate(filled);
        }

        let captured_at_ms = (self.seq as f64 * 1000.0 / self.fps).round() as i64;
        let frame = RawFrame::new(self.descriptor, buf, captured_at_ms, self.seq);
        self.seq += 1;
        Ok(Some(frame))
    }
}

/// Push every frame of `reader` into `tx` until the file ends or the
/// receiving side hangs up.
pub async fn run_reader(mut reader: RawFrameReader, tx: mpsc::Sender<RawFrame>) -> Result<u64, SourceError> {
    let mut sent = 0u64;
    while let Some(frame) = reader.next_frame().await? {
        if tx.send(frame).await.is_err() {
            debug!(sent, "frame consumer closed, stopping reader");
            return Ok(sent);
        }
        sent += 1;
    }
    info!(sent, "frame file exhausted");
    Ok(sent)
}

/// Wait for a [`run_reader`] task. An error means the stream was cut short.
pub async fn join_reader(task: JoinHandle<Result<u64, SourceError>>) -> Result<u64, SourceError> {
    task.await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use video_check_common::frame::PixelFormat;

    #[tokio::test]
    async fn reads_whole_and_partial_frames() {
        let path = std::env::temp_dir().join(format!("video-check-source-{}.raw", std::process::id()));
        let desc = FrameDescriptor::packed(PixelFormat::Rgb24, 2, 2);
        // Two full 12-byte frames plus 5 stray bytes.
        tokio::fs::write(&path, vec![7u8; 29]).await.unwrap();

        let mut reader = RawFrameReader::open(&path, desc, 25.0).await.unwrap();
        let first = reader.next_frame().await.unwrap().unwrap();
        let second = reader.next_frame().await.unwrap().unwrap();
        let partial = reader.next_frame().await.unwrap().unwrap();
        assert!(reader.next_frame().await.unwrap().is_none());

        assert_eq!((first.data.len(), first.captured_at_ms), (12, 0));
        assert_eq!((second.seq, second.captured_at_ms), (1, 40));
        assert_eq!(partial.data.len(), 5);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn reader_task_delivers_every_frame() {
        let path = std::env::temp_dir().join(format!("video-check-join-{}.raw", std::process::id()));
        let desc = FrameDescriptor::packed(PixelFormat::Rgb24, 2, 2);
        tokio::fs::write(&path, vec![1u8; 24]).await.unwrap();

        let reader = RawFrameReader::open(&path, desc, 30.0).await.unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(run_reader(reader, tx));
        let mut seqs = Vec::new();
        while let Some(frame) = rx.recv().await {
            seqs.push(frame.seq);
        }
        assert_eq!(seqs, vec![0, 1]);
        assert_eq!(join_reader(task).await.unwrap(), 2);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn read_failure_reaches_the_joiner() {
        // A directory opens fine on Linux but every read fails.
        let desc = FrameDescriptor::packed(PixelFormat::Rgb24, 2, 2);
        let reader = RawFrameReader::open(&std::env::temp_dir(), desc, 30.0).await.unwrap();
        let (tx, mut rx) = mpsc::channel(1);
        let task = tokio::spawn(run_reader(reader, tx));

        assert!(rx.recv().await.is_none());
        assert!(matches!(join_reader(task).await, Err(SourceError::Read(_))));
    }

    #[tokio::test]
    async fn missing_file_is_an_open_error() {
        let desc = FrameDescriptor::packed(PixelFormat::Rgb24, 2, 2);
        let result = RawFrameReader::open(Path::new("/nonexistent/frames.raw"), desc, 30.0).await;
        assert!(matches!(result, Err(SourceError::Open(..))));
    }
}
