use video_check_common::frame::FrameError;

pub type Result<T, E = VideoCheckError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum VideoCheckError {
    #[error("unsupported pixel format {fourcc:#010x}")]
    UnsupportedPixelFormat { fourcc: u32 },
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] FrameError),
    #[error("insufficient data: no frames were analyzed")]
    InsufficientData,
    #[error("failed to write {target}: {source}")]
    IoFailure {
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to render {format} report: {message}")]
    Render {
        format: &'static str,
        message: String,
    },
    #[error("failed to parse {format} report: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

impl VideoCheckError {
    pub(crate) fn io(target: impl Into<String>, source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::IoFailure {
            target: target.into(),
            source: source.into(),
        }
    }
}
