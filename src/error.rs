use gstreamer as gst;
use std::path::PathBuf;
use std::time::Duration;

/// Errors produced by the playback pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source could not be opened; returned synchronously by `load`.
    #[error("failed to open video {}: {reason}", path.display())]
    VideoOpen { path: PathBuf, reason: String },
    /// Mid-stream read or seek failure.
    #[error("decode error: {0}")]
    Decode(String),
    /// The pose annotator failed.
    #[error("pose detector error: {0}")]
    Detector(String),
    /// The bounded wait in `stop()` elapsed before the worker exited.
    #[error("worker did not exit within {0:?}")]
    ShutdownTimeout(Duration),
    #[error("no video loaded")]
    NotLoaded,
    #[error("failed to spawn playback worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("{0}")]
    Glib(#[from] glib::Error),
    #[error("{0}")]
    Bool(#[from] glib::BoolError),
    #[error("failed to change pipeline state: {0}")]
    StateChange(#[from] gst::StateChangeError),
    #[error("failed to cast gstreamer element")]
    Cast,
    #[error("failed to query media caps")]
    Caps,
    #[error("invalid framerate: {0}")]
    Framerate(f64),
}

impl Error {
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::VideoOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Report any failure while opening `path` as [`Error::VideoOpen`].
    pub(crate) fn into_open(self, path: impl Into<PathBuf>) -> Self {
        match self {
            Error::VideoOpen { .. } => self,
            other => Error::open(path, other),
        }
    }
}
