use crate::Error;
use image::RgbaImage;
use std::path::Path;
use std::sync::Arc;

/// Stream properties probed when a source is opened.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Reported frame rate, 0.0 when unknown.
    pub fps: f64,
    pub total_frames: u64,
}

/// A seekable, frame-accurate video decoder.
///
/// Sources are opened and used on a single thread and need not be `Send`.
pub trait VideoSource {
    fn info(&self) -> SourceInfo;

    /// Decode the next frame, `Ok(None)` once the stream is exhausted.
    fn read(&mut self) -> Result<Option<RgbaImage>, Error>;

    /// Advance past the next frame without converting it. Returns `false` at end of stream.
    fn grab(&mut self) -> Result<bool, Error> {
        Ok(self.read()?.is_some())
    }

    /// Reposition so the next `read` yields frame `index`.
    fn seek_to_frame(&mut self, index: u64) -> Result<(), Error>;

    /// Index of the frame the next `read` will return.
    fn position(&self) -> u64;

    /// Release the decoder. Must be safe to call more than once.
    fn close(&mut self);
}

/// Opens sources by path. Called on the caller thread by `load` and on the worker
/// thread at the start of every run.
pub type SourceFactory =
    Arc<dyn Fn(&Path) -> Result<Box<dyn VideoSource>, Error> + Send + Sync + 'static>;

/// Factory for the GStreamer-backed source.
pub fn gst_source_factory() -> SourceFactory {
    Arc::new(|path: &Path| {
        let source = crate::video::GstVideoSource::open(path)?;
        Ok(Box::new(source) as Box<dyn VideoSource>)
    })
}
