use crate::angle::JointAngles;
use image::RgbaImage;

/// An annotated frame ready for display.
#[derive(Debug, Clone)]
pub struct FrameEvent {
    /// Copy of the decoded (and possibly downscaled) frame with the pose drawn on it.
    pub frame: RgbaImage,
    /// Source index of the decoded frame.
    pub frame_index: u64,
    /// Angles of the primary pose; empty when no pose was detected.
    pub angles: JointAngles,
}

/// Events delivered from the playback worker, in emission order.
///
/// Every run ends with at most one terminal event (`PlaybackFinished` or
/// `ErrorOccurred`); a run ended by `stop()` ends silently.
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    FrameReady(FrameEvent),
    /// Index of the next frame to be decoded.
    PositionChanged(u64),
    /// Instantaneous emitted frame rate.
    FpsUpdated(f64),
    PlaybackFinished,
    ErrorOccurred(String),
}

impl PlaybackEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackEvent::PlaybackFinished | PlaybackEvent::ErrorOccurred(_)
        )
    }
}
