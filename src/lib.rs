//! # Pose Playback
//!
//! Video playback with frame-by-frame pose estimation, using GStreamer for decoding.
//!
//! ## Features
//!
//! - GStreamer-powered video decoding on a dedicated worker thread
//! - CPU-based NV12 to RGBA conversion
//! - Frame-rate governor that paces output and evenly skips frames of fast sources
//! - Pluggable pose detector with skeleton overlay and joint-angle extraction
//! - Transport controls (play, pause, seek, stop) safe to call from any thread
//! - Event-driven architecture for frames, position, frame rate and errors
//!
//! ## Example
//!
//! ```rust,no_run
//! use pose_playback::{
//!     AnnotatorOptions, PlaybackController, PlaybackEvent, PoseAnnotator, PoseResult,
//! };
//! use std::sync::Arc;
//!
//! struct NoPose;
//!
//! impl PoseAnnotator for NoPose {
//!     fn detect(
//!         &mut self,
//!         _frame: &image::RgbaImage,
//!         _timestamp_ms: u64,
//!     ) -> Result<PoseResult, pose_playback::Error> {
//!         Ok(PoseResult::empty())
//!     }
//!     fn reset(&mut self) {}
//!     fn release(&mut self) {}
//! }
//!
//! fn main() -> Result<(), pose_playback::Error> {
//!     let controller = PlaybackController::new(Arc::new(|_: &AnnotatorOptions| {
//!         Ok(Box::new(NoPose) as Box<dyn PoseAnnotator>)
//!     }));
//!     controller.load("/path/to/video.mp4")?;
//!     controller.play()?;
//!
//!     for event in controller.events() {
//!         if let PlaybackEvent::FrameReady(frame) = &event {
//!             println!("{:?}", frame.angles);
//!         }
//!         if event.is_terminal() {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod angle;
mod annotator;
mod config;
mod controller;
mod error;
mod event;
mod governor;
mod pose;
mod pump;
mod skeleton;
mod source;
mod video;

pub use angle::{Joint, JointAngles, angle};
pub use annotator::{Annotated, AnnotatorFactory, PoseAnnotator};
pub use config::{AnnotatorOptions, DEFAULT_MODEL_PATH, PipelineConfig};
pub use controller::{PlaybackController, SessionInfo};
pub use error::Error;
pub use event::{FrameEvent, PlaybackEvent};
pub use governor::FrameRateGovernor;
pub use pose::{Landmark, LandmarkIndex, Pose, PoseResult};
pub use skeleton::{SKELETON_CONNECTIONS, draw_pose};
pub use source::{SourceFactory, SourceInfo, VideoSource, gst_source_factory};
pub use video::GstVideoSource;

// Re-export commonly used types
pub use gstreamer as gst;
pub use url::Url;
