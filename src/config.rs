use std::path::PathBuf;
use std::time::Duration;

/// Default location of the pose landmarker model, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "assets/models/pose_landmarker_lite.task";

/// Construction parameters handed to an annotator factory. The landmarker always runs
/// in video mode, fed strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatorOptions {
    pub model_path: PathBuf,
    pub num_poses: usize,
    pub min_detection_confidence: f32,
    pub min_presence_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for AnnotatorOptions {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            num_poses: 1,
            min_detection_confidence: 0.5,
            min_presence_confidence: 0.5,
            min_tracking_confidence: 0.5,
        }
    }
}

/// Tunables of the playback pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_target_fps: f64,
    pub fallback_fps: f64,
    pub max_frame_width: u32,
    pub idle_interval: Duration,
    pub stop_timeout: Duration,
    pub event_capacity: usize,
    pub annotator: AnnotatorOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_target_fps: 30.0,
            fallback_fps: 30.0,
            max_frame_width: 640,
            idle_interval: Duration::from_millis(50),
            stop_timeout: Duration::from_millis(3000),
            event_capacity: 64,
            annotator: AnnotatorOptions::default(),
        }
    }
}

impl PipelineConfig {
    /// Upper bound for the emitted frame rate.
    pub fn max_target_fps(mut self, fps: f64) -> Self {
        self.max_target_fps = fps;
        self
    }

    /// Frames wider than this are downscaled before detection.
    pub fn max_frame_width(mut self, width: u32) -> Self {
        self.max_frame_width = width;
        self
    }

    /// Poll interval of a paused worker.
    pub fn idle_interval(mut self, interval: Duration) -> Self {
        self.idle_interval = interval;
        self
    }

    /// Bounded wait performed by `stop()`.
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout = timeout;
        self
    }

    /// Length of the worker -> caller event queue.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Path of the landmarker model asset.
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.annotator.model_path = path.into();
        self
    }

    /// Effective output rate for a source running at `source_fps`.
    pub fn target_fps(&self, source_fps: f64) -> f64 {
        let fps = self.source_fps(source_fps);
        fps.min(self.max_target_fps)
    }

    /// `source_fps`, or the fallback when the source reported nothing usable.
    pub fn source_fps(&self, source_fps: f64) -> f64 {
        if source_fps.is_finite() && source_fps > 0.0 {
            source_fps
        } else {
            self.fallback_fps
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_single_subject_video_mode() {
        let options = AnnotatorOptions::default();
        assert_eq!(options.num_poses, 1);
        assert_eq!(options.min_detection_confidence, 0.5);
        assert_eq!(options.min_presence_confidence, 0.5);
        assert_eq!(options.min_tracking_confidence, 0.5);
    }

    #[test]
    fn target_fps_is_capped() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_fps(60.0), 30.0);
        assert_eq!(config.target_fps(24.0), 24.0);
    }

    #[test]
    fn invalid_source_fps_falls_back() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_fps(0.0), 30.0);
        assert_eq!(config.source_fps(f64::NAN), 30.0);
        assert_eq!(config.target_fps(-1.0), 30.0);
    }

    #[test]
    fn event_capacity_never_zero() {
        let config = PipelineConfig::default().event_capacity(0);
        assert_eq!(config.event_capacity, 1);
    }
}
