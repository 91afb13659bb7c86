use crate::Error;
use crate::angle::JointAngles;
use crate::config::AnnotatorOptions;
use crate::pose::PoseResult;
use crate::skeleton;
use image::RgbaImage;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

/// A stateful pose landmark detector.
///
/// Implementations may keep temporal smoothing or tracking state between calls and
/// expect `timestamp_ms` to increase strictly within one continuous run. The pipeline
/// calls one instance from a single thread only.
pub trait PoseAnnotator {
    fn detect(&mut self, frame: &RgbaImage, timestamp_ms: u64) -> Result<PoseResult, Error>;

    /// Drop temporal state. Safe to call any number of times.
    fn reset(&mut self);

    /// Free model resources. Idempotent.
    fn release(&mut self);
}

/// Builds an annotator from its options. Invoked on the worker thread.
pub type AnnotatorFactory =
    Arc<dyn Fn(&AnnotatorOptions) -> Result<Box<dyn PoseAnnotator>, Error> + Send + Sync + 'static>;

/// Result of annotating one frame.
#[derive(Debug, Clone)]
pub struct Annotated {
    pub frame: RgbaImage,
    pub poses: PoseResult,
    pub angles: JointAngles,
    pub timestamp_ms: u64,
}

/// Single-owner wrapper around a [`PoseAnnotator`] for one worker run.
///
/// Owns the detector timestamp clock and draws results onto frame copies. It is
/// neither `Clone` nor `Send`: it is created and dropped on the worker thread.
pub(crate) struct Annotator {
    factory: AnnotatorFactory,
    options: AnnotatorOptions,
    inner: Option<Box<dyn PoseAnnotator>>,
    timestamp_ms: u64,
    step_ms: u64,
    /// A reset arrived before the detector existed; replayed once it is created.
    pending_reset: bool,
    _not_send: PhantomData<Rc<()>>,
}

impl Annotator {
    pub(crate) fn new(factory: AnnotatorFactory, options: AnnotatorOptions, step_ms: u64) -> Self {
        Self {
            factory,
            options,
            inner: None,
            timestamp_ms: 0,
            step_ms: step_ms.max(1),
            pending_reset: false,
            _not_send: PhantomData,
        }
    }

    fn ensure_initialized(&mut self) -> Result<(), Error> {
        if self.inner.is_none() {
            log::debug!(
                "creating pose annotator from {}",
                self.options.model_path.display()
            );
            let mut inner = (self.factory)(&self.options)?;
            if std::mem::take(&mut self.pending_reset) {
                inner.reset();
            }
            self.inner = Some(inner);
            self.timestamp_ms = 0;
        }
        Ok(())
    }

    /// Detect on `frame`, overlay the result on a copy and extract joint angles from
    /// the primary pose.
    pub(crate) fn process(&mut self, frame: &RgbaImage) -> Result<Annotated, Error> {
        self.ensure_initialized()?;
        self.timestamp_ms += self.step_ms;
        let timestamp_ms = self.timestamp_ms;
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| Error::Detector("annotator unavailable".into()))?;
        let poses = inner.detect(frame, timestamp_ms)?;

        let mut annotated = frame.clone();
        for pose in &poses.poses {
            skeleton::draw_pose(&mut annotated, pose);
        }
        let angles = poses
            .primary()
            .map(|pose| JointAngles::from_pose(pose, frame.width(), frame.height()))
            .unwrap_or_default();

        Ok(Annotated {
            frame: annotated,
            poses,
            angles,
            timestamp_ms,
        })
    }

    /// Forget temporal state after a discontinuous jump.
    pub(crate) fn reset(&mut self) {
        match self.inner.as_mut() {
            Some(inner) => inner.reset(),
            None => self.pending_reset = true,
        }
        self.timestamp_ms = 0;
    }

    pub(crate) fn release(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.release();
        }
        self.pending_reset = false;
        self.timestamp_ms = 0;
    }

    #[cfg(test)]
    pub(crate) fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

impl Drop for Annotator {
    fn drop(&mut self) {
        self.release();
    }
}
