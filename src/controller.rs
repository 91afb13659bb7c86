use crate::Error;
use crate::annotator::AnnotatorFactory;
use crate::config::PipelineConfig;
use crate::event::PlaybackEvent;
use crate::pump::{CommandState, FramePump, SharedCommands};
use crate::source::{SourceFactory, gst_source_factory};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const WORKER_NAME: &str = "pose-playback";

/// Properties of the loaded video, fixed until the next `load`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Source frame rate, already replaced by the fallback when the stream reported none.
    pub source_fps: f64,
    pub total_frames: u64,
}

impl SessionInfo {
    /// Clamp a seek target into `[0, total_frames - 1]`. With an unknown length the
    /// target is kept as is and a position past the end just reaches end of stream.
    pub fn clamp_frame(&self, frame_index: u64) -> u64 {
        match self.total_frames {
            0 => frame_index,
            total => frame_index.min(total - 1),
        }
    }

    /// Seconds covered by `frames` at the source rate.
    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        if self.source_fps > 0.0 {
            frames as f64 / self.source_fps
        } else {
            0.0
        }
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames_to_secs(self.total_frames)
    }

    /// `"MM:SS / MM:SS"` for `frame_index` against the session length.
    pub fn time_label(&self, frame_index: u64) -> String {
        let cur = self.frames_to_secs(frame_index) as u64;
        let total = self.duration_secs() as u64;
        format!(
            "{:02}:{:02} / {:02}:{:02}",
            cur / 60,
            cur % 60,
            total / 60,
            total % 60
        )
    }
}

struct Worker {
    handle: JoinHandle<()>,
    /// Disconnects once the thread has finished its cleanup.
    done: Receiver<()>,
    generation: u64,
}

impl Worker {
    fn join(self) {
        if let Err(e) = self.handle.join() {
            let msg = if let Some(s) = e.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = e.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".into()
            };
            log::error!("playback worker {} panicked: {msg}", self.generation);
        }
    }
}

/// Transport controls of the pose playback pipeline.
///
/// All methods take `&self` and may be called from any thread. Decoding and pose
/// detection happen on a dedicated worker thread started by [`play`](Self::play);
/// results arrive on the channel returned by [`events`](Self::events).
///
/// ```no_run
/// use pose_playback::{PlaybackController, PlaybackEvent};
/// # fn annotators() -> pose_playback::AnnotatorFactory { unimplemented!() }
///
/// let controller = PlaybackController::new(annotators());
/// let session = controller.load("clip.mp4")?;
/// println!("{}x{} @ {:.1} fps", session.width, session.height, session.source_fps);
///
/// controller.play()?;
/// for event in controller.events() {
///     match event {
///         PlaybackEvent::FrameReady(frame) => println!("frame {}", frame.frame_index),
///         PlaybackEvent::PlaybackFinished | PlaybackEvent::ErrorOccurred(_) => break,
///         _ => {}
///     }
/// }
/// # Ok::<(), pose_playback::Error>(())
/// ```
pub struct PlaybackController {
    config: PipelineConfig,
    commands: SharedCommands,
    session: Mutex<Option<SessionInfo>>,
    /// Workers not yet adopted by a newer run, oldest first.
    workers: Mutex<Vec<Worker>>,
    events_tx: Sender<PlaybackEvent>,
    events_rx: Receiver<PlaybackEvent>,
    open_source: SourceFactory,
    annotators: AnnotatorFactory,
}

impl PlaybackController {
    pub fn new(annotators: AnnotatorFactory) -> Self {
        Self::with_config(PipelineConfig::default(), annotators)
    }

    pub fn with_config(config: PipelineConfig, annotators: AnnotatorFactory) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::bounded(config.event_capacity.max(1));
        Self {
            config,
            commands: Arc::new(Mutex::new(CommandState::default())),
            session: Mutex::new(None),
            workers: Mutex::new(Vec::new()),
            events_tx,
            events_rx,
            open_source: gst_source_factory(),
            annotators,
        }
    }

    /// Replace the GStreamer backend with another source implementation.
    pub fn with_source(mut self, open_source: SourceFactory) -> Self {
        self.open_source = open_source;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Probe `path` and make it the current session. The source is closed again right
    /// away; nothing is decoded and no thread is started.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<SessionInfo, Error> {
        let path = path.as_ref();
        let mut source = (self.open_source)(path).map_err(|e| e.into_open(path))?;
        let info = source.info();
        source.close();

        let session = SessionInfo {
            source_path: path.to_path_buf(),
            width: info.width,
            height: info.height,
            source_fps: self.config.source_fps(info.fps),
            total_frames: info.total_frames,
        };
        log::info!(
            "loaded {}: {}x{} @ {:.2} fps, {} frames",
            path.display(),
            session.width,
            session.height,
            session.source_fps,
            session.total_frames
        );

        {
            let mut commands = self.commands.lock();
            commands.seek_requested = false;
            commands.seek_target = 0;
        }
        *self.session.lock() = Some(session.clone());
        Ok(session)
    }

    /// Start playback, or resume it when a worker is already running.
    pub fn play(&self) -> Result<(), Error> {
        let session = self.session.lock().clone().ok_or(Error::NotLoaded)?;

        let mut slot = self.workers.lock();
        let generation = {
            let mut commands = self.commands.lock();
            commands.is_playing = true;
            commands.stop_requested = false;
            if commands.active {
                log::debug!("resuming playback");
                return Ok(());
            }
            commands.generation += 1;
            commands.active = true;
            commands.generation
        };

        // workers left behind by a timed out stop or a finished run
        let previous = std::mem::take(&mut *slot);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);
        let pump = FramePump::new(
            session,
            self.config.clone(),
            self.commands.clone(),
            generation,
            self.events_tx.clone(),
            self.open_source.clone(),
            self.annotators.clone(),
        );

        let spawned = thread::Builder::new()
            .name(WORKER_NAME.into())
            .spawn(move || {
                let _done = done_tx;
                for worker in previous {
                    worker.join();
                }
                pump.run();
            });

        match spawned {
            Ok(handle) => {
                slot.push(Worker {
                    handle,
                    done: done_rx,
                    generation,
                });
                Ok(())
            }
            Err(e) => {
                let mut commands = self.commands.lock();
                if commands.generation == generation {
                    commands.active = false;
                    commands.is_playing = false;
                }
                Err(Error::Spawn(e))
            }
        }
    }

    pub fn pause(&self) {
        self.commands.lock().is_playing = false;
    }

    /// Request a jump to `frame_index`, honoured on the next worker iteration whether
    /// playing or paused. Targets past the end of the session are clamped to the last
    /// frame; with an unknown length they are kept. Returns the effective target.
    pub fn seek(&self, frame_index: u64) -> u64 {
        let target = match self.session.lock().as_ref() {
            Some(session) => session.clamp_frame(frame_index),
            None => frame_index,
        };
        if target != frame_index {
            log::debug!("seek target {frame_index} clamped to {target}");
        }
        let mut commands = self.commands.lock();
        commands.seek_requested = true;
        commands.seek_target = target;
        target
    }

    /// Request shutdown and wait up to `stop_timeout` for the worker to exit.
    ///
    /// Returns `false` when the wait timed out. The run is then abandoned: the worker
    /// may still be finishing its current iteration, but it emits no terminal event and
    /// the next run joins it before emitting anything. The worker slot is not held
    /// during the wait.
    pub fn stop(&self) -> bool {
        {
            let mut commands = self.commands.lock();
            commands.is_playing = false;
            commands.stop_requested = true;
        }

        let workers = std::mem::take(&mut *self.workers.lock());
        let Some(current) = workers.last() else {
            return true;
        };
        let generation = current.generation;
        match current.done.recv_timeout(self.config.stop_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                for worker in workers {
                    worker.join();
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!("{}", Error::ShutdownTimeout(self.config.stop_timeout));
                {
                    let mut commands = self.commands.lock();
                    if commands.generation == generation {
                        commands.generation += 1;
                        commands.active = false;
                        commands.is_playing = false;
                    }
                }
                let mut slot = self.workers.lock();
                let newer = std::mem::replace(&mut *slot, workers);
                slot.extend(newer);
                false
            }
        }
    }

    /// Stop playback and forget the session.
    pub fn release(&self) -> bool {
        let stopped = self.stop();
        *self.session.lock() = None;
        stopped
    }

    pub fn session(&self) -> Option<SessionInfo> {
        self.session.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        self.commands.lock().is_playing
    }

    /// Whether a worker is running for the current run.
    pub fn is_running(&self) -> bool {
        self.commands.lock().active
    }

    /// Receiving end of the event queue. Events are delivered in emission order.
    pub fn events(&self) -> Receiver<PlaybackEvent> {
        self.events_rx.clone()
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(total_frames: u64, fps: f64) -> SessionInfo {
        SessionInfo {
            source_path: PathBuf::from("clip.mp4"),
            width: 640,
            height: 360,
            source_fps: fps,
            total_frames,
        }
    }

    #[test]
    fn clamps_to_last_frame() {
        let s = session(100, 30.0);
        assert_eq!(s.clamp_frame(150), 99);
        assert_eq!(s.clamp_frame(42), 42);
    }

    #[test]
    fn unknown_length_keeps_target() {
        assert_eq!(session(0, 30.0).clamp_frame(5), 5);
        assert_eq!(session(0, 30.0).duration_secs(), 0.0);
    }

    #[test]
    fn duration_from_frames() {
        assert_eq!(session(300, 30.0).duration_secs(), 10.0);
        assert_eq!(session(300, 0.0).duration_secs(), 0.0);
    }

    #[test]
    fn formats_time_label() {
        let s = session(3 * 60 * 25 + 25 * 7, 25.0);
        assert_eq!(s.time_label(0), "00:00 / 03:07");
        assert_eq!(s.time_label(25 * 61 + 3), "01:01 / 03:07");
    }

    #[test]
    fn play_without_load_fails() {
        let controller = PlaybackController::new(Arc::new(|_: &crate::AnnotatorOptions| {
            Err::<Box<dyn crate::PoseAnnotator>, _>(Error::Detector("unused".into()))
        }));
        assert!(matches!(controller.play(), Err(Error::NotLoaded)));
        assert!(!controller.is_running());
        assert!(controller.stop());
    }
}
