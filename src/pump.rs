use crate::Error;
use crate::annotator::{Annotator, AnnotatorFactory};
use crate::config::PipelineConfig;
use crate::controller::SessionInfo;
use crate::event::{FrameEvent, PlaybackEvent};
use crate::governor::FrameRateGovernor;
use crate::source::{SourceFactory, VideoSource};
use crossbeam_channel::{SendTimeoutError, Sender};
use image::{RgbaImage, imageops};
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Retry interval of an event send blocked on a full queue.
const SEND_RETRY: Duration = Duration::from_millis(20);

/// Commands shared between the controller and the worker.
///
/// Every access goes through one mutex and never sleeps or performs I/O while held.
#[derive(Debug, Default)]
pub(crate) struct CommandState {
    pub(crate) is_playing: bool,
    pub(crate) stop_requested: bool,
    pub(crate) seek_requested: bool,
    pub(crate) seek_target: u64,
    /// Run the current worker belongs to. A worker whose generation is stale exits.
    pub(crate) generation: u64,
    /// A worker of the current generation is running and has not begun to exit.
    pub(crate) active: bool,
}

pub(crate) type SharedCommands = Arc<Mutex<CommandState>>;

/// Snapshot taken at the top of each pump iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Poll {
    pub(crate) playing: bool,
    pub(crate) seek: Option<u64>,
}

impl CommandState {
    /// Read the commands for `generation`, consuming a pending seek. Returns `None` when
    /// the run must stop, in which case the run is retired in the same critical section.
    pub(crate) fn poll(&mut self, generation: u64) -> Option<Poll> {
        if self.generation != generation {
            return None;
        }
        if self.stop_requested {
            self.retire(generation);
            return None;
        }
        let seek = std::mem::take(&mut self.seek_requested).then_some(self.seek_target);
        Some(Poll {
            playing: self.is_playing,
            seek,
        })
    }

    /// Clear the run flags so a later `play()` starts clean. No-op for a stale run.
    pub(crate) fn retire(&mut self, generation: u64) {
        if self.generation != generation {
            return;
        }
        self.is_playing = false;
        self.stop_requested = false;
        self.active = false;
    }

    fn interrupted(&self, generation: u64) -> bool {
        self.stop_requested || self.generation != generation
    }
}

/// How a run ended.
#[derive(Debug)]
pub(crate) enum RunOutcome {
    /// The source ran out of frames.
    Finished,
    /// Stop was requested, the run was superseded or nobody listens anymore.
    Stopped,
    Failed(String),
}

/// Closes the source on every exit path.
struct OpenSource(Box<dyn VideoSource>);

impl Deref for OpenSource {
    type Target = dyn VideoSource;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for OpenSource {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for OpenSource {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Retires the run even when the loop unwinds.
struct RetireGuard {
    commands: SharedCommands,
    generation: u64,
}

impl Drop for RetireGuard {
    fn drop(&mut self) {
        self.commands.lock().retire(self.generation);
    }
}

/// The decode loop of one playback run. Lives on the worker thread.
pub(crate) struct FramePump {
    session: SessionInfo,
    config: PipelineConfig,
    commands: SharedCommands,
    generation: u64,
    events: Sender<PlaybackEvent>,
    open_source: SourceFactory,
    annotators: AnnotatorFactory,
}

impl FramePump {
    pub(crate) fn new(
        session: SessionInfo,
        config: PipelineConfig,
        commands: SharedCommands,
        generation: u64,
        events: Sender<PlaybackEvent>,
        open_source: SourceFactory,
        annotators: AnnotatorFactory,
    ) -> Self {
        Self {
            session,
            config,
            commands,
            generation,
            events,
            open_source,
            annotators,
        }
    }

    /// Run until the source is exhausted, stop is requested or an error occurs, then
    /// deliver the terminal event.
    pub(crate) fn run(self) -> RunOutcome {
        log::info!(
            "playback run {} started for {}",
            self.generation,
            self.session.source_path.display()
        );

        let outcome = {
            let _retire = RetireGuard {
                commands: self.commands.clone(),
                generation: self.generation,
            };
            match panic::catch_unwind(AssertUnwindSafe(|| self.run_session())) {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => RunOutcome::Failed(err.to_string()),
                Err(panic) => {
                    let reason = match panic.downcast_ref::<&str>() {
                        Some(s) => s.to_string(),
                        None => match panic.downcast_ref::<String>() {
                            Some(s) => s.clone(),
                            None => "unknown reason".to_string(),
                        },
                    };
                    RunOutcome::Failed(format!("playback worker panicked: {reason}"))
                }
            }
        };

        if self.commands.lock().generation != self.generation {
            log::debug!("playback run {} superseded, dropping {outcome:?}", self.generation);
            return RunOutcome::Stopped;
        }
        match &outcome {
            RunOutcome::Finished => {
                log::info!("playback run {} finished", self.generation);
                self.emit(PlaybackEvent::PlaybackFinished);
            }
            RunOutcome::Stopped => log::info!("playback run {} stopped", self.generation),
            RunOutcome::Failed(message) => {
                log::error!("playback run {} failed: {message}", self.generation);
                self.emit(PlaybackEvent::ErrorOccurred(message.clone()));
            }
        }
        outcome
    }

    fn run_session(&self) -> Result<RunOutcome, Error> {
        let mut source = OpenSource((self.open_source)(&self.session.source_path)?);

        let source_fps = self.config.source_fps(self.session.source_fps);
        let mut governor =
            FrameRateGovernor::new(source_fps, self.config.target_fps(self.session.source_fps));
        if let Some(ratio) = governor.skip_ratio() {
            log::debug!(
                "source at {source_fps:.2} fps, emitting {:.2} fps (skip ratio {ratio:.3})",
                governor.target_fps()
            );
        }

        let mut annotator = Annotator::new(
            self.annotators.clone(),
            self.config.annotator.clone(),
            governor.timestamp_step_ms(),
        );

        // source and annotator are released by their Drop impls on every path
        self.pump(&mut source, &mut annotator, &mut governor)
    }

    fn pump(
        &self,
        source: &mut OpenSource,
        annotator: &mut Annotator,
        governor: &mut FrameRateGovernor,
    ) -> Result<RunOutcome, Error> {
        loop {
            let Some(poll) = self.commands.lock().poll(self.generation) else {
                return Ok(RunOutcome::Stopped);
            };

            if let Some(target) = poll.seek {
                log::debug!("seeking to frame {target}");
                source.seek_to_frame(target)?;
                governor.reset();
                annotator.reset();
            } else if !poll.playing {
                thread::sleep(self.config.idle_interval);
                continue;
            }

            let started = Instant::now();

            if poll.seek.is_some() {
                governor.mark_emitted();
            } else {
                for _ in 1..governor.next_advance() {
                    if !source.grab()? {
                        return Ok(RunOutcome::Finished);
                    }
                }
            }

            let Some(frame) = source.read()? else {
                return Ok(RunOutcome::Finished);
            };
            let position = source.position();
            let frame_index = position.saturating_sub(1);
            let frame = fit_width(frame, self.config.max_frame_width);

            let annotated = annotator.process(&frame)?;
            let event = FrameEvent {
                frame: annotated.frame,
                frame_index,
                angles: annotated.angles,
            };
            if !self.emit(PlaybackEvent::FrameReady(event))
                || !self.emit(PlaybackEvent::PositionChanged(position))
            {
                return Ok(RunOutcome::Stopped);
            }

            let sleep = governor.sleep_time(started.elapsed());
            if !sleep.is_zero() {
                thread::sleep(sleep);
            }

            if let Some(fps) = FrameRateGovernor::instant_fps(started.elapsed()) {
                if !self.emit(PlaybackEvent::FpsUpdated(fps)) {
                    return Ok(RunOutcome::Stopped);
                }
            }
        }
    }

    /// Queue `event`, waiting while the queue is full. Gives up when the run is stopped
    /// or superseded, or the receiver is gone.
    fn emit(&self, mut event: PlaybackEvent) -> bool {
        loop {
            match self.events.send_timeout(event, SEND_RETRY) {
                Ok(()) => return true,
                Err(SendTimeoutError::Disconnected(_)) => {
                    log::debug!("event receiver dropped, abandoning run {}", self.generation);
                    return false;
                }
                Err(SendTimeoutError::Timeout(returned)) => {
                    if self.commands.lock().interrupted(self.generation) {
                        return false;
                    }
                    event = returned;
                }
            }
        }
    }
}

/// Downscale `frame` to at most `max_width` pixels wide, keeping the aspect ratio.
///
/// Uses area averaging so every source pixel contributes to the result.
pub(crate) fn fit_width(frame: RgbaImage, max_width: u32) -> RgbaImage {
    let (width, height) = frame.dimensions();
    if max_width == 0 || width <= max_width {
        return frame;
    }
    let scaled_height = ((height as f64 * max_width as f64 / width as f64).round() as u32).max(1);
    imageops::thumbnail(&frame, max_width, scaled_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_consumes_seek_once() {
        let mut state = CommandState {
            is_playing: false,
            seek_requested: true,
            seek_target: 42,
            generation: 1,
            active: true,
            ..Default::default()
        };
        let first = state.poll(1);
        assert_eq!(
            first,
            Some(Poll {
                playing: false,
                seek: Some(42)
            })
        );
        assert!(!state.seek_requested);
        assert_eq!(state.poll(1).and_then(|p| p.seek), None);
    }

    #[test]
    fn poll_stop_retires_run() {
        let mut state = CommandState {
            is_playing: true,
            stop_requested: true,
            generation: 3,
            active: true,
            ..Default::default()
        };
        assert_eq!(state.poll(3), None);
        assert!(!state.is_playing);
        assert!(!state.stop_requested);
        assert!(!state.active);
    }

    #[test]
    fn stale_generation_leaves_state_alone() {
        let mut state = CommandState {
            is_playing: true,
            seek_requested: true,
            seek_target: 7,
            generation: 5,
            active: true,
            ..Default::default()
        };
        assert_eq!(state.poll(4), None);
        state.retire(4);
        assert!(state.is_playing);
        assert!(state.seek_requested);
        assert!(state.active);
    }

    #[test]
    fn wide_frames_are_downscaled() {
        let frame = RgbaImage::new(1920, 1080);
        let scaled = fit_width(frame, 640);
        assert_eq!(scaled.dimensions(), (640, 360));
    }

    #[test]
    fn narrow_frames_untouched() {
        let frame = RgbaImage::new(640, 480);
        assert_eq!(fit_width(frame, 640).dimensions(), (640, 480));
    }
}
