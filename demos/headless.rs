use pose_playback::{
    AnnotatorOptions, PlaybackController, PlaybackEvent, PoseAnnotator, PoseResult,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Stand-in detector that never finds anyone.
struct NoPose;

impl PoseAnnotator for NoPose {
    fn detect(
        &mut self,
        _frame: &image::RgbaImage,
        _timestamp_ms: u64,
    ) -> Result<PoseResult, pose_playback::Error> {
        Ok(PoseResult::empty())
    }

    fn reset(&mut self) {}

    fn release(&mut self) {}
}

fn main() {
    env_logger::init();
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/test.mp4"));

    let controller = PlaybackController::new(Arc::new(|_: &AnnotatorOptions| {
        Ok(Box::new(NoPose) as Box<dyn PoseAnnotator>)
    }));
    let session = controller.load(&path).expect("failed to load video");
    println!(
        "{}: {}x{} @ {:.2} fps, {} frames",
        path.display(),
        session.width,
        session.height,
        session.source_fps,
        session.total_frames
    );

    controller.play().expect("failed to start playback");
    let mut last_frame = None;
    for event in controller.events() {
        match event {
            PlaybackEvent::FrameReady(frame) => {
                println!(
                    "{} {:?}",
                    session.time_label(frame.frame_index),
                    frame.angles.iter().collect::<Vec<_>>()
                );
                last_frame = Some(frame.frame);
            }
            PlaybackEvent::FpsUpdated(fps) => log::trace!("{fps:.1} fps"),
            PlaybackEvent::PositionChanged(_) => {}
            PlaybackEvent::PlaybackFinished => break,
            PlaybackEvent::ErrorOccurred(msg) => {
                eprintln!("playback failed: {msg}");
                break;
            }
        }
    }

    if let Some(frame) = last_frame {
        frame.save("last_frame.png").expect("failed to save frame");
    }
}
