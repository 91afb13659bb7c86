use crate::Error;
use crate::source::{SourceInfo, VideoSource};
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_app::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use image::RgbaImage;
use std::path::Path;
use yuv::{YuvBiPlanarImage, YuvConversionMode, YuvRange, YuvStandardMatrix, yuv_nv12_to_rgba};

const SINK_NAME: &str = "pose_video";
const PREROLL_TIMEOUT_SECS: u64 = 5;
const PULL_TIMEOUT_MS: u64 = 5000;

/// A video file decoded by a GStreamer `playbin` into an unsynchronised appsink.
///
/// The appsink does not follow the pipeline clock, so frames are handed out as fast
/// as they are pulled and the caller does its own pacing.
#[derive(Debug)]
pub struct GstVideoSource {
    pipeline: gst::Pipeline,
    sink: gst_app::AppSink,
    info: SourceInfo,
    position: u64,
    closed: bool,
}

impl GstVideoSource {
    /// Open `path`, preroll it and probe its caps.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if !path.is_file() {
            return Err(Error::open(path, "no such file"));
        }
        let absolute = path.canonicalize().map_err(|e| Error::open(path, e))?;
        let uri = url::Url::from_file_path(&absolute)
            .map_err(|_| Error::open(path, "cannot be expressed as a file uri"))?;

        Self::from_uri(&uri).map_err(|e| e.into_open(path))
    }

    fn from_uri(uri: &url::Url) -> Result<Self, Error> {
        gst::init()?;

        let description = format!(
            "playbin uri=\"{}\" audio-sink=fakesink video-sink=\"videoscale ! videoconvert ! appsink name={SINK_NAME} sync=false max-buffers=2 caps=video/x-raw,format=NV12,pixel-aspect-ratio=1/1\"",
            uri.as_str()
        );
        let pipeline = gst::parse::launch(&description)?
            .downcast::<gst::Pipeline>()
            .map_err(|_| Error::Cast)?;

        macro_rules! cleanup {
            ($expr:expr) => {
                $expr.map_err(|e| {
                    let _ = pipeline.set_state(gst::State::Null);
                    e
                })
            };
        }

        let video_sink: gst::Element = pipeline.property("video-sink");
        let bin = cleanup!(video_sink.downcast::<gst::Bin>().map_err(|_| Error::Cast))?;
        let sink = cleanup!(bin.by_name(SINK_NAME).ok_or(Error::Cast))?;
        let sink = cleanup!(sink.downcast::<gst_app::AppSink>().map_err(|_| Error::Cast))?;

        cleanup!(pipeline.set_state(gst::State::Paused))?;
        cleanup!(
            pipeline
                .state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS))
                .0
        )?;

        let pad = cleanup!(sink.static_pad("sink").ok_or(Error::Caps))?;
        let caps = cleanup!(pad.current_caps().ok_or(Error::Caps))?;
        let s = cleanup!(caps.structure(0).ok_or(Error::Caps))?;
        let width = cleanup!(s.get::<i32>("width").map_err(|_| Error::Caps))?;
        let height = cleanup!(s.get::<i32>("height").map_err(|_| Error::Caps))?;
        // variable framerate streams advertise 0/1
        let fps = s
            .get::<gst::Fraction>("framerate")
            .map(|f| f.numer() as f64 / f.denom() as f64)
            .unwrap_or(0.0);

        if fps.is_nan() || fps.is_infinite() || fps < 0.0 {
            let _ = pipeline.set_state(gst::State::Null);
            return Err(Error::Framerate(fps));
        }

        let total_frames = pipeline
            .query_duration::<gst::format::Default>()
            .map(|frames| *frames)
            .or_else(|| {
                pipeline
                    .query_duration::<gst::ClockTime>()
                    .map(|d| (d.nseconds() as f64 / 1e9 * fps).round() as u64)
            })
            .unwrap_or(0);

        cleanup!(pipeline.set_state(gst::State::Playing))?;

        let info = SourceInfo {
            width: width as u32,
            height: height as u32,
            fps,
            total_frames,
        };
        log::debug!(
            "opened {uri}: {}x{} @ {:.2} fps, {} frames",
            info.width,
            info.height,
            info.fps,
            info.total_frames
        );

        Ok(Self {
            pipeline,
            sink,
            info,
            position: 0,
            closed: false,
        })
    }

    fn pull(&mut self) -> Result<Option<gst::Sample>, Error> {
        if self.closed {
            return Err(Error::Decode("source is closed".into()));
        }
        match self
            .sink
            .try_pull_sample(gst::ClockTime::from_mseconds(PULL_TIMEOUT_MS))
        {
            Some(sample) => {
                self.position = self.frame_index(&sample).map_or(self.position + 1, |i| i + 1);
                Ok(Some(sample))
            }
            None if self.sink.is_eos() => Ok(None),
            None => Err(self
                .bus_error()
                .unwrap_or_else(|| Error::Decode("timed out waiting for a frame".into()))),
        }
    }

    fn frame_index(&self, sample: &gst::Sample) -> Option<u64> {
        if self.info.fps <= 0.0 {
            return None;
        }
        let pts = sample.buffer()?.pts()?;
        Some((pts.nseconds() as f64 / 1e9 * self.info.fps).round() as u64)
    }

    fn bus_error(&self) -> Option<Error> {
        let bus = self.pipeline.bus()?;
        while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error]) {
            if let gst::MessageView::Error(err) = msg.view() {
                return Some(Error::Decode(err.error().to_string()));
            }
        }
        None
    }
}

impl VideoSource for GstVideoSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn read(&mut self) -> Result<Option<RgbaImage>, Error> {
        match self.pull()? {
            Some(sample) => nv12_sample_to_rgba(&sample).map(Some),
            None => Ok(None),
        }
    }

    fn grab(&mut self) -> Result<bool, Error> {
        Ok(self.pull()?.is_some())
    }

    fn seek_to_frame(&mut self, index: u64) -> Result<(), Error> {
        let flags = gst::SeekFlags::FLUSH | gst::SeekFlags::ACCURATE;
        let result = if self.info.fps > 0.0 {
            let nanos = (index as f64 / self.info.fps * 1e9).round() as u64;
            self.pipeline
                .seek_simple(flags, gst::ClockTime::from_nseconds(nanos))
        } else {
            self.pipeline
                .seek_simple(flags, gst::format::Default::from_u64(index))
        };
        result.map_err(|e| Error::Decode(format!("seek to frame {index} failed: {e}")))?;
        self.position = index;
        Ok(())
    }

    fn position(&self) -> u64 {
        self.position
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(err) = self.pipeline.set_state(gst::State::Null) {
            log::warn!("failed to shut down video pipeline: {err}");
        }
    }
}

impl Drop for GstVideoSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn color_conversion(info: &gst_video::VideoInfo) -> (YuvRange, YuvStandardMatrix) {
    let colorimetry = info.colorimetry();
    let range = match colorimetry.range() {
        gst_video::VideoColorRange::Range0_255 => YuvRange::Full,
        _ => YuvRange::Limited,
    };
    let matrix = match colorimetry.matrix() {
        gst_video::VideoColorMatrix::Bt601 => YuvStandardMatrix::Bt601,
        gst_video::VideoColorMatrix::Bt2020 => YuvStandardMatrix::Bt2020,
        _ => YuvStandardMatrix::Bt709,
    };
    (range, matrix)
}

/// Convert an NV12 sample to RGBA, honouring the plane strides of the buffer.
fn nv12_sample_to_rgba(sample: &gst::Sample) -> Result<RgbaImage, Error> {
    let caps = sample.caps().ok_or(Error::Caps)?;
    let info = gst_video::VideoInfo::from_caps(caps).map_err(|_| Error::Caps)?;
    let buffer = sample
        .buffer()
        .ok_or_else(|| Error::Decode("sample carries no buffer".into()))?;
    let frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &info)
        .map_err(|e| Error::Decode(format!("unreadable video buffer: {e}")))?;

    let width = frame.width();
    let height = frame.height();
    let strides = frame.plane_stride();
    let y_plane = frame.plane_data(0)?;
    let uv_plane = frame.plane_data(1)?;

    let image = YuvBiPlanarImage {
        y_plane,
        y_stride: strides[0] as u32,
        uv_plane,
        uv_stride: strides[1] as u32,
        width,
        height,
    };

    let (range, matrix) = color_conversion(&info);
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        range,
        matrix,
        YuvConversionMode::Balanced,
    )
    .map_err(|e| Error::Decode(format!("nv12 conversion failed: {e:?}")))?;

    RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| Error::Decode("rgba buffer size mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_open_error() {
        let err = GstVideoSource::open(Path::new("missing.mp4")).unwrap_err();
        assert!(matches!(err, Error::VideoOpen { .. }), "{err}");
    }
}
