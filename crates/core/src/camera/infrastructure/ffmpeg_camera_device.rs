use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::camera::domain::camera_device::{
    CameraDevice, CameraError, MediaConstraints, MediaStream,
};
use crate::shared::frame::Frame;

/// Back-off while a device has no frame ready (avfoundation reports EAGAIN).
const RETRY_DELAY: Duration = Duration::from_millis(5);

#[cfg(target_os = "linux")]
const DEFAULT_INPUT: (&str, &str) = ("v4l2", "/dev/video0");
#[cfg(target_os = "macos")]
const DEFAULT_INPUT: (&str, &str) = ("avfoundation", "0");
#[cfg(target_os = "windows")]
const DEFAULT_INPUT: (&str, &str) = ("dshow", "video=Integrated Camera");
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const DEFAULT_INPUT: (&str, &str) = ("v4l2", "/dev/video0");

/// Opens a camera through libavdevice.
pub struct FfmpegCameraDevice {
    input_format: String,
    device: String,
    options: Vec<(String, String)>,
}

impl FfmpegCameraDevice {
    pub fn new(input_format: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            input_format: input_format.into(),
            device: device.into(),
            options: Vec::new(),
        }
    }

    /// The platform's default capture API and first camera.
    pub fn platform_default() -> Self {
        Self::new(DEFAULT_INPUT.0, DEFAULT_INPUT.1)
    }

    pub fn default_input_format() -> &'static str {
        DEFAULT_INPUT.0
    }

    pub fn default_device() -> &'static str {
        DEFAULT_INPUT.1
    }

    /// Passes a demuxer option such as `framerate` or `video_size`.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), value.into()));
        self
    }

    pub fn input_format(&self) -> &str {
        &self.input_format
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }
}

impl CameraDevice for FfmpegCameraDevice {
    fn acquire(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError> {
        validate_constraints(constraints)?;

        ffmpeg_next::init().map_err(|e| CameraError::Other(format!("ffmpeg init: {e}")))?;
        ffmpeg_next::device::register_all();

        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == self.input_format)
            .ok_or_else(|| {
                CameraError::Unsupported(format!(
                    "capture API '{}' is not available in this ffmpeg build",
                    self.input_format
                ))
            })?;

        // Non-blocking reads surface as EAGAIN, where `next_frame` checks for cancellation.
        let mut options = ffmpeg_next::Dictionary::new();
        options.set("fflags", "nonblock");
        for (key, value) in &self.options {
            options.set(key, value);
        }

        let input = ffmpeg_next::format::open_with(&self.device, &format, options)
            .map_err(|e| classify(e, &self.device))?
            .input();

        let (stream_index, decoder) = {
            let stream = input
                .streams()
                .best(ffmpeg_next::media::Type::Video)
                .ok_or_else(|| CameraError::NotFound(format!("{}: no video track", self.device)))?;
            let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
                .and_then(|ctx| ctx.decoder().video())
                .map_err(|e| CameraError::Unsupported(format!("{}: {e}", self.device)))?;
            (stream.index(), decoder)
        };

        log::info!(
            "Opened camera {} via {} ({}x{}, {:?})",
            self.device,
            self.input_format,
            decoder.width(),
            decoder.height(),
            decoder.format()
        );

        Ok(Box::new(FfmpegCameraStream {
            device: self.device.clone(),
            open: Some(OpenCamera {
                input,
                decoder,
                stream_index,
                scaler: None,
            }),
            frame_index: 0,
        }))
    }
}

fn validate_constraints(constraints: &MediaConstraints) -> Result<(), CameraError> {
    if constraints.audio {
        return Err(CameraError::Unsupported(
            "audio capture is not supported".into(),
        ));
    }
    if !constraints.video {
        return Err(CameraError::Unsupported(
            "a video track must be requested".into(),
        ));
    }
    Ok(())
}

fn classify(err: ffmpeg_next::Error, device: &str) -> CameraError {
    match err {
        ffmpeg_next::Error::Other { errno } => CameraError::from_errno(errno, device),
        ffmpeg_next::Error::Eof | ffmpeg_next::Error::Exit => CameraError::StreamEnded,
        other => CameraError::Other(format!("{device}: {other}")),
    }
}

/// A camera opened by [`FfmpegCameraDevice`].
///
/// Decoded frames are converted to RGB24; the scaler is rebuilt whenever
/// the device changes pixel format or resolution mid-stream.
pub struct FfmpegCameraStream {
    device: String,
    open: Option<OpenCamera>,
    frame_index: u64,
}

// Safety: the stream is only touched by the thread that owns it.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegCameraStream {}

struct OpenCamera {
    input: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    stream_index: usize,
    scaler: Option<Scaler>,
}

struct Scaler {
    context: scaling::Context,
    format: Pixel,
    width: u32,
    height: u32,
}

impl Scaler {
    fn new(format: Pixel, width: u32, height: u32) -> Result<Self, ffmpeg_next::Error> {
        let context = scaling::Context::get(
            format,
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;
        Ok(Self {
            context,
            format,
            width,
            height,
        })
    }

    fn matches(&self, decoded: &Video) -> bool {
        self.format == decoded.format()
            && self.width == decoded.width()
            && self.height == decoded.height()
    }
}

impl OpenCamera {
    fn to_rgb(&mut self, decoded: &Video, index: u64) -> Result<Frame, ffmpeg_next::Error> {
        let (width, height) = (decoded.width(), decoded.height());
        let mut scaler = match self.scaler.take() {
            Some(scaler) if scaler.matches(decoded) => scaler,
            _ => {
                log::debug!(
                    "Camera format is now {:?} {width}x{height}",
                    decoded.format()
                );
                Scaler::new(decoded.format(), width, height)?
            }
        };

        let mut rgb = Video::empty();
        let converted = scaler.context.run(decoded, &mut rgb);
        self.scaler = Some(scaler);
        converted?;

        Ok(Frame::new(
            extract_rgb_pixels(&rgb, width, height),
            width,
            height,
            3,
            index,
        ))
    }
}

impl MediaStream for FfmpegCameraStream {
    fn next_frame(&mut self, cancelled: &AtomicBool) -> Result<Frame, CameraError> {
        let Some(open) = self.open.as_mut() else {
            return Err(CameraError::StreamEnded);
        };

        loop {
            if cancelled.load(Ordering::Acquire) {
                return Err(CameraError::Cancelled);
            }
            let mut decoded = Video::empty();
            if open.decoder.receive_frame(&mut decoded).is_ok() {
                if decoded.width() == 0 || decoded.height() == 0 {
                    continue;
                }
                let frame = open
                    .to_rgb(&decoded, self.frame_index)
                    .map_err(|e| CameraError::Other(format!("{}: {e}", self.device)))?;
                self.frame_index += 1;
                return Ok(frame);
            }

            let mut packet = ffmpeg_next::Packet::empty();
            match packet.read(&mut open.input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Other { errno })
                    if errno == ffmpeg_next::util::error::EAGAIN =>
                {
                    thread::sleep(RETRY_DELAY);
                    continue;
                }
                Err(e) => return Err(classify(e, &self.device)),
            }

            if packet.stream() != open.stream_index {
                continue;
            }
            if let Err(e) = open.decoder.send_packet(&packet) {
                log::debug!("Dropping undecodable camera packet: {e}");
            }
        }
    }

    fn stop_tracks(&mut self) {
        if self.open.take().is_some() {
            log::info!("Released camera {}", self.device);
        }
    }
}

impl Drop for FfmpegCameraStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping the per-row stride padding.
fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&data[start..start + row_bytes]);
    }
    pixels
}
