use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::camera::domain::camera_device::{
    CameraDevice, CameraError, MediaConstraints, MediaStream,
};
use crate::camera::domain::video_surface::VideoSurface;

struct CaptureThread {
    cancelled: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn MediaStream>>,
}

/// Owns the camera stream and keeps the video surface fed.
///
/// The stream lives on the capture thread while it runs and is handed back
/// on join so `stop` can stop its tracks. The cancel flag is passed into
/// `next_frame`, so a device that stops delivering frames cannot hold up `stop`.
pub struct CameraSource {
    surface: VideoSurface,
    capture: Option<CaptureThread>,
}

impl CameraSource {
    pub fn new(surface: VideoSurface) -> Self {
        Self {
            surface,
            capture: None,
        }
    }

    pub fn surface(&self) -> &VideoSurface {
        &self.surface
    }

    pub fn is_running(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|capture| !capture.handle.is_finished())
    }

    /// Requests a video-only stream and starts publishing frames.
    ///
    /// On failure the error is logged, the surface stays unbound and
    /// the error is returned. There is no retry.
    pub fn start(&mut self, device: &mut dyn CameraDevice) -> Result<(), CameraError> {
        self.stop();

        let stream = match device.acquire(&MediaConstraints::video_only()) {
            Ok(stream) => stream,
            Err(e) => {
                log::error!("Camera acquisition failed: {e}");
                return Err(e);
            }
        };

        let generation = self.surface.bind();
        let cancelled = Arc::new(AtomicBool::new(false));
        let surface = self.surface.clone();
        let cancelled_clone = Arc::clone(&cancelled);
        let handle = thread::spawn(move || {
            capture_frames(stream, &surface, generation, &cancelled_clone)
        });

        log::info!("Camera started (generation {generation})");
        self.capture = Some(CaptureThread { cancelled, handle });
        Ok(())
    }

    /// Stops capture, stops every track and clears the surface. Idempotent.
    pub fn stop(&mut self) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        capture.cancelled.store(true, Ordering::Release);
        match capture.handle.join() {
            Ok(mut stream) => stream.stop_tracks(),
            Err(_) => log::error!("Camera capture thread panicked"),
        }
        self.surface.clear();
        log::info!("Camera stopped");
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_frames(
    mut stream: Box<dyn MediaStream>,
    surface: &VideoSurface,
    generation: u64,
    cancelled: &AtomicBool,
) -> Box<dyn MediaStream> {
    let mut published: u64 = 0;
    while !cancelled.load(Ordering::Acquire) {
        match stream.next_frame(cancelled) {
            Ok(frame) => {
                if published == 0 {
                    log::info!("First camera frame: {}x{}", frame.width(), frame.height());
                }
                if !surface.publish(generation, frame) {
                    break;
                }
                published += 1;
            }
            Err(CameraError::Cancelled) => break,
            Err(CameraError::StreamEnded) => {
                log::warn!("Camera stream ended after {published} frames");
                break;
            }
            Err(e) => {
                log::error!("Camera read failed: {e}");
                break;
            }
        }
    }
    stream
}
