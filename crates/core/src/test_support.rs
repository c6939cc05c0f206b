//! Fakes shared by unit tests across bounded contexts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::domain::camera_device::{
    CameraDevice, CameraError, MediaConstraints, MediaStream,
};
use crate::detection::domain::face_detector::{FaceDetector, InferenceError, ModelLoadError};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::render::domain::render_surface::{RenderError, RenderSurface, StrokeStyle};
use crate::render::domain::status_display::StatusDisplay;
use crate::shared::alert::AlertState;
use crate::shared::detection::{Detection, DetectionResult};
use crate::shared::frame::Frame;

/// Polls `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn solid_frame(width: u32, height: u32, index: u64) -> Frame {
    Frame::new(
        vec![90; (width * height * 3) as usize],
        width,
        height,
        3,
        index,
    )
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

pub struct FakeCameraDevice {
    width: u32,
    height: u32,
    tracks_per_stream: usize,
    frame_limit: Option<u64>,
    frame_delay: Duration,
    stalled: bool,
    failure: Option<fn() -> CameraError>,
    requested: Vec<MediaConstraints>,
    tracks: Vec<Arc<AtomicUsize>>,
}

impl FakeCameraDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tracks_per_stream: 1,
            frame_limit: None,
            frame_delay: Duration::from_millis(2),
            stalled: false,
            failure: None,
            requested: Vec::new(),
            tracks: Vec::new(),
        }
    }

    pub fn failing(failure: fn() -> CameraError) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(0, 0)
        }
    }

    /// A camera that opens but never delivers a frame.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::new(4, 4)
        }
    }

    pub fn with_tracks(mut self, tracks: usize) -> Self {
        self.tracks_per_stream = tracks;
        self
    }

    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.frame_limit = Some(frames);
        self
    }

    pub fn requested_constraints(&self) -> Vec<MediaConstraints> {
        self.requested.clone()
    }

    /// Stop calls per track, across every stream handed out.
    pub fn track_stop_counts(&self) -> Vec<usize> {
        self.tracks
            .iter()
            .map(|t| t.load(Ordering::SeqCst))
            .collect()
    }

    pub fn all_tracks_stopped(&self) -> bool {
        !self.tracks.is_empty() && self.track_stop_counts().iter().all(|&n| n > 0)
    }
}

impl CameraDevice for FakeCameraDevice {
    fn acquire(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError> {
        self.requested.push(*constraints);
        if let Some(failure) = self.failure {
            return Err(failure());
        }
        let tracks: Vec<_> = (0..self.tracks_per_stream)
            .map(|_| Arc::new(AtomicUsize::new(0)))
            .collect();
        self.tracks.extend(tracks.iter().cloned());
        Ok(Box::new(FakeStream {
            width: self.width,
            height: self.height,
            next_index: 0,
            frame_limit: self.frame_limit,
            frame_delay: self.frame_delay,
            stalled: self.stalled,
            tracks,
            stopped: false,
        }))
    }
}

struct FakeStream {
    width: u32,
    height: u32,
    next_index: u64,
    frame_limit: Option<u64>,
    frame_delay: Duration,
    stalled: bool,
    tracks: Vec<Arc<AtomicUsize>>,
    stopped: bool,
}

impl MediaStream for FakeStream {
    fn next_frame(&mut self, cancelled: &AtomicBool) -> Result<Frame, CameraError> {
        while self.stalled {
            if cancelled.load(Ordering::Acquire) {
                return Err(CameraError::Cancelled);
            }
            thread::sleep(Duration::from_millis(1));
        }
        if self.stopped || self.frame_limit.is_some_and(|limit| self.next_index >= limit) {
            return Err(CameraError::StreamEnded);
        }
        thread::sleep(self.frame_delay);
        let frame = solid_frame(self.width, self.height, self.next_index);
        self.next_index += 1;
        Ok(frame)
    }

    fn stop_tracks(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for track in &self.tracks {
            track.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

type Responder = Box<dyn FnMut(&Frame) -> Result<DetectionResult, InferenceError> + Send>;

/// Shared view of what a [`FakeDetector`] was asked to do.
#[derive(Clone, Default)]
pub struct DetectorProbe {
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    frames: Arc<Mutex<Vec<u64>>>,
}

impl DetectorProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn frames(&self) -> Vec<u64> {
        self.frames.lock().unwrap().clone()
    }
}

pub struct FakeDetector {
    responder: Responder,
    delay: Duration,
    probe: DetectorProbe,
}

impl FakeDetector {
    pub fn new(
        responder: impl FnMut(&Frame) -> Result<DetectionResult, InferenceError> + Send + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            delay: Duration::ZERO,
            probe: DetectorProbe::default(),
        }
    }

    pub fn returning(detections: DetectionResult) -> Self {
        Self::new(move |_| Ok(detections.clone()))
    }

    pub fn failing(error: InferenceError) -> Self {
        Self::new(move |_| Err(error.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn probe(&self) -> DetectorProbe {
        self.probe.clone()
    }
}

impl FaceDetector for FakeDetector {
    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult, InferenceError> {
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.frames.lock().unwrap().push(frame.index());

        thread::sleep(self.delay);
        let result = (self.responder)(frame);

        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Boxes a detector the way a loader hands it out.
pub fn ready(detector: FakeDetector) -> Result<Box<dyn FaceDetector>, ModelLoadError> {
    Ok(Box::new(detector))
}

// ---------------------------------------------------------------------------
// Render surface
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceOp {
    Resize(u32, u32),
    Clear,
    DrawFrame(u64),
    StrokeRect(Detection, StrokeStyle),
    Present,
}

#[derive(Clone, Default)]
pub struct SurfaceLog {
    ops: Arc<Mutex<Vec<SurfaceOp>>>,
}

impl SurfaceLog {
    pub fn ops(&self) -> Vec<SurfaceOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn frames_drawn(&self) -> Vec<u64> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SurfaceOp::DrawFrame(index) => Some(index),
                _ => None,
            })
            .collect()
    }

    pub fn rects(&self) -> Vec<Detection> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SurfaceOp::StrokeRect(rect, _) => Some(rect),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.lock().unwrap().is_empty()
    }
}

pub struct RecordingSurface {
    log: SurfaceLog,
}

impl RecordingSurface {
    pub fn new() -> (Self, SurfaceLog) {
        let log = SurfaceLog::default();
        (Self { log: log.clone() }, log)
    }

    fn push(&self, op: SurfaceOp) {
        self.log.ops.lock().unwrap().push(op);
    }
}

impl RenderSurface for RecordingSurface {
    fn resize(&mut self, width: u32, height: u32) {
        self.push(SurfaceOp::Resize(width, height));
    }

    fn clear(&mut self) {
        self.push(SurfaceOp::Clear);
    }

    fn draw_frame(&mut self, frame: &Frame) {
        self.push(SurfaceOp::DrawFrame(frame.index()));
    }

    fn stroke_rect(&mut self, rect: &Detection, style: &StrokeStyle) {
        self.push(SurfaceOp::StrokeRect(*rect, *style));
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.push(SurfaceOp::Present);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Status display
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct DisplayLog {
    alerts: Arc<Mutex<Vec<AlertState>>>,
    resets: Arc<AtomicUsize>,
    model_errors: Arc<Mutex<Vec<String>>>,
}

impl DisplayLog {
    pub fn alerts(&self) -> Vec<AlertState> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn last_alert_text(&self) -> Option<String> {
        self.alerts().last().map(|a| a.to_string())
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn model_errors(&self) -> Vec<String> {
        self.model_errors.lock().unwrap().clone()
    }
}

pub struct RecordingDisplay {
    log: DisplayLog,
}

impl RecordingDisplay {
    pub fn new() -> (Self, DisplayLog) {
        let log = DisplayLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl StatusDisplay for RecordingDisplay {
    fn show_alert(&mut self, alert: &AlertState) {
        self.log.alerts.lock().unwrap().push(*alert);
    }

    fn reset_alert(&mut self) {
        self.log.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn show_model_error(&mut self, error: &ModelLoadError) {
        self.log.model_errors.lock().unwrap().push(error.to_string());
    }
}

// ---------------------------------------------------------------------------
// Logger
// ---------------------------------------------------------------------------

/// Counts ticks as reported through the logger.
#[derive(Clone, Default)]
pub struct TickCounter {
    ticks: Arc<AtomicUsize>,
}

impl TickCounter {
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl PipelineLogger for TickCounter {
    fn progress(&mut self, _ticks: u64, _rendered: u64) {}

    fn outcome(&mut self, _outcome: &str) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }

    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}
