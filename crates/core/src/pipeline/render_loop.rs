use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};

use crate::camera::domain::video_surface::VideoSurface;
use crate::detection::infrastructure::detector_loader::{DetectorLoader, LoadStatus};
use crate::pipeline::infrastructure::detection_worker::{
    Completion, DetectionJob, DetectionWorker, SubmitError,
};
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::pipeline::render_state::RenderState;
use crate::render::domain::render_surface::{RenderSurface, StrokeStyle};
use crate::render::domain::status_display::StatusDisplay;
use crate::shared::alert::AlertState;
use crate::shared::constants::{DEFAULT_TICK_INTERVAL_MS, MAX_BACKOFF_TICKS};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub tick_interval: Duration,
    pub stroke: StrokeStyle,
    /// Skip frames already rendered from a successful detect.
    pub skip_stale_frames: bool,
    pub max_backoff_ticks: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            stroke: StrokeStyle::default(),
            skip_stale_frames: true,
            max_backoff_ticks: MAX_BACKOFF_TICKS,
        }
    }
}

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    DetectorPending,
    DetectorFailed,
    FrameNotReady,
    InFlight,
    BackingOff,
    StaleFrame,
    Dispatched,
    Stopped,
}

impl TickOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            TickOutcome::DetectorPending => "detector_pending",
            TickOutcome::DetectorFailed => "detector_failed",
            TickOutcome::FrameNotReady => "frame_not_ready",
            TickOutcome::InFlight => "in_flight",
            TickOutcome::BackingOff => "backing_off",
            TickOutcome::StaleFrame => "stale_frame",
            TickOutcome::Dispatched => "dispatched",
            TickOutcome::Stopped => "stopped",
        }
    }
}

/// Counters reported when the loop shuts down.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSummary {
    pub ticks: u64,
    pub rendered: u64,
    pub last_alert: AlertState,
}

enum DetectorState {
    Loading(DetectorLoader),
    Ready(DetectionWorker),
    Failed,
    Stopped,
}

/// Fixed-rate sampler of the video surface: detect, draw, alert.
///
/// Can be driven synchronously with [`tick`](RenderLoop::tick) and
/// [`process_pending`](RenderLoop::process_pending), or moved onto its own
/// thread with [`spawn`](RenderLoop::spawn).
pub struct RenderLoop {
    config: RenderConfig,
    video: VideoSurface,
    detector: DetectorState,
    surface: Box<dyn RenderSurface>,
    display: Box<dyn StatusDisplay>,
    logger: Box<dyn PipelineLogger>,
    state: RenderState,
    ticks: u64,
    rendered: u64,
}

impl RenderLoop {
    pub fn new(
        config: RenderConfig,
        video: VideoSurface,
        loader: DetectorLoader,
        surface: Box<dyn RenderSurface>,
        display: Box<dyn StatusDisplay>,
    ) -> Self {
        let state = RenderState::new(config.max_backoff_ticks);
        Self {
            config,
            video,
            detector: DetectorState::Loading(loader),
            surface,
            display,
            logger: Box::new(NullPipelineLogger),
            state,
            ticks: 0,
            rendered: 0,
        }
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn video_surface(&self) -> &VideoSurface {
        &self.video
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    pub fn summary(&self) -> RenderSummary {
        RenderSummary {
            ticks: self.ticks,
            rendered: self.rendered,
            last_alert: self.state.alert(),
        }
    }

    /// Runs one timer tick. Never blocks on inference.
    pub fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;
        let outcome = self.evaluate_tick();
        log::trace!("Tick {}: {}", self.ticks, outcome.name());
        self.logger.outcome(outcome.name());
        self.logger.progress(self.ticks, self.rendered);
        outcome
    }

    /// Waits up to `timeout` for the in-flight detect to finish and renders
    /// its result. Returns false when nothing completed.
    pub fn process_pending(&mut self, timeout: Duration) -> bool {
        let DetectorState::Ready(worker) = &self.detector else {
            return false;
        };
        let received = worker.completions().recv_timeout(timeout);
        match received {
            Ok(completion) => {
                self.finish(completion);
                true
            }
            Err(_) => false,
        }
    }

    /// Applies a finished detect: draw, present, publish the alert.
    pub fn finish(&mut self, completion: Completion) {
        if let DetectorState::Ready(worker) = &self.detector {
            worker.acknowledge();
        }

        if completion.generation != self.video.generation() {
            log::debug!(
                "Discarding result for frame {} from an earlier camera session",
                completion.frame.index()
            );
            return;
        }
        self.reset_on_new_generation(completion.generation);
        self.logger
            .timing("detect", completion.elapsed.as_secs_f64() * 1000.0);

        let frame = completion.frame;
        let (detections, alert) = match completion.result {
            Ok(detections) => {
                let alert = self.state.record_success(frame.index(), detections.len());
                (detections, alert)
            }
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                (Vec::new(), self.state.record_failure())
            }
        };

        let started = Instant::now();
        self.paint(&frame, &detections);
        self.logger
            .timing("render", started.elapsed().as_secs_f64() * 1000.0);
        self.logger.metric("faces", detections.len() as f64);

        self.display.show_alert(&alert);
        self.rendered += 1;
    }

    /// Stops the detection worker, or cancels a model load still in progress.
    /// Later ticks report `Stopped`.
    pub fn shutdown(&mut self) {
        if let DetectorState::Ready(mut worker) =
            std::mem::replace(&mut self.detector, DetectorState::Stopped)
        {
            worker.shutdown();
        }
    }

    /// Moves the loop onto its own thread, ticking every
    /// `config.tick_interval` until the handle is shut down.
    pub fn spawn(mut self) -> RenderLoopHandle {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let handle = thread::spawn(move || {
            self.run(&shutdown_rx);
            self.shutdown();
            self.logger.summary();
            self.summary()
        });
        RenderLoopHandle {
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    fn run(&mut self, shutdown_rx: &Receiver<()>) {
        let ticker = crossbeam_channel::tick(self.config.tick_interval);
        log::info!(
            "Render loop started ({} ms interval)",
            self.config.tick_interval.as_millis()
        );
        loop {
            let completions = match &self.detector {
                DetectorState::Ready(worker) => worker.completions().clone(),
                _ => crossbeam_channel::never(),
            };
            select! {
                recv(ticker) -> _ => {
                    self.tick();
                }
                recv(completions) -> msg => {
                    if let Ok(completion) = msg {
                        self.finish(completion);
                    }
                }
                recv(shutdown_rx) -> _ => break,
            }
        }
        log::info!("Render loop stopped after {} ticks", self.ticks);
    }

    fn evaluate_tick(&mut self) -> TickOutcome {
        if let Err(outcome) = self.ensure_detector() {
            return outcome;
        }
        let Some(current) = self.video.current_frame() else {
            return TickOutcome::FrameNotReady;
        };
        self.reset_on_new_generation(current.generation);

        let DetectorState::Ready(worker) = &self.detector else {
            return TickOutcome::DetectorPending;
        };
        if worker.is_busy() {
            return TickOutcome::InFlight;
        }
        if self.state.backoff_mut().should_skip() {
            return TickOutcome::BackingOff;
        }
        if self.config.skip_stale_frames && self.state.is_stale(current.frame.index()) {
            return TickOutcome::StaleFrame;
        }

        let job = DetectionJob {
            frame: current.frame,
            generation: current.generation,
        };
        match worker.try_submit(job) {
            Ok(()) => TickOutcome::Dispatched,
            Err(SubmitError::Busy) => TickOutcome::InFlight,
            Err(SubmitError::Disconnected) => {
                log::error!("Detection worker is gone; disabling detection");
                self.detector = DetectorState::Failed;
                TickOutcome::DetectorFailed
            }
        }
    }

    fn ensure_detector(&mut self) -> Result<(), TickOutcome> {
        let status = match &self.detector {
            DetectorState::Ready(_) => return Ok(()),
            DetectorState::Failed => return Err(TickOutcome::DetectorFailed),
            DetectorState::Stopped => return Err(TickOutcome::Stopped),
            DetectorState::Loading(loader) => loader.poll(),
        };
        match status {
            LoadStatus::Pending => Err(TickOutcome::DetectorPending),
            LoadStatus::Ready(detector) => {
                self.logger.info("Face detector ready");
                self.detector = DetectorState::Ready(DetectionWorker::spawn(detector));
                Ok(())
            }
            LoadStatus::Failed(e) => {
                log::error!("Face detection disabled: {e}");
                self.display.show_model_error(&e);
                self.detector = DetectorState::Failed;
                Err(TickOutcome::DetectorFailed)
            }
        }
    }

    fn reset_on_new_generation(&mut self, generation: u64) {
        if self.state.observe_generation(generation) {
            log::info!("Camera session changed; alert reset");
            self.display.reset_alert();
        }
    }

    fn paint(&mut self, frame: &Frame, detections: &[Detection]) {
        let (width, height) = frame.dimensions();
        self.surface.resize(width, height);
        self.surface.clear();
        self.surface.draw_frame(frame);
        for detection in detections {
            self.surface.stroke_rect(detection, &self.config.stroke);
        }
        if let Err(e) = self.surface.present() {
            log::warn!("Failed to present frame {}: {e}", frame.index());
        }
    }
}

/// Owner of a running render loop thread.
pub struct RenderLoopHandle {
    shutdown_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<RenderSummary>>,
}

impl RenderLoopHandle {
    /// Stops the timer, drains the detection worker and joins the thread.
    /// Returns the final counters on the first call.
    pub fn shutdown(&mut self) -> Option<RenderSummary> {
        drop(self.shutdown_tx.take());
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(summary) => Some(summary),
            Err(_) => {
                log::error!("Render loop thread panicked");
                None
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RenderLoopHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
