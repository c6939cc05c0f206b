use crate::camera::camera_source::CameraSource;
use crate::camera::domain::camera_device::{CameraDevice, CameraError};
use crate::pipeline::render_loop::{RenderLoop, RenderLoopHandle, RenderSummary};

/// One run of the face monitor: camera, detector and render loop together.
///
/// Camera start and model load are independent. A camera that cannot be
/// opened leaves the session running with every tick a no-op.
pub struct MonitorSession {
    render: RenderLoopHandle,
    camera: CameraSource,
    camera_error: Option<CameraError>,
}

impl MonitorSession {
    pub fn start(render_loop: RenderLoop, device: &mut dyn CameraDevice) -> Self {
        let mut camera = CameraSource::new(render_loop.video_surface().clone());
        let render = render_loop.spawn();
        let camera_error = camera.start(device).err();
        Self {
            render,
            camera,
            camera_error,
        }
    }

    pub fn camera_error(&self) -> Option<&CameraError> {
        self.camera_error.as_ref()
    }

    pub fn is_camera_running(&self) -> bool {
        self.camera.is_running()
    }

    /// Stops the render loop first, then the camera.
    pub fn teardown(mut self) -> Option<RenderSummary> {
        self.stop()
    }

    fn stop(&mut self) -> Option<RenderSummary> {
        let summary = self.render.shutdown();
        self.camera.stop();
        summary
    }
}

impl Drop for MonitorSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::domain::video_surface::VideoSurface;
    use crate::detection::infrastructure::detector_loader::DetectorLoader;
    use crate::pipeline::render_loop::RenderConfig;
    use crate::shared::alert::AlertState;
    use crate::shared::detection::Detection;
    use crate::test_support::{
        ready, wait_until, DisplayLog, FakeCameraDevice, FakeDetector, RecordingDisplay,
        RecordingSurface, SurfaceLog, TickCounter,
    };
    use std::thread;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    fn render_loop(detector: FakeDetector) -> (RenderLoop, SurfaceLog, DisplayLog, TickCounter) {
        let (surface, surface_log) = RecordingSurface::new();
        let (display, display_log) = RecordingDisplay::new();
        let counter = TickCounter::default();
        let config = RenderConfig {
            tick_interval: Duration::from_millis(5),
            ..RenderConfig::default()
        };
        let render = RenderLoop::new(
            config,
            VideoSurface::new(),
            DetectorLoader::spawn(move || ready(detector)),
            Box::new(surface),
            Box::new(display),
        )
        .with_logger(Box::new(counter.clone()));
        (render, surface_log, display_log, counter)
    }

    #[test]
    fn test_session_detects_faces_from_camera() {
        let faces = vec![
            Detection::new(1.0, 1.0, 3.0, 3.0),
            Detection::new(5.0, 5.0, 2.0, 2.0),
        ];
        let (render, surface, display, _) = render_loop(FakeDetector::returning(faces));
        let mut device = FakeCameraDevice::new(16, 12);

        let session = MonitorSession::start(render, &mut device);
        assert!(session.camera_error().is_none());
        assert!(wait_until(WAIT, || !surface.rects().is_empty()));
        assert!(wait_until(WAIT, || display.last_alert_text().as_deref()
            == Some("multiple faces detected: 2")));

        let summary = session.teardown().unwrap();
        assert!(summary.rendered >= 1);
        assert_eq!(summary.last_alert, AlertState::MultipleFaces(2));
    }

    #[test]
    fn test_teardown_stops_ticks_and_every_track() {
        let (render, _, _, counter) = render_loop(FakeDetector::returning(Vec::new()));
        let mut device = FakeCameraDevice::new(8, 8).with_tracks(2);

        let session = MonitorSession::start(render, &mut device);
        assert!(wait_until(WAIT, || counter.ticks() >= 3));
        session.teardown();

        assert!(device.all_tracks_stopped());
        let ticks = counter.ticks();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(counter.ticks(), ticks);
    }

    #[test]
    fn test_drop_tears_down() {
        let (render, _, _, counter) = render_loop(FakeDetector::returning(Vec::new()));
        let mut device = FakeCameraDevice::new(8, 8);
        {
            let _session = MonitorSession::start(render, &mut device);
            assert!(wait_until(WAIT, || counter.ticks() >= 1));
        }
        assert!(device.all_tracks_stopped());
        let ticks = counter.ticks();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(counter.ticks(), ticks);
    }

    #[test]
    fn test_camera_failure_keeps_session_alive_without_drawing() {
        let detector = FakeDetector::returning(Vec::new());
        let probe = detector.probe();
        let (render, surface, display, counter) = render_loop(detector);
        let mut device = FakeCameraDevice::failing(|| CameraError::NotFound("/dev/video0".into()));

        let session = MonitorSession::start(render, &mut device);
        assert!(matches!(
            session.camera_error(),
            Some(CameraError::NotFound(_))
        ));
        assert!(!session.is_camera_running());

        assert!(wait_until(WAIT, || counter.ticks() >= 5));
        session.teardown();
        assert_eq!(probe.calls(), 0);
        assert!(surface.is_empty());
        assert!(display.alerts().is_empty());
    }
}
