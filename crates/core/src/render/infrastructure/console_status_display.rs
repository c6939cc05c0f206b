use std::io::{self, Write};

use crate::detection::domain::face_detector::ModelLoadError;
use crate::render::domain::status_display::StatusDisplay;
use crate::shared::alert::AlertState;

/// Prints alert changes as terminal lines.
///
/// Repeated identical alerts are suppressed so a steady state produces a
/// single line instead of one per tick.
pub struct ConsoleStatusDisplay<W: Write + Send = io::Stderr> {
    out: W,
    last: Option<AlertState>,
}

impl ConsoleStatusDisplay {
    pub fn new() -> Self {
        Self::with_writer(io::stderr())
    }
}

impl Default for ConsoleStatusDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleStatusDisplay<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out, last: None }
    }

    pub fn into_writer(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            log::debug!("Failed to write status line: {e}");
        }
    }
}

impl<W: Write + Send> StatusDisplay for ConsoleStatusDisplay<W> {
    fn show_alert(&mut self, alert: &AlertState) {
        if self.last.as_ref() == Some(alert) {
            return;
        }
        self.last = Some(*alert);

        if alert.is_active() {
            log::warn!("{alert}");
            self.write_line(&format!("[facewatch] {alert}"));
        } else {
            log::info!("Single face in view");
            self.write_line("[facewatch] ok");
        }
    }

    fn reset_alert(&mut self) {
        if self.last.take().is_some() {
            self.write_line("[facewatch] camera restarted, waiting for detection");
        }
    }

    fn show_model_error(&mut self, error: &ModelLoadError) {
        self.write_line(&format!("[facewatch] model failed to load: {error}"));
    }
}
