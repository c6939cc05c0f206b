use crate::detection::domain::face_detector::ModelLoadError;
use crate::shared::alert::AlertState;

/// Where the alert text is shown.
pub trait StatusDisplay: Send {
    /// Publishes the alert for the most recent completed inference.
    fn show_alert(&mut self, alert: &AlertState);

    /// Withdraws the previous alert when the camera session changes.
    /// Nothing is claimed about the new session until its first inference.
    fn reset_alert(&mut self);

    /// Reports that detection is unavailable for the rest of the session.
    fn show_model_error(&mut self, error: &ModelLoadError);
}
