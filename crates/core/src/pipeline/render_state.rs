use crate::pipeline::failure_backoff::FailureBackoff;
use crate::shared::alert::AlertState;

/// Everything the render loop remembers between ticks.
///
/// Owned by the loop and passed by reference; nothing here is shared with
/// other threads. The single-flight flag lives with the detection worker.
#[derive(Clone, Debug)]
pub struct RenderState {
    alert: AlertState,
    last_rendered: Option<u64>,
    generation: Option<u64>,
    backoff: FailureBackoff,
}

impl RenderState {
    pub fn new(max_backoff_ticks: u32) -> Self {
        Self {
            alert: AlertState::default(),
            last_rendered: None,
            generation: None,
            backoff: FailureBackoff::new(max_backoff_ticks),
        }
    }

    pub fn alert(&self) -> AlertState {
        self.alert
    }

    pub fn last_rendered(&self) -> Option<u64> {
        self.last_rendered
    }

    pub fn generation(&self) -> Option<u64> {
        self.generation
    }

    pub fn backoff_mut(&mut self) -> &mut FailureBackoff {
        &mut self.backoff
    }

    /// Tracks the camera binding. Returns true when a new binding replaced an
    /// earlier one, in which case per-session state has been reset.
    pub fn observe_generation(&mut self, generation: u64) -> bool {
        match self.generation.replace(generation) {
            Some(previous) if previous != generation => {
                self.alert = AlertState::default();
                self.last_rendered = None;
                true
            }
            _ => false,
        }
    }

    /// True when `frame_index` was already rendered from a successful detect.
    pub fn is_stale(&self, frame_index: u64) -> bool {
        self.last_rendered == Some(frame_index)
    }

    pub fn record_success(&mut self, frame_index: u64, face_count: usize) -> AlertState {
        self.backoff.record_success();
        self.last_rendered = Some(frame_index);
        self.alert = AlertState::from_count(face_count);
        self.alert
    }

    /// A failed detect counts as zero faces but leaves the frame eligible
    /// for another attempt.
    pub fn record_failure(&mut self) -> AlertState {
        self.backoff.record_failure();
        self.alert = AlertState::from_count(0);
        self.alert
    }
}
