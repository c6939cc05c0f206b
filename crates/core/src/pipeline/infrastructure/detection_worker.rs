use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::detection::domain::face_detector::{FaceDetector, InferenceError};
use crate::shared::detection::DetectionResult;
use crate::shared::frame::Frame;

/// One frame handed to the detector, tagged with its camera generation.
pub struct DetectionJob {
    pub frame: Arc<Frame>,
    pub generation: u64,
}

/// Outcome of one `detect` call, returned to the submitter.
pub struct Completion {
    pub frame: Arc<Frame>,
    pub generation: u64,
    pub result: Result<DetectionResult, InferenceError>,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// A previous job has not been acknowledged yet.
    Busy,
    /// The worker thread is gone.
    Disconnected,
}

/// Runs a detector on a dedicated thread with at most one call in flight.
///
/// `try_submit` claims the busy flag with a compare-exchange before handing
/// over the frame; the flag stays set until the consumer calls
/// [`DetectionWorker::acknowledge`] after taking the completion, so a slow
/// model can never accumulate a backlog of pending frames.
pub struct DetectionWorker {
    job_tx: Option<Sender<DetectionJob>>,
    completion_rx: Receiver<Completion>,
    busy: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    pub fn spawn(detector: Box<dyn FaceDetector>) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<DetectionJob>(1);
        let (completion_tx, completion_rx) = crossbeam_channel::bounded::<Completion>(1);

        let handle = thread::spawn(move || run_worker(detector, job_rx, completion_tx));

        Self {
            job_tx: Some(job_tx),
            completion_rx,
            busy: Arc::new(AtomicBool::new(false)),
            handle: Some(handle),
        }
    }

    pub fn try_submit(&self, job: DetectionJob) -> Result<(), SubmitError> {
        let Some(job_tx) = self.job_tx.as_ref() else {
            return Err(SubmitError::Disconnected);
        };
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SubmitError::Busy);
        }
        match job_tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SubmitError::Busy),
            Err(TrySendError::Disconnected(_)) => {
                self.busy.store(false, Ordering::Release);
                Err(SubmitError::Disconnected)
            }
        }
    }

    /// Receiver of finished jobs; clone it into a `select!`.
    pub fn completions(&self) -> &Receiver<Completion> {
        &self.completion_rx
    }

    /// Marks the outstanding job as consumed, allowing the next submit.
    pub fn acknowledge(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Stops accepting jobs and waits for the in-flight call to finish.
    pub fn shutdown(&mut self) {
        self.job_tx = None;
        // Unblock a worker waiting to hand over its last completion.
        while self.completion_rx.try_recv().is_ok() {}
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Detection worker thread panicked");
            }
        }
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    mut detector: Box<dyn FaceDetector>,
    job_rx: Receiver<DetectionJob>,
    completion_tx: Sender<Completion>,
) {
    for job in job_rx {
        let started = Instant::now();
        let result = panic::catch_unwind(AssertUnwindSafe(|| detector.detect(&job.frame)))
            .unwrap_or_else(|payload| Err(InferenceError::Panicked(panic_message(&*payload))));

        let completion = Completion {
            frame: job.frame,
            generation: job.generation,
            result,
            elapsed: started.elapsed(),
        };
        if completion_tx.send(completion).is_err() {
            break;
        }
    }
    log::debug!("Detection worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
