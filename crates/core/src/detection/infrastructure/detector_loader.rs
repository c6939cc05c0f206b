use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::detection::domain::face_detector::{FaceDetector, ModelLoadError};

/// Result of a non-blocking readiness check.
pub enum LoadStatus {
    Pending,
    Ready(Box<dyn FaceDetector>),
    Failed(ModelLoadError),
}

/// Loads the detector exactly once on a background thread.
///
/// Consumers poll without blocking; the loaded detector (or the load error)
/// is handed out once, after which the loader reports `Failed(LoaderGone)`.
/// Dropping the loader cancels a load that honours its cancel flag.
pub struct DetectorLoader {
    result_rx: Receiver<Result<Box<dyn FaceDetector>, ModelLoadError>>,
    cancelled: Arc<AtomicBool>,
}

impl DetectorLoader {
    pub fn spawn<F>(load: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn FaceDetector>, ModelLoadError> + Send + 'static,
    {
        Self::spawn_cancellable(move |_| load())
    }

    /// Like [`spawn`](Self::spawn), handing `load` the flag that
    /// [`cancel`](Self::cancel) sets.
    pub fn spawn_cancellable<F>(load: F) -> Self
    where
        F: FnOnce(&AtomicBool) -> Result<Box<dyn FaceDetector>, ModelLoadError> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cancelled);
        thread::spawn(move || {
            let result = load(&flag);
            match &result {
                Ok(_) => log::info!("Face detection model loaded"),
                Err(e) => log::error!("Face detection model failed to load: {e}"),
            }
            let _ = tx.send(result);
        });
        Self {
            result_rx: rx,
            cancelled,
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn poll(&self) -> LoadStatus {
        match self.result_rx.try_recv() {
            Ok(Ok(detector)) => LoadStatus::Ready(detector),
            Ok(Err(e)) => LoadStatus::Failed(e),
            Err(TryRecvError::Empty) => LoadStatus::Pending,
            Err(TryRecvError::Disconnected) => LoadStatus::Failed(ModelLoadError::LoaderGone),
        }
    }
}

impl Drop for DetectorLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}
