use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::shared::frame::Frame;

/// The frame currently shown by the video surface, with the camera binding
/// it came from.
#[derive(Clone, Debug)]
pub struct CurrentFrame {
    pub frame: Arc<Frame>,
    pub generation: u64,
}

#[derive(Default)]
struct Slot {
    frame: Option<Arc<Frame>>,
    generation: u64,
    bound: bool,
}

/// Latest-frame slot shared between the capture thread and the render loop.
///
/// Every `bind` and `clear` starts a new generation. Publishing is tagged
/// with the generation it was bound under, so a capture thread that outlives
/// its binding can never overwrite a newer camera's frames.
#[derive(Clone, Default)]
pub struct VideoSurface {
    slot: Arc<Mutex<Slot>>,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a new stream. Returns the generation to publish under.
    pub fn bind(&self) -> u64 {
        let mut slot = self.lock();
        slot.generation += 1;
        slot.frame = None;
        slot.bound = true;
        slot.generation
    }

    /// Detaches the stream and drops the last frame.
    pub fn clear(&self) {
        let mut slot = self.lock();
        if slot.bound || slot.frame.is_some() {
            slot.generation += 1;
        }
        slot.frame = None;
        slot.bound = false;
    }

    /// Replaces the current frame. Returns false when `generation` is no
    /// longer the bound one.
    pub fn publish(&self, generation: u64, frame: Frame) -> bool {
        let mut slot = self.lock();
        if !slot.bound || slot.generation != generation {
            return false;
        }
        slot.frame = Some(Arc::new(frame));
        true
    }

    /// The current frame, if one with real pixels has been decoded.
    pub fn current_frame(&self) -> Option<CurrentFrame> {
        let slot = self.lock();
        slot.frame
            .as_ref()
            .filter(|frame| frame.has_pixels())
            .map(|frame| CurrentFrame {
                frame: Arc::clone(frame),
                generation: slot.generation,
            })
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn is_bound(&self) -> bool {
        self.lock().bound
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
