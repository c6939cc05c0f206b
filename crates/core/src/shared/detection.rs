/// One predicted face bounding box, in frame pixel coordinates.
///
/// Produced fresh by every inference call; detections carry no identity
/// and are never associated across frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// All detections for one frame, in model output order.
pub type DetectionResult = Vec<Detection>;

impl Detection {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a rectangle from the model's top-left / bottom-right corner form.
    pub fn from_corners(top_left: [f32; 2], bottom_right: [f32; 2]) -> Self {
        Self {
            x: top_left[0],
            y: top_left[1],
            width: bottom_right[0] - top_left[0],
            height: bottom_right[1] - top_left[1],
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// The part of this rectangle visible inside a `frame_width × frame_height`
    /// frame, or `None` when nothing of it is visible.
    ///
    /// Models occasionally emit boxes that extend past the frame edges or
    /// carry non-finite values; renderers clip through this instead of
    /// trusting the raw numbers.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Detection> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return None;
        }

        let x1 = self.x.max(0.0);
        let y1 = self.y.max(0.0);
        let x2 = self.right().min(frame_width as f32);
        let y2 = self.bottom().min(frame_height as f32);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Detection::from_corners([x1, y1], [x2, y2]))
    }
}
