use crate::shared::constants::{HIGHLIGHT_COLOR, STROKE_WIDTH};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// Outline style for highlight rectangles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StrokeStyle {
    pub color: [u8; 3],
    pub line_width: u32,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: HIGHLIGHT_COLOR,
            line_width: STROKE_WIDTH,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode snapshot: {0}")]
    Image(#[from] image::ImageError),
}

/// 2D output the render loop paints each processed frame onto.
///
/// Rectangles may extend past the surface; implementations clip them.
pub trait RenderSurface: Send {
    fn resize(&mut self, width: u32, height: u32);

    fn clear(&mut self);

    fn draw_frame(&mut self, frame: &Frame);

    fn stroke_rect(&mut self, rect: &Detection, style: &StrokeStyle);

    /// Makes the painted frame visible. Called once per processed frame.
    fn present(&mut self) -> Result<(), RenderError>;
}
