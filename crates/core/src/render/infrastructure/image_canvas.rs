use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::render::domain::render_surface::{RenderError, RenderSurface, StrokeStyle};
use crate::shared::detection::Detection;
use crate::shared::frame::Frame;

/// In-memory RGB canvas painted with `imageproc`.
///
/// With a snapshot path, every `present` replaces that file with a PNG of
/// the canvas. The file is written next to its destination and renamed into
/// place so readers never see a half-written image.
pub struct ImageCanvas {
    image: RgbImage,
    snapshot_path: Option<PathBuf>,
    presented: u64,
}

impl ImageCanvas {
    pub fn new() -> Self {
        Self {
            image: RgbImage::new(0, 0),
            snapshot_path: None,
            presented: 0,
        }
    }

    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Some(path.into()),
            ..Self::new()
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Number of frames presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    fn write_snapshot(&self, path: &Path) -> Result<(), RenderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("png.tmp");
        if let Err(e) = self.image.save_with_format(&tmp, ImageFormat::Png) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl Default for ImageCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSurface for ImageCanvas {
    fn resize(&mut self, width: u32, height: u32) {
        if self.image.dimensions() != (width, height) {
            self.image = RgbImage::new(width, height);
        }
    }

    fn clear(&mut self) {
        for pixel in self.image.pixels_mut() {
            *pixel = Rgb([0, 0, 0]);
        }
    }

    fn draw_frame(&mut self, frame: &Frame) {
        if frame.dimensions() != self.image.dimensions() {
            self.resize(frame.width(), frame.height());
        }
        if frame.channels() == 3 && frame.data().len() == self.image.len() {
            self.image.copy_from_slice(frame.data());
        } else {
            log::debug!(
                "Skipping frame {} with {} channels",
                frame.index(),
                frame.channels()
            );
        }
    }

    fn stroke_rect(&mut self, rect: &Detection, style: &StrokeStyle) {
        let (width, height) = self.image.dimensions();
        let Some(visible) = rect.clamp_to(width, height) else {
            return;
        };

        let left = visible.x.floor() as i32;
        let top = visible.y.floor() as i32;
        let right = visible.right().ceil() as i32;
        let bottom = visible.bottom().ceil() as i32;
        let color = Rgb(style.color);

        // Thick outlines are concentric 1px rectangles growing inwards.
        for inset in 0..style.line_width as i32 {
            let w = right - left - 2 * inset;
            let h = bottom - top - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            let outline = Rect::at(left + inset, top + inset).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut self.image, outline, color);
        }
    }

    fn present(&mut self) -> Result<(), RenderError> {
        self.presented += 1;
        match &self.snapshot_path {
            Some(path) if self.image.width() > 0 && self.image.height() > 0 => {
                self.write_snapshot(path)
            }
            _ => Ok(()),
        }
    }
}
