pub mod console_status_display;
pub mod image_canvas;
