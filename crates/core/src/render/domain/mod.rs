pub mod render_surface;
pub mod status_display;
