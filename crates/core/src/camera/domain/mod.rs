pub mod camera_device;
pub mod video_surface;
