pub mod ffmpeg_camera_device;
