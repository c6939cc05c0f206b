use std::io;
use std::sync::atomic::AtomicBool;

use crate::shared::frame::Frame;

// `io::ErrorKind` has no stable variants for these two.
const EBUSY: i32 = 16;
const ENODEV: i32 = 19;

/// Which tracks to request from the camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl MediaConstraints {
    pub const fn video_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self::video_only()
    }
}

/// Failure to acquire or read a camera stream.
#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera access denied: {0}")]
    PermissionDenied(String),
    #[error("no camera found: {0}")]
    NotFound(String),
    #[error("camera is in use by another application: {0}")]
    DeviceInUse(String),
    #[error("unsupported camera request: {0}")]
    Unsupported(String),
    #[error("camera stream ended")]
    StreamEnded,
    #[error("camera capture cancelled")]
    Cancelled,
    #[error("camera error: {0}")]
    Other(String),
}

impl CameraError {
    /// Classifies a native OS error code.
    pub fn from_errno(errno: i32, context: impl Into<String>) -> Self {
        let context = context.into();
        if errno == EBUSY {
            return CameraError::DeviceInUse(context);
        }
        if errno == ENODEV {
            return CameraError::NotFound(context);
        }
        match io::Error::from_raw_os_error(errno).kind() {
            io::ErrorKind::PermissionDenied => CameraError::PermissionDenied(context),
            io::ErrorKind::NotFound => CameraError::NotFound(context),
            _ => CameraError::Other(format!(
                "{context}: {}",
                io::Error::from_raw_os_error(errno)
            )),
        }
    }
}

/// A live stream of decoded frames.
pub trait MediaStream: Send {
    /// Blocks until the next frame is decoded.
    ///
    /// Returns `CameraError::StreamEnded` once the device stops producing,
    /// and `CameraError::Cancelled` soon after `cancelled` is set, even while
    /// the device has nothing to deliver.
    fn next_frame(&mut self, cancelled: &AtomicBool) -> Result<Frame, CameraError>;

    /// Stops every track and releases the device. Idempotent.
    fn stop_tracks(&mut self);
}

/// Platform capability that grants access to a camera.
pub trait CameraDevice {
    fn acquire(
        &mut self,
        constraints: &MediaConstraints,
    ) -> Result<Box<dyn MediaStream>, CameraError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_constraints_are_video_only() {
        let constraints = MediaConstraints::default();
        assert!(constraints.video);
        assert!(!constraints.audio);
        assert_eq!(constraints, MediaConstraints::video_only());
    }

    #[cfg(unix)]
    #[rstest]
    #[case(1, "PermissionDenied")] // EPERM
    #[case(13, "PermissionDenied")] // EACCES
    #[case(2, "NotFound")] // ENOENT
    #[case(19, "NotFound")] // ENODEV
    #[case(16, "DeviceInUse")] // EBUSY
    #[case(5, "Other")] // EIO
    fn test_errno_classification(#[case] errno: i32, #[case] expected: &str) {
        let err = CameraError::from_errno(errno, "/dev/video0");
        let kind = match err {
            CameraError::PermissionDenied(_) => "PermissionDenied",
            CameraError::NotFound(_) => "NotFound",
            CameraError::DeviceInUse(_) => "DeviceInUse",
            CameraError::Unsupported(_) => "Unsupported",
            CameraError::StreamEnded => "StreamEnded",
            CameraError::Cancelled => "Cancelled",
            CameraError::Other(_) => "Other",
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn test_error_messages_include_context() {
        let err = CameraError::DeviceInUse("/dev/video0".into());
        assert_eq!(
            err.to_string(),
            "camera is in use by another application: /dev/video0"
        );
    }
}
