use std::io::Write;
use std::process::{Child, Command, Stdio};

use anyhow::Result;
use image::{EncodableLayout, RgbImage};
use nokhwa::{
    nokhwa_initialize,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
    Camera, NokhwaError,
};
use thiserror::Error;
use tracing::{debug, error, warn};

/// Camera failures classified into user-facing messages with a retry action.
#[derive(Debug, Error)]
pub enum CameraFailure {
    #[error("camera access was denied; allow camera access and press 'r' to retry")]
    PermissionDenied,
    #[error("no camera was found; connect a camera and press 'r' to retry")]
    NotFound,
    #[error("the camera is in use by another application; close it and press 'r' to retry")]
    Busy,
    #[error("camera error: {0}; press 'r' to retry")]
    Other(String),
}

impl CameraFailure {
    pub fn classify(err: NokhwaError) -> CameraFailure {
        Self::classify_message(&err.to_string())
    }

    fn classify_message(msg: &str) -> CameraFailure {
        let lower = msg.to_lowercase();
        if lower.contains("denied") || lower.contains("permission") || lower.contains("not allowed")
        {
            CameraFailure::PermissionDenied
        } else if lower.contains("busy") || lower.contains("in use") {
            CameraFailure::Busy
        } else if lower.contains("not found") || lower.contains("no device") {
            CameraFailure::NotFound
        } else {
            CameraFailure::Other(msg.to_string())
        }
    }
}

pub fn create_input_stream(fps: u32, index: Option<u32>) -> Result<Camera, CameraFailure> {
    nokhwa_initialize(|granted| {
        debug!("User said {}", granted);
    });

    let cameras = query(ApiBackend::Auto).map_err(CameraFailure::classify)?;
    cameras
        .iter()
        .for_each(|cam| debug!("Found camera: {:?}", cam));

    let index = match index {
        Some(i) => CameraIndex::Index(i),
        None => match cameras.last() {
            Some(cam) => cam.index().clone(),
            None => return Err(CameraFailure::NotFound),
        },
    };

    let mut camera = Camera::new(
        index,
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
    )
    .map_err(CameraFailure::classify)?;

    if let Err(e) = camera.set_frame_rate(fps) {
        warn!("Camera rejected {fps}fps, keeping its default: {e}");
    }
    camera.open_stream().map_err(CameraFailure::classify)?;

    Ok(camera)
}

pub struct OutputVideoStream {
    output_proc: Child,
}

impl Drop for OutputVideoStream {
    fn drop(&mut self) {
        if let Err(e) = self.output_proc.kill() {
            error!("Failed to stop output process {e:?}");
        }
    }
}

impl OutputVideoStream {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let mut command = Command::new("ffplay");
        command.args([
            "-f",
            "rawvideo",
            "-pixel_format",
            "rgb24",
            "-video_size",
            &format!("{}x{}", width, height),
            "-fflags",
            "nobuffer",
            "-flags",
            "low_delay",
            "-window_title",
            "snapbooth",
            "-",
        ]);

        let output_proc = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { output_proc })
    }

    pub fn write_frame(&mut self, img: &RgbImage) -> Result<()> {
        if let Some(stdin) = self.output_proc.stdin.as_mut() {
            stdin.write_all(img.as_bytes())?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_messages_classify_as_permission() {
        let f = CameraFailure::classify_message("Access to the device was Denied by the user");
        assert!(matches!(f, CameraFailure::PermissionDenied));
    }

    #[test]
    fn busy_messages_classify_as_busy() {
        let f = CameraFailure::classify_message("device is in use elsewhere");
        assert!(matches!(f, CameraFailure::Busy));
    }

    #[test]
    fn missing_device_messages_classify_as_not_found() {
        let f = CameraFailure::classify_message("No device matching the index was found");
        assert!(matches!(f, CameraFailure::NotFound));
    }

    #[test]
    fn unknown_messages_keep_their_text() {
        let f = CameraFailure::classify_message("ioctl failed");
        assert!(matches!(f, CameraFailure::Other(msg) if msg == "ioctl failed"));
    }
}
