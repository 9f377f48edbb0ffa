use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::core::config::{CaptureConfig, CaptureMode};
use crate::core::error::CaptureError;

/// Produces one still frame at `target` per call
pub trait Camera {
    fn capture(&mut self, target: &Path) -> Result<(), CaptureError>;
}

impl<C: Camera + ?Sized> Camera for Box<C> {
    fn capture(&mut self, target: &Path) -> Result<(), CaptureError> {
        (**self).capture(target)
    }
}

const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Frames are dropped at the target path by an external capture process
///
/// Waits up to `timeout` for a frame to appear. The pipeline discards the
/// previous frame before every capture, so whatever appears is new.
#[derive(Debug, Default)]
pub struct StillFileCamera {
    timeout: Duration,
}

impl StillFileCamera {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Camera for StillFileCamera {
    fn capture(&mut self, target: &Path) -> Result<(), CaptureError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match ensure_frame(target) {
                Ok(()) => return Ok(()),
                Err(e) if Instant::now() >= deadline => return Err(e),
                Err(_) => std::thread::sleep(FRAME_POLL_INTERVAL),
            }
        }
    }
}

/// Runs a capture program per frame, e.g. `rpicam-still -n -o {output}`
#[derive(Debug)]
pub struct CommandCamera {
    program: String,
    args: Vec<String>,
}

impl CommandCamera {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn args_for(&self, target: &Path) -> Vec<String> {
        let output = target.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{output}", &output))
            .collect()
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self, target: &Path) -> Result<(), CaptureError> {
        let args = self.args_for(target);
        debug!(program = %self.program, args = ?args, "Running capture command");

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(CaptureError::Spawn)?;

        if !status.success() {
            return Err(CaptureError::ExitStatus(status));
        }

        ensure_frame(target)
    }
}

/// Remove the frame left by the previous capture so it can never be read twice
pub fn discard_frame(target: &Path) -> Result<(), CaptureError> {
    match std::fs::remove_file(target) {
        Ok(()) => {
            debug!(path = %target.display(), "Previous frame discarded");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CaptureError::Discard {
            path: target.display().to_string(),
            source: e,
        }),
    }
}

fn ensure_frame(target: &Path) -> Result<(), CaptureError> {
    let display = || target.display().to_string();
    let metadata = std::fs::metadata(target).map_err(|_| CaptureError::Missing(display()))?;
    if metadata.len() == 0 {
        return Err(CaptureError::Empty(display()));
    }
    Ok(())
}

/// Build the configured camera and make sure frames have somewhere to go
pub fn camera_from_config(config: &CaptureConfig) -> Result<Box<dyn Camera>> {
    if let Some(parent) = config.image_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create capture directory: {}", parent.display())
        })?;
    }

    let camera: Box<dyn Camera> = match config.mode {
        CaptureMode::StillFile => Box::new(StillFileCamera::new(Duration::from_millis(
            config.frame_timeout_ms,
        ))),
        CaptureMode::Command => {
            let program = config
                .program
                .clone()
                .context("capture.program is required for command mode")?;
            Box::new(CommandCamera::new(program, config.args.clone()))
        }
    };

    Ok(camera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_still_file_present() {
        let dir = TempDir::new().unwrap();
        let frame = dir.path().join("captured.jpg");
        std::fs::write(&frame, b"jpeg bytes").unwrap();

        assert!(StillFileCamera::default().capture(&frame).is_ok());
    }

    #[test]
    fn test_still_file_missing_or_empty() {
        let dir = TempDir::new().unwrap();
        let frame = dir.path().join("captured.jpg");

        let mut camera = StillFileCamera::new(Duration::from_millis(50));

        assert!(matches!(camera.capture(&frame), Err(CaptureError::Missing(_))));

        std::fs::write(&frame, b"").unwrap();
        assert!(matches!(camera.capture(&frame), Err(CaptureError::Empty(_))));
    }

    #[test]
    fn test_still_file_waits_for_frame() {
        let dir = TempDir::new().unwrap();
        let frame = dir.path().join("captured.jpg");

        let writer = {
            let frame = frame.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(100));
                std::fs::write(&frame, b"jpeg bytes").unwrap();
            })
        };

        let mut camera = StillFileCamera::new(Duration::from_secs(5));
        assert!(camera.capture(&frame).is_ok());
        writer.join().unwrap();
    }

    #[test]
    fn test_discard_frame() {
        let dir = TempDir::new().unwrap();
        let frame = dir.path().join("captured.jpg");

        // Nothing to discard is fine
        discard_frame(&frame).unwrap();

        std::fs::write(&frame, b"old frame").unwrap();
        discard_frame(&frame).unwrap();
        assert!(!frame.exists());
    }

    #[test]
    fn test_discard_failure_reported() {
        let dir = TempDir::new().unwrap();
        // A directory at the frame path cannot be removed as a file
        let frame = dir.path().join("captured.jpg");
        std::fs::create_dir(&frame).unwrap();

        assert!(matches!(discard_frame(&frame), Err(CaptureError::Discard { .. })));
    }

    #[test]
    fn test_output_placeholder_substitution() {
        let camera = CommandCamera::new(
            "rpicam-still",
            vec!["-n".to_string(), "-o".to_string(), "{output}".to_string()],
        );
        assert_eq!(
            camera.args_for(Path::new("/tmp/frame.jpg")),
            vec!["-n", "-o", "/tmp/frame.jpg"]
        );
    }

    #[test]
    fn test_missing_program() {
        let dir = TempDir::new().unwrap();
        let mut camera = CommandCamera::new("widgate-no-such-capture-program", Vec::new());

        assert!(matches!(
            camera.capture(&dir.path().join("frame.jpg")),
            Err(CaptureError::Spawn(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_writes_frame() {
        let dir = TempDir::new().unwrap();
        let frame = dir.path().join("frame.jpg");
        let mut camera = CommandCamera::new(
            "sh",
            vec!["-c".to_string(), "printf frame > \"$0\"".to_string(), "{output}".to_string()],
        );

        camera.capture(&frame).unwrap();
        assert_eq!(std::fs::read(&frame).unwrap(), b"frame");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_failure_status() {
        let dir = TempDir::new().unwrap();
        let mut camera = CommandCamera::new("false", Vec::new());

        assert!(matches!(
            camera.capture(&dir.path().join("frame.jpg")),
            Err(CaptureError::ExitStatus(_))
        ));
    }

    #[test]
    fn test_camera_from_config_creates_directory() {
        let dir = TempDir::new().unwrap();
        let config = CaptureConfig {
            image_path: dir.path().join("pictures").join("captured.jpg"),
            ..CaptureConfig::default()
        };

        camera_from_config(&config).unwrap();
        assert!(dir.path().join("pictures").is_dir());
    }
}
