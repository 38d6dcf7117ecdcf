//! Camera adapters.
//!
//! `CommandCamera` shells out to the Raspberry Pi still-capture tool; the
//! simulated camera writes a small placeholder file so the rest of the
//! pipeline has a real path to work with.
use chrono::Utc;
use station_traits::{Camera, CaptureError};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

/// File-name timestamp format (no ':' so names stay portable).
pub const IMAGE_NAME_FORMAT: &str = "%Y-%m-%dT%H-%M-%SZ";

fn image_path(folder: &Path, preview: bool) -> PathBuf {
    let name = if preview {
        "preview".to_string()
    } else {
        Utc::now().format(IMAGE_NAME_FORMAT).to_string()
    };
    folder.join(format!("{name}.jpg"))
}

pub struct CommandCamera {
    program: String,
    folder: PathBuf,
}

impl CommandCamera {
    pub fn new(program: impl Into<String>, folder: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            folder: folder.into(),
        }
    }
}

impl Camera for CommandCamera {
    fn capture(&mut self, wait: Duration, preview: bool) -> Result<PathBuf, CaptureError> {
        let path = image_path(&self.folder, preview);
        // -t is the preview/settle time before the still is taken
        let output = Command::new(&self.program)
            .arg("-n")
            .arg("-t")
            .arg(wait.as_millis().max(1).to_string())
            .arg("-o")
            .arg(&path)
            .output()
            .map_err(|e| CaptureError::Command(format!("spawn {}: {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CaptureError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        if !path.exists() {
            return Err(CaptureError::Missing(path));
        }
        tracing::debug!(path = %path.display(), preview, "photo captured");
        Ok(path)
    }
}

/// Writes a fixed byte payload as the "photo". Sleeps for the requested wait
/// only when `honor_wait` is set.
pub struct SimulatedCamera {
    folder: PathBuf,
    payload: Vec<u8>,
    honor_wait: bool,
}

impl SimulatedCamera {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            // JPEG SOI/EOI markers around a short comment
            payload: b"\xFF\xD8simulated-station-frame\xFF\xD9".to_vec(),
            honor_wait: false,
        }
    }

    pub fn honor_wait(mut self, yes: bool) -> Self {
        self.honor_wait = yes;
        self
    }
}

impl Camera for SimulatedCamera {
    fn capture(&mut self, wait: Duration, preview: bool) -> Result<PathBuf, CaptureError> {
        if self.honor_wait {
            std::thread::sleep(wait);
        }
        std::fs::create_dir_all(&self.folder).map_err(|e| CaptureError::Io(e.to_string()))?;
        let path = image_path(&self.folder, preview);
        std::fs::write(&path, &self.payload).map_err(|e| CaptureError::Io(e.to_string()))?;
        tracing::debug!(path = %path.display(), preview, "simulated photo written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulated_preview_goes_to_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut cam = SimulatedCamera::new(dir.path());
        let p = cam.capture(Duration::from_secs(6), true).unwrap();
        assert_eq!(p.file_name().unwrap(), "preview.jpg");
        assert!(p.exists());
    }

    #[test]
    fn missing_program_is_a_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cam = CommandCamera::new("definitely-not-a-camera-tool", dir.path());
        let err = cam.capture(Duration::from_millis(1), false).unwrap_err();
        assert!(matches!(err, CaptureError::Command(_)));
    }
}
