//! Growth-length adapters for the external vision pipeline.
use station_traits::{Vision, VisionError};
use std::path::Path;
use std::process::Command;

/// Exit code the vision program uses for "no segments found".
pub const EXIT_NO_SEGMENTS: i32 = 2;

/// Runs `<program> <image> <channel> <kernel_size>` and parses stdout as the length.
pub struct CommandVision {
    program: String,
}

impl CommandVision {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Vision for CommandVision {
    fn growth_length(
        &self,
        image: &Path,
        channel: &str,
        kernel_size: u32,
    ) -> Result<f64, VisionError> {
        let output = Command::new(&self.program)
            .arg(image)
            .arg(channel)
            .arg(kernel_size.to_string())
            .output()
            .map_err(|e| VisionError::Failed(format!("spawn {}: {e}", self.program)))?;
        if output.status.code() == Some(EXIT_NO_SEGMENTS) {
            return Err(VisionError::NoSegmentsFound);
        }
        if !output.status.success() {
            return Err(VisionError::Failed(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }
        parse_length(&String::from_utf8_lossy(&output.stdout))
    }
}

fn parse_length(stdout: &str) -> Result<f64, VisionError> {
    let text = stdout.trim();
    let v: f64 = text
        .parse()
        .map_err(|_| VisionError::Failed(format!("unparseable length {text:?}")))?;
    if !v.is_finite() || v < 0.0 {
        return Err(VisionError::Failed(format!("invalid length {v}")));
    }
    Ok(v)
}

/// Returns a fixed length, or no segments when constructed with `None`.
pub struct SimulatedVision {
    length: Option<f64>,
}

impl SimulatedVision {
    pub fn new(length: Option<f64>) -> Self {
        Self { length }
    }
}

impl Vision for SimulatedVision {
    fn growth_length(&self, _image: &Path, _channel: &str, _kernel: u32) -> Result<f64, VisionError> {
        self.length.ok_or(VisionError::NoSegmentsFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("412.5\n", Some(412.5))]
    #[case("  0 ", Some(0.0))]
    #[case("-3", None)]
    #[case("abc", None)]
    #[case("NaN", None)]
    fn parses_program_output(#[case] out: &str, #[case] expect: Option<f64>) {
        assert_eq!(parse_length(out).ok(), expect);
    }

    #[test]
    fn simulated_without_length_reports_no_segments() {
        let v = SimulatedVision::new(None);
        assert_eq!(
            v.growth_length(Path::new("x.jpg"), "k", 20),
            Err(VisionError::NoSegmentsFound)
        );
    }
}
