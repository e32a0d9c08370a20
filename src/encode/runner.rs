//! Encoder process execution

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use super::profile::EncodeProfile;
use crate::core::config;

/// Exit status and captured standard error of one encoder run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl ProcessOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// The encoder could not produce an exit status.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start encoder: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("encoder timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Runs one encoder attempt. Implemented by [`FfmpegRunner`] and by test fakes.
#[async_trait]
pub trait EncoderRunner: Send + Sync {
    async fn run(&self, profile: EncodeProfile, input: &Path, output: &Path) -> Result<ProcessOutcome, RunnerError>;
}

/// Spawns the ffmpeg binary with the profile's arguments.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    binary: String,
    timeout: Duration,
}

impl FfmpegRunner {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// `FFMPEG_BIN` with the default encode timeout.
    pub fn from_config() -> Self {
        Self::new(config::FFMPEG_BIN.as_str(), config::encode::timeout())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Checks that the binary starts and reports a version.
    pub async fn check_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl EncoderRunner for FfmpegRunner {
    async fn run(&self, profile: EncodeProfile, input: &Path, output: &Path) -> Result<ProcessOutcome, RunnerError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(profile.args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::info!(
            "Running {} ({}) on {}",
            self.binary,
            profile,
            input.display()
        );

        // kill_on_drop reaps the child when the timeout drops the future
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => return Err(RunnerError::TimedOut(self.timeout)),
        };

        let outcome = ProcessOutcome {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        if !outcome.succeeded() {
            log::warn!("{} ({}) exited with {:?}", self.binary, profile, outcome.exit_code);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_success_requires_zero_exit() {
        let ok = ProcessOutcome {
            exit_code: Some(0),
            stderr: String::new(),
        };
        let failed = ProcessOutcome {
            exit_code: Some(1),
            stderr: String::new(),
        };
        let killed = ProcessOutcome {
            exit_code: None,
            stderr: String::new(),
        };
        assert!(ok.succeeded());
        assert!(!failed.succeeded());
        assert!(!killed.succeeded());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let runner = FfmpegRunner::new("definitely-not-an-encoder-binary", Duration::from_secs(5));
        assert!(!runner.check_available().await);

        let err = runner
            .run(EncodeProfile::Primary, Path::new("in.mkv"), Path::new("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Spawn(_)));
    }
}
