//! Encode jobs: fallback chain, output validation, progress narration and input cleanup.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use super::escalation::EscalationChain;
use super::profile::EncodeProfile;
use super::runner::{EncoderRunner, RunnerError};
use crate::core::config;
use crate::core::utils::tail_chars;
use crate::progress::{ProgressReporter, StatusSink, Throttle, TransferStatus};

/// Case-insensitive ffmpeg error texts that always mean a subtitle stream
/// the output container cannot carry.
pub const SUBTITLE_FAULT_SIGNATURES: &[&str] = &[
    "subtitle encoding currently only possible from text to text or bitmap to bitmap",
    "codec not currently supported in container",
    "could not find tag for codec",
    "unknown encoder 'mov_text'",
];

/// Error wording that counts as a subtitle fault when the same line mentions subtitles.
const SUBTITLE_ERROR_MARKERS: &[&str] = &[
    "error initializing",
    "error while opening encoder",
    "not supported",
    "unsupported",
];

/// Input/output dumps and the stream mapping, printed for every run.
fn is_stream_listing(line: &str) -> bool {
    line.starts_with("stream #") || line.starts_with("input #") || line.starts_with("output #") || line.contains(" -> ")
}

fn is_subtitle_fault_line(line: &str) -> bool {
    let line = line.trim().to_lowercase();
    if is_stream_listing(&line) {
        return false;
    }
    SUBTITLE_FAULT_SIGNATURES.iter().any(|sig| line.contains(sig))
        || (line.contains("subtitle") && SUBTITLE_ERROR_MARKERS.iter().any(|m| line.contains(m)))
}

/// Why a single attempt did not produce a usable output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// Non-zero exit (or killed by a signal)
    Exited { exit_code: Option<i32>, stderr: String },
    /// Exit 0 but the output is missing or zero bytes
    EmptyOutput { stderr: String },
    TimedOut(Duration),
    Spawn(String),
}

impl AttemptFailure {
    /// Text shown to the requester: captured stderr when there is any.
    pub fn diagnostics(&self) -> String {
        match self {
            AttemptFailure::Exited { stderr, .. } if !stderr.trim().is_empty() => stderr.clone(),
            AttemptFailure::EmptyOutput { stderr } if !stderr.trim().is_empty() => {
                format!("{}\nOutput file is missing or empty", stderr)
            }
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptFailure::Exited { exit_code: Some(code), .. } => write!(f, "encoder exited with code {}", code),
            AttemptFailure::Exited { exit_code: None, .. } => f.write_str("encoder was terminated by a signal"),
            AttemptFailure::EmptyOutput { .. } => f.write_str("Output file is missing or empty"),
            AttemptFailure::TimedOut(limit) => write!(f, "encoder timed out after {}s", limit.as_secs()),
            AttemptFailure::Spawn(e) => write!(f, "failed to start encoder: {}", e),
        }
    }
}

/// Escalation predicate: subtitle faults and empty outputs move to the next stage.
pub fn is_subtitle_fault(failure: &AttemptFailure) -> bool {
    match failure {
        AttemptFailure::Exited { stderr, .. } => stderr.lines().any(is_subtitle_fault_line),
        AttemptFailure::EmptyOutput { .. } => true,
        AttemptFailure::TimedOut(_) | AttemptFailure::Spawn(_) => false,
    }
}

/// `primary -> no-subtitles -> compat`, escalating only on subtitle faults.
pub fn default_chain() -> EscalationChain<EncodeProfile, AttemptFailure> {
    EscalationChain::new(EncodeProfile::Primary)
        .then(EncodeProfile::NoSubtitles, is_subtitle_fault)
        .then(EncodeProfile::Compat, is_subtitle_fault)
}

/// `clip.mkv` -> `clip_encoded.mp4`
pub fn output_name_for(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("video");
    format!("{}_encoded.mp4", stem)
}

/// Fraction of the input size saved, `0.0` for an empty input.
pub fn compression_ratio(input_size: u64, output_size: u64) -> f64 {
    if input_size == 0 {
        return 0.0;
    }
    (input_size as f64 - output_size as f64) / input_size as f64
}

/// A staged input and where its encode goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeJob {
    pub input: PathBuf,
    pub output: PathBuf,
}

impl EncodeJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Job for `file_name` staged in `downloads_dir`, writing into `encoded_dir`.
    pub fn for_staged(downloads_dir: &Path, encoded_dir: &Path, file_name: &str) -> Self {
        Self::new(downloads_dir.join(file_name), encoded_dir.join(output_name_for(file_name)))
    }

    fn input_name(&self) -> String {
        display_name(&self.input)
    }

    fn output_name(&self) -> String {
        display_name(&self.output)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Successful encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeReport {
    /// Stage that produced the output
    pub profile: EncodeProfile,
    pub attempts: usize,
    pub input_size: u64,
    pub output_size: u64,
    pub elapsed: Duration,
}

impl EncodeReport {
    pub fn compression_ratio(&self) -> f64 {
        compression_ratio(self.input_size, self.output_size)
    }

    pub fn compression_percent(&self) -> f64 {
        self.compression_ratio() * 100.0
    }
}

/// Terminal encode failures.
#[derive(Debug, Error)]
pub enum EncodeFailure {
    #[error("input file not found: {}", .0.display())]
    InputMissing(PathBuf),

    #[error("encode failed after {attempts} attempt(s), last stage {profile}: {last}")]
    Failed {
        profile: EncodeProfile,
        attempts: usize,
        last: AttemptFailure,
    },

    #[error("failed to prepare output directory: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeFailure {
    /// The last `ERROR_TAIL_CHARS` characters of the failure diagnostics.
    pub fn error_tail(&self) -> String {
        let text = match self {
            EncodeFailure::Failed { last, .. } => last.diagnostics(),
            other => other.to_string(),
        };
        tail_chars(&text, config::encode::ERROR_TAIL_CHARS).to_string()
    }
}

/// Runs encode jobs through the fallback chain with a given runner.
pub struct EncodePipeline<R> {
    runner: R,
    chain: EscalationChain<EncodeProfile, AttemptFailure>,
}

impl<R: EncoderRunner> EncodePipeline<R> {
    pub fn new(runner: R) -> Self {
        Self {
            runner,
            chain: default_chain(),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Encodes `job.input` into `job.output`, escalating through the chain.
    ///
    /// Does not touch the input file.
    pub async fn encode(&self, job: &EncodeJob) -> Result<EncodeReport, EncodeFailure> {
        let started = Instant::now();
        let input_size = match tokio::fs::metadata(&job.input).await {
            Ok(meta) => meta.len(),
            Err(_) => return Err(EncodeFailure::InputMissing(job.input.clone())),
        };
        if let Some(parent) = job.output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let outcome = self.chain.run(|profile| self.attempt(profile, job)).await;

        match outcome.result {
            Ok(output_size) => {
                let report = EncodeReport {
                    profile: outcome.config,
                    attempts: outcome.attempts,
                    input_size,
                    output_size,
                    elapsed: started.elapsed(),
                };
                log::info!(
                    "Encoded {} with {} profile in {:?} ({:.1}% smaller)",
                    job.input.display(),
                    report.profile,
                    report.elapsed,
                    report.compression_percent()
                );
                Ok(report)
            }
            Err(last) => {
                log::error!(
                    "Encoding {} failed after {} attempt(s): {}",
                    job.input.display(),
                    outcome.attempts,
                    last
                );
                Err(EncodeFailure::Failed {
                    profile: outcome.config,
                    attempts: outcome.attempts,
                    last,
                })
            }
        }
    }

    async fn attempt(&self, profile: EncodeProfile, job: &EncodeJob) -> Result<u64, AttemptFailure> {
        let outcome = match self.runner.run(profile, &job.input, &job.output).await {
            Ok(outcome) => outcome,
            Err(RunnerError::TimedOut(limit)) => return Err(AttemptFailure::TimedOut(limit)),
            Err(RunnerError::Spawn(e)) => return Err(AttemptFailure::Spawn(e.to_string())),
        };

        if !outcome.succeeded() {
            log::warn!("Encode stage {} failed for {}", profile, job.input.display());
            return Err(AttemptFailure::Exited {
                exit_code: outcome.exit_code,
                stderr: outcome.stderr,
            });
        }

        match tokio::fs::metadata(&job.output).await {
            Ok(meta) if meta.len() > 0 => Ok(meta.len()),
            _ => {
                log::warn!("Encode stage {} exited 0 but left no output at {}", profile, job.output.display());
                Err(AttemptFailure::EmptyOutput { stderr: outcome.stderr })
            }
        }
    }

    /// Like [`encode`](Self::encode), narrating elapsed time on `sink`.
    ///
    /// The monitor wakes every `MONITOR_TICK_SECS` and renders at most once
    /// per `REPORT_INTERVAL_SECS`; it is dropped the moment the encode
    /// finishes, whatever the outcome.
    pub async fn encode_narrated(&self, job: &EncodeJob, sink: &dyn StatusSink) -> Result<EncodeReport, EncodeFailure> {
        let started = Instant::now();
        let mut reporter = ProgressReporter::new(sink, Throttle::starting_at(started, config::progress::report_interval()));
        let input_name = job.input_name();
        let output_name = job.output_name();

        tokio::select! {
            result = self.encode(job) => result,
            never = reporter.monitor(config::progress::monitor_tick(), |now| {
                TransferStatus::Encoding {
                    elapsed_secs: now.duration_since(started).as_secs(),
                    input_name: input_name.clone(),
                    output_name: output_name.clone(),
                }
                .to_message()
            }) => match never {},
        }
    }

    /// Runs `job` with narration, then deletes the input (best-effort) whatever the outcome.
    pub async fn run_job(&self, job: &EncodeJob, sink: &dyn StatusSink) -> Result<EncodeReport, EncodeFailure> {
        let result = self.encode_narrated(job, sink).await;
        remove_quietly(&job.input).await;
        result
    }
}

/// Best-effort file deletion; failures are logged only.
pub async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("Failed to delete {}: {}", path.display(), e);
        }
    }
}
