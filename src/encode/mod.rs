//! Video encoding with ffmpeg.
//!
//! Each job walks an ordered chain of profiles:
//! - `primary`: 854x480 H.264 + AAC, every stream mapped, subtitles as `mov_text`
//! - `no-subtitles`: the same without subtitle streams
//! - `compat`: a cheap preset with fixed stereo audio for broken inputs
//!
//! A stage is only abandoned for the next one when ffmpeg complains about
//! subtitles or leaves an empty output; any other failure is final.

pub mod escalation;
pub mod pipeline;
pub mod profile;
pub mod runner;

pub use escalation::{Escalated, EscalationChain};
pub use pipeline::{
    compression_ratio, is_subtitle_fault, output_name_for, remove_quietly, AttemptFailure, EncodeFailure, EncodeJob,
    EncodePipeline, EncodeReport,
};
pub use profile::EncodeProfile;
pub use runner::{EncoderRunner, FfmpegRunner, ProcessOutcome, RunnerError};
