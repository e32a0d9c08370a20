//! In-memory stand-ins for the transport and the encoder
//!
//! Shared by the workflow integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use encodebot::encode::{EncodePipeline, EncodeProfile, EncoderRunner, ProcessOutcome, RunnerError};
use encodebot::progress::{ProgressReporter, StatusSink, TransferCounter};
use encodebot::transfer::TransferTracker;
use encodebot::workflow::{EncodeService, FileFetcher, VideoDelivery, Workspace};
use encodebot::{AppError, AppResult};

/// Serves a fixed payload as the "remote" file.
pub struct MemoryFetcher {
    pub payload: Vec<u8>,
}

impl MemoryFetcher {
    pub fn with_size(size: usize) -> Self {
        Self { payload: vec![7u8; size] }
    }
}

#[async_trait]
impl FileFetcher for MemoryFetcher {
    async fn fetch(&self, dest: &Path, reporter: &mut ProgressReporter<'_>) -> AppResult<u64> {
        tokio::fs::write(dest, &self.payload).await?;
        reporter.force(format!("📥 {} bytes", self.payload.len())).await;
        Ok(self.payload.len() as u64)
    }
}

/// Records every rendered status and whether the message was removed.
#[derive(Default)]
pub struct RecordingSink {
    rendered: Mutex<Vec<String>>,
    removed: AtomicBool,
}

impl RecordingSink {
    pub fn rendered(&self) -> Vec<String> {
        self.rendered.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.rendered.lock().unwrap().last().cloned()
    }

    pub fn was_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn render(&self, text: String) -> AppResult<()> {
        self.rendered.lock().unwrap().push(text);
        Ok(())
    }

    async fn remove(&self) -> AppResult<()> {
        self.removed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// What the delivery fake saw when it was asked to send a video.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub caption: String,
}

/// Reads the finished file into memory instead of uploading it.
#[derive(Default)]
pub struct CollectingDelivery {
    delivered: Mutex<Vec<Delivered>>,
}

impl CollectingDelivery {
    pub fn delivered(&self) -> Vec<Delivered> {
        self.delivered.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoDelivery for CollectingDelivery {
    async fn deliver(&self, path: &Path, caption: String, counter: TransferCounter) -> AppResult<()> {
        let bytes = tokio::fs::read(path).await?;
        counter.add_bytes(bytes.len());
        self.delivered.lock().unwrap().push(Delivered {
            path: path.to_path_buf(),
            bytes,
            caption,
        });
        Ok(())
    }
}

/// Reads part of the file, then fails the way a dropped connection would.
#[derive(Default)]
pub struct FailingDelivery {
    attempts: AtomicUsize,
}

impl FailingDelivery {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoDelivery for FailingDelivery {
    async fn deliver(&self, path: &Path, _caption: String, counter: TransferCounter) -> AppResult<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let len = tokio::fs::metadata(path).await?.len();
        counter.add_bytes((len / 2) as usize);
        Err(AppError::Validation("connection reset by peer".into()))
    }
}

/// Writes a quarter-sized output, optionally failing the first attempts
/// the way ffmpeg does on an unsupported subtitle stream.
pub struct QuarteringRunner {
    subtitle_failures: usize,
    calls: AtomicUsize,
    profiles: Mutex<Vec<EncodeProfile>>,
}

impl QuarteringRunner {
    pub fn new() -> Self {
        Self::failing_subtitles(0)
    }

    pub fn failing_subtitles(times: usize) -> Self {
        Self {
            subtitle_failures: times,
            calls: AtomicUsize::new(0),
            profiles: Mutex::new(Vec::new()),
        }
    }

    pub fn profiles(&self) -> Vec<EncodeProfile> {
        self.profiles.lock().unwrap().clone()
    }
}

#[async_trait]
impl EncoderRunner for QuarteringRunner {
    async fn run(&self, profile: EncodeProfile, input: &Path, output: &Path) -> Result<ProcessOutcome, RunnerError> {
        self.profiles.lock().unwrap().push(profile);
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.subtitle_failures {
            return Ok(ProcessOutcome {
                exit_code: Some(1),
                stderr: "Subtitle codec 94213 is not supported.\nError initializing output stream".into(),
            });
        }

        let data = tokio::fs::read(input).await?;
        tokio::fs::write(output, &data[..data.len() / 4]).await?;
        Ok(ProcessOutcome {
            exit_code: Some(0),
            stderr: String::new(),
        })
    }
}

/// A service rooted in a fresh temporary directory.
pub struct Harness<R> {
    pub dir: TempDir,
    pub service: Arc<EncodeService<R>>,
}

impl<R: EncoderRunner> Harness<R> {
    pub fn new(runner: R) -> Self {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::new(dir.path().join("downloads"), dir.path().join("encoded"));
        let service = Arc::new(EncodeService::new(
            Arc::new(TransferTracker::with_defaults()),
            EncodePipeline::new(runner),
            workspace,
        ));
        Self { dir, service }
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    pub fn encoded_dir(&self) -> PathBuf {
        self.dir.path().join("encoded")
    }
}
