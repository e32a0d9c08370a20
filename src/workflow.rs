//! Request orchestration: stage an upload, claim its token, encode and deliver.
//!
//! Everything transport-specific sits behind [`FileFetcher`],
//! [`VideoDelivery`] and [`StatusSink`], so the same flow runs against
//! Telegram in production and against in-memory fakes in tests.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::core::validation::{validate_upload, UploadRejection, UploadRequest};
use crate::encode::{remove_quietly, EncodeFailure, EncodeJob, EncodePipeline, EncodeReport, EncoderRunner};
use crate::messages;
use crate::progress::{render_quietly, ProgressReporter, StatusSink, Throttle, TransferCounter, TransferStatus};
use crate::transfer::{TakeError, TransferRecord, TransferToken, TransferTracker};

/// Source of an inbound file.
#[async_trait]
pub trait FileFetcher: Send + Sync {
    /// Writes the remote file to `dest` and returns the number of bytes written.
    ///
    /// Progress goes through `reporter`, which decides when to render.
    async fn fetch(&self, dest: &Path, reporter: &mut ProgressReporter<'_>) -> AppResult<u64>;
}

/// Sink for a finished video.
#[async_trait]
pub trait VideoDelivery: Send + Sync {
    /// Uploads `path` as a video, adding every byte read to `counter`.
    async fn deliver(&self, path: &Path, caption: String, counter: TransferCounter) -> AppResult<()>;
}

/// The two flat working directories.
#[derive(Debug, Clone)]
pub struct Workspace {
    downloads_dir: PathBuf,
    encoded_dir: PathBuf,
}

impl Workspace {
    pub fn new(downloads_dir: impl Into<PathBuf>, encoded_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
            encoded_dir: encoded_dir.into(),
        }
    }

    /// `DOWNLOADS_DIR` and `ENCODED_DIR`.
    pub fn from_config() -> Self {
        Self::new(config::DOWNLOADS_DIR.clone(), config::ENCODED_DIR.clone())
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub fn encoded_dir(&self) -> &Path {
        &self.encoded_dir
    }

    pub fn staged_path(&self, file_name: &str) -> PathBuf {
        self.downloads_dir.join(file_name)
    }

    pub fn job_for(&self, file_name: &str) -> EncodeJob {
        EncodeJob::for_staged(&self.downloads_dir, &self.encoded_dir, file_name)
    }

    /// `(staged, encoded)` file counts; a missing directory counts as empty.
    pub fn file_counts(&self) -> (usize, usize) {
        (count_entries(&self.downloads_dir), count_entries(&self.encoded_dir))
    }
}

fn count_entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// A file that finished staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub token: TransferToken,
    pub file_name: String,
    pub size: u64,
}

/// How an encode request ended.
#[derive(Debug)]
pub enum JobOutcome {
    Delivered(EncodeReport),
    /// The staged file disappeared before the encode started
    InputMissing,
    EncodeFailed(EncodeFailure),
    DeliveryFailed { report: EncodeReport, error: AppError },
}

/// Per-process state shared by every request.
pub struct EncodeService<R> {
    tracker: Arc<TransferTracker>,
    pipeline: EncodePipeline<R>,
    workspace: Workspace,
}

impl<R: EncoderRunner> EncodeService<R> {
    pub fn new(tracker: Arc<TransferTracker>, pipeline: EncodePipeline<R>, workspace: Workspace) -> Self {
        Self {
            tracker,
            pipeline,
            workspace,
        }
    }

    pub fn tracker(&self) -> &Arc<TransferTracker> {
        &self.tracker
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn pipeline(&self) -> &EncodePipeline<R> {
        &self.pipeline
    }

    /// Validates upload metadata. Touches nothing on disk.
    pub fn check_upload(&self, request: &UploadRequest, now_unix: i64) -> Result<String, UploadRejection> {
        validate_upload(request, now_unix)
    }

    /// Downloads `file_name` into the staging directory and issues its token.
    ///
    /// A failed download removes the partial file and issues nothing.
    pub async fn stage(
        &self,
        owner_id: i64,
        file_name: &str,
        fetcher: &dyn FileFetcher,
        sink: &dyn StatusSink,
    ) -> AppResult<StagedFile> {
        tokio::fs::create_dir_all(self.workspace.downloads_dir()).await?;
        let dest = self.workspace.staged_path(file_name);

        let mut reporter = ProgressReporter::new(sink, Throttle::new(config::progress::report_interval()));
        let size = match fetcher.fetch(&dest, &mut reporter).await {
            Ok(size) => size,
            Err(e) => {
                log::error!("Download of {} for user {} failed: {}", file_name, owner_id, e);
                remove_quietly(&dest).await;
                return Err(e);
            }
        };

        let token = TransferToken::derive(owner_id, file_name);
        self.tracker
            .put(token.clone(), TransferRecord::new(owner_id, file_name, Instant::now()));
        log::info!(
            "Staged {} ({} bytes) for user {} as token {}",
            file_name,
            size,
            owner_id,
            token
        );

        Ok(StagedFile {
            token,
            file_name: file_name.to_string(),
            size,
        })
    }

    /// Consumes `token` if `presser_id` owns it; a foreign press leaves it in place.
    pub fn claim(&self, token: &TransferToken, presser_id: i64) -> Result<TransferRecord, TakeError> {
        self.tracker.take_owned(token, presser_id, Instant::now())
    }

    /// Encodes a claimed file and delivers the result, narrating on `sink`.
    ///
    /// The staged input is deleted in every outcome. The output is deleted
    /// after delivery whether or not delivery succeeded.
    pub async fn encode_and_deliver(
        &self,
        record: &TransferRecord,
        sink: &dyn StatusSink,
        delivery: &dyn VideoDelivery,
    ) -> JobOutcome {
        render_quietly(sink, messages::ENCODE_STARTED.to_string()).await;

        let job = self.workspace.job_for(&record.file_name);
        let report = match self.pipeline.run_job(&job, sink).await {
            Ok(report) => report,
            Err(EncodeFailure::InputMissing(path)) => {
                log::warn!("Staged file {} vanished before encoding", path.display());
                render_quietly(sink, messages::FILE_NOT_FOUND.to_string()).await;
                return JobOutcome::InputMissing;
            }
            Err(failure) => {
                render_quietly(sink, messages::encode_failed(&failure.error_tail())).await;
                remove_quietly(&job.output).await;
                return JobOutcome::EncodeFailed(failure);
            }
        };

        render_quietly(sink, messages::encode_complete(&report)).await;

        let delivered = deliver_with_progress(delivery, sink, &job.output, &report).await;
        remove_quietly(&job.output).await;

        match delivered {
            Ok(()) => {
                if let Err(e) = sink.remove().await {
                    log::debug!("Failed to delete status message: {}", e);
                }
                log::info!(
                    "Delivered {} to user {} ({:.1}% smaller)",
                    record.file_name,
                    record.owner_id,
                    report.compression_percent()
                );
                JobOutcome::Delivered(report)
            }
            Err(error) => {
                log::error!("Delivery of {} to user {} failed: {}", record.file_name, record.owner_id, error);
                render_quietly(sink, messages::upload_failed(&error)).await;
                JobOutcome::DeliveryFailed { report, error }
            }
        }
    }
}

async fn deliver_with_progress(
    delivery: &dyn VideoDelivery,
    sink: &dyn StatusSink,
    path: &Path,
    report: &EncodeReport,
) -> AppResult<()> {
    let counter = TransferCounter::new();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let total = report.output_size;
    let mut reporter = ProgressReporter::new(sink, Throttle::new(config::progress::report_interval()));

    tokio::select! {
        result = delivery.deliver(path, messages::encoded_caption(report), counter.clone()) => result,
        never = reporter.monitor(config::progress::monitor_tick(), |_| {
            TransferStatus::Uploading {
                file_name: file_name.clone(),
                current: counter.bytes(),
                total,
            }
            .to_message()
        }) => match never {},
    }
}
