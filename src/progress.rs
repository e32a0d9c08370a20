//! Throttled status reporting shared by downloads, encodes and uploads.
//!
//! A transfer produces `(current, total)` samples far more often than the
//! messaging transport tolerates edits. [`Throttle`] holds the only state
//! needed to cap that, and [`ProgressReporter`] pairs it with a
//! [`StatusSink`]. Rendering failures are logged and dropped; reporting never
//! interferes with the transfer it describes.

use async_trait::async_trait;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::time::Instant;

use crate::core::error::AppResult;
use crate::core::utils::bytes_to_mb;

/// Rate limiter for status edits: `{last_emit, interval}`.
///
/// The first report is due one full interval after construction, never
/// immediately. Sampling a stream every second for 60 seconds with a 20 second
/// interval therefore emits at 20 s, 40 s and 60 s.
#[derive(Debug, Clone)]
pub struct Throttle {
    last_emit: Instant,
    interval: Duration,
}

impl Throttle {
    /// Starts the interval clock now.
    pub fn new(interval: Duration) -> Self {
        Self::starting_at(Instant::now(), interval)
    }

    pub fn starting_at(start: Instant, interval: Duration) -> Self {
        Self {
            last_emit: start,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and records the emission if a report is due at `now`.
    pub fn ready(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_emit) >= self.interval {
            self.last_emit = now;
            true
        } else {
            false
        }
    }
}

/// A single status message on the messaging transport.
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Replaces the message text.
    async fn render(&self, text: String) -> AppResult<()>;

    /// Deletes the message.
    async fn remove(&self) -> AppResult<()>;
}

/// Throttled, failure-tolerant writer for one status message.
pub struct ProgressReporter<'a> {
    sink: &'a dyn StatusSink,
    throttle: Throttle,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn StatusSink, throttle: Throttle) -> Self {
        Self { sink, throttle }
    }

    /// Renders `text()` if the throttle allows it at `now`.
    ///
    /// The throttle advances even when rendering fails, so a deleted message
    /// is not retried more than once per interval. Returns whether a render
    /// was attempted.
    pub async fn report<F>(&mut self, now: Instant, text: F) -> bool
    where
        F: FnOnce() -> String,
    {
        if !self.throttle.ready(now) {
            return false;
        }
        render_quietly(self.sink, text()).await;
        true
    }

    /// Renders immediately, bypassing the throttle (state transitions).
    pub async fn force(&mut self, text: String) {
        render_quietly(self.sink, text).await;
    }

    /// Wakes every `tick` and renders whatever `text` produces when a report is due.
    ///
    /// Never returns; race it against the work it narrates and drop it when
    /// the work completes.
    pub async fn monitor<F>(&mut self, tick: Duration, mut text: F) -> Infallible
    where
        F: FnMut(Instant) -> String,
    {
        loop {
            tokio::time::sleep(tick).await;
            let now = Instant::now();
            self.report(now, || text(now)).await;
        }
    }

    pub fn sink(&self) -> &'a dyn StatusSink {
        self.sink
    }
}

/// Renders and swallows failures (e.g. the message was deleted by the user).
pub async fn render_quietly(sink: &dyn StatusSink, text: String) {
    if let Err(e) = sink.render(text).await {
        log::debug!("Ignoring status render failure: {}", e);
    }
}

/// Status texts for every stage a request goes through.
#[derive(Debug, Clone)]
pub enum TransferStatus {
    /// Inbound file being staged
    Downloading { file_name: String, current: u64, total: u64 },
    /// Encode running; only wall-clock time is known
    Encoding {
        elapsed_secs: u64,
        input_name: String,
        output_name: String,
    },
    /// Result being delivered
    Uploading { file_name: String, current: u64, total: u64 },
}

impl TransferStatus {
    pub fn to_message(&self) -> String {
        match self {
            TransferStatus::Downloading {
                file_name,
                current,
                total,
            } => format!(
                "📥 Downloading...\n📁 File: {}\n📊 Progress: {:.1}%\n💾 {:.1} MB / {:.1} MB",
                file_name,
                percent(*current, *total),
                bytes_to_mb(*current),
                bytes_to_mb(*total)
            ),
            TransferStatus::Encoding {
                elapsed_secs,
                input_name,
                output_name,
            } => format!(
                "🎬 Encoding in Progress...\n⏱️ Time elapsed: {}s\n📁 Input: {}\n🎯 Output: {}",
                elapsed_secs, input_name, output_name
            ),
            TransferStatus::Uploading {
                file_name,
                current,
                total,
            } => format!(
                "📤 Uploading...\n📁 File: {}\n📊 Progress: {:.1}%\n💾 {:.1} MB / {:.1} MB",
                file_name,
                percent(*current, *total),
                bytes_to_mb(*current),
                bytes_to_mb(*total)
            ),
        }
    }
}

/// Percentage of `current` in `total`, `0.0` for an unknown total.
pub fn percent(current: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (current as f64 / total as f64 * 100.0).min(100.0)
}

/// Byte counter shared between a transfer and the task narrating it.
#[derive(Clone, Default)]
pub struct TransferCounter {
    bytes: Arc<AtomicU64>,
}

impl TransferCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, bytes: usize) {
        self.bytes.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// An `AsyncRead` wrapper that reports bytes read to a [`TransferCounter`].
pub struct ProgressReader<R> {
    inner: R,
    counter: TransferCounter,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, counter: TransferCounter) -> Self {
        Self { inner, counter }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let after = buf.filled().len();
            if after > before {
                self.counter.add_bytes(after - before);
            }
        }
        poll
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppError;
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;

    #[derive(Default)]
    struct RecordingSink {
        texts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl StatusSink for RecordingSink {
        async fn render(&self, text: String) -> AppResult<()> {
            self.texts.lock().unwrap().push(text);
            if self.fail {
                return Err(AppError::Validation("message to edit not found".into()));
            }
            Ok(())
        }

        async fn remove(&self) -> AppResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_throttle_waits_for_first_interval() {
        let start = Instant::now();
        let mut throttle = Throttle::starting_at(start, Duration::from_secs(20));
        assert!(!throttle.ready(start));
        assert!(!throttle.ready(start + Duration::from_secs(19)));
        assert!(throttle.ready(start + Duration::from_secs(20)));
        assert!(!throttle.ready(start + Duration::from_secs(21)));
    }

    #[tokio::test]
    async fn test_one_sample_per_second_for_a_minute_renders_three_times() {
        let sink = RecordingSink::default();
        let start = Instant::now();
        let mut reporter = ProgressReporter::new(&sink, Throttle::starting_at(start, Duration::from_secs(20)));

        let total = 60u64;
        let mut emitted_at = Vec::new();
        for second in 1..=60u64 {
            let now = start + Duration::from_secs(second);
            let status = TransferStatus::Downloading {
                file_name: "clip.mkv".into(),
                current: second,
                total,
            };
            if reporter.report(now, || status.to_message()).await {
                emitted_at.push(second);
            }
        }

        assert_eq!(emitted_at, vec![20, 40, 60]);
        assert_eq!(sink.texts.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_render_failure_is_swallowed() {
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let start = Instant::now();
        let mut reporter = ProgressReporter::new(&sink, Throttle::starting_at(start, Duration::from_secs(20)));

        assert!(reporter.report(start + Duration::from_secs(20), || "a".into()).await);
        assert!(!reporter.report(start + Duration::from_secs(25), || "b".into()).await);
        assert!(reporter.report(start + Duration::from_secs(40), || "c".into()).await);
        assert_eq!(*sink.texts.lock().unwrap(), vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_reports_on_throttle_cadence() {
        let sink = RecordingSink::default();
        let start = Instant::now();
        let mut reporter = ProgressReporter::new(&sink, Throttle::starting_at(start, Duration::from_secs(20)));

        let monitor = reporter.monitor(Duration::from_secs(5), |now| {
            format!("{}s", now.duration_since(start).as_secs())
        });
        let _ = tokio::time::timeout(Duration::from_secs(61), monitor).await;

        assert_eq!(*sink.texts.lock().unwrap(), vec!["20s", "40s", "60s"]);
    }

    #[test]
    fn test_status_messages() {
        let text = TransferStatus::Downloading {
            file_name: "clip.mkv".into(),
            current: 512 * 1024 * 1024,
            total: 1024 * 1024 * 1024,
        }
        .to_message();
        assert!(text.contains("clip.mkv"));
        assert!(text.contains("50.0%"));
        assert!(text.contains("512.0 MB / 1024.0 MB"));

        let text = TransferStatus::Encoding {
            elapsed_secs: 42,
            input_name: "clip.mkv".into(),
            output_name: "clip_encoded.mp4".into(),
        }
        .to_message();
        assert!(text.contains("42s"));
        assert!(text.contains("clip_encoded.mp4"));
    }

    #[test]
    fn test_percent_handles_unknown_total() {
        assert_eq!(percent(10, 0), 0.0);
        assert_eq!(percent(5, 10), 50.0);
        assert_eq!(percent(20, 10), 100.0);
    }

    #[tokio::test]
    async fn test_progress_reader_counts_bytes() {
        let counter = TransferCounter::new();
        let data: &[u8] = b"0123456789";
        let mut reader = ProgressReader::new(data, counter.clone());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();

        assert_eq!(out, data);
        assert_eq!(counter.bytes(), 10);
    }
}
