//! Short-lived mapping from encode-button tokens to staged files.
//!
//! A token is issued when an upload finishes staging and is consumed exactly
//! once when its owner presses the encode button. Records disappear when
//! consumed, when older than the retention window, or when the tracker is
//! full and they are the oldest insertion. All of those look the same to a
//! caller: `NotFound`, i.e. "please upload again".

use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::core::config;

/// Opaque callback token correlating a staged file with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferToken(String);

impl TransferToken {
    /// Derives the token from the owner and the staged file name.
    ///
    /// Truncated SHA-256, so collisions are possible; a colliding `put`
    /// silently replaces the earlier record.
    pub fn derive(owner_id: i64, file_name: &str) -> Self {
        let digest = Sha256::digest(format!("{}_{}", owner_id, file_name).as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(config::transfer::TOKEN_LEN);
        Self(hex)
    }

    /// Wraps a token received back from the transport (callback payload).
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A staged file waiting for its encode trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// User allowed to act on the file
    pub owner_id: i64,
    /// File name inside the staging directory
    pub file_name: String,
    /// Used for eviction only
    pub created_at: Instant,
}

impl TransferRecord {
    pub fn new(owner_id: i64, file_name: impl Into<String>, created_at: Instant) -> Self {
        Self {
            owner_id,
            file_name: file_name.into(),
            created_at,
        }
    }

    fn is_expired(&self, now: Instant, max_age: Duration) -> bool {
        now.saturating_duration_since(self.created_at) > max_age
    }
}

/// Why a token could not be consumed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TakeError {
    /// Never issued, already consumed, expired or evicted
    #[error("transfer token not found")]
    NotFound,
    /// Token exists but belongs to someone else; the record is left in place
    #[error("transfer token belongs to another user")]
    NotOwner,
}

struct Entry {
    seq: u64,
    record: TransferRecord,
}

#[derive(Default)]
struct TrackerState {
    entries: HashMap<TransferToken, Entry>,
    /// Insertion sequence -> token, oldest first
    order: BTreeMap<u64, TransferToken>,
    next_seq: u64,
}

impl TrackerState {
    fn remove(&mut self, token: &TransferToken) -> Option<TransferRecord> {
        let entry = self.entries.remove(token)?;
        self.order.remove(&entry.seq);
        Some(entry.record)
    }

    fn sweep(&mut self, now: Instant, max_age: Duration) -> usize {
        let expired: Vec<TransferToken> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.record.is_expired(now, max_age))
            .map(|(token, _)| token.clone())
            .collect();
        for token in &expired {
            self.remove(token);
        }
        expired.len()
    }
}

/// Bounded, time-limited token map.
///
/// Every operation runs under one mutex and never awaits while holding it, so
/// `take` is an atomic check-and-remove even on a multi-threaded runtime.
pub struct TransferTracker {
    state: Mutex<TrackerState>,
    retention: Duration,
    capacity: usize,
}

impl TransferTracker {
    /// Creates a tracker with a custom retention window and capacity.
    pub fn new(retention: Duration, capacity: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            retention,
            capacity: capacity.max(1),
        }
    }

    /// Creates a tracker with the configured retention (1 hour) and capacity.
    pub fn with_defaults() -> Self {
        Self::new(config::transfer::retention(), config::transfer::MAX_TRACKED)
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn lock(&self) -> MutexGuard<'_, TrackerState> {
        // Every mutation leaves the state consistent, so a poisoned lock is reusable
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Transfer tracker lock was poisoned, recovering...");
                poisoned.into_inner()
            }
        }
    }

    /// Inserts a record, replacing any record under the same token.
    ///
    /// When the tracker is full the oldest insertion is evicted.
    pub fn put(&self, token: TransferToken, record: TransferRecord) {
        let mut state = self.lock();

        if let Some(previous) = state.remove(&token) {
            log::warn!(
                "Transfer token {} reissued; dropping record for user {} ({})",
                token,
                previous.owner_id,
                previous.file_name
            );
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.order.insert(seq, token.clone());
        state.entries.insert(token, Entry { seq, record });

        while state.entries.len() > self.capacity {
            let Some((_, oldest)) = state.order.pop_first() else {
                break;
            };
            if let Some(evicted) = state.entries.remove(&oldest) {
                log::info!(
                    "Transfer tracker full; evicted token {} of user {}",
                    oldest,
                    evicted.record.owner_id
                );
            }
        }
    }

    /// Looks up and removes a record in one step.
    ///
    /// Expired records are swept first, so an expired token is never returned.
    pub fn take(&self, token: &TransferToken, now: Instant) -> Option<TransferRecord> {
        let mut state = self.lock();
        state.sweep(now, self.retention);
        state.remove(token)
    }

    /// Like [`take`](Self::take), but only the owner may consume the record.
    ///
    /// A press by anyone else returns [`TakeError::NotOwner`] and leaves the
    /// record available to its owner.
    pub fn take_owned(&self, token: &TransferToken, owner_id: i64, now: Instant) -> Result<TransferRecord, TakeError> {
        let mut state = self.lock();
        state.sweep(now, self.retention);
        match state.entries.get(token) {
            None => Err(TakeError::NotFound),
            Some(entry) if entry.record.owner_id != owner_id => Err(TakeError::NotOwner),
            Some(_) => state.remove(token).ok_or(TakeError::NotFound),
        }
    }

    /// Removes every record older than `max_age`. Returns how many were removed.
    pub fn sweep(&self, now: Instant, max_age: Duration) -> usize {
        self.lock().sweep(now, max_age)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts the owned background sweep, running every `period`.
    ///
    /// The task stops when the returned handle is aborted or the runtime shuts down.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep(Instant::now(), self.retention);
                if removed > 0 {
                    log::info!("Swept {} expired transfer token(s)", removed);
                }
            }
        })
    }
}

impl Default for TransferTracker {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HOUR: Duration = Duration::from_secs(3600);

    fn record(owner: i64, name: &str, at: Instant) -> TransferRecord {
        TransferRecord::new(owner, name, at)
    }

    #[test]
    fn test_token_is_deterministic_and_short() {
        let a = TransferToken::derive(42, "clip.mkv");
        let b = TransferToken::derive(42, "clip.mkv");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 8);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, TransferToken::derive(43, "clip.mkv"));
        assert_ne!(a, TransferToken::derive(42, "other.mkv"));
    }

    #[test]
    fn test_take_unknown_token() {
        let tracker = TransferTracker::new(HOUR, 16);
        assert_eq!(tracker.take(&TransferToken::from_raw("deadbeef"), Instant::now()), None);
    }

    #[test]
    fn test_take_consumes_exactly_once() {
        let tracker = TransferTracker::new(HOUR, 16);
        let now = Instant::now();
        let token = TransferToken::derive(1, "a.mp4");
        tracker.put(token.clone(), record(1, "a.mp4", now));

        assert_eq!(tracker.take(&token, now), Some(record(1, "a.mp4", now)));
        assert_eq!(tracker.take(&token, now), None);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_put_overwrites_same_token() {
        let tracker = TransferTracker::new(HOUR, 16);
        let now = Instant::now();
        let token = TransferToken::from_raw("abcd1234");
        tracker.put(token.clone(), record(1, "first.mp4", now));
        tracker.put(token.clone(), record(2, "second.mp4", now));

        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.take(&token, now).map(|r| r.file_name), Some("second.mp4".to_string()));
    }

    #[test]
    fn test_expiry_boundary() {
        let tracker = TransferTracker::new(HOUR, 16);
        let start = Instant::now();
        let eps = Duration::from_millis(1);
        let token = TransferToken::from_raw("t1");

        tracker.put(token.clone(), record(1, "a.mp4", start));
        assert_eq!(tracker.sweep(start + HOUR - eps, HOUR), 0);
        assert_eq!(tracker.len(), 1);

        assert_eq!(tracker.sweep(start + HOUR + eps, HOUR), 1);
        assert_eq!(tracker.take(&token, start + HOUR + eps), None);
    }

    #[test]
    fn test_take_sweeps_expired_records_first() {
        let tracker = TransferTracker::new(HOUR, 16);
        let start = Instant::now();
        tracker.put(TransferToken::from_raw("old"), record(1, "old.mp4", start));
        tracker.put(TransferToken::from_raw("new"), record(1, "new.mp4", start + HOUR));

        let later = start + HOUR + Duration::from_secs(1);
        assert_eq!(tracker.take(&TransferToken::from_raw("old"), later), None);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_oldest_insertion() {
        let tracker = TransferTracker::new(HOUR, 2);
        let now = Instant::now();
        for name in ["a", "b", "c"] {
            tracker.put(TransferToken::from_raw(name), record(1, name, now));
        }

        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.take(&TransferToken::from_raw("a"), now), None);
        assert!(tracker.take(&TransferToken::from_raw("b"), now).is_some());
        assert!(tracker.take(&TransferToken::from_raw("c"), now).is_some());
    }

    #[test]
    fn test_reinsert_refreshes_eviction_order() {
        let tracker = TransferTracker::new(HOUR, 2);
        let now = Instant::now();
        tracker.put(TransferToken::from_raw("a"), record(1, "a", now));
        tracker.put(TransferToken::from_raw("b"), record(1, "b", now));
        tracker.put(TransferToken::from_raw("a"), record(1, "a2", now));
        tracker.put(TransferToken::from_raw("c"), record(1, "c", now));

        assert_eq!(tracker.take(&TransferToken::from_raw("b"), now), None);
        assert_eq!(tracker.take(&TransferToken::from_raw("a"), now).map(|r| r.file_name), Some("a2".to_string()));
    }

    #[test]
    fn test_take_owned_rejects_foreign_user_and_keeps_record() {
        let tracker = TransferTracker::new(HOUR, 16);
        let now = Instant::now();
        let token = TransferToken::derive(1, "a.mp4");
        tracker.put(token.clone(), record(1, "a.mp4", now));

        assert_eq!(tracker.take_owned(&token, 2, now), Err(TakeError::NotOwner));
        assert_eq!(tracker.len(), 1);
        assert!(tracker.take_owned(&token, 1, now).is_ok());
        assert_eq!(tracker.take_owned(&token, 1, now), Err(TakeError::NotFound));
    }

    #[test]
    fn test_concurrent_takes_succeed_once() {
        let tracker = Arc::new(TransferTracker::new(HOUR, 16));
        let now = Instant::now();
        let token = TransferToken::from_raw("race");
        tracker.put(token.clone(), record(1, "a.mp4", now));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                let token = token.clone();
                std::thread::spawn(move || tracker.take_owned(&token, 1, now).is_ok())
            })
            .collect();

        let wins = handles.into_iter().map(|h| h.join().unwrap()).filter(|won| *won).count();
        assert_eq!(wins, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_removes_expired() {
        let tracker = Arc::new(TransferTracker::new(Duration::from_millis(10), 16));
        tracker.put(
            TransferToken::from_raw("x"),
            record(1, "x.mp4", Instant::now() - Duration::from_secs(1)),
        );

        let handle = Arc::clone(&tracker).spawn_sweeper(Duration::from_secs(60));
        // First interval tick fires immediately
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(tracker.is_empty());
        handle.abort();
    }
}
