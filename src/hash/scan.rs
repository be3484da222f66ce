// Dictionary scanning module
// Hashes every candidate of one dictionary and compares it against the target digest

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use tracing::{debug, info};

use super::dictionary::{DictionaryId, DictionaryReader, Line};
use super::digest::TargetDigest;
use super::error::VerifyError;
use super::hash::Algorithm;

/// Lines processed between two progress ticks unless configured otherwise
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 1000;

/// Progress information for one dictionary
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScanProgress {
    pub dictionary: DictionaryId,
    /// Raw lines consumed, including blank and skipped ones
    pub lines_processed: u64,
    pub candidates_tested: u64,
    /// Known only for file sources with line counting enabled
    pub total_lines: Option<u64>,
    /// Lines skipped because they could not be decoded
    pub errors: u64,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Completed fraction in `0.0..=1.0`, when the total is known
    pub fn fraction(&self) -> Option<f64> {
        match self.total_lines {
            Some(0) => Some(1.0),
            Some(total) => Some((self.lines_processed as f64 / total as f64).min(1.0)),
            None => None,
        }
    }
}

/// A candidate whose digest equals the target
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MatchResult {
    pub plaintext: String,
    pub dictionary: DictionaryId,
    /// 1-based line number within the dictionary
    pub line_number: u64,
    pub algorithm: Algorithm,
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

// Helper function to serialize Duration as seconds
pub(crate) fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// How a worker stopped
#[derive(Debug)]
pub enum WorkerStatus {
    Matched,
    Exhausted,
    Cancelled,
    Failed(VerifyError),
}

/// Messages sent from workers to the coordinator
#[derive(Debug)]
pub enum WorkerMessage {
    Progress(ScanProgress),
    Matched(MatchResult),
    Finished {
        dictionary: DictionaryId,
        status: WorkerStatus,
        /// Last known progress; absent when the dictionary never opened
        progress: Option<ScanProgress>,
    },
}

/// Cooperative cancellation flag shared between the coordinator and its workers
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; calling it again has no further effect
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Final state of a worker after `run`
#[derive(Debug)]
pub struct WorkerReport {
    pub status: WorkerStatus,
    pub progress: ScanProgress,
}

/// Scans a single dictionary
///
/// The worker owns its reader exclusively; the target digest is shared
/// read-only with the other workers of the run. Cancellation is checked before
/// the first candidate and at every progress tick, so a cancelled worker stops
/// within one tick interval.
pub struct ScanWorker {
    reader: DictionaryReader,
    target: Arc<TargetDigest>,
    algorithm: Algorithm,
    progress_interval: u64,
    cancel: CancelToken,
}

impl ScanWorker {
    pub fn new(
        reader: DictionaryReader,
        target: Arc<TargetDigest>,
        algorithm: Algorithm,
        cancel: CancelToken,
    ) -> Self {
        Self {
            reader,
            target,
            algorithm,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            cancel,
        }
    }

    /// Set how many lines are processed between progress ticks
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Scan until a match, exhaustion or cancellation
    ///
    /// Progress ticks and a match (if any) are sent on `events`; the final
    /// status is returned rather than sent so the caller decides how to report it.
    pub fn run(mut self, events: &Sender<WorkerMessage>) -> WorkerReport {
        let start_time = Instant::now();
        let mut hasher = self.algorithm.hasher();
        let mut candidates_tested = 0u64;

        debug!(dictionary = %self.reader.id(), algorithm = %self.algorithm, "scan started");

        if self.cancel.is_cancelled() {
            return self.report(WorkerStatus::Cancelled, candidates_tested, start_time);
        }

        while let Some(line) = self.reader.next_line() {
            if let Line::Candidate(candidate) = line {
                hasher.update(candidate.as_bytes());
                let computed = hasher.finalize_reset();
                candidates_tested += 1;

                if self.target.matches(&computed) {
                    let result = MatchResult {
                        plaintext: candidate,
                        dictionary: self.reader.id().clone(),
                        line_number: self.reader.lines_read(),
                        algorithm: self.algorithm,
                        elapsed: start_time.elapsed(),
                    };
                    info!(
                        dictionary = %result.dictionary,
                        line = result.line_number,
                        "match found"
                    );
                    let _ = events.send(WorkerMessage::Matched(result));
                    return self.report(WorkerStatus::Matched, candidates_tested, start_time);
                }
            }

            // Ticks follow raw lines so blank or undecodable runs still observe cancellation
            if self.reader.lines_read() % self.progress_interval == 0 {
                let _ = events.send(WorkerMessage::Progress(
                    self.progress(candidates_tested, start_time),
                ));
                if self.cancel.is_cancelled() {
                    debug!(dictionary = %self.reader.id(), candidates_tested, "scan cancelled");
                    return self.report(WorkerStatus::Cancelled, candidates_tested, start_time);
                }
            }
        }

        let progress = self.progress(candidates_tested, start_time);
        let _ = events.send(WorkerMessage::Progress(progress.clone()));

        // A cancellation observed in the same tick as exhaustion wins
        let status = if self.cancel.is_cancelled() {
            WorkerStatus::Cancelled
        } else {
            WorkerStatus::Exhausted
        };
        debug!(dictionary = %self.reader.id(), candidates_tested, ?status, "scan finished");

        WorkerReport { status, progress }
    }

    fn progress(&self, candidates_tested: u64, start_time: Instant) -> ScanProgress {
        ScanProgress {
            dictionary: self.reader.id().clone(),
            lines_processed: self.reader.lines_read(),
            candidates_tested,
            total_lines: self.reader.total_lines(),
            errors: self.reader.skipped_lines(),
            elapsed: start_time.elapsed(),
        }
    }

    fn report(&self, status: WorkerStatus, candidates_tested: u64, start_time: Instant) -> WorkerReport {
        WorkerReport {
            status,
            progress: self.progress(candidates_tested, start_time),
        }
    }
}
