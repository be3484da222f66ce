// Verification module
// Runs a digest against a set of dictionaries: one worker per dictionary, first match wins

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::detect::detect_algorithm;
use super::dictionary::{DictionaryId, DictionaryReader, DictionarySource};
use super::digest::{normalize_digest, TargetDigest};
use super::error::VerifyError;
use super::hash::Algorithm;
use super::scan::{
    serialize_duration, CancelToken, MatchResult, ScanProgress, ScanWorker, WorkerMessage,
    WorkerStatus,
};
use crate::config::EngineConfig;

/// Caller-facing options for a run
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    /// Force an algorithm instead of inferring it from the digest length
    pub algorithm: Option<Algorithm>,
    /// Stop every worker as soon as one dictionary matches
    pub stop_on_first_match: bool,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            algorithm: None,
            stop_on_first_match: true,
        }
    }
}

/// A validated request, ready to be started
///
/// Only constructible through validation, so a request in hand always has a
/// well-formed digest, a consistent algorithm and at least one dictionary.
#[derive(Debug)]
pub struct VerificationRequest {
    digest: TargetDigest,
    algorithm: Algorithm,
    sources: Vec<DictionarySource>,
    stop_on_first_match: bool,
}

impl VerificationRequest {
    pub fn new(
        digest: &str,
        sources: Vec<DictionarySource>,
        options: VerifyOptions,
    ) -> Result<Self, VerifyError> {
        let digest = normalize_digest(digest)?;
        let algorithm = detect_algorithm(&digest, options.algorithm)?;
        if sources.is_empty() {
            return Err(VerifyError::NoDictionariesProvided);
        }

        Ok(Self {
            digest,
            algorithm,
            sources,
            stop_on_first_match: options.stop_on_first_match,
        })
    }

    pub fn digest(&self) -> &TargetDigest {
        &self.digest
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn dictionary_count(&self) -> usize {
        self.sources.len()
    }

    pub fn stop_on_first_match(&self) -> bool {
        self.stop_on_first_match
    }
}

/// Terminal state of a run
#[derive(Debug)]
pub enum RunOutcome {
    Matched(MatchResult),
    Exhausted,
    Cancelled,
    Failed(VerifyError),
}

impl RunOutcome {
    pub fn name(&self) -> &'static str {
        match self {
            RunOutcome::Matched(_) => "matched",
            RunOutcome::Exhausted => "exhausted",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Failed(_) => "failed",
        }
    }

    pub fn matched(&self) -> Option<&MatchResult> {
        match self {
            RunOutcome::Matched(result) => Some(result),
            _ => None,
        }
    }
}

/// How a single dictionary ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DictionaryStatus {
    Matched,
    Exhausted,
    Cancelled,
    Failed,
}

/// A dictionary that could not be scanned
#[derive(Debug, Clone, serde::Serialize)]
pub struct DictionaryFailure {
    pub dictionary: DictionaryId,
    pub reason: String,
}

/// Per-dictionary entry of a run report
#[derive(Debug, Clone, serde::Serialize)]
pub struct DictionarySummary {
    pub dictionary: DictionaryId,
    pub status: DictionaryStatus,
    /// Final progress; absent when the dictionary never opened
    pub progress: Option<ScanProgress>,
    pub failure: Option<String>,
}

/// Report of a finished run
#[derive(Debug)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Every accepted match; at most one when stopping on the first match
    pub matches: Vec<MatchResult>,
    /// One entry per dictionary, in request order
    pub dictionaries: Vec<DictionarySummary>,
    pub digest: String,
    pub algorithm: Algorithm,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &DictionarySummary> {
        self.dictionaries
            .iter()
            .filter(|d| d.status == DictionaryStatus::Failed)
    }

    /// Total candidates hashed across all dictionaries
    pub fn candidates_tested(&self) -> u64 {
        self.dictionaries
            .iter()
            .filter_map(|d| d.progress.as_ref())
            .map(|p| p.candidates_tested)
            .sum()
    }

    /// Display a human-readable summary of the run
    pub fn display(&self) {
        println!("\n================================================================");
        match &self.outcome {
            RunOutcome::Matched(_) => println!("                  WEAK PASSWORD FOUND                           "),
            RunOutcome::Exhausted => println!("                  NO MATCH FOUND                                "),
            RunOutcome::Cancelled => println!("                  VERIFICATION CANCELLED                        "),
            RunOutcome::Failed(_) => println!("                  VERIFICATION FAILED                           "),
        }
        println!("================================================================\n");

        println!("Digest:     {}", self.digest);
        println!("Algorithm:  {}", self.algorithm);

        for result in &self.matches {
            println!();
            println!("  [ ! ] Weak Password Found: {}", result.plaintext);
            println!("        Wordlist: {} (line {})", result.dictionary, result.line_number);
        }

        if let RunOutcome::Failed(err) = &self.outcome {
            println!("\n{}", err);
        }

        let failures: Vec<_> = self.failures().collect();
        if !failures.is_empty() {
            println!("\n--- Unreadable Wordlists ({}) ---", failures.len());
            for summary in failures {
                println!(
                    "  - {}: {}",
                    summary.dictionary,
                    summary.failure.as_deref().unwrap_or("unknown error")
                );
            }
        }

        println!("\n================================================================");
        println!("Wordlists checked:   {}", self.dictionaries.len());
        println!("Candidates tested:   {}", self.candidates_tested());
        println!("Duration:            {:.2}s", self.elapsed.as_secs_f64());
        println!("================================================================");
    }

    /// Serialize the report as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl serde::Serialize for RunReport {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        #[derive(serde::Serialize)]
        struct JsonOutput<'a> {
            outcome: &'static str,
            digest: &'a str,
            algorithm: Algorithm,
            #[serde(serialize_with = "serialize_duration")]
            elapsed: Duration,
            error: Option<String>,
            matches: &'a [MatchResult],
            dictionaries: &'a [DictionarySummary],
        }

        let output = JsonOutput {
            outcome: self.outcome.name(),
            digest: &self.digest,
            algorithm: self.algorithm,
            elapsed: self.elapsed,
            error: match &self.outcome {
                RunOutcome::Failed(err) => Some(err.to_string()),
                _ => None,
            },
            matches: &self.matches,
            dictionaries: &self.dictionaries,
        };
        serde::Serialize::serialize(&output, serializer)
    }
}

/// Events delivered to a run's subscriber
#[derive(Debug)]
pub enum VerifyEvent {
    Progress(ScanProgress),
    /// A dictionary could not be opened; the other dictionaries keep going
    DictionaryFailed(DictionaryFailure),
    Match(MatchResult),
    /// Always the last event of a run
    Completed(RunReport),
}

/// Cancels a run from any thread
#[derive(Debug, Clone)]
pub struct RunCanceller {
    caller: CancelToken,
    workers: CancelToken,
}

impl RunCanceller {
    /// Idempotent
    pub fn cancel(&self) {
        if !self.caller.is_cancelled() {
            info!("cancellation requested");
        }
        self.caller.cancel();
        self.workers.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.caller.is_cancelled()
    }
}

/// Handle to a running verification
pub struct RunHandle {
    events: Receiver<VerifyEvent>,
    canceller: RunCanceller,
    coordinator: Option<JoinHandle<()>>,
}

impl RunHandle {
    /// Blocking iterator over the run's events; ends after `VerifyEvent::Completed`
    pub fn events(&self) -> crossbeam_channel::Iter<'_, VerifyEvent> {
        self.events.iter()
    }

    /// Receiver for consuming events on another thread
    pub fn subscribe(&self) -> Receiver<VerifyEvent> {
        self.events.clone()
    }

    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> RunCanceller {
        self.canceller.clone()
    }

    /// Drain the remaining events and return the final report
    pub fn wait(mut self) -> Result<RunReport, VerifyError> {
        let mut report = None;
        for event in self.events.iter() {
            if let VerifyEvent::Completed(r) = event {
                report = Some(r);
            }
        }

        if let Some(handle) = self.coordinator.take() {
            let _ = handle.join();
        }

        report.ok_or_else(|| VerifyError::WorkerPanicked {
            dictionary: "<coordinator>".to_string(),
        })
    }
}

// Marks the coordinator busy for the lifetime of a run
struct RunSlot(Arc<AtomicBool>);

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns verification runs, one at a time
///
/// A coordinator is idle until `start` succeeds, running until the final event
/// of that run is emitted, and idle again afterwards.
pub struct Coordinator {
    config: EngineConfig,
    busy: Arc<AtomicBool>,
}

impl Coordinator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Validate the inputs and start a run
    pub fn verify(
        &self,
        digest: &str,
        sources: Vec<DictionarySource>,
        options: VerifyOptions,
    ) -> Result<RunHandle, VerifyError> {
        let request = VerificationRequest::new(digest, sources, options)?;
        self.start(request)
    }

    /// Start a run for an already validated request
    pub fn start(&self, request: VerificationRequest) -> Result<RunHandle, VerifyError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(VerifyError::RunInProgress);
        }
        let slot = RunSlot(Arc::clone(&self.busy));
        let dictionaries = request.dictionary_count();

        let VerificationRequest {
            digest,
            algorithm,
            sources,
            stop_on_first_match,
        } = request;

        info!(
            digest = %digest,
            %algorithm,
            dictionaries,
            stop_on_first_match,
            "verification started"
        );

        let canceller = RunCanceller {
            caller: CancelToken::new(),
            workers: CancelToken::new(),
        };
        let (worker_tx, worker_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let target = Arc::new(digest);

        let mut ids = Vec::with_capacity(dictionaries);
        let mut workers = Vec::with_capacity(dictionaries);
        for (index, source) in sources.into_iter().enumerate() {
            let id = DictionaryId::new(index, source.name());
            ids.push(id.clone());

            match self.spawn_worker(id.clone(), source, &target, algorithm, &canceller.workers, worker_tx.clone()) {
                Ok(handle) => workers.push((id, handle)),
                Err(source) => {
                    let _ = worker_tx.send(WorkerMessage::Finished {
                        dictionary: id.clone(),
                        status: WorkerStatus::Failed(VerifyError::SpawnFailed {
                            thread: format!("scan-{}", index),
                            source,
                        }),
                        progress: None,
                    });
                }
            }
        }
        // Workers hold the remaining senders, so a worker that dies without
        // reporting still disconnects the channel eventually
        drop(worker_tx);

        let run = RunState {
            ids,
            digest: target.as_hex().to_string(),
            algorithm,
            stop_on_first_match,
            canceller: canceller.clone(),
            started: Instant::now(),
        };

        let coordinator = thread::Builder::new()
            .name("verify-coordinator".to_string())
            .spawn(move || run.coordinate(slot, worker_rx, workers, event_tx));

        match coordinator {
            Ok(handle) => Ok(RunHandle {
                events: event_rx,
                canceller,
                coordinator: Some(handle),
            }),
            Err(source) => {
                canceller.workers.cancel();
                Err(VerifyError::SpawnFailed {
                    thread: "verify-coordinator".to_string(),
                    source,
                })
            }
        }
    }

    fn spawn_worker(
        &self,
        id: DictionaryId,
        source: DictionarySource,
        target: &Arc<TargetDigest>,
        algorithm: Algorithm,
        cancel: &CancelToken,
        tx: Sender<WorkerMessage>,
    ) -> std::io::Result<JoinHandle<()>> {
        let target = Arc::clone(target);
        let cancel = cancel.clone();
        let count_lines = self.config.count_lines;
        let progress_interval = self.config.progress_interval;

        thread::Builder::new()
            .name(format!("scan-{}", id.index))
            .spawn(move || {
                let (status, progress) = match DictionaryReader::open(id.clone(), source, count_lines) {
                    Ok(reader) => {
                        let report = ScanWorker::new(reader, target, algorithm, cancel)
                            .with_progress_interval(progress_interval)
                            .run(&tx);
                        (report.status, Some(report.progress))
                    }
                    Err(e) => (WorkerStatus::Failed(e), None),
                };
                let _ = tx.send(WorkerMessage::Finished {
                    dictionary: id,
                    status,
                    progress,
                });
            })
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

// Everything the coordinator thread needs besides the channels
struct RunState {
    ids: Vec<DictionaryId>,
    digest: String,
    algorithm: Algorithm,
    stop_on_first_match: bool,
    canceller: RunCanceller,
    started: Instant,
}

impl RunState {
    fn coordinate(
        self,
        slot: RunSlot,
        worker_rx: Receiver<WorkerMessage>,
        workers: Vec<(DictionaryId, JoinHandle<()>)>,
        event_tx: Sender<VerifyEvent>,
    ) {
        let total = self.ids.len();
        let mut summaries: Vec<Option<DictionarySummary>> = vec![None; total];
        let mut latest: Vec<Option<ScanProgress>> = vec![None; total];
        let mut matches: Vec<MatchResult> = Vec::new();
        let mut finished = 0usize;

        while finished < total {
            let message = match worker_rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            };

            match message {
                WorkerMessage::Progress(progress) => {
                    latest[progress.dictionary.index] = Some(progress.clone());
                    let _ = event_tx.send(VerifyEvent::Progress(progress));
                }
                WorkerMessage::Matched(result) => {
                    if self.canceller.is_cancelled() {
                        debug!(dictionary = %result.dictionary, "discarding match after cancellation");
                    } else if self.stop_on_first_match && !matches.is_empty() {
                        debug!(dictionary = %result.dictionary, "discarding late match");
                    } else {
                        if self.stop_on_first_match {
                            info!(dictionary = %result.dictionary, "first match accepted, stopping remaining workers");
                            self.canceller.workers.cancel();
                        }
                        matches.push(result.clone());
                        let _ = event_tx.send(VerifyEvent::Match(result));
                    }
                }
                WorkerMessage::Finished { dictionary, status, progress } => {
                    let index = dictionary.index;
                    if summaries[index].is_some() {
                        continue;
                    }
                    finished += 1;

                    let progress = progress.or_else(|| latest[index].take());
                    let summary = match status {
                        WorkerStatus::Matched if matches.iter().any(|m| m.dictionary.index == index) => {
                            self.summary(dictionary, DictionaryStatus::Matched, progress)
                        }
                        // The match was discarded, so this dictionary was effectively cut short
                        WorkerStatus::Matched => self.summary(dictionary, DictionaryStatus::Cancelled, progress),
                        WorkerStatus::Exhausted => self.summary(dictionary, DictionaryStatus::Exhausted, progress),
                        WorkerStatus::Cancelled => self.summary(dictionary, DictionaryStatus::Cancelled, progress),
                        WorkerStatus::Failed(err) => {
                            warn!(dictionary = %dictionary, error = %err, "dictionary failed");
                            let reason = first_line(&err);
                            let _ = event_tx.send(VerifyEvent::DictionaryFailed(DictionaryFailure {
                                dictionary: dictionary.clone(),
                                reason: reason.clone(),
                            }));
                            DictionarySummary {
                                dictionary,
                                status: DictionaryStatus::Failed,
                                progress,
                                failure: Some(reason),
                            }
                        }
                    };
                    summaries[index] = Some(summary);
                }
            }
        }

        // Every worker has reported (or died); joining makes the stop acknowledged
        for (id, handle) in workers {
            if handle.join().is_err() && summaries[id.index].is_none() {
                let err = VerifyError::WorkerPanicked { dictionary: id.name.clone() };
                warn!(dictionary = %id, "{}", err);
                summaries[id.index] = Some(DictionarySummary {
                    dictionary: id.clone(),
                    status: DictionaryStatus::Failed,
                    progress: latest[id.index].take(),
                    failure: Some(err.to_string()),
                });
            }
        }

        let dictionaries: Vec<DictionarySummary> = summaries
            .into_iter()
            .zip(&self.ids)
            .map(|(summary, id)| {
                summary.unwrap_or_else(|| DictionarySummary {
                    dictionary: id.clone(),
                    status: DictionaryStatus::Failed,
                    progress: None,
                    failure: Some("worker stopped without reporting".to_string()),
                })
            })
            .collect();

        let outcome = self.outcome(&matches, &dictionaries);
        info!(outcome = outcome.name(), elapsed = ?self.started.elapsed(), "verification finished");

        let report = RunReport {
            outcome,
            matches,
            dictionaries,
            digest: self.digest,
            algorithm: self.algorithm,
            elapsed: self.started.elapsed(),
        };

        // Idle again before the subscriber learns the run is over
        drop(slot);
        let _ = event_tx.send(VerifyEvent::Completed(report));
    }

    fn summary(
        &self,
        dictionary: DictionaryId,
        status: DictionaryStatus,
        progress: Option<ScanProgress>,
    ) -> DictionarySummary {
        DictionarySummary {
            dictionary,
            status,
            progress,
            failure: None,
        }
    }

    fn outcome(&self, matches: &[MatchResult], dictionaries: &[DictionarySummary]) -> RunOutcome {
        // An accepted first match already ended the run; in all-matches mode a
        // caller cancel still ends it as Cancelled
        if self.stop_on_first_match {
            if let Some(first) = matches.first() {
                return RunOutcome::Matched(first.clone());
            }
        }
        if self.canceller.is_cancelled() {
            return RunOutcome::Cancelled;
        }
        if let Some(first) = matches.first() {
            return RunOutcome::Matched(first.clone());
        }
        if dictionaries.iter().all(|d| d.status == DictionaryStatus::Failed) {
            return RunOutcome::Failed(VerifyError::AllDictionariesUnreadable {
                dictionaries: dictionaries.iter().map(|d| d.dictionary.name.clone()).collect(),
            });
        }
        RunOutcome::Exhausted
    }
}

fn first_line(err: &VerifyError) -> String {
    err.to_string().lines().next().unwrap_or_default().to_string()
}
