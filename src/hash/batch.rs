// Batch verification module
// Checks a file of digests one run at a time against the same wordlists

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::info;

use super::dictionary::DictionarySource;
use super::error::VerifyError;
use super::scan::{serialize_duration, MatchResult};
use super::verify::{Coordinator, RunHandle, RunOutcome, RunReport, VerifyOptions};

/// Read one digest per line, skipping blank lines and repeats
///
/// Lines are kept as written (trimmed) so that embedded digests such as
/// `user:hash` are normalized by each run rather than here.
pub fn load_digest_file(path: &Path) -> Result<Vec<String>, VerifyError> {
    let bytes = fs::read(path).map_err(|source| VerifyError::DigestFileUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let content = String::from_utf8_lossy(&bytes);

    let mut seen = HashSet::new();
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .map(str::to_string)
        .collect())
}

/// Result for one digest of a batch
#[derive(Debug)]
pub struct BatchEntry {
    pub input: String,
    /// The run's report, or the reason the run never started
    pub result: Result<RunReport, VerifyError>,
}

impl BatchEntry {
    pub fn matched(&self) -> Option<&MatchResult> {
        self.result.as_ref().ok().and_then(|report| report.outcome.matched())
    }
}

/// Results of a batch, in input order
#[derive(Debug, Default)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
    /// Set when a run was cancelled; later digests were not attempted
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl BatchReport {
    /// Digests with a plaintext found
    pub fn found(&self) -> usize {
        self.entries.iter().filter(|e| e.matched().is_some()).count()
    }

    /// Digests attempted
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn display(&self) {
        println!("\n================================================================");
        println!("                  BATCH VERIFICATION                            ");
        println!("================================================================\n");

        for entry in &self.entries {
            match &entry.result {
                Ok(report) => match report.outcome.matched() {
                    Some(result) => println!(
                        "  [ ! ] {} -> {} ({}, {} line {})",
                        entry.input, result.plaintext, result.algorithm, result.dictionary, result.line_number
                    ),
                    None => println!("  [   ] {} {}", entry.input, report.outcome.name()),
                },
                Err(err) => println!(
                    "  [ x ] {}: {}",
                    entry.input,
                    err.to_string().lines().next().unwrap_or_default()
                ),
            }
        }

        if self.interrupted {
            println!("\nBatch cancelled; remaining digests were skipped");
        }

        println!("\n================================================================");
        println!("Found {} of {} digests", self.found(), self.total());
        println!("Duration:            {:.2}s", self.elapsed.as_secs_f64());
        println!("================================================================");
    }

    /// Serialize the batch as pretty-printed JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        #[derive(serde::Serialize)]
        struct JsonEntry<'a> {
            input: &'a str,
            report: Option<&'a RunReport>,
            error: Option<String>,
        }

        #[derive(serde::Serialize)]
        struct JsonOutput<'a> {
            found: usize,
            total: usize,
            interrupted: bool,
            #[serde(serialize_with = "serialize_duration")]
            elapsed: Duration,
            entries: Vec<JsonEntry<'a>>,
        }

        let output = JsonOutput {
            found: self.found(),
            total: self.total(),
            interrupted: self.interrupted,
            elapsed: self.elapsed,
            entries: self
                .entries
                .iter()
                .map(|entry| JsonEntry {
                    input: &entry.input,
                    report: entry.result.as_ref().ok(),
                    error: entry.result.as_ref().err().map(|e| e.to_string()),
                })
                .collect(),
        };

        serde_json::to_string_pretty(&output)
    }
}

impl Coordinator {
    /// Verify each digest in turn
    ///
    /// `sources` is called once per run since dictionaries are consumed by a
    /// run. `follow` receives every started run and must drive it to its
    /// report. A cancelled run ends the batch.
    pub fn verify_batch<F, R>(
        &self,
        digests: &[String],
        options: VerifyOptions,
        mut sources: F,
        mut follow: R,
    ) -> BatchReport
    where
        F: FnMut() -> Vec<DictionarySource>,
        R: FnMut(&str, RunHandle) -> Result<RunReport, VerifyError>,
    {
        let started = Instant::now();
        let mut batch = BatchReport::default();

        for digest in digests {
            let result = self
                .verify(digest, sources(), options)
                .and_then(|handle| follow(digest, handle));

            let cancelled = matches!(&result, Ok(report) if matches!(report.outcome, RunOutcome::Cancelled));
            batch.entries.push(BatchEntry {
                input: digest.clone(),
                result,
            });

            if cancelled {
                batch.interrupted = true;
                break;
            }
        }

        batch.elapsed = started.elapsed();
        info!(
            found = batch.found(),
            total = batch.total(),
            interrupted = batch.interrupted,
            "batch finished"
        );
        batch
    }
}
