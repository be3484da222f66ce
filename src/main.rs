use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use passfail::config::EngineConfig;
use passfail::hash::{
    available_wordlists, compute_digest, load_digest_file, Algorithm, Coordinator,
    DictionarySource, HashRegistry, RunCanceller, RunHandle, RunOutcome, RunReport, ScanProgress,
    VerifyError, VerifyEvent, VerifyOptions,
};
use passfail::logging::init_logging;

/// Check whether a password hash appears in common password wordlists
#[derive(Parser, Debug)]
#[command(name = "passfail", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (defaults to <config dir>/passfail/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Search wordlists for a plaintext matching the digest
    Verify {
        /// Hex digest, optionally embedded in a line such as "user:digest"
        #[arg(required_unless_present = "hash_file", conflicts_with = "hash_file")]
        digest: Option<String>,

        /// Text file with one digest per line, each checked in turn
        #[arg(long, value_name = "FILE")]
        hash_file: Option<PathBuf>,

        /// Wordlist to check (repeatable); "-" reads candidates from stdin
        #[arg(short, long = "wordlist", value_name = "FILE")]
        wordlists: Vec<PathBuf>,

        /// Use every .txt wordlist in this folder when no --wordlist is given
        #[arg(long, value_name = "DIR")]
        wordlist_dir: Option<PathBuf>,

        /// Force the algorithm instead of detecting it from the digest length
        #[arg(short, long)]
        algorithm: Option<String>,

        /// Keep scanning every wordlist after the first match
        #[arg(long)]
        all_matches: bool,

        /// Print the final report as JSON
        #[arg(long)]
        json: bool,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Print the digest of a plaintext
    Hash {
        text: String,

        #[arg(short, long, default_value = "sha256")]
        algorithm: String,
    },

    /// List supported algorithms
    Algorithms,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Verify {
            digest,
            hash_file,
            wordlists,
            wordlist_dir,
            algorithm,
            all_matches,
            json,
            no_progress,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let wordlists = plan_wordlists(wordlists, wordlist_dir.or_else(|| config.wordlist_dir.clone()))?;
            let options = VerifyOptions {
                algorithm: algorithm.map(|name| name.parse::<Algorithm>()).transpose()?,
                stop_on_first_match: !all_matches,
            };

            let interrupt = Interrupt::install()?;
            let view = ProgressView::new(!no_progress && !json && std::io::stderr().is_terminal())?;
            let coordinator = Coordinator::new(config);

            let found = match (digest, hash_file) {
                (Some(digest), _) => {
                    let handle = coordinator.verify(&digest, open_sources(&wordlists), options)?;
                    let report = view.follow(handle, &interrupt)?;
                    if json {
                        println!("{}", report.to_json()?);
                    } else {
                        report.display();
                    }
                    matches!(report.outcome, RunOutcome::Matched(_))
                }
                (None, Some(path)) => {
                    if wordlists.iter().any(|path| is_stdin(path)) {
                        bail!("stdin can only be read once and cannot be a wordlist for --hash-file");
                    }
                    let digests = load_digest_file(&path)?;
                    let batch = coordinator.verify_batch(
                        &digests,
                        options,
                        || open_sources(&wordlists),
                        |_, handle| view.follow(handle, &interrupt),
                    );
                    if json {
                        println!("{}", batch.to_json()?);
                    } else {
                        batch.display();
                    }
                    batch.found() > 0
                }
                (None, None) => bail!("either a digest or --hash-file is required"),
            };

            if !found {
                std::process::exit(1);
            }
        }
        Command::Hash { text, algorithm } => {
            let algorithm: Algorithm = algorithm.parse()?;
            println!("{}  {}", compute_digest(&text, algorithm), algorithm);
        }
        Command::Algorithms => {
            println!("{:<10} {:>6} {:>10}", "Algorithm", "Bits", "Hex chars");
            for info in HashRegistry::list_algorithms() {
                println!("{:<10} {:>6} {:>10}", info.name, info.output_bits, info.hex_length);
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::load_default()?,
    };
    Ok(config)
}

fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Resolve which wordlists a run uses; "-" stands for stdin and may appear once
fn plan_wordlists(wordlists: Vec<PathBuf>, wordlist_dir: Option<PathBuf>) -> Result<Vec<PathBuf>> {
    if !wordlists.is_empty() {
        if wordlists.iter().filter(|path| is_stdin(path)).count() > 1 {
            bail!("stdin (\"-\") can be given as a wordlist only once");
        }
        return Ok(wordlists);
    }

    // An empty list is rejected by the engine with a proper suggestion
    let Some(dir) = wordlist_dir else {
        return Ok(Vec::new());
    };
    available_wordlists(&dir).with_context(|| format!("listing wordlists in {}", dir.display()))
}

fn open_sources(wordlists: &[PathBuf]) -> Vec<DictionarySource> {
    wordlists
        .iter()
        .map(|path| {
            if is_stdin(path) {
                DictionarySource::stream("<stdin>", std::io::stdin())
            } else {
                DictionarySource::path(path)
            }
        })
        .collect()
}

/// Routes Ctrl-C to whichever run is in progress
#[derive(Clone, Default)]
struct Interrupt {
    requested: Arc<AtomicBool>,
    current: Arc<Mutex<Option<RunCanceller>>>,
}

impl Interrupt {
    fn install() -> Result<Self> {
        let interrupt = Self::default();
        let handler = interrupt.clone();
        ctrlc::set_handler(move || {
            if handler.requested.load(Ordering::SeqCst) {
                eprintln!("\nForce shutdown requested. Exiting immediately...");
                std::process::exit(130);
            }
            eprintln!("\nCancelling... (press Ctrl+C again to force quit)");
            handler.trigger();
        })
        .context("Failed to set Ctrl+C handler")?;
        Ok(interrupt)
    }

    fn trigger(&self) {
        self.requested.store(true, Ordering::SeqCst);
        if let Ok(current) = self.current.lock() {
            if let Some(canceller) = current.as_ref() {
                canceller.cancel();
            }
        }
    }

    fn attach(&self, handle: &RunHandle) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(handle.canceller());
        }
        // A Ctrl-C between two runs still cancels the next one
        if self.requested.load(Ordering::SeqCst) {
            handle.cancel();
        }
    }

    fn detach(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }
}

/// Per-wordlist progress bars
struct ProgressView {
    multi: MultiProgress,
    counted: ProgressStyle,
    streaming: ProgressStyle,
}

impl ProgressView {
    fn new(visible: bool) -> Result<Self> {
        let multi = MultiProgress::new();
        if !visible {
            multi.set_draw_target(ProgressDrawTarget::hidden());
        }

        let counted = ProgressStyle::with_template("{prefix:24!} [{bar:30.cyan/blue}] {pos}/{len} lines {msg}")?
            .progress_chars("=>-");
        let streaming = ProgressStyle::with_template("{spinner:.cyan} {prefix:22!} {pos} lines {msg}")?;

        Ok(Self {
            multi,
            counted,
            streaming,
        })
    }

    /// Render progress until the run completes
    fn follow(&self, handle: RunHandle, interrupt: &Interrupt) -> Result<RunReport, VerifyError> {
        interrupt.attach(&handle);

        let mut bars: HashMap<usize, ProgressBar> = HashMap::new();
        let mut report = None;

        for event in handle.events() {
            match event {
                VerifyEvent::Progress(progress) => {
                    let bar = bars.entry(progress.dictionary.index).or_insert_with(|| {
                        let pb = match progress.total_lines {
                            Some(total) => ProgressBar::new(total).with_style(self.counted.clone()),
                            None => ProgressBar::new_spinner().with_style(self.streaming.clone()),
                        };
                        pb.set_prefix(short_name(&progress.dictionary.name));
                        self.multi.add(pb)
                    });
                    bar.set_position(progress.lines_processed);
                    bar.set_message(progress_message(&progress));
                }
                VerifyEvent::DictionaryFailed(failure) => {
                    self.multi
                        .suspend(|| eprintln!("Warning: {}: {}", failure.dictionary, failure.reason));
                }
                VerifyEvent::Match(result) => {
                    self.multi.suspend(|| {
                        eprintln!("[ ! ] Match in {} at line {}", result.dictionary, result.line_number)
                    });
                }
                VerifyEvent::Completed(r) => report = Some(r),
            }
        }

        interrupt.detach();
        for bar in bars.values() {
            bar.finish_and_clear();
            self.multi.remove(bar);
        }

        report.ok_or_else(|| VerifyError::WorkerPanicked {
            dictionary: "<coordinator>".to_string(),
        })
    }
}

fn progress_message(progress: &ScanProgress) -> String {
    let mut parts = Vec::new();
    if let Some(fraction) = progress.fraction() {
        parts.push(format!("({:.0}%)", fraction * 100.0));
    }
    if progress.errors > 0 {
        parts.push(format!("{} skipped", progress.errors));
    }
    parts.join(" ")
}

fn short_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
