// Centralized error handling module
// Error taxonomy for request validation, dictionary access and run failures

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for the verification engine
/// Provides context-rich error messages with the offending input
#[derive(Debug)]
pub enum VerifyError {
    /// Request validation errors (returned before a run starts)
    InvalidDigest { input: String },
    AlgorithmMismatch { algorithm: String, expected_len: usize, actual_len: usize },
    UnsupportedAlgorithm { algorithm: String },
    NoDictionariesProvided,

    /// Dictionary errors
    DictionaryUnreadable { dictionary: String, source: io::Error },
    LineDecodeError { dictionary: String, line: u64 },

    DigestFileUnreadable { path: PathBuf, source: io::Error },

    /// Run errors
    AllDictionariesUnreadable { dictionaries: Vec<String> },
    RunInProgress,
    SpawnFailed { thread: String, source: io::Error },
    WorkerPanicked { dictionary: String },

    /// Configuration errors
    ConfigRead { path: PathBuf, source: io::Error },
    ConfigParse { path: PathBuf, reason: String },
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            // Validation errors
            VerifyError::InvalidDigest { input } => {
                writeln!(f, "Invalid digest: {:?}", input)?;
                write!(f, "Suggestion: Provide a hex digest of 32, 40, 64 or 128 characters")
            }
            VerifyError::AlgorithmMismatch { algorithm, expected_len, actual_len } => {
                writeln!(
                    f,
                    "Algorithm {} produces {}-character digests but the digest has {} characters",
                    algorithm, expected_len, actual_len
                )?;
                write!(f, "Suggestion: Drop the algorithm override to detect it from the digest length")
            }
            VerifyError::UnsupportedAlgorithm { algorithm } => {
                writeln!(f, "Unsupported hash algorithm: {}", algorithm)?;
                write!(f, "Suggestion: Run the 'algorithms' command to see available algorithms")
            }
            VerifyError::NoDictionariesProvided => {
                writeln!(f, "No dictionaries provided")?;
                write!(f, "Suggestion: Select at least one wordlist to check against")
            }

            // Dictionary errors
            VerifyError::DictionaryUnreadable { dictionary, source } => {
                writeln!(f, "Cannot open dictionary {}: {}", dictionary, source)?;
                write!(f, "Suggestion: Check that the wordlist exists and is readable")
            }
            VerifyError::LineDecodeError { dictionary, line } => {
                writeln!(f, "Line {} of {} is not valid UTF-8", line, dictionary)?;
                write!(f, "Suggestion: Re-encode the wordlist as UTF-8")
            }

            VerifyError::DigestFileUnreadable { path, source } => {
                writeln!(f, "Cannot read digest file {}: {}", path.display(), source)?;
                write!(f, "Suggestion: Provide a text file with one digest per line")
            }

            // Run errors
            VerifyError::AllDictionariesUnreadable { dictionaries } => {
                writeln!(f, "None of the dictionaries could be opened: {}", dictionaries.join(", "))?;
                write!(f, "Suggestion: Check the wordlist paths and permissions")
            }
            VerifyError::RunInProgress => {
                writeln!(f, "A verification run is already in progress")?;
                write!(f, "Suggestion: Wait for the current run to finish or cancel it")
            }
            VerifyError::SpawnFailed { thread, source } => {
                writeln!(f, "Failed to start thread {}: {}", thread, source)?;
                write!(f, "Suggestion: Check system thread limits or verify fewer dictionaries at once")
            }
            VerifyError::WorkerPanicked { dictionary } => {
                write!(f, "Scan worker for {} terminated unexpectedly", dictionary)
            }

            // Configuration errors
            VerifyError::ConfigRead { path, source } => {
                writeln!(f, "Cannot read config file {}: {}", path.display(), source)?;
                write!(f, "Suggestion: Check that the config path is correct")
            }
            VerifyError::ConfigParse { path, reason } => {
                writeln!(f, "Error parsing config file {}: {}", path.display(), reason)?;
                write!(f, "Suggestion: Check the TOML syntax and field names")
            }
        }
    }
}

impl std::error::Error for VerifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            VerifyError::DictionaryUnreadable { source, .. } => Some(source),
            VerifyError::DigestFileUnreadable { source, .. } => Some(source),
            VerifyError::SpawnFailed { source, .. } => Some(source),
            VerifyError::ConfigRead { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl VerifyError {
    /// True for errors raised while validating a request, before any worker starts
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            VerifyError::InvalidDigest { .. }
                | VerifyError::AlgorithmMismatch { .. }
                | VerifyError::UnsupportedAlgorithm { .. }
                | VerifyError::NoDictionariesProvided
        )
    }
}
