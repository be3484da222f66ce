// Hash verification engine
// Digest normalization, algorithm detection, dictionary scanning and run coordination

pub mod hash;
pub mod digest;
pub mod detect;
pub mod dictionary;
pub mod scan;
pub mod verify;
pub mod batch;
pub mod error;

// Re-export commonly used types for convenience
pub use error::VerifyError;
pub use hash::{compute_digest, Algorithm, AlgorithmInfo, HashRegistry, Hasher};
pub use digest::{normalize_digest, TargetDigest, SUPPORTED_DIGEST_LENGTHS};
pub use detect::detect_algorithm;
pub use dictionary::{available_wordlists, DictionaryId, DictionaryReader, DictionarySource, Line};
pub use scan::{CancelToken, MatchResult, ScanProgress, ScanWorker, WorkerMessage, WorkerStatus};
pub use batch::{load_digest_file, BatchEntry, BatchReport};
pub use verify::{
    Coordinator, DictionaryFailure, DictionaryStatus, DictionarySummary, RunCanceller, RunHandle,
    RunOutcome, RunReport, VerificationRequest, VerifyEvent, VerifyOptions,
};
