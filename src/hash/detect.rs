// Algorithm detection
// Infers the hash algorithm from a normalized digest, or validates an explicit override

use super::digest::TargetDigest;
use super::error::VerifyError;
use super::hash::Algorithm;

/// Resolve the algorithm for a digest
///
/// An override wins over length inference but must agree with the digest length.
pub fn detect_algorithm(
    digest: &TargetDigest,
    override_algorithm: Option<Algorithm>,
) -> Result<Algorithm, VerifyError> {
    let len = digest.hex_len();

    if let Some(algorithm) = override_algorithm {
        if algorithm.hex_len() != len {
            return Err(VerifyError::AlgorithmMismatch {
                algorithm: algorithm.name().to_string(),
                expected_len: algorithm.hex_len(),
                actual_len: len,
            });
        }
        return Ok(algorithm);
    }

    Algorithm::from_digest_len(len).ok_or_else(|| VerifyError::InvalidDigest {
        input: digest.as_hex().to_string(),
    })
}
