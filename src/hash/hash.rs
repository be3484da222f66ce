// Hash computation module
// Provides the algorithm registry and reusable hashers for candidate passwords

use std::fmt;
use std::str::FromStr;

use super::error::VerifyError;

/// Trait for hash algorithm implementations
pub trait Hasher: Send {
    /// Update the hasher with new data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash and reset the hasher so it can be reused for the next candidate
    fn finalize_reset(&mut self) -> Vec<u8>;

    /// Get the output size in bytes
    fn output_size(&self) -> usize;
}

/// Information about a hash algorithm
#[derive(Debug, Clone, serde::Serialize)]
pub struct AlgorithmInfo {
    pub name: String,
    pub output_bits: usize,
    pub hex_length: usize,
}

// Wrapper types for hash algorithms
use md5::{Md5, Digest as Md5Digest};
use sha1::{Sha1, Digest as Sha1Digest};
use sha2::{Sha256, Sha512, Digest as Sha2Digest};

// MD5 wrapper
pub struct Md5Wrapper(Md5);

impl Hasher for Md5Wrapper {
    fn update(&mut self, data: &[u8]) {
        Md5Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Md5Digest::finalize_reset(&mut self.0).to_vec()
    }

    fn output_size(&self) -> usize {
        16 // 128 bits
    }
}

// SHA1 wrapper
pub struct Sha1Wrapper(Sha1);

impl Hasher for Sha1Wrapper {
    fn update(&mut self, data: &[u8]) {
        Sha1Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Sha1Digest::finalize_reset(&mut self.0).to_vec()
    }

    fn output_size(&self) -> usize {
        20 // 160 bits
    }
}

// SHA-256 wrapper
pub struct Sha256Wrapper(Sha256);

impl Hasher for Sha256Wrapper {
    fn update(&mut self, data: &[u8]) {
        Sha2Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Sha2Digest::finalize_reset(&mut self.0).to_vec()
    }

    fn output_size(&self) -> usize {
        32 // 256 bits
    }
}

// SHA-512 wrapper
pub struct Sha512Wrapper(Sha512);

impl Hasher for Sha512Wrapper {
    fn update(&mut self, data: &[u8]) {
        Sha2Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        Sha2Digest::finalize_reset(&mut self.0).to_vec()
    }

    fn output_size(&self) -> usize {
        64 // 512 bits
    }
}

/// Hash algorithms the engine can verify against
///
/// Every supported algorithm has a distinct digest length, so the length of a
/// normalized digest identifies the algorithm unambiguously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    /// All supported algorithms, most common first
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha256,
        Algorithm::Sha512,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md5 => "MD5",
            Algorithm::Sha1 => "SHA1",
            Algorithm::Sha256 => "SHA256",
            Algorithm::Sha512 => "SHA512",
        }
    }

    /// Digest size in bytes
    pub fn output_size(self) -> usize {
        match self {
            Algorithm::Md5 => 16,
            Algorithm::Sha1 => 20,
            Algorithm::Sha256 => 32,
            Algorithm::Sha512 => 64,
        }
    }

    /// Length of the digest in hex characters
    pub fn hex_len(self) -> usize {
        self.output_size() * 2
    }

    /// Map a hex digest length to its algorithm; `None` means the length is unknown
    pub fn from_digest_len(len: usize) -> Option<Algorithm> {
        Self::ALL.into_iter().find(|alg| alg.hex_len() == len)
    }

    /// Create a fresh hasher for this algorithm
    pub fn hasher(self) -> Box<dyn Hasher> {
        match self {
            Algorithm::Md5 => Box::new(Md5Wrapper(Md5Digest::new())),
            Algorithm::Sha1 => Box::new(Sha1Wrapper(Sha1Digest::new())),
            Algorithm::Sha256 => Box::new(Sha256Wrapper(Sha2Digest::new())),
            Algorithm::Sha512 => Box::new(Sha512Wrapper(Sha2Digest::new())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "md5" => Ok(Algorithm::Md5),
            "sha1" | "sha-1" => Ok(Algorithm::Sha1),
            "sha256" | "sha-256" => Ok(Algorithm::Sha256),
            "sha512" | "sha-512" => Ok(Algorithm::Sha512),
            _ => Err(VerifyError::UnsupportedAlgorithm {
                algorithm: s.to_string(),
            }),
        }
    }
}

/// Registry for hash algorithms
pub struct HashRegistry;

impl HashRegistry {
    /// Get a hasher instance for the specified algorithm name
    pub fn get_hasher(algorithm: &str) -> Result<Box<dyn Hasher>, VerifyError> {
        Ok(algorithm.parse::<Algorithm>()?.hasher())
    }

    /// List all available hash algorithms
    pub fn list_algorithms() -> Vec<AlgorithmInfo> {
        Algorithm::ALL
            .into_iter()
            .map(|alg| AlgorithmInfo {
                name: alg.name().to_string(),
                output_bits: alg.output_size() * 8,
                hex_length: alg.hex_len(),
            })
            .collect()
    }
}

/// Hash a plaintext with the given algorithm and return the lowercase hex digest
pub fn compute_digest(text: &str, algorithm: Algorithm) -> String {
    let mut hasher = algorithm.hasher();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize_reset())
}
