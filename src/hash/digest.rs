// Digest normalization
// Turns user input such as "  user:5F4DCC3B...  " into a validated lowercase digest

use std::fmt;

use super::error::VerifyError;

/// Digest lengths (in hex characters) the engine knows how to verify
pub const SUPPORTED_DIGEST_LENGTHS: [usize; 4] = [32, 40, 64, 128];

/// A validated target digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetDigest {
    hex: String,
    bytes: Vec<u8>,
}

impl TargetDigest {
    /// Lowercase hex form
    pub fn as_hex(&self) -> &str {
        &self.hex
    }

    /// Decoded digest bytes, used for byte-for-byte comparison
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length in hex characters
    pub fn hex_len(&self) -> usize {
        self.hex.len()
    }

    pub fn matches(&self, computed: &[u8]) -> bool {
        self.bytes == computed
    }
}

impl fmt::Display for TargetDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Normalize a raw digest string
///
/// Surrounding whitespace is stripped. Input that is not pure hex is searched
/// for contiguous hex runs and the longest run of a supported length is used,
/// so `admin:5f4dcc3b5aa765d61d8327deb882cf99` yields the MD5 part.
pub fn normalize_digest(raw: &str) -> Result<TargetDigest, VerifyError> {
    let trimmed = raw.trim();

    let candidate = if is_hex(trimmed) {
        Some(trimmed).filter(|s| is_supported_length(s.len()))
    } else {
        longest_supported_run(trimmed)
    };

    let hex = candidate
        .map(|s| s.to_ascii_lowercase())
        .ok_or_else(|| VerifyError::InvalidDigest {
            input: raw.to_string(),
        })?;

    let bytes = hex::decode(&hex).map_err(|_| VerifyError::InvalidDigest {
        input: raw.to_string(),
    })?;

    Ok(TargetDigest { hex, bytes })
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_supported_length(len: usize) -> bool {
    SUPPORTED_DIGEST_LENGTHS.contains(&len)
}

// First occurrence wins when two runs share the longest supported length
fn longest_supported_run(s: &str) -> Option<&str> {
    let mut best: Option<&str> = None;

    for run in s.split(|c: char| !c.is_ascii_hexdigit()) {
        if !is_supported_length(run.len()) {
            continue;
        }
        if best.map_or(true, |b| run.len() > b.len()) {
            best = Some(run);
        }
    }

    best
}
