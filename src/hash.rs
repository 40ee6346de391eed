// src/hash.rs

//! Digests used by wheel RECORD files and upstream indexes
//!
//! Two encodings are in play:
//! - **RECORD**: `sha256=<urlsafe base64, no padding>` (PEP 376 / PEP 427)
//! - **Index links**: `#sha256=<lowercase hex>` fragments and PEP 691 `hashes`
//!
//! RECORD files written by this crate always use SHA-256. SHA-384 and SHA-512
//! are accepted when verifying wheels built by other tools.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use std::str::FromStr;

/// Hash algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes
    #[inline]
    pub const fn output_len(&self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Name as used in RECORD files and link fragments
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(data).to_vec(),
            Self::Sha384 => Sha384::digest(data).to_vec(),
            Self::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(HashError::UnknownAlgorithm(s.to_string())),
        }
    }
}

/// Hash parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// Unknown hash algorithm name
    UnknownAlgorithm(String),
    /// Missing `algorithm=` prefix
    MissingAlgorithm(String),
    /// Digest is not valid for its encoding or has the wrong length
    InvalidDigest(String),
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownAlgorithm(name) => write!(f, "unknown hash algorithm: {}", name),
            Self::MissingAlgorithm(s) => write!(f, "digest has no algorithm prefix: {}", s),
            Self::InvalidDigest(s) => write!(f, "invalid digest: {}", s),
        }
    }
}

impl std::error::Error for HashError {}

/// A RECORD digest: algorithm plus urlsafe unpadded base64 value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordDigest {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

impl RecordDigest {
    /// Compute the digest of a byte slice
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            value: URL_SAFE_NO_PAD.encode(algorithm.digest(data)),
        }
    }

    /// SHA-256 digest, the algorithm used for every RECORD we write
    pub fn sha256(data: &[u8]) -> Self {
        Self::compute(HashAlgorithm::Sha256, data)
    }

    /// Parse a RECORD hash field (e.g. `sha256=47DEQpj8...`)
    pub fn parse(s: &str) -> Result<Self, HashError> {
        let (algo, value) = s
            .split_once('=')
            .ok_or_else(|| HashError::MissingAlgorithm(s.to_string()))?;
        let algorithm: HashAlgorithm = algo.parse()?;

        // Some writers keep the base64 padding; accept it
        let value = value.trim_end_matches('=');
        let raw = URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| HashError::InvalidDigest(s.to_string()))?;
        if raw.len() != algorithm.output_len() {
            return Err(HashError::InvalidDigest(s.to_string()));
        }

        Ok(Self {
            algorithm,
            value: value.to_string(),
        })
    }

    /// Check whether `data` hashes to this digest
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::compute(self.algorithm, data).value == self.value
    }
}

impl fmt::Display for RecordDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.value)
    }
}

/// Lowercase hex SHA-256, the form package indexes publish
#[inline]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Verification result error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyError {
    pub expected: String,
    pub actual: String,
    pub algorithm: HashAlgorithm,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} mismatch: expected {}, got {}",
            self.algorithm, self.expected, self.actual
        )
    }
}

impl std::error::Error for VerifyError {}

/// Verify bytes against a hex digest published by an index
///
/// # Example
/// ```
/// use spare_tire::hash::{verify_hex, HashAlgorithm};
///
/// let data = b"hello world";
/// let hash = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
/// assert!(verify_hex(data, hash, HashAlgorithm::Sha256).is_ok());
/// ```
pub fn verify_hex(data: &[u8], expected: &str, algorithm: HashAlgorithm) -> Result<(), VerifyError> {
    let actual = hex::encode(algorithm.digest(data));
    if actual == expected.to_lowercase() {
        Ok(())
    } else {
        Err(VerifyError {
            expected: expected.to_string(),
            actual,
            algorithm,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_digest_of_empty_input() {
        // Well-known value that appears in RECORD files for empty __init__.py
        let digest = RecordDigest::sha256(b"");
        assert_eq!(
            digest.to_string(),
            "sha256=47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
        );
    }

    #[test]
    fn test_record_digest_parse_roundtrip() {
        let digest = RecordDigest::sha256(b"import os\n");
        let parsed = RecordDigest::parse(&digest.to_string()).unwrap();
        assert_eq!(parsed, digest);
        assert!(parsed.matches(b"import os\n"));
        assert!(!parsed.matches(b"import sys\n"));
    }

    #[test]
    fn test_record_digest_accepts_padding() {
        let digest = RecordDigest::sha256(b"abc");
        let padded = format!("{}=", digest);
        assert_eq!(RecordDigest::parse(&padded).unwrap(), digest);
    }

    #[test]
    fn test_record_digest_rejects_bad_input() {
        assert!(matches!(
            RecordDigest::parse("47DEQpj8HBSa"),
            Err(HashError::MissingAlgorithm(_))
        ));
        assert!(matches!(
            RecordDigest::parse("md5=abc"),
            Err(HashError::UnknownAlgorithm(_))
        ));
        assert!(matches!(
            RecordDigest::parse("sha256=abc"),
            Err(HashError::InvalidDigest(_))
        ));
    }

    #[test]
    fn test_sha512_digest() {
        let digest = RecordDigest::compute(HashAlgorithm::Sha512, b"data");
        assert!(RecordDigest::parse(&digest.to_string()).unwrap().matches(b"data"));
    }

    #[test]
    fn test_verify_hex() {
        let data = b"hello world";
        let good = sha256_hex(data);
        assert!(verify_hex(data, &good.to_uppercase(), HashAlgorithm::Sha256).is_ok());

        let err = verify_hex(b"other", &good, HashAlgorithm::Sha256).unwrap_err();
        assert_eq!(err.expected, good);
        assert!(err.to_string().starts_with("sha256 mismatch"));
    }
}
