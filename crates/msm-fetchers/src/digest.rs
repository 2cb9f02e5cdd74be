//! Digest verification (§4.8, Testable Property 5): downloaded bytes must
//! match a cryptographic digest published by the source registry, or the
//! partial file is removed and the operation fails hard.

use sha2::{Digest, Sha256, Sha512};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha256,
    Sha512,
}

pub fn hex_digest(algorithm: DigestAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        DigestAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            format!("{:x}", hasher.finalize())
        }
        DigestAlgorithm::Sha512 => {
            let mut hasher = Sha512::new();
            hasher.update(bytes);
            format!("{:x}", hasher.finalize())
        }
    }
}

pub fn verify(algorithm: DigestAlgorithm, bytes: &[u8], expected_hex: &str) -> bool {
    hex_digest(algorithm, bytes).eq_ignore_ascii_case(expected_hex)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_known_input_matches_known_digest() {
        let digest = hex_digest(DigestAlgorithm::Sha256, b"hello world");
        assert_eq!(digest, "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde");
    }

    #[test]
    fn verify_rejects_mismatched_digest() {
        assert!(!verify(DigestAlgorithm::Sha256, b"hello world", "0000"));
    }

    #[test]
    fn verify_is_case_insensitive() {
        let digest = hex_digest(DigestAlgorithm::Sha256, b"hello world").to_uppercase();
        assert!(verify(DigestAlgorithm::Sha256, b"hello world", &digest));
    }
}
