//! Content checksum engine.
//!
//! # Responsibility
//! - Compute deterministic, order-sensitive content digests.
//! - Hash streamed content while buffering it for the caller.
//!
//! # Invariants
//! - Digests are lowercase hex of fixed length `CHECKSUM_HEX_LEN`.
//! - Failure to hash is an error; an empty or missing checksum is never
//!   returned in its place.

use sha2::{Digest, Sha256};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::{ErrorKind, Read};

/// Algorithm identifier persisted next to every version checksum.
pub const CHECKSUM_ALGORITHM: &str = "sha256";
/// Length of a hex-encoded checksum.
pub const CHECKSUM_HEX_LEN: usize = 64;

const READ_CHUNK_BYTES: usize = 64 * 1024;

/// Failure to compute a checksum.
#[derive(Debug)]
pub enum ChecksumError {
    /// Content stream failed while being hashed.
    Read(std::io::Error),
    /// Stored checksum was produced by an algorithm this build cannot compute.
    UnsupportedAlgorithm(String),
}

impl Display for ChecksumError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "unable to read content for checksum: {err}"),
            Self::UnsupportedAlgorithm(name) => {
                write!(f, "unsupported checksum algorithm `{name}`")
            }
        }
    }
}

impl Error for ChecksumError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            Self::UnsupportedAlgorithm(_) => None,
        }
    }
}

/// Returns the hex checksum of `content`.
pub fn content_checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Reads `reader` to the end, returning the content and its checksum.
pub fn checksum_reader<R: Read>(mut reader: R) -> Result<(Vec<u8>, String), ChecksumError> {
    let mut hasher = Sha256::new();
    let mut content = Vec::new();
    let mut chunk = vec![0_u8; READ_CHUNK_BYTES];

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(ChecksumError::Read(err)),
        };
        hasher.update(&chunk[..read]);
        content.extend_from_slice(&chunk[..read]);
    }

    Ok((content, hex::encode(hasher.finalize())))
}

/// Ensures checksums recorded with `algorithm` can be recomputed.
pub fn ensure_supported_algorithm(algorithm: &str) -> Result<(), ChecksumError> {
    if algorithm == CHECKSUM_ALGORITHM {
        Ok(())
    } else {
        Err(ChecksumError::UnsupportedAlgorithm(algorithm.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        checksum_reader, content_checksum, ensure_supported_algorithm, ChecksumError,
        CHECKSUM_HEX_LEN,
    };
    use std::io::{Cursor, Error, ErrorKind, Read};

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(Error::new(ErrorKind::Other, "disk went away"))
        }
    }

    #[test]
    fn checksum_matches_known_vectors() {
        assert_eq!(
            content_checksum(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            content_checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn checksum_is_deterministic_fixed_length_and_order_sensitive() {
        let first = content_checksum(b"invoice-2024");
        assert_eq!(first, content_checksum(b"invoice-2024"));
        assert_eq!(first.len(), CHECKSUM_HEX_LEN);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_ne!(content_checksum(b"ab"), content_checksum(b"ba"));
    }

    #[test]
    fn reader_checksum_matches_slice_checksum_across_chunks() {
        let content: Vec<u8> = (0..200_000_u32).map(|i| (i % 251) as u8).collect();
        let (buffered, checksum) = checksum_reader(Cursor::new(content.clone())).unwrap();

        assert_eq!(buffered, content);
        assert_eq!(checksum, content_checksum(&content));
    }

    #[test]
    fn reader_failure_is_reported_not_masked() {
        let err = checksum_reader(BrokenReader).unwrap_err();
        assert!(matches!(err, ChecksumError::Read(_)));
    }

    #[test]
    fn only_the_engine_algorithm_is_supported() {
        ensure_supported_algorithm("sha256").unwrap();
        let err = ensure_supported_algorithm("md5").unwrap_err();
        assert!(matches!(err, ChecksumError::UnsupportedAlgorithm(name) if name == "md5"));
    }
}
