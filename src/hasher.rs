//! SHA-256 content hashing with bounded memory.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// The largest slice handed to the digest at once, and the size of the blocks
/// read from files.
pub const CHUNK_SIZE: usize = 8 * 1024 * 1024;

#[derive(Clone, Default)]
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    pub fn new() -> Sha256Hasher {
        Sha256Hasher::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        for chunk in data.chunks(CHUNK_SIZE) {
            self.inner.update(chunk);
        }
    }

    /// The lowercase hexadecimal digest.
    pub fn digest_hex(self) -> String {
        format!("{:x}", self.inner.finalize())
    }
}

/// Hashes a file of any size, reading it in [`CHUNK_SIZE`] blocks.
pub fn hash_file<P: AsRef<Path>>(path: P) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };

        hasher.update(&buf[..n]);
    }

    Ok(hasher.digest_hex())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn known_digests() {
        assert_eq!(Sha256Hasher::new().digest_hex(), EMPTY);

        let mut hasher = Sha256Hasher::new();
        hasher.update(b"abc");
        assert_eq!(hasher.digest_hex(), ABC);
    }

    #[test]
    fn chunking_does_not_change_the_digest() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();

        let mut whole = Sha256Hasher::new();
        whole.update(&data);
        let expected = whole.digest_hex();

        for chunk_size in [1, 3, 64, 1000, 4095, 4096] {
            let mut hasher = Sha256Hasher::new();

            for chunk in data.chunks(chunk_size) {
                hasher.update(chunk);
            }

            assert_eq!(hasher.digest_hex(), expected, "chunk size {}", chunk_size);
        }
    }

    #[test]
    fn hashes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.txt");
        std::fs::write(&path, b"abc").unwrap();

        assert_eq!(hash_file(&path).unwrap(), ABC);
        assert!(hash_file(dir.path().join("missing")).is_err());
    }
}
