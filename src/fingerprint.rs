use sha2::{Digest, Sha256};
use std::io::{self, Read};

/// Reader adapter that hashes every byte passing through it, so a feed can be
/// fingerprinted while it is being decoded instead of in a second pass.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes_read: u64,
}

/// Digest of the bytes a parser actually consumed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub sha256: String,
    pub bytes: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes_read: 0,
        }
    }

    pub fn finish(self) -> Fingerprint {
        Fingerprint {
            sha256: hex::encode(self.hasher.finalize()),
            bytes: self.bytes_read,
        }
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}
