//! Hashing wrappers for computing digests while reading or writing.

use std::io::{Read, Result, Write};

use digest::Digest;

/// A reader wrapper that computes a hash digest while data is read through it.
pub struct HashingReader<R, D> {
    inner: R,
    hasher: D,
    bytes_read: u64,
}

impl<R, D: Digest + Default> HashingReader<R, D> {
    /// Create a new hashing reader wrapping the given reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: D::default(),
            bytes_read: 0,
        }
    }

    /// Get the total number of bytes read through this reader.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Get the hash as bytes (finalizes the hasher).
    pub fn finalize_bytes(self) -> Vec<u8> {
        self.hasher.finalize().to_vec()
    }
}

impl<R: Read, D: Digest> Read for HashingReader<R, D> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes_read += n as u64;
        }
        Ok(n)
    }
}

/// A writer wrapper that computes a hash digest while data is written through it.
#[derive(Debug)]
pub struct HashingWriter<W, D> {
    inner: W,
    hasher: D,
    bytes_written: u64,
}

impl<W, D: Digest + Default> HashingWriter<W, D> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: D::default(),
            bytes_written: 0,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Splits into the inner writer and the finished digest.
    pub fn finish(self) -> (W, Vec<u8>) {
        (self.inner, self.hasher.finalize().to_vec())
    }
}

impl<W: Write, D: Digest> Write for HashingWriter<W, D> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.bytes_written += n as u64;
        }
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}
