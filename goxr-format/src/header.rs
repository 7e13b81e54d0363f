//! The fixed-size header that makes a box findable inside an arbitrary host file.
//!
//! Layout: `[magic: 8][version: 1][toc offset: 8, little endian][checksum: 8]`.
//! The checksum is a CRC-64 over a secret per-version seed followed by the
//! magic, the version byte and the TOC offset, so a header can only validate
//! under the version it was written for.

use std::fmt;
use std::io::{ErrorKind, Read, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use crc::{Crc, CRC_64_XZ};

use crate::error::{Error, Result};

// Make some attempt to not accidentally match text, while staying recognisable in a hex dump.
pub const MAGIC_BYTES: &[u8; 8] = b"goxr.box";

/// Size of the lookahead buffer used while scanning for a header.
pub const HEADER_BUFFER_SIZE: usize = 1024 * 10;

const VERSION_LENGTH: usize = 1;
const TOC_OFFSET_LENGTH: usize = 8;
const CHECKSUM_LENGTH: usize = 8;

pub const HEADER_LENGTH: usize =
    MAGIC_BYTES.len() + VERSION_LENGTH + TOC_OFFSET_LENGTH + CHECKSUM_LENGTH;

const VERSION_POS: usize = MAGIC_BYTES.len();
const TOC_OFFSET_POS: usize = VERSION_POS + VERSION_LENGTH;
const CHECKSUM_POS: usize = TOC_OFFSET_POS + TOC_OFFSET_LENGTH;

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

const SEED_V1: &[u8] = &[53, 58, 197, 194, 220, 233, 145, 140, 69, 167];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version(pub u8);

impl Version {
    pub const V1: Version = Version(1);

    /// The seed mixed into the checksum, if this version is known.
    pub fn seed(self) -> Option<&'static [u8]> {
        match self.0 {
            1 => Some(SEED_V1),
            _ => None,
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::V1
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A header discovered inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub version: Version,
    /// Where the header itself begins, which is also where any preceding payload ends.
    pub offset: u64,
    pub toc_offset: u64,
}

#[inline(always)]
fn checksum(seed: &[u8], version: u8, toc_offset: &[u8]) -> u64 {
    let mut digest = CRC64.digest();
    digest.update(seed);
    digest.update(MAGIC_BYTES);
    digest.update(&[version]);
    digest.update(toc_offset);
    digest.finalize()
}

pub fn encode_header(version: Version, toc_offset: u64) -> Result<[u8; HEADER_LENGTH]> {
    let seed = version.seed().ok_or(Error::InvalidHeaderVersion(version.0))?;

    let mut buf = [0u8; HEADER_LENGTH];
    buf[..VERSION_POS].copy_from_slice(MAGIC_BYTES);
    buf[VERSION_POS] = version.0;
    LittleEndian::write_u64(&mut buf[TOC_OFFSET_POS..CHECKSUM_POS], toc_offset);

    let sum = checksum(seed, version.0, &buf[TOC_OFFSET_POS..CHECKSUM_POS]);
    BigEndian::write_u64(&mut buf[CHECKSUM_POS..], sum);

    Ok(buf)
}

pub fn write_header<W: Write>(version: Version, toc_offset: u64, writer: &mut W) -> Result<()> {
    let buf = encode_header(version, toc_offset)?;
    writer.write_all(&buf)?;
    Ok(())
}

/// Validates one complete candidate. Anything that is not a genuine header is
/// simply rejected; there is no such thing as an invalid candidate error.
fn check_candidate(candidate: &[u8]) -> Option<(Version, u64)> {
    if candidate.len() != HEADER_LENGTH || &candidate[..VERSION_POS] != MAGIC_BYTES {
        return None;
    }

    let version = Version(candidate[VERSION_POS]);
    let seed = version.seed()?;

    let toc_offset = &candidate[TOC_OFFSET_POS..CHECKSUM_POS];
    let expected = checksum(seed, version.0, toc_offset);
    if BigEndian::read_u64(&candidate[CHECKSUM_POS..]) != expected {
        return None;
    }

    Some((version, LittleEndian::read_u64(toc_offset)))
}

struct Scanner<R> {
    reader: R,
    buf: Vec<u8>,
    pos: usize,
    end: usize,
    /// Absolute stream offset of `buf[0]`.
    base: u64,
    eof: bool,
}

impl<R: Read> Scanner<R> {
    fn new(reader: R) -> Self {
        Scanner {
            reader,
            buf: vec![0u8; HEADER_BUFFER_SIZE],
            pos: 0,
            end: 0,
            base: 0,
            eof: false,
        }
    }

    /// Moves the unread tail to the front and reads until the buffer is full or the stream ends.
    fn refill(&mut self) -> Result<()> {
        self.buf.copy_within(self.pos..self.end, 0);
        self.base += self.pos as u64;
        self.end -= self.pos;
        self.pos = 0;

        while self.end < self.buf.len() {
            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => self.end += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(())
    }

    fn find(&mut self) -> Result<Option<BoxHeader>> {
        loop {
            if self.end - self.pos < HEADER_LENGTH && !self.eof {
                self.refill()?;
            }

            let window = &self.buf[self.pos..self.end];
            let candidate = match window.iter().position(|b| *b == MAGIC_BYTES[0]) {
                Some(i) => self.pos + i,
                None if self.eof => return Ok(None),
                None => {
                    self.pos = self.end;
                    continue;
                }
            };

            if self.end - candidate < HEADER_LENGTH {
                if self.eof {
                    // Every remaining candidate is cut short by the end of the stream.
                    return Ok(None);
                }
                self.pos = candidate;
                continue;
            }

            if let Some((version, toc_offset)) =
                check_candidate(&self.buf[candidate..candidate + HEADER_LENGTH])
            {
                let offset = self.base + candidate as u64;
                tracing::debug!(
                    offset = format_args!("{:#x}", offset),
                    toc_offset = format_args!("{:#x}", toc_offset),
                    %version,
                    "found box header"
                );
                return Ok(Some(BoxHeader {
                    version,
                    offset,
                    toc_offset,
                }));
            }

            self.pos = candidate + 1;
        }
    }
}

/// Scans `reader` forward from its current position (treated as offset 0) for the
/// first valid header. Reaching the end of the stream yields `Ok(None)`.
pub fn find_header<R: Read>(reader: R) -> Result<Option<BoxHeader>> {
    Scanner::new(reader).find()
}
