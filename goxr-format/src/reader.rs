use std::fs::File;
use std::io::{self, prelude::*, BufReader, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use memmap2::Mmap;
use sha2::Sha256;

use crate::entry::{Entry, FileInfo};
use crate::error::{Error, Result};
use crate::hashing::HashingReader;
use crate::header::{find_header, BoxHeader};
use crate::meta::BoxMetadata;
use crate::open::{BoxFile, Predicate, ReadBox};
use crate::path::Mount;
use crate::toc;

struct Mapped {
    mmap: Arc<Mmap>,
    // Held so the descriptor lives exactly as long as the mapping.
    _file: File,
}

/// A box found inside a file, served from a read-only memory mapping.
pub struct PackedBox {
    path: PathBuf,
    mount: Mount,
    header: BoxHeader,
    meta: BoxMetadata,
    mapped: Option<Mapped>,
}

impl std::fmt::Debug for PackedBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedBox")
            .field("path", &self.path)
            .field("prefix", &self.mount.prefix)
            .field("header", &self.header)
            .field("closed", &self.mapped.is_none())
            .finish()
    }
}

impl PackedBox {
    /// Opens `"<prefix>=<path>"` or a plain path.
    pub fn open(spec: &str) -> Result<PackedBox> {
        Self::open_mount(Mount::parse(spec))
    }

    /// Opens a box without a mount prefix, whatever the path looks like.
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<PackedBox> {
        Self::open_mount(Mount {
            prefix: String::new(),
            location: path.as_ref().to_path_buf(),
        })
    }

    pub fn open_mount(mount: Mount) -> Result<PackedBox> {
        let path = mount.location.clone();
        Self::open_inner(mount).map_err(|e| e.at("open box", path))
    }

    fn open_inner(mount: Mount) -> Result<PackedBox> {
        let path = mount.location.clone();
        if std::fs::metadata(&path)?.is_dir() {
            return Err(Error::DoesNotContainBox);
        }

        let mut file = File::open(&path)?;
        let header = find_header(BufReader::new(&mut file))?.ok_or(Error::DoesNotContainBox)?;

        file.seek(SeekFrom::Start(header.toc_offset))?;
        let meta = read_toc(BufReader::new(&mut file))?;

        // Safety: the mapping is read-only and only ever exposed as bounds-checked slices.
        let mmap = unsafe { Mmap::map(&file)? };

        tracing::debug!(
            path = %path.display(),
            entries = meta.entries.len(),
            toc_offset = format_args!("{:#x}", header.toc_offset),
            "opened box"
        );

        Ok(PackedBox {
            path,
            mount,
            header,
            meta,
            mapped: Some(Mapped {
                mmap: Arc::new(mmap),
                _file: file,
            }),
        })
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline(always)]
    pub fn header(&self) -> &BoxHeader {
        &self.header
    }

    #[inline(always)]
    pub fn metadata(&self) -> &BoxMetadata {
        &self.meta
    }

    #[inline(always)]
    pub fn prefix(&self) -> &str {
        &self.mount.prefix
    }

    #[inline(always)]
    pub fn is_closed(&self) -> bool {
        self.mapped.is_none()
    }

    fn entry(&self, name: &str) -> Result<&Entry> {
        let stored = self.mount.strip(name).ok_or(Error::NotFound)?;
        self.meta.entries.get(&stored)
    }

    fn exposed_info(&self, entry: &Entry) -> FileInfo {
        entry.info().with_path(self.mount.expose(&entry.name))
    }

    /// An independent cursor over one entry's content.
    pub fn open_entry(&self, name: &str) -> Result<EntryReader> {
        let entry = self.entry(name).map_err(|e| e.at("open", name))?;
        let mapped = self
            .mapped
            .as_ref()
            .ok_or_else(|| Error::AlreadyClosed.at("open", name))?;

        Ok(EntryReader {
            mmap: Arc::downgrade(&mapped.mmap),
            offset: entry.offset,
            length: entry.length,
            pos: 0,
            info: self.exposed_info(entry),
        })
    }

    /// Re-hashes every entry through the mapping and compares against the stored digests.
    pub fn validate(&self) -> Result<ValidateStats> {
        let mut stats = ValidateStats::default();

        for entry in self.meta.entries.sorted() {
            let reader = self.open_entry(&self.mount.expose(&entry.name))?;
            let mut hashing = HashingReader::<_, Sha256>::new(reader);
            io::copy(&mut hashing, &mut io::sink())?;

            stats.files_checked += 1;
            let length_ok = hashing.bytes_read() == entry.length;
            if !length_ok || hashing.finalize_bytes() != entry.checksum {
                tracing::warn!(path = %entry.name, "checksum mismatch");
                stats.checksum_failures += 1;
                stats.failed.push(entry.name.clone());
            }
        }

        Ok(stats)
    }
}

fn read_toc<R: Read>(reader: R) -> Result<BoxMetadata> {
    let meta = toc::read_toc(reader)?;
    tracing::debug!(name = %meta.name, entries = meta.entries.len(), "decoded table of contents");
    Ok(meta)
}

impl ReadBox for PackedBox {
    fn open(&self, name: &str) -> Result<BoxFile> {
        self.open_entry(name).map(BoxFile::Packed)
    }

    fn info(&self, name: &str) -> Result<FileInfo> {
        self.entry(name)
            .map(|entry| self.exposed_info(entry))
            .map_err(|e| e.at("info", name))
    }

    fn for_each(
        &self,
        predicate: Option<&Predicate<'_>>,
        callback: &mut dyn FnMut(&FileInfo) -> Result<()>,
    ) -> Result<()> {
        for entry in self.meta.entries.sorted() {
            let info = self.exposed_info(entry);
            if let Some(predicate) = predicate {
                if !predicate(&info.path)? {
                    continue;
                }
            }
            callback(&info)?;
        }
        Ok(())
    }

    /// Drops the mapping first, then the file. Cursors still around see `AlreadyClosed`.
    fn close(&mut self) -> Result<()> {
        if let Some(Mapped { mmap, _file }) = self.mapped.take() {
            drop(mmap);
            drop(_file);
            tracing::debug!(path = %self.path.display(), "closed box");
        }
        Ok(())
    }
}

/// Read statistics from [`PackedBox::validate`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidateStats {
    pub files_checked: u64,
    pub checksum_failures: u64,
    pub failed: Vec<String>,
}

impl ValidateStats {
    #[inline(always)]
    pub fn is_ok(&self) -> bool {
        self.checksum_failures == 0
    }
}

/// A seekable cursor over one entry. It does not keep the mapping alive.
#[derive(Debug)]
pub struct EntryReader {
    mmap: Weak<Mmap>,
    offset: u64,
    length: u64,
    pos: u64,
    info: FileInfo,
}

impl EntryReader {
    #[inline(always)]
    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    /// Detaches from the mapping. Further reads fail with `AlreadyClosed`.
    pub fn close(&mut self) {
        self.mmap = Weak::new();
    }
}

impl Read for EntryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mmap = self
            .mmap
            .upgrade()
            .ok_or_else(|| io::Error::from(Error::AlreadyClosed))?;

        if self.pos >= self.length {
            return Ok(0);
        }

        let content = self
            .offset
            .checked_add(self.pos)
            .zip(self.offset.checked_add(self.length))
            .and_then(|(start, end)| Some((usize::try_from(start).ok()?, usize::try_from(end).ok()?)))
            .and_then(|(start, end)| mmap.get(start..end))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidData, "entry lies outside of the box file")
            })?;

        let n = content.len().min(buf.len());
        buf[..n].copy_from_slice(&content[..n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for EntryReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.mmap.strong_count() == 0 {
            return Err(Error::AlreadyClosed.into());
        }

        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::End(n) => offset_by(self.length, n),
            SeekFrom::Current(n) => offset_by(self.pos, n),
        };

        match target {
            Some(n) => {
                self.pos = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

#[inline(always)]
fn offset_by(base: u64, delta: i64) -> Option<u64> {
    if delta >= 0 {
        base.checked_add(delta as u64)
    } else {
        base.checked_sub(delta.unsigned_abs())
    }
}
