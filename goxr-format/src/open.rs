//! The read contract every kind of box fulfils, and how a program finds its box.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::combined::CombinedBox;
use crate::entry::FileInfo;
use crate::error::{Error, Result};
use crate::fs_box::FsBox;
use crate::reader::{EntryReader, PackedBox};

/// Decides which paths `for_each` reports. An error stops the iteration.
pub type Predicate<'a> = dyn Fn(&str) -> Result<bool> + 'a;

pub trait ReadBox {
    /// Opens a named file for reading.
    fn open(&self, name: &str) -> Result<BoxFile>;

    fn info(&self, name: &str) -> Result<FileInfo>;

    /// Calls `callback` for every file the predicate accepts, or every file without one.
    fn for_each(
        &self,
        predicate: Option<&Predicate<'_>>,
        callback: &mut dyn FnMut(&FileInfo) -> Result<()>,
    ) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// An open file from any kind of box.
#[derive(Debug)]
pub enum BoxFile {
    Packed(EntryReader),
    Fs { file: File, info: FileInfo },
}

impl BoxFile {
    pub fn info(&self) -> &FileInfo {
        match self {
            BoxFile::Packed(reader) => reader.info(),
            BoxFile::Fs { info, .. } => info,
        }
    }
}

impl Read for BoxFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BoxFile::Packed(reader) => reader.read(buf),
            BoxFile::Fs { file, .. } => file.read(buf),
        }
    }
}

impl Seek for BoxFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            BoxFile::Packed(reader) => reader.seek(pos),
            BoxFile::Fs { file, .. } => file.seek(pos),
        }
    }
}

/// What [`open_box_by`] does when the candidate file carries no packed box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Use the filesystem boxes without a word.
    Silent,
    /// Use the filesystem boxes, but log a warning.
    Warn,
    /// Refuse with `DoesNotContainBox`.
    Fail,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        FallbackPolicy::Warn
    }
}

/// Opens the box packed into `candidate`, usually the running executable.
/// Without one, `bases` (each `"<prefix>=<directory>"` or a directory,
/// relative ones resolved against the working directory) are combined into
/// a filesystem box according to `policy`.
pub fn open_box_by<P: AsRef<Path>>(
    candidate: P,
    bases: &[&str],
    policy: FallbackPolicy,
) -> Result<Box<dyn ReadBox>> {
    let candidate = candidate.as_ref();
    match PackedBox::open_path(candidate) {
        Ok(packed) => return Ok(Box::new(packed)),
        Err(e) if e.is_does_not_contain_box() => {}
        Err(e) => return Err(e),
    }

    match policy {
        FallbackPolicy::Fail => return Err(Error::DoesNotContainBox.at("open box", candidate)),
        FallbackPolicy::Warn => tracing::warn!(
            candidate = %candidate.display(),
            "does not contain a packed box, falling back to the filesystem. This could happen in development mode"
        ),
        FallbackPolicy::Silent => {}
    }

    let mut combined = CombinedBox::new();
    for base in bases {
        combined.push(FsBox::open(base)?);
    }
    Ok(Box::new(combined))
}

/// Path of the running executable.
pub fn executable() -> Result<PathBuf> {
    Ok(std::env::current_exe()?)
}

/// [`open_box_by`] against the running executable.
pub fn open_box(bases: &[&str], policy: FallbackPolicy) -> Result<Box<dyn ReadBox>> {
    open_box_by(executable()?, bases, policy)
}

/// Opens the box packed into the running executable, without any fallback.
pub fn open_packed_box() -> Result<PackedBox> {
    PackedBox::open_path(executable()?)
}
