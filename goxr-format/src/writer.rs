use std::cell::{Ref, RefCell, RefMut};
use std::fs::{File, Metadata, OpenOptions};
use std::io::{self, prelude::*, BufReader, BufWriter, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use sha2::Sha256;
use walkdir::WalkDir;

use crate::entry::{Entry, Meta};
use crate::error::{Error, Result};
use crate::fs::{mod_time_of, mode_of, DEFAULT_MODE};
use crate::hashing::HashingWriter;
use crate::header::{find_header, write_header, Version, HEADER_LENGTH};
use crate::meta::BoxMetadata;
use crate::modes::{OpenMode, WriteMode};
use crate::path::{clean_path, Mount};
use crate::toc;

/// Where a new entry goes and which attributes it carries. Unset attributes
/// fall back to mode `0644` and the current time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetEntry {
    pub filename: String,
    pub mode: Option<u32>,
    pub time: Option<DateTime<Utc>>,
    pub meta: Meta,
}

impl TargetEntry {
    pub fn new<S: Into<String>>(filename: S) -> TargetEntry {
        TargetEntry {
            filename: filename.into(),
            ..TargetEntry::default()
        }
    }
}

/// A file found while walking a directory, offered to the interceptor of
/// [`BoxWriter::write_files_recursive_with`] before it is written.
#[derive(Debug)]
pub struct WriteCandidate {
    /// Cleared by the interceptor to skip this file.
    pub accept: bool,
    pub source_filename: PathBuf,
    pub source_metadata: Metadata,
    pub target: TargetEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    EntryActive(u64),
    /// A write to the file failed, so the position of the next entry is unknown.
    Failed,
    Closed,
}

#[derive(Debug)]
struct WriterInner {
    file: Option<File>,
    header_offset: u64,
    /// Where the next entry's content starts.
    offset: u64,
    state: State,
    next_id: u64,
    meta: BoxMetadata,
}

/// Appends a box to a file, one entry at a time.
///
/// At most one [`EntryWriter`] may be open at once. The writer and its entry
/// writers share state through an `Rc`, so none of them can leave the thread.
#[derive(Debug)]
pub struct BoxWriter {
    filename: PathBuf,
    inner: Rc<RefCell<WriterInner>>,
}

impl BoxWriter {
    pub fn new<P: AsRef<Path>>(
        filename: P,
        open_mode: OpenMode,
        write_mode: WriteMode,
    ) -> Result<BoxWriter> {
        let filename = filename.as_ref();
        Self::new_inner(filename, open_mode, write_mode).map_err(|e| e.at("new writer", filename))
    }

    fn new_inner(filename: &Path, open_mode: OpenMode, write_mode: WriteMode) -> Result<BoxWriter> {
        let mut options = OpenOptions::new();
        options.read(true).write(true);
        match open_mode {
            OpenMode::OpenOrCreate => options.create(true),
            OpenMode::OpenOnly => &mut options,
            OpenMode::CreateOnly => options.create_new(true),
        };
        let mut file = options.open(filename)?;

        match find_header(BufReader::new(&mut file))? {
            Some(header) if write_mode.allows_replace() => {
                tracing::debug!(
                    path = %filename.display(),
                    offset = format_args!("{:#x}", header.offset),
                    "replacing existing box"
                );
                file.set_len(header.offset)?;
            }
            Some(_) => return Err(Error::DoesContainBox),
            None if write_mode.allows_new() => {}
            None => return Err(Error::DoesNotContainBox),
        }

        let header_offset = file.metadata()?.len();
        file.seek(SeekFrom::Start(header_offset))?;
        write_header(Version::V1, 0, &mut file)?;

        Ok(BoxWriter {
            filename: filename.to_path_buf(),
            inner: Rc::new(RefCell::new(WriterInner {
                file: Some(file),
                header_offset,
                offset: header_offset + HEADER_LENGTH as u64,
                state: State::Idle,
                next_id: 0,
                meta: BoxMetadata::default(),
            })),
        })
    }

    #[inline(always)]
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn metadata(&self) -> Ref<'_, BoxMetadata> {
        Ref::map(self.inner.borrow(), |inner| &inner.meta)
    }

    /// Name, version and the other box level fields are set through here.
    pub fn metadata_mut(&mut self) -> RefMut<'_, BoxMetadata> {
        RefMut::map(self.inner.borrow_mut(), |inner| &mut inner.meta)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.borrow().state == State::Closed
    }

    pub fn new_entry_writer(&mut self, target: TargetEntry) -> Result<EntryWriter> {
        let name = clean_path(&target.filename);
        let mut inner = self.inner.borrow_mut();

        match inner.state {
            State::Closed => return Err(Error::AlreadyClosed.at("new entry writer", &name)),
            State::EntryActive(_) => {
                return Err(Error::ActiveEntryWriter.at("new entry writer", &name))
            }
            State::Failed => return Err(Error::WriterFailed.at("new entry writer", &name)),
            State::Idle => {}
        }

        let entry = Entry {
            name: name.clone(),
            offset: inner.offset,
            length: 0,
            mode: target.mode.unwrap_or(DEFAULT_MODE),
            mod_time: target.time.unwrap_or_else(Utc::now),
            checksum: [0u8; 32],
            meta: target.meta,
        };
        inner
            .meta
            .entries
            .add(entry)
            .map_err(|e| e.at("new entry writer", &name))?;

        let id = inner.next_id;
        inner.next_id += 1;
        inner.state = State::EntryActive(id);

        Ok(EntryWriter {
            name,
            sink: Some(HashingWriter::new(SharedFile {
                id,
                parent: Rc::clone(&self.inner),
            })),
        })
    }

    /// Streams `source` into a new entry.
    pub fn write<R: Read>(&mut self, target: TargetEntry, mut source: R) -> Result<()> {
        let mut writer = self.new_entry_writer(target)?;
        let copied = io::copy(&mut source, &mut writer)
            .map_err(|e| Error::from(e).at("write entry", &writer.name));
        let closed = writer.close();
        copied?;
        closed
    }

    /// Writes one file. Mode and modification time default to the source's.
    pub fn write_file<P: AsRef<Path>>(&mut self, source: P, mut target: TargetEntry) -> Result<()> {
        let source = source.as_ref();
        let file = File::open(source).map_err(|e| Error::from(e).at("write file", source))?;
        let meta = file
            .metadata()
            .map_err(|e| Error::from(e).at("write file", source))?;

        target.time.get_or_insert_with(|| mod_time_of(&meta));
        target.mode.get_or_insert_with(|| mode_of(&meta));
        self.write(target, file)
    }

    /// Writes every file below `root` (`"<prefix>=<directory>"` or a plain directory).
    pub fn write_files_recursive(&mut self, root: &str) -> Result<()> {
        self.write_files_recursive_with(root, |_| Ok(()))
    }

    /// Like [`write_files_recursive`](Self::write_files_recursive), but every file is
    /// first handed to `interceptor`, which may reject it or rewrite its target.
    pub fn write_files_recursive_with<F>(&mut self, root: &str, mut interceptor: F) -> Result<()>
    where
        F: FnMut(&mut WriteCandidate) -> Result<()>,
    {
        let mount = Mount::parse(root);
        let location = absolute(&mount.location).map_err(|e| e.at("write files recursive", root))?;

        for dir_entry in WalkDir::new(&location).sort_by_file_name() {
            let dir_entry = dir_entry.map_err(|e| Error::from(e).at("write files recursive", root))?;
            if dir_entry.file_type().is_dir() {
                continue;
            }

            let relative = match dir_entry.path().strip_prefix(&location) {
                Ok(relative) => relative.to_string_lossy().into_owned(),
                Err(_) => continue,
            };
            let source_metadata = dir_entry
                .metadata()
                .map_err(|e| Error::from(e).at("write files recursive", dir_entry.path()))?;

            let mut candidate = WriteCandidate {
                accept: true,
                source_filename: dir_entry.path().to_path_buf(),
                target: TargetEntry {
                    filename: mount.expose(&clean_path(&relative)),
                    mode: Some(mode_of(&source_metadata)),
                    time: Some(mod_time_of(&source_metadata)),
                    meta: Meta::new(),
                },
                source_metadata,
            };

            interceptor(&mut candidate)?;
            if !candidate.accept {
                tracing::debug!(path = %candidate.source_filename.display(), "skipped");
                continue;
            }

            tracing::debug!(
                path = %candidate.source_filename.display(),
                target = %candidate.target.filename,
                "adding file"
            );
            self.write_file(&candidate.source_filename, candidate.target)?;
        }

        Ok(())
    }

    /// Writes the table of contents and the final header. The file is
    /// released whatever happens, except while an entry writer is still open,
    /// in which case nothing changes and the writer stays usable.
    pub fn close(&mut self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        match inner.state {
            State::Closed => return Ok(()),
            State::EntryActive(_) => {
                return Err(Error::ActiveEntryWriter.at("close", &self.filename))
            }
            State::Failed => {
                inner.state = State::Closed;
                drop(inner.file.take());
                return Err(Error::WriterFailed.at("close", &self.filename));
            }
            State::Idle => {}
        }

        inner.state = State::Closed;
        let mut file = match inner.file.take() {
            Some(file) => file,
            None => return Ok(()),
        };

        let result = finish(&mut file, &inner);
        drop(file);

        if result.is_ok() {
            tracing::debug!(
                path = %self.filename.display(),
                entries = inner.meta.entries.len(),
                toc_offset = format_args!("{:#x}", inner.offset),
                "wrote box"
            );
        }
        result.map_err(|e| e.at("close", &self.filename))
    }
}

fn finish(file: &mut File, inner: &WriterInner) -> Result<()> {
    file.seek(SeekFrom::Start(inner.offset))?;
    {
        let mut out = BufWriter::new(&mut *file);
        toc::write_toc(&mut out, &inner.meta)?;
        out.flush()?;
    }

    let end = file.stream_position()?;
    file.set_len(end)?;

    file.seek(SeekFrom::Start(inner.header_offset))?;
    write_header(Version::V1, inner.offset, file)?;
    file.flush()?;
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

impl Drop for BoxWriter {
    fn drop(&mut self) {
        let open = match self.inner.try_borrow() {
            Ok(inner) => inner.state != State::Closed,
            Err(_) => return,
        };
        if open {
            tracing::warn!(
                path = %self.filename.display(),
                "box writer dropped without close, the box is incomplete"
            );
        }
    }
}

/// The file as seen by one entry writer: writes only go through while that
/// entry writer is the active one.
#[derive(Debug)]
struct SharedFile {
    id: u64,
    parent: Rc<RefCell<WriterInner>>,
}

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.parent.borrow_mut();
        match inner.state {
            State::EntryActive(id) if id == self.id => {}
            State::Closed => return Err(Error::AlreadyClosed.into()),
            State::Failed => return Err(Error::WriterFailed.into()),
            _ => return Err(Error::Detached.into()),
        }

        let file = inner
            .file
            .as_mut()
            .ok_or_else(|| io::Error::from(Error::AlreadyClosed))?;
        // Part of `buf` may have reached the file, so nothing after this can be placed.
        if let Err(err) = file.write_all(buf) {
            inner.state = State::Failed;
            return Err(err);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.parent.borrow_mut().file.as_mut() {
            Some(file) => file.flush(),
            None => Err(Error::AlreadyClosed.into()),
        }
    }
}

/// Streams the content of one entry, hashing it on the way.
#[derive(Debug)]
pub struct EntryWriter {
    name: String,
    sink: Option<HashingWriter<SharedFile, Sha256>>,
}

impl EntryWriter {
    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finalizes length and digest of the entry and hands the box writer back
    /// its slot. Closing twice is fine.
    pub fn close(&mut self) -> Result<()> {
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None => return Ok(()),
        };

        let length = sink.bytes_written();
        let (shared, digest) = sink.finish();
        let mut inner = shared.parent.borrow_mut();

        if inner.state == State::Failed {
            return Err(Error::WriterFailed.at("close entry", &self.name));
        }
        if inner.state != State::EntryActive(shared.id) {
            return Err(Error::Detached.at("close entry", &self.name));
        }

        let mut entry = inner
            .meta
            .entries
            .get(&self.name)
            .map_err(|e| e.at("close entry", &self.name))?
            .clone();
        entry.length = length;
        entry.checksum.copy_from_slice(&digest);
        inner
            .meta
            .entries
            .replace(entry)
            .map_err(|e| e.at("close entry", &self.name))?;

        inner.offset += length;
        inner.state = State::Idle;

        tracing::debug!(path = %self.name, length, "finished entry");
        Ok(())
    }
}

impl Write for EntryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.sink.as_mut() {
            Some(sink) => sink.write(buf),
            None => Err(Error::AlreadyClosed.at("write entry", &self.name).into()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for EntryWriter {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(path = %self.name, %err, "failed to finish entry on drop");
        }
    }
}
