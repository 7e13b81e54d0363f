use std::fs::{File, Metadata};
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::entry::FileInfo;
use crate::error::{Error, Result};
use crate::fs::{mod_time_of, mode_of};
use crate::open::{BoxFile, Predicate, ReadBox};
use crate::path::{clean_path, Mount};

/// A box served straight from a directory, used while developing.
#[derive(Debug, Clone)]
pub struct FsBox {
    base: PathBuf,
    mount: Mount,
}

impl FsBox {
    /// Opens `"<prefix>=<directory>"` or a plain directory. Relative directories
    /// are resolved against the working directory.
    pub fn open(spec: &str) -> Result<FsBox> {
        let mount = Mount::parse(spec);
        let base = if mount.location.is_absolute() {
            mount.location.clone()
        } else {
            std::env::current_dir()
                .map_err(|e| Error::from(e).at("open box", &mount.location))?
                .join(&mount.location)
        };

        Ok(FsBox {
            base: lexical(&base),
            mount,
        })
    }

    #[inline(always)]
    pub fn base(&self) -> &Path {
        &self.base
    }

    #[inline(always)]
    pub fn prefix(&self) -> &str {
        &self.mount.prefix
    }

    /// The file a name refers to, or `NotFound` if it lies outside of the base.
    fn resolve(&self, name: &str) -> Result<(String, PathBuf)> {
        let stored = self.mount.strip(name).ok_or(Error::NotFound)?;
        let candidate = lexical(&self.base.join(&stored));
        if !candidate.starts_with(&self.base) {
            return Err(Error::NotFound);
        }
        Ok((stored, candidate))
    }

    fn stat(&self, name: &str) -> Result<(PathBuf, FileInfo)> {
        let (stored, candidate) = self.resolve(name)?;
        let meta = std::fs::metadata(&candidate)?;
        if meta.is_dir() {
            return Err(Error::NotFound);
        }
        Ok((candidate, self.info_of(&stored, &meta)))
    }

    fn info_of(&self, stored: &str, meta: &Metadata) -> FileInfo {
        FileInfo {
            path: self.mount.expose(stored),
            size: meta.len(),
            mode: mode_of(meta),
            mod_time: mod_time_of(meta),
            checksum: None,
        }
    }
}

/// Resolves `.` and `..` without touching the filesystem. Never climbs above the root.
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl ReadBox for FsBox {
    fn open(&self, name: &str) -> Result<BoxFile> {
        let (candidate, info) = self.stat(name).map_err(|e| e.at("open", name))?;
        let file = File::open(&candidate).map_err(|e| Error::from(e).at("open", name))?;
        Ok(BoxFile::Fs { file, info })
    }

    fn info(&self, name: &str) -> Result<FileInfo> {
        self.stat(name)
            .map(|(_, info)| info)
            .map_err(|e| e.at("info", name))
    }

    fn for_each(
        &self,
        predicate: Option<&Predicate<'_>>,
        callback: &mut dyn FnMut(&FileInfo) -> Result<()>,
    ) -> Result<()> {
        for dir_entry in WalkDir::new(&self.base).sort_by_file_name() {
            let dir_entry = dir_entry.map_err(|e| Error::from(e).at("for each", &self.base))?;
            if dir_entry.file_type().is_dir() {
                continue;
            }

            let relative = match dir_entry.path().strip_prefix(&self.base) {
                Ok(relative) => clean_path(&relative.to_string_lossy()),
                Err(_) => continue,
            };
            if let Some(predicate) = predicate {
                if !predicate(&self.mount.expose(&relative))? {
                    continue;
                }
            }

            let meta = dir_entry
                .metadata()
                .map_err(|e| Error::from(e).at("for each", dir_entry.path()))?;
            callback(&self.info_of(&relative, &meta))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
