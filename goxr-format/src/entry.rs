use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::path::clean_path;

/// SHA-256 digest of an entry's content.
pub type Checksum = [u8; 32];

/// Free-form, string keyed metadata attached to entries and boxes.
pub type Meta = HashMap<String, serde_json::Value>;

/// One file inside a box.
///
/// The offset is absolute within the container file it was written to and is
/// meaningless for any other file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EntryRecord", into = "EntryRecord")]
pub struct Entry {
    pub name: String,
    pub offset: u64,
    pub length: u64,
    pub mode: u32,
    pub mod_time: DateTime<Utc>,
    pub checksum: Checksum,
    pub meta: Meta,
}

/// Wire shape of an entry: a positional record
/// `[name, offset, length, mode, modTime, checksum, meta]`.
#[derive(Serialize, Deserialize)]
struct EntryRecord(
    String,
    u64,
    u64,
    u32,
    #[serde(with = "crate::toc::timestamp")] DateTime<Utc>,
    #[serde(with = "crate::toc::checksum")] Checksum,
    Meta,
);

impl From<EntryRecord> for Entry {
    fn from(EntryRecord(name, offset, length, mode, mod_time, checksum, meta): EntryRecord) -> Self {
        Entry {
            name,
            offset,
            length,
            mode,
            mod_time,
            checksum,
            meta,
        }
    }
}

impl From<Entry> for EntryRecord {
    fn from(e: Entry) -> Self {
        EntryRecord(
            e.name, e.offset, e.length, e.mode, e.mod_time, e.checksum, e.meta,
        )
    }
}

impl Entry {
    #[inline(always)]
    pub fn checksum_string(&self) -> String {
        URL_SAFE.encode(self.checksum)
    }

    #[inline(always)]
    pub fn info(&self) -> FileInfo {
        FileInfo::from(self)
    }
}

/// Cleaned path to entry. Every key equals the cleaned name of its entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entries(HashMap<String, Entry>);

impl Entries {
    pub fn new() -> Self {
        Entries::default()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.0.values()
    }

    /// Entries ordered by name, for stable listings.
    pub fn sorted(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.0.values().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    pub fn find(&self, name: &str) -> Option<&Entry> {
        self.0.get(&clean_path(name))
    }

    pub fn get(&self, name: &str) -> Result<&Entry> {
        self.find(name).ok_or(Error::NotFound)
    }

    pub fn add(&mut self, mut entry: Entry) -> Result<()> {
        let key = clean_path(&entry.name);
        if self.0.contains_key(&key) {
            return Err(Error::AlreadyExists);
        }
        entry.name = key.clone();
        self.0.insert(key, entry);
        Ok(())
    }

    pub fn replace(&mut self, mut entry: Entry) -> Result<()> {
        let key = clean_path(&entry.name);
        match self.0.get_mut(&key) {
            Some(slot) => {
                entry.name = key;
                *slot = entry;
                Ok(())
            }
            None => Err(Error::NotFound),
        }
    }

    /// Keeps the entries the predicate accepts. The first predicate error aborts.
    pub fn filter<F>(&self, mut predicate: F) -> Result<Vec<&Entry>>
    where
        F: FnMut(&Entry) -> Result<bool>,
    {
        let mut out = vec![];
        for entry in self.sorted() {
            if predicate(entry)? {
                out.push(entry);
            }
        }
        Ok(out)
    }
}

/// What callers learn about a file, no matter which kind of box served it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub mode: u32,
    pub mod_time: DateTime<Utc>,
    /// Only known for files served from a packed box.
    pub checksum: Option<Checksum>,
}

impl FileInfo {
    pub fn checksum_string(&self) -> Option<String> {
        self.checksum.map(|checksum| URL_SAFE.encode(checksum))
    }

    pub(crate) fn with_path(mut self, path: String) -> FileInfo {
        self.path = path;
        self
    }
}

impl From<&Entry> for FileInfo {
    fn from(entry: &Entry) -> Self {
        FileInfo {
            path: entry.name.clone(),
            size: entry.length,
            mode: entry.mode,
            mod_time: entry.mod_time,
            checksum: Some(entry.checksum),
        }
    }
}
