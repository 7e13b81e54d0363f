use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::entry::{Entries, Meta};

/// The table of contents: everything a box knows about itself, persisted as
/// one document when the writer closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxMetadata {
    pub name: String,
    pub description: String,
    pub version: String,
    pub revision: String,
    #[serde(with = "crate::toc::timestamp")]
    pub built: DateTime<Utc>,
    #[serde(rename = "builtBy")]
    pub built_by: String,
    pub entries: Entries,
    pub meta: Meta,
}

impl Default for BoxMetadata {
    fn default() -> Self {
        BoxMetadata {
            name: String::new(),
            description: String::new(),
            version: String::new(),
            revision: String::new(),
            built: Utc::now(),
            built_by: String::new(),
            entries: Entries::new(),
            meta: Meta::new(),
        }
    }
}

impl BoxMetadata {
    /// A revision for boxes built without one: 20 bytes of hex, stable for
    /// the same build timestamp.
    pub fn revision_for(built: DateTime<Utc>) -> String {
        let nanos = built.timestamp_nanos_opt().unwrap_or_else(|| built.timestamp());
        let digest = Sha256::digest(nanos.to_le_bytes());
        hex::encode(&digest[..20])
    }

    /// `name (version: v, revision: r)`
    pub fn short_string(&self) -> String {
        format!(
            "{} (version: {}, revision: {})",
            self.name, self.version, self.revision
        )
    }

    pub fn long_version(&self) -> String {
        format!(
            "{}\nBuilt:       {}\nBuilt by:    {}",
            self.short_string(),
            self.built.to_rfc3339(),
            self.built_by
        )
    }
}

impl fmt::Display for BoxMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_string())
    }
}
