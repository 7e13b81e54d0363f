//! Filesystem utilities for turning source metadata into entry attributes.

use std::fs::Metadata;

use chrono::{DateTime, Utc};

/// Mode used for entries whose source does not say otherwise.
pub const DEFAULT_MODE: u32 = 0o644;

/// Permission bits of a file. Only the lower twelve bits survive, the file
/// type is implied by being an entry at all.
#[cfg(unix)]
pub fn mode_of(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
pub fn mode_of(meta: &Metadata) -> u32 {
    if meta.permissions().readonly() {
        0o444
    } else {
        DEFAULT_MODE
    }
}

/// Modification time of a file, falling back to now where the platform has none.
pub fn mod_time_of(meta: &Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
