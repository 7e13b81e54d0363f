use std::fs::OpenOptions;
use std::io::BufReader;
use std::path::Path;

use crate::error::Result;
use crate::header::{find_header, HEADER_BUFFER_SIZE};

/// Removes a box from `path`, leaving whatever preceded it. Returns whether a
/// box was found; a file without one is left untouched.
pub fn truncate_box<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    truncate_inner(path).map_err(|e| e.at("truncate", path))
}

fn truncate_inner(path: &Path) -> Result<bool> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;

    let header = match find_header(BufReader::with_capacity(HEADER_BUFFER_SIZE, &mut file))? {
        Some(header) => header,
        None => return Ok(false),
    };

    file.set_len(header.offset)?;
    tracing::debug!(
        path = %path.display(),
        offset = format_args!("{:#x}", header.offset),
        "truncated box"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::tests::garbage;
    use crate::header::{write_header, Version};

    #[test]
    fn without_box_nothing_changes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let content = garbage(4096);
        std::fs::write(file.path(), &content).unwrap();

        assert!(!truncate_box(file.path()).unwrap());
        assert_eq!(std::fs::read(file.path()).unwrap(), content);
    }

    #[test]
    fn cuts_at_header_start() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let host = garbage(HEADER_BUFFER_SIZE + 3);
        let mut content = host.clone();
        write_header(Version::V1, 12345, &mut content).unwrap();
        content.extend_from_slice(b"whatever follows");
        std::fs::write(file.path(), &content).unwrap();

        assert!(truncate_box(file.path()).unwrap());
        assert_eq!(std::fs::read(file.path()).unwrap(), host);
        assert!(!truncate_box(file.path()).unwrap());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = truncate_box(dir.path().join("missing")).unwrap_err();
        assert!(err.is_not_found());
    }
}
