use std::fmt;
use std::str::FromStr;

/// How the writer treats the target file itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    /// Opens the file if it exists, creates it otherwise.
    OpenOrCreate,
    /// The file must already exist.
    OpenOnly,
    /// The file must not exist yet.
    CreateOnly,
}

/// How the writer treats a box that may already be inside the target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Appends a new box, or replaces an existing one.
    NewOrReplace,
    /// Fails if the file already contains a box.
    NewOnly,
    /// Fails unless the file already contains a box.
    ReplaceOnly,
}

impl Default for OpenMode {
    fn default() -> Self {
        OpenMode::OpenOrCreate
    }
}

impl Default for WriteMode {
    fn default() -> Self {
        WriteMode::NewOrReplace
    }
}

impl WriteMode {
    #[inline(always)]
    pub fn allows_new(self) -> bool {
        matches!(self, WriteMode::NewOrReplace | WriteMode::NewOnly)
    }

    #[inline(always)]
    pub fn allows_replace(self) -> bool {
        matches!(self, WriteMode::NewOrReplace | WriteMode::ReplaceOnly)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal {kind}: {value}")]
pub struct ParseModeError {
    kind: &'static str,
    value: String,
}

impl FromStr for OpenMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openorcreate" => Ok(OpenMode::OpenOrCreate),
            "openonly" => Ok(OpenMode::OpenOnly),
            "createonly" => Ok(OpenMode::CreateOnly),
            _ => Err(ParseModeError {
                kind: "open mode",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for WriteMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "neworreplace" => Ok(WriteMode::NewOrReplace),
            "newonly" => Ok(WriteMode::NewOnly),
            "replaceonly" => Ok(WriteMode::ReplaceOnly),
            _ => Err(ParseModeError {
                kind: "write mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpenMode::OpenOrCreate => "openOrCreate",
            OpenMode::OpenOnly => "openOnly",
            OpenMode::CreateOnly => "createOnly",
        })
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteMode::NewOrReplace => "newOrReplace",
            WriteMode::NewOnly => "newOnly",
            WriteMode::ReplaceOnly => "replaceOnly",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive_and_displays_back() {
        for mode in &[OpenMode::OpenOrCreate, OpenMode::OpenOnly, OpenMode::CreateOnly] {
            assert_eq!(mode.to_string().parse::<OpenMode>().unwrap(), *mode);
            assert_eq!(mode.to_string().to_uppercase().parse::<OpenMode>().unwrap(), *mode);
        }
        for mode in &[WriteMode::NewOrReplace, WriteMode::NewOnly, WriteMode::ReplaceOnly] {
            assert_eq!(mode.to_string().parse::<WriteMode>().unwrap(), *mode);
        }
    }

    #[test]
    fn illegal_values() {
        let err = "sometimes".parse::<WriteMode>().unwrap_err();
        assert_eq!(err.to_string(), "illegal write mode: sometimes");
        assert!("".parse::<OpenMode>().is_err());
    }

    #[test]
    fn write_mode_permissions() {
        assert!(WriteMode::NewOnly.allows_new());
        assert!(!WriteMode::NewOnly.allows_replace());
        assert!(!WriteMode::ReplaceOnly.allows_new());
        assert!(WriteMode::NewOrReplace.allows_new() && WriteMode::NewOrReplace.allows_replace());
    }
}
