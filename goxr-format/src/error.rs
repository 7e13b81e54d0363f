use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{op} '{}': {source}", .path.display())]
    Path {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("file does not exist")]
    NotFound,

    #[error("file already exists")]
    AlreadyExists,

    #[error("does not contain box")]
    DoesNotContainBox,

    #[error("does contain box")]
    DoesContainBox,

    #[error("invalid header version: {0}")]
    InvalidHeaderVersion(u8),

    #[error("there is another entry writer active and not closed")]
    ActiveEntryWriter,

    #[error("already closed")]
    AlreadyClosed,

    #[error("entry writer is already detached from its box writer")]
    Detached,

    #[error("invalid table of contents")]
    Toc(#[source] rmp_serde::decode::Error),

    #[error("cannot encode table of contents")]
    TocEncode(#[source] rmp_serde::encode::Error),

    #[error("box writer failed earlier and cannot continue")]
    WriterFailed,

    #[error("walking directory failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("{}", join_messages(.0))]
    Multiple(Vec<Error>),

    #[error(transparent)]
    Io(std::io::Error),
}

impl From<std::io::Error> for Error {
    /// An I/O error that only carries one of ours, as produced by the entry
    /// streams, is unwrapped back into it.
    fn from(err: std::io::Error) -> Error {
        if !err.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            return Error::Io(err);
        }

        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => Error::Io(std::io::Error::new(kind, other)),
            None => Error::Io(std::io::Error::from(kind)),
        }
    }
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\nAND ")
}

impl Error {
    /// Attaches the operation and the path it was working on. An error that
    /// already carries a path wrapper is unwrapped first, so context never nests.
    pub fn at<P: Into<PathBuf>>(self, op: &'static str, path: P) -> Error {
        let source = match self {
            Error::Path { source, .. } => *source,
            other => other,
        };

        Error::Path {
            op,
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Strips every path wrapper and returns the error that actually happened.
    pub fn underlying(&self) -> &Error {
        let mut current = self;
        while let Error::Path { source, .. } = current {
            current = source;
        }
        current
    }

    pub fn is_not_found(&self) -> bool {
        match self.underlying() {
            Error::NotFound => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        match self.underlying() {
            Error::AlreadyExists => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::AlreadyExists,
            _ => false,
        }
    }

    pub fn is_does_not_contain_box(&self) -> bool {
        matches!(self.underlying(), Error::DoesNotContainBox)
    }

    pub fn is_does_contain_box(&self) -> bool {
        matches!(self.underlying(), Error::DoesContainBox)
    }

    pub fn is_already_closed(&self) -> bool {
        matches!(self.underlying(), Error::AlreadyClosed)
    }

    pub fn is_active_entry_writer(&self) -> bool {
        matches!(self.underlying(), Error::ActiveEntryWriter)
    }

    pub fn is_writer_failed(&self) -> bool {
        matches!(self.underlying(), Error::WriterFailed)
    }

    /// Collapses a list of errors into nothing, the error itself, or `Multiple`.
    pub(crate) fn combine(mut errors: Vec<Error>) -> Option<Error> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Error::Multiple(errors)),
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        use std::io::ErrorKind;

        let kind = match err.underlying() {
            Error::Io(e) => e.kind(),
            Error::NotFound => ErrorKind::NotFound,
            Error::AlreadyExists => ErrorKind::AlreadyExists,
            Error::AlreadyClosed => ErrorKind::BrokenPipe,
            Error::Toc(_) | Error::InvalidHeaderVersion(_) => ErrorKind::InvalidData,
            _ => ErrorKind::Other,
        };

        std::io::Error::new(kind, err)
    }
}
