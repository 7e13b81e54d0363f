mod combined;
mod entry;
mod error;
pub mod fs;
mod fs_box;
pub mod hashing;
pub mod header;
mod meta;
mod modes;
mod open;
pub mod path;
mod reader;
mod toc;
mod truncate;
mod writer;

pub use combined::CombinedBox;
pub use entry::{Checksum, Entries, Entry, FileInfo, Meta};
pub use error::{Error, Result};
pub use fs_box::FsBox;
pub use meta::BoxMetadata;
pub use modes::{OpenMode, ParseModeError, WriteMode};
pub use open::{
    executable, open_box, open_box_by, open_packed_box, BoxFile, FallbackPolicy, Predicate,
    ReadBox,
};
pub use reader::{EntryReader, PackedBox, ValidateStats};
pub use truncate::truncate_box;
pub use writer::{BoxWriter, EntryWriter, TargetEntry, WriteCandidate};
