pub mod cat;
pub mod create;
pub mod list;
pub mod truncate;
pub mod validate;

use std::path::Path;

use anyhow::Context;
use goxr_format::PackedBox;

pub(crate) fn open_box(path: &Path) -> anyhow::Result<PackedBox> {
    PackedBox::open_path(path).with_context(|| format!("Cannot open box in `{}`", path.display()))
}
