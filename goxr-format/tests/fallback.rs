//! Finding a program's box, with and without a packed one.

use std::io::Read;
use std::path::Path;

use goxr_format::{
    open_box_by, BoxWriter, CombinedBox, FallbackPolicy, FsBox, OpenMode, PackedBox, ReadBox,
    TargetEntry, WriteMode,
};
use tempfile::TempDir;

fn read_to_string(bx: &dyn ReadBox, name: &str) -> String {
    let mut out = String::new();
    bx.open(name).unwrap().read_to_string(&mut out).unwrap();
    out
}

fn fake_executable(dir: &Path) -> std::path::PathBuf {
    let exe = dir.join("app");
    std::fs::write(&exe, b"\x7fELF pretend this is a program").unwrap();
    exe
}

#[test]
fn packed_box_wins_when_present() {
    let dir = TempDir::new().unwrap();
    let exe = fake_executable(dir.path());
    let mut writer = BoxWriter::new(&exe, OpenMode::OpenOnly, WriteMode::NewOnly).unwrap();
    writer
        .write(TargetEntry::new("a.txt"), &b"packed"[..])
        .unwrap();
    writer.close().unwrap();

    let assets = dir.path().join("assets");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::write(assets.join("a.txt"), "loose").unwrap();

    let mut bx = open_box_by(&exe, &[assets.to_str().unwrap()], FallbackPolicy::Fail).unwrap();
    assert_eq!(read_to_string(bx.as_ref(), "a.txt"), "packed");
    bx.close().unwrap();
}

#[test]
fn falls_back_to_filesystem_boxes_in_order() {
    let dir = TempDir::new().unwrap();
    let exe = fake_executable(dir.path());

    let first = dir.path().join("first");
    let second = dir.path().join("second");
    std::fs::create_dir_all(&first).unwrap();
    std::fs::create_dir_all(&second).unwrap();
    std::fs::write(first.join("shared.txt"), "first").unwrap();
    std::fs::write(second.join("shared.txt"), "second").unwrap();
    std::fs::write(second.join("only.txt"), "only").unwrap();

    let bases = [first.to_str().unwrap(), second.to_str().unwrap()];
    for policy in &[FallbackPolicy::Silent, FallbackPolicy::Warn] {
        let mut bx = open_box_by(&exe, &bases, *policy).unwrap();
        assert_eq!(read_to_string(bx.as_ref(), "shared.txt"), "first");
        assert_eq!(read_to_string(bx.as_ref(), "only.txt"), "only");
        assert!(bx.info("none.txt").unwrap_err().is_not_found());

        let mut paths = vec![];
        bx.for_each(None, &mut |info| {
            paths.push(info.path.clone());
            Ok(())
        })
        .unwrap();
        assert_eq!(paths, vec!["shared.txt", "only.txt"]);
        bx.close().unwrap();
    }
}

#[test]
fn fail_policy_refuses_fallback() {
    let dir = TempDir::new().unwrap();
    let exe = fake_executable(dir.path());

    let err = open_box_by(&exe, &[dir.path().to_str().unwrap()], FallbackPolicy::Fail)
        .err()
        .unwrap();
    assert!(err.is_does_not_contain_box());
}

#[test]
fn missing_candidate_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = open_box_by(dir.path().join("missing"), &[], FallbackPolicy::Silent)
        .err()
        .unwrap();
    assert!(err.is_not_found());
}

#[test]
fn combined_packed_and_filesystem() {
    let dir = TempDir::new().unwrap();
    let box_path = dir.path().join("test.box");
    let mut writer = BoxWriter::new(&box_path, OpenMode::OpenOrCreate, WriteMode::NewOrReplace).unwrap();
    writer
        .write(TargetEntry::new("index.html"), &b"packed index"[..])
        .unwrap();
    writer.close().unwrap();

    let overrides = dir.path().join("overrides");
    std::fs::create_dir_all(&overrides).unwrap();
    std::fs::write(overrides.join("index.html"), "override").unwrap();
    std::fs::write(overrides.join("extra.css"), "css").unwrap();

    let mut combined = CombinedBox::new()
        .with(FsBox::open(overrides.to_str().unwrap()).unwrap())
        .with(PackedBox::open(box_path.to_str().unwrap()).unwrap());

    assert_eq!(read_to_string(&combined, "index.html"), "override");
    assert_eq!(read_to_string(&combined, "extra.css"), "css");
    assert_eq!(combined.info("index.html").unwrap().checksum, None);

    combined.close().unwrap();
    combined.close().unwrap();
}
