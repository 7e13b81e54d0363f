//! Writing boxes into host files and reading them back.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use goxr_format::{
    truncate_box, BoxWriter, OpenMode, PackedBox, ReadBox, TargetEntry, WriteMode,
};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

/// Helper to create a scratch directory and the box path inside it
fn create_test_box() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let box_path = temp_dir.path().join("test.box");
    (temp_dir, box_path)
}

fn write_box(path: &Path, files: &[(&str, &str)], write_mode: WriteMode) {
    let mut writer = BoxWriter::new(path, OpenMode::OpenOrCreate, write_mode).unwrap();
    writer.metadata_mut().name = "test".into();
    for (name, content) in files {
        writer
            .write(TargetEntry::new(*name), content.as_bytes())
            .unwrap();
    }
    writer.close().unwrap();
}

fn read_to_string(bx: &dyn ReadBox, name: &str) -> String {
    let mut out = String::new();
    bx.open(name).unwrap().read_to_string(&mut out).unwrap();
    out
}

fn open(path: &Path) -> PackedBox {
    PackedBox::open(path.to_str().unwrap()).unwrap()
}

#[test]
fn round_trip() {
    let (_dir, path) = create_test_box();
    write_box(
        &path,
        &[("a.txt", "hello"), ("dir/b.txt", "world")],
        WriteMode::NewOrReplace,
    );

    let mut bx = open(&path);
    assert_eq!(bx.metadata().name, "test");
    assert_eq!(bx.metadata().entries.len(), 2);
    assert_eq!(read_to_string(&bx, "a.txt"), "hello");
    assert_eq!(read_to_string(&bx, "/dir/./b.txt"), "world");

    let info = bx.info("dir/b.txt").unwrap();
    assert_eq!(info.size, 5);
    assert_eq!(info.mode, 0o644);
    assert_eq!(info.checksum.unwrap().to_vec(), Sha256::digest(b"world").to_vec());
    assert_eq!(
        info.checksum_string().unwrap(),
        URL_SAFE.encode(Sha256::digest(b"world"))
    );

    assert!(bx.info("c.txt").unwrap_err().is_not_found());
    assert!(bx.validate().unwrap().is_ok());
    bx.close().unwrap();
}

#[test]
fn entry_readers_are_independent_and_seekable() {
    let (_dir, path) = create_test_box();
    write_box(&path, &[("a.txt", "0123456789")], WriteMode::NewOrReplace);
    let bx = open(&path);

    let mut first = bx.open("a.txt").unwrap();
    let mut second = bx.open("a.txt").unwrap();

    let mut buf = [0u8; 4];
    first.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"0123");

    second.seek(SeekFrom::End(-3)).unwrap();
    let mut rest = String::new();
    second.read_to_string(&mut rest).unwrap();
    assert_eq!(rest, "789");

    first.seek(SeekFrom::Current(2)).unwrap();
    first.read_exact(&mut buf[..2]).unwrap();
    assert_eq!(&buf[..2], b"67");

    assert!(first.seek(SeekFrom::Current(-100)).is_err());
}

#[test]
fn readers_fail_after_close() {
    let (_dir, path) = create_test_box();
    write_box(&path, &[("a.txt", "hello")], WriteMode::NewOrReplace);
    let mut bx = open(&path);

    let mut reader = bx.open("a.txt").unwrap();
    bx.close().unwrap();
    bx.close().unwrap();

    let err = reader.read(&mut [0u8; 8]).unwrap_err();
    assert!(goxr_format::Error::from(err).is_already_closed());
    assert!(reader.seek(SeekFrom::Start(0)).is_err());
    assert!(bx.open("a.txt").unwrap_err().is_already_closed());
}

#[test]
fn packed_box_is_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<PackedBox>();

    let (_dir, path) = create_test_box();
    write_box(&path, &[("a", "aaaa"), ("b", "bbbb")], WriteMode::NewOrReplace);
    let bx = open(&path);

    std::thread::scope(|scope| {
        for name in &["a", "b"] {
            let bx = &bx;
            scope.spawn(move || {
                let mut out = String::new();
                bx.open_entry(name).unwrap().read_to_string(&mut out).unwrap();
                assert_eq!(out, name.repeat(4));
            });
        }
    });
}

#[test]
fn box_behind_host_payload() {
    let (_dir, path) = create_test_box();
    let host: Vec<u8> = (0..50_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, &host).unwrap();

    write_box(&path, &[("a.txt", "hello")], WriteMode::NewOnly);

    let bx = open(&path);
    assert_eq!(bx.header().offset, host.len() as u64);
    assert_eq!(read_to_string(&bx, "a.txt"), "hello");
    drop(bx);

    assert!(truncate_box(&path).unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), host);

    // A second truncate finds nothing and changes nothing.
    assert!(!truncate_box(&path).unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), host);
}

#[test]
fn replace_drops_old_entries() {
    let (_dir, path) = create_test_box();
    std::fs::write(&path, b"#!host").unwrap();
    write_box(&path, &[("old.txt", "old"), ("both.txt", "v1")], WriteMode::NewOrReplace);
    write_box(&path, &[("both.txt", "v2"), ("new.txt", "new")], WriteMode::ReplaceOnly);

    let bx = open(&path);
    assert_eq!(bx.header().offset, 6);
    assert!(bx.info("old.txt").unwrap_err().is_not_found());
    assert_eq!(read_to_string(&bx, "both.txt"), "v2");
    assert_eq!(read_to_string(&bx, "new.txt"), "new");
    assert!(std::fs::read(&path).unwrap().starts_with(b"#!host"));
}

#[test]
fn write_modes_guard_existing_boxes() {
    let (_dir, path) = create_test_box();
    std::fs::write(&path, b"host").unwrap();

    let err = BoxWriter::new(&path, OpenMode::OpenOnly, WriteMode::ReplaceOnly).unwrap_err();
    assert!(err.is_does_not_contain_box());

    write_box(&path, &[("a", "a")], WriteMode::NewOnly);

    let err = BoxWriter::new(&path, OpenMode::OpenOnly, WriteMode::NewOnly).unwrap_err();
    assert!(err.is_does_contain_box());
    // The refused writer left the box alone.
    assert_eq!(read_to_string(&open(&path), "a"), "a");
}

#[test]
fn open_modes() {
    let (dir, path) = create_test_box();

    let err = BoxWriter::new(&path, OpenMode::OpenOnly, WriteMode::NewOrReplace).unwrap_err();
    assert!(err.is_not_found());

    write_box(&path, &[], WriteMode::NewOrReplace);
    let err = BoxWriter::new(&path, OpenMode::CreateOnly, WriteMode::NewOrReplace).unwrap_err();
    assert!(err.is_already_exists());

    let fresh = dir.path().join("fresh.box");
    let mut writer = BoxWriter::new(&fresh, OpenMode::CreateOnly, WriteMode::NewOnly).unwrap();
    writer.close().unwrap();
    assert!(open(&fresh).metadata().entries.is_empty());
}

#[test]
fn mount_prefix_on_packed_box() {
    let (_dir, path) = create_test_box();
    write_box(&path, &[("index.html", "<html/>")], WriteMode::NewOrReplace);

    let bx = PackedBox::open(&format!("static={}", path.display())).unwrap();
    assert_eq!(bx.prefix(), "static/");
    assert_eq!(read_to_string(&bx, "static/index.html"), "<html/>");
    assert_eq!(bx.info("/static/index.html").unwrap().path, "static/index.html");
    assert!(bx.info("index.html").unwrap_err().is_not_found());

    let mut seen = vec![];
    bx.for_each(None, &mut |info| {
        seen.push(info.path.clone());
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, vec!["static/index.html"]);
}

#[test]
fn validate_detects_corruption() {
    let (_dir, path) = create_test_box();
    write_box(&path, &[("a.txt", "hello"), ("b.txt", "world")], WriteMode::NewOrReplace);

    let offset = open(&path).metadata().entries.get("b.txt").unwrap().offset;
    let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(b"W").unwrap();
    drop(file);

    let stats = open(&path).validate().unwrap();
    assert_eq!(stats.files_checked, 2);
    assert_eq!(stats.checksum_failures, 1);
    assert_eq!(stats.failed, vec!["b.txt".to_string()]);
    assert!(!stats.is_ok());
}

#[test]
fn write_files_recursive_with_prefix() {
    let (dir, path) = create_test_box();
    let src = dir.path().join("site");
    std::fs::create_dir_all(src.join("css")).unwrap();
    std::fs::write(src.join("index.html"), "index").unwrap();
    std::fs::write(src.join("css/main.css"), "body{}").unwrap();

    let mut writer = BoxWriter::new(&path, OpenMode::OpenOrCreate, WriteMode::NewOrReplace).unwrap();
    writer
        .write_files_recursive(&format!("/www/={}", src.display()))
        .unwrap();
    writer.close().unwrap();

    let bx = open(&path);
    assert_eq!(read_to_string(&bx, "www/index.html"), "index");
    assert_eq!(read_to_string(&bx, "www/css/main.css"), "body{}");

    let source_time = goxr_format::fs::mod_time_of(&std::fs::metadata(src.join("index.html")).unwrap());
    assert_eq!(bx.info("www/index.html").unwrap().mod_time, source_time);
}

#[test]
fn writer_dropped_without_close_leaves_no_readable_box() {
    let (_dir, path) = create_test_box();
    {
        let mut writer =
            BoxWriter::new(&path, OpenMode::OpenOrCreate, WriteMode::NewOrReplace).unwrap();
        writer.write(TargetEntry::new("a"), &b"a"[..]).unwrap();
    }

    // The placeholder header points at offset zero, where no table of contents lives.
    assert!(PackedBox::open(path.to_str().unwrap()).is_err());
}
