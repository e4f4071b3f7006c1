use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

use arcscope::{
    ArchiveFormat, ExtractError, ExtractOptions, LoadOutcome, Selection, Session, ZipWriter,
    build_tree, bundle, detect_format, directory_state, expand_directory_toggle, extract, find,
    flatten_files, format_bytes, selected_entries,
};

/// Minimal ustar writer for fixtures.
fn tar(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in files {
        let mut header = [0u8; 512];
        header[..name.len()].copy_from_slice(name.as_bytes());
        header[100..108].copy_from_slice(b"0000644\0");
        let size = format!("{:011o}\0", data.len());
        header[124..136].copy_from_slice(size.as_bytes());
        header[156] = b'0';
        header[257..263].copy_from_slice(b"ustar\0");
        out.extend_from_slice(&header);
        out.extend_from_slice(data);
        out.resize(out.len().div_ceil(512) * 512, 0);
    }
    out.extend_from_slice(&[0u8; 1024]);
    out
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn zip(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new();
    for (name, data) in files {
        writer.add_file(name, data).unwrap();
    }
    writer.finish().unwrap()
}

#[tokio::test]
async fn zip_named_anything_is_detected() {
    let bytes = zip(&[("docs/readme.md", b"hello"), ("logo.svg", b"<svg/>")]);
    assert_eq!(detect_format("data.bin", &bytes).unwrap(), ArchiveFormat::Zip);

    let entries = extract("data.bin", bytes).await.unwrap();
    let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
    assert_eq!(paths, vec!["docs/readme.md", "logo.svg", "docs"]);

    let svg = entries.iter().find(|e| e.path == "logo.svg").unwrap();
    assert_eq!(svg.mime_type, Some("image/svg+xml"));
}

#[tokio::test]
async fn tar_gzip_and_plain_gzip() {
    let archive = gzip(&tar(&[("a/b/c.txt", b"123"), ("top.txt", b"t")]));

    assert_eq!(
        detect_format("archive.tgz", &archive).unwrap(),
        ArchiveFormat::TarGzip
    );
    let entries = extract("archive.tgz", archive.clone()).await.unwrap();
    let mut paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["a", "a/b", "a/b/c.txt", "top.txt"]);

    assert_eq!(
        detect_format("file.gz", &archive).unwrap(),
        ArchiveFormat::Gzip
    );
    let single = extract("file.gz", archive).await.unwrap();
    assert_eq!(single.len(), 1);
    assert_eq!(single[0].path, "file");
}

#[tokio::test]
async fn tar_padding_is_skipped() {
    let odd = vec![b'x'; 700];
    let entries = extract("odd.tar", tar(&[("odd.bin", &odd), ("next.txt", b"n")]))
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].size, 700);
    assert_eq!(entries[1].data.as_deref(), Some(&b"n"[..]));
}

#[tokio::test]
async fn empty_tar_yields_nothing() {
    let entries = extract("empty.tar", vec![0u8; 1024]).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn unknown_bytes_are_unsupported() {
    assert!(matches!(
        extract("readme.md", b"# title".to_vec()).await,
        Err(ExtractError::UnsupportedFormat)
    ));
}

#[tokio::test]
async fn file_and_directory_on_one_path_is_corrupt() {
    let bytes = tar(&[("a", b"file"), ("a/b", b"child")]);
    assert!(matches!(
        extract("clash.tar", bytes).await,
        Err(ExtractError::CorruptArchive { .. })
    ));
}

#[tokio::test]
async fn browse_select_and_bundle() {
    let bytes = tar(&[
        ("album/2023/beach.jpg", &[1u8; 300]),
        ("album/2023/city.jpg", &[2u8; 200]),
        ("album/cover.png", &[3u8; 100]),
        ("readme.txt", b"r"),
    ]);
    let entries = extract("album.tar", bytes).await.unwrap();
    let tree = build_tree(&entries);

    let year = find(&tree, "album/2023").unwrap();
    let selection = expand_directory_toggle(year, true).apply(&Selection::new());

    let album = find(&tree, "album").unwrap();
    let state = directory_state(album, &selection);
    assert!(state.indeterminate && !state.checked);
    assert!(directory_state(year, &selection).checked);

    let files = flatten_files(&tree);
    let picked = selected_entries(&files, &selection);
    assert_eq!(picked.len(), 2);

    let out = extract("out.zip", bundle(&picked).unwrap()).await.unwrap();
    let mut files: Vec<_> = out
        .iter()
        .filter(|e| !e.is_directory)
        .map(|e| (e.path.as_str(), e.data.as_ref().unwrap().len()))
        .collect();
    files.sort();
    assert_eq!(
        files,
        vec![("album/2023/beach.jpg", 300), ("album/2023/city.jpg", 200)]
    );
}

#[tokio::test]
async fn session_keeps_only_the_newest_load() {
    let session = Session::new();
    let options = ExtractOptions::default();

    // Zip entries decode on spawned tasks, so both loads are in flight
    // before either can finish.
    let first = session.load("one.zip", zip(&[("1.txt", b"1")]), &options);
    let second = session.load("two.zip", zip(&[("2.txt", b"2")]), &options);
    let (first, second) = tokio::join!(first, second);

    assert_eq!(first.unwrap(), LoadOutcome::Superseded);
    assert_eq!(second.unwrap(), LoadOutcome::Loaded { entries: 1 });
    assert_eq!(session.current().unwrap().name, "two.zip");
}

#[test]
fn sizes_for_humans() {
    assert_eq!(format_bytes(0), "0 B");
    assert_eq!(format_bytes(1023), "1023 B");
    assert_eq!(format_bytes(1024), "1.0 KB");
    assert_eq!(format_bytes(1_048_576), "1.0 MB");
}
