//! Re-package selected entries as a new zip archive.

use crate::entry::ArchiveEntry;
use crate::error::BundleError;
use crate::zip::ZipWriter;

/// Largest entry the writer can record without ZIP64 fields.
const MAX_ENTRY_SIZE: u64 = u32::MAX as u64;
/// Largest entry count an EOCD record can hold.
const MAX_ENTRIES: usize = u16::MAX as usize;

/// Bundle `entries` into zip bytes, each file at its archive path.
///
/// Directories and entries without contents are skipped; parent folders are
/// implied by the stored paths.
pub fn bundle(entries: &[&ArchiveEntry]) -> Result<Vec<u8>, BundleError> {
    let files: Vec<(&ArchiveEntry, &[u8])> = entries
        .iter()
        .filter(|e| !e.is_directory)
        .filter_map(|e| e.data.as_deref().map(|data| (*e, data)))
        .collect();

    if files.is_empty() {
        return Err(BundleError::EmptySelection);
    }
    if files.len() > MAX_ENTRIES {
        return Err(BundleError::TooManyEntries { count: files.len() });
    }
    if let Some((entry, data)) = files
        .iter()
        .find(|(_, data)| data.len() as u64 > MAX_ENTRY_SIZE)
    {
        return Err(BundleError::EntryTooLarge {
            path: entry.path.clone(),
            size: data.len() as u64,
        });
    }

    let mut writer = ZipWriter::new();
    for (entry, data) in &files {
        writer.add_file(&entry.path, data)?;
    }
    let bytes = writer.finish()?;

    log::debug!("bundled {} files into {} bytes", files.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract;

    #[tokio::test]
    async fn bundle_round_trips() {
        let entries = vec![
            ArchiveEntry::file("docs/readme.md".to_string(), b"# hello\n".repeat(50)),
            ArchiveEntry::file("img/logo.png".to_string(), vec![0x89, b'P', b'N', b'G']),
            ArchiveEntry::file("empty.txt".to_string(), Vec::new()),
        ];
        let refs: Vec<_> = entries.iter().collect();

        let bytes = bundle(&refs).unwrap();
        let back = extract("bundle.zip", bytes).await.unwrap();

        for original in &entries {
            let found = back.iter().find(|e| e.path == original.path).unwrap();
            assert_eq!(found.data, original.data);
        }
        assert!(back.iter().any(|e| e.is_directory && e.path == "docs"));
    }

    #[test]
    fn directories_are_skipped() {
        let dir = ArchiveEntry::directory("only".to_string());
        assert!(matches!(bundle(&[&dir]), Err(BundleError::EmptySelection)));
        assert!(matches!(bundle(&[]), Err(BundleError::EmptySelection)));
    }

    #[test]
    fn entries_without_data_are_skipped() {
        let mut hollow = ArchiveEntry::file("a.txt".to_string(), b"a".to_vec());
        hollow.data = None;
        let real = ArchiveEntry::file("b.txt".to_string(), b"b".to_vec());

        let bytes = bundle(&[&hollow, &real]).unwrap();
        assert!(bytes.windows(5).any(|w| w == b"b.txt"));
        assert!(!bytes.windows(5).any(|w| w == b"a.txt"));
    }
}
