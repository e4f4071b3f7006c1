use flate2::read::GzDecoder;
use std::io::Read;

use crate::entry::{self, ArchiveEntry};
use crate::error::{ExtractError, Result};
use crate::tar;

/// Inflate a single-member gzip stream into memory.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::corrupt(format!("invalid gzip stream: {}", e)))?;
    Ok(out)
}

/// A bare `.gz` file becomes one entry named after the input minus its suffix.
pub fn extract_gzip(name: &str, data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let inflated = gunzip(data)?;
    let path = entry::normalize_path(strip_gzip_suffix(name))
        .ok_or_else(|| ExtractError::corrupt("gzip input has no usable name"))?;
    log::debug!("gzip: '{}' -> {} bytes", path, inflated.len());
    entry::finalize(vec![ArchiveEntry::file(path, inflated)])
}

/// Inflate, then parse the result as tar.
pub fn extract_tar_gzip(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    tar::extract_tar(&gunzip(data)?)
}

fn strip_gzip_suffix(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    [".gzip", ".gz"]
        .iter()
        .find(|s| lower.ends_with(*s))
        .map(|s| &name[..name.len() - s.len()])
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tar::tests::{finish, push_entry};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn bare_gzip_strips_suffix() {
        let entries = extract_gzip("notes.txt.GZ", &gzip(b"plain text")).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "notes.txt");
        assert_eq!(entries[0].name, "notes.txt");
        assert_eq!(entries[0].data.as_deref(), Some(&b"plain text"[..]));
    }

    #[test]
    fn path_like_name_gets_parents() {
        let entries = extract_gzip("logs/app.log.gzip", &gzip(b"line")).unwrap();
        assert_eq!(entries[0].name, "app.log");
        assert!(entries.iter().any(|e| e.is_directory && e.path == "logs"));
    }

    #[test]
    fn tar_gzip_delegates_to_tar() {
        let mut tar = Vec::new();
        push_entry(&mut tar, "dir/a.txt", b'0', b"a");
        finish(&mut tar);

        let entries = extract_tar_gzip(&gzip(&tar)).unwrap();
        assert_eq!(entries, tar::extract_tar(&tar).unwrap());
    }

    #[test]
    fn garbage_is_corrupt() {
        assert!(matches!(
            extract_gzip("x.gz", &[0x1F, 0x8B, 0xFF, 0xFF]),
            Err(ExtractError::CorruptArchive { .. })
        ));
    }
}
