//! Format detection from magic bytes, falling back to the file name.

use crate::error::{ExtractError, Result};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_MAGIC: &[u8] = b"PK\x05\x06";
const GZIP_MAGIC: &[u8] = b"\x1F\x8B";
const SEVEN_ZIP_MAGIC: &[u8] = b"7z\xBC\xAF\x27\x1C";

/// Archive formats the extractors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    Gzip,
    TarGzip,
    SevenZip,
}

impl ArchiveFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::Gzip => "gz",
            ArchiveFormat::TarGzip => "tar.gz",
            ArchiveFormat::SevenZip => "7z",
        }
    }

    /// Drop the archive suffix from a file name: `photos.tar.gz` -> `photos`.
    ///
    /// Returns the name unchanged if it has no recognised suffix, or if
    /// stripping would leave nothing.
    pub fn strip_suffix(file_name: &str) -> &str {
        const SUFFIXES: [&str; 6] = [".tar.gz", ".tgz", ".gz", ".zip", ".tar", ".7z"];
        let lower = file_name.to_ascii_lowercase();
        SUFFIXES
            .iter()
            .find(|s| lower.ends_with(*s))
            .map(|s| &file_name[..file_name.len() - s.len()])
            .filter(|base| !base.is_empty())
            .unwrap_or(file_name)
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify `data` named `name`. Magic bytes win over the extension.
pub fn detect_format(name: &str, data: &[u8]) -> Result<ArchiveFormat> {
    let lower = name.to_ascii_lowercase();
    let tar_gz_name = lower.ends_with(".tar.gz") || lower.ends_with(".tgz");

    if data.starts_with(ZIP_MAGIC) || data.starts_with(ZIP_EMPTY_MAGIC) {
        return Ok(ArchiveFormat::Zip);
    }
    if data.starts_with(GZIP_MAGIC) {
        return Ok(if tar_gz_name {
            ArchiveFormat::TarGzip
        } else {
            ArchiveFormat::Gzip
        });
    }
    if data.starts_with(SEVEN_ZIP_MAGIC) {
        return Ok(ArchiveFormat::SevenZip);
    }

    if lower.ends_with(".tar") {
        Ok(ArchiveFormat::Tar)
    } else if tar_gz_name {
        Ok(ArchiveFormat::TarGzip)
    } else {
        Err(ExtractError::UnsupportedFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_wins_over_extension() {
        let data = [0x50, 0x4B, 0x03, 0x04, 0x14, 0x00];
        assert_eq!(detect_format("data.bin", &data).unwrap(), ArchiveFormat::Zip);
    }

    #[test]
    fn empty_zip_is_zip() {
        let mut data = vec![0u8; 22];
        data[..4].copy_from_slice(b"PK\x05\x06");
        assert_eq!(detect_format("e.zip", &data).unwrap(), ArchiveFormat::Zip);
    }

    #[test]
    fn gzip_disambiguated_by_name() {
        let data = [0x1F, 0x8B, 0x08, 0x00];
        assert_eq!(
            detect_format("archive.tgz", &data).unwrap(),
            ArchiveFormat::TarGzip
        );
        assert_eq!(
            detect_format("archive.TAR.GZ", &data).unwrap(),
            ArchiveFormat::TarGzip
        );
        assert_eq!(detect_format("file.gz", &data).unwrap(), ArchiveFormat::Gzip);
        assert_eq!(detect_format("noext", &data).unwrap(), ArchiveFormat::Gzip);
    }

    #[test]
    fn seven_zip_magic() {
        let data = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
        assert_eq!(
            detect_format("x.bin", &data).unwrap(),
            ArchiveFormat::SevenZip
        );
    }

    #[test]
    fn extension_fallback() {
        let data = [0u8; 512];
        assert_eq!(detect_format("a.tar", &data).unwrap(), ArchiveFormat::Tar);
        assert_eq!(
            detect_format("a.tar.gz", &data).unwrap(),
            ArchiveFormat::TarGzip
        );
    }

    #[test]
    fn unknown_format() {
        let data = [0xDE, 0xAD, 0xBE, 0xEF];
        assert!(matches!(
            detect_format("a.rar", &data),
            Err(ExtractError::UnsupportedFormat)
        ));
        assert!(matches!(
            detect_format("", &[]),
            Err(ExtractError::UnsupportedFormat)
        ));
    }

    #[test]
    fn strip_archive_suffix() {
        assert_eq!(ArchiveFormat::strip_suffix("photos.tar.gz"), "photos");
        assert_eq!(ArchiveFormat::strip_suffix("Photos.TGZ"), "Photos");
        assert_eq!(ArchiveFormat::strip_suffix("a.zip"), "a");
        assert_eq!(ArchiveFormat::strip_suffix("readme.md"), "readme.md");
        assert_eq!(ArchiveFormat::strip_suffix(".zip"), ".zip");
    }
}
