use flate2::read::DeflateDecoder;
use std::io::{self, Read};
use std::sync::Arc;
use tokio::task::JoinSet;

use crate::entry::{self, ArchiveEntry};
use crate::error::{ExtractError, Result};
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Upper bound on the buffer reserved up front for one inflated entry.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

/// ZIP file extractor
pub struct ZipExtractor<R: ReadAt> {
    parser: Arc<ZipParser<R>>,
}

impl<R: ReadAt> Clone for ZipExtractor<R> {
    fn clone(&self) -> Self {
        Self {
            parser: Arc::clone(&self.parser),
        }
    }
}

impl<R: ReadAt + 'static> ZipExtractor<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            parser: Arc::new(ZipParser::new(reader)),
        }
    }

    /// List all entries in the archive
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        self.parser.list_files().await
    }

    /// Extract file data to memory, verifying length and CRC-32.
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        let data_offset = self.parser.get_data_offset(entry).await?;

        let in_bounds = data_offset
            .checked_add(entry.compressed_size)
            .is_some_and(|end| end <= self.parser.reader().size());
        if !in_bounds {
            return Err(ExtractError::corrupt(format!(
                "data for '{}' runs past the end of the archive",
                entry.file_name
            )));
        }

        let mut compressed = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut compressed)
            .await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => compressed,
            CompressionMethod::Deflate => inflate(&compressed, entry.uncompressed_size)
                .map_err(|e| {
                    ExtractError::corrupt(format!(
                        "failed to inflate '{}': {}",
                        entry.file_name, e
                    ))
                })?,
            CompressionMethod::Unknown(method) => {
                return Err(ExtractError::corrupt(format!(
                    "unsupported compression method {} for '{}'",
                    method, entry.file_name
                )));
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            return Err(ExtractError::corrupt(format!(
                "'{}' decoded to {} bytes, expected {}",
                entry.file_name,
                data.len(),
                entry.uncompressed_size
            )));
        }
        if crc32fast::hash(&data) != entry.crc32 {
            return Err(ExtractError::corrupt(format!(
                "CRC mismatch for '{}'",
                entry.file_name
            )));
        }

        Ok(data)
    }

    /// Decode every entry in the archive, in central directory order.
    ///
    /// File entries are decoded as concurrent tasks; the first failure aborts
    /// the rest and no entries are returned.
    pub async fn extract_all(&self) -> Result<Vec<ArchiveEntry>> {
        let files = self.list_files().await?;
        let mut slots: Vec<Option<ArchiveEntry>> = Vec::with_capacity(files.len());
        let mut tasks = JoinSet::new();

        for file in files {
            let Some(path) = entry::normalize_path(&file.file_name) else {
                continue;
            };
            if file.is_directory {
                slots.push(Some(ArchiveEntry::directory(path)));
                continue;
            }

            let index = slots.len();
            slots.push(None);
            let extractor = self.clone();
            tasks.spawn(async move {
                let data = extractor.extract_to_memory(&file).await?;
                Ok::<_, ExtractError>((index, ArchiveEntry::file(path, data)))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (index, entry) = joined.map_err(|e| ExtractError::Io(io::Error::other(e)))??;
            slots[index] = Some(entry);
        }

        entry::finalize(slots.into_iter().flatten().collect())
    }
}

fn inflate(compressed: &[u8], expected: u64) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected.min(MAX_PREALLOC) as usize);
    // One byte of slack so an overlong stream is caught by the length check.
    DeflateDecoder::new(compressed)
        .take(expected.saturating_add(1))
        .read_to_end(&mut out)?;
    Ok(out)
}
