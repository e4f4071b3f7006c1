//! Format dispatch: detect once, then hand the bytes to one extractor.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::detect::{ArchiveFormat, detect_format};
use crate::entry::ArchiveEntry;
use crate::error::Result;
use crate::gzip;
use crate::io::MemoryReader;
use crate::sevenz::{self, CommandEngine, SevenZipExtractor};
use crate::tar;
use crate::zip::ZipExtractor;

/// Knobs for extraction. Only the 7z engine is configurable today.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Explicit 7z executable; otherwise `7zz`, `7z`, `7za` are looked up on `PATH`.
    pub seven_zip_program: Option<PathBuf>,
    /// Upper bound on one 7z engine run.
    pub seven_zip_timeout: Duration,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            seven_zip_program: None,
            seven_zip_timeout: sevenz::DEFAULT_TIMEOUT,
        }
    }
}

/// One archive format's decoder.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, name: &str, data: Arc<[u8]>) -> Result<Vec<ArchiveEntry>>;
}

struct ZipArchive;
struct TarArchive;
struct GzipFile;
struct TarGzipArchive;

#[async_trait]
impl Extractor for ZipArchive {
    async fn extract(&self, _name: &str, data: Arc<[u8]>) -> Result<Vec<ArchiveEntry>> {
        ZipExtractor::new(Arc::new(MemoryReader::new(data)))
            .extract_all()
            .await
    }
}

#[async_trait]
impl Extractor for TarArchive {
    async fn extract(&self, _name: &str, data: Arc<[u8]>) -> Result<Vec<ArchiveEntry>> {
        tar::extract_tar(&data)
    }
}

#[async_trait]
impl Extractor for GzipFile {
    async fn extract(&self, name: &str, data: Arc<[u8]>) -> Result<Vec<ArchiveEntry>> {
        gzip::extract_gzip(name, &data)
    }
}

#[async_trait]
impl Extractor for TarGzipArchive {
    async fn extract(&self, _name: &str, data: Arc<[u8]>) -> Result<Vec<ArchiveEntry>> {
        gzip::extract_tar_gzip(&data)
    }
}

#[async_trait]
impl Extractor for SevenZipExtractor {
    async fn extract(&self, _name: &str, data: Arc<[u8]>) -> Result<Vec<ArchiveEntry>> {
        self.extract_bytes(&data).await
    }
}

impl ArchiveFormat {
    /// The extractor for this format.
    pub fn extractor(self, options: &ExtractOptions) -> Box<dyn Extractor> {
        match self {
            ArchiveFormat::Zip => Box::new(ZipArchive),
            ArchiveFormat::Tar => Box::new(TarArchive),
            ArchiveFormat::Gzip => Box::new(GzipFile),
            ArchiveFormat::TarGzip => Box::new(TarGzipArchive),
            ArchiveFormat::SevenZip => Box::new(SevenZipExtractor::new(Arc::new(
                CommandEngine::new(
                    options.seven_zip_program.clone(),
                    options.seven_zip_timeout,
                ),
            ))),
        }
    }
}

/// Decode `data` named `name` with default options.
pub async fn extract(name: &str, data: impl Into<Arc<[u8]>>) -> Result<Vec<ArchiveEntry>> {
    extract_with(name, data, &ExtractOptions::default()).await
}

/// Decode `data` named `name`.
///
/// Either every entry is returned, or an error and nothing else.
pub async fn extract_with(
    name: &str,
    data: impl Into<Arc<[u8]>>,
    options: &ExtractOptions,
) -> Result<Vec<ArchiveEntry>> {
    let data = data.into();
    let format = detect_format(name, &data)?;
    log::debug!("{}: detected {} ({} bytes)", name, format, data.len());

    let entries = format.extractor(options).extract(name, data).await?;
    log::info!("{}: extracted {} entries as {}", name, entries.len(), format);
    Ok(entries)
}
