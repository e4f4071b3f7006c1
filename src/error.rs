use std::io;

/// Errors produced while turning raw bytes into archive entries.
///
/// Extraction is all-or-nothing: any of these means no entries were produced.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported archive format")]
    UnsupportedFormat,

    #[error("archive is corrupted: {reason}")]
    CorruptArchive { reason: String },

    #[error("7z engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    #[error("7z extraction failed: {reason}")]
    ExtractionFailed { reason: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ExtractError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptArchive {
            reason: reason.into(),
        }
    }
}

/// Errors produced while packaging a selection into a new zip.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("nothing selected to bundle")]
    EmptySelection,

    #[error("'{path}' is too large to bundle ({size} bytes)")]
    EntryTooLarge { path: String, size: u64 },

    #[error("too many entries to bundle ({count})")]
    TooManyEntries { count: usize },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T, E = ExtractError> = std::result::Result<T, E>;
