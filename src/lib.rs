//! # arcscope
//!
//! Look inside archives without unpacking them to disk.
//!
//! This library decodes an archive held in memory into a flat list of
//! entries, arranges those entries as a browsable tree, tracks which files
//! are selected, and re-bundles a selection as a fresh ZIP archive.
//!
//! ## Features
//!
//! - ZIP (STORED and DEFLATE, ZIP64 aware), TAR (ustar, GNU long names, pax
//!   paths), GZIP, TAR+GZIP
//! - 7z through an external `7z` executable run in a scratch directory
//! - Format detection by magic bytes with an extension fallback
//! - Tri-state directory selection and ZIP export of selected files
//!
//! ## Example
//!
//! ```no_run
//! use arcscope::{build_tree, bundle, expand_directory_toggle, extract, find, Selection};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bytes = tokio::fs::read("photos.tar.gz").await?;
//!     let entries = extract("photos.tar.gz", bytes).await?;
//!
//!     let tree = build_tree(&entries);
//!     if let Some(dir) = find(&tree, "holiday") {
//!         let selection = expand_directory_toggle(dir, true).apply(&Selection::new());
//!         let picked: Vec<_> = entries
//!             .iter()
//!             .filter(|e| selection.contains(&e.path))
//!             .collect();
//!         tokio::fs::write("holiday.zip", bundle(&picked)?).await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod cli;
pub mod detect;
pub mod entry;
pub mod error;
pub mod extract;
pub mod format;
pub mod gzip;
pub mod io;
pub mod selection;
pub mod session;
pub mod sevenz;
pub mod tar;
pub mod tree;
pub mod zip;

pub use bundle::bundle;
pub use cli::Cli;
pub use detect::{ArchiveFormat, detect_format};
pub use entry::ArchiveEntry;
pub use error::{BundleError, ExtractError};
pub use extract::{ExtractOptions, Extractor, extract, extract_with};
pub use format::format_bytes;
pub use io::{MemoryReader, ReadAt};
pub use selection::{
    DirectoryState, Selection, SelectionChange, directory_state, expand_directory_toggle,
    selected_entries, selected_size, toggle_file,
};
pub use session::{LoadOutcome, LoadedArchive, Session};
pub use sevenz::{CommandEngine, SevenZipEngine, SevenZipExtractor};
pub use tree::{TreeNode, build_tree, find, flatten_files};
pub use zip::{ZipExtractor, ZipFileEntry, ZipWriter};
