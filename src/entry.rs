//! The flat record every extractor produces.

use std::collections::{HashMap, HashSet};

use crate::error::{ExtractError, Result};

/// One decoded file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Forward-slash path with no leading or trailing slash. Unique per archive.
    pub path: String,
    /// Last segment of `path`.
    pub name: String,
    pub is_directory: bool,
    /// Size in bytes, 0 for directories.
    pub size: u64,
    /// File contents. Always `None` for directories.
    pub data: Option<Vec<u8>>,
    pub mime_type: Option<&'static str>,
}

impl ArchiveEntry {
    /// Build a file entry. `path` must already be normalized.
    pub fn file(path: String, data: Vec<u8>) -> Self {
        let name = last_segment(&path).to_string();
        let mime_type = guess_mime_type(&name);
        Self {
            path,
            name,
            is_directory: false,
            size: data.len() as u64,
            data: Some(data),
            mime_type,
        }
    }

    /// Build a directory entry. `path` must already be normalized.
    pub fn directory(path: String) -> Self {
        let name = last_segment(&path).to_string();
        Self {
            path,
            name,
            is_directory: true,
            size: 0,
            data: None,
            mime_type: None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.is_some_and(|m| m.starts_with("image/"))
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Normalize an archive-internal name into an entry path.
///
/// Backslashes become `/`, leading and trailing slashes are dropped.
/// Returns `None` when nothing is left.
pub fn normalize_path(raw: &str) -> Option<String> {
    let path = raw.replace('\\', "/");
    let path = path.trim_start_matches('/').trim_end_matches('/');
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// MIME type for the handful of formats a preview can render.
pub fn guess_mime_type(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "avif" => Some("image/avif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// Add a zero-size directory entry for every ancestor path not already present.
pub fn ensure_parents(entries: &mut Vec<ArchiveEntry>) {
    let mut existing: HashSet<String> = entries.iter().map(|e| e.path.clone()).collect();
    let mut synthesized = Vec::new();

    for entry in entries.iter() {
        let mut end = 0;
        while let Some(pos) = entry.path[end..].find('/') {
            end += pos;
            let parent = &entry.path[..end];
            if existing.insert(parent.to_string()) {
                synthesized.push(ArchiveEntry::directory(parent.to_string()));
            }
            end += 1;
        }
    }

    if !synthesized.is_empty() {
        log::trace!("synthesized {} parent directories", synthesized.len());
    }
    entries.extend(synthesized);
}

/// Collapse repeated paths, keeping the last record at the first record's position.
pub fn dedup_paths(entries: Vec<ArchiveEntry>) -> Vec<ArchiveEntry> {
    let mut index: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    let mut out: Vec<ArchiveEntry> = Vec::with_capacity(entries.len());

    for entry in entries {
        match index.get(&entry.path) {
            Some(&i) => out[i] = entry,
            None => {
                index.insert(entry.path.clone(), out.len());
                out.push(entry);
            }
        }
    }
    out
}

/// Fail if a file path is also the parent of another entry.
///
/// Such a list cannot form a tree: `a` would be both a file and a directory.
pub fn check_conflicts(entries: &[ArchiveEntry]) -> Result<()> {
    let files: HashSet<&str> = entries
        .iter()
        .filter(|e| !e.is_directory)
        .map(|e| e.path.as_str())
        .collect();

    for entry in entries {
        let mut end = 0;
        while let Some(pos) = entry.path[end..].find('/') {
            end += pos;
            let parent = &entry.path[..end];
            if files.contains(parent) {
                log::warn!("'{}' is a file but also the parent of '{}'", parent, entry.path);
                return Err(ExtractError::corrupt(format!(
                    "'{}' is both a file and a directory",
                    parent
                )));
            }
            end += 1;
        }
    }
    Ok(())
}

/// Dedup, reject file/directory clashes, then synthesize parents: the last
/// step of every extractor.
pub(crate) fn finalize(entries: Vec<ArchiveEntry>) -> Result<Vec<ArchiveEntry>> {
    let mut entries = dedup_paths(entries);
    check_conflicts(&entries)?;
    ensure_parents(&mut entries);
    Ok(entries)
}
