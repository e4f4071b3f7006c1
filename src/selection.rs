//! Tri-state selection queries.
//!
//! The selection itself belongs to the caller. Everything here reads a
//! snapshot and returns new values; nothing mutates a selection in place.

use std::collections::BTreeSet;

use crate::entry::ArchiveEntry;
use crate::tree::TreeNode;

/// Selected file paths. Directories are never members.
pub type Selection = BTreeSet<String>;

/// Checkbox state derived for a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectoryState {
    pub checked: bool,
    pub indeterminate: bool,
}

impl DirectoryState {
    pub const UNCHECKED: Self = Self {
        checked: false,
        indeterminate: false,
    };
    pub const CHECKED: Self = Self {
        checked: true,
        indeterminate: false,
    };
    pub const INDETERMINATE: Self = Self {
        checked: false,
        indeterminate: true,
    };
}

/// State of `node` given how many of its files are in `selected`.
pub fn directory_state(node: &TreeNode<'_>, selected: &Selection) -> DirectoryState {
    let files = node.file_paths();
    let picked = files.iter().filter(|p| selected.contains(**p)).count();

    match (picked, files.len()) {
        (_, 0) | (0, _) => DirectoryState::UNCHECKED,
        (picked, total) if picked == total => DirectoryState::CHECKED,
        _ => DirectoryState::INDETERMINATE,
    }
}

/// Paths to add to or remove from a selection, applied as one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionChange {
    pub checked: bool,
    pub paths: Vec<String>,
}

impl SelectionChange {
    /// The selection after this change; `selection` itself is untouched.
    pub fn apply(&self, selection: &Selection) -> Selection {
        let mut next = selection.clone();
        if self.checked {
            next.extend(self.paths.iter().cloned());
        } else {
            for path in &self.paths {
                next.remove(path);
            }
        }
        next
    }
}

/// Every file below `node`, to be added (`checked`) or removed.
pub fn expand_directory_toggle(node: &TreeNode<'_>, checked: bool) -> SelectionChange {
    SelectionChange {
        checked,
        paths: node.file_paths().into_iter().map(str::to_string).collect(),
    }
}

/// Selection with one file switched on or off.
pub fn toggle_file(selection: &Selection, path: &str, checked: bool) -> Selection {
    SelectionChange {
        checked,
        paths: vec![path.to_string()],
    }
    .apply(selection)
}

/// Entries from `files` whose path is selected, in `files` order.
pub fn selected_entries<'a>(files: &[&'a ArchiveEntry], selected: &Selection) -> Vec<&'a ArchiveEntry> {
    files
        .iter()
        .copied()
        .filter(|e| !e.is_directory && selected.contains(&e.path))
        .collect()
}

/// Total size in bytes of the selected entries.
pub fn selected_size(files: &[&ArchiveEntry], selected: &Selection) -> u64 {
    selected_entries(files, selected).iter().map(|e| e.size).sum()
}
