//! The "current archive" a front end is looking at.
//!
//! Loads may overlap: a user can pick a second archive while the first is
//! still extracting. Every load takes a generation ticket up front and only
//! the holder of the newest ticket may publish its result. Older results are
//! dropped on arrival.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::bundle::bundle;
use crate::detect::ArchiveFormat;
use crate::entry::ArchiveEntry;
use crate::error::{BundleError, Result};
use crate::extract::{ExtractOptions, extract_with};
use crate::selection::{self, Selection};
use crate::tree::{self, TreeNode};

/// What happened to a load once its extraction finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The archive is now current.
    Loaded { entries: usize },
    /// A newer load started first; this result was discarded.
    Superseded,
}

/// A successfully loaded archive and the view state that goes with it.
#[derive(Debug, Clone)]
pub struct LoadedArchive {
    pub name: String,
    pub entries: Arc<[ArchiveEntry]>,
    pub selection: Selection,
    /// Directory paths currently shown open.
    pub expanded: BTreeSet<String>,
}

impl LoadedArchive {
    fn new(name: String, entries: Vec<ArchiveEntry>) -> Self {
        let entries: Arc<[ArchiveEntry]> = entries.into();
        let expanded = tree::directory_paths(&tree::build_tree(&entries))
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            name,
            entries,
            selection: Selection::new(),
            expanded,
        }
    }

    pub fn tree(&self) -> Vec<TreeNode<'_>> {
        tree::build_tree(&self.entries)
    }

    /// The file at `path`, if it exists and carries data.
    pub fn file(&self, path: &str) -> Option<&ArchiveEntry> {
        self.entries
            .iter()
            .find(|e| !e.is_directory && e.data.is_some() && e.path == path)
    }

    /// Image files with data, in tree order.
    pub fn images(&self) -> Vec<&ArchiveEntry> {
        let tree = self.tree();
        tree::flatten_files(&tree)
            .into_iter()
            .filter(|e| e.is_image() && e.data.is_some())
            .collect()
    }

    /// Total size of the selected files.
    pub fn selected_size(&self) -> u64 {
        let tree = self.tree();
        selection::selected_size(&tree::flatten_files(&tree), &self.selection)
    }

    /// File name offered for the bundle: `photos.tar.gz` -> `photos-selected.zip`.
    pub fn bundle_name(&self) -> String {
        format!("{}-selected.zip", ArchiveFormat::strip_suffix(&self.name))
    }

    /// Zip the selected files, in tree order.
    pub fn bundle_selected(&self) -> Result<Vec<u8>, BundleError> {
        let tree = self.tree();
        let picked = selection::selected_entries(&tree::flatten_files(&tree), &self.selection);
        bundle(&picked)
    }
}

#[derive(Debug, Default)]
struct State {
    generation: u64,
    current: Option<LoadedArchive>,
}

/// Holds at most one loaded archive.
#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<State>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract `data` and make it the current archive, unless a newer load
    /// overtakes it.
    ///
    /// A failure that is still current clears the session, so stale entries
    /// are never shown next to an error.
    pub async fn load(
        &self,
        name: &str,
        data: impl Into<Arc<[u8]>>,
        options: &ExtractOptions,
    ) -> Result<LoadOutcome> {
        let ticket = self.begin();
        let result = extract_with(name, data, options).await;
        self.commit(ticket, name, result)
    }

    fn begin(&self) -> u64 {
        let mut state = self.state.lock();
        state.generation += 1;
        state.generation
    }

    fn commit(
        &self,
        ticket: u64,
        name: &str,
        result: Result<Vec<ArchiveEntry>>,
    ) -> Result<LoadOutcome> {
        let mut state = self.state.lock();
        if ticket != state.generation {
            log::debug!("{}: discarding superseded load #{}", name, ticket);
            return Ok(LoadOutcome::Superseded);
        }

        match result {
            Ok(entries) => {
                let count = entries.len();
                state.current = Some(LoadedArchive::new(name.to_string(), entries));
                Ok(LoadOutcome::Loaded { entries: count })
            }
            Err(e) => {
                state.current = None;
                Err(e)
            }
        }
    }

    /// Drop the current archive and invalidate any load in flight.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.current = None;
    }

    /// Snapshot of the current archive.
    pub fn current(&self) -> Option<LoadedArchive> {
        self.state.lock().current.clone()
    }

    pub fn selection(&self) -> Selection {
        self.state
            .lock()
            .current
            .as_ref()
            .map(|a| a.selection.clone())
            .unwrap_or_default()
    }

    pub fn toggle_file(&self, path: &str, checked: bool) {
        self.update(|archive| {
            archive.selection = selection::toggle_file(&archive.selection, path, checked);
        });
    }

    /// Select or deselect every file below the directory at `path`.
    pub fn toggle_directory(&self, path: &str, checked: bool) {
        self.update(|archive| {
            let tree = archive.tree();
            let Some(node) = tree::find(&tree, path) else {
                return;
            };
            let next = selection::expand_directory_toggle(node, checked).apply(&archive.selection);
            drop(tree);
            archive.selection = next;
        });
    }

    pub fn clear_selection(&self) {
        self.update(|archive| archive.selection.clear());
    }

    /// Open or close a directory in the view.
    pub fn toggle_expanded(&self, path: &str) {
        self.update(|archive| {
            if !archive.expanded.remove(path) {
                archive.expanded.insert(path.to_string());
            }
        });
    }

    fn update(&self, f: impl FnOnce(&mut LoadedArchive)) {
        if let Some(archive) = self.state.lock().current.as_mut() {
            f(archive);
        }
    }
}
