//! Hierarchical view over a flat entry list.

use std::cmp::Ordering;

use crate::entry::ArchiveEntry;

/// One node of the archive tree.
///
/// File nodes borrow the entry they were built from; directory nodes never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode<'a> {
    pub name: String,
    pub path: String,
    pub is_directory: bool,
    pub size: u64,
    /// Directories first, then files; each group by name.
    pub children: Vec<TreeNode<'a>>,
    pub entry: Option<&'a ArchiveEntry>,
}

impl<'a> TreeNode<'a> {
    fn directory(name: &str, path: String) -> Self {
        Self {
            name: name.to_string(),
            path,
            is_directory: true,
            size: 0,
            children: Vec::new(),
            entry: None,
        }
    }

    fn file(name: &str, entry: &'a ArchiveEntry) -> Self {
        Self {
            name: name.to_string(),
            path: entry.path.clone(),
            is_directory: false,
            size: entry.size,
            children: Vec::new(),
            entry: Some(entry),
        }
    }

    /// Paths of every file at or below this node.
    pub fn file_paths(&self) -> Vec<&str> {
        let mut paths = Vec::new();
        self.collect_file_paths(&mut paths);
        paths
    }

    fn collect_file_paths<'n>(&'n self, out: &mut Vec<&'n str>) {
        if let Some(entry) = self.entry {
            out.push(&entry.path);
        }
        for child in &self.children {
            child.collect_file_paths(out);
        }
    }

    /// Find the descendant at `path` (relative to the archive root).
    pub fn find(&self, path: &str) -> Option<&TreeNode<'a>> {
        if self.path == path {
            return Some(self);
        }
        let rest = path.strip_prefix(self.path.as_str())?.strip_prefix('/')?;
        let next = rest.split('/').next()?;
        self.children
            .iter()
            .filter(|c| c.name == next)
            .find_map(|c| c.find(path))
    }
}

/// Find a node anywhere under the given top-level nodes.
pub fn find<'n, 'a>(nodes: &'n [TreeNode<'a>], path: &str) -> Option<&'n TreeNode<'a>> {
    let first = path.split('/').next()?;
    nodes
        .iter()
        .filter(|n| n.name == first)
        .find_map(|n| n.find(path))
}

/// Build the tree from a finalized entry list and return the top-level nodes.
///
/// Missing intermediate directories are created on the fly, so the tree never
/// has orphaned files even if the list skipped parent synthesis.
pub fn build_tree(entries: &[ArchiveEntry]) -> Vec<TreeNode<'_>> {
    let mut root = TreeNode::directory("", String::new());

    for entry in entries.iter().filter(|e| e.is_directory) {
        let segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
        ensure_directory(&mut root, &segments);
    }

    for entry in entries.iter().filter(|e| !e.is_directory) {
        let mut segments: Vec<&str> = entry.path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(file_name) = segments.pop() else {
            continue;
        };
        let parent = ensure_directory(&mut root, &segments);
        parent.children.push(TreeNode::file(file_name, entry));
    }

    sort_nodes(&mut root.children);
    root.children
}

fn ensure_directory<'t, 'a>(root: &'t mut TreeNode<'a>, segments: &[&str]) -> &'t mut TreeNode<'a> {
    let mut current = root;
    for segment in segments {
        let index = match current
            .children
            .iter()
            .position(|c| c.is_directory && c.name == *segment)
        {
            Some(index) => index,
            None => {
                let path = if current.path.is_empty() {
                    segment.to_string()
                } else {
                    format!("{}/{}", current.path, segment)
                };
                current.children.push(TreeNode::directory(segment, path));
                current.children.len() - 1
            }
        };
        current = &mut current.children[index];
    }
    current
}

fn compare_nodes(a: &TreeNode<'_>, b: &TreeNode<'_>) -> Ordering {
    b.is_directory
        .cmp(&a.is_directory)
        .then_with(|| a.name.cmp(&b.name))
}

fn sort_nodes(nodes: &mut [TreeNode<'_>]) {
    nodes.sort_by(compare_nodes);
    for node in nodes {
        sort_nodes(&mut node.children);
    }
}

/// Depth-first, pre-order iterator over every node in a forest.
pub struct Walk<'n, 'a> {
    stack: Vec<&'n TreeNode<'a>>,
}

impl<'n, 'a> Iterator for Walk<'n, 'a> {
    type Item = &'n TreeNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

pub fn walk<'n, 'a>(nodes: &'n [TreeNode<'a>]) -> Walk<'n, 'a> {
    Walk {
        stack: nodes.iter().rev().collect(),
    }
}

/// Every file entry reachable from `nodes`, in tree order.
pub fn flatten_files<'a>(nodes: &[TreeNode<'a>]) -> Vec<&'a ArchiveEntry> {
    walk(nodes).filter_map(|n| n.entry).collect()
}

/// Every directory path in the forest, in tree order.
pub fn directory_paths<'n>(nodes: &'n [TreeNode<'_>]) -> Vec<&'n str> {
    walk(nodes)
        .filter(|n| n.is_directory)
        .map(|n| n.path.as_str())
        .collect()
}
