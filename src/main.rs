//! Main entry point for the arcscope CLI application.
//!
//! This binary opens an archive, prints its contents as a tree and can
//! re-bundle a subset of its files into a new ZIP archive, pipe them to
//! stdout or save them one by one.

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncWriteExt;

use arcscope::tree::walk;
use arcscope::{
    ArchiveEntry, Cli, LoadedArchive, Selection, Session, TreeNode, bundle, directory_state,
    expand_directory_toggle, find, flatten_files, format_bytes, selected_entries, selected_size,
};

/// Application entry point.
///
/// Parses command-line arguments, sets up logging, then loads the archive
/// and dispatches to listing, bundling and file output.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let name = cli
        .file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .context("archive path has no file name")?;
    let bytes = tokio::fs::read(&cli.file)
        .await
        .with_context(|| format!("cannot read {}", cli.file.display()))?;

    let session = Session::new();
    session
        .load(&name, bytes, &cli.extract_options())
        .await
        .with_context(|| format!("cannot open {}", name))?;
    let archive = session.current().context("no archive loaded")?;

    process_archive(&archive, &cli).await
}

/// Select files, then list, bundle, pipe or save them based on CLI options.
///
/// # Arguments
///
/// * `archive` - The loaded archive
/// * `cli` - Parsed command-line arguments
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if bundling or writing fails.
async fn process_archive(archive: &LoadedArchive, cli: &Cli) -> Result<()> {
    let tree = archive.tree();
    let files = flatten_files(&tree);
    let selection = select(&tree, &files, cli);

    if cli.is_list() {
        let marked = !cli.patterns.is_empty() || !cli.exclude.is_empty();
        print_tree(&tree, &selection, marked);
        if !cli.is_quiet() {
            println!(
                "\n{} files, {} ({} selected, {})",
                files.len(),
                format_bytes(files.iter().map(|e| e.size).sum()),
                selection.len(),
                format_bytes(selected_size(&files, &selection))
            );
        }
    }

    if let Some(output) = cli.output_path() {
        let picked = selected_entries(&files, &selection);
        let zip = bundle(&picked).context("cannot bundle selection")?;
        tokio::fs::write(&output, &zip)
            .await
            .with_context(|| format!("cannot write {}", output.display()))?;

        if !cli.is_quiet() {
            println!(
                "  bundled: {} files ({}) -> {}",
                picked.len(),
                format_bytes(zip.len() as u64),
                output.display()
            );
        }
    }

    if cli.pipe {
        pipe_files(archive, &selection).await?;
    }
    if let Some(dir) = &cli.save_dir {
        save_files(archive, &selection, dir, cli.is_quiet()).await?;
    }

    Ok(())
}

/// Write the contents of every selected file to stdout.
///
/// When more than one file is selected, each is preceded by a
/// `--- path ---` marker line.
async fn pipe_files(archive: &LoadedArchive, selection: &Selection) -> Result<()> {
    let picked: Vec<_> = selection.iter().filter_map(|p| archive.file(p)).collect();
    let show_path = picked.len() > 1;

    let mut stdout = tokio::io::stdout();
    for entry in picked {
        if show_path {
            stdout
                .write_all(format!("--- {} ---\n", entry.path).as_bytes())
                .await?;
        }
        stdout
            .write_all(entry.data.as_deref().unwrap_or_default())
            .await?;
    }
    stdout.flush().await?;
    Ok(())
}

/// Save every selected file into `dir` under its own file name.
///
/// Existing files are never overwritten; they are skipped with a notice.
///
/// # Arguments
///
/// * `archive` - The loaded archive
/// * `selection` - Selected file paths
/// * `dir` - Target directory, created if missing
/// * `quiet` - Suppress progress messages
///
/// # Returns
///
/// The paths written, in selection order.
async fn save_files(
    archive: &LoadedArchive,
    selection: &Selection,
    dir: &std::path::Path,
    quiet: bool,
) -> Result<Vec<std::path::PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("cannot create {}", dir.display()))?;

    let mut written = Vec::new();
    for entry in selection.iter().filter_map(|p| archive.file(p)) {
        if entry.name == "." || entry.name == ".." {
            log::warn!("skipping '{}': unusable file name", entry.path);
            continue;
        }
        let target = dir.join(&entry.name);
        if tokio::fs::try_exists(&target).await? {
            if !quiet {
                eprintln!("Skipping: {} (file exists)", target.display());
            }
            continue;
        }

        if !quiet {
            println!("  saving: {} -> {}", entry.path, target.display());
        }
        tokio::fs::write(&target, entry.data.as_deref().unwrap_or_default())
            .await
            .with_context(|| format!("cannot write {}", target.display()))?;
        written.push(target);
    }
    Ok(written)
}

/// Resolve the positional patterns and `-x` exclusions into a selection.
///
/// Each pattern is tried as a directory path first (selecting every file
/// below it), then as an exact path or basename, then as a glob.
/// With no patterns every file is selected.
///
/// # Arguments
///
/// * `tree` - Top-level nodes of the archive tree
/// * `files` - Every file entry in tree order
/// * `cli` - Parsed command-line arguments
///
/// # Returns
///
/// The set of selected file paths.
fn select(tree: &[TreeNode<'_>], files: &[&ArchiveEntry], cli: &Cli) -> Selection {
    let mut selection = Selection::new();

    if cli.patterns.is_empty() {
        selection.extend(files.iter().map(|e| e.path.clone()));
    }

    for pattern in &cli.patterns {
        let trimmed = pattern.trim_matches('/');
        if let Some(dir) = find(tree, trimmed).filter(|n| n.is_directory) {
            selection = expand_directory_toggle(dir, true).apply(&selection);
            continue;
        }
        selection.extend(
            files
                .iter()
                .filter(|e| matches_pattern(pattern, e))
                .map(|e| e.path.clone()),
        );
    }

    // Exclude files matching the -x patterns
    selection.retain(|path| {
        !cli.exclude
            .iter()
            .any(|x| path.contains(x.as_str()) || glob_match(x, path))
    });

    selection
}

/// Check a single pattern against a file entry.
///
/// # Arguments
///
/// * `pattern` - Glob, full path or bare file name
/// * `entry` - The file entry to test
///
/// # Returns
///
/// Returns `true` if the entry matches.
fn matches_pattern(pattern: &str, entry: &ArchiveEntry) -> bool {
    if has_glob_chars(pattern) {
        // Pattern contains wildcards: use glob matching
        glob_match(pattern, &entry.path)
    } else {
        // No wildcards: exact match on the path or the file name
        entry.path == pattern || entry.name == pattern
    }
}

/// Print the tree with sizes, one node per line, indented by depth.
fn print_tree(tree: &[TreeNode<'_>], selection: &Selection, marked: bool) {
    for line in tree_lines(tree, selection, marked) {
        println!("{}", line);
    }
}

/// Render the tree listing.
///
/// With `marked`, every name is preceded by a checkbox: `[x]` selected,
/// `[ ]` not selected, `[-]` for a partially selected directory. The
/// checkbox sits after the indent so nested marks line up under their
/// parent's name.
fn tree_lines(tree: &[TreeNode<'_>], selection: &Selection, marked: bool) -> Vec<String> {
    walk(tree)
        .map(|node| {
            let depth = node.path.matches('/').count();
            let indent = "  ".repeat(depth);

            let mark = if !marked {
                ""
            } else if node.is_directory {
                let state = directory_state(node, selection);
                match (state.checked, state.indeterminate) {
                    (true, _) => "[x] ",
                    (_, true) => "[-] ",
                    _ => "[ ] ",
                }
            } else if selection.contains(&node.path) {
                "[x] "
            } else {
                "[ ] "
            };

            if node.is_directory {
                format!("{}{}{}/", indent, mark, node.name)
            } else {
                format!("{}{}{}  ({})", indent, mark, node.name, format_bytes(node.size))
            }
        })
        .collect()
}

/// Check if a pattern contains glob wildcard characters.
///
/// # Arguments
///
/// * `pattern` - The pattern to check
///
/// # Returns
///
/// Returns `true` if the pattern contains `*` or `?` wildcards.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters, including `/`
/// - `?` matches exactly one character
///
/// # Arguments
///
/// * `pattern` - The glob pattern to match against
/// * `text` - The archive path to check
///
/// # Returns
///
/// Returns `true` if the text matches the pattern, `false` otherwise.
///
/// # Examples
///
/// ```ignore
/// assert!(glob_match("*.png", "photos/cat.png"));
/// assert!(glob_match("img??.jpg", "img01.jpg"));
/// assert!(!glob_match("*.png", "notes.txt"));
/// ```
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    // Iterative backtracking: remember the last `*` and retry one char further.
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}
