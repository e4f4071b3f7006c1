//! 7z support through an external engine.
//!
//! The rest of the crate only sees [`SevenZipEngine::decompress`]. The default
//! [`CommandEngine`] runs the `7z` executable against a private scratch
//! directory: the input is written there, the engine extracts into a fresh
//! output directory beside it, and the output tree is read back as entries.
//! The scratch directory is removed when extraction finishes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use walkdir::WalkDir;

use crate::entry::{self, ArchiveEntry};
use crate::error::{ExtractError, Result};

/// Executables tried, in order, when no engine path is configured.
const ENGINE_NAMES: [&str; 3] = ["7zz", "7z", "7za"];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// An opaque 7z decoder.
#[async_trait]
pub trait SevenZipEngine: Send + Sync {
    /// Decode a whole 7z archive into entries.
    async fn decompress(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>>;
}

/// Runs a native `7z` executable inside a throwaway directory.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: Option<PathBuf>,
    timeout: Duration,
}

impl Default for CommandEngine {
    fn default() -> Self {
        Self {
            program: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl CommandEngine {
    pub fn new(program: Option<PathBuf>, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    fn locate(&self) -> Result<PathBuf> {
        if let Some(program) = &self.program {
            return which::which(program).map_err(|e| ExtractError::EngineUnavailable {
                reason: format!("{}: {}", program.display(), e),
            });
        }
        ENGINE_NAMES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| ExtractError::EngineUnavailable {
                reason: format!("none of {} found on PATH", ENGINE_NAMES.join(", ")),
            })
    }

    async fn run(&self, program: &Path, input: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(program);
        command
            .arg("x")
            .arg(input)
            .arg(format!("-o{}", output.display()))
            .arg("-y")
            .arg("-bd")
            // Password prompts hit EOF, so protected archives fail fast.
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = command.spawn().map_err(|e| ExtractError::EngineUnavailable {
            reason: format!("failed to start {}: {}", program.display(), e),
        })?;

        let finished = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractError::ExtractionFailed {
                reason: format!("engine timed out after {:?}", self.timeout),
            })?;
        let finished = finished?;

        if !finished.status.success() {
            let stderr = String::from_utf8_lossy(&finished.stderr);
            let reason = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("engine exited with an error")
                .trim()
                .to_string();
            return Err(ExtractError::ExtractionFailed {
                reason: format!("{} ({})", reason, finished.status),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SevenZipEngine for CommandEngine {
    async fn decompress(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>> {
        let program = self.locate()?;

        let sandbox = tempfile::Builder::new()
            .prefix("arcscope-7z-")
            .tempdir()
            .map_err(|e| ExtractError::EngineUnavailable {
                reason: format!("cannot create scratch directory: {}", e),
            })?;
        let input = sandbox.path().join("input.7z");
        let output = sandbox.path().join("out");
        tokio::fs::write(&input, data).await?;
        tokio::fs::create_dir(&output).await?;

        log::debug!(
            "7z: running {} in {}",
            program.display(),
            sandbox.path().display()
        );
        self.run(&program, &input, &output).await?;

        let entries = read_tree(&output).await?;
        sandbox.close()?;
        Ok(entries)
    }
}

/// Turn an extracted directory into entries, relative to `root`.
///
/// Symlinks are skipped so nothing outside `root` is ever read.
async fn read_tree(root: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut files = Vec::new();
    let mut entries = Vec::new();

    for item in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let item = item.map_err(|e| ExtractError::Io(e.into()))?;
        let Ok(relative) = item.path().strip_prefix(root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let Some(path) = entry::normalize_path(&relative) else {
            continue;
        };

        let file_type = item.file_type();
        if file_type.is_dir() {
            entries.push(ArchiveEntry::directory(path));
        } else if file_type.is_file() {
            files.push((path, item.into_path()));
        }
    }

    for (path, on_disk) in files {
        let data = tokio::fs::read(&on_disk).await?;
        entries.push(ArchiveEntry::file(path, data));
    }

    entry::finalize(entries)
}

/// Adapter from raw 7z bytes to entries via a pluggable engine.
#[derive(Clone)]
pub struct SevenZipExtractor {
    engine: Arc<dyn SevenZipEngine>,
}

impl SevenZipExtractor {
    pub fn new(engine: Arc<dyn SevenZipEngine>) -> Self {
        Self { engine }
    }

    pub async fn extract_bytes(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>> {
        let entries = self.engine.decompress(data).await?;
        entry::finalize(entries)
    }
}

impl Default for SevenZipExtractor {
    fn default() -> Self {
        Self::new(Arc::new(CommandEngine::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine;

    #[async_trait]
    impl SevenZipEngine for FixedEngine {
        async fn decompress(&self, data: &[u8]) -> Result<Vec<ArchiveEntry>> {
            Ok(vec![ArchiveEntry::file("x/y/z.bin".to_string(), data.to_vec())])
        }
    }

    #[tokio::test]
    async fn adapter_synthesizes_parents() {
        let extractor = SevenZipExtractor::new(Arc::new(FixedEngine));
        let entries = extractor.extract_bytes(b"abc").await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].data.as_deref(), Some(&b"abc"[..]));
    }

    #[tokio::test]
    async fn missing_engine_is_unavailable() {
        let engine = CommandEngine::new(
            Some(PathBuf::from("/nonexistent/arcscope-7z-engine")),
            DEFAULT_TIMEOUT,
        );
        assert!(matches!(
            engine.decompress(b"7z").await,
            Err(ExtractError::EngineUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn reads_extracted_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("a/b")).unwrap();
        std::fs::write(dir.path().join("a/b/c.txt"), b"c").unwrap();
        std::fs::write(dir.path().join("top.png"), b"png").unwrap();

        let entries = read_tree(dir.path()).await.unwrap();
        let mut paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["a", "a/b", "a/b/c.txt", "top.png"]);

        let png = entries.iter().find(|e| e.path == "top.png").unwrap();
        assert_eq!(png.mime_type, Some("image/png"));
    }

    /// Engines stood in for by shell scripts that mimic `7z x`.
    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Instant;

        // Writing a script while another test forks can leave the file busy
        // (ETXTBSY) when it is executed; run these one at a time.
        static ENGINE_LOCK: parking_lot::Mutex<()> = parking_lot::const_mutex(());

        fn script(dir: &Path, body: &str, timeout: Duration) -> CommandEngine {
            let path = dir.join("fake-7z");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            CommandEngine::new(Some(path), timeout)
        }

        #[tokio::test]
        async fn failed_exit_is_extraction_failure() {
            let _guard = ENGINE_LOCK.lock();
            let dir = tempfile::tempdir().unwrap();
            let engine = script(
                dir.path(),
                "echo 'ERROR: Unsupported Method' >&2\nexit 2",
                DEFAULT_TIMEOUT,
            );

            match engine.decompress(b"7z").await {
                Err(ExtractError::ExtractionFailed { reason }) => {
                    assert!(reason.contains("Unsupported Method"), "{}", reason);
                }
                other => panic!("expected ExtractionFailed, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn slow_engine_is_cut_off() {
            let _guard = ENGINE_LOCK.lock();
            let dir = tempfile::tempdir().unwrap();
            let engine = script(dir.path(), "exec sleep 30", Duration::from_secs(1));

            let started = Instant::now();
            match engine.decompress(b"7z").await {
                Err(ExtractError::ExtractionFailed { reason }) => {
                    assert!(reason.contains("timed out"), "{}", reason);
                }
                other => panic!("expected ExtractionFailed, got {:?}", other),
            }
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn output_tree_skips_symlinks() {
            let _guard = ENGINE_LOCK.lock();
            let dir = tempfile::tempdir().unwrap();
            let engine = script(
                dir.path(),
                r#"[ "$1" = x ] && [ -f "$2" ] || exit 9
out="${3#-o}"
mkdir -p "$out/x/y"
printf z > "$out/x/y/z.txt"
ln -s /etc/passwd "$out/x/link""#,
                DEFAULT_TIMEOUT,
            );

            let entries = engine.decompress(b"7z").await.unwrap();
            let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
            assert_eq!(paths, vec!["x", "x/y", "x/y/z.txt"]);
            assert_eq!(entries[2].data.as_deref(), Some(&b"z"[..]));
        }
    }
}
