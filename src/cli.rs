use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::extract::ExtractOptions;

#[derive(Parser, Debug)]
#[command(name = "arcscope")]
#[command(version)]
#[command(about = "Browse archives and re-bundle selected files", long_about = None)]
#[command(after_help = "Examples:\n  \
  arcscope photos.tar.gz                       show the archive as a tree\n  \
  arcscope photos.tar.gz holiday -o pick.zip   bundle everything under holiday/\n  \
  arcscope data.7z '*.csv' -x 'tmp/*' -o       bundle CSVs into data-selected.zip\n  \
  arcscope site.zip index.html -p | less       send one file's contents into less")]
pub struct Cli {
    /// Archive to open (.zip, .tar, .gz, .tgz, .tar.gz, .7z)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Files to select: glob, exact path, or directory (default: all)
    #[arg(value_name = "PATTERNS")]
    pub patterns: Vec<String>,

    /// List the archive as a tree
    #[arg(short = 'l')]
    pub list: bool,

    /// Bundle the selected files into ZIP (default: <archive>-selected.zip)
    #[arg(short = 'o', value_name = "ZIP", num_args = 0..=1, default_missing_value = "")]
    pub output: Option<String>,

    /// Write the selected files' contents to stdout, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Save the selected files into DIR, each under its own file name
    #[arg(short = 'd', value_name = "DIR")]
    pub save_dir: Option<PathBuf>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "PATTERN", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Path to the 7z executable
    #[arg(long = "7z-bin", value_name = "PATH")]
    pub seven_zip_bin: Option<PathBuf>,

    /// Seconds to wait for the 7z engine
    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub timeout: u64,

    /// Quiet mode
    #[arg(short = 'q')]
    pub quiet: bool,

    /// More log output (-vv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Listing is the default unless file data was asked for.
    pub fn is_list(&self) -> bool {
        self.list || (self.output.is_none() && !self.pipe && self.save_dir.is_none())
    }

    /// Pipe mode keeps stdout for file contents only.
    pub fn is_quiet(&self) -> bool {
        self.quiet || self.pipe
    }

    /// Where to write the bundle, if one was requested.
    ///
    /// A bare `-o` derives the name from the archive: `photos.tar.gz` ->
    /// `photos-selected.zip`, next to the current directory.
    pub fn output_path(&self) -> Option<PathBuf> {
        let output = self.output.as_deref()?;
        if !output.is_empty() {
            return Some(PathBuf::from(output));
        }
        let name = self
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(PathBuf::from(format!(
            "{}-selected.zip",
            crate::ArchiveFormat::strip_suffix(&name)
        )))
    }

    pub fn log_level(&self) -> log::LevelFilter {
        match (self.is_quiet(), self.verbose) {
            (true, _) => log::LevelFilter::Error,
            (false, 0) => log::LevelFilter::Warn,
            (false, 1) => log::LevelFilter::Info,
            (false, 2) => log::LevelFilter::Debug,
            (false, _) => log::LevelFilter::Trace,
        }
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            seven_zip_program: self.seven_zip_bin.clone(),
            seven_zip_timeout: Duration::from_secs(self.timeout),
        }
    }
}
