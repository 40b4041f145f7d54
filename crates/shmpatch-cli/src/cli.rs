//! Command line arguments

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};
use shmpatch::{Error, OutputPolicy};
use shmpatch::layout::defaults;

#[derive(Parser, Debug)]
#[command(name = "shmpatch")]
#[command(version, about = "Move glibc's POSIX shared memory out of /dev/shm")]
pub struct Args {
    /// Replacement directory; must have the same byte length as the original
    #[arg(long, value_name = "DIR", default_value = defaults::SHM_FOLDER)]
    pub shm_folder: String,

    /// Directory to search (repeatable) [default: every /lib* directory]
    #[arg(long = "search-in", value_name = "DIR")]
    pub search_in: Vec<PathBuf>,

    /// Write patched libraries back over the originals
    #[arg(long, conflicts_with = "copy_to")]
    pub overwrite: bool,

    /// Write patched libraries under DEST, mirroring their original paths
    #[arg(long, value_name = "DEST")]
    pub copy_to: Option<PathBuf>,

    /// Directory levels searched below each root
    #[arg(long, value_name = "N", default_value_t = defaults::DEPTH_LIMIT)]
    pub depth: usize,

    /// TOML file overriding symbol names, library prefixes and code layout
    #[arg(long, value_name = "FILE", env = "SHMPATCH_PROFILE")]
    pub profile: Option<PathBuf>,

    /// Print what was patched as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    pub fn output(&self) -> OutputPolicy {
        match (&self.copy_to, self.overwrite) {
            (Some(dest), _) => OutputPolicy::CopyTo(dest.clone()),
            (None, true) => OutputPolicy::Overwrite,
            (None, false) => OutputPolicy::InMemory,
        }
    }

    /// Default tracing directive for the library
    pub fn log_directive(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "shmpatch=warn",
            (false, 0) => "shmpatch=info",
            (false, 1) => "shmpatch=debug",
            (false, _) => "shmpatch=trace",
        }
    }
}

/// Run errors reported as clap usage errors (exit status 2)
pub fn usage_error_kind(error: &Error) -> Option<ErrorKind> {
    match error {
        Error::NotADirectory(_) => Some(ErrorKind::InvalidValue),
        Error::NothingPatched { .. } => Some(ErrorKind::ValueValidation),
        _ => None,
    }
}
