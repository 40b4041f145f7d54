//! Patches applied to a runtime library
//!
//! Two independent patches exist:
//! - [`string::patch_string`] rewrites the compiled-in directory in place
//! - [`code::patch_detection`] short-circuits the mount detection routine
//!
//! Each returns a record describing exactly what changed, collected into
//! a [`PatchedLibrary`] per library.

pub mod code;
pub mod signature;
pub mod string;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::image::ElfImage;

pub use code::patch_detection;
pub use string::patch_string;

/// Result of rewriting the directory string
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StringPatch {
    pub symbol: String,
    pub address: u64,
    pub previous: String,
    pub replacement: String,
}

/// Result of injecting the jump
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodePatch {
    pub function: String,
    pub site: u64,
    pub target: u64,
    /// Bytes at the site before patching, hex
    pub original: String,
    /// Bytes written, hex
    pub patched: String,
}

/// A library with at least one patch applied
#[derive(Debug, Serialize)]
pub struct PatchedLibrary {
    #[serde(skip)]
    pub image: ElfImage,
    pub source: PathBuf,
    /// Where the patched image was written; `None` when kept in memory
    pub output: Option<PathBuf>,
    pub string_patch: Option<StringPatch>,
    pub code_patch: Option<CodePatch>,
}

impl fmt::Display for PatchedLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.output {
            Some(output) => write!(f, "{} -> {}", self.source.display(), output.display()),
            None => write!(f, "{} -> (in memory)", self.source.display()),
        }
    }
}
