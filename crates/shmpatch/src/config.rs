//! Run configuration
//!
//! Everything a patch run needs is carried in a [`PatchConfig`] value that
//! is handed to [`crate::run`]. The parts tied to one particular runtime
//! build (symbol names, filename prefixes, code layout) live in a
//! [`PatchProfile`], which can be loaded from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::layout::{defaultdir, defaults, libraries, where_is_shmfs};
use crate::patch::signature::parse_pattern;

/// Where patched images end up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Patches stay in memory; the caller decides what to do with them
    #[default]
    InMemory,
    /// Write back to the source file
    Overwrite,
    /// Mirror the source path under this directory
    CopyTo(PathBuf),
}

/// Target of the injected jump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JumpTarget {
    /// Offset from the patch site
    Relative(i64),
    /// Absolute virtual address
    Absolute(u64),
}

impl JumpTarget {
    /// Resolve against the patch site address
    pub fn resolve(self, site: u64) -> u64 {
        match self {
            JumpTarget::Relative(delta) => site.wrapping_add_signed(delta),
            JumpTarget::Absolute(address) => address,
        }
    }
}

/// Where and how to inject the jump into the detection function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeLayout {
    /// Offset of the patch site from the function start
    pub site_offset: u64,
    pub jump: JumpTarget,
    /// Bytes expected at the patch site, hex with `??` wildcards
    pub expected_site: Option<String>,
}

impl Default for CodeLayout {
    fn default() -> Self {
        Self {
            site_offset: where_is_shmfs::SITE_OFFSET,
            jump: JumpTarget::Absolute(where_is_shmfs::JUMP_TARGET),
            expected_site: None,
        }
    }
}

/// Build-specific knowledge about the libraries being patched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchProfile {
    /// Closed allow-list of filename prefixes
    pub library_prefixes: Vec<String>,
    pub string_symbol: String,
    pub detection_function: String,
    pub code: CodeLayout,
}

impl Default for PatchProfile {
    fn default() -> Self {
        Self {
            library_prefixes: vec![
                libraries::LOADER_PREFIX.to_string(),
                libraries::PTHREAD_PREFIX.to_string(),
            ],
            string_symbol: defaultdir::SYMBOL.to_string(),
            detection_function: where_is_shmfs::SYMBOL.to_string(),
            code: CodeLayout::default(),
        }
    }
}

impl PatchProfile {
    /// Check the profile is usable before any library is touched
    pub fn validate(&self) -> Result<()> {
        if self.library_prefixes.iter().all(|p| p.is_empty()) {
            return Err(Error::Profile("library_prefixes is empty".to_string()));
        }
        if self.string_symbol.is_empty() && self.detection_function.is_empty() {
            return Err(Error::Profile(
                "neither string_symbol nor detection_function is set".to_string(),
            ));
        }
        if let Some(pattern) = &self.code.expected_site {
            parse_pattern(pattern)?;
        }
        Ok(())
    }

    /// Whether a filename belongs to a recognised runtime component
    pub fn matches_name(&self, name: &str) -> bool {
        self.library_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }
}

pub fn load_profile<P: AsRef<Path>>(path: P) -> Result<PatchProfile> {
    let content = fs::read_to_string(&path)?;
    let profile: PatchProfile = toml::from_str(&content)?;
    profile.validate()?;
    debug!("Loaded profile from {}", path.as_ref().display());
    Ok(profile)
}

/// Configuration for one patch run
#[derive(Debug, Clone)]
pub struct PatchConfig {
    /// Replacement for the compiled-in shm directory
    pub shm_folder: String,
    pub search_roots: Vec<PathBuf>,
    /// Levels traversed below each root
    pub depth_limit: usize,
    pub output: OutputPolicy,
    pub profile: PatchProfile,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            shm_folder: defaults::SHM_FOLDER.to_string(),
            search_roots: default_search_roots(),
            depth_limit: defaults::DEPTH_LIMIT,
            output: OutputPolicy::InMemory,
            profile: PatchProfile::default(),
        }
    }
}

impl PatchConfig {
    /// Create a new configuration builder
    pub fn builder() -> PatchConfigBuilder {
        PatchConfigBuilder::default()
    }
}

/// Builder for PatchConfig
#[derive(Debug, Clone, Default)]
pub struct PatchConfigBuilder {
    shm_folder: Option<String>,
    search_roots: Vec<PathBuf>,
    depth_limit: Option<usize>,
    output: Option<OutputPolicy>,
    profile: Option<PatchProfile>,
}

impl PatchConfigBuilder {
    /// Set the replacement directory
    pub fn shm_folder<S: Into<String>>(mut self, folder: S) -> Self {
        self.shm_folder = Some(folder.into());
        self
    }

    /// Add a search root; the `/lib*` defaults apply only when none are added
    pub fn search_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.search_roots.push(root.into());
        self
    }

    pub fn search_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.search_roots.extend(roots.into_iter().map(Into::into));
        self
    }

    pub fn depth_limit(mut self, depth: usize) -> Self {
        self.depth_limit = Some(depth);
        self
    }

    pub fn output(mut self, output: OutputPolicy) -> Self {
        self.output = Some(output);
        self
    }

    pub fn profile(mut self, profile: PatchProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Build the configuration
    pub fn build(self) -> PatchConfig {
        let search_roots = if self.search_roots.is_empty() {
            default_search_roots()
        } else {
            self.search_roots
        };
        PatchConfig {
            shm_folder: self
                .shm_folder
                .unwrap_or_else(|| defaults::SHM_FOLDER.to_string()),
            search_roots,
            depth_limit: self.depth_limit.unwrap_or(defaults::DEPTH_LIMIT),
            output: self.output.unwrap_or_default(),
            profile: self.profile.unwrap_or_default(),
        }
    }
}

/// Top-level `/lib*` directories, sorted
pub fn default_search_roots() -> Vec<PathBuf> {
    search_roots_under(Path::new("/"))
}

fn search_roots_under(base: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(base) else {
        return Vec::new();
    };
    let mut roots: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .starts_with(defaults::SEARCH_ROOT_PREFIX)
        })
        .map(|entry| entry.path())
        .collect();
    roots.sort();
    roots
}
