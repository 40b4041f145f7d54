//! Depth-limited search for candidate libraries
//!
//! [`Scanner`] walks one search root lazily. Every entry is resolved to
//! its canonical path before anything else happens, so symlinks are
//! followed, containment in the root is a real ancestor check, and the
//! shared [`VisitedSet`] catches overlapping roots and link cycles.

use std::collections::{HashSet, VecDeque};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::layout::elf::{IDENT, IDENT_LEN, SHARED_OBJECT_MARKER};

/// Canonical paths already examined during one run
pub type VisitedSet = HashSet<PathBuf>;

/// A file that passed the name and identification checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Canonical path of the file
    pub path: PathBuf,
    /// Name of the directory entry that led here (may be a symlink)
    pub entry_name: String,
}

impl Candidate {
    /// Entry name followed by the resolved file name, if different
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.entry_name.as_str()];
        if let Some(resolved) = self.path.file_name().and_then(|n| n.to_str()) {
            if resolved != self.entry_name {
                names.push(resolved);
            }
        }
        names
    }
}

/// Whether the file starts with the ELF64 little-endian identification
pub fn has_elf_ident(path: &Path) -> io::Result<bool> {
    let mut header = [0u8; IDENT_LEN];
    let mut file = File::open(path)?;
    match file.read_exact(&mut header) {
        Ok(()) => Ok(header == IDENT),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Lazy, single-pass walk of one search root
pub struct Scanner<'a> {
    root: PathBuf,
    depth_limit: usize,
    visited: &'a mut VisitedSet,
    pending: Vec<(PathBuf, usize)>,
    ready: VecDeque<Candidate>,
}

impl<'a> Scanner<'a> {
    pub fn new(root: &Path, depth_limit: usize, visited: &'a mut VisitedSet) -> Result<Self> {
        let root = fs::canonicalize(root)?;
        visited.insert(root.clone());
        Ok(Self {
            pending: vec![(root.clone(), 0)],
            root,
            depth_limit,
            visited,
            ready: VecDeque::new(),
        })
    }

    /// Canonical form of the search root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scan_dir(&mut self, dir: &Path, depth: usize) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", dir.display(), e);
                return;
            }
        };
        let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
        entries.sort_by_key(|e| e.file_name());

        let mut subdirs = Vec::new();
        for entry in entries {
            let entry_path = entry.path();
            let resolved = match fs::canonicalize(&entry_path) {
                Ok(resolved) => resolved,
                Err(e) => {
                    debug!("Skipping {}: {}", entry_path.display(), e);
                    continue;
                }
            };

            if !resolved.starts_with(&self.root) {
                debug!(
                    "Skipping {} -> {}: outside {}",
                    entry_path.display(),
                    resolved.display(),
                    self.root.display()
                );
                continue;
            }
            if self.visited.contains(&resolved) {
                continue;
            }

            let metadata = match fs::metadata(&resolved) {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("Skipping {}: {}", resolved.display(), e);
                    continue;
                }
            };

            if metadata.is_dir() {
                if depth < self.depth_limit {
                    self.visited.insert(resolved.clone());
                    subdirs.push(resolved);
                }
                continue;
            }
            if !metadata.is_file() {
                continue;
            }

            self.visited.insert(resolved.clone());

            let candidate = Candidate {
                entry_name: entry.file_name().to_string_lossy().into_owned(),
                path: resolved,
            };
            if !candidate
                .names()
                .iter()
                .any(|name| name.contains(SHARED_OBJECT_MARKER))
            {
                continue;
            }

            match has_elf_ident(&candidate.path) {
                Ok(true) => self.ready.push_back(candidate),
                Ok(false) => debug!("Skipping {}: not ELF64-LE", candidate.path.display()),
                Err(e) => warn!("Cannot read {}: {}", candidate.path.display(), e),
            }
        }

        // Stack order: first subdirectory is traversed next
        for subdir in subdirs.into_iter().rev() {
            self.pending.push((subdir, depth + 1));
        }
    }
}

impl Iterator for Scanner<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        loop {
            if let Some(candidate) = self.ready.pop_front() {
                return Some(candidate);
            }
            let (dir, depth) = self.pending.pop()?;
            self.scan_dir(&dir, depth);
        }
    }
}
