//! Writing patched images back to disk

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::config::OutputPolicy;
use crate::error::{Error, Result};
use crate::image::BinaryImage;

/// Make sure `dir` exists and is a directory; returns its canonical form
pub fn prepare_destination(dir: &Path) -> Result<PathBuf> {
    match fs::metadata(dir) {
        Ok(metadata) if metadata.is_dir() => {}
        Ok(_) => return Err(Error::NotADirectory(dir.to_path_buf())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("Creating {}", dir.display());
            fs::create_dir_all(dir)?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(fs::canonicalize(dir)?)
}

/// `source` re-rooted under `destination`: `/lib/x.so` -> `<destination>/lib/x.so`
pub fn mirrored_path(destination: &Path, source: &Path) -> Result<PathBuf> {
    let source = fs::canonicalize(source)?;
    let relative: PathBuf = source
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    Ok(destination.join(relative))
}

/// Apply `policy` to a patched image. Returns the file written, if any.
pub fn write_output<I: BinaryImage>(image: &I, policy: &OutputPolicy) -> Result<Option<PathBuf>> {
    match policy {
        OutputPolicy::InMemory => Ok(None),
        OutputPolicy::Overwrite => Ok(Some(image.save(None)?)),
        OutputPolicy::CopyTo(destination) => {
            let target = mirrored_path(destination, image.path())?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            Ok(Some(image.save(Some(&target))?))
        }
    }
}
