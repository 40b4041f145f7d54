//! One patch run from configuration to written libraries

use tracing::{debug, info};

use crate::config::{OutputPolicy, PatchConfig, PatchProfile};
use crate::error::{Error, Result};
use crate::identify::{Identified, identify};
use crate::output::{prepare_destination, write_output};
use crate::patch::{PatchedLibrary, patch_detection, patch_string};
use crate::patch::string::normalize_folder;
use crate::scan::{Scanner, VisitedSet};

/// Search every root, patch what is found and write it out per
/// `config.output`.
///
/// Libraries are written as they are patched, so a fatal error part way
/// through leaves the earlier ones written.
pub fn run(config: &PatchConfig) -> Result<Vec<PatchedLibrary>> {
    config.profile.validate()?;
    let folder = normalize_folder(&config.shm_folder)?;

    let mut visited = VisitedSet::new();
    let output = match &config.output {
        OutputPolicy::CopyTo(destination) => {
            let destination = prepare_destination(destination)?;
            // Never pick up our own copies
            visited.insert(destination.clone());
            OutputPolicy::CopyTo(destination)
        }
        other => other.clone(),
    };

    let mut patched = Vec::new();
    for root in &config.search_roots {
        if !root.is_dir() {
            debug!("Skipping search root {}: not a directory", root.display());
            continue;
        }

        let scanner = Scanner::new(root, config.depth_limit, &mut visited)?;
        debug!("Searching {}", scanner.root().display());
        for candidate in scanner {
            let Some(found) = identify(candidate, &config.profile) else {
                continue;
            };
            if let Some(library) = patch_library(found, folder, &config.profile, &output)? {
                info!("Patching {}", library);
                patched.push(library);
            }
        }
    }

    if patched.is_empty() {
        let searched = config
            .search_roots
            .iter()
            .map(|root| root.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::NothingPatched { searched });
    }
    Ok(patched)
}

fn patch_library(
    found: Identified,
    folder: &str,
    profile: &PatchProfile,
    output: &OutputPolicy,
) -> Result<Option<PatchedLibrary>> {
    let Identified {
        candidate,
        mut image,
        features,
    } = found;

    let string_patch = match features.string_symbol {
        Some(symbol) => Some(patch_string(
            &mut image,
            &profile.string_symbol,
            symbol,
            folder,
        )?),
        None => None,
    };
    let code_patch = match features.detection_function {
        Some(function) => {
            patch_detection(&mut image, &profile.detection_function, function, &profile.code)?
        }
        None => None,
    };

    if string_patch.is_none() && code_patch.is_none() {
        debug!("Nothing applied to {}", candidate.path.display());
        return Ok(None);
    }

    let output = write_output(&image, output)?;
    Ok(Some(PatchedLibrary {
        image,
        source: candidate.path,
        output,
        string_patch,
        code_patch,
    }))
}
