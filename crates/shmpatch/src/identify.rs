//! Decide whether a candidate is one of the runtime libraries we patch

use tracing::{debug, info, warn};

use crate::config::PatchProfile;
use crate::image::{BinaryImage, ElfImage, Symbol};
use crate::patch::string::window_len;
use crate::scan::Candidate;

/// Patchable features found in an image
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features {
    /// The compiled-in directory string
    pub string_symbol: Option<Symbol>,
    /// The shm mount detection routine
    pub detection_function: Option<Symbol>,
}

impl Features {
    /// Look up both features. A symbol whose bytes are not in the file
    /// cannot be patched and is left out.
    pub fn find<I: BinaryImage>(image: &I, profile: &PatchProfile) -> Self {
        let backed = |name: &str, symbol: Symbol, len: usize| {
            if image.read(symbol.address, len).is_ok() {
                return true;
            }
            warn!(
                "Ignoring {} in {}: {:#x} (+{} bytes) is not backed by file data",
                name,
                image.path().display(),
                symbol.address,
                len
            );
            false
        };

        let string_symbol = Some(profile.string_symbol.as_str())
            .filter(|name| !name.is_empty())
            .and_then(|name| {
                image
                    .symbol(name)
                    .filter(|&symbol| backed(name, symbol, window_len(symbol)))
            });
        let detection_function = Some(profile.detection_function.as_str())
            .filter(|name| !name.is_empty())
            .and_then(|name| {
                image
                    .function(name)
                    .filter(|&function| backed(name, function, function.size as usize))
            });

        Self {
            string_symbol,
            detection_function,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.string_symbol.is_none() && self.detection_function.is_none()
    }
}

/// An opened library with at least one patchable feature
#[derive(Debug)]
pub struct Identified {
    pub candidate: Candidate,
    pub image: ElfImage,
    pub features: Features,
}

/// Open `candidate` if its name is on the allow-list and it carries
/// something to patch. Everything else is a skip, never an error.
pub fn identify(candidate: Candidate, profile: &PatchProfile) -> Option<Identified> {
    if !candidate.names().iter().any(|name| profile.matches_name(name)) {
        debug!("Skipping {}: not a runtime library", candidate.path.display());
        return None;
    }

    let image = match ElfImage::open(&candidate.path) {
        Ok(image) => image,
        Err(e) => {
            warn!("Skipping {}: {}", candidate.path.display(), e);
            return None;
        }
    };

    let features = Features::find(&image, profile);
    if features.is_empty() {
        debug!(
            "Skipping {}: neither {} nor {} present",
            candidate.path.display(),
            profile.string_symbol,
            profile.detection_function
        );
        return None;
    }

    info!("opening {}", candidate.path.display());
    Some(Identified {
        candidate,
        image,
        features,
    })
}
