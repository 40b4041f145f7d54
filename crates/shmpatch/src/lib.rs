//! # shmpatch
//!
//! Redirects glibc's POSIX shared memory directory.
//!
//! The dynamic loader and libpthread of some glibc builds locate shared
//! memory through a compiled-in `/dev/shm/` and a tmpfs mount check. This
//! crate finds those libraries and rewrites them so shared memory lives in
//! another directory of the same name length:
//! - the `defaultdir` string is replaced in place
//! - `where_is_shmfs` is made to return that directory unconditionally
//!
//! Patched images are kept in memory, written back over the originals, or
//! written to a mirrored tree under another root.
//!
//! ```no_run
//! use shmpatch::{OutputPolicy, PatchConfig};
//!
//! let config = PatchConfig::builder()
//!     .shm_folder("/tmp/shm/")
//!     .output(OutputPolicy::CopyTo("/opt/patched".into()))
//!     .build();
//! for library in shmpatch::run(&config)? {
//!     println!("{library}");
//! }
//! # Ok::<(), shmpatch::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod identify;
pub mod image;
pub mod layout;
pub mod output;
pub mod patch;
pub mod runner;
pub mod scan;

#[cfg(test)]
mod testing;

pub use config::{
    CodeLayout, JumpTarget, OutputPolicy, PatchConfig, PatchConfigBuilder, PatchProfile,
    default_search_roots, load_profile,
};
pub use error::{Error, Result};
pub use identify::{Features, Identified, identify};
pub use image::{BinaryImage, ElfImage, Symbol};
pub use output::{mirrored_path, prepare_destination, write_output};
pub use patch::{CodePatch, PatchedLibrary, StringPatch, patch_detection, patch_string};
pub use runner::run;
pub use scan::{Candidate, Scanner, VisitedSet};
