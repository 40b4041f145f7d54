//! Binary layout constants for the patched runtime libraries
//!
//! This module centralizes every magic number the patchers rely on.
//! Constants are organized by the structure they describe.

/// ELF identification
pub mod elf {
    /// Number of identification bytes compared when scanning
    pub const IDENT_LEN: usize = 16;

    /// `e_ident` of a 64-bit little-endian SysV ELF, version 1
    pub const IDENT: [u8; IDENT_LEN] = [
        0x7f, b'E', b'L', b'F', // magic
        0x02, // ELFCLASS64
        0x01, // ELFDATA2LSB
        0x01, // EV_CURRENT
        0x00, // ELFOSABI_SYSV
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];

    /// Marker every shared object carries somewhere in its filename
    pub const SHARED_OBJECT_MARKER: &str = ".so";
}

/// The compiled-in default directory (`static const char defaultdir[]`)
pub mod defaultdir {
    /// Symbol name
    pub const SYMBOL: &str = "defaultdir";

    /// Bytes read when the symbol carries no size
    pub const WINDOW: usize = 16;
}

/// Layout of `where_is_shmfs` in the supported libpthread build
///
/// ```text
///  +0x00  prologue, stack protector setup           (24 bytes)
///  +0x18  statfs(defaultdir) + f_type comparisons   (22 bytes)
///  +0x2e  <- patch site: jmp over the remaining detection
///
///  0xef91 <- jump target: mountpoint.dir = defaultdir; return
/// ```
///
/// The jump target is a link-time address, not an offset into the function.
pub mod where_is_shmfs {
    /// Function name
    pub const SYMBOL: &str = "where_is_shmfs";

    /// Prologue length
    pub const PROLOGUE_LEN: u64 = 24;

    /// Length of the `statfs` call and magic comparison block
    pub const STATFS_CHECK_LEN: u64 = 22;

    /// Offset of the patch site from the function start
    pub const SITE_OFFSET: u64 = PROLOGUE_LEN + STATFS_CHECK_LEN;

    /// Virtual address of the "use the default directory" branch
    pub const JUMP_TARGET: u64 = 0xef91;
}

/// Runtime components that embed the shm directory
pub mod libraries {
    /// Dynamic loader
    pub const LOADER_PREFIX: &str = "ld-linux";

    /// Threading library
    pub const PTHREAD_PREFIX: &str = "libpthread";
}

/// Defaults for a patch run
pub mod defaults {
    /// Replacement directory; same byte length as `/dev/shm/`
    pub const SHM_FOLDER: &str = "/tmp/shm/";

    /// Levels traversed below each search root
    pub const DEPTH_LIMIT: usize = 1;

    /// Prefix of the top-level library directories searched by default
    pub const SEARCH_ROOT_PREFIX: &str = "lib";
}
