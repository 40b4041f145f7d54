//! Fixed-width rewrite of the compiled-in shm directory

use tracing::info;

use super::StringPatch;
use crate::error::{Error, Result};
use crate::image::{BinaryImage, Symbol};
use crate::layout::defaultdir;

/// Strip the NUL padding callers may pass to spell out the field width
pub fn normalize_folder(folder: &str) -> Result<&str> {
    let trimmed = folder.trim_end_matches('\0');
    if trimmed.is_empty() {
        return Err(Error::InvalidShmFolder(folder.to_string(), "empty"));
    }
    if trimmed.contains('\0') {
        return Err(Error::InvalidShmFolder(folder.to_string(), "contains NUL"));
    }
    Ok(trimmed)
}

/// Bytes of the field behind `symbol`
pub fn window_len(symbol: Symbol) -> usize {
    match symbol.size {
        0 => defaultdir::WINDOW,
        size => size as usize,
    }
}

/// Replace the string stored at `symbol` with `folder`.
///
/// The new value must have exactly the byte length of the old one: the
/// storage is a fixed array and nothing else in the library knows its
/// size changed. The old terminator is rewritten so C string reads see
/// only the replacement.
pub fn patch_string<I: BinaryImage>(
    image: &mut I,
    name: &str,
    symbol: Symbol,
    folder: &str,
) -> Result<StringPatch> {
    let requested = normalize_folder(folder)?;

    let window_len = window_len(symbol);
    let window = image.read(symbol.address, window_len)?;
    let current_len = window.iter().position(|&b| b == 0).unwrap_or(window_len);
    let current = String::from_utf8_lossy(&window[..current_len]).into_owned();

    if requested.len() != current_len {
        return Err(Error::LengthMismatch {
            path: image.path().to_path_buf(),
            symbol: name.to_string(),
            address: symbol.address,
            current,
            current_len,
            requested: requested.to_string(),
            requested_len: requested.len(),
        });
    }

    let footprint = (current_len + 1).min(window_len);
    let mut field = requested.as_bytes().to_vec();
    field.resize(footprint, 0);

    info!("setting {} -> {} -> {}", name, current, requested);
    image.write(symbol.address, &field)?;

    Ok(StringPatch {
        symbol: name.to_string(),
        address: symbol.address,
        previous: current,
        replacement: requested.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ElfImage;
    use crate::testing::MockElfBuilder;
    use tempfile::TempDir;

    fn open_with(value: &[u8], size: usize) -> (TempDir, ElfImage) {
        let dir = TempDir::new().unwrap();
        let path = MockElfBuilder::new()
            .string_symbol("defaultdir", value, size)
            .write_to(dir.path(), "libpthread.so.0");
        let image = ElfImage::open(path).unwrap();
        (dir, image)
    }

    #[test]
    fn test_normalize_folder() {
        assert_eq!(normalize_folder("/tmp/shm/").unwrap(), "/tmp/shm/");
        assert_eq!(normalize_folder("/tmp/shm/\0\0\0\0\0\0\0").unwrap(), "/tmp/shm/");
        assert!(normalize_folder("\0\0").is_err());
        assert!(normalize_folder("/tmp\0/shm").is_err());
    }

    #[test]
    fn test_same_length_replacement() {
        let (_dir, mut image) = open_with(b"/dev/shm/", 16);
        let sym = image.symbol("defaultdir").unwrap();

        let patch = patch_string(&mut image, "defaultdir", sym, "/tmp/shm/").unwrap();
        assert_eq!(patch.previous, "/dev/shm/");
        assert_eq!(patch.replacement, "/tmp/shm/");
        assert_eq!(patch.address, sym.address);
        assert_eq!(image.read(sym.address, 16).unwrap(), b"/tmp/shm/\0\0\0\0\0\0\0");
    }

    #[test]
    fn test_padded_request_matches_field_width() {
        let (_dir, mut image) = open_with(b"/dev/shm/", 16);
        let sym = image.symbol("defaultdir").unwrap();

        patch_string(&mut image, "defaultdir", sym, "/tmp/shm/\0\0\0\0\0\0\0").unwrap();
        assert_eq!(image.read(sym.address, 16).unwrap(), b"/tmp/shm/\0\0\0\0\0\0\0");
    }

    #[test]
    fn test_length_mismatch_leaves_image_untouched() {
        let (_dir, mut image) = open_with(b"/dev/shm/", 16);
        let sym = image.symbol("defaultdir").unwrap();
        let before = image.bytes().to_vec();

        let err = patch_string(&mut image, "defaultdir", sym, "/tmp/shared-memory/").unwrap_err();
        match err {
            Error::LengthMismatch {
                current_len,
                requested_len,
                ..
            } => {
                assert_eq!(current_len, 9);
                assert_eq!(requested_len, 19);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(image.bytes(), before.as_slice());
    }

    #[test]
    fn test_multibyte_length_is_in_bytes() {
        let (_dir, mut image) = open_with(b"/dev/shm/", 16);
        let sym = image.symbol("defaultdir").unwrap();
        // nine characters, ten bytes
        assert!(patch_string(&mut image, "defaultdir", sym, "/tmp/shé/").is_err());
        // seven characters, nine bytes
        assert!(patch_string(&mut image, "defaultdir", sym, "/tmp/éé").is_ok());
    }

    #[test]
    fn test_unsized_symbol_reads_default_window() {
        let (_dir, mut image) = open_with(b"/dev/shm/", 0);
        let sym = image.symbol("defaultdir").unwrap();
        assert_eq!(sym.size, 0);

        patch_string(&mut image, "defaultdir", sym, "/run/shm/").unwrap();
        assert_eq!(image.read(sym.address, 10).unwrap(), b"/run/shm/\0");
    }

    #[test]
    fn test_unterminated_field_keeps_width() {
        let (_dir, mut image) = open_with(b"/dev/shm/", 9);
        let sym = image.symbol("defaultdir").unwrap();
        let next = image.read(sym.address + 9, 1).unwrap().to_vec();

        patch_string(&mut image, "defaultdir", sym, "/tmp/shm/").unwrap();
        assert_eq!(image.read(sym.address, 9).unwrap(), b"/tmp/shm/");
        assert_eq!(image.read(sym.address + 9, 1).unwrap(), next.as_slice());
    }
}
