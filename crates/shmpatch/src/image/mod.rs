//! Binary image access
//!
//! Patchers never touch files directly. They go through [`BinaryImage`],
//! which exposes symbol lookup and byte-level access by virtual address,
//! and flushes the mutated image to disk on request.

pub mod asm;
mod elf;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;

pub use elf::ElfImage;

/// Address and size of a named symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub address: u64,
    pub size: u64,
}

impl Symbol {
    /// First address past the symbol
    pub fn end(&self) -> u64 {
        self.address + self.size
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.address && address < self.end()
    }
}

/// An open, in-memory copy of one library
pub trait BinaryImage {
    /// File the image was opened from
    fn path(&self) -> &Path;

    /// All named, defined symbols
    fn symbols(&self) -> &HashMap<String, Symbol>;

    /// Sized function symbols
    fn functions(&self) -> &HashMap<String, Symbol>;

    /// Read `len` bytes at a virtual address
    fn read(&self, address: u64, len: usize) -> Result<&[u8]>;

    /// Overwrite bytes at a virtual address
    fn write(&mut self, address: u64, bytes: &[u8]) -> Result<()>;

    /// Flush to `destination`, or back to [`BinaryImage::path`] when `None`.
    /// Returns the path written.
    fn save(&self, destination: Option<&Path>) -> Result<PathBuf>;

    fn symbol(&self, name: &str) -> Option<Symbol> {
        self.symbols().get(name).copied()
    }

    fn function(&self, name: &str) -> Option<Symbol> {
        self.functions().get(name).copied()
    }

    /// Assemble `text` for `address` and write it there.
    /// Returns the encoded bytes.
    fn assemble(&mut self, address: u64, text: &str) -> Result<Vec<u8>> {
        let bytes = asm::assemble(address, text)?;
        self.write(address, &bytes)?;
        Ok(bytes)
    }

    /// Render `len` bytes at `address` as an instruction listing
    fn disassemble(&self, address: u64, len: usize) -> Result<String> {
        let bytes = self.read(address, len)?;
        Ok(asm::disassemble(bytes, address))
    }
}
