//! ELF64 little-endian image backed by goblin

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use goblin::elf::Elf;
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::section_header::{SHF_ALLOC, SHN_UNDEF, SHT_NOBITS};
use tempfile::NamedTempFile;
use tracing::debug;

use super::{BinaryImage, Symbol};
use crate::error::{Error, Result};

/// File-backed part of the address space
#[derive(Debug, Clone, Copy)]
struct Mapping {
    vaddr: u64,
    offset: u64,
    filesz: u64,
}

impl Mapping {
    fn file_range(&self, address: u64, len: usize) -> Option<Range<usize>> {
        let end = address.checked_add(len as u64)?;
        if address < self.vaddr || end > self.vaddr + self.filesz {
            return None;
        }
        let start = (self.offset + (address - self.vaddr)) as usize;
        Some(start..start + len)
    }
}

/// A shared object read fully into memory
#[derive(Debug, Clone)]
pub struct ElfImage {
    path: PathBuf,
    data: Vec<u8>,
    symbols: HashMap<String, Symbol>,
    functions: HashMap<String, Symbol>,
    mappings: Vec<Mapping>,
}

impl ElfImage {
    /// Read and parse the file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)?;
        Self::parse(path.to_path_buf(), data)
    }

    fn parse(path: PathBuf, data: Vec<u8>) -> Result<Self> {
        let elf = Elf::parse(&data).map_err(|e| Error::Image {
            path: path.clone(),
            message: e.to_string(),
        })?;

        if !elf.is_64 || !elf.little_endian {
            return Err(Error::Image {
                path,
                message: "not a 64-bit little-endian ELF".to_string(),
            });
        }

        let mut symbols = HashMap::new();
        let mut functions = HashMap::new();
        for (table, strtab) in [(&elf.syms, &elf.strtab), (&elf.dynsyms, &elf.dynstrtab)] {
            for sym in table.iter() {
                if sym.st_shndx == SHN_UNDEF as usize {
                    continue;
                }
                let Some(name) = strtab.get_at(sym.st_name) else {
                    continue;
                };
                if name.is_empty() {
                    continue;
                }

                let symbol = Symbol {
                    address: sym.st_value,
                    size: sym.st_size,
                };
                symbols.entry(name.to_string()).or_insert(symbol);
                if sym.is_function() && sym.st_size > 0 {
                    functions.entry(name.to_string()).or_insert(symbol);
                }
            }
        }

        let mut mappings: Vec<Mapping> = elf
            .program_headers
            .iter()
            .filter(|ph| ph.p_type == PT_LOAD && ph.p_filesz > 0)
            .map(|ph| Mapping {
                vaddr: ph.p_vaddr,
                offset: ph.p_offset,
                filesz: ph.p_filesz,
            })
            .collect();

        // Objects without program headers are addressed through their sections
        if mappings.is_empty() {
            mappings = elf
                .section_headers
                .iter()
                .filter(|sh| sh.sh_flags & SHF_ALLOC as u64 != 0 && sh.sh_type != SHT_NOBITS)
                .map(|sh| Mapping {
                    vaddr: sh.sh_addr,
                    offset: sh.sh_offset,
                    filesz: sh.sh_size,
                })
                .collect();
        }

        debug!(
            "Parsed {}: {} symbols, {} functions, {} mappings",
            path.display(),
            symbols.len(),
            functions.len(),
            mappings.len()
        );

        Ok(Self {
            path,
            data,
            symbols,
            functions,
            mappings,
        })
    }

    /// Raw file contents, including pending writes
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn file_range(&self, address: u64, len: usize) -> Result<Range<usize>> {
        self.mappings
            .iter()
            .find_map(|m| m.file_range(address, len))
            .filter(|range| range.end <= self.data.len())
            .ok_or(Error::AddressNotMapped { address, len })
    }
}

impl BinaryImage for ElfImage {
    fn path(&self) -> &Path {
        &self.path
    }

    fn symbols(&self) -> &HashMap<String, Symbol> {
        &self.symbols
    }

    fn functions(&self) -> &HashMap<String, Symbol> {
        &self.functions
    }

    fn read(&self, address: u64, len: usize) -> Result<&[u8]> {
        let range = self.file_range(address, len)?;
        Ok(&self.data[range])
    }

    fn write(&mut self, address: u64, bytes: &[u8]) -> Result<()> {
        let range = self.file_range(address, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    fn save(&self, destination: Option<&Path>) -> Result<PathBuf> {
        let target = destination.unwrap_or(&self.path);
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        // Written beside the target and renamed over it, so readers only
        // ever see the old or the new file
        let mut staged = NamedTempFile::new_in(parent)?;
        staged.write_all(&self.data)?;
        staged.as_file().sync_all()?;
        let permissions = fs::metadata(&self.path)?.permissions();
        fs::set_permissions(staged.path(), permissions)?;
        staged.persist(target).map_err(|e| e.error)?;

        debug!("Wrote {} bytes to {}", self.data.len(), target.display());
        Ok(target.to_path_buf())
    }
}
