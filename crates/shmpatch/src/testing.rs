//! Synthetic ELF images for tests
//!
//! Produces the smallest ET_DYN object goblin will parse: one PT_LOAD
//! mapping the whole file at vaddr 0, `.text`, `.data` and a `.symtab`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::layout::{elf, where_is_shmfs};

/// File offset and virtual address of `.text`
pub const TEXT_ADDR: u64 = 0xe000;
/// File offset and virtual address of `.data`
pub const DATA_ADDR: u64 = 0xf000;
/// Where [`MockElfBuilder::detection_function`] links `where_is_shmfs`,
/// so the stock jump target falls inside it
pub const DETECTION_ADDR: u64 = 0xef00;

const REGION_LIMIT: usize = 0x1000;
const EHDR_SIZE: u64 = 64;
const PHDR_SIZE: u64 = 56;
const SHDR_SIZE: u64 = 64;
const SYM_SIZE: u64 = 24;

const STT_OBJECT: u8 = 1;
const STT_FUNC: u8 = 2;
const STB_GLOBAL: u8 = 1;

struct MockSymbol {
    name: String,
    info: u8,
    shndx: u16,
    value: u64,
    size: u64,
}

#[derive(Default)]
pub struct MockElfBuilder {
    text: Vec<u8>,
    data: Vec<u8>,
    symbols: Vec<MockSymbol>,
}

impl MockElfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// NUL-padded string stored in `.data`. A `size` of 0 leaves the
    /// symbol unsized but still reserves 16 bytes.
    pub fn string_symbol(mut self, name: &str, value: &[u8], size: usize) -> Self {
        let storage = size.max(16).max(value.len());
        let address = DATA_ADDR + self.data.len() as u64;
        self.data.extend_from_slice(value);
        self.data.resize(self.data.len() + storage - value.len(), 0);
        self.symbols.push(MockSymbol {
            name: name.to_string(),
            info: (STB_GLOBAL << 4) | STT_OBJECT,
            shndx: 2,
            value: address,
            size: size as u64,
        });
        self
    }

    pub fn function(self, name: &str, code: &[u8]) -> Self {
        let address = TEXT_ADDR + self.text.len() as u64;
        self.function_at(name, address, code)
    }

    /// Function linked at `address`; the gap before it is filled with `int3`
    pub fn function_at(mut self, name: &str, address: u64, code: &[u8]) -> Self {
        let offset = (address - TEXT_ADDR) as usize;
        assert!(offset >= self.text.len(), "functions must be added in address order");
        self.text.resize(offset, 0xCC);
        self.text.extend_from_slice(code);
        self.push_function(name, address, code.len() as u64)
    }

    /// Function symbol pointing at an address no segment maps
    pub fn unmapped_function(self, name: &str, address: u64, size: u64) -> Self {
        self.push_function(name, address, size)
    }

    /// `where_is_shmfs` laid out like the supported build
    pub fn detection_function(self) -> Self {
        self.function_at(where_is_shmfs::SYMBOL, DETECTION_ADDR, &detection_body())
    }

    fn push_function(mut self, name: &str, address: u64, size: u64) -> Self {
        self.symbols.push(MockSymbol {
            name: name.to_string(),
            info: (STB_GLOBAL << 4) | STT_FUNC,
            shndx: 1,
            value: address,
            size,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        assert!(self.text.len() <= REGION_LIMIT && self.data.len() <= REGION_LIMIT);

        let mut strtab = vec![0u8];
        let mut symtab = vec![0u8; SYM_SIZE as usize];
        for sym in &self.symbols {
            let name_offset = strtab.len() as u32;
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);

            symtab.extend_from_slice(&name_offset.to_le_bytes());
            symtab.push(sym.info);
            symtab.push(0);
            symtab.extend_from_slice(&sym.shndx.to_le_bytes());
            symtab.extend_from_slice(&sym.value.to_le_bytes());
            symtab.extend_from_slice(&sym.size.to_le_bytes());
        }

        let names = ["", ".text", ".data", ".symtab", ".strtab", ".shstrtab"];
        let mut shstrtab = Vec::new();
        let mut name_offsets = Vec::new();
        for name in names {
            name_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(name.as_bytes());
            shstrtab.push(0);
        }

        let symtab_offset = DATA_ADDR + REGION_LIMIT as u64;
        let strtab_offset = symtab_offset + symtab.len() as u64;
        let shstrtab_offset = strtab_offset + strtab.len() as u64;
        let shoff = align8(shstrtab_offset + shstrtab.len() as u64);
        let file_size = shoff + SHDR_SIZE * names.len() as u64;

        let mut out = Vec::with_capacity(file_size as usize);

        // ELF header
        out.extend_from_slice(&elf::IDENT);
        out.extend_from_slice(&3u16.to_le_bytes()); // ET_DYN
        out.extend_from_slice(&62u16.to_le_bytes()); // EM_X86_64
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes()); // e_entry
        out.extend_from_slice(&EHDR_SIZE.to_le_bytes()); // e_phoff
        out.extend_from_slice(&shoff.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        out.extend_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
        out.extend_from_slice(&(names.len() as u16).to_le_bytes());
        out.extend_from_slice(&5u16.to_le_bytes()); // e_shstrndx

        // PT_LOAD covering the whole file
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(&7u32.to_le_bytes()); // RWX
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&0u64.to_le_bytes());
        out.extend_from_slice(&file_size.to_le_bytes());
        out.extend_from_slice(&file_size.to_le_bytes());
        out.extend_from_slice(&0x1000u64.to_le_bytes());

        out.resize(TEXT_ADDR as usize, 0);
        out.extend_from_slice(&self.text);
        out.resize(DATA_ADDR as usize, 0);
        out.extend_from_slice(&self.data);
        out.resize(symtab_offset as usize, 0);
        out.extend_from_slice(&symtab);
        out.extend_from_slice(&strtab);
        out.extend_from_slice(&shstrtab);
        out.resize(shoff as usize, 0);

        let sections: [(u32, u64, u64, u64, u32, u32, u64); 6] = [
            // (type, flags, addr/offset, size, link, info, entsize)
            (0, 0, 0, 0, 0, 0, 0),
            (1, 0x6, TEXT_ADDR, self.text.len() as u64, 0, 0, 0),
            (1, 0x3, DATA_ADDR, self.data.len() as u64, 0, 0, 0),
            (2, 0, symtab_offset, symtab.len() as u64, 4, 1, SYM_SIZE),
            (3, 0, strtab_offset, strtab.len() as u64, 0, 0, 0),
            (3, 0, shstrtab_offset, shstrtab.len() as u64, 0, 0, 0),
        ];
        for (i, (sh_type, flags, offset, size, link, info, entsize)) in
            sections.into_iter().enumerate()
        {
            let addr = if flags != 0 { offset } else { 0 };
            out.extend_from_slice(&name_offsets[i].to_le_bytes());
            out.extend_from_slice(&sh_type.to_le_bytes());
            out.extend_from_slice(&flags.to_le_bytes());
            out.extend_from_slice(&addr.to_le_bytes());
            out.extend_from_slice(&offset.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(&link.to_le_bytes());
            out.extend_from_slice(&info.to_le_bytes());
            out.extend_from_slice(&(if i == 0 { 0u64 } else { 8u64 }).to_le_bytes());
            out.extend_from_slice(&entsize.to_le_bytes());
        }

        debug_assert_eq!(out.len() as u64, file_size);
        out
    }

    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.build()).unwrap();
        path
    }
}

fn align8(value: u64) -> u64 {
    (value + 7) & !7
}

/// A `where_is_shmfs` stand-in for linking at [`DETECTION_ADDR`]: nops up
/// to the site, `je` to the default-directory branch, nops, `ret` at the
/// branch target.
pub fn detection_body() -> Vec<u8> {
    let site = where_is_shmfs::SITE_OFFSET as usize;
    let target = (where_is_shmfs::JUMP_TARGET - DETECTION_ADDR) as usize;

    let mut code = vec![0x90; site];
    code.push(0x74); // je rel8
    code.push((target - (site + 2)) as u8);
    code.resize(target, 0x90);
    code.push(0xC3);
    code
}

/// Loader library carrying both patchable features
pub fn loader_library(dir: &Path, name: &str) -> PathBuf {
    MockElfBuilder::new()
        .string_symbol("defaultdir", b"/dev/shm/", 16)
        .detection_function()
        .write_to(dir, name)
}
