//! Minimal x86-64 text assembler and disassembly rendering
//!
//! Only the handful of instructions a patch needs are accepted:
//! `jmp <address>`, `nop`, `ret` and `int3`, separated by `;`.

use iced_x86::{
    BlockEncoder, BlockEncoderOptions, Code, Decoder, DecoderOptions, Formatter, Instruction,
    InstructionBlock, NasmFormatter,
};

use crate::error::{Error, Result};

const BITNESS: u32 = 64;

/// Encode `text` as if placed at `address`
pub fn assemble(address: u64, text: &str) -> Result<Vec<u8>> {
    let fail = |message: String| Error::Assemble {
        address,
        text: text.to_string(),
        message,
    };

    let mut instructions = Vec::new();
    for statement in text.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = statement.split_whitespace();
        let mnemonic = parts.next().unwrap_or_default().to_ascii_lowercase();
        let operand = parts.next();
        if parts.next().is_some() {
            return Err(fail(format!("too many operands in {:?}", statement)));
        }

        let instruction = match (mnemonic.as_str(), operand) {
            ("nop", None) => Instruction::with(Code::Nopd),
            ("ret", None) => Instruction::with(Code::Retnq),
            ("int3", None) => Instruction::with(Code::Int3),
            ("jmp", Some(target)) => {
                let target = parse_address(target)
                    .ok_or_else(|| fail(format!("invalid jump target {:?}", target)))?;
                Instruction::with_branch(Code::Jmp_rel32_64, target)
                    .map_err(|e| fail(e.to_string()))?
            }
            _ => return Err(fail(format!("unsupported instruction {:?}", statement))),
        };
        instructions.push(instruction);
    }

    if instructions.is_empty() {
        return Err(fail("no instructions".to_string()));
    }

    let block = InstructionBlock::new(&instructions, address);
    let encoded = BlockEncoder::encode(BITNESS, block, BlockEncoderOptions::NONE)
        .map_err(|e| fail(e.to_string()))?;
    Ok(encoded.code_buffer)
}

fn parse_address(s: &str) -> Option<u64> {
    let s = s.trim_end_matches(',');
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Render one line per instruction: address, raw bytes, NASM syntax
pub fn disassemble(bytes: &[u8], address: u64) -> String {
    let mut decoder = Decoder::with_ip(BITNESS, bytes, address, DecoderOptions::NONE);
    let mut formatter = NasmFormatter::new();
    let mut text = String::new();
    let mut listing = String::new();

    while decoder.can_decode() {
        let instruction = decoder.decode();
        text.clear();
        formatter.format(&instruction, &mut text);

        let start = (instruction.ip() - address) as usize;
        let end = (start + instruction.len()).min(bytes.len());
        let raw = &bytes[start..end];
        let hex: String = raw.iter().map(|b| format!("{:02x}", b)).collect();
        listing.push_str(&format!("  {:#010x}: {:<24} {}\n", instruction.ip(), hex, text));
    }

    listing
}

/// Addresses where instructions start when decoding linearly from `address`
pub fn instruction_starts(bytes: &[u8], address: u64) -> Vec<u64> {
    let mut decoder = Decoder::with_ip(BITNESS, bytes, address, DecoderOptions::NONE);
    decoder.iter().map(|instruction| instruction.ip()).collect()
}

/// Decode the first instruction of `bytes`
pub fn decode_one(bytes: &[u8], address: u64) -> Instruction {
    let mut decoder = Decoder::with_ip(BITNESS, bytes, address, DecoderOptions::NONE);
    decoder.decode()
}
