//! Jump injection into the shm mount detection routine
//!
//! The routine first checks whether the compiled-in directory is a tmpfs
//! mount and only then falls back to scanning the mount table. Jumping
//! from just after the prologue straight to the "use the compiled-in
//! directory" branch makes it always report that directory, which the
//! string patch has pointed somewhere writable.
//!
//! The offsets come from one known build. Before anything is written the
//! site is checked against the decoded function, and any surprise makes
//! the patcher back off instead of corrupting code it does not recognise.

use tracing::{info, warn};

use super::CodePatch;
use super::signature::{format_bytes, format_pattern, matches_at, parse_pattern};
use crate::config::CodeLayout;
use crate::error::Result;
use crate::image::asm::{self, instruction_starts};
use crate::image::{BinaryImage, Symbol};

const NOP: u8 = 0x90;

/// A verified patch site
#[derive(Debug, Clone, PartialEq, Eq)]
struct Plan {
    site: u64,
    target: u64,
    /// Encoded jump followed by nop padding up to the next instruction
    bytes: Vec<u8>,
}

/// Outer error: the layout itself is unusable. Inner error: this function
/// does not match the layout.
type Verdict = std::result::Result<Plan, String>;

fn plan(code: &[u8], function: Symbol, layout: &CodeLayout) -> Result<Verdict> {
    let site = function.address + layout.site_offset;
    let target = layout.jump.resolve(site);

    if !function.contains(site) {
        return Ok(Err(format!(
            "site {:#x} is outside the function ({:#x}..{:#x})",
            site,
            function.address,
            function.end()
        )));
    }
    if !function.contains(target) {
        return Ok(Err(format!(
            "jump target {:#x} is outside the function ({:#x}..{:#x})",
            target,
            function.address,
            function.end()
        )));
    }

    let starts = instruction_starts(code, function.address);
    if !starts.contains(&site) {
        return Ok(Err(format!("site {:#x} is not an instruction boundary", site)));
    }
    if !starts.contains(&target) {
        return Ok(Err(format!(
            "jump target {:#x} is not an instruction boundary",
            target
        )));
    }

    let at_site = &code[(site - function.address) as usize..];
    if let Some(expected) = &layout.expected_site {
        let pattern = parse_pattern(expected)?;
        if !matches_at(at_site, &pattern) {
            let shown = &at_site[..pattern.len().min(at_site.len())];
            return Ok(Err(format!(
                "unexpected bytes at site: {} (expected {})",
                format_bytes(shown),
                format_pattern(&pattern)
            )));
        }
    }

    let mut bytes = asm::assemble(site, &format!("jmp {:#x}", target))?;
    let jump_end = site + bytes.len() as u64;
    let resume = starts
        .iter()
        .copied()
        .find(|&start| start >= jump_end)
        .or_else(|| (jump_end <= function.end()).then(|| function.end()));
    let Some(resume) = resume else {
        return Ok(Err(format!("jump at {:#x} runs past the function end", site)));
    };
    if target > site && target < jump_end {
        return Ok(Err(format!(
            "jump target {:#x} falls inside the jump itself",
            target
        )));
    }
    bytes.resize((resume - site) as usize, NOP);

    Ok(Ok(Plan {
        site,
        target,
        bytes,
    }))
}

/// Make `function` jump straight to its default-directory branch.
///
/// Returns `Ok(None)` without touching the image when the function does
/// not look like the layout expects.
pub fn patch_detection<I: BinaryImage>(
    image: &mut I,
    name: &str,
    function: Symbol,
    layout: &CodeLayout,
) -> Result<Option<CodePatch>> {
    let size = function.size as usize;
    let code = image.read(function.address, size)?.to_vec();
    info!("Function is\n{}", asm::disassemble(&code, function.address));

    let plan = match plan(&code, function, layout)? {
        Ok(plan) => plan,
        Err(reason) => {
            warn!(
                "Not patching {} in {}: {}",
                name,
                image.path().display(),
                reason
            );
            return Ok(None);
        }
    };

    let offset = (plan.site - function.address) as usize;
    let original = &code[offset..offset + plan.bytes.len()];

    let jump = image.assemble(plan.site, &format!("jmp {:#x}", plan.target))?;
    image.write(plan.site + jump.len() as u64, &plan.bytes[jump.len()..])?;

    info!("Patched to\n{}", image.disassemble(function.address, size)?);

    Ok(Some(CodePatch {
        function: name.to_string(),
        site: plan.site,
        target: plan.target,
        original: format_bytes(original),
        patched: format_bytes(&plan.bytes),
    }))
}
