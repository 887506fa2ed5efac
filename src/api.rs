// SPDX-License-Identifier: GPL-3.0-or-later
//! Read-only projection of the analyzed block map.
//!
//! Whatever transport the host wires up (HTTP, IPC, a REPL), it serves
//! windows of this projection. Entries serialize directly to the wire
//! shape, so the host can ship them as JSON verbatim.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::exe::Executable;
use crate::microcode::MicroBlock;

/// One projected block: its global address, a one-line readable form,
/// and the target when the block ends in an unconditional jump to a
/// known address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionEntry {
    pub address: u32,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jump_target: Option<u32>,
}

/// The first `length` entries at global addresses at or above `offset`.
pub fn instructions(
    blocks: &BTreeMap<u32, MicroBlock>,
    exe: &Executable,
    offset: u32,
    length: usize,
) -> Vec<InstructionEntry> {
    blocks
        .values()
        .map(|block| (exe.to_global(block.address), block))
        .filter(|(global, _)| *global >= offset)
        .take(length)
        .map(|(global, block)| InstructionEntry {
            address: global,
            text: block.text(),
            jump_target: block.unconditional_jump_target(),
        })
        .collect()
}
