// SPDX-License-Identifier: GPL-3.0-or-later
//! Worklist disassembly and edge reversal.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::exe::Executable;
use crate::microcode::{JumpType, MicroBlock};
use crate::mips::{Decoder, DelaySlotMode};
use crate::symbols::DebugSource;

/// Raw disassembly output: the block map plus the decoder by-products.
pub struct Disassembly {
    pub blocks: BTreeMap<u32, MicroBlock>,
    /// Local addresses of call targets discovered while decoding.
    pub callees: BTreeSet<u32>,
    /// Next temporary-register id; identical runs on the same input
    /// produce the same value.
    pub next_tmp_id: u32,
}

/// Convert a global seed address to local coordinates, logging and
/// discarding seeds outside the text range.
fn seed_local(exe: &Executable, global: u32, what: &str) -> Option<u32> {
    match exe.to_local(global) {
        Ok(local) => Some(local),
        Err(_) => {
            log::warn!("{} {:#010x} outside the text range; ignored", what, global);
            None
        }
    }
}

/// Walk all reachable code from `pc0` and the debug-source functions,
/// decoding every visited word into a one-instruction micro-block (plus
/// its inlined delay slot, for branches).
pub fn disassemble(exe: &Executable, symbols: &DebugSource) -> Disassembly {
    let mut queue: VecDeque<u32> = VecDeque::new();
    if let Some(local) = seed_local(exe, exe.header.pc0, "entry point") {
        queue.push_back(local);
    }
    for global in symbols.function_addresses() {
        if let Some(local) = seed_local(exe, global, "function") {
            queue.push_back(local);
        }
    }

    let mut decoder = Decoder::new(exe, symbols);
    let mut blocks: BTreeMap<u32, MicroBlock> = BTreeMap::new();

    while let Some(local) = queue.pop_front() {
        if local >= exe.header.t_size || blocks.contains_key(&local) {
            continue;
        }
        let Some(word) = exe.word_at(local) else {
            log::warn!(
                "word at {:#010x} beyond the image body; stopping this path",
                exe.to_global(local)
            );
            continue;
        };

        let mut block = MicroBlock::new(local);
        decoder.decode(&mut block, word, local.wrapping_add(4), DelaySlotMode::None);

        for &target in block.outs.keys() {
            if target < exe.header.t_size && !blocks.contains_key(&target) {
                queue.push_back(target);
            }
        }
        blocks.insert(local, block);
    }

    Disassembly {
        blocks,
        callees: decoder.callees,
        next_tmp_id: decoder.tmps.next_id(),
    }
}

/// Rebuild every block's `ins` as the transpose of `outs` across the map.
/// Edges to addresses that never became blocks are dropped from `outs`
/// too, so the two maps stay exact transposes.
pub fn reverse_edges(blocks: &mut BTreeMap<u32, MicroBlock>) {
    for block in blocks.values_mut() {
        block.ins.clear();
    }

    let edges: Vec<(u32, u32, JumpType)> = blocks
        .iter()
        .flat_map(|(&from, block)| block.outs.iter().map(move |(&to, &kind)| (from, to, kind)))
        .collect();

    let mut dropped: Vec<(u32, u32)> = Vec::new();
    for (from, to, kind) in edges {
        match blocks.get_mut(&to) {
            Some(target) => {
                target.ins.insert(from, kind);
            }
            None => {
                log::warn!("edge {:#x} -> {:#x} targets no decoded block; dropped", from, to);
                dropped.push((from, to));
            }
        }
    }
    for (from, to) in dropped {
        if let Some(block) = blocks.get_mut(&from) {
            block.outs.remove(&to);
        }
    }
}
