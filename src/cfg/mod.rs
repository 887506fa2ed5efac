// SPDX-License-Identifier: GPL-3.0-or-later
//! Control-flow analysis over the decoded micro-assembly.
//!
//! The pipeline runs strictly in order on one thread: worklist
//! disassembly, edge reversal, basic-block fusion, function-ownership
//! tagging, peephole. Once `analyze` returns, the block map is never
//! mutated again and may be shared freely by readers.

mod blocks;
mod disassembly;
mod peephole;
mod reachability;

pub use blocks::fuse_blocks;
pub use disassembly::{Disassembly, disassemble, reverse_edges};
pub use peephole::simplify;
pub use reachability::tag_function_owners;

use std::collections::{BTreeMap, BTreeSet};

use crate::exe::Executable;
use crate::microcode::MicroBlock;
use crate::symbols::DebugSource;

/// The finished analysis of one executable.
pub struct Analysis {
    /// Fused basic blocks keyed by local address.
    pub blocks: BTreeMap<u32, MicroBlock>,
    /// Function entries, local: discovered call targets plus debug-source
    /// seeds that landed inside the text.
    pub functions: BTreeSet<u32>,
    /// Next temporary-register id after decoding; equal runs on equal
    /// inputs produce equal values.
    pub next_tmp_id: u32,
}

/// Run the whole pipeline over a loaded executable.
pub fn analyze(exe: &Executable, symbols: &DebugSource) -> Analysis {
    let raw = disassemble(exe, symbols);
    let mut blocks = raw.blocks;
    reverse_edges(&mut blocks);

    let mut blocks = fuse_blocks(blocks);
    // Fusion swallowed the interior edges; rebuild the transposes.
    reverse_edges(&mut blocks);

    let mut functions = raw.callees;
    for global in symbols.function_addresses() {
        if let Ok(local) = exe.to_local(global) {
            functions.insert(local);
        }
    }
    tag_function_owners(&mut blocks, &functions);

    let rewrites = simplify(&mut blocks, symbols);
    log::debug!("peephole applied {} rewrites", rewrites);

    Analysis {
        blocks,
        functions,
        next_tmp_id: raw.next_tmp_id,
    }
}
