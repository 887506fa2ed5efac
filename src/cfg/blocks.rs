// SPDX-License-Identifier: GPL-3.0-or-later
//! Basic-block fusion.
//!
//! Worklist disassembly produces one micro-block per instruction word.
//! This pass walks the map in ascending address order and merges each
//! block into the growing basic block in front of it whenever control can
//! only arrive sequentially. On real images this shrinks the map by an
//! order of magnitude.

use std::collections::BTreeMap;

use crate::microcode::{JumpType, MicroBlock};

/// Whether `block` may be appended to the basic block currently growing.
///
/// A block starts a new basic block when anything other than plain
/// fall-through can reach it, or when the block in front of it ends in a
/// real control transfer (or in nothing at all).
fn starts_new_block(current: &MicroBlock, block: &MicroBlock) -> bool {
    block.ins.values().any(|&kind| kind != JumpType::Control)
        || current.outs.is_empty()
        || current.outs.values().any(|&kind| kind != JumpType::Control)
}

/// Fuse single-instruction blocks into basic blocks.
///
/// The caller must re-run edge reversal afterwards: interior edges vanish
/// with their blocks, so the surviving `ins` maps are stale.
pub fn fuse_blocks(blocks: BTreeMap<u32, MicroBlock>) -> BTreeMap<u32, MicroBlock> {
    let before = blocks.len();
    let mut fused: BTreeMap<u32, MicroBlock> = BTreeMap::new();
    let mut current: Option<MicroBlock> = None;

    for (_, block) in blocks {
        match current.as_mut() {
            Some(bb) if !starts_new_block(bb, &block) => {
                bb.outs = block.outs;
                bb.insns.extend(block.insns);
            }
            _ => {
                if let Some(done) = current.take() {
                    fused.insert(done.address, done);
                }
                current = Some(block);
            }
        }
    }
    if let Some(done) = current {
        fused.insert(done.address, done);
    }

    log::debug!("basic-block fusion: {} blocks -> {}", before, fused.len());
    fused
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microcode::{MicroInsn, Op};

    fn block(addr: u32, outs: &[(u32, JumpType)], ins: &[(u32, JumpType)]) -> MicroBlock {
        let mut b = MicroBlock::new(addr);
        b.push(MicroInsn::new(addr, Op::Nop, Vec::new()));
        b.outs = outs.iter().copied().collect();
        b.ins = ins.iter().copied().collect();
        b
    }

    #[test]
    fn sequential_chain_collapses_to_one_block() {
        let mut blocks = BTreeMap::new();
        blocks.insert(0, block(0, &[(4, JumpType::Control)], &[]));
        blocks.insert(
            4,
            block(4, &[(8, JumpType::Control)], &[(0, JumpType::Control)]),
        );
        blocks.insert(8, block(8, &[], &[(4, JumpType::Control)]));

        let fused = fuse_blocks(blocks);
        assert_eq!(fused.len(), 1);
        let bb = &fused[&0];
        assert_eq!(bb.insns.len(), 3);
        assert!(bb.outs.is_empty());
    }

    #[test]
    fn jump_target_starts_a_new_block() {
        // 0 falls into 4, but 4 is also a jump target from 8.
        let mut blocks = BTreeMap::new();
        blocks.insert(0, block(0, &[(4, JumpType::Control)], &[]));
        blocks.insert(
            4,
            block(
                4,
                &[],
                &[(0, JumpType::Control), (8, JumpType::Jump)],
            ),
        );
        blocks.insert(8, block(8, &[(4, JumpType::Jump)], &[]));

        let fused = fuse_blocks(blocks);
        assert_eq!(fused.len(), 3);
    }

    #[test]
    fn transfer_out_ends_the_block() {
        // 0 jumps; 4 only falls in from nowhere relevant.
        let mut blocks = BTreeMap::new();
        blocks.insert(0, block(0, &[(8, JumpType::Jump)], &[]));
        blocks.insert(8, block(8, &[], &[(0, JumpType::Jump)]));

        let fused = fuse_blocks(blocks);
        assert_eq!(fused.len(), 2);
    }
}
