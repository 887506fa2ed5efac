// SPDX-License-Identifier: GPL-3.0-or-later
//! Function-ownership tagging.

use std::collections::{BTreeMap, BTreeSet};

use crate::microcode::{JumpType, MicroBlock};

/// BFS from a function entry, following jump, conditional-jump and
/// fall-through edges but never call edges, collecting every block the
/// function's body can reach.
fn function_blocks(entry: u32, blocks: &BTreeMap<u32, MicroBlock>) -> BTreeSet<u32> {
    let mut visited = BTreeSet::new();
    let mut queue = vec![entry];

    while let Some(addr) = queue.pop() {
        if !visited.insert(addr) {
            continue;
        }
        if let Some(block) = blocks.get(&addr) {
            for (&target, &kind) in &block.outs {
                let follows = matches!(
                    kind,
                    JumpType::Jump | JumpType::JumpConditional | JumpType::Control
                );
                if follows && !visited.contains(&target) {
                    queue.push(target);
                }
            }
        }
    }

    visited
}

/// Tag every block with the function entries it belongs to. A block may
/// end up owned by several functions (tail-shared code).
///
/// `entries` is the union of discovered call targets and debug-source
/// function seeds, in local coordinates.
pub fn tag_function_owners(blocks: &mut BTreeMap<u32, MicroBlock>, entries: &BTreeSet<u32>) {
    for &entry in entries {
        if !blocks.contains_key(&entry) {
            continue;
        }
        for addr in function_blocks(entry, blocks) {
            if let Some(block) = blocks.get_mut(&addr) {
                block.owning_functions.insert(entry);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(addr: u32, outs: &[(u32, JumpType)]) -> MicroBlock {
        let mut b = MicroBlock::new(addr);
        b.outs = outs.iter().copied().collect();
        b
    }

    #[test]
    fn ownership_does_not_cross_call_edges() {
        let mut blocks = BTreeMap::new();
        blocks.insert(0, block(0, &[(8, JumpType::Call), (4, JumpType::Control)]));
        blocks.insert(4, block(4, &[]));
        blocks.insert(8, block(8, &[]));

        let entries: BTreeSet<u32> = [0, 8].into_iter().collect();
        tag_function_owners(&mut blocks, &entries);

        assert!(blocks[&0].owning_functions.contains(&0));
        assert!(blocks[&4].owning_functions.contains(&0));
        assert!(!blocks[&8].owning_functions.contains(&0));
        assert!(blocks[&8].owning_functions.contains(&8));
    }

    #[test]
    fn shared_tail_is_owned_by_both_functions() {
        let mut blocks = BTreeMap::new();
        blocks.insert(0, block(0, &[(12, JumpType::Jump)]));
        blocks.insert(4, block(4, &[(12, JumpType::Jump)]));
        blocks.insert(12, block(12, &[]));

        let entries: BTreeSet<u32> = [0, 4].into_iter().collect();
        tag_function_owners(&mut blocks, &entries);

        let tail = &blocks[&12].owning_functions;
        assert!(tail.contains(&0) && tail.contains(&4));
    }
}
