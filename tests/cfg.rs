// SPDX-License-Identifier: GPL-3.0-or-later
//! Pipeline tests: edge reversal, basic-block fusion, function
//! ownership, peephole conservation.

use psx_decompiler::cfg::{analyze, disassemble, reverse_edges, simplify};
use psx_decompiler::exe::{Executable, HEADER_SIZE, MAGIC};
use psx_decompiler::microcode::JumpType;
use psx_decompiler::symbols::DebugSource;
use std::collections::BTreeMap;

fn image(t_addr: u32, words: &[u32]) -> Vec<u8> {
    let mut data = vec![0u8; HEADER_SIZE];
    data[..8].copy_from_slice(MAGIC);
    data[0x10..0x14].copy_from_slice(&t_addr.to_le_bytes());
    data[0x18..0x1c].copy_from_slice(&t_addr.to_le_bytes());
    data[0x1c..0x20].copy_from_slice(&((words.len() * 4) as u32).to_le_bytes());
    for word in words {
        data.extend_from_slice(&word.to_le_bytes());
    }
    data
}

fn exe_with(t_addr: u32, words: &[u32]) -> Executable {
    Executable::parse(&image(t_addr, words)).unwrap()
}

/// A small program with a conditional, a call and a return:
///
/// ```text
/// 0:  beq $a0, $zero, +3  -> 16
/// 4:  nop
/// 8:  addiu $v0, $zero, 1
/// 12: nop
/// 16: jr $ra
/// 20: nop
/// ```
const PROGRAM: [u32; 6] = [0x1080_0003, 0, 0x2402_0001, 0, 0x03e0_0008, 0];

#[test]
fn block_keys_match_block_addresses() {
    let exe = exe_with(0x8001_0000, &PROGRAM);
    let analysis = analyze(&exe, &DebugSource::default());
    for (&addr, block) in &analysis.blocks {
        assert_eq!(addr, block.address);
    }
}

#[test]
fn ins_is_the_exact_transpose_of_outs() {
    let exe = exe_with(0x8001_0000, &PROGRAM);
    let analysis = analyze(&exe, &DebugSource::default());
    let blocks = &analysis.blocks;

    for (&from, block) in blocks {
        for (&to, &kind) in &block.outs {
            assert_eq!(blocks[&to].ins.get(&from), Some(&kind));
        }
    }
    for (&to, block) in blocks {
        for (&from, &kind) in &block.ins {
            assert_eq!(blocks[&from].outs.get(&to), Some(&kind));
        }
    }
}

#[test]
fn straight_line_code_fuses_into_one_block() {
    // addiu; addiu; jr $ra; nop
    let words = [0x2402_0001, 0x2402_0002, 0x03e0_0008, 0];
    let exe = exe_with(0x8001_0000, &words);
    let analysis = analyze(&exe, &DebugSource::default());

    assert_eq!(analysis.blocks.len(), 1);
    let block = &analysis.blocks[&0];
    // Two adds, the delay-slot nop, and the return.
    assert_eq!(block.insns.len(), 4);
    assert!(block.outs.is_empty());
}

#[test]
fn fusion_keeps_branch_targets_separate() {
    let exe = exe_with(0x8001_0000, &PROGRAM);
    let analysis = analyze(&exe, &DebugSource::default());

    // Condition block, fall-through body, shared return.
    assert_eq!(analysis.blocks.len(), 3);
    assert!(analysis.blocks.contains_key(&0));
    assert!(analysis.blocks.contains_key(&8));
    assert!(analysis.blocks.contains_key(&16));

    let cond = &analysis.blocks[&0];
    assert_eq!(cond.outs.get(&16), Some(&JumpType::JumpConditional));
    assert_eq!(cond.outs.get(&8), Some(&JumpType::Control));

    let body = &analysis.blocks[&8];
    assert_eq!(body.insns.len(), 2);
    assert_eq!(body.outs.get(&16), Some(&JumpType::Control));
}

#[test]
fn fused_blocks_have_at_most_one_control_predecessor() {
    let exe = exe_with(0x8001_0000, &PROGRAM);
    let analysis = analyze(&exe, &DebugSource::default());
    for block in analysis.blocks.values() {
        let control_ins = block
            .ins
            .values()
            .filter(|&&kind| kind == JumpType::Control)
            .count();
        assert!(control_ins <= 1);
    }
}

#[test]
fn edges_to_undecoded_targets_are_dropped_from_both_maps() {
    // j far beyond the image; nop.
    let exe = exe_with(0x8000_0000, &[0x0800_0800, 0]);
    let raw = disassemble(&exe, &DebugSource::default());
    let mut blocks = raw.blocks;
    assert!(blocks[&0].outs.contains_key(&0x2000));

    reverse_edges(&mut blocks);
    assert!(blocks[&0].outs.is_empty());
    assert!(blocks.values().all(|b| b.ins.is_empty()));
}

#[test]
fn callers_and_callees_get_distinct_ownership() {
    // 0: jal 16; 4: nop; 8: jr $ra; 12: nop; 16: jr $ra; 20: nop
    let words = [0x0c00_4004, 0, 0x03e0_0008, 0, 0x03e0_0008, 0];
    let exe = exe_with(0x8001_0000, &words);

    let mut symbols = DebugSource::default();
    symbols.add_function(0x8001_0000, Some("main".to_string()));
    let analysis = analyze(&exe, &symbols);

    assert!(analysis.functions.contains(&0));
    assert!(analysis.functions.contains(&16));

    let main = &analysis.blocks[&0];
    assert!(main.owning_functions.contains(&0));
    assert!(!main.owning_functions.contains(&16));

    // The call's fall-through belongs to the caller.
    let after_call = &analysis.blocks[&8];
    assert!(after_call.owning_functions.contains(&0));

    // The callee is owned by itself only: the call edge is not followed.
    let callee = &analysis.blocks[&16];
    assert!(callee.owning_functions.contains(&16));
    assert!(!callee.owning_functions.contains(&0));
}

#[test]
fn peephole_preserves_addresses_and_edges() {
    let words = [0x2402_0000, 0x2882_fff0, 0x03e0_0008, 0];
    let exe = exe_with(0x8001_0000, &words);
    let raw = disassemble(&exe, &DebugSource::default());
    let mut blocks = raw.blocks;
    reverse_edges(&mut blocks);

    let addresses_of = |blocks: &BTreeMap<u32, _>| -> Vec<u32> { blocks.keys().copied().collect() };
    let edges_before: Vec<_> = blocks
        .values()
        .flat_map(|b: &psx_decompiler::microcode::MicroBlock| b.outs.clone())
        .collect();
    let addrs_before = addresses_of(&blocks);

    let applied = simplify(&mut blocks, &DebugSource::default());
    // addiu $v0, $zero, 0 folds; the slti immediate folds through its tmp.
    assert!(applied >= 2);

    let edges_after: Vec<_> = blocks.values().flat_map(|b| b.outs.clone()).collect();
    assert_eq!(addrs_before, addresses_of(&blocks));
    assert_eq!(edges_before, edges_after);
}

#[test]
fn analysis_is_deterministic() {
    let exe = exe_with(0x8001_0000, &PROGRAM);
    let a = analyze(&exe, &DebugSource::default());
    let b = analyze(&exe, &DebugSource::default());
    assert_eq!(a.next_tmp_id, b.next_tmp_id);
    assert_eq!(
        a.blocks.keys().collect::<Vec<_>>(),
        b.blocks.keys().collect::<Vec<_>>()
    );
}
