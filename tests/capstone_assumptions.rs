// SPDX-License-Identifier: GPL-3.0-or-later
//! Cross-checks of the hand-rolled decoder against Capstone.
//!
//! Capstone stays a dev-dependency only: the analyzer needs micro-ops,
//! not assembly text, so production decoding is done in-crate. These
//! tests pin the classification of a word sample to what Capstone says
//! about the same bytes, and document the Capstone quirks the comparison
//! has to work around:
//!
//! - `jal` carries no CALL group (only `jalr` does)
//! - `jr $ra` carries JUMP, never RET
//! - conditional branches carry both BRANCH_RELATIVE and JUMP

use capstone::arch::mips::MipsInsnGroup;
use capstone::prelude::*;

use psx_decompiler::cfg::disassemble;
use psx_decompiler::exe::{Executable, HEADER_SIZE, MAGIC};
use psx_decompiler::microcode::Op;
use psx_decompiler::symbols::DebugSource;

fn create_capstone() -> Capstone {
    Capstone::new()
        .mips()
        .mode(arch::mips::ArchMode::Mips32)
        .endian(capstone::Endian::Little)
        .detail(true)
        .build()
        .expect("Failed to create Capstone instance")
}

fn image(words: &[u32]) -> Vec<u8> {
    let t_addr: u32 = 0x8001_0000;
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

fn capstone_mnemonic(cs: &Capstone, word: u32) -> String {
    let bytes = word.to_le_bytes();
    let insns = cs.disasm_count(&bytes, 0, 1).expect("disassembly failed");
    let insn = insns.iter().next().expect("no instruction decoded");
    insn.mnemonic().unwrap_or("").to_string()
}

fn has_group(cs: &Capstone, word: u32, group: u32) -> bool {
    let bytes = word.to_le_bytes();
    let insns = cs.disasm_count(&bytes, 0, 1).expect("disassembly failed");
    let insn = insns.iter().next().expect("no instruction decoded");
    cs.insn_detail(insn)
        .expect("no detail")
        .groups()
        .iter()
        .any(|g| g.0 as u32 == group)
}

/// Decode a word (with a nop in its delay slot) and return the last
/// micro-op of the resulting block.
fn last_micro_op(word: u32) -> Op {
    let exe = Executable::parse(&image(&[word, 0, 0, 0])).unwrap();
    let result = disassemble(&exe, &DebugSource::default());
    result.blocks[&0].insns.last().unwrap().op
}

#[test]
fn nop_matches_capstone() {
    let cs = create_capstone();
    assert_eq!(capstone_mnemonic(&cs, 0x0000_0000), "nop");
    assert_eq!(last_micro_op(0x0000_0000), Op::Nop);
}

#[test]
fn words_capstone_calls_jumps_end_in_transfers() {
    let cs = create_capstone();
    // j 0x80010100; jr $t0; jr $ra
    for word in [0x0800_4040u32, 0x0100_0008, 0x03e0_0008] {
        assert!(has_group(&cs, word, MipsInsnGroup::MIPS_GRP_JUMP));
        let op = last_micro_op(word);
        assert!(
            matches!(op, Op::Jmp | Op::Return),
            "{:#010x} -> {:?}",
            word,
            op
        );
    }
}

#[test]
fn jr_ra_is_a_return_despite_capstones_missing_ret_group() {
    let cs = create_capstone();
    let word = 0x03e0_0008;
    assert!(!has_group(&cs, word, MipsInsnGroup::MIPS_GRP_RET));
    assert_eq!(last_micro_op(word), Op::Return);
}

#[test]
fn relative_branches_end_in_conditional_transfers() {
    let cs = create_capstone();
    // beq $t0, $t1, +3; bne $t0, $t1, +3; bgtz $t0, +3
    for word in [0x1109_0003u32, 0x1509_0003, 0x1d00_0003] {
        assert!(has_group(&cs, word, MipsInsnGroup::MIPS_GRP_BRANCH_RELATIVE));
        assert_eq!(last_micro_op(word), Op::JmpIf);
    }
}

#[test]
fn jal_has_no_call_group_but_decodes_as_a_call() {
    let cs = create_capstone();
    let word = 0x0c00_4040; // jal 0x80010100
    assert_eq!(capstone_mnemonic(&cs, word), "jal");
    assert!(!has_group(&cs, word, MipsInsnGroup::MIPS_GRP_CALL));
    assert_eq!(last_micro_op(word), Op::Call);
}

#[test]
fn alu_mnemonics_agree_on_a_sample() {
    let cs = create_capstone();
    let samples: &[(u32, &str, Op)] = &[
        (0x2402_0005, "addiu", Op::Add),       // addiu $v0, $zero, 5
        (0x3c08_8001, "lui", Op::Copy),        // lui $t0, 0x8001
        (0x0109_4024, "and", Op::And),         // and $t0, $t0, $t1
        (0x0109_4026, "xor", Op::Xor),         // xor $t0, $t0, $t1
        (0x0109_402a, "slt", Op::SetLtSigned), // slt $t0, $t0, $t1
    ];
    for &(word, mnemonic, op) in samples {
        assert_eq!(capstone_mnemonic(&cs, word), mnemonic);
        let exe = Executable::parse(&image(&[word])).unwrap();
        let result = disassemble(&exe, &DebugSource::default());
        assert_eq!(result.blocks[&0].insns[0].op, op);
    }
}
