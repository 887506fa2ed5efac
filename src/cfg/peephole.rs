// SPDX-License-Identifier: GPL-3.0-or-later
//! Per-block peephole simplification.
//!
//! Rules may only remove or fuse micro-ops; they never introduce new side
//! effects, never touch a block's edges, and never move an instruction
//! across the block terminator. Each applied rewrite is counted so the
//! driver can report the total.

use std::collections::BTreeMap;

use crate::microcode::{Arg, MicroBlock, MicroInsn, Op, Register};
use crate::symbols::DebugSource;

/// Fill in symbol names on resolved addresses that lack one. Address
/// arguments are always global, so the lookup is direct.
fn resolve_symbols(block: &mut MicroBlock, symbols: &DebugSource) -> usize {
    let mut applied = 0;
    for insn in &mut block.insns {
        for arg in &mut insn.args {
            if let Arg::Addr { addr, symbol, .. } = arg
                && symbol.is_none()
                && let Some(name) = symbols.symbol_name(*addr)
            {
                *symbol = Some(name.to_string());
                applied += 1;
            }
        }
    }
    applied
}

/// The constant a materializing op pins into a tmp register, widened to
/// 32 bits, if the instruction is such a materialization.
fn materialized_const(insn: &MicroInsn) -> Option<(Register, u64)> {
    let [Arg::Reg { reg: reg @ Register::Tmp(_), .. }, Arg::Const { value, bits }] =
        insn.args.as_slice()
    else {
        return None;
    };
    let widened = match insn.op {
        Op::Copy => *value,
        Op::CastSigned => {
            if *bits == 16 {
                (*value as u16 as i16 as i64 as u64) & 0xffff_ffff
            } else {
                *value
            }
        }
        Op::CastUnsigned => *value & ((1u64 << *bits.min(&63)) - 1),
        _ => return None,
    };
    Some((*reg, widened))
}

/// Count source uses of `reg` from `insns`.
fn source_uses(insns: &[MicroInsn], reg: Register) -> usize {
    insns
        .iter()
        .map(|insn| {
            insn.args
                .iter()
                .enumerate()
                .filter(|(i, arg)| {
                    let is_dest = *i == 0
                        && insn.op.writes_first_arg()
                        && matches!(arg, Arg::Reg { .. });
                    !is_dest && arg.source_register() == Some(reg)
                })
                .count()
        })
        .sum()
}

/// Fold a constant materialized into a tmp register into its single use
/// in the immediately following instruction, dropping the materializer.
fn forward_constants(block: &mut MicroBlock) -> usize {
    let mut applied = 0;
    let mut i = 0;
    while i + 1 < block.insns.len() {
        let Some((tmp, value)) = materialized_const(&block.insns[i]) else {
            i += 1;
            continue;
        };
        let next_writes = block.insns[i + 1].op.writes_first_arg();
        if !next_writes || source_uses(&block.insns[i + 1..], tmp) != 1 {
            i += 1;
            continue;
        }
        let next = &mut block.insns[i + 1];
        let mut folded = false;
        for (slot, arg) in next.args.iter_mut().enumerate() {
            if slot > 0
                && let Arg::Reg { reg, .. } = arg
                && *reg == tmp
            {
                *arg = Arg::constant(value, 32);
                folded = true;
                break;
            }
        }
        if folded {
            block.insns.remove(i);
            applied += 1;
        } else {
            i += 1;
        }
    }
    applied
}

/// Whether an argument is the constant zero.
fn is_zero(arg: &Arg) -> bool {
    matches!(arg, Arg::Const { value: 0, .. })
}

/// Rewrite additive/bitwise identities into plain copies:
/// `add d, x, 0`, `or d, 0, x`, `xor d, x, 0`, `sub d, x, 0` and the
/// commuted forms all become `copy d, x`.
fn fold_identities(block: &mut MicroBlock) -> usize {
    let mut applied = 0;
    for insn in &mut block.insns {
        let commutes = matches!(insn.op, Op::Add | Op::Or | Op::Xor);
        let folds_right = commutes || insn.op == Op::Sub;
        if !folds_right || insn.args.len() != 3 {
            continue;
        }
        let source = if is_zero(&insn.args[2]) {
            Some(insn.args[1].clone())
        } else if commutes && is_zero(&insn.args[1]) {
            Some(insn.args[2].clone())
        } else {
            None
        };
        if let Some(source) = source {
            let dest = insn.args[0].clone();
            insn.op = Op::Copy;
            insn.args = vec![dest, source];
            applied += 1;
        }
    }
    applied
}

/// Apply every rule to every block. Returns the number of rewrites.
pub fn simplify(blocks: &mut BTreeMap<u32, MicroBlock>, symbols: &DebugSource) -> usize {
    let mut applied = 0;
    for block in blocks.values_mut() {
        applied += resolve_symbols(block, symbols);
        applied += fold_identities(block);
        applied += forward_constants(block);
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::microcode::TMP_BASE;

    #[test]
    fn addiu_zero_becomes_copy() {
        let mut block = MicroBlock::new(0);
        block.push(MicroInsn::new(
            0,
            Op::Add,
            vec![
                Arg::reg(Register::Gpr(2), 32),
                Arg::reg(Register::Gpr(4), 32),
                Arg::constant(0, 16),
            ],
        ));
        assert_eq!(fold_identities(&mut block), 1);
        assert_eq!(block.insns[0].op, Op::Copy);
        assert_eq!(block.insns[0].args.len(), 2);
    }

    #[test]
    fn slti_immediate_folds_through_the_tmp() {
        let tmp = Register::Tmp(TMP_BASE);
        let mut block = MicroBlock::new(0);
        block.push(MicroInsn::new(
            0,
            Op::CastSigned,
            vec![Arg::reg(tmp, 32), Arg::constant(0xfff0, 16)],
        ));
        block.push(MicroInsn::new(
            0,
            Op::SetLtSigned,
            vec![
                Arg::reg(Register::Gpr(2), 32),
                Arg::reg(Register::Gpr(4), 32),
                Arg::reg(tmp, 32),
            ],
        ));
        assert_eq!(forward_constants(&mut block), 1);
        assert_eq!(block.insns.len(), 1);
        // -16 sign-extended into a 32-bit constant.
        assert_eq!(
            block.insns[0].args[2],
            Arg::constant(0xffff_fff0, 32)
        );
    }

    #[test]
    fn multi_use_tmps_are_left_alone() {
        let tmp = Register::Tmp(TMP_BASE);
        let mut block = MicroBlock::new(0);
        block.push(MicroInsn::new(
            0,
            Op::Copy,
            vec![Arg::reg(tmp, 32), Arg::constant(1, 32)],
        ));
        block.push(MicroInsn::new(
            0,
            Op::Add,
            vec![Arg::reg(Register::Gpr(2), 32), Arg::reg(tmp, 32), Arg::reg(tmp, 32)],
        ));
        assert_eq!(forward_constants(&mut block), 0);
        assert_eq!(block.insns.len(), 2);
    }
}
