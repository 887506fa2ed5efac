// SPDX-License-Identifier: GPL-3.0-or-later
//! The micro-assembly model: opcodes, arguments, instructions, blocks.
//!
//! Every decoded MIPS instruction becomes one or more micro-instructions.
//! Micro-instructions are deliberately simple: at most one operation, with
//! the destination (when there is one) as the first argument. Blocks carry
//! typed in/out edges keyed on local addresses.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::mips::{CP0_REG_NAMES, GPR_NAMES};

/// Micro-operation kinds. A closed set; everything the analyzer does not
/// model semantically decodes as `Unsupported` with its operands kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Nop,
    /// An opaque data word; decoding recognized nothing.
    Data,
    Copy,
    Add,
    Sub,
    And,
    Or,
    Xor,
    Not,
    Shl,
    Srl,
    Sra,
    SetEq,
    SetNe,
    SetLtSigned,
    SetLeSigned,
    SetLtUnsigned,
    /// Unconditional transfer.
    Jmp,
    /// Transfer if the first argument (a 1-bit register) is set.
    JmpIf,
    Call,
    Return,
    CastSigned,
    CastUnsigned,
    Unsupported(&'static str),
}

impl Op {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Nop => "nop",
            Op::Data => ".word",
            Op::Copy => "copy",
            Op::Add => "add",
            Op::Sub => "sub",
            Op::And => "and",
            Op::Or => "or",
            Op::Xor => "xor",
            Op::Not => "not",
            Op::Shl => "shl",
            Op::Srl => "srl",
            Op::Sra => "sra",
            Op::SetEq => "seteq",
            Op::SetNe => "setne",
            Op::SetLtSigned => "slt",
            Op::SetLeSigned => "sle",
            Op::SetLtUnsigned => "sltu",
            Op::Jmp => "jmp",
            Op::JmpIf => "jif",
            Op::Call => "call",
            Op::Return => "ret",
            Op::CastSigned => "scast",
            Op::CastUnsigned => "ucast",
            Op::Unsupported(name) => name,
        }
    }

    /// Whether the first argument is a destination written by this
    /// operation. `Unsupported` conservatively claims no destination.
    pub fn writes_first_arg(&self) -> bool {
        matches!(
            self,
            Op::Copy
                | Op::Add
                | Op::Sub
                | Op::And
                | Op::Or
                | Op::Xor
                | Op::Not
                | Op::Shl
                | Op::Srl
                | Op::Sra
                | Op::SetEq
                | Op::SetNe
                | Op::SetLtSigned
                | Op::SetLeSigned
                | Op::SetLtUnsigned
                | Op::Call
                | Op::CastSigned
                | Op::CastUnsigned
        )
    }
}

/// A register reference.
///
/// `Tmp` registers are decoder-invented scratch values; their ids start at
/// 1000 and increase monotonically within one disassembly session so that
/// no tmp is ever reused across blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Register {
    Gpr(u8),
    C0(u8),
    C2Data(u8),
    C2Ctrl(u8),
    Tmp(u32),
}

/// GPR number of $gp, the global-pointer register.
pub const GP: u8 = 28;
/// GPR number of $ra, the link register.
pub const RA: u8 = 31;

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Gpr(n) => write!(f, "${}", GPR_NAMES[*n as usize & 31]),
            Register::C0(n) => write!(f, "${}", CP0_REG_NAMES[*n as usize & 31]),
            Register::C2Data(n) => write!(f, "$C2_{}", n),
            Register::C2Ctrl(n) => write!(f, "$C2C_{}", n),
            Register::Tmp(id) => write!(f, "$tmp{}", id),
        }
    }
}

/// First temporary id handed out by a fresh allocator.
pub const TMP_BASE: u32 = 1000;

/// Allocator for temporary register ids, reset per disassembly session.
#[derive(Debug)]
pub struct TmpAllocator {
    next: u32,
}

impl Default for TmpAllocator {
    fn default() -> Self {
        TmpAllocator { next: TMP_BASE }
    }
}

impl TmpAllocator {
    pub fn fresh(&mut self) -> Register {
        let id = self.next;
        self.next += 1;
        Register::Tmp(id)
    }

    /// The next id that would be handed out. Exported so runs on the same
    /// input can be checked for determinism.
    pub fn next_id(&self) -> u32 {
        self.next
    }
}

/// A micro-instruction argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// An immediate constant. `bits` of 16 marks a sign-extendable MIPS
    /// immediate; 32 a full word.
    Const { value: u64, bits: u8 },
    Reg { reg: Register, bits: u8 },
    /// A resolved absolute address, optionally with a symbol name.
    Addr {
        addr: u32,
        symbol: Option<String>,
        bits: u8,
    },
    /// A memory operand: base register plus signed displacement.
    RegMem {
        base: Register,
        offset: i32,
        bits: u8,
    },
}

impl Arg {
    pub fn constant(value: u64, bits: u8) -> Self {
        Arg::Const { value, bits }
    }

    pub fn reg(reg: Register, bits: u8) -> Self {
        Arg::Reg { reg, bits }
    }

    pub fn addr(addr: u32, symbol: Option<String>, bits: u8) -> Self {
        Arg::Addr { addr, symbol, bits }
    }

    pub fn reg_mem(base: Register, offset: i32, bits: u8) -> Self {
        Arg::RegMem { base, offset, bits }
    }

    /// The register this argument reads through, if any. For memory
    /// operands that is the base register (address computation).
    pub fn source_register(&self) -> Option<Register> {
        match self {
            Arg::Reg { reg, .. } => Some(*reg),
            Arg::RegMem { base, .. } => Some(*base),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Const { value, .. } => write!(f, "{:#x}", value),
            Arg::Reg { reg, .. } => write!(f, "{}", reg),
            Arg::Addr {
                symbol: Some(name), ..
            } => write!(f, "{}", name),
            Arg::Addr { addr, .. } => write!(f, "{:#010x}", addr),
            Arg::RegMem { base, offset, .. } => {
                if *offset >= 0 {
                    write!(f, "[{}+{:#x}]", base, offset)
                } else {
                    write!(f, "[{}-{:#x}]", base, -(*offset as i64))
                }
            }
        }
    }
}

/// One micro-instruction, tagged with the local address of the machine
/// word it was decoded from (delay-slot micro-ops keep the delay word's
/// address even though they are emitted before the branch op).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicroInsn {
    pub addr: u32,
    pub op: Op,
    pub args: Vec<Arg>,
}

impl MicroInsn {
    pub fn new(addr: u32, op: Op, args: Vec<Arg>) -> Self {
        MicroInsn { addr, op, args }
    }

    /// The register written by this instruction, if any.
    pub fn output_register(&self) -> Option<Register> {
        if !self.op.writes_first_arg() {
            return None;
        }
        match self.args.first() {
            Some(Arg::Reg { reg, .. }) => Some(*reg),
            // A memory destination writes no register.
            _ => None,
        }
    }

    /// Registers read by this instruction.
    pub fn input_registers(&self) -> BTreeSet<Register> {
        let mut inputs = BTreeSet::new();
        let skip_first = self.op.writes_first_arg()
            && matches!(self.args.first(), Some(Arg::Reg { .. }));
        for (i, arg) in self.args.iter().enumerate() {
            if i == 0 && skip_first {
                continue;
            }
            if let Some(reg) = arg.source_register() {
                inputs.insert(reg);
            }
        }
        inputs
    }
}

impl fmt::Display for MicroInsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.op.mnemonic())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", arg)?;
            } else {
                write!(f, ", {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How control reaches a block (or leaves one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpType {
    Call,
    CallConditional,
    Jump,
    JumpConditional,
    /// Sequential fall-through.
    Control,
}

/// A straight-line sequence of micro-ops owned by one local address, with
/// typed in/out edges to other blocks.
#[derive(Debug, Clone, Default)]
pub struct MicroBlock {
    /// Local address; always equals this block's key in the block map.
    pub address: u32,
    pub insns: Vec<MicroInsn>,
    /// Successor local address to edge kind.
    pub outs: BTreeMap<u32, JumpType>,
    /// Predecessor local address to edge kind; transpose of `outs` across
    /// the block map after the reversal pass.
    pub ins: BTreeMap<u32, JumpType>,
    /// Local entry addresses of the functions this block belongs to.
    pub owning_functions: BTreeSet<u32>,
}

impl MicroBlock {
    pub fn new(address: u32) -> Self {
        MicroBlock {
            address,
            ..Default::default()
        }
    }

    pub fn push(&mut self, insn: MicroInsn) {
        self.insns.push(insn);
    }

    /// The target of this block's terminator when it is an unconditional
    /// jump to a known absolute address.
    pub fn unconditional_jump_target(&self) -> Option<u32> {
        let last = self.insns.last()?;
        if last.op != Op::Jmp || last.args.len() != 1 {
            return None;
        }
        match &last.args[0] {
            Arg::Addr { addr, .. } => Some(*addr),
            _ => None,
        }
    }

    /// One-line human-readable rendering of the whole block.
    pub fn text(&self) -> String {
        let parts: Vec<String> = self.insns.iter().map(|i| i.to_string()).collect();
        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_ids_start_at_base_and_increase() {
        let mut tmps = TmpAllocator::default();
        assert_eq!(tmps.fresh(), Register::Tmp(TMP_BASE));
        assert_eq!(tmps.fresh(), Register::Tmp(TMP_BASE + 1));
        assert_eq!(tmps.next_id(), TMP_BASE + 2);
    }

    #[test]
    fn insn_renders_one_line() {
        let insn = MicroInsn::new(
            0,
            Op::Add,
            vec![
                Arg::reg(Register::Gpr(2), 32),
                Arg::reg(Register::Gpr(4), 32),
                Arg::constant(0x10, 16),
            ],
        );
        assert_eq!(insn.to_string(), "add $v0, $a0, 0x10");
    }

    #[test]
    fn store_has_no_output_register() {
        let store = MicroInsn::new(
            0,
            Op::Copy,
            vec![
                Arg::reg_mem(Register::Gpr(29), 8, 32),
                Arg::reg(Register::Gpr(2), 32),
            ],
        );
        assert_eq!(store.output_register(), None);
        // The base register of the destination is still an input.
        assert!(store.input_registers().contains(&Register::Gpr(29)));
        assert!(store.input_registers().contains(&Register::Gpr(2)));
    }

    #[test]
    fn jump_target_only_for_unconditional_address_jumps() {
        let mut block = MicroBlock::new(0);
        block.push(MicroInsn::new(
            0,
            Op::Jmp,
            vec![Arg::addr(0x8001_2000, None, 32)],
        ));
        assert_eq!(block.unconditional_jump_target(), Some(0x8001_2000));

        let mut indirect = MicroBlock::new(4);
        indirect.push(MicroInsn::new(
            4,
            Op::Jmp,
            vec![Arg::reg(Register::Gpr(2), 32)],
        ));
        assert_eq!(indirect.unconditional_jump_target(), None);
    }
}
