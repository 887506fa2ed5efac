// SPDX-License-Identifier: GPL-3.0-or-later
//! The MIPS-to-microcode decoder.
//!
//! One call decodes one 32-bit word into a micro-block under
//! construction. Branches recursively decode the word in their delay slot
//! first, so the delay-slot micro-ops land *before* the transfer micro-op
//! while the branch edge is recorded on the same block. The delay-slot
//! mode controls whether the inlined instruction may record a sequential
//! fall-through edge.

use std::collections::BTreeSet;

use crate::exe::Executable;
use crate::microcode::{Arg, GP, JumpType, MicroBlock, MicroInsn, Op, RA, Register, TmpAllocator};
use crate::mips::{self, gte};
use crate::symbols::DebugSource;

/// How the word being decoded relates to a branch's delay slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelaySlotMode {
    /// Not in a delay slot.
    None,
    /// Delay slot of a branch that may fall through (conditional branches,
    /// calls): sequential reachability is still recorded.
    ContinueControl,
    /// Delay slot of a transfer that never falls through (`j`, `jr`,
    /// `jalr`): no sequential edge is recorded.
    AbortControl,
}

/// Decoder state for one disassembly session.
///
/// Holds the text image (delay-slot decoding reads words at arbitrary
/// offsets), the resolved $gp base, the temporary-register allocator, and
/// the set of call targets seen so far.
pub struct Decoder<'a> {
    exe: &'a Executable,
    symbols: &'a DebugSource,
    gp_base: Option<u32>,
    pub tmps: TmpAllocator,
    /// Local addresses of every call target (`jal`, linked conditional
    /// branches). Seeds function-ownership tagging.
    pub callees: BTreeSet<u32>,
}

impl<'a> Decoder<'a> {
    pub fn new(exe: &'a Executable, symbols: &'a DebugSource) -> Self {
        let gp_base = symbols.gp_base();
        if let Some(base) = gp_base {
            log::debug!("using $gp base {:#010x}", base);
        }
        Decoder {
            exe,
            symbols,
            gp_base,
            tmps: TmpAllocator::default(),
            callees: BTreeSet::new(),
        }
    }

    /// Decode `word` into `block`. `next_local` is the local address of
    /// the *following* instruction (the word's own address plus 4).
    pub fn decode(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        let addr = next_local.wrapping_sub(4);

        match mips::opcode(word) {
            0x00 => self.decode_special(block, word, addr, next_local, mode),
            0x01 => self.decode_rel_zero_branch(block, word, addr, next_local, mode),
            0x02 => self.decode_j(block, word, addr, next_local, mode),
            0x03 => self.decode_jal(block, word, addr, next_local, mode),
            0x04..=0x07 | 0x14..=0x17 => {
                self.decode_compare_branch(block, word, addr, next_local, mode)
            }
            0x08 | 0x09 => {
                // addi/addiu: a 16-bit constant marks a signed immediate.
                let args = vec![
                    self.gpr_dest(mips::rt(word)),
                    self.gpr_arg(mips::rs(word)),
                    Arg::constant(mips::imm16(word) as u64, 16),
                ];
                block.push(MicroInsn::new(addr, Op::Add, args));
                self.fall_through(block, next_local, mode);
            }
            0x0a | 0x0b => self.decode_slti(block, word, addr, next_local, mode),
            0x0c..=0x0e => {
                let op = match mips::opcode(word) {
                    0x0c => Op::And,
                    0x0d => Op::Or,
                    _ => Op::Xor,
                };
                let args = vec![
                    self.gpr_dest(mips::rt(word)),
                    self.gpr_arg(mips::rs(word)),
                    Arg::constant(mips::imm16(word) as u64, 32),
                ];
                block.push(MicroInsn::new(addr, op, args));
                self.fall_through(block, next_local, mode);
            }
            0x0f => {
                let value = (mips::imm16(word) as u64) << 16;
                let args = vec![self.gpr_dest(mips::rt(word)), Arg::constant(value, 32)];
                block.push(MicroInsn::new(addr, Op::Copy, args));
                self.fall_through(block, next_local, mode);
            }
            0x10 => self.decode_cop0(block, word, addr, next_local, mode),
            0x11 => {
                // No FPU on this CPU; keep the raw command word around.
                block.push(MicroInsn::new(
                    addr,
                    Op::Unsupported("cop1"),
                    vec![Arg::constant(mips::imm25(word) as u64, 25)],
                ));
                self.fall_through(block, next_local, mode);
            }
            0x12 => self.decode_cop2(block, word, addr, next_local, mode),
            0x20 | 0x21 | 0x23 | 0x24 | 0x25 => {
                self.decode_load(block, word, addr, next_local, mode)
            }
            0x22 | 0x26 => {
                let name = if mips::opcode(word) == 0x22 { "lwl" } else { "lwr" };
                let args = vec![self.gpr_dest(mips::rt(word)), self.mem_arg(word, 32)];
                block.push(MicroInsn::new(addr, Op::Unsupported(name), args));
                self.fall_through(block, next_local, mode);
            }
            0x28 | 0x29 | 0x2b => self.decode_store(block, word, addr, next_local, mode),
            0x2a | 0x2e => {
                let name = if mips::opcode(word) == 0x2a { "swl" } else { "swr" };
                let args = vec![self.mem_arg(word, 32), self.gpr_arg(mips::rt(word))];
                block.push(MicroInsn::new(addr, Op::Unsupported(name), args));
                self.fall_through(block, next_local, mode);
            }
            0x32 => {
                // lwc2: a COP2 move through memory.
                let args = vec![
                    Arg::reg(Register::C2Data(mips::rt(word)), 32),
                    self.mem_arg(word, 32),
                ];
                block.push(MicroInsn::new(addr, Op::Copy, args));
                self.fall_through(block, next_local, mode);
            }
            0x3a => {
                let args = vec![
                    self.mem_arg(word, 32),
                    Arg::reg(Register::C2Data(mips::rt(word)), 32),
                ];
                block.push(MicroInsn::new(addr, Op::Copy, args));
                self.fall_through(block, next_local, mode);
            }
            _ => self.data_word(block, word, addr),
        }
    }

    // ---------------------------------------------------------------------
    // Operand construction
    // ---------------------------------------------------------------------

    /// Zero-aware GPR source operand: $zero reads as the constant 0.
    fn gpr_arg(&self, n: u8) -> Arg {
        if n == 0 {
            Arg::constant(0, 32)
        } else {
            Arg::reg(Register::Gpr(n), 32)
        }
    }

    /// GPR destination operand. Writes to $zero are architecturally
    /// discarded but kept as-is in the micro form.
    fn gpr_dest(&self, n: u8) -> Arg {
        Arg::reg(Register::Gpr(n), 32)
    }

    /// Register+offset memory operand. When the base is $gp and a gp base
    /// is known, the operand resolves to an absolute address.
    fn mem_arg(&self, word: u32, bits: u8) -> Arg {
        let base = mips::rs(word);
        let offset = mips::simm16(word);
        if base == GP
            && let Some(gp) = self.gp_base
        {
            let addr = gp.wrapping_add(offset as i32 as u32);
            let symbol = self.symbols.symbol_name(addr).map(str::to_string);
            return Arg::addr(addr, symbol, bits);
        }
        Arg::reg_mem(Register::Gpr(base), offset as i32, bits)
    }

    /// Branch/jump target operand: the absolute address, with a symbol
    /// name when the debug source knows one.
    fn target_arg(&self, target_local: u32) -> Arg {
        let global = self.exe.to_global(target_local);
        let symbol = self.symbols.symbol_name(global).map(str::to_string);
        Arg::addr(global, symbol, 32)
    }

    // ---------------------------------------------------------------------
    // Control flow plumbing
    // ---------------------------------------------------------------------

    /// Record sequential reachability out of a non-transfer instruction.
    fn fall_through(&self, block: &mut MicroBlock, next_local: u32, mode: DelaySlotMode) {
        if mode != DelaySlotMode::AbortControl {
            block.outs.insert(next_local, JumpType::Control);
        }
    }

    /// An unrecognized word: opaque data, no edges out.
    fn data_word(&self, block: &mut MicroBlock, word: u32, addr: u32) {
        block.push(MicroInsn::new(
            addr,
            Op::Data,
            vec![Arg::constant(word as u64, 32)],
        ));
    }

    /// A branch may not sit in another branch's delay slot. Returns true
    /// (and decodes nothing) when this one does.
    fn refuse_nested_branch(&self, addr: u32, mode: DelaySlotMode) -> bool {
        if mode != DelaySlotMode::None {
            log::warn!(
                "branch at {:#010x} inside a delay slot; skipping it",
                self.exe.to_global(addr)
            );
            return true;
        }
        false
    }

    /// Inline the delay-slot word at `slot_local` before the transfer op.
    fn decode_delay_slot(&mut self, block: &mut MicroBlock, slot_local: u32, mode: DelaySlotMode) {
        match self.exe.word_at(slot_local) {
            Some(word) => self.decode(block, word, slot_local.wrapping_add(4), mode),
            None => log::warn!(
                "delay slot at {:#010x} outside the image",
                self.exe.to_global(slot_local)
            ),
        }
    }

    /// PC-relative branch target in local coordinates.
    fn branch_target(&self, word: u32, next_local: u32) -> u32 {
        next_local.wrapping_add((mips::simm16(word) as i32).wrapping_mul(4) as u32)
    }

    /// Absolute jump target (`j`/`jal`) in local coordinates.
    fn jump_target(&self, word: u32, next_local: u32) -> u32 {
        let region = self.exe.to_global(next_local) & 0xf000_0000;
        let global = region | (mips::target26(word) << 2);
        global.wrapping_sub(self.exe.header.t_addr)
    }

    /// Shared tail of every conditional branch: record the edge, inline
    /// the delay slot, emit the conditional transfer.
    fn finish_conditional(
        &mut self,
        block: &mut MicroBlock,
        addr: u32,
        next_local: u32,
        target: u32,
        kind: JumpType,
        cond: Register,
    ) {
        block.outs.insert(target, kind);
        self.decode_delay_slot(block, next_local, DelaySlotMode::ContinueControl);
        block.push(MicroInsn::new(
            addr,
            Op::JmpIf,
            vec![Arg::reg(cond, 1), self.target_arg(target)],
        ));
    }

    // ---------------------------------------------------------------------
    // Opcode families
    // ---------------------------------------------------------------------

    fn decode_special(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        let rd = mips::rd(word);
        let rt = mips::rt(word);
        let rs = mips::rs(word);
        let sa = mips::shamt(word);

        match mips::funct(word) {
            0x00 | 0x02 | 0x03 => {
                // sll/srl/sra; the all-zero form is the canonical nop.
                if rd == 0 && rt == 0 && sa == 0 {
                    block.push(MicroInsn::new(addr, Op::Nop, Vec::new()));
                } else {
                    let op = match mips::funct(word) {
                        0x00 => Op::Shl,
                        0x02 => Op::Srl,
                        _ => Op::Sra,
                    };
                    let args = vec![
                        self.gpr_dest(rd),
                        self.gpr_arg(rt),
                        Arg::constant(sa as u64, 5),
                    ];
                    block.push(MicroInsn::new(addr, op, args));
                }
                self.fall_through(block, next_local, mode);
            }
            0x04 | 0x06 | 0x07 => {
                let op = match mips::funct(word) {
                    0x04 => Op::Shl,
                    0x06 => Op::Srl,
                    _ => Op::Sra,
                };
                let args = vec![self.gpr_dest(rd), self.gpr_arg(rt), self.gpr_arg(rs)];
                block.push(MicroInsn::new(addr, op, args));
                self.fall_through(block, next_local, mode);
            }
            0x08 => self.decode_jr(block, word, addr, next_local, mode),
            0x09 => self.decode_jalr(block, word, addr, next_local, mode),
            0x0c | 0x0d => {
                let name = if mips::funct(word) == 0x0c {
                    "syscall"
                } else {
                    "break"
                };
                block.push(MicroInsn::new(
                    addr,
                    Op::Unsupported(name),
                    vec![Arg::constant(mips::code20(word) as u64, 20)],
                ));
                self.fall_through(block, next_local, mode);
            }
            0x10 | 0x12 => {
                // mfhi/mflo: the hi/lo unit is not modeled.
                let name = if mips::funct(word) == 0x10 { "mfhi" } else { "mflo" };
                block.push(MicroInsn::new(
                    addr,
                    Op::Unsupported(name),
                    vec![self.gpr_dest(rd)],
                ));
                self.fall_through(block, next_local, mode);
            }
            0x11 | 0x13 => {
                let name = if mips::funct(word) == 0x11 { "mthi" } else { "mtlo" };
                block.push(MicroInsn::new(
                    addr,
                    Op::Unsupported(name),
                    vec![self.gpr_arg(rs)],
                ));
                self.fall_through(block, next_local, mode);
            }
            0x18..=0x1b => {
                let name = match mips::funct(word) {
                    0x18 => "mult",
                    0x19 => "multu",
                    0x1a => "div",
                    _ => "divu",
                };
                block.push(MicroInsn::new(
                    addr,
                    Op::Unsupported(name),
                    vec![self.gpr_arg(rs), self.gpr_arg(rt)],
                ));
                self.fall_through(block, next_local, mode);
            }
            0x20 | 0x21 | 0x22 | 0x23 | 0x24 | 0x25 | 0x26 => {
                let op = match mips::funct(word) {
                    0x20 | 0x21 => Op::Add,
                    0x22 | 0x23 => Op::Sub,
                    0x24 => Op::And,
                    0x25 => Op::Or,
                    _ => Op::Xor,
                };
                let args = vec![self.gpr_dest(rd), self.gpr_arg(rs), self.gpr_arg(rt)];
                block.push(MicroInsn::new(addr, op, args));
                self.fall_through(block, next_local, mode);
            }
            0x27 => {
                // nor lowers through a temporary: or, invert, copy out.
                let tmp = self.tmps.fresh();
                block.push(MicroInsn::new(
                    addr,
                    Op::Or,
                    vec![Arg::reg(tmp, 32), self.gpr_arg(rs), self.gpr_arg(rt)],
                ));
                block.push(MicroInsn::new(addr, Op::Not, vec![Arg::reg(tmp, 32)]));
                block.push(MicroInsn::new(
                    addr,
                    Op::Copy,
                    vec![self.gpr_dest(rd), Arg::reg(tmp, 32)],
                ));
                self.fall_through(block, next_local, mode);
            }
            0x2a | 0x2b => {
                let op = if mips::funct(word) == 0x2a {
                    Op::SetLtSigned
                } else {
                    Op::SetLtUnsigned
                };
                let args = vec![self.gpr_dest(rd), self.gpr_arg(rs), self.gpr_arg(rt)];
                block.push(MicroInsn::new(addr, op, args));
                self.fall_through(block, next_local, mode);
            }
            _ => self.data_word(block, word, addr),
        }
    }

    fn decode_jr(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        if self.refuse_nested_branch(addr, mode) {
            return;
        }
        let rs = mips::rs(word);
        self.decode_delay_slot(block, next_local, DelaySlotMode::AbortControl);
        if rs == RA {
            block.push(MicroInsn::new(
                addr,
                Op::Return,
                vec![Arg::reg(Register::Gpr(RA), 32)],
            ));
        } else {
            log::info!(
                "indirect jump through {} at {:#010x} (possible jump table)",
                Register::Gpr(rs),
                self.exe.to_global(addr)
            );
            block.push(MicroInsn::new(addr, Op::Jmp, vec![self.gpr_arg(rs)]));
        }
    }

    fn decode_jalr(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        if self.refuse_nested_branch(addr, mode) {
            return;
        }
        self.decode_delay_slot(block, next_local, DelaySlotMode::AbortControl);
        block.push(MicroInsn::new(
            addr,
            Op::Jmp,
            vec![self.gpr_dest(mips::rd(word)), self.gpr_arg(mips::rs(word))],
        ));
    }

    fn decode_j(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        if self.refuse_nested_branch(addr, mode) {
            return;
        }
        let target = self.jump_target(word, next_local);
        let fall_through = next_local.wrapping_add(4);
        if target == fall_through {
            // A jump to its own fall-through is sequential flow in disguise.
            block.outs.insert(fall_through, JumpType::Control);
        } else {
            block.outs.insert(target, JumpType::Jump);
        }
        self.decode_delay_slot(block, next_local, DelaySlotMode::AbortControl);
        block.push(MicroInsn::new(addr, Op::Jmp, vec![self.target_arg(target)]));
    }

    fn decode_jal(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        if self.refuse_nested_branch(addr, mode) {
            return;
        }
        let target = self.jump_target(word, next_local);
        block.outs.insert(target, JumpType::Call);
        self.callees.insert(target);
        self.decode_delay_slot(block, next_local, DelaySlotMode::ContinueControl);
        block.push(MicroInsn::new(
            addr,
            Op::Call,
            vec![Arg::reg(Register::Gpr(RA), 32), self.target_arg(target)],
        ));
    }

    /// `beq`/`bne`/`blez`/`bgtz` and their branch-likely forms. The likely
    /// forms decode identically; delay-slot nullification is not modeled.
    fn decode_compare_branch(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        if self.refuse_nested_branch(addr, mode) {
            return;
        }
        let target = self.branch_target(word, next_local);
        let tmp = self.tmps.fresh();
        let cond = match mips::opcode(word) & 0x07 {
            0x04 => MicroInsn::new(
                addr,
                Op::SetEq,
                vec![
                    Arg::reg(tmp, 1),
                    self.gpr_arg(mips::rs(word)),
                    self.gpr_arg(mips::rt(word)),
                ],
            ),
            0x05 => MicroInsn::new(
                addr,
                Op::SetNe,
                vec![
                    Arg::reg(tmp, 1),
                    self.gpr_arg(mips::rs(word)),
                    self.gpr_arg(mips::rt(word)),
                ],
            ),
            0x06 => MicroInsn::new(
                addr,
                Op::SetLeSigned,
                vec![
                    Arg::reg(tmp, 1),
                    self.gpr_arg(mips::rs(word)),
                    Arg::constant(0, 32),
                ],
            ),
            _ => MicroInsn::new(
                addr,
                Op::SetLtSigned,
                vec![
                    Arg::reg(tmp, 1),
                    Arg::constant(0, 32),
                    self.gpr_arg(mips::rs(word)),
                ],
            ),
        };
        block.push(cond);
        self.finish_conditional(block, addr, next_local, target, JumpType::JumpConditional, tmp);
    }

    /// Opcode 1: compare-against-zero branches selected by the rt field,
    /// including the linking forms.
    fn decode_rel_zero_branch(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        let sub = mips::rt(word);
        let greater_equal = sub & 0x01 != 0;
        let links = sub & 0x10 != 0;
        // Only bltz/bgez (plus likely and linking forms) exist here.
        if sub & !0x13 != 0 {
            self.data_word(block, word, addr);
            return;
        }
        if self.refuse_nested_branch(addr, mode) {
            return;
        }

        let target = self.branch_target(word, next_local);
        let tmp = self.tmps.fresh();
        let cond = if greater_equal {
            MicroInsn::new(
                addr,
                Op::SetLeSigned,
                vec![
                    Arg::reg(tmp, 1),
                    Arg::constant(0, 32),
                    self.gpr_arg(mips::rs(word)),
                ],
            )
        } else {
            MicroInsn::new(
                addr,
                Op::SetLtSigned,
                vec![
                    Arg::reg(tmp, 1),
                    self.gpr_arg(mips::rs(word)),
                    Arg::constant(0, 32),
                ],
            )
        };
        block.push(cond);

        let kind = if links {
            self.callees.insert(target);
            JumpType::CallConditional
        } else {
            JumpType::JumpConditional
        };
        self.finish_conditional(block, addr, next_local, target, kind, tmp);
    }

    fn decode_slti(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        // The immediate sign-extends through a temporary before the
        // comparison; sltiu still compares unsigned afterwards.
        let tmp = self.tmps.fresh();
        block.push(MicroInsn::new(
            addr,
            Op::CastSigned,
            vec![
                Arg::reg(tmp, 32),
                Arg::constant(mips::imm16(word) as u64, 16),
            ],
        ));
        let op = if mips::opcode(word) == 0x0a {
            Op::SetLtSigned
        } else {
            Op::SetLtUnsigned
        };
        block.push(MicroInsn::new(
            addr,
            op,
            vec![
                self.gpr_dest(mips::rt(word)),
                self.gpr_arg(mips::rs(word)),
                Arg::reg(tmp, 32),
            ],
        ));
        self.fall_through(block, next_local, mode);
    }

    fn decode_load(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        let (op, bits) = match mips::opcode(word) {
            0x20 => (Op::CastSigned, 8),
            0x21 => (Op::CastSigned, 16),
            0x23 => (Op::Copy, 32),
            0x24 => (Op::CastUnsigned, 8),
            _ => (Op::CastUnsigned, 16),
        };
        let args = vec![self.gpr_dest(mips::rt(word)), self.mem_arg(word, bits)];
        block.push(MicroInsn::new(addr, op, args));
        self.fall_through(block, next_local, mode);
    }

    fn decode_store(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        let bits = match mips::opcode(word) {
            0x28 => 8,
            0x29 => 16,
            _ => 32,
        };
        let rt = mips::rt(word);
        let dest = self.mem_arg(word, bits);
        let insn = if rt == 0 {
            // Storing $zero is a constant store of the accessed width.
            MicroInsn::new(addr, Op::Copy, vec![dest, Arg::constant(0, bits)])
        } else if bits == 32 {
            MicroInsn::new(
                addr,
                Op::Copy,
                vec![dest, Arg::reg(Register::Gpr(rt), 32)],
            )
        } else {
            // Narrow stores truncate: a zero-extending cast of the source.
            MicroInsn::new(
                addr,
                Op::CastUnsigned,
                vec![dest, Arg::reg(Register::Gpr(rt), 32)],
            )
        };
        block.push(insn);
        self.fall_through(block, next_local, mode);
    }

    fn decode_cop0(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        match mips::rs(word) {
            0x00 => {
                let args = vec![
                    self.gpr_dest(mips::rt(word)),
                    Arg::reg(Register::C0(mips::rd(word)), 32),
                ];
                block.push(MicroInsn::new(addr, Op::Unsupported("mfc0"), args));
                self.fall_through(block, next_local, mode);
            }
            0x04 => {
                let args = vec![
                    Arg::reg(Register::C0(mips::rd(word)), 32),
                    self.gpr_arg(mips::rt(word)),
                ];
                block.push(MicroInsn::new(addr, Op::Unsupported("mtc0"), args));
                self.fall_through(block, next_local, mode);
            }
            0x08 => {
                // bc0f/bc0t: opaque condition, but the edge is real.
                if self.refuse_nested_branch(addr, mode) {
                    return;
                }
                let name = if mips::rt(word) & 0x01 == 0 { "bc0f" } else { "bc0t" };
                let target = self.branch_target(word, next_local);
                block.outs.insert(target, JumpType::JumpConditional);
                self.decode_delay_slot(block, next_local, DelaySlotMode::ContinueControl);
                block.push(MicroInsn::new(
                    addr,
                    Op::Unsupported(name),
                    vec![self.target_arg(target)],
                ));
            }
            0x10 => {
                let name = match mips::funct(word) {
                    0x01 => "tlbr",
                    0x02 => "tlbwi",
                    0x06 => "tlbwr",
                    0x08 => "tlbp",
                    0x10 => "rfe",
                    _ => {
                        self.data_word(block, word, addr);
                        return;
                    }
                };
                block.push(MicroInsn::new(addr, Op::Unsupported(name), Vec::new()));
                self.fall_through(block, next_local, mode);
            }
            _ => self.data_word(block, word, addr),
        }
    }

    fn decode_cop2(
        &mut self,
        block: &mut MicroBlock,
        word: u32,
        addr: u32,
        next_local: u32,
        mode: DelaySlotMode,
    ) {
        if word & (1 << 25) != 0 {
            let command = mips::imm25(word);
            block.push(MicroInsn::new(
                addr,
                Op::Unsupported(gte::command_mnemonic(command)),
                vec![Arg::constant(command as u64, 25)],
            ));
            self.fall_through(block, next_local, mode);
            return;
        }

        let rd = mips::rd(word);
        let insn = match mips::rs(word) {
            0x00 => MicroInsn::new(
                addr,
                Op::Copy,
                vec![
                    self.gpr_dest(mips::rt(word)),
                    Arg::reg(Register::C2Data(rd), 32),
                ],
            ),
            0x02 => MicroInsn::new(
                addr,
                Op::Copy,
                vec![
                    self.gpr_dest(mips::rt(word)),
                    Arg::reg(Register::C2Ctrl(rd), 32),
                ],
            ),
            0x04 => MicroInsn::new(
                addr,
                Op::Copy,
                vec![
                    Arg::reg(Register::C2Data(rd), 32),
                    self.gpr_arg(mips::rt(word)),
                ],
            ),
            0x06 => MicroInsn::new(
                addr,
                Op::Copy,
                vec![
                    Arg::reg(Register::C2Ctrl(rd), 32),
                    self.gpr_arg(mips::rt(word)),
                ],
            ),
            _ => {
                self.data_word(block, word, addr);
                return;
            }
        };
        block.push(insn);
        self.fall_through(block, next_local, mode);
    }
}
