// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::collections::HashMap;

use log::{debug, trace};

use crate::{HookConfig, WriterError};

use super::{
    jump::{select_jump, JumpKind},
    ArmBranchLocation,
    ArmConditionCode,
    ArmInstruction,
    ArmRegister,
    TrampolineKind,
};

/// Instructions are fetched from 4-byte aligned addresses.
pub const INSTRUCTION_ALIGNMENT: usize = 4;

/// Emits AArch64 machine code into a region of memory, front to back.
///
/// The writer borrows the region mutably for as long as it lives, and every
/// write is checked against the region's capacity. Every `put_*` method
/// returns the cursor (the address where the next byte will go) after the
/// write.
#[derive(Debug)]
pub struct Arm64Writer<'code> {
    code: &'code mut [u8],
    size: usize,
}

impl<'code> Arm64Writer<'code> {
    /// Creates a writer over `buffer`. When the buffer doesn't start on a
    /// 4-byte boundary, the bytes up to the next boundary are skipped.
    #[must_use]
    pub fn new(buffer: &'code mut [u8]) -> Self {
        let padding = buffer.as_ptr()
            .align_offset(INSTRUCTION_ALIGNMENT)
            .min(buffer.len());

        let code = &mut buffer[padding..];
        trace!("Schrijver op {:#x} met {} bytes ({padding} overgeslagen)", code.as_ptr() as usize, code.len());

        Self {
            code,
            size: 0,
        }
    }

    /// Creates a writer over memory handed out by an external allocator.
    ///
    /// # Safety
    /// `ptr` must be valid for writes of `capacity` bytes, and nothing else may
    /// read or write that memory while the writer (or the borrow it was
    /// created with) is alive.
    #[must_use]
    pub unsafe fn from_raw_parts(ptr: *mut u8, capacity: usize) -> Self {
        // SAFETY: guaranteed by the caller
        Self::new(unsafe { std::slice::from_raw_parts_mut(ptr, capacity) })
    }

    /// Starts over on `buffer`, forgetting everything written before.
    ///
    /// Alignment is applied to `buffer` the same way as [`Arm64Writer::new`]
    /// does. Passing an already aligned region (e.g. the [`CodeSpan`] of a
    /// previous writer) leaves it where it is.
    pub fn reset(&mut self, buffer: &'code mut [u8]) {
        *self = Self::new(buffer);
    }

    /// Address of the first instruction.
    #[must_use]
    pub fn base(&self) -> usize {
        self.code.as_ptr() as usize
    }

    /// Address where the next instruction will be placed.
    #[must_use]
    pub fn pc(&self) -> usize {
        self.base() + self.size
    }

    /// Number of bytes written since creation or the last reset.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.code.len()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.code.len() - self.size
    }

    /// The bytes written so far.
    #[must_use]
    pub fn code(&self) -> &[u8] {
        &self.code[..self.size]
    }

    /// Ends the composition, handing the region back to the caller. The span
    /// tells it which bytes are now code, e.g. to make them executable.
    #[must_use]
    pub fn finish(self) -> CodeSpan {
        let span = CodeSpan {
            base: self.base(),
            size: self.size,
        };

        debug!("Schrijver klaar: {span}");
        span
    }

    pub(super) fn reserve(&self, size: usize) -> Result<(), WriterError> {
        if size > self.remaining() {
            return Err(WriterError::BufferOverflow {
                requested: size,
                remaining: self.remaining(),
            });
        }

        Ok(())
    }

    //
    // Primitive emitters
    //

    pub fn put_instruction(&mut self, instruction: u32) -> Result<usize, WriterError> {
        self.put_bytes(&instruction.to_le_bytes())
    }

    pub fn put_bytes(&mut self, data: &[u8]) -> Result<usize, WriterError> {
        self.reserve(data.len())?;

        self.code[self.size..self.size + data.len()].copy_from_slice(data);
        self.size += data.len();

        Ok(self.pc())
    }

    /// Writes a 64-bit absolute address as a little-endian literal.
    pub fn put_address(&mut self, address: u64) -> Result<usize, WriterError> {
        self.put_bytes(&address.to_le_bytes())
    }

    /// Encodes a single instruction at the cursor.
    pub fn put(&mut self, instruction: ArmInstruction) -> Result<usize, WriterError> {
        let word = instruction.encode(self.size, &HashMap::new())?;
        trace!("{:#x}: {instruction}", self.pc());
        self.put_instruction(word)
    }

    //
    // Instruction encoders
    //

    /// `ldr reg, [pc + offset]`: loads the literal `offset` bytes after this
    /// instruction.
    pub fn put_ldr_reg_imm(&mut self, reg: ArmRegister, offset: i32) -> Result<usize, WriterError> {
        self.put(ArmInstruction::LdrLiteral {
            dst: reg,
            location: ArmBranchLocation::PcRelativeOffset(offset),
        })
    }

    /// `ldr dst, [base, #offset]`
    pub fn put_ldr_reg_reg_offset(&mut self, dst: ArmRegister, base: ArmRegister, offset: u64) -> Result<usize, WriterError> {
        self.put(ArmInstruction::LdrImmediate { dst, base, offset })
    }

    /// `str src, [base, #offset]`
    pub fn put_str_reg_reg_offset(&mut self, src: ArmRegister, base: ArmRegister, offset: u64) -> Result<usize, WriterError> {
        self.put(ArmInstruction::StrImmediate { src, base, offset })
    }

    pub fn put_br_reg(&mut self, reg: ArmRegister) -> Result<usize, WriterError> {
        self.put(ArmInstruction::Br { target: reg })
    }

    pub fn put_blr_reg(&mut self, reg: ArmRegister) -> Result<usize, WriterError> {
        self.put(ArmInstruction::Blr { target: reg })
    }

    /// `b #offset`, relative to the branch itself.
    pub fn put_b_imm(&mut self, offset: i32) -> Result<usize, WriterError> {
        self.put(ArmInstruction::B {
            location: ArmBranchLocation::PcRelativeOffset(offset),
        })
    }

    /// `b.cond #offset`, relative to the branch itself.
    pub fn put_b_cond_imm(&mut self, cond: ArmConditionCode, offset: i32) -> Result<usize, WriterError> {
        self.put(ArmInstruction::BCond {
            cond,
            location: ArmBranchLocation::PcRelativeOffset(offset),
        })
    }

    pub fn put_add_reg_reg_imm(&mut self, dst: ArmRegister, src: ArmRegister, imm: u64) -> Result<usize, WriterError> {
        self.put(ArmInstruction::AddImmediate { dst, src, imm })
    }

    pub fn put_sub_reg_reg_imm(&mut self, dst: ArmRegister, src: ArmRegister, imm: u64) -> Result<usize, WriterError> {
        self.put(ArmInstruction::SubImmediate { dst, src, imm })
    }

    //
    // Trampolines
    //

    /// `ldr reg, [pc + 8]; br reg; .quad address`
    pub fn put_ldr_br_reg_address(&mut self, reg: ArmRegister, address: u64) -> Result<usize, WriterError> {
        TrampolineKind::LoadBranch.build(reg, address)?.write(self)
    }

    /// `ldr reg, [pc + 12]; blr reg; b +12; .quad address`
    pub fn put_ldr_blr_b_reg_address(&mut self, reg: ArmRegister, address: u64) -> Result<usize, WriterError> {
        TrampolineKind::LoadBranchLinkSkip.build(reg, address)?.write(self)
    }

    /// `ldr reg, [pc + 8]; b +12; .quad address`
    pub fn put_ldr_b_reg_address(&mut self, reg: ArmRegister, address: u64) -> Result<usize, WriterError> {
        TrampolineKind::LoadSkip.build(reg, address)?.write(self)
    }

    /// `ldr reg, [pc + 12]; br reg; b +12; .quad address`
    pub fn put_ldr_br_b_reg_address(&mut self, reg: ArmRegister, address: u64) -> Result<usize, WriterError> {
        TrampolineKind::LoadBranchSkip.build(reg, address)?.write(self)
    }

    /// Jumps to `target` without coming back, using a single `B` when it is in
    /// reach and near jumps are allowed, and a load-and-branch stub through the
    /// configured scratch register otherwise.
    pub fn put_jump_address(&mut self, target: u64, config: &HookConfig) -> Result<JumpKind, WriterError> {
        let kind = select_jump(self.pc() as u64, target, config.jump.allow_near);
        debug!("Sprong van {:#x} naar {target:#x}: {kind}", self.pc());

        match kind {
            JumpKind::Near { offset } => {
                self.put_b_imm(offset)?;
            }

            JumpKind::Far => {
                self.put_trampoline(TrampolineKind::LoadBranch, target, config)?;
            }
        }

        Ok(kind)
    }

    /// Calls `target` through the configured scratch register and continues
    /// after the stub once the call returns.
    pub fn put_call_address(&mut self, target: u64, config: &HookConfig) -> Result<usize, WriterError> {
        debug!("Aanroep van {:#x} naar {target:#x}", self.pc());
        self.put_trampoline(TrampolineKind::LoadBranchLinkSkip, target, config)
    }

    fn put_trampoline(&mut self, kind: TrampolineKind, target: u64, config: &HookConfig) -> Result<usize, WriterError> {
        let builder = kind.build(config.trampoline.scratch_register, target)?;

        if config.log.dump_instructions {
            builder.dump_instructions();
        }

        builder.write(self)
    }
}

/// The bytes a finished [`Arm64Writer`] produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeSpan {
    base: usize,
    size: usize,
}

impl CodeSpan {
    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub const fn end(&self) -> usize {
        self.base + self.size
    }
}

impl std::fmt::Display for CodeSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{:#x}..{:#x} ({} bytes)", self.base, self.end(), self.size))
    }
}
