// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{collections::HashMap, fmt::Display};

use crate::WriterError;

use super::{
    register::IndexThirtyOne,
    ArmBranchLocation,
    ArmConditionCode,
    ArmRegister,
    Label,
    RegisterClass,
    RegisterWidth,
};

/// The instruction forms the writer knows how to encode.
///
/// **Reference:** [Arm® Architecture Reference Manual for A-profile architecture](arm) \
/// **Section:** C4.1 A64 instruction set encoding
///
/// [arm]: https://developer.arm.com/documentation/ddi0487/latest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmInstruction {
    /// `ADD (immediate)`, C6.2.5. It can be in place if src == dst, but it doesn't have to be.
    AddImmediate {
        dst: ArmRegister,
        src: ArmRegister,
        imm: u64,
    },

    /// `B`, C6.2.26
    B {
        location: ArmBranchLocation,
    },

    /// `B.cond`, C6.2.27
    BCond {
        cond: ArmConditionCode,
        location: ArmBranchLocation,
    },

    /// `BLR`, C6.2.35. Puts the return address in the link register.
    Blr {
        target: ArmRegister,
    },

    /// `BR`, C6.2.37
    Br {
        target: ArmRegister,
    },

    /// `LDR (immediate)` with unsigned offset, C6.2.166 and C7.2.176.
    /// The offset is in bytes.
    LdrImmediate {
        dst: ArmRegister,
        base: ArmRegister,
        offset: u64,
    },

    /// `LDR (literal)`, C6.2.167 and C7.2.177.
    LdrLiteral {
        dst: ArmRegister,
        location: ArmBranchLocation,
    },

    /// `STR (immediate)` with unsigned offset, C6.2.321 and C7.2.331.
    /// The offset is in bytes.
    StrImmediate {
        src: ArmRegister,
        base: ArmRegister,
        offset: u64,
    },

    /// `SUB (immediate)`, C6.2.357
    SubImmediate {
        dst: ArmRegister,
        src: ArmRegister,
        imm: u64,
    },
}

impl ArmInstruction {
    /// All instructions in ARM-land are 32-bits.
    pub const SIZE: usize = 4;

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AddImmediate { .. } => "add",
            Self::B { .. } => "b",
            Self::BCond { .. } => "b.cond",
            Self::Blr { .. } => "blr",
            Self::Br { .. } => "br",
            Self::LdrImmediate { .. } | Self::LdrLiteral { .. } => "ldr",
            Self::StrImmediate { .. } => "str",
            Self::SubImmediate { .. } => "sub",
        }
    }

    /// This functions encodes the tagged union values into a plain 32-bits integer.
    ///
    /// `offset` is the position of this instruction in the same coordinate
    /// space as `label_offsets`; it is only used to resolve label locations.
    pub fn encode(self, offset: usize, label_offsets: &HashMap<Label, usize>) -> Result<u32, WriterError> {
        let name = self.name();

        match self {
            Self::AddImmediate { dst, src, imm } => encode_add_sub_immediate(name, false, dst, src, imm),
            Self::SubImmediate { dst, src, imm } => encode_add_sub_immediate(name, true, dst, src, imm),

            Self::B { location } => {
                let pc_relative_offset = location.resolve(offset, label_offsets)?;
                let imm26 = signed_field(name, pc_relative_offset, 2, 26)?;

                Ok(0x14000000 | imm26)
            }

            Self::BCond { cond, location } => {
                let pc_relative_offset = location.resolve(offset, label_offsets)?;
                let imm19 = signed_field(name, pc_relative_offset, 2, 19)?;

                let mut instruction = 0x54000000;
                instruction |= imm19 << 5;
                instruction |= cond.bits();
                Ok(instruction)
            }

            Self::Blr { target } => {
                let rn = branch_target_index(name, target)?;
                Ok(0xD63F0000 | rn << 5)
            }

            Self::Br { target } => {
                let rn = branch_target_index(name, target)?;
                Ok(0xD61F0000 | rn << 5)
            }

            Self::LdrImmediate { dst, base, offset } => encode_load_store_immediate(name, LoadStore::Load, dst, base, offset),
            Self::StrImmediate { src, base, offset } => encode_load_store_immediate(name, LoadStore::Store, src, base, offset),

            Self::LdrLiteral { dst, location } => {
                if dst.is_stack_pointer() {
                    return Err(WriterError::UnsupportedRegister { instruction: name, register: dst });
                }

                let rt = dst.describe();
                let pc_relative_offset = location.resolve(offset, label_offsets)?;
                let imm19 = signed_field(name, pc_relative_offset, 2, 19)?;

                let opc = match rt.width() {
                    RegisterWidth::W32 => 0b00,
                    RegisterWidth::W64 => 0b01,
                };
                let v = (rt.class() == RegisterClass::Vector) as u32;

                let mut instruction = 0x18000000;
                instruction |= opc << 30;
                instruction |= v << 26;
                instruction |= imm19 << 5;
                instruction |= rt.index() as u32;
                Ok(instruction)
            }
        }
    }

    /// Recovers the instruction from a word produced by [`ArmInstruction::encode`].
    /// Label locations come back as plain PC-relative offsets.
    ///
    /// Returns `None` for words that are not one of the forms above.
    #[must_use]
    pub fn decode(word: u32) -> Option<Self> {
        let rd = (word & 0x1F) as u8;
        let rn = ((word >> 5) & 0x1F) as u8;

        if word & 0xFFFFFC1F == 0xD61F0000 {
            let target = ArmRegister::integer(rn, RegisterWidth::W64, IndexThirtyOne::ZeroRegister);
            return Some(Self::Br { target });
        }

        if word & 0xFFFFFC1F == 0xD63F0000 {
            let target = ArmRegister::integer(rn, RegisterWidth::W64, IndexThirtyOne::ZeroRegister);
            return Some(Self::Blr { target });
        }

        if word & 0xFC000000 == 0x14000000 {
            let offset = sign_extend(word & 0x03FFFFFF, 26) << 2;
            return Some(Self::B { location: ArmBranchLocation::PcRelativeOffset(offset as i32) });
        }

        if word & 0xFF000010 == 0x54000000 {
            let offset = sign_extend((word >> 5) & 0x7FFFF, 19) << 2;
            let cond = ArmConditionCode::from_repr((word & 0xF) as u8)?;
            return Some(Self::BCond { cond, location: ArmBranchLocation::PcRelativeOffset(offset as i32) });
        }

        if word & 0x3B000000 == 0x18000000 {
            let width = match word >> 30 {
                0b00 => RegisterWidth::W32,
                0b01 => RegisterWidth::W64,
                _ => return None,
            };

            let dst = transfer_register(rd, width, (word >> 26) & 1 == 1);
            let offset = sign_extend((word >> 5) & 0x7FFFF, 19) << 2;
            return Some(Self::LdrLiteral { dst, location: ArmBranchLocation::PcRelativeOffset(offset as i32) });
        }

        if word & 0x3B000000 == 0x39000000 {
            let size = word >> 30;
            let width = match size {
                0b10 => RegisterWidth::W32,
                0b11 => RegisterWidth::W64,
                _ => return None,
            };

            let register = transfer_register(rd, width, (word >> 26) & 1 == 1);
            let base = ArmRegister::integer(rn, RegisterWidth::W64, IndexThirtyOne::StackPointer);
            let offset = (((word >> 10) & 0xFFF) as u64) << size;

            return match (word >> 22) & 0b11 {
                0b00 => Some(Self::StrImmediate { src: register, base, offset }),
                0b01 => Some(Self::LdrImmediate { dst: register, base, offset }),
                _ => None,
            };
        }

        if word & 0x3FC00000 == 0x11000000 {
            let width = if word >> 31 == 1 { RegisterWidth::W64 } else { RegisterWidth::W32 };
            let dst = ArmRegister::integer(rd, width, IndexThirtyOne::StackPointer);
            let src = ArmRegister::integer(rn, width, IndexThirtyOne::StackPointer);
            let imm = ((word >> 10) & 0xFFF) as u64;

            return if (word >> 30) & 1 == 1 {
                Some(Self::SubImmediate { dst, src, imm })
            } else {
                Some(Self::AddImmediate { dst, src, imm })
            };
        }

        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadStore {
    Load,
    Store,
}

fn encode_add_sub_immediate(name: &'static str, subtract: bool, dst: ArmRegister, src: ArmRegister, imm: u64) -> Result<u32, WriterError> {
    for register in [dst, src] {
        if register.is_zero_register() || !register.describe().is_integer() {
            return Err(WriterError::UnsupportedRegister { instruction: name, register });
        }
    }

    let rd = dst.describe();
    let rn = src.describe();
    if rd.width() != rn.width() {
        return Err(WriterError::RegisterWidthMismatch { instruction: name, lhs: dst, rhs: src });
    }

    let imm12 = unsigned_field(name, imm, 0, 12)?;
    let sf = (rd.width() == RegisterWidth::W64) as u32;

    // NOTE: S is 0, shift is 0
    let mut instruction = 0x11000000;
    instruction |= sf << 31;
    instruction |= (subtract as u32) << 30;
    instruction |= imm12 << 10;
    instruction |= (rn.index() as u32) << 5;
    instruction |= rd.index() as u32;
    Ok(instruction)
}

fn encode_load_store_immediate(name: &'static str, kind: LoadStore, register: ArmRegister, base: ArmRegister, offset: u64) -> Result<u32, WriterError> {
    if register.is_stack_pointer() {
        return Err(WriterError::UnsupportedRegister { instruction: name, register });
    }

    let rn = base.describe();
    if base.is_zero_register() || !rn.is_integer() || rn.width() != RegisterWidth::W64 {
        return Err(WriterError::UnsupportedRegister { instruction: name, register: base });
    }

    let rt = register.describe();
    let size = rt.width().size_field();
    let v = (rt.class() == RegisterClass::Vector) as u32;
    let opc = match kind {
        LoadStore::Store => 0b00,
        LoadStore::Load => 0b01,
    };

    let imm12 = unsigned_field(name, offset, size, 12)?;

    let mut instruction = 0x39000000;
    instruction |= size << 30;
    instruction |= v << 26;
    instruction |= opc << 22;
    instruction |= imm12 << 10;
    instruction |= (rn.index() as u32) << 5;
    instruction |= rt.index() as u32;
    Ok(instruction)
}

fn branch_target_index(name: &'static str, target: ArmRegister) -> Result<u32, WriterError> {
    let rn = target.describe();
    if !target.is_general_purpose() || rn.width() != RegisterWidth::W64 {
        return Err(WriterError::UnsupportedRegister { instruction: name, register: target });
    }

    Ok(rn.index() as u32)
}

#[must_use]
fn transfer_register(index: u8, width: RegisterWidth, vector: bool) -> ArmRegister {
    if vector {
        ArmRegister::vector(index, width)
    } else {
        ArmRegister::integer(index, width, IndexThirtyOne::ZeroRegister)
    }
}

/// Checks that `value` is a multiple of `1 << scale` and that the scaled value
/// fits in a two's complement field of `bits` bits, and returns the field.
fn signed_field(name: &'static str, value: i64, scale: u32, bits: u32) -> Result<u32, WriterError> {
    check_alignment(name, value, scale)?;

    let scaled = value >> scale;
    let limit = 1i64 << (bits - 1);
    if scaled < -limit || scaled >= limit {
        return Err(WriterError::ImmediateOutOfRange { instruction: name, value, bits });
    }

    Ok(take_bits(scaled as u32, bits))
}

fn unsigned_field(name: &'static str, value: u64, scale: u32, bits: u32) -> Result<u32, WriterError> {
    let signed = i64::try_from(value)
        .map_err(|_| WriterError::ImmediateOutOfRange { instruction: name, value: i64::MAX, bits })?;
    check_alignment(name, signed, scale)?;

    let scaled = value >> scale;
    if scaled >= (1 << bits) {
        return Err(WriterError::ImmediateOutOfRange { instruction: name, value: signed, bits });
    }

    Ok(scaled as u32)
}

fn check_alignment(name: &'static str, value: i64, scale: u32) -> Result<(), WriterError> {
    let alignment = 1u32 << scale;
    if value.rem_euclid(alignment as i64) != 0 {
        return Err(WriterError::MisalignedImmediate { instruction: name, value, alignment });
    }

    Ok(())
}

#[must_use]
fn take_bits(i: u32, n: u32) -> u32  {
    i & ((1 << n) - 1)
}

#[must_use]
fn sign_extend(value: u32, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value as i64) << shift) >> shift
}

impl Display for ArmInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddImmediate { dst, src, imm } => {
                f.write_fmt(format_args!("add {dst}, {src}, #{imm}"))
            }

            Self::B { location } => {
                f.write_fmt(format_args!("b {location}"))
            }

            Self::BCond { cond, location } => {
                f.write_fmt(format_args!("b.{cond} {location}"))
            }

            Self::Blr { target } => {
                f.write_fmt(format_args!("blr {target}"))
            }

            Self::Br { target } => {
                f.write_fmt(format_args!("br {target}"))
            }

            Self::LdrImmediate { dst, base, offset } => {
                f.write_fmt(format_args!("ldr {dst}, [{base}, #{offset}]"))
            }

            Self::LdrLiteral { dst, location } => {
                f.write_fmt(format_args!("ldr {dst}, {location}"))
            }

            Self::StrImmediate { src, base, offset } => {
                f.write_fmt(format_args!("str {src}, [{base}, #{offset}]"))
            }

            Self::SubImmediate { dst, src, imm } => {
                f.write_fmt(format_args!("sub {dst}, {src}, #{imm}"))
            }
        }
    }
}
