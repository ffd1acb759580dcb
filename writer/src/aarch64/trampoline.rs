// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{collections::HashMap, fmt::Display};

use log::{debug, trace};
use strum::{EnumIter, IntoStaticStr};

use crate::WriterError;

use super::{Arm64Writer, ArmInstruction, ArmRegister, Label, RegisterWidth};

/// Size of the absolute-address literal trailing every standard trampoline.
pub const ADDRESS_LITERAL_SIZE: usize = std::mem::size_of::<u64>();

/// Assembles a short instruction sequence with embedded literals in two
/// passes: first every label gets its byte offset, then every instruction is
/// encoded against those offsets. PC-relative distances to literals and skip
/// targets are therefore never written by hand.
#[derive(Debug, Clone, Default)]
pub struct TrampolineBuilder {
    items: Vec<TrampolineItem>,
    label_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrampolineItem {
    Instruction(ArmInstruction),
    Label(Label),
    Literal(u64),
}

impl TrampolineItem {
    #[must_use]
    const fn size(&self) -> usize {
        match self {
            Self::Instruction(..) => ArmInstruction::SIZE,
            Self::Label(..) => 0,
            Self::Literal(..) => ADDRESS_LITERAL_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Encoded {
    Word(ArmInstruction, u32),
    Literal(u64),
}

impl TrampolineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn create_label(&mut self) -> Label {
        let label = Label { id: self.label_count };
        self.label_count += 1;
        label
    }

    /// Marks the current end of the sequence as the position of `label`.
    pub fn place_label(&mut self, label: Label) -> &mut Self {
        debug_assert!(label.id < self.label_count, "label {label} komt van een andere bouwer");
        debug_assert!(!self.items.contains(&TrampolineItem::Label(label)), "label {label} is al geplaatst");

        self.items.push(TrampolineItem::Label(label));
        self
    }

    pub fn instruction(&mut self, instruction: ArmInstruction) -> &mut Self {
        self.items.push(TrampolineItem::Instruction(instruction));
        self
    }

    /// Appends a 64-bit little-endian literal.
    pub fn literal(&mut self, value: u64) -> &mut Self {
        self.items.push(TrampolineItem::Literal(value));
        self
    }

    /// The number of bytes this sequence occupies once written.
    #[must_use]
    pub fn size(&self) -> usize {
        self.items.iter().map(TrampolineItem::size).sum()
    }

    #[must_use]
    fn label_offsets(&self) -> HashMap<Label, usize> {
        let mut offset = 0;
        let mut label_offsets = HashMap::new();

        for item in &self.items {
            if let TrampolineItem::Label(label) = item {
                label_offsets.insert(*label, offset);
            }

            offset += item.size();
        }

        label_offsets
    }

    fn encode(&self) -> Result<Vec<Encoded>, WriterError> {
        let label_offsets = self.label_offsets();

        let mut offset = 0;
        let mut encoded = Vec::with_capacity(self.items.len());

        for item in &self.items {
            match item {
                TrampolineItem::Instruction(instruction) => {
                    encoded.push(Encoded::Word(*instruction, instruction.encode(offset, &label_offsets)?));
                }

                TrampolineItem::Literal(value) => encoded.push(Encoded::Literal(*value)),

                TrampolineItem::Label(..) => (),
            }

            offset += item.size();
        }

        Ok(encoded)
    }

    /// Encodes the sequence into its final bytes without writing it anywhere.
    pub fn assemble(&self) -> Result<Vec<u8>, WriterError> {
        let mut bytes = Vec::with_capacity(self.size());

        for encoded in self.encode()? {
            match encoded {
                Encoded::Word(_, word) => bytes.extend_from_slice(&word.to_le_bytes()),
                Encoded::Literal(value) => bytes.extend_from_slice(&value.to_le_bytes()),
            }
        }

        Ok(bytes)
    }

    /// Writes the sequence at the cursor of `writer` and returns the new cursor.
    ///
    /// The sequence is fully encoded and checked against the remaining
    /// capacity first, so on error nothing has been written.
    pub fn write(&self, writer: &mut Arm64Writer<'_>) -> Result<usize, WriterError> {
        let encoded = self.encode()?;
        writer.reserve(self.size())?;

        let start = writer.pc();
        for encoded in encoded {
            match encoded {
                Encoded::Word(instruction, word) => {
                    trace!("{:#x}: {instruction}", writer.pc());
                    writer.put_instruction(word)?;
                }

                Encoded::Literal(value) => {
                    trace!("{:#x}: .quad {value:#x}", writer.pc());
                    writer.put_bytes(&value.to_le_bytes())?;
                }
            }
        }

        debug!("Trampoline van {} bytes geschreven op {start:#x}", self.size());
        Ok(writer.pc())
    }

    /// Logs the sequence with its labels, one instruction per line.
    pub fn dump_instructions(&self) {
        debug!("AArch64-instructies:");

        for item in &self.items {
            match item {
                TrampolineItem::Instruction(instruction) => debug!("    {instruction}"),
                TrampolineItem::Label(label) => debug!("{label}:"),
                TrampolineItem::Literal(value) => debug!("    .quad {value:#x}"),
            }
        }
    }
}

/// The standard hook entry stubs. Each one loads an absolute address from a
/// literal placed right after its instructions into a scratch register, and
/// then does something different with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum TrampolineKind {
    /// `ldr reg, literal; br reg`: a jump that does not come back.
    LoadBranch,

    /// `ldr reg, literal; blr reg; b after_literal`: calls the address and
    /// continues after the literal once the call returns.
    LoadBranchLinkSkip,

    /// `ldr reg, literal; b after_literal`: only loads the address, the
    /// code following the stub decides what to do with it.
    LoadSkip,

    /// `ldr reg, literal; br reg; b after_literal`
    LoadBranchSkip,
}

impl TrampolineKind {
    #[must_use]
    pub const fn instruction_count(self) -> usize {
        match self {
            Self::LoadBranch | Self::LoadSkip => 2,
            Self::LoadBranchLinkSkip | Self::LoadBranchSkip => 3,
        }
    }

    /// Bytes this stub occupies, literal included.
    #[must_use]
    pub const fn size(self) -> usize {
        self.instruction_count() * ArmInstruction::SIZE + ADDRESS_LITERAL_SIZE
    }

    /// Lays out the stub that transfers to `address` through `register`.
    /// The register is clobbered, so it must be a general-purpose 64-bit
    /// register that the code around the stub does not depend on.
    pub fn build(self, register: ArmRegister, address: u64) -> Result<TrampolineBuilder, WriterError> {
        if !register.is_general_purpose() || register.describe().width() != RegisterWidth::W64 {
            return Err(WriterError::UnsupportedRegister { instruction: self.into(), register });
        }

        let mut builder = TrampolineBuilder::new();
        let literal = builder.create_label();
        let after_literal = builder.create_label();

        builder.instruction(ArmInstruction::LdrLiteral { dst: register, location: literal.into() });

        match self {
            Self::LoadBranch => {
                builder.instruction(ArmInstruction::Br { target: register });
            }

            Self::LoadBranchLinkSkip => {
                builder.instruction(ArmInstruction::Blr { target: register });
                builder.instruction(ArmInstruction::B { location: after_literal.into() });
            }

            Self::LoadSkip => {
                builder.instruction(ArmInstruction::B { location: after_literal.into() });
            }

            Self::LoadBranchSkip => {
                builder.instruction(ArmInstruction::Br { target: register });
                builder.instruction(ArmInstruction::B { location: after_literal.into() });
            }
        }

        builder.place_label(literal)
            .literal(address)
            .place_label(after_literal);

        Ok(builder)
    }
}

impl Display for TrampolineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use crate::aarch64::ArmBranchLocation;

    fn words(bytes: &[u8]) -> Vec<u32> {
        bytes.chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    #[rstest]
    #[case(TrampolineKind::LoadBranch, &[0x58000051, 0xD61F0220])]
    #[case(TrampolineKind::LoadBranchLinkSkip, &[0x58000071, 0xD63F0220, 0x14000003])]
    #[case(TrampolineKind::LoadSkip, &[0x58000051, 0x14000003])]
    #[case(TrampolineKind::LoadBranchSkip, &[0x58000071, 0xD61F0220, 0x14000003])]
    fn standard_stubs(#[case] kind: TrampolineKind, #[case] expected_words: &[u32]) {
        let address = 0x1122_3344_5566_7788;
        let bytes = kind.build(ArmRegister::X17, address).unwrap().assemble().unwrap();

        assert_eq!(bytes.len(), kind.size());

        let (code, literal) = bytes.split_at(kind.instruction_count() * 4);
        assert_eq!(words(code), expected_words);
        assert_eq!(literal, &[0x88, 0x77, 0x66, 0x55, 0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn literal_offset_follows_the_literal() {
        for kind in TrampolineKind::iter() {
            let bytes = kind.build(ArmRegister::X16, 0).unwrap().assemble().unwrap();
            let ldr = ArmInstruction::decode(words(&bytes)[0]).unwrap();

            let literal_offset = (kind.instruction_count() * 4) as i32;
            assert_eq!(ldr, ArmInstruction::LdrLiteral {
                dst: ArmRegister::X16,
                location: ArmBranchLocation::PcRelativeOffset(literal_offset),
            });
        }
    }

    #[test]
    fn skip_lands_after_the_literal() {
        for kind in TrampolineKind::iter() {
            let bytes = kind.build(ArmRegister::X9, 0).unwrap().assemble().unwrap();
            let words = words(&bytes[..kind.instruction_count() * 4]);

            for (index, word) in words.iter().enumerate() {
                if let Some(ArmInstruction::B { location: ArmBranchLocation::PcRelativeOffset(offset) }) = ArmInstruction::decode(*word) {
                    assert_eq!(index * 4 + offset as usize, kind.size(), "{kind}");
                }
            }
        }
    }

    #[rstest]
    #[case(ArmRegister::W17)]
    #[case(ArmRegister::SP)]
    #[case(ArmRegister::XZR)]
    #[case(ArmRegister::d(17))]
    fn scratch_register_must_be_an_x_register(#[case] register: ArmRegister) {
        let error = TrampolineKind::LoadSkip.build(register, 0).unwrap_err();
        assert!(matches!(error, WriterError::UnsupportedRegister { instruction: "load-skip", .. }));
    }

    #[test]
    fn custom_sequence_with_backward_branch() {
        let mut builder = TrampolineBuilder::new();
        let top = builder.create_label();
        let data = builder.create_label();

        builder.place_label(top)
            .instruction(ArmInstruction::LdrLiteral { dst: ArmRegister::X0, location: data.into() })
            .instruction(ArmInstruction::SubImmediate { dst: ArmRegister::X0, src: ArmRegister::X0, imm: 1 })
            .instruction(ArmInstruction::B { location: top.into() })
            .place_label(data)
            .literal(42);

        assert_eq!(builder.size(), 20);
        let bytes = builder.assemble().unwrap();
        assert_eq!(words(&bytes[..12]), [0x58000060, 0xD1000400, 0x17FFFFFE]);
        assert_eq!(&bytes[12..], &42u64.to_le_bytes());
    }

    #[test]
    fn label_of_other_builder_is_unresolved() {
        let mut other = TrampolineBuilder::new();
        let _ = other.create_label();
        let foreign = other.create_label();

        let mut builder = TrampolineBuilder::new();
        builder.instruction(ArmInstruction::B { location: foreign.into() });

        assert!(matches!(builder.assemble(), Err(WriterError::UnresolvedLabel(label)) if label == foreign));
    }
}
