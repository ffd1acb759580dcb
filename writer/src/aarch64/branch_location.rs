// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use std::{collections::HashMap, fmt::Display};

use crate::WriterError;

/// A symbolic position inside a [`TrampolineBuilder`](super::TrampolineBuilder),
/// resolved to a byte offset before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    pub(super) id: usize,
}

impl Label {
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(".L")?;
        self.id.fmt(f)
    }
}

/// Where a PC-relative instruction points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmBranchLocation {
    Label(Label),

    /// Byte distance from the instruction itself.
    PcRelativeOffset(i32),
}

impl ArmBranchLocation {
    /// The byte distance from the instruction at `offset` to this location.
    pub fn resolve(self, offset: usize, label_offsets: &HashMap<Label, usize>) -> Result<i64, WriterError> {
        match self {
            Self::Label(label) => {
                let destination = *label_offsets.get(&label)
                    .ok_or(WriterError::UnresolvedLabel(label))?;
                Ok(destination as i64 - offset as i64)
            }

            Self::PcRelativeOffset(offset) => Ok(offset as i64),
        }
    }
}

impl Display for ArmBranchLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Label(label) => label.fmt(f),
            Self::PcRelativeOffset(value) => f.write_fmt(format_args!("#{value}")),
        }
    }
}

impl From<Label> for ArmBranchLocation {
    fn from(value: Label) -> Self {
        Self::Label(value)
    }
}

impl From<i32> for ArmBranchLocation {
    fn from(value: i32) -> Self {
        Self::PcRelativeOffset(value)
    }
}
