// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

use thiserror::Error;

use crate::aarch64::{ArmRegister, Label};

#[derive(Debug, Error)]
pub enum WriterError {
    #[error("cannot write {requested} bytes, only {remaining} bytes remain in the code buffer")]
    BufferOverflow {
        requested: usize,
        remaining: usize,
    },

    #[error("immediate {value} of `{instruction}` does not fit in {bits} bits")]
    ImmediateOutOfRange {
        instruction: &'static str,
        value: i64,
        bits: u32,
    },

    #[error("immediate {value} of `{instruction}` is not a multiple of {alignment}")]
    MisalignedImmediate {
        instruction: &'static str,
        value: i64,
        alignment: u32,
    },

    #[error("register {register} cannot be used as this operand of `{instruction}`")]
    UnsupportedRegister {
        instruction: &'static str,
        register: ArmRegister,
    },

    #[error("registers {lhs} and {rhs} of `{instruction}` differ in width")]
    RegisterWidthMismatch {
        instruction: &'static str,
        lhs: ArmRegister,
        rhs: ArmRegister,
    },

    #[error("label {0} was referenced but never placed")]
    UnresolvedLabel(Label),

    #[error("unknown register `{0}`")]
    UnknownRegister(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}
