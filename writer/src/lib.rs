// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

//! Writes AArch64 machine code for function hooks: single instructions, and
//! the trampolines that redirect an intercepted function to its replacement.

mod aarch64;
mod config;
mod error;

pub use self::{
    aarch64::{
        near_jump_range_size,
        select_jump,
        Arm64Writer,
        ArmBranchLocation,
        ArmConditionCode,
        ArmInstruction,
        ArmRegister,
        CodeSpan,
        JumpKind,
        Label,
        RegisterClass,
        RegisterDescriptor,
        RegisterWidth,
        TrampolineBuilder,
        TrampolineKind,
        ADDRESS_LITERAL_SIZE,
        INSTRUCTION_ALIGNMENT,
    },
    config::{
        ConfigSectionJump,
        ConfigSectionLog,
        ConfigSectionTrampoline,
        HookConfig,
    },
    error::WriterError,
};
