// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

// Useful tool for checking the encodings: <http://shell-storm.org/online/Online-Assembler-and-Disassembler/>

mod branch_location;
mod condition_code;
mod instruction;
mod jump;
mod register;
mod trampoline;
mod writer;

pub use self::{
    branch_location::{
        ArmBranchLocation,
        Label,
    },
    condition_code::ArmConditionCode,
    instruction::ArmInstruction,
    jump::{
        near_jump_range_size,
        select_jump,
        JumpKind,
    },
    register::{
        ArmRegister,
        RegisterClass,
        RegisterDescriptor,
        RegisterWidth,
    },
    trampoline::{
        TrampolineBuilder,
        TrampolineKind,
        ADDRESS_LITERAL_SIZE,
    },
    writer::{
        Arm64Writer,
        CodeSpan,
        INSTRUCTION_ALIGNMENT,
    },
};
