// Copyright (C) 2025 Tristan Gerritsen <tristan@thewoosh.org>
// All Rights Reserved.

// As it executes the generated code, we can only run this on aarch64
#![cfg(all(target_arch = "aarch64", target_os = "linux"))]

use hook_writer::{Arm64Writer, ArmRegister, HookConfig};

extern "C" fn return_42() -> u64 {
    42
}

extern "C" fn return_7() -> u64 {
    7
}

#[test]
fn jump_trampoline_reaches_handler() {
    let result = compose_and_execute(|writer| {
        writer.put_ldr_br_reg_address(ArmRegister::X17, return_42 as usize as u64).unwrap();
    });

    assert_eq!(result, 42);
}

#[test]
fn call_trampoline_comes_back() {
    let result = compose_and_execute(|writer| {
        writer.put_sub_reg_reg_imm(ArmRegister::SP, ArmRegister::SP, 16).unwrap();
        writer.put_str_reg_reg_offset(ArmRegister::LR, ArmRegister::SP, 0).unwrap();
        writer.put_ldr_blr_b_reg_address(ArmRegister::X16, return_7 as usize as u64).unwrap();
        writer.put_add_reg_reg_imm(ArmRegister::X0, ArmRegister::X0, 1).unwrap();
        writer.put_ldr_reg_reg_offset(ArmRegister::LR, ArmRegister::SP, 0).unwrap();
        writer.put_add_reg_reg_imm(ArmRegister::SP, ArmRegister::SP, 16).unwrap();
        writer.put_br_reg(ArmRegister::LR).unwrap();
    });

    assert_eq!(result, 8);
}

#[test]
fn jump_through_configured_scratch_register() {
    let config = HookConfig::from_toml_str("[trampoline]\nscratch-register = \"x9\"\n").unwrap();

    let result = compose_and_execute(|writer| {
        writer.put_jump_address(return_42 as usize as u64, &config).unwrap();
    });

    assert_eq!(result, 42);
}

//
//
// Helper code
//
//

fn compose_and_execute(compose: impl FnOnce(&mut Arm64Writer<'_>)) -> u64 {
    let size = region::page::size();
    let mut allocation = region::alloc(size, region::Protection::READ_WRITE).unwrap();

    let span = {
        // SAFETY: the allocation is mapped read-write and only used through this writer here.
        let mut writer = unsafe { Arm64Writer::from_raw_parts(allocation.as_mut_ptr::<u8>(), size) };
        compose(&mut writer);
        writer.finish()
    };

    unsafe {
        region::protect(allocation.as_ptr::<u8>(), size, region::Protection::READ_EXECUTE)
    }.unwrap();

    // SAFETY: the span holds a complete function that follows the C calling convention.
    let function: extern "C" fn() -> u64 = unsafe { std::mem::transmute(span.base()) };
    function()
}
