//! Trap glue architecture tests.
// Architecture test file: expect/unwrap and slicing are intentional.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
//! The trampoline and the section placement only exist in cross builds, so
//! these tests check the declarations in the source. On-target behaviour is
//! exercised by the `fault-demo` binary.

const HANDLERS: &str = include_str!("../src/exception_handlers.rs");
const RETAINED: &str = include_str!("../src/retained.rs");
const MEMORY_X: &str = include_str!("../memory.x");

/// Both trampoline variants, as (start, end) byte ranges in the source.
fn trampolines() -> Vec<&'static str> {
    HANDLERS
        .match_indices("core::arch::global_asm!(")
        .map(|(start, _)| {
            let body = &HANDLERS[start..];
            let end = body.find(");").expect("unterminated global_asm!");
            &body[..end]
        })
        .collect()
}

#[test]
fn one_trampoline_per_instruction_set() {
    let all = trampolines();
    assert_eq!(all.len(), 2, "expected mainline and baseline trampolines");
    assert!(
        all.iter().any(|t| t.contains("stm r0, {{r4-r11}}")),
        "mainline trampoline must store R4-R11 in one STM"
    );
    assert!(
        all.iter().any(|t| t.contains("mov r4, r8")),
        "baseline trampoline must move R8-R11 through the low registers"
    );
}

/// R4-R11 must be stored before anything can spill them, and LR must be read
/// before the trampoline clobbers it.
#[test]
fn callee_saved_are_stored_before_lr_is_used() {
    for asm in trampolines() {
        let store = asm.find("stm r0").expect("no STM of callee-saved registers");
        let lr = asm.find("mov r0, lr").expect("EXC_RETURN not passed in r0");
        let branch = asm.find("bx r4").expect("no branch to fault_trap_entry");
        assert!(store < lr, "callee-saved registers must be stored first");
        assert!(lr < branch);
        assert!(!asm.contains("push"), "trampoline must not move the stack pointers");
        assert!(!asm.contains(" bl "), "a call would overwrite LR");
    }
}

#[test]
fn trampoline_passes_stack_pointers_and_xpsr() {
    for asm in trampolines() {
        assert!(asm.contains("mrs r1, MSP"));
        assert!(asm.contains("mrs r2, PSP"));
        assert!(asm.contains("mrs r3, XPSR"));
        assert!(asm.contains("entry = sym fault_trap_entry"));
    }
}

#[test]
fn every_fault_vector_is_overridden() {
    let all = trampolines();
    let mainline = all
        .iter()
        .find(|t| t.contains("stm r0, {{r4-r11}}"))
        .unwrap();
    for vector in ["HardFault", "MemoryManagement", "BusFault", "UsageFault", "SecureFault"] {
        assert!(
            mainline.contains(&format!(".global {vector}")),
            "{vector} must be a global label in the mainline trampoline"
        );
    }
    for asm in &all {
        assert!(asm.contains(".global HardFault"));
    }
}

#[test]
fn trap_entry_never_returns() {
    assert!(HANDLERS.contains("fn fault_trap_entry(exc_return: u32, msp: u32, psp: u32, xpsr: u32) -> !"));
    assert!(HANDLERS.contains("#[no_mangle]\nunsafe extern \"C\" fn fault_trap_entry"));
    assert!(HANDLERS.contains("SCB::sys_reset()"));
}

#[test]
fn record_lives_in_uninit_section() {
    let attr = r#"link_section = ".uninit.FAULT_RECORD""#;
    let attr_pos = RETAINED.find(attr).expect(".uninit placement missing");
    let decl_pos = RETAINED
        .find("pub static FAULT_RECORD")
        .expect("FAULT_RECORD declaration missing");
    assert!(
        decl_pos > attr_pos && decl_pos - attr_pos < 120,
        "the section attribute must sit on the FAULT_RECORD declaration"
    );
}

#[test]
fn record_is_not_zero_initialised() {
    assert!(RETAINED.contains("MaybeUninit::uninit()"));
    assert!(!RETAINED.contains("FaultRecord::zeroed()"));
}

#[test]
fn memory_x_covers_stack_window() {
    assert!(MEMORY_X.contains("RAM   : ORIGIN = 0x20000000, LENGTH = 128K"));
    let board = include_str!("../src/board.rs");
    assert!(board.contains("pub const DTCM_BASE: u32 = 0x2000_0000;"));
    assert!(board.contains("pub const DTCM_LEN: u32 = 128 * 1024;"));
}
