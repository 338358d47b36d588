//! Fault trap entry: from the hardware exception into [`fault::FaultController::save`].
//!
//! The fault vectors (HardFault, MemoryManagement, BusFault, UsageFault,
//! SecureFault) all land on one assembly trampoline. Before any compiled
//! code can spill them, it:
//!
//! 1. stores R4–R11 to [`FAULT_CALLEE_SAVED`] (the hardware frame only holds
//!    the caller-saved half),
//! 2. loads EXC_RETURN (still in LR), MSP, PSP and xPSR into R0–R3,
//! 3. branches to `fault_trap_entry`, which never returns.
//!
//! The trampoline does not push anything, so MSP and PSP are exactly the
//! values the processor left on exception entry.
//!
//! cortex-m-rt `PROVIDE`s weak defaults for every fault symbol; the global
//! labels below override them. Its own HardFault trampoline (if present)
//! branches here with LR untouched.
//!
//! Armv6-M and Armv8-M Baseline cannot `STM` the high registers, so they get
//! a variant that stores R4–R7 first and then moves R8–R11 down through them.
//!
//! # Nested faults
//!
//! A fault raised while a capture is in flight (a configurable fault
//! escalating to HardFault, or any fault inside the save itself) preempts the
//! outer handler at a higher priority. The outer capture can never resume, so
//! waiting for it would hang the core. The nested entry finds the save latch
//! held, gets [`SaveOutcome::Dropped`] and resets without touching the record
//! or running the exit policy. Both faults are lost: the record keeps what it
//! held before the outer fault (the previous fault, or empty), because a save
//! writes the record in one store only after the capture completes.

#![allow(clippy::doc_markdown)] // Exception handler docs use hardware terminology (HardFault, SVC) as plain text

use fault::{
    ExitHook, FaultController, MemorySource, RecordStore, SaveOutcome, SystemRegisters, TrapState,
};

use crate::registers::{ScbRegisters, VolatileMemory};

/// Callee-saved registers R4–R11 as found on fault entry.
///
/// Written only by the trampoline, read only by `fault_trap_entry`.
#[no_mangle]
pub static mut FAULT_CALLEE_SAVED: [u32; 8] = [0; 8];

/// Capture `trap` into the retained record, then run the exit policy.
///
/// # Safety
///
/// Fault context only: steals the retained record and reads live SCB
/// registers.
pub unsafe fn record_fault(trap: &TrapState) -> SaveOutcome {
    // SAFETY: in the fault handler nothing else holds the record.
    let mut faults = unsafe { crate::controller() };
    // SAFETY: running on the build's target core.
    let registers = unsafe { ScbRegisters::new() };
    save_then_exit(&mut faults, trap, &VolatileMemory, &registers)
}

/// Save `trap` and, only if this entry wrote the record, run the exit policy.
///
/// A [`SaveOutcome::Dropped`] entry leaves the record untouched and returns
/// to the caller, which resets.
pub fn save_then_exit<S, H, M, R>(
    faults: &mut FaultController<'_, S, H>,
    trap: &TrapState,
    memory: &M,
    regs: &R,
) -> SaveOutcome
where
    S: RecordStore,
    H: ExitHook,
    M: MemorySource + ?Sized,
    R: SystemRegisters + ?Sized,
{
    let outcome = faults.save(trap, memory, regs);
    if outcome == SaveOutcome::Saved {
        faults.exit();
    }
    outcome
}

#[cfg(all(
    feature = "hardware",
    target_arch = "arm",
    any(
        feature = "armv7m",
        feature = "armv7em",
        feature = "armv8m-main",
        feature = "armv81m-main"
    )
))]
core::arch::global_asm!(
    ".section .text.FaultTrampoline,\"ax\",%progbits",
    ".global HardFault",
    ".global MemoryManagement",
    ".global BusFault",
    ".global UsageFault",
    ".global SecureFault",
    ".thumb_func",
    "HardFault:",
    ".thumb_func",
    "MemoryManagement:",
    ".thumb_func",
    "BusFault:",
    ".thumb_func",
    "UsageFault:",
    ".thumb_func",
    "SecureFault:",
    "    ldr r0, ={callee}",
    "    stm r0, {{r4-r11}}",
    "    mov r0, lr",
    "    mrs r1, MSP",
    "    mrs r2, PSP",
    "    mrs r3, XPSR",
    "    ldr r4, ={entry}",
    "    bx r4",
    callee = sym FAULT_CALLEE_SAVED,
    entry = sym fault_trap_entry,
);

#[cfg(all(
    feature = "hardware",
    target_arch = "arm",
    not(any(
        feature = "armv7m",
        feature = "armv7em",
        feature = "armv8m-main",
        feature = "armv81m-main"
    ))
))]
core::arch::global_asm!(
    ".section .text.FaultTrampoline,\"ax\",%progbits",
    ".global HardFault",
    ".global SecureFault",
    ".thumb_func",
    "HardFault:",
    ".thumb_func",
    "SecureFault:",
    "    ldr r0, ={callee}",
    "    stm r0!, {{r4-r7}}",
    "    mov r4, r8",
    "    mov r5, r9",
    "    mov r6, r10",
    "    mov r7, r11",
    "    stm r0!, {{r4-r7}}",
    "    mov r0, lr",
    "    mrs r1, MSP",
    "    mrs r2, PSP",
    "    mrs r3, XPSR",
    "    ldr r4, ={entry}",
    "    bx r4",
    callee = sym FAULT_CALLEE_SAVED,
    entry = sym fault_trap_entry,
);

/// Rust side of the trampoline.
#[cfg(all(feature = "hardware", target_arch = "arm"))]
#[no_mangle]
unsafe extern "C" fn fault_trap_entry(exc_return: u32, msp: u32, psp: u32, xpsr: u32) -> ! {
    // SAFETY: the trampoline finished writing before branching here and
    // nothing else touches the area.
    let callee_saved = unsafe { core::ptr::addr_of!(FAULT_CALLEE_SAVED).read_volatile() };
    let (msp_ns, psp_ns) = non_secure_stack_pointers();
    let trap = TrapState {
        exc_return,
        msp,
        psp,
        msp_ns,
        psp_ns,
        xpsr_in_handler: xpsr,
        callee_saved,
    };
    // SAFETY: we are the fault handler.
    let _ = unsafe { record_fault(&trap) };

    // Exit policy returned, or a nested entry was dropped (see module docs).
    cortex_m::peripheral::SCB::sys_reset()
}

#[cfg(all(feature = "hardware", target_arch = "arm", feature = "tz-secure"))]
fn non_secure_stack_pointers() -> (u32, u32) {
    let msp_ns: u32;
    let psp_ns: u32;
    // SAFETY: MRS of the banked non-secure stack pointers is side-effect free
    // from the secure state.
    unsafe {
        core::arch::asm!(
            "mrs {0}, MSP_NS",
            "mrs {1}, PSP_NS",
            out(reg) msp_ns,
            out(reg) psp_ns,
            options(nomem, nostack, preserves_flags)
        );
    }
    (msp_ns, psp_ns)
}

#[cfg(all(feature = "hardware", target_arch = "arm", not(feature = "tz-secure")))]
fn non_secure_stack_pointers() -> (u32, u32) {
    (0, 0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use fault::{
        codec, Capabilities, FaultConfig, FaultRecord, FaultStatus, RamWindow, SaveLatch,
        SecureFaultStatus, SliceMemory, StackLimits,
    };

    const RAM_BASE: u32 = 0x2000_0000;

    struct QuietRegisters;

    impl SystemRegisters for QuietRegisters {
        fn stack_limits(&self) -> StackLimits {
            StackLimits::default()
        }
        fn fault_status(&self) -> FaultStatus {
            FaultStatus::default()
        }
        fn secure_fault_status(&self) -> SecureFaultStatus {
            SecureFaultStatus::default()
        }
    }

    fn config() -> FaultConfig {
        FaultConfig::new(Capabilities::ARMV7EM, RamWindow::new(RAM_BASE, 0x100).unwrap())
    }

    fn trap() -> TrapState {
        TrapState {
            exc_return: 0xFFFF_FFF9,
            msp: RAM_BASE + 0x80,
            xpsr_in_handler: 3,
            ..TrapState::default()
        }
    }

    #[test]
    fn saved_fault_runs_exit_policy_once() {
        let ram = [0u8; 0x100];
        let memory = SliceMemory::new(RAM_BASE, &ram);
        let latch = SaveLatch::new();
        let mut exits = 0;
        {
            let mut faults = FaultController::new(&latch, FaultRecord::zeroed(), config())
                .with_exit_hook(|_: &FaultRecord| exits += 1);
            let outcome = save_then_exit(&mut faults, &trap(), &memory, &QuietRegisters);
            assert_eq!(outcome, SaveOutcome::Saved);
            assert_eq!(faults.record().unwrap().count, 1);
        }
        assert_eq!(exits, 1);
    }

    #[test]
    fn nested_entry_keeps_previous_record_and_skips_exit() {
        let mut previous = FaultRecord::zeroed();
        previous.count = 2;
        previous.return_address = 0x0800_0100;
        codec::stamp(&mut previous);

        let ram = [0u8; 0x100];
        let memory = SliceMemory::new(RAM_BASE, &ram);
        let latch = SaveLatch::new();
        // The outer capture is preempted while holding the latch.
        let _outer = latch.try_enter().unwrap();
        let mut exits = 0;
        {
            let mut faults = FaultController::new(&latch, previous, config())
                .with_exit_hook(|_: &FaultRecord| exits += 1);
            let outcome = save_then_exit(&mut faults, &trap(), &memory, &QuietRegisters);
            assert_eq!(outcome, SaveOutcome::Dropped);
            assert_eq!(faults.record(), Some(&previous));
        }
        assert_eq!(exits, 0);
    }
}
