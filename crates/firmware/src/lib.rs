//! Cortex-M integration for the `fault` record
//!
//! Binds the hardware-independent capture engine to a real core:
//!
//! ```text
//! fault vector ─► trampoline (exception_handlers) ─► fault_trap_entry
//!                                                         │
//!       ScbRegisters + VolatileMemory (registers) ◄───────┤ save
//!       FAULT_RECORD in .uninit (retained)        ◄───────┘
//!                                                         │ exit
//!       ResetOnExit / HaltOnExit (exit)           ◄───────┘
//!
//! next boot: boot::take_previous_fault ─► report over RTT, clear
//! ```
//!
//! # Features
//!
//! - `hardware` - Build the trap glue and demo binary for a Cortex-M target
//! - `armv6m`, `armv7m`, `armv7em` (default), `armv8m-base`, `armv8m-main`,
//!   `armv81m-main` - Architecture variant, see [`board`]
//! - `tz-secure` - Firmware runs in the TrustZone secure state
//! - `halt-on-fault` - Stop at a breakpoint after saving instead of resetting
//! - `defmt` - Log over defmt (implied by `hardware`)
//! - `std` - Host builds
//!
//! # Examples
//!
//! ```bash
//! cargo build --release --target thumbv7em-none-eabihf --features hardware
//! cargo build --release --target thumbv6m-none-eabi --no-default-features --features hardware,armv6m
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code

pub mod board;
pub mod boot;
pub mod exception_handlers;
pub mod exit;
pub mod registers;
pub mod retained;

use fault::{FaultController, FaultRecord, SaveLatch};

use crate::exit::FaultExit;
use crate::retained::FAULT_RECORD;

/// In-progress latch shared by every path into `save`.
pub static SAVE_LATCH: SaveLatch = SaveLatch::new();

/// Controller over the retained record with the build's exit policy.
pub type Controller = FaultController<'static, &'static mut FaultRecord, FaultExit>;

/// Build a controller over the retained record.
///
/// # Safety
///
/// Steals [`FAULT_RECORD`]: at most one controller may be live at a time.
/// Call it once at boot (before interrupts are enabled, dropping it after
/// the boot check) and from the fault handler.
#[must_use]
pub unsafe fn controller() -> Controller {
    // SAFETY: exclusivity is forwarded to the caller.
    let record = unsafe { FAULT_RECORD.steal() };
    FaultController::new(&SAVE_LATCH, record, board::CONFIG).with_exit_hook(FaultExit::default())
}
