//! Reset-surviving fault record for Cortex-M firmware
//!
//! When the processor takes a HardFault (or MemManage, BusFault, UsageFault,
//! SecureFault), the trap glue hands the register state to
//! [`FaultController::save`], which captures the stacked exception frame and
//! fault status registers into a single CRC-protected [`FaultRecord`]. The
//! record lives in RAM that is not zeroed at startup, so after the reset the
//! application (or a bootloader, or a debugger reading memory) can ask
//! [`FaultController::occurred`] and render the details with [`FaultReport`].
//!
//! # Architecture
//!
//! ```text
//! trap glue (fault-firmware)
//!         ↓  TrapState
//! lifecycle   FaultController: clear / save / occurred / exit
//!         ↓
//! capture     frame decode + BoundedReader + SystemRegisters
//!         ↓
//! codec       magic, schema version, CRC-32
//!         ↓
//! record      140-byte pinned layout, RecordStore
//! ```
//!
//! Everything hardware-specific is behind a trait ([`RecordStore`],
//! [`MemorySource`], [`SystemRegisters`], [`ExitHook`]) and the target
//! variant is a [`Capabilities`] value, so every architecture path is
//! exercised by the host test suite.
//!
//! # Features
//!
//! - `defmt`: `defmt::Format` on all public types, and log statements on the
//!   save path
//! - `std`: mock register source for host tools and tests
//!
//! # Example
//!
//! ```
//! use fault::{Capabilities, FaultConfig, FaultController, FaultRecord, RamWindow, SaveLatch};
//!
//! static LATCH: SaveLatch = SaveLatch::new();
//!
//! let ram = RamWindow::new(0x2000_0000, 0x2_0000).unwrap();
//! let mut record = FaultRecord::zeroed();
//! let mut faults = FaultController::new(&LATCH, &mut record, FaultConfig::new(Capabilities::ARMV7EM, ram));
//! faults.clear();
//! assert!(!faults.occurred());
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capability;
pub mod capture;
pub mod codec;
pub mod config;
pub mod frame;
pub mod lifecycle;
pub mod memory;
pub mod mocks;
pub mod record;
pub mod report;
pub mod status;
pub mod store;

pub use capability::Capabilities;
pub use capture::{
    capture, FaultStatus, SecureFaultStatus, StackLimits, SystemRegisters, TrapState,
};
pub use codec::{decode, decode_with_len, image_len, is_valid, stamp, DecodeError};
pub use config::FaultConfig;
pub use frame::{ExcReturn, FrameLayout};
pub use lifecycle::{
    ExitHook, FaultController, NoExit, RecordState, SaveGuard, SaveLatch, SaveOutcome,
};
pub use memory::{AccessError, BoundedReader, MemorySource, RamWindow, RamWindowError, SliceMemory};
pub use record::{ContentFlags, FaultRecord, Field, FieldGroup, SchemaVersion, MAGIC_NUMBER};
pub use report::{ExceptionKind, FaultReport};
pub use status::{Cfsr, Hfsr, Sfsr};
pub use store::RecordStore;
