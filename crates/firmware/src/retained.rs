//! The fault record's home in RAM that survives reset.
//!
//! cortex-m-rt zeroes `.bss` and copies `.data` on every boot, which would
//! wipe the record before the application could look at it. Statics in a
//! `.uninit.*` section are left alone, so the bytes written by the fault
//! handler are still there after `SCB::sys_reset()`.
//!
//! On power-up the section holds whatever the SRAM cells settled to. Every
//! byte pattern is a well-formed [`FaultRecord`]; the integrity check decides
//! whether it is meaningful.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;

use fault::FaultRecord;

/// Storage cell for the one persistent record.
pub struct RetainedRecord(UnsafeCell<MaybeUninit<FaultRecord>>);

// SAFETY: access is only through `steal`, whose contract makes the caller
// responsible for exclusivity (single core; fault handler or pre-interrupt boot).
unsafe impl Sync for RetainedRecord {}

impl RetainedRecord {
    /// Uninitialised storage.
    #[must_use]
    pub const fn new() -> Self {
        Self(UnsafeCell::new(MaybeUninit::uninit()))
    }

    /// Address of the record, for a debugger or a host tool reading RAM.
    #[must_use]
    pub fn address(&'static self) -> usize {
        self.0.get() as usize
    }

    /// Hand out the record as a [`fault::RecordStore`].
    ///
    /// # Safety
    ///
    /// No other reference from a previous `steal` may be used while the
    /// returned one is live. In practice: the boot path steals it once before
    /// enabling interrupts and drops it, and the fault handler steals it after
    /// that, when nothing else runs.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn steal(&'static self) -> &'static mut FaultRecord {
        // SAFETY: FaultRecord is repr(C) plain integers, so whatever bytes RAM
        // holds form a valid value; exclusivity is the caller's contract.
        unsafe { (*self.0.get()).assume_init_mut() }
    }
}

impl Default for RetainedRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// The persistent fault record, outside the startup-initialised sections.
#[cfg_attr(target_os = "none", link_section = ".uninit.FAULT_RECORD")]
pub static FAULT_RECORD: RetainedRecord = RetainedRecord::new();
