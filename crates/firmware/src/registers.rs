//! Hardware sources for the capture engine: SCB fault registers, stack
//! limit registers, and raw RAM.
//!
//! SCB register map (Armv7-M ARM B3.2.2, Armv8-M ARM D1.2):
//!
//! | Register | Address       | Present on                 |
//! |----------|---------------|----------------------------|
//! | CFSR     | `0xE000_ED28` | Armv7-M, Armv8-M Mainline  |
//! | HFSR     | `0xE000_ED2C` | Armv7-M, Armv8-M Mainline  |
//! | DFSR     | `0xE000_ED30` | Armv7-M, Armv8-M Mainline  |
//! | MMFAR    | `0xE000_ED34` | Armv7-M, Armv8-M Mainline  |
//! | BFAR     | `0xE000_ED38` | Armv7-M, Armv8-M Mainline  |
//! | AFSR     | `0xE000_ED3C` | Armv7-M, Armv8-M Mainline  |
//! | SFSR     | `0xE000_EDE4` | Armv8-M Mainline, secure   |
//! | SFAR     | `0xE000_EDE8` | Armv8-M Mainline, secure   |
//!
//! MSPLIM/PSPLIM are core registers read with `MRS`.

use fault::{FaultStatus, MemorySource, SecureFaultStatus, StackLimits, SystemRegisters};

/// Configurable Fault Status Register.
pub const SCB_CFSR: u32 = 0xE000_ED28;
/// HardFault Status Register.
pub const SCB_HFSR: u32 = 0xE000_ED2C;
/// Debug Fault Status Register.
pub const SCB_DFSR: u32 = 0xE000_ED30;
/// MemManage Fault Address Register.
pub const SCB_MMFAR: u32 = 0xE000_ED34;
/// BusFault Address Register.
pub const SCB_BFAR: u32 = 0xE000_ED38;
/// Auxiliary Fault Status Register.
pub const SCB_AFSR: u32 = 0xE000_ED3C;
/// Secure Fault Status Register.
pub const SCB_SFSR: u32 = 0xE000_EDE4;
/// Secure Fault Address Register.
pub const SCB_SFAR: u32 = 0xE000_EDE8;

/// Live special-purpose registers of the running core.
#[derive(Debug)]
pub struct ScbRegisters {
    _private: (),
}

impl ScbRegisters {
    /// Access the core's registers.
    ///
    /// # Safety
    ///
    /// Must run on the Cortex-M core the firmware was built for; the reader
    /// only touches registers the build's capability preset says exist.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn read(address: u32) -> u32 {
        // SAFETY: `new`'s contract puts us on the target, where every SCB
        // address above is a word-aligned, always-readable system register.
        unsafe { core::ptr::read_volatile(address as usize as *const u32) }
    }
}

impl SystemRegisters for ScbRegisters {
    fn stack_limits(&self) -> StackLimits {
        StackLimits {
            msplim: read_msplim(),
            psplim: read_psplim(),
        }
    }

    fn fault_status(&self) -> FaultStatus {
        FaultStatus {
            cfsr: Self::read(SCB_CFSR),
            hfsr: Self::read(SCB_HFSR),
            dfsr: Self::read(SCB_DFSR),
            mmfar: Self::read(SCB_MMFAR),
            bfar: Self::read(SCB_BFAR),
            afsr: Self::read(SCB_AFSR),
        }
    }

    fn secure_fault_status(&self) -> SecureFaultStatus {
        SecureFaultStatus {
            sfsr: Self::read(SCB_SFSR),
            sfar: Self::read(SCB_SFAR),
        }
    }
}

#[cfg(all(
    target_arch = "arm",
    any(feature = "armv8m-base", feature = "armv8m-main", feature = "armv81m-main")
))]
fn read_msplim() -> u32 {
    let value: u32;
    // SAFETY: MRS of MSPLIM has no side effects; the feature gate guarantees
    // an Armv8-M target that implements it.
    unsafe { core::arch::asm!("mrs {}, MSPLIM", out(reg) value, options(nomem, nostack, preserves_flags)) };
    value
}

#[cfg(all(
    target_arch = "arm",
    any(feature = "armv8m-base", feature = "armv8m-main", feature = "armv81m-main")
))]
fn read_psplim() -> u32 {
    let value: u32;
    // SAFETY: as for MSPLIM.
    unsafe { core::arch::asm!("mrs {}, PSPLIM", out(reg) value, options(nomem, nostack, preserves_flags)) };
    value
}

#[cfg(not(all(
    target_arch = "arm",
    any(feature = "armv8m-base", feature = "armv8m-main", feature = "armv81m-main")
)))]
fn read_msplim() -> u32 {
    0
}

#[cfg(not(all(
    target_arch = "arm",
    any(feature = "armv8m-base", feature = "armv8m-main", feature = "armv81m-main")
)))]
fn read_psplim() -> u32 {
    0
}

/// Word loads straight from the bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct VolatileMemory;

impl MemorySource for VolatileMemory {
    unsafe fn read_word(&self, address: u32) -> u32 {
        // SAFETY: the caller (BoundedReader) checked alignment and that the
        // word lies inside the configured RAM window.
        unsafe { core::ptr::read_volatile(address as usize as *const u32) }
    }
}
