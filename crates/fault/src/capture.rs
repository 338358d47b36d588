//! Context capture engine.
//!
//! Runs inside the fault handler. Given the processor state the trap glue
//! observed on entry ([`TrapState`]), it locates the exception frame on the
//! stack that was active at fault time, reads it through the
//! [`BoundedReader`], and fills in every register group the target's
//! [`Capabilities`] say exists.
//!
//! Capture is total. A stack pointer that fails the bounds check clears the
//! `state_context` flag and leaves the core registers zero; a missing
//! register group clears its flag. Nothing here returns an error.

use crate::capability::Capabilities;
use crate::config::FaultConfig;
use crate::frame::{ExcReturn, FrameLayout, BASIC_FRAME_WORDS, STATE_CONTEXT_WORDS};
use crate::memory::{AccessError, BoundedReader, MemorySource};
use crate::record::{ContentFlags, FaultRecord};

/// Processor state handed over by the trap glue.
///
/// Everything here is observable from registers alone, without
/// dereferencing memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrapState {
    /// LR on exception entry.
    pub exc_return: u32,
    /// Main stack pointer (of the current security state).
    pub msp: u32,
    /// Process stack pointer (of the current security state).
    pub psp: u32,
    /// Non-secure MSP (`MSP_NS`); only read in secure builds.
    pub msp_ns: u32,
    /// Non-secure PSP (`PSP_NS`); only read in secure builds.
    pub psp_ns: u32,
    /// xPSR as seen inside the handler (IPSR holds the exception number).
    pub xpsr_in_handler: u32,
    /// R4..R11 as they were on entry, saved before any other code ran.
    pub callee_saved: [u32; 8],
}

/// MSPLIM / PSPLIM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct StackLimits {
    pub msplim: u32,
    pub psplim: u32,
}

/// SCB fault status and address registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct FaultStatus {
    pub cfsr: u32,
    pub hfsr: u32,
    pub dfsr: u32,
    pub mmfar: u32,
    pub bfar: u32,
    pub afsr: u32,
}

/// SCB secure fault status and address registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub struct SecureFaultStatus {
    pub sfsr: u32,
    pub sfar: u32,
}

/// Special-purpose register reads.
///
/// Only called when the matching capability is present, so implementations
/// may assume the registers exist.
pub trait SystemRegisters {
    /// MSPLIM and PSPLIM.
    fn stack_limits(&self) -> StackLimits;
    /// CFSR, HFSR, DFSR, MMFAR, BFAR, AFSR.
    fn fault_status(&self) -> FaultStatus;
    /// SFSR and SFAR.
    fn secure_fault_status(&self) -> SecureFaultStatus;
}

impl<T: SystemRegisters + ?Sized> SystemRegisters for &T {
    fn stack_limits(&self) -> StackLimits {
        (**self).stack_limits()
    }

    fn fault_status(&self) -> FaultStatus {
        (**self).fault_status()
    }

    fn secure_fault_status(&self) -> SecureFaultStatus {
        (**self).secure_fault_status()
    }
}

/// The stack pointers that locate the frame, as they will be recorded.
///
/// In a secure build a frame on the non-secure stack (EXC_RETURN.S = 0) is
/// found through the `_NS` pointers.
#[must_use]
pub fn active_stack_pointers(trap: &TrapState, caps: Capabilities) -> (u32, u32) {
    let exc = ExcReturn::new(trap.exc_return);
    if caps.armv8m && caps.tz_secure && !exc.secure_stack() {
        (trap.msp_ns, trap.psp_ns)
    } else {
        (trap.msp, trap.psp)
    }
}

/// Registers read from the stacked frame.
struct StackedContext {
    basic: [u32; BASIC_FRAME_WORDS as usize],
    state: Option<[u32; STATE_CONTEXT_WORDS as usize]>,
}

fn read_frame<M: MemorySource + ?Sized>(
    reader: &BoundedReader<'_, M>,
    sp: u32,
    layout: FrameLayout,
) -> Result<StackedContext, AccessError> {
    // Validate the whole frame, FP extension included, before any load.
    reader.check(sp, layout.words())?;
    let state = if layout.state_context {
        Some(reader.read_words(sp)?)
    } else {
        None
    };
    let basic = reader.read_words(sp.wrapping_add(layout.basic_frame_offset()))?;
    Ok(StackedContext { basic, state })
}

/// Build a record from the state at fault entry.
///
/// Returns a record with every captured field and content flag set. Count,
/// magic, version and checksum are left zero for the lifecycle controller.
pub fn capture<M, R>(trap: &TrapState, config: &FaultConfig, memory: &M, regs: &R) -> FaultRecord
where
    M: MemorySource + ?Sized,
    R: SystemRegisters + ?Sized,
{
    let caps = config.capabilities;
    let exc = ExcReturn::new(trap.exc_return);
    let (msp, psp) = active_stack_pointers(trap, caps);

    let mut record = FaultRecord::zeroed();
    record.xpsr_in_handler = trap.xpsr_in_handler;
    record.exc_return = trap.exc_return;
    record.msp = msp;
    record.psp = psp;

    let sp = if exc.uses_psp() { psp } else { msp };
    let layout = FrameLayout::new(exc, caps);
    let reader = BoundedReader::new(config.ram, memory);
    match read_frame(&reader, sp, layout) {
        Ok(stacked) => {
            let [r0, r1, r2, r3, r12, lr, return_address, xpsr] = stacked.basic;
            record.r0 = r0;
            record.r1 = r1;
            record.r2 = r2;
            record.r3 = r3;
            record.r12 = r12;
            record.lr = lr;
            record.return_address = return_address;
            record.xpsr = xpsr;

            let [r4, r5, r6, r7, r8, r9, r10, r11] = match stacked.state {
                Some([signature, _reserved, r4, r5, r6, r7, r8, r9, r10, r11]) => {
                    record.integrity_signature = signature;
                    [r4, r5, r6, r7, r8, r9, r10, r11]
                }
                None => trap.callee_saved,
            };
            record.r4 = r4;
            record.r5 = r5;
            record.r6 = r6;
            record.r7 = r7;
            record.r8 = r8;
            record.r9 = r9;
            record.r10 = r10;
            record.r11 = r11;
            record.content.insert(ContentFlags::STATE_CONTEXT);
        }
        Err(_err) => {
            #[cfg(feature = "defmt")]
            defmt::warn!("fault frame at {=u32:#x} not captured: {}", sp, _err);
        }
    }

    if caps.has_stack_limit_regs() {
        let limits = regs.stack_limits();
        record.msplim = limits.msplim;
        record.psplim = limits.psplim;
        record.content.insert(ContentFlags::LIMIT_REGS);
    }

    if caps.fault_regs {
        let status = regs.fault_status();
        record.cfsr = status.cfsr;
        record.hfsr = status.hfsr;
        record.dfsr = status.dfsr;
        record.mmfar = status.mmfar;
        record.bfar = status.bfar;
        record.afsr = status.afsr;
        record.content.insert(ContentFlags::FAULT_REGS);
    }

    if caps.has_secure_fault_regs() {
        let status = regs.secure_fault_status();
        record.sfsr = status.sfsr;
        record.sfar = status.sfar;
        record.content.insert(ContentFlags::SECURE_FAULT_REGS);
    }

    record.content.set(ContentFlags::ARMV8M, caps.armv8m);
    record.content.set(ContentFlags::TZ_SECURE, caps.tz_secure);
    record
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use crate::memory::{RamWindow, SliceMemory};
    use crate::mocks::MockRegisters;

    const BASE: u32 = 0x2000_0000;

    fn ram_with(words_at: &[(u32, &[u32])]) -> [u8; 0x400] {
        let mut ram = [0u8; 0x400];
        for (addr, words) in words_at {
            let mut off = (addr - BASE) as usize;
            for w in *words {
                ram[off..off + 4].copy_from_slice(&w.to_le_bytes());
                off += 4;
            }
        }
        ram
    }

    fn config(caps: Capabilities) -> FaultConfig {
        FaultConfig::new(caps, RamWindow::new(BASE, 0x400).unwrap())
    }

    const FRAME: [u32; 8] = [1, 2, 3, 4, 5, 0x0800_1234, 0x0800_5678, 0x6100_0000];

    #[test]
    fn psp_frame_is_captured_with_callee_snapshot() {
        let ram = ram_with(&[(0x2000_0100, &FRAME)]);
        let mem = SliceMemory::new(BASE, &ram);
        let trap = TrapState {
            exc_return: 0xFFFF_FFFD,
            msp: 0x2000_03F0,
            psp: 0x2000_0100,
            xpsr_in_handler: 3,
            callee_saved: [4, 5, 6, 7, 8, 9, 10, 11],
            ..TrapState::default()
        };
        let rec = capture(&trap, &config(Capabilities::ARMV7EM), &mem, &MockRegisters::default());

        assert!(rec.has(ContentFlags::STATE_CONTEXT));
        assert_eq!([rec.r0, rec.r1, rec.r2, rec.r3, rec.r12], [1, 2, 3, 4, 5]);
        assert_eq!(rec.lr, 0x0800_1234);
        assert_eq!(rec.return_address, 0x0800_5678);
        assert_eq!(rec.xpsr, 0x6100_0000);
        assert_eq!([rec.r4, rec.r11], [4, 11]);
        assert_eq!(rec.psp, 0x2000_0100);
        assert_eq!(rec.msp, 0x2000_03F0);
        assert_eq!(rec.xpsr_in_handler, 3);
        assert!(!mem.strayed());
    }

    #[test]
    fn msp_is_used_when_spsel_clear() {
        let ram = ram_with(&[(0x2000_0200, &FRAME)]);
        let mem = SliceMemory::new(BASE, &ram);
        let trap = TrapState {
            exc_return: 0xFFFF_FFF9,
            msp: 0x2000_0200,
            psp: 0xDEAD_BEEF,
            ..TrapState::default()
        };
        let rec = capture(&trap, &config(Capabilities::ARMV6M), &mem, &MockRegisters::default());
        assert!(rec.has(ContentFlags::STATE_CONTEXT));
        assert_eq!(rec.return_address, 0x0800_5678);
    }

    #[test]
    fn wild_stack_pointer_degrades_to_unset_flag() {
        let ram = [0xAAu8; 0x400];
        let mem = SliceMemory::new(BASE, &ram);
        let trap = TrapState {
            exc_return: 0xFFFF_FFFD,
            psp: 0xDEAD_BEEC,
            callee_saved: [9; 8],
            ..TrapState::default()
        };
        let rec = capture(&trap, &config(Capabilities::ARMV7EM), &mem, &MockRegisters::busy());
        assert!(!rec.has(ContentFlags::STATE_CONTEXT));
        assert_eq!(rec.r0, 0);
        assert_eq!(rec.r4, 0, "callee snapshot only lands with the frame");
        assert_eq!(rec.psp, 0xDEAD_BEEC);
        assert!(rec.has(ContentFlags::FAULT_REGS));
        assert_eq!(mem.reads(), 0);
    }

    #[test]
    fn frame_straddling_window_end_is_rejected() {
        let ram = [0u8; 0x400];
        let mem = SliceMemory::new(BASE, &ram);
        let trap = TrapState {
            exc_return: 0xFFFF_FFFD,
            psp: BASE + 0x400 - 16,
            ..TrapState::default()
        };
        let rec = capture(&trap, &config(Capabilities::ARMV7EM), &mem, &MockRegisters::default());
        assert!(!rec.has(ContentFlags::STATE_CONTEXT));
        assert_eq!(mem.reads(), 0);
    }

    #[test]
    fn extended_frame_size_is_bounds_checked() {
        // Basic frame fits, FP extension would not.
        let sp = BASE + 0x400 - 64;
        let ram = ram_with(&[(sp, &FRAME)]);
        let mem = SliceMemory::new(BASE, &ram);
        let trap = TrapState {
            exc_return: 0xFFFF_FFED,
            psp: sp,
            ..TrapState::default()
        };
        let rec = capture(&trap, &config(Capabilities::ARMV7EM), &mem, &MockRegisters::default());
        assert!(!rec.has(ContentFlags::STATE_CONTEXT));
    }

    #[test]
    fn misaligned_stack_pointer_is_rejected() {
        let ram = ram_with(&[(0x2000_0100, &FRAME)]);
        let mem = SliceMemory::new(BASE, &ram);
        let trap = TrapState {
            exc_return: 0xFFFF_FFFD,
            psp: 0x2000_0102,
            ..TrapState::default()
        };
        let rec = capture(&trap, &config(Capabilities::ARMV7EM), &mem, &MockRegisters::default());
        assert!(!rec.has(ContentFlags::STATE_CONTEXT));
        assert_eq!(mem.reads(), 0);
    }

    #[test]
    fn missing_fault_regs_stay_zero() {
        let ram = ram_with(&[(0x2000_0100, &FRAME)]);
        let mem = SliceMemory::new(BASE, &ram);
        let trap = TrapState {
            exc_return: 0xFFFF_FFFD,
            psp: 0x2000_0100,
            ..TrapState::default()
        };
        let rec = capture(&trap, &config(Capabilities::ARMV6M), &mem, &MockRegisters::busy());
        assert!(!rec.has(ContentFlags::FAULT_REGS));
        assert!(!rec.has(ContentFlags::LIMIT_REGS));
        assert_eq!([rec.cfsr, rec.hfsr, rec.mmfar, rec.bfar], [0; 4]);
        assert_eq!([rec.msplim, rec.psplim], [0; 2]);
    }

    #[test]
    fn v8m_state_context_supplies_callee_and_signature() {
        let sp = 0x2000_0100;
        let mut words = [0u32; 18];
        words[0] = 0xFEFA_125B;
        for (i, w) in words[2..10].iter_mut().enumerate() {
            *w = 0x40 + i as u32;
        }
        words[10..].copy_from_slice(&FRAME);
        let ram = ram_with(&[(sp, &words)]);
        let mem = SliceMemory::new(BASE, &ram);
        let trap = TrapState {
            exc_return: 0xFFFF_FFDD,
            psp: sp,
            callee_saved: [0xEE; 8],
            ..TrapState::default()
        };
        let caps = Capabilities::ARMV8M_MAIN.secure();
        let rec = capture(&trap, &config(caps), &mem, &MockRegisters::busy());

        assert!(rec.has(ContentFlags::STATE_CONTEXT));
        assert!(rec.has(ContentFlags::ARMV8M));
        assert!(rec.has(ContentFlags::TZ_SECURE));
        assert!(rec.has(ContentFlags::LIMIT_REGS));
        assert!(rec.has(ContentFlags::SECURE_FAULT_REGS));
        assert_eq!(rec.integrity_signature, 0xFEFA_125B);
        assert_eq!(rec.r4, 0x40);
        assert_eq!(rec.r11, 0x47);
        assert_eq!(rec.r0, 1);
        assert_eq!(rec.xpsr, 0x6100_0000);
        assert_eq!(rec.sfsr, MockRegisters::busy().secure.sfsr);
    }

    #[test]
    fn secure_build_uses_non_secure_pointers_for_ns_frame() {
        let ram = ram_with(&[(0x2000_0300, &FRAME)]);
        let mem = SliceMemory::new(BASE, &ram);
        // S = 0, DCRS = 1, SPSEL = 1
        let trap = TrapState {
            exc_return: 0xFFFF_FFBD,
            psp: 0x3000_0000,
            psp_ns: 0x2000_0300,
            msp_ns: 0x2000_0380,
            ..TrapState::default()
        };
        let rec = capture(
            &trap,
            &config(Capabilities::ARMV8M_MAIN.secure()),
            &mem,
            &MockRegisters::default(),
        );
        assert!(rec.has(ContentFlags::STATE_CONTEXT));
        assert_eq!(rec.psp, 0x2000_0300);
        assert_eq!(rec.msp, 0x2000_0380);
        assert_eq!(rec.integrity_signature, 0);
    }

    #[test]
    fn non_secure_build_ignores_ns_pointers() {
        let trap = TrapState {
            exc_return: 0xFFFF_FFBD,
            psp: 0x2000_0100,
            psp_ns: 0x2000_0300,
            ..TrapState::default()
        };
        assert_eq!(
            active_stack_pointers(&trap, Capabilities::ARMV8M_MAIN),
            (0, 0x2000_0100)
        );
    }
}
