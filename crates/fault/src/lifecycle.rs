//! Lifecycle controller: the four operations on the persistent record.
//!
//! ```text
//!            clear                 save
//!  Unknown ────────► Empty ───────────────► Valid ──┐
//!     │                ▲        clear         │     │ save (overwrite,
//!     │                └──────────────────────┘     │       count + 1)
//!     │ save                                   ◄────┘
//!     └──────────────────────────────────────► Valid
//! ```
//!
//! `Unknown` is whatever RAM held at power-up, or a corrupt record. It is
//! never trusted: [`FaultController::occurred`] only answers `true` for a
//! record that passes the integrity check.
//!
//! # Re-entrancy
//!
//! `save` runs in the fault handler. A fault raised while it is running
//! (a bad read in a register accessor, say) would re-enter it and scribble
//! over the half-written record. A [`SaveLatch`] shared by every controller
//! instance guards against that: the second caller gets
//! [`SaveOutcome::Dropped`] and the in-flight capture wins. No lock is taken;
//! the latch is a single atomic flag.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::capture::{capture, SystemRegisters, TrapState};
use crate::codec;
use crate::config::FaultConfig;
use crate::memory::MemorySource;
use crate::record::FaultRecord;
use crate::report::FaultReport;
use crate::store::RecordStore;

// ---------------------------------------------------------------------------
// SaveLatch
// ---------------------------------------------------------------------------

/// In-progress flag for [`FaultController::save`].
///
/// Lives in a `static` so that every path into `save` shares it.
#[derive(Debug)]
pub struct SaveLatch {
    busy: AtomicBool,
}

impl SaveLatch {
    /// An idle latch.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// Claim the latch. `None` if a save is already in flight.
    pub fn try_enter(&self) -> Option<SaveGuard<'_>> {
        if self.acquire() {
            Some(SaveGuard { latch: self })
        } else {
            None
        }
    }

    /// `true` while a guard is alive.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    #[cfg(target_has_atomic = "8")]
    fn acquire(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    // Armv6-M has no CAS. A fault handler cannot be preempted by a second
    // instance of itself (a fault inside HardFault locks up), so the window
    // between load and store is never observed.
    #[cfg(not(target_has_atomic = "8"))]
    fn acquire(&self) -> bool {
        if self.busy.load(Ordering::Acquire) {
            return false;
        }
        self.busy.store(true, Ordering::Release);
        true
    }
}

impl Default for SaveLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Releases the [`SaveLatch`] when dropped.
#[derive(Debug)]
pub struct SaveGuard<'l> {
    latch: &'l SaveLatch,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.latch.busy.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Outcome and state
// ---------------------------------------------------------------------------

/// What a call to [`FaultController::save`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SaveOutcome {
    /// The record now holds this fault.
    Saved,
    /// Another save was in flight; this call changed nothing.
    Dropped,
}

/// Classification of the stored record bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecordState {
    /// Neither cleared nor valid: power-up garbage, a stale layout, or corruption.
    Unknown,
    /// Exactly the cleared pattern.
    Empty,
    /// Integrity check passes and at least one fault is recorded.
    Valid,
}

// ---------------------------------------------------------------------------
// Exit hook
// ---------------------------------------------------------------------------

/// Post-fault policy, run by [`FaultController::exit`] after a save.
///
/// Implementations typically do not return (reset, halt); that choice
/// belongs to the application.
pub trait ExitHook {
    /// Called with the freshly saved record.
    fn on_exit(&mut self, record: &FaultRecord);
}

impl<F: FnMut(&FaultRecord)> ExitHook for F {
    fn on_exit(&mut self, record: &FaultRecord) {
        self(record);
    }
}

/// Hook that does nothing and returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoExit;

impl ExitHook for NoExit {
    fn on_exit(&mut self, _record: &FaultRecord) {}
}

// ---------------------------------------------------------------------------
// FaultController
// ---------------------------------------------------------------------------

/// Sole owner of the persistent record.
///
/// Generic over where the record lives (`S`) and what happens after a save
/// (`H`), so the whole lifecycle runs on the host against an in-memory record.
pub struct FaultController<'l, S: RecordStore, H: ExitHook = NoExit> {
    latch: &'l SaveLatch,
    store: S,
    config: FaultConfig,
    hook: H,
}

impl<'l, S: RecordStore> FaultController<'l, S, NoExit> {
    /// Controller over `store`, with no exit policy.
    pub fn new(latch: &'l SaveLatch, store: S, config: FaultConfig) -> Self {
        Self {
            latch,
            store,
            config,
            hook: NoExit,
        }
    }
}

impl<'l, S: RecordStore, H: ExitHook> FaultController<'l, S, H> {
    /// Replace the exit policy.
    pub fn with_exit_hook<H2: ExitHook>(self, hook: H2) -> FaultController<'l, S, H2> {
        FaultController {
            latch: self.latch,
            store: self.store,
            config: self.config,
            hook,
        }
    }

    /// Capture configuration in use.
    #[must_use]
    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    /// Overwrite the record with the empty state. Idempotent.
    pub fn clear(&mut self) {
        *self.store.record_mut() = FaultRecord::zeroed();
        #[cfg(feature = "defmt")]
        defmt::debug!("fault record cleared");
    }

    /// Capture the fault described by `trap` into the record.
    ///
    /// Only the trap glue calls this. The count continues from the stored
    /// record if it is valid, else from zero; a valid record is overwritten.
    /// The count saturates: once it reaches `u32::MAX` further saves keep it
    /// there instead of wrapping to zero, so it stops growing by one.
    pub fn save<M, R>(&mut self, trap: &TrapState, memory: &M, regs: &R) -> SaveOutcome
    where
        M: MemorySource + ?Sized,
        R: SystemRegisters + ?Sized,
    {
        let Some(_guard) = self.latch.try_enter() else {
            #[cfg(feature = "defmt")]
            defmt::warn!("re-entrant fault save dropped");
            return SaveOutcome::Dropped;
        };

        let previous = self.stored_count();
        let mut record = capture(trap, &self.config, memory, regs);
        record.count = previous.saturating_add(1);
        codec::stamp(&mut record);
        *self.store.record_mut() = record;

        #[cfg(feature = "defmt")]
        defmt::error!(
            "fault #{=u32} saved, pc={=u32:#x} content={=u16:#x}",
            record.count,
            record.return_address,
            record.content.bits()
        );
        SaveOutcome::Saved
    }

    /// `true` iff the record is valid and holds at least one fault.
    #[must_use]
    pub fn occurred(&self) -> bool {
        let record = self.store.record();
        codec::is_valid(record) && record.count > 0
    }

    /// Classify the stored bytes.
    #[must_use]
    pub fn state(&self) -> RecordState {
        if self.occurred() {
            RecordState::Valid
        } else if *self.store.record() == FaultRecord::zeroed() {
            RecordState::Empty
        } else {
            RecordState::Unknown
        }
    }

    /// The record, if [`occurred`](Self::occurred).
    #[must_use]
    pub fn record(&self) -> Option<&FaultRecord> {
        self.occurred().then(|| self.store.record())
    }

    /// A printable view of the record, if [`occurred`](Self::occurred).
    #[must_use]
    pub fn report(&self) -> Option<FaultReport<'_>> {
        self.record().map(FaultReport::new)
    }

    /// Run the exit hook on the stored record.
    pub fn exit(&mut self) {
        self.hook.on_exit(self.store.record());
    }

    fn stored_count(&self) -> u32 {
        let record = self.store.record();
        if codec::is_valid(record) {
            record.count
        } else {
            0
        }
    }
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
    use crate::capability::Capabilities;
    use crate::memory::{RamWindow, SliceMemory};
    use crate::mocks::MockRegisters;
    use crate::record::ContentFlags;

    const BASE: u32 = 0x2000_0000;

    fn config() -> FaultConfig {
        FaultConfig::new(Capabilities::ARMV7EM, RamWindow::new(BASE, 0x200).unwrap())
    }

    fn trap() -> TrapState {
        TrapState {
            exc_return: 0xFFFF_FFFD,
            psp: 0x2000_0100,
            msp: 0x2000_01E0,
            xpsr_in_handler: 3,
            ..TrapState::default()
        }
    }

    #[test]
    fn clear_then_occurred_is_false() {
        let latch = SaveLatch::new();
        let mut rec = FaultRecord::from_bytes(&[0x5A; FaultRecord::SIZE]);
        let mut ctl = FaultController::new(&latch, &mut rec, config());
        assert_eq!(ctl.state(), RecordState::Unknown);
        ctl.clear();
        assert!(!ctl.occurred());
        assert_eq!(ctl.state(), RecordState::Empty);
        ctl.clear();
        assert_eq!(ctl.state(), RecordState::Empty);
        assert_eq!(rec.count, 0);
    }

    #[test]
    fn save_validates_and_counts() {
        let ram = [0u8; 0x200];
        let mem = SliceMemory::new(BASE, &ram);
        let latch = SaveLatch::new();
        let mut ctl = FaultController::new(&latch, FaultRecord::zeroed(), config());

        assert_eq!(ctl.save(&trap(), &mem, &MockRegisters::busy()), SaveOutcome::Saved);
        assert!(ctl.occurred());
        assert_eq!(ctl.state(), RecordState::Valid);
        assert_eq!(ctl.record().unwrap().count, 1);

        ctl.save(&trap(), &mem, &MockRegisters::busy());
        assert_eq!(ctl.record().unwrap().count, 2);
        assert!(!latch.is_busy());
    }

    #[test]
    fn save_over_garbage_starts_from_one() {
        let ram = [0u8; 0x200];
        let mem = SliceMemory::new(BASE, &ram);
        let latch = SaveLatch::new();
        let mut garbage = FaultRecord::from_bytes(&[0xFF; FaultRecord::SIZE]);
        garbage.count = 41;
        let mut ctl = FaultController::new(&latch, garbage, config());
        ctl.save(&trap(), &mem, &MockRegisters::default());
        assert_eq!(ctl.record().unwrap().count, 1);
    }

    #[test]
    fn later_fault_overwrites_earlier() {
        let mut ram = [0u8; 0x200];
        ram[0x118..0x11C].copy_from_slice(&0x0800_0AAAu32.to_le_bytes());
        let mem = SliceMemory::new(BASE, &ram);
        let latch = SaveLatch::new();
        let mut ctl = FaultController::new(&latch, FaultRecord::zeroed(), config());
        ctl.save(&trap(), &mem, &MockRegisters::default());
        assert_eq!(ctl.record().unwrap().return_address, 0x0800_0AAA);

        let mut second = trap();
        second.psp = 0x2000_0140;
        ctl.save(&second, &mem, &MockRegisters::default());
        let rec = ctl.record().unwrap();
        assert_eq!(rec.return_address, 0);
        assert_eq!(rec.psp, 0x2000_0140);
        assert_eq!(rec.count, 2);
    }

    #[test]
    fn reentrant_save_is_dropped() {
        let ram = [0u8; 0x200];
        let mem = SliceMemory::new(BASE, &ram);
        let latch = SaveLatch::new();
        let mut ctl = FaultController::new(&latch, FaultRecord::zeroed(), config());

        let in_flight = latch.try_enter().unwrap();
        assert_eq!(
            ctl.save(&trap(), &mem, &MockRegisters::busy()),
            SaveOutcome::Dropped
        );
        assert!(!ctl.occurred());
        assert_eq!(mem.reads(), 0);
        drop(in_flight);

        assert_eq!(ctl.save(&trap(), &mem, &MockRegisters::busy()), SaveOutcome::Saved);
    }

    #[test]
    fn count_saturates_at_max() {
        let ram = [0u8; 0x200];
        let mem = SliceMemory::new(BASE, &ram);
        let mut prior = FaultRecord::zeroed();
        prior.count = u32::MAX - 1;
        codec::stamp(&mut prior);
        let latch = SaveLatch::new();
        let mut ctl = FaultController::new(&latch, prior, config());

        ctl.save(&trap(), &mem, &MockRegisters::default());
        assert_eq!(ctl.record().unwrap().count, u32::MAX);
        ctl.save(&trap(), &mem, &MockRegisters::default());
        assert_eq!(ctl.record().unwrap().count, u32::MAX);
        assert!(ctl.occurred());
    }

    #[test]
    fn latch_admits_one_holder() {
        let latch = SaveLatch::new();
        let first = latch.try_enter();
        assert!(first.is_some());
        assert!(latch.try_enter().is_none());
        drop(first);
        assert!(latch.try_enter().is_some());
    }

    #[test]
    fn bad_stack_still_yields_valid_record() {
        let ram = [0u8; 0x200];
        let mem = SliceMemory::new(BASE, &ram);
        let latch = SaveLatch::new();
        let mut ctl = FaultController::new(&latch, FaultRecord::zeroed(), config());
        let mut t = trap();
        t.psp = 0x0000_0000;
        ctl.save(&t, &mem, &MockRegisters::busy());
        let rec = ctl.record().unwrap();
        assert!(!rec.has(ContentFlags::STATE_CONTEXT));
        assert!(rec.has(ContentFlags::FAULT_REGS));
        assert_eq!(rec.r0, 0);
    }

    #[test]
    fn exit_hook_sees_saved_record() {
        let ram = [0u8; 0x200];
        let mem = SliceMemory::new(BASE, &ram);
        let latch = SaveLatch::new();
        let mut seen = None;
        {
            let mut ctl = FaultController::new(&latch, FaultRecord::zeroed(), config())
                .with_exit_hook(|r: &FaultRecord| seen = Some(r.count));
            ctl.save(&trap(), &mem, &MockRegisters::default());
            ctl.exit();
        }
        assert_eq!(seen, Some(1));
    }

    #[test]
    fn report_only_for_valid_record() {
        let latch = SaveLatch::new();
        let ctl = FaultController::new(&latch, FaultRecord::zeroed(), config());
        assert!(ctl.report().is_none());
        assert!(ctl.record().is_none());
    }
}
