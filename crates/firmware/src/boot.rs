//! Boot-time fault check.
//!
//! Runs once, early in `main`, before interrupts are enabled:
//!   1. Classify the retained record (valid fault, cleared, or garbage)
//!   2. Report a valid fault over defmt/RTT
//!   3. Clear the record so the next boot starts from the empty state
//!
//! Pure over [`RecordStore`], so the sequence is host-testable against an
//! in-memory record.

use fault::{ExitHook, FaultController, FaultRecord, RecordState, RecordStore};

/// Result of the boot check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootCheck {
    /// The previous run ended in a fault; here is its record.
    Recovered(FaultRecord),
    /// Record was already empty.
    Clean,
    /// Record held garbage (first power-up, or RAM lost); now cleared.
    Initialised,
}

/// Report and acknowledge a fault left by the previous run.
///
/// Always leaves the record cleared.
pub fn take_previous_fault<S: RecordStore, H: ExitHook>(
    faults: &mut FaultController<'_, S, H>,
) -> BootCheck {
    let check = match faults.state() {
        RecordState::Valid => match faults.record() {
            Some(record) => {
                #[cfg(feature = "defmt")]
                defmt::error!("previous run faulted: {}", fault::FaultReport::new(record));
                BootCheck::Recovered(*record)
            }
            None => BootCheck::Initialised,
        },
        RecordState::Empty => {
            #[cfg(feature = "defmt")]
            defmt::info!("no fault recorded");
            BootCheck::Clean
        }
        RecordState::Unknown => {
            #[cfg(feature = "defmt")]
            defmt::info!("fault record uninitialised, clearing");
            BootCheck::Initialised
        }
    };
    faults.clear();
    check
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use fault::{codec, Capabilities, FaultConfig, RamWindow, SaveLatch};

    fn config() -> FaultConfig {
        FaultConfig::new(Capabilities::ARMV7EM, RamWindow::new(0x2000_0000, 0x100).unwrap())
    }

    #[test]
    fn valid_record_is_recovered_then_cleared() {
        let mut rec = FaultRecord::zeroed();
        rec.count = 3;
        rec.return_address = 0x0800_0101;
        codec::stamp(&mut rec);

        let latch = SaveLatch::new();
        let mut faults = FaultController::new(&latch, rec, config());
        match take_previous_fault(&mut faults) {
            BootCheck::Recovered(r) => assert_eq!(r.return_address, 0x0800_0101),
            other => panic!("expected Recovered, got {other:?}"),
        }
        assert!(!faults.occurred());
        assert_eq!(take_previous_fault(&mut faults), BootCheck::Clean);
    }

    #[test]
    fn garbage_is_initialised() {
        let latch = SaveLatch::new();
        let mut faults = FaultController::new(
            &latch,
            FaultRecord::from_bytes(&[0xA5; FaultRecord::SIZE]),
            config(),
        );
        assert_eq!(take_previous_fault(&mut faults), BootCheck::Initialised);
        assert_eq!(faults.state(), RecordState::Empty);
    }
}
