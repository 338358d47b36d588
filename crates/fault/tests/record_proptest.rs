//! Property-based tests for the record lifecycle.
//! Verifies invariants hold for arbitrary prior RAM contents and trap state.
#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use fault::{
    codec, Capabilities, FaultConfig, FaultController, FaultRecord, FaultStatus, RamWindow,
    SaveLatch, SecureFaultStatus, SliceMemory, StackLimits, SystemRegisters, TrapState,
};
use proptest::prelude::*;

const RAM_BASE: u32 = 0x2000_0000;
const RAM_LEN: u32 = 0x400;

struct ZeroRegisters;

impl SystemRegisters for ZeroRegisters {
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

fn any_caps() -> impl Strategy<Value = Capabilities> {
    prop_oneof![
        Just(Capabilities::ARMV6M),
        Just(Capabilities::ARMV7M),
        Just(Capabilities::ARMV8M_BASE),
        Just(Capabilities::ARMV8M_BASE.secure()),
        Just(Capabilities::ARMV8M_MAIN),
        Just(Capabilities::ARMV81M_MAIN.secure()),
    ]
}

fn any_trap() -> impl Strategy<Value = TrapState> {
    (
        0xFFFF_FF00u32..=0xFFFF_FFFF,
        prop_oneof![RAM_BASE..RAM_BASE + RAM_LEN, any::<u32>()],
        prop_oneof![RAM_BASE..RAM_BASE + RAM_LEN, any::<u32>()],
        any::<u32>(),
        any::<[u32; 8]>(),
    )
        .prop_map(|(exc_return, msp, psp, xpsr_in_handler, callee_saved)| TrapState {
            exc_return,
            msp,
            psp,
            msp_ns: psp,
            psp_ns: msp,
            xpsr_in_handler,
            callee_saved,
        })
}

fn any_image() -> impl Strategy<Value = [u8; FaultRecord::SIZE]> {
    proptest::collection::vec(any::<u8>(), FaultRecord::SIZE)
        .prop_map(|v| <[u8; FaultRecord::SIZE]>::try_from(v).unwrap())
}

fn config(caps: Capabilities) -> FaultConfig {
    FaultConfig::new(caps, RamWindow::new(RAM_BASE, RAM_LEN).unwrap())
}

proptest! {
    /// Clear always leaves an empty, non-occurred record.
    #[test]
    fn clear_always_empties(image in any_image()) {
        let latch = SaveLatch::new();
        let mut faults = FaultController::new(
            &latch,
            FaultRecord::from_bytes(&image),
            config(Capabilities::ARMV7EM),
        );
        faults.clear();
        prop_assert!(!faults.occurred());
        prop_assert_eq!(faults.record(), None);
    }

    /// Save always yields a valid record whose stored checksum recomputes,
    /// and never reads outside the RAM window.
    #[test]
    fn save_always_validates(
        image in any_image(),
        ram in proptest::collection::vec(any::<u8>(), RAM_LEN as usize),
        trap in any_trap(),
        caps in any_caps(),
    ) {
        let memory = SliceMemory::new(RAM_BASE, &ram);
        let latch = SaveLatch::new();
        let mut faults =
            FaultController::new(&latch, FaultRecord::from_bytes(&image), config(caps));
        faults.save(&trap, &memory, &ZeroRegisters);

        prop_assert!(faults.occurred());
        let rec = faults.record().unwrap();
        prop_assert_eq!(rec.checksum, codec::checksum(rec));
        prop_assert!(!memory.strayed());
    }

    /// Any single-byte change outside magic/checksum invalidates the record.
    #[test]
    fn single_byte_corruption_is_detected(
        trap in any_trap(),
        offset in 8usize..FaultRecord::SIZE,
        flip in 1u8..=255,
    ) {
        let ram = vec![0u8; RAM_LEN as usize];
        let memory = SliceMemory::new(RAM_BASE, &ram);
        let latch = SaveLatch::new();
        let mut faults =
            FaultController::new(&latch, FaultRecord::zeroed(), config(Capabilities::ARMV7EM));
        faults.save(&trap, &memory, &ZeroRegisters);

        let mut image = faults.record().unwrap().to_bytes();
        image[offset] ^= flip;
        let corrupted = FaultController::new(
            &latch,
            FaultRecord::from_bytes(&image),
            config(Capabilities::ARMV7EM),
        );
        prop_assert!(!corrupted.occurred());
    }

    /// Each save adds exactly one to a valid prior count.
    #[test]
    fn save_increments_valid_count(prior in 0u32..u32::MAX - 2, trap in any_trap()) {
        let mut record = FaultRecord::zeroed();
        record.count = prior;
        codec::stamp(&mut record);

        let ram = vec![0u8; RAM_LEN as usize];
        let memory = SliceMemory::new(RAM_BASE, &ram);
        let latch = SaveLatch::new();
        let mut faults = FaultController::new(&latch, record, config(Capabilities::ARMV8M_MAIN));
        faults.save(&trap, &memory, &ZeroRegisters);
        prop_assert_eq!(faults.record().unwrap().count, prior + 1);
        faults.save(&trap, &memory, &ZeroRegisters);
        prop_assert_eq!(faults.record().unwrap().count, prior + 2);
    }

    /// Decoding arbitrary bytes never panics.
    #[test]
    fn decode_is_total(bytes in proptest::collection::vec(any::<u8>(), 0..300)) {
        let _ = codec::decode(&bytes);
    }
}
