//! End-to-end lifecycle scenarios: clear, save, occurred against an
//! in-memory record and a simulated RAM image.
// Test file: unwrap/indexing and arithmetic are intentional.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]

use fault::{
    codec, Capabilities, ContentFlags, FaultConfig, FaultController, FaultRecord, FaultStatus,
    Field, RamWindow, RecordState, SaveLatch, SaveOutcome, SecureFaultStatus, SliceMemory,
    StackLimits, SystemRegisters, TrapState,
};

const RAM_BASE: u32 = 0x2000_0000;
const RAM_LEN: u32 = 0x1000;

/// Registers that read as a precise bus fault on every variant.
struct BusFaultRegisters;

impl SystemRegisters for BusFaultRegisters {
    fn stack_limits(&self) -> StackLimits {
        StackLimits {
            msplim: 0x2000_0800,
            psplim: 0x2000_0000,
        }
    }

    fn fault_status(&self) -> FaultStatus {
        FaultStatus {
            cfsr: 0x0000_8200,
            hfsr: 0x4000_0000,
            dfsr: 0,
            mmfar: 0,
            bfar: 0x6000_0000,
            afsr: 0,
        }
    }

    fn secure_fault_status(&self) -> SecureFaultStatus {
        SecureFaultStatus {
            sfsr: 0x48,
            sfar: 0x1000_0000,
        }
    }
}

fn ram_with_frame(at: u32, frame: &[u32]) -> Vec<u8> {
    let mut ram = vec![0u8; RAM_LEN as usize];
    let mut off = (at - RAM_BASE) as usize;
    for word in frame {
        ram[off..off + 4].copy_from_slice(&word.to_le_bytes());
        off += 4;
    }
    ram
}

fn config(caps: Capabilities) -> FaultConfig {
    FaultConfig::new(caps, RamWindow::new(RAM_BASE, RAM_LEN).unwrap())
}

const STANDARD_FRAME: [u32; 8] = [1, 2, 3, 4, 5, 0x0800_1234, 0x0800_5678, 0x6100_0000];

#[test]
fn process_stack_fault_on_armv7_is_captured() {
    let caps = Capabilities {
        fault_regs: true,
        armv8m: false,
        mainline: true,
        tz_secure: false,
    };
    let ram = ram_with_frame(0x2000_0100, &STANDARD_FRAME);
    let memory = SliceMemory::new(RAM_BASE, &ram);
    let latch = SaveLatch::new();
    let mut faults = FaultController::new(&latch, FaultRecord::zeroed(), config(caps));
    faults.clear();

    let trap = TrapState {
        exc_return: 0xFFFF_FFFD,
        msp: 0x2000_0F00,
        psp: 0x2000_0100,
        xpsr_in_handler: 3,
        ..TrapState::default()
    };
    assert_eq!(faults.save(&trap, &memory, &BusFaultRegisters), SaveOutcome::Saved);

    assert!(faults.occurred());
    let rec = faults.record().unwrap();
    assert!(rec.has(ContentFlags::STATE_CONTEXT));
    assert_eq!(
        [rec.r0, rec.r1, rec.r2, rec.r3, rec.r12],
        [1, 2, 3, 4, 5]
    );
    assert_eq!(rec.lr, 0x0800_1234);
    assert_eq!(rec.return_address, 0x0800_5678);
    assert_eq!(rec.xpsr, 0x6100_0000);
    assert_eq!(rec.psp, 0x2000_0100);
    assert_eq!(rec.count, 1);
    assert!(!memory.strayed());
}

#[test]
fn uninitialised_memory_is_not_a_fault() {
    let latch = SaveLatch::new();
    let faults = FaultController::new(
        &latch,
        FaultRecord::from_bytes(&[0xFF; FaultRecord::SIZE]),
        config(Capabilities::ARMV7EM),
    );
    assert!(!faults.occurred());
    assert_eq!(faults.state(), RecordState::Unknown);
    assert!(faults.report().is_none());
}

#[test]
fn stack_pointer_outside_ram_still_produces_valid_record() {
    let ram = vec![0u8; RAM_LEN as usize];
    let memory = SliceMemory::new(RAM_BASE, &ram);
    let latch = SaveLatch::new();
    let mut faults =
        FaultController::new(&latch, FaultRecord::zeroed(), config(Capabilities::ARMV7EM));

    let trap = TrapState {
        exc_return: 0xFFFF_FFF9,
        msp: 0x1000_0000,
        psp: 0x2000_0100,
        callee_saved: [0x44; 8],
        ..TrapState::default()
    };
    faults.save(&trap, &memory, &BusFaultRegisters);

    assert!(faults.occurred());
    let rec = faults.record().unwrap();
    assert!(!rec.has(ContentFlags::STATE_CONTEXT));
    for field in Field::ALL {
        if field.group() == fault::FieldGroup::Core {
            assert_eq!(rec.get(field), 0, "{} must be zero", field.name());
        }
    }
    assert_eq!(rec.msp, 0x1000_0000);
    assert!(codec::is_valid(rec));
    assert_eq!(memory.reads(), 0);
}

#[test]
fn armv6m_never_records_fault_status() {
    let ram = ram_with_frame(0x2000_0100, &STANDARD_FRAME);
    let memory = SliceMemory::new(RAM_BASE, &ram);
    let latch = SaveLatch::new();
    let mut faults =
        FaultController::new(&latch, FaultRecord::zeroed(), config(Capabilities::ARMV6M));
    let trap = TrapState {
        exc_return: 0xFFFF_FFFD,
        psp: 0x2000_0100,
        ..TrapState::default()
    };
    faults.save(&trap, &memory, &BusFaultRegisters);

    let rec = faults.record().unwrap();
    assert!(!rec.has(ContentFlags::FAULT_REGS));
    for field in Field::ALL {
        if field.group() == fault::FieldGroup::FaultStatus {
            assert_eq!(rec.get(field), 0, "{} must be zero", field.name());
        }
    }
}

#[test]
fn consecutive_saves_count_up_and_clear_resets() {
    let ram = ram_with_frame(0x2000_0100, &STANDARD_FRAME);
    let memory = SliceMemory::new(RAM_BASE, &ram);
    let latch = SaveLatch::new();
    let mut faults =
        FaultController::new(&latch, FaultRecord::zeroed(), config(Capabilities::ARMV8M_MAIN));
    let trap = TrapState {
        exc_return: 0xFFFF_FFB0,
        msp: 0x2000_0100,
        ..TrapState::default()
    };

    for expected in 1..=3 {
        faults.save(&trap, &memory, &BusFaultRegisters);
        assert_eq!(faults.record().unwrap().count, expected);
    }
    faults.clear();
    assert!(!faults.occurred());
    assert_eq!(faults.state(), RecordState::Empty);
    faults.save(&trap, &memory, &BusFaultRegisters);
    assert_eq!(faults.record().unwrap().count, 1);
}

#[test]
fn secure_mainline_captures_every_group() {
    let ram = ram_with_frame(0x2000_0200, &STANDARD_FRAME);
    let memory = SliceMemory::new(RAM_BASE, &ram);
    let latch = SaveLatch::new();
    let mut faults = FaultController::new(
        &latch,
        FaultRecord::zeroed(),
        config(Capabilities::ARMV81M_MAIN.secure()),
    );
    // Secure handler, secure MSP, default callee stacking.
    let trap = TrapState {
        exc_return: 0xFFFF_FFF1,
        msp: 0x2000_0200,
        xpsr_in_handler: 7,
        ..TrapState::default()
    };
    faults.save(&trap, &memory, &BusFaultRegisters);

    let rec = faults.record().unwrap();
    for (name, flag) in ContentFlags::all().iter_names() {
        assert!(rec.has(flag), "{name} missing");
    }
    assert_eq!(rec.sfsr, 0x48);
    assert_eq!(rec.msplim, 0x2000_0800);

    let text = faults.report().unwrap().to_string();
    assert!(text.contains("SecureFault"));
    assert!(text.contains("AUVIOL"));
    assert!(text.contains("SFARVALID"));
}

#[test]
fn saved_record_survives_byte_image_round_trip() {
    let ram = ram_with_frame(0x2000_0100, &STANDARD_FRAME);
    let memory = SliceMemory::new(RAM_BASE, &ram);
    let latch = SaveLatch::new();
    let mut record = FaultRecord::zeroed();
    {
        let mut faults = FaultController::new(&latch, &mut record, config(Capabilities::ARMV7EM));
        let trap = TrapState {
            exc_return: 0xFFFF_FFFD,
            psp: 0x2000_0100,
            ..TrapState::default()
        };
        faults.save(&trap, &memory, &BusFaultRegisters);
    }
    // What a host tool sees after reading retained RAM.
    let image = record.to_bytes();
    assert_eq!(&image[..4], b"FltR");
    assert_eq!(codec::decode(&image).unwrap(), record);
}

#[test]
fn exit_hook_runs_after_save() {
    let ram = ram_with_frame(0x2000_0100, &STANDARD_FRAME);
    let memory = SliceMemory::new(RAM_BASE, &ram);
    let latch = SaveLatch::new();
    let mut exits = Vec::new();
    {
        let mut faults =
            FaultController::new(&latch, FaultRecord::zeroed(), config(Capabilities::ARMV7EM))
                .with_exit_hook(|rec: &FaultRecord| exits.push(rec.return_address));
        let trap = TrapState {
            exc_return: 0xFFFF_FFFD,
            psp: 0x2000_0100,
            ..TrapState::default()
        };
        faults.save(&trap, &memory, &BusFaultRegisters);
        faults.exit();
    }
    assert_eq!(exits, [0x0800_5678]);
}
