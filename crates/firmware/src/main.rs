//! Fault record demo firmware
//!
//! Boots, reports any fault left by the previous run, then provokes a bus
//! fault so the next boot has something to report. Each reset cycle
//! alternates between "faulted" and "recovered".

#![no_std]
#![no_main]

use fault_firmware::boot::{take_previous_fault, BootCheck};

use defmt_rtt as _;
use panic_probe as _;

/// Unmapped on the reference board: any load here raises a precise BusFault.
const UNMAPPED_ADDRESS: u32 = 0xCFFF_FFF0;

#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::info!("fault demo v{=str}", env!("CARGO_PKG_VERSION"));
    defmt::info!(
        "fault record at {=usize:#x}",
        fault_firmware::retained::FAULT_RECORD.address()
    );

    // SAFETY: interrupts are not enabled yet; the controller is dropped
    // before the first fault can be taken.
    let check = {
        let mut faults = unsafe { fault_firmware::controller() };
        take_previous_fault(&mut faults)
    };

    route_configurable_faults();

    match check {
        BootCheck::Recovered(record) => {
            defmt::info!("recovered fault #{=u32}, idling", record.count);
        }
        BootCheck::Clean | BootCheck::Initialised => {
            defmt::warn!("triggering bus fault at {=u32:#x}", UNMAPPED_ADDRESS);
            // SAFETY: deliberately faulting load; the handler never returns.
            let _ = unsafe { core::ptr::read_volatile(UNMAPPED_ADDRESS as *const u32) };
        }
    }

    loop {
        cortex_m::asm::wfi();
    }
}

/// Give MemManage, BusFault and UsageFault their own vectors instead of
/// escalating to HardFault. Baseline cores only have HardFault.
fn route_configurable_faults() {
    #[cfg(any(
        feature = "armv7m",
        feature = "armv7em",
        feature = "armv8m-main",
        feature = "armv81m-main"
    ))]
    {
        use cortex_m::peripheral::scb::Exception;

        let Some(mut cp) = cortex_m::Peripherals::take() else {
            defmt::panic!("core peripherals already taken");
        };
        cp.SCB.enable(Exception::MemoryManagement);
        cp.SCB.enable(Exception::BusFault);
        cp.SCB.enable(Exception::UsageFault);
    }
}
