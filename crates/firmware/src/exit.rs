//! Post-fault policies.
//!
//! After the record is saved the fault handler has nowhere sensible to
//! return to. Production builds reset so the device comes back up and reports
//! the fault on the next boot; `halt-on-fault` builds stop at a breakpoint so
//! a debugger can inspect the live state.

use fault::{ExitHook, FaultRecord};

/// Reset the core via `SCB.AIRCR.SYSRESETREQ`. The record survives in `.uninit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOnExit;

impl ExitHook for ResetOnExit {
    fn on_exit(&mut self, record: &FaultRecord) {
        log_fault(record);
        #[cfg(all(feature = "hardware", target_arch = "arm"))]
        cortex_m::peripheral::SCB::sys_reset();
    }
}

/// Spin on a breakpoint instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HaltOnExit;

impl ExitHook for HaltOnExit {
    fn on_exit(&mut self, record: &FaultRecord) {
        log_fault(record);
        #[cfg(all(feature = "hardware", target_arch = "arm"))]
        loop {
            cortex_m::asm::bkpt();
        }
    }
}

/// Policy selected by the `halt-on-fault` feature.
#[cfg(feature = "halt-on-fault")]
pub type FaultExit = HaltOnExit;

/// Policy selected by the `halt-on-fault` feature.
#[cfg(not(feature = "halt-on-fault"))]
pub type FaultExit = ResetOnExit;

fn log_fault(_record: &FaultRecord) {
    #[cfg(feature = "defmt")]
    defmt::error!("{}", fault::FaultReport::new(_record));
}
