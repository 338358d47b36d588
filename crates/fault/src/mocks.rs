//! Mock implementations for testing
//!
//! Register sources with fixed values, for unit tests and host tools that
//! replay a capture without hardware.

#![cfg(any(test, feature = "std"))]

use crate::capture::{FaultStatus, SecureFaultStatus, StackLimits, SystemRegisters};

/// Special-purpose registers returning preset values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockRegisters {
    /// Returned by `stack_limits`.
    pub limits: StackLimits,
    /// Returned by `fault_status`.
    pub status: FaultStatus,
    /// Returned by `secure_fault_status`.
    pub secure: SecureFaultStatus,
}

impl MockRegisters {
    /// Every register non-zero, as after a precise data bus error.
    #[must_use]
    pub fn busy() -> Self {
        Self {
            limits: StackLimits {
                msplim: 0x2000_0000,
                psplim: 0x2000_1000,
            },
            status: FaultStatus {
                cfsr: 0x0000_8200,
                hfsr: 0x4000_0000,
                dfsr: 0x0000_0001,
                mmfar: 0xE000_EDF8,
                bfar: 0xDEAD_BEEF,
                afsr: 0x0000_0010,
            },
            secure: SecureFaultStatus {
                sfsr: 0x0000_0048,
                sfar: 0x1000_0004,
            },
        }
    }
}

impl SystemRegisters for MockRegisters {
    fn stack_limits(&self) -> StackLimits {
        self.limits
    }

    fn fault_status(&self) -> FaultStatus {
        self.status
    }

    fn secure_fault_status(&self) -> SecureFaultStatus {
        self.secure
    }
}
