//! Architecture capability descriptor.
//!
//! Which optional register groups exist is a property of the build target,
//! not something discovered at runtime. The firmware crate picks one of the
//! presets below from its Cargo features and hands it to the capture engine,
//! so every variant is also exercisable from a single host test build.
//!
//! | Preset              | Fault regs | Armv8-M | Mainline | Limit regs      | Secure fault regs |
//! |---------------------|------------|---------|----------|-----------------|-------------------|
//! | `ARMV6M`            | no         | no      | no       | no              | no                |
//! | `ARMV7M`/`ARMV7EM`  | yes        | no      | yes      | no              | no                |
//! | `ARMV8M_BASE`       | no         | yes     | no       | secure only     | no                |
//! | `ARMV8M_MAIN`       | yes        | yes     | yes      | yes             | secure only       |
//! | `ARMV81M_MAIN`      | yes        | yes     | yes      | yes             | secure only       |

/// Register groups available on the target variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Capabilities {
    /// SCB CFSR/HFSR/DFSR/MMFAR/BFAR/AFSR exist (Armv7-M, Armv8-M Mainline).
    pub fault_regs: bool,
    /// Armv8-M or Armv8.1-M: EXC_RETURN carries ES/DCRS/S bits.
    pub armv8m: bool,
    /// Mainline profile (as opposed to Baseline / Armv6-M).
    pub mainline: bool,
    /// Built for, and running in, the TrustZone secure state.
    pub tz_secure: bool,
}

impl Capabilities {
    /// Cortex-M0/M0+/M1.
    pub const ARMV6M: Self = Self {
        fault_regs: false,
        armv8m: false,
        mainline: false,
        tz_secure: false,
    };

    /// Cortex-M3.
    pub const ARMV7M: Self = Self {
        fault_regs: true,
        armv8m: false,
        mainline: true,
        tz_secure: false,
    };

    /// Cortex-M4/M7.
    pub const ARMV7EM: Self = Self::ARMV7M;

    /// Cortex-M23.
    pub const ARMV8M_BASE: Self = Self {
        fault_regs: false,
        armv8m: true,
        mainline: false,
        tz_secure: false,
    };

    /// Cortex-M33/M35P.
    pub const ARMV8M_MAIN: Self = Self {
        fault_regs: true,
        armv8m: true,
        mainline: true,
        tz_secure: false,
    };

    /// Cortex-M55/M85.
    pub const ARMV81M_MAIN: Self = Self::ARMV8M_MAIN;

    /// Same variant, built for the secure state.
    #[must_use]
    pub const fn secure(self) -> Self {
        Self {
            tz_secure: true,
            ..self
        }
    }

    /// MSPLIM/PSPLIM are readable: Armv8-M Mainline, or Baseline in the secure state.
    #[must_use]
    pub const fn has_stack_limit_regs(&self) -> bool {
        self.armv8m && (self.mainline || self.tz_secure)
    }

    /// SCB SFSR/SFAR are readable: Armv8-M Mainline in the secure state.
    #[must_use]
    pub const fn has_secure_fault_regs(&self) -> bool {
        self.armv8m && self.mainline && self.tz_secure && self.fault_regs
    }
}
