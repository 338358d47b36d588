//! Target description: architecture variant and stack RAM.
//!
//! The capture engine takes both as data. This module turns Cargo features
//! and the board memory map into that data, so every value here is a
//! compile-time constant and host-testable.
//!
//! # Variant features
//!
//! Exactly one of `armv6m`, `armv7m`, `armv7em` (default), `armv8m-base`,
//! `armv8m-main`, `armv81m-main` should be enabled; if several are, the most
//! capable wins. `tz-secure` marks a build that runs in the TrustZone secure
//! state. Build with `--no-default-features` to pick something other than
//! Armv7E-M.

use fault::{Capabilities, FaultConfig, RamWindow};

/// STM32H743 DTCM base. cortex-m-rt places `.stack`, `.data` and `.bss` here.
pub const DTCM_BASE: u32 = 0x2000_0000;

/// STM32H743 DTCM size (128 KB).
pub const DTCM_LEN: u32 = 128 * 1024;

/// RAM a stacked exception frame may legitimately sit in.
#[allow(clippy::panic)] // const-evaluated: a bad window fails the build, never runs
pub const STACK_RAM: RamWindow = match RamWindow::new(DTCM_BASE, DTCM_LEN) {
    Ok(window) => window,
    Err(_) => panic!("DTCM window must be word aligned and non-empty"),
};

const fn variant() -> Capabilities {
    if cfg!(feature = "armv81m-main") {
        Capabilities::ARMV81M_MAIN
    } else if cfg!(feature = "armv8m-main") {
        Capabilities::ARMV8M_MAIN
    } else if cfg!(feature = "armv8m-base") {
        Capabilities::ARMV8M_BASE
    } else if cfg!(feature = "armv7em") {
        Capabilities::ARMV7EM
    } else if cfg!(feature = "armv7m") {
        Capabilities::ARMV7M
    } else if cfg!(feature = "armv6m") {
        Capabilities::ARMV6M
    } else {
        Capabilities::ARMV7EM
    }
}

/// Register groups present on the build target.
pub const CAPABILITIES: Capabilities = if cfg!(feature = "tz-secure") {
    variant().secure()
} else {
    variant()
};

/// Configuration handed to the fault controller.
pub const CONFIG: FaultConfig = FaultConfig::new(CAPABILITIES, STACK_RAM);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_ram_covers_dtcm() {
        assert_eq!(STACK_RAM.base(), 0x2000_0000);
        assert_eq!(STACK_RAM.end(), 0x2002_0000);
    }

    #[test]
    fn default_build_is_armv7em() {
        if cfg!(feature = "armv7em")
            && !cfg!(any(
                feature = "armv8m-base",
                feature = "armv8m-main",
                feature = "armv81m-main"
            ))
        {
            assert!(CAPABILITIES.fault_regs);
            assert!(!CAPABILITIES.armv8m);
        }
    }

    #[test]
    fn secure_flag_follows_feature() {
        assert_eq!(CAPABILITIES.tz_secure, cfg!(feature = "tz-secure"));
    }

    #[test]
    fn config_uses_board_constants() {
        assert_eq!(CONFIG.ram, STACK_RAM);
        assert_eq!(CONFIG.capabilities, CAPABILITIES);
    }
}
