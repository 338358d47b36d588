//! Capture configuration.

use crate::capability::Capabilities;
use crate::memory::RamWindow;

/// What the capture engine may assume about the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FaultConfig {
    /// Register groups present on the target variant.
    pub capabilities: Capabilities,
    /// RAM that may hold a stack frame and is safe to read.
    pub ram: RamWindow,
}

impl FaultConfig {
    /// Bundle a capability preset with the readable RAM window.
    #[must_use]
    pub const fn new(capabilities: Capabilities, ram: RamWindow) -> Self {
        Self { capabilities, ram }
    }
}
