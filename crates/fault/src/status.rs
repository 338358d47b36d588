//! SCB fault status register bits, named as in the Arm ARM.
//!
//! Reserved bits are not named: `iter_names` skips them, and
//! `from_bits_retain` keeps them so the raw value is never altered.

#![allow(missing_docs)] // bit names are the architectural register field names

bitflags::bitflags! {
    /// Bits in the Configurable Fault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Cfsr: u32 {
        // Bits 0-7: MMFSR
        const IACCVIOL = 1 << 0;
        const DACCVIOL = 1 << 1;
        // MMFSR bit 2 reserved
        const MUNSTKERR = 1 << 3;
        const MSTKERR = 1 << 4;
        const MLSPERR = 1 << 5;
        // MMFSR bit 6 reserved
        const MMARVALID = 1 << 7;

        // Bits 8-15: BFSR
        const IBUSERR = 1 << 8;
        const PRECISERR = 1 << 9;
        const IMPRECISERR = 1 << 10;
        const UNSTKERR = 1 << 11;
        const STKERR = 1 << 12;
        const LSPERR = 1 << 13;
        // BFSR bit 14 reserved
        const BFARVALID = 1 << 15;

        // Bits 16-31: UFSR
        const UNDEFINSTR = 1 << 16;
        const INVSTATE = 1 << 17;
        const INVPC = 1 << 18;
        const NOCP = 1 << 19;
        // Armv8-M only; reserved (zero) on v7-M
        const STKOF = 1 << 20;
        const UNALIGNED = 1 << 24;
        const DIVBYZERO = 1 << 25;
    }
}

bitflags::bitflags! {
    /// Bits in the HardFault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Hfsr: u32 {
        const VECTTBL = 1 << 1;
        const FORCED = 1 << 30;
        const DEBUGEVT = 1 << 31;
    }
}

bitflags::bitflags! {
    /// Bits in the SecureFault Status Register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Sfsr: u32 {
        const INVEP = 1 << 0;
        const INVIS = 1 << 1;
        const INVER = 1 << 2;
        const AUVIOL = 1 << 3;
        const INVTRAN = 1 << 4;
        const LSPERR = 1 << 5;
        const SFARVALID = 1 << 6;
        const LSERR = 1 << 7;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Cfsr {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "CFSR({=u32:#x})", self.bits());
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Hfsr {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "HFSR({=u32:#x})", self.bits());
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Sfsr {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "SFSR({=u32:#x})", self.bits());
    }
}
