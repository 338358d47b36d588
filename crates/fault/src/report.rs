//! Human- and telemetry-readable rendering of a saved record.
//!
//! [`FaultReport`] only ever shows fields whose content flag is set, and the
//! fault address registers only when their VALID bit says they hold an
//! address. `Display` gives a multi-line dump for a console or host tool; the
//! `defmt::Format` impl gives a compact single line for RTT.

use core::fmt;

use heapless::Vec;

use crate::frame::ExcReturn;
use crate::record::{ContentFlags, FaultRecord, Field};
use crate::status::{Cfsr, Hfsr, Sfsr};

/// Upper bound on named cause bits across CFSR, HFSR and SFSR.
pub const MAX_CAUSES: usize = 31;

// ---------------------------------------------------------------------------
// Exception kind
// ---------------------------------------------------------------------------

/// Active exception, from the IPSR bits of xPSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum ExceptionKind {
    ThreadMode,
    Reset,
    Nmi,
    HardFault,
    MemManage,
    BusFault,
    UsageFault,
    SecureFault,
    SvCall,
    DebugMonitor,
    PendSv,
    SysTick,
    /// External interrupt `n` (exception number `n + 16`).
    Interrupt(u16),
    /// Architecturally reserved exception number.
    Reserved(u16),
}

impl ExceptionKind {
    /// Decode IPSR (`xpsr & 0x1FF`).
    #[must_use]
    pub fn from_xpsr(xpsr: u32) -> Self {
        let [lo, hi, _, _] = xpsr.to_le_bytes();
        let number = u16::from_le_bytes([lo, hi & 0x01]);
        match number {
            0 => Self::ThreadMode,
            1 => Self::Reset,
            2 => Self::Nmi,
            3 => Self::HardFault,
            4 => Self::MemManage,
            5 => Self::BusFault,
            6 => Self::UsageFault,
            7 => Self::SecureFault,
            11 => Self::SvCall,
            12 => Self::DebugMonitor,
            14 => Self::PendSv,
            15 => Self::SysTick,
            n @ 16.. => Self::Interrupt(n.saturating_sub(16)),
            n => Self::Reserved(n),
        }
    }

    /// Name as used in the vector table.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ThreadMode => "Thread",
            Self::Reset => "Reset",
            Self::Nmi => "NMI",
            Self::HardFault => "HardFault",
            Self::MemManage => "MemManage",
            Self::BusFault => "BusFault",
            Self::UsageFault => "UsageFault",
            Self::SecureFault => "SecureFault",
            Self::SvCall => "SVCall",
            Self::DebugMonitor => "DebugMonitor",
            Self::PendSv => "PendSV",
            Self::SysTick => "SysTick",
            Self::Interrupt(_) => "IRQ",
            Self::Reserved(_) => "Reserved",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt(n) | Self::Reserved(n) => write!(f, "{}({n})", self.name()),
            other => f.write_str(other.name()),
        }
    }
}

// ---------------------------------------------------------------------------
// FaultReport
// ---------------------------------------------------------------------------

/// A borrowed view of a record for rendering.
///
/// Does not check validity; callers get one from
/// [`FaultController::report`](crate::FaultController::report) or after
/// [`decode`](crate::codec::decode).
#[derive(Debug, Clone, Copy)]
pub struct FaultReport<'a> {
    record: &'a FaultRecord,
}

impl<'a> FaultReport<'a> {
    /// Wrap a record.
    #[must_use]
    pub const fn new(record: &'a FaultRecord) -> Self {
        Self { record }
    }

    /// The underlying record.
    #[must_use]
    pub const fn record(&self) -> &'a FaultRecord {
        self.record
    }

    /// Exception that was active when the handler read xPSR.
    #[must_use]
    pub fn exception(&self) -> ExceptionKind {
        ExceptionKind::from_xpsr(self.record.xpsr_in_handler)
    }

    /// Decoded EXC_RETURN.
    #[must_use]
    pub const fn exc_return(&self) -> ExcReturn {
        ExcReturn::new(self.record.exc_return)
    }

    /// A field's value if it is meaningful in this record.
    ///
    /// Beyond the content flag, the integrity signature needs a readable
    /// frame that actually holds the additional state context (DCRS clear),
    /// and MMFAR/BFAR/SFAR need their VALID bits.
    #[must_use]
    pub fn value(&self, field: Field) -> Option<u32> {
        let value = self.record.captured(field)?;
        let cfsr = Cfsr::from_bits_retain(self.record.cfsr);
        let shown = match field {
            Field::Count => false,
            Field::IntegritySignature => {
                self.record.has(ContentFlags::STATE_CONTEXT)
                    && self.exc_return().state_context_stacked()
            }
            Field::Mmfar => cfsr.contains(Cfsr::MMARVALID),
            Field::Bfar => cfsr.contains(Cfsr::BFARVALID),
            Field::Sfar => Sfsr::from_bits_retain(self.record.sfsr).contains(Sfsr::SFARVALID),
            _ => true,
        };
        shown.then_some(value)
    }

    /// Every meaningful register field, in layout order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, u32)> + 'a {
        let report = *self;
        Field::ALL
            .into_iter()
            .filter_map(move |field| report.value(field).map(|v| (field, v)))
    }

    /// Names of the set cause bits in CFSR, HFSR and SFSR, where captured.
    ///
    /// Reserved bits have no name and are skipped.
    #[must_use]
    pub fn causes(&self) -> Vec<&'static str, MAX_CAUSES> {
        let cfsr = self.record.captured(Field::Cfsr).map(Cfsr::from_bits_retain);
        let hfsr = self.record.captured(Field::Hfsr).map(Hfsr::from_bits_retain);
        let sfsr = self.record.captured(Field::Sfsr).map(Sfsr::from_bits_retain);

        let names = cfsr
            .into_iter()
            .flat_map(|bits| bits.iter_names().map(|(name, _)| name))
            .chain(hfsr.into_iter().flat_map(|bits| bits.iter_names().map(|(name, _)| name)))
            .chain(sfsr.into_iter().flat_map(|bits| bits.iter_names().map(|(name, _)| name)));

        let mut out = Vec::new();
        for name in names {
            // Capacity covers every named bit.
            let _ = out.push(name);
        }
        out
    }

    fn stack_name(&self) -> &'static str {
        if self.exc_return().uses_psp() {
            "PSP"
        } else {
            "MSP"
        }
    }
}

impl fmt::Display for FaultReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rec = self.record;
        let exc = self.exc_return();
        writeln!(
            f,
            "fault #{} in {} (record v{}.{})",
            rec.count,
            self.exception(),
            rec.version.major,
            rec.version.minor
        )?;
        write!(
            f,
            "  frame: {}, {} mode",
            self.stack_name(),
            if exc.thread_mode() { "thread" } else { "handler" }
        )?;
        if exc.extended_frame() {
            f.write_str(", fp context")?;
        }
        if rec.has(ContentFlags::ARMV8M) && exc.secure_stack() {
            f.write_str(", secure stack")?;
        }
        if !rec.has(ContentFlags::STATE_CONTEXT) {
            f.write_str(", stack unreadable")?;
        }
        writeln!(f)?;

        let causes = self.causes();
        if !causes.is_empty() {
            f.write_str("  causes:")?;
            for cause in &causes {
                write!(f, " {cause}")?;
            }
            writeln!(f)?;
        }

        for (field, value) in self.fields() {
            writeln!(f, "  {:<20} 0x{value:08X}", field.name())?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FaultReport<'_> {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(
            f,
            "fault #{=u32} in {} via {=str}",
            self.record.count,
            self.exception(),
            self.stack_name()
        );
        for cause in &self.causes() {
            defmt::write!(f, " {=str}", *cause);
        }
        for (field, value) in self.fields() {
            defmt::write!(f, " {=str}={=u32:#x}", field.name(), value);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;

    fn bus_fault() -> FaultRecord {
        let mut r = FaultRecord::zeroed();
        r.count = 2;
        r.version = crate::record::SchemaVersion::CURRENT;
        r.content = ContentFlags::STATE_CONTEXT | ContentFlags::FAULT_REGS;
        r.r0 = 1;
        r.return_address = 0x0800_5678;
        r.xpsr_in_handler = 3;
        r.exc_return = 0xFFFF_FFFD;
        r.psp = 0x2000_0100;
        r.cfsr = 0x0000_8200;
        r.hfsr = 0x4000_0000;
        r.bfar = 0xDEAD_BEEF;
        r.mmfar = 0x1234_5678;
        r
    }

    #[test]
    fn exception_numbers_decode() {
        assert_eq!(ExceptionKind::from_xpsr(0x6100_0003), ExceptionKind::HardFault);
        assert_eq!(ExceptionKind::from_xpsr(5), ExceptionKind::BusFault);
        assert_eq!(ExceptionKind::from_xpsr(7), ExceptionKind::SecureFault);
        assert_eq!(ExceptionKind::from_xpsr(0), ExceptionKind::ThreadMode);
        assert_eq!(ExceptionKind::from_xpsr(16 + 40), ExceptionKind::Interrupt(40));
        assert_eq!(ExceptionKind::from_xpsr(0x1FF), ExceptionKind::Interrupt(0x1EF));
        assert_eq!(ExceptionKind::from_xpsr(9), ExceptionKind::Reserved(9));
    }

    #[test]
    fn causes_lists_set_bits_in_table_order() {
        let r = bus_fault();
        let report = FaultReport::new(&r);
        assert_eq!(report.causes().as_slice(), ["PRECISERR", "BFARVALID", "FORCED"]);
    }

    #[test]
    fn causes_ignore_uncaptured_registers() {
        let mut r = bus_fault();
        r.content.remove(ContentFlags::FAULT_REGS);
        r.sfsr = 0xFF;
        assert!(FaultReport::new(&r).causes().is_empty());
    }

    #[test]
    fn causes_skip_reserved_bits() {
        let mut r = bus_fault();
        r.cfsr = (1 << 2) | (1 << 14) | Cfsr::DIVBYZERO.bits();
        r.hfsr = 1 << 0;
        assert_eq!(FaultReport::new(&r).causes().as_slice(), ["DIVBYZERO"]);
    }

    #[test]
    fn every_status_bit_fits_in_causes() {
        let named = Cfsr::all().iter().count()
            + Hfsr::all().iter().count()
            + Sfsr::all().iter().count();
        assert!(named <= MAX_CAUSES);

        let mut r = bus_fault();
        r.content |= ContentFlags::SECURE_FAULT_REGS;
        r.cfsr = u32::MAX;
        r.hfsr = u32::MAX;
        r.sfsr = u32::MAX;
        assert_eq!(FaultReport::new(&r).causes().len(), named);
    }

    #[test]
    fn integrity_signature_needs_stacked_state_context() {
        let mut r = bus_fault();
        r.content |= ContentFlags::ARMV8M;
        r.integrity_signature = 0xFEFA_125B;

        // DCRS clear: the additional state context was pushed.
        r.exc_return = 0xFFFF_FF9C;
        assert_eq!(
            FaultReport::new(&r).value(Field::IntegritySignature),
            Some(0xFEFA_125B)
        );

        // DCRS set: nothing was stacked, so the field is not shown.
        r.exc_return = 0xFFFF_FFFD;
        let report = FaultReport::new(&r);
        assert_eq!(report.value(Field::IntegritySignature), None);
        assert!(!report.to_string().contains("IntegritySignature"));
    }

    #[test]
    fn fault_addresses_need_valid_bits() {
        let r = bus_fault();
        let report = FaultReport::new(&r);
        assert_eq!(report.value(Field::Bfar), Some(0xDEAD_BEEF));
        assert_eq!(report.value(Field::Mmfar), None);
        assert_eq!(report.value(Field::Sfar), None);
    }

    #[test]
    fn uncaptured_groups_are_not_rendered() {
        let r = bus_fault();
        let fields: std::vec::Vec<Field> = FaultReport::new(&r).fields().map(|(f, _)| f).collect();
        assert!(fields.contains(&Field::R0));
        assert!(fields.contains(&Field::Cfsr));
        assert!(!fields.contains(&Field::Msplim));
        assert!(!fields.contains(&Field::Sfsr));
        assert!(!fields.contains(&Field::IntegritySignature));
        assert!(!fields.contains(&Field::Count));
    }

    #[test]
    fn display_renders_header_causes_and_fields() {
        let r = bus_fault();
        let text = FaultReport::new(&r).to_string();
        assert!(text.starts_with("fault #2 in HardFault (record v1.0)\n"));
        assert!(text.contains("frame: PSP, thread mode\n"));
        assert!(text.contains("causes: PRECISERR BFARVALID FORCED\n"));
        assert!(text.contains("ReturnAddress        0x08005678"));
        assert!(text.contains("SCB_BFAR             0xDEADBEEF"));
        assert!(!text.contains("SCB_MMFAR"));
        assert!(!text.contains("MSPLIM"));
    }

    #[test]
    fn display_notes_unreadable_stack() {
        let mut r = bus_fault();
        r.content.remove(ContentFlags::STATE_CONTEXT);
        let text = FaultReport::new(&r).to_string();
        assert!(text.contains("stack unreadable"));
        assert!(!text.contains("ReturnAddress"));
    }
}
