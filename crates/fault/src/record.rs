//! Persistent fault record: data model and pinned wire layout.
//!
//! The record is the wire format: an external tool reading retained RAM after
//! a reset sees exactly these 140 bytes. Field order, widths and the content
//! flag bit assignment are stable within a schema major version.
//!
//! # Layout (schema 1.0, little-endian, 140 bytes)
//!
//! ```text
//! [0..4]     magic_number        b"FltR" read as a little-endian u32
//! [4..8]     checksum            CRC-32 over [8..140]
//! [8..12]    count               faults saved since the last clear
//! [12]       version.minor       u8
//! [13]       version.major       u8
//! [14..16]   content flags       u16, see ContentFlags
//! [16..68]   r0 .. r12           13 × u32
//! [68..80]   lr, return_address, xpsr
//! [80..84]   integrity_signature
//! [84..100]  xpsr_in_handler, exc_return, msp, psp
//! [100..108] msplim, psplim
//! [108..132] cfsr, hfsr, dfsr, mmfar, bfar, afsr
//! [132..140] sfsr, sfar
//! ```
//!
//! Every field is a plain integer, so any byte pattern (including the
//! arbitrary contents of RAM on first power-up) is a well-formed
//! `FaultRecord`. Whether it is *meaningful* is decided by [`crate::codec`].

/// Magic sentinel: ASCII `"FltR"` stored in native (little-endian) order.
pub const MAGIC_NUMBER: u32 = u32::from_le_bytes(*b"FltR");

/// Byte offset of the first checksummed byte (everything after magic + checksum).
pub const CHECKSUM_START: usize = 8;

// ---------------------------------------------------------------------------
// SchemaVersion
// ---------------------------------------------------------------------------

/// Record layout version.
///
/// `major` changes are layout-incompatible; `minor` changes only append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
pub struct SchemaVersion {
    /// Additive revision (byte 12).
    pub minor: u8,
    /// Layout-incompatible revision (byte 13).
    pub major: u8,
}

impl SchemaVersion {
    /// The layout written by this build.
    pub const CURRENT: Self = Self { major: 1, minor: 0 };
}

// ---------------------------------------------------------------------------
// Content flags
// ---------------------------------------------------------------------------

bitflags::bitflags! {
    /// Optional field groups recorded at capture time, persisted as a `u16`.
    ///
    /// Bits 6-15 are reserved. Decoding keeps them (`from_bits_retain`) so the
    /// checksum of a record written by a newer build still matches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct ContentFlags: u16 {
        /// Core registers R0-R12, LR, return address, xPSR were captured.
        const STATE_CONTEXT = 1 << 0;
        /// MSPLIM and PSPLIM were captured.
        const LIMIT_REGS = 1 << 1;
        /// SCB fault status/address registers were captured.
        const FAULT_REGS = 1 << 2;
        /// SCB secure fault status/address registers were captured.
        const SECURE_FAULT_REGS = 1 << 3;
        /// Armv8/8.1-M information (integrity signature, EXC_RETURN extensions) present.
        const ARMV8M = 1 << 4;
        /// The record was written while running in the secure state.
        const TZ_SECURE = 1 << 5;
    }
}

impl ContentFlags {
    /// Bits outside the defined flags.
    #[must_use]
    pub const fn reserved_bits(self) -> u16 {
        self.bits() & !Self::all().bits()
    }
}

impl Default for ContentFlags {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ContentFlags {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "ContentFlags({=u16:#x})", self.bits());
    }
}

// ---------------------------------------------------------------------------
// Field groups and field identifiers
// ---------------------------------------------------------------------------

/// Group of fields sharing one validity condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FieldGroup {
    /// Bookkeeping (`count`); always meaningful on a valid record.
    Header,
    /// R0–R12, LR, return address, xPSR.
    Core,
    /// Integrity signature (Armv8-M additional state context).
    IntegritySignature,
    /// xPSR in handler, EXC_RETURN, MSP, PSP; always attempted.
    HandlerContext,
    /// MSPLIM, PSPLIM.
    StackLimit,
    /// CFSR, HFSR, DFSR, MMFAR, BFAR, AFSR.
    FaultStatus,
    /// SFSR, SFAR.
    SecureFaultStatus,
}

impl FieldGroup {
    /// Content flag gating this group, or `None` if the group is always meaningful.
    #[must_use]
    pub const fn flag(self) -> Option<ContentFlags> {
        match self {
            Self::Header | Self::HandlerContext => None,
            Self::Core => Some(ContentFlags::STATE_CONTEXT),
            Self::IntegritySignature => Some(ContentFlags::ARMV8M),
            Self::StackLimit => Some(ContentFlags::LIMIT_REGS),
            Self::FaultStatus => Some(ContentFlags::FAULT_REGS),
            Self::SecureFaultStatus => Some(ContentFlags::SECURE_FAULT_REGS),
        }
    }
}

/// Identifier for one 32-bit field of the record (raw get/set access).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)] // register names are self-describing
pub enum Field {
    Count,
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    Lr,
    ReturnAddress,
    Xpsr,
    IntegritySignature,
    XpsrInHandler,
    ExcReturn,
    Msp,
    Psp,
    Msplim,
    Psplim,
    Cfsr,
    Hfsr,
    Dfsr,
    Mmfar,
    Bfar,
    Afsr,
    Sfsr,
    Sfar,
}

impl Field {
    /// All register fields in layout order.
    pub const ALL: [Self; 32] = [
        Self::Count,
        Self::R0,
        Self::R1,
        Self::R2,
        Self::R3,
        Self::R4,
        Self::R5,
        Self::R6,
        Self::R7,
        Self::R8,
        Self::R9,
        Self::R10,
        Self::R11,
        Self::R12,
        Self::Lr,
        Self::ReturnAddress,
        Self::Xpsr,
        Self::IntegritySignature,
        Self::XpsrInHandler,
        Self::ExcReturn,
        Self::Msp,
        Self::Psp,
        Self::Msplim,
        Self::Psplim,
        Self::Cfsr,
        Self::Hfsr,
        Self::Dfsr,
        Self::Mmfar,
        Self::Bfar,
        Self::Afsr,
        Self::Sfsr,
        Self::Sfar,
    ];

    /// Display name, matching Arm register naming.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::R0 => "R0",
            Self::R1 => "R1",
            Self::R2 => "R2",
            Self::R3 => "R3",
            Self::R4 => "R4",
            Self::R5 => "R5",
            Self::R6 => "R6",
            Self::R7 => "R7",
            Self::R8 => "R8",
            Self::R9 => "R9",
            Self::R10 => "R10",
            Self::R11 => "R11",
            Self::R12 => "R12",
            Self::Lr => "LR",
            Self::ReturnAddress => "ReturnAddress",
            Self::Xpsr => "xPSR",
            Self::IntegritySignature => "IntegritySignature",
            Self::XpsrInHandler => "xPSR_in_handler",
            Self::ExcReturn => "EXC_RETURN",
            Self::Msp => "MSP",
            Self::Psp => "PSP",
            Self::Msplim => "MSPLIM",
            Self::Psplim => "PSPLIM",
            Self::Cfsr => "SCB_CFSR",
            Self::Hfsr => "SCB_HFSR",
            Self::Dfsr => "SCB_DFSR",
            Self::Mmfar => "SCB_MMFAR",
            Self::Bfar => "SCB_BFAR",
            Self::Afsr => "SCB_AFSR",
            Self::Sfsr => "SCB_SFSR",
            Self::Sfar => "SCB_SFAR",
        }
    }

    /// Group this field belongs to.
    #[must_use]
    pub const fn group(self) -> FieldGroup {
        match self {
            Self::Count => FieldGroup::Header,
            Self::R0
            | Self::R1
            | Self::R2
            | Self::R3
            | Self::R4
            | Self::R5
            | Self::R6
            | Self::R7
            | Self::R8
            | Self::R9
            | Self::R10
            | Self::R11
            | Self::R12
            | Self::Lr
            | Self::ReturnAddress
            | Self::Xpsr => FieldGroup::Core,
            Self::IntegritySignature => FieldGroup::IntegritySignature,
            Self::XpsrInHandler | Self::ExcReturn | Self::Msp | Self::Psp => {
                FieldGroup::HandlerContext
            }
            Self::Msplim | Self::Psplim => FieldGroup::StackLimit,
            Self::Cfsr | Self::Hfsr | Self::Dfsr | Self::Mmfar | Self::Bfar | Self::Afsr => {
                FieldGroup::FaultStatus
            }
            Self::Sfsr | Self::Sfar => FieldGroup::SecureFaultStatus,
        }
    }
}

// ---------------------------------------------------------------------------
// FaultRecord
// ---------------------------------------------------------------------------

/// The persistent fault record.
///
/// `#[repr(C)]` with no padding: the in-memory representation on a
/// little-endian target is byte-for-byte the layout documented at module
/// level, so a debugger or host tool can read it straight out of RAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(C)]
#[allow(missing_docs)] // register fields documented in the module layout table
pub struct FaultRecord {
    /// [`MAGIC_NUMBER`] when the record is meaningful.
    pub magic_number: u32,
    /// CRC-32 over bytes `[8..140]`.
    pub checksum: u32,
    /// Faults saved since the last clear.
    pub count: u32,
    pub version: SchemaVersion,
    pub content: ContentFlags,

    pub r0: u32,
    pub r1: u32,
    pub r2: u32,
    pub r3: u32,
    pub r4: u32,
    pub r5: u32,
    pub r6: u32,
    pub r7: u32,
    pub r8: u32,
    pub r9: u32,
    pub r10: u32,
    pub r11: u32,
    pub r12: u32,
    pub lr: u32,
    /// Stacked PC: the instruction that faulted (or the one after it).
    pub return_address: u32,
    pub xpsr: u32,

    pub integrity_signature: u32,

    pub xpsr_in_handler: u32,
    pub exc_return: u32,
    pub msp: u32,
    pub psp: u32,
    pub msplim: u32,
    pub psplim: u32,

    pub cfsr: u32,
    pub hfsr: u32,
    pub dfsr: u32,
    pub mmfar: u32,
    pub bfar: u32,
    pub afsr: u32,

    pub sfsr: u32,
    pub sfar: u32,
}

const _: () = assert!(core::mem::size_of::<FaultRecord>() == FaultRecord::SIZE);

impl FaultRecord {
    /// Serialised size in bytes.
    pub const SIZE: usize = 140;

    /// Serialised size in 32-bit words.
    pub const WORDS: usize = Self::SIZE / 4;

    /// All-zero record: the "empty" state written by clear.
    #[must_use]
    pub const fn zeroed() -> Self {
        Self {
            magic_number: 0,
            checksum: 0,
            count: 0,
            version: SchemaVersion { major: 0, minor: 0 },
            content: ContentFlags::empty(),
            r0: 0,
            r1: 0,
            r2: 0,
            r3: 0,
            r4: 0,
            r5: 0,
            r6: 0,
            r7: 0,
            r8: 0,
            r9: 0,
            r10: 0,
            r11: 0,
            r12: 0,
            lr: 0,
            return_address: 0,
            xpsr: 0,
            integrity_signature: 0,
            xpsr_in_handler: 0,
            exc_return: 0,
            msp: 0,
            psp: 0,
            msplim: 0,
            psplim: 0,
            cfsr: 0,
            hfsr: 0,
            dfsr: 0,
            mmfar: 0,
            bfar: 0,
            afsr: 0,
            sfsr: 0,
            sfar: 0,
        }
    }

    /// `true` if every flag in `flags` is set in the content flags.
    #[must_use]
    pub const fn has(&self, flags: ContentFlags) -> bool {
        self.content.contains(flags)
    }

    /// Raw field read. Performs no validation and ignores content flags.
    #[must_use]
    pub const fn get(&self, field: Field) -> u32 {
        match field {
            Field::Count => self.count,
            Field::R0 => self.r0,
            Field::R1 => self.r1,
            Field::R2 => self.r2,
            Field::R3 => self.r3,
            Field::R4 => self.r4,
            Field::R5 => self.r5,
            Field::R6 => self.r6,
            Field::R7 => self.r7,
            Field::R8 => self.r8,
            Field::R9 => self.r9,
            Field::R10 => self.r10,
            Field::R11 => self.r11,
            Field::R12 => self.r12,
            Field::Lr => self.lr,
            Field::ReturnAddress => self.return_address,
            Field::Xpsr => self.xpsr,
            Field::IntegritySignature => self.integrity_signature,
            Field::XpsrInHandler => self.xpsr_in_handler,
            Field::ExcReturn => self.exc_return,
            Field::Msp => self.msp,
            Field::Psp => self.psp,
            Field::Msplim => self.msplim,
            Field::Psplim => self.psplim,
            Field::Cfsr => self.cfsr,
            Field::Hfsr => self.hfsr,
            Field::Dfsr => self.dfsr,
            Field::Mmfar => self.mmfar,
            Field::Bfar => self.bfar,
            Field::Afsr => self.afsr,
            Field::Sfsr => self.sfsr,
            Field::Sfar => self.sfar,
        }
    }

    /// Raw field write. Does not touch flags, magic or checksum.
    pub fn set(&mut self, field: Field, value: u32) {
        let slot = match field {
            Field::Count => &mut self.count,
            Field::R0 => &mut self.r0,
            Field::R1 => &mut self.r1,
            Field::R2 => &mut self.r2,
            Field::R3 => &mut self.r3,
            Field::R4 => &mut self.r4,
            Field::R5 => &mut self.r5,
            Field::R6 => &mut self.r6,
            Field::R7 => &mut self.r7,
            Field::R8 => &mut self.r8,
            Field::R9 => &mut self.r9,
            Field::R10 => &mut self.r10,
            Field::R11 => &mut self.r11,
            Field::R12 => &mut self.r12,
            Field::Lr => &mut self.lr,
            Field::ReturnAddress => &mut self.return_address,
            Field::Xpsr => &mut self.xpsr,
            Field::IntegritySignature => &mut self.integrity_signature,
            Field::XpsrInHandler => &mut self.xpsr_in_handler,
            Field::ExcReturn => &mut self.exc_return,
            Field::Msp => &mut self.msp,
            Field::Psp => &mut self.psp,
            Field::Msplim => &mut self.msplim,
            Field::Psplim => &mut self.psplim,
            Field::Cfsr => &mut self.cfsr,
            Field::Hfsr => &mut self.hfsr,
            Field::Dfsr => &mut self.dfsr,
            Field::Mmfar => &mut self.mmfar,
            Field::Bfar => &mut self.bfar,
            Field::Afsr => &mut self.afsr,
            Field::Sfsr => &mut self.sfsr,
            Field::Sfar => &mut self.sfar,
        };
        *slot = value;
    }

    /// Flag-gated read: `None` when the field's group was not captured.
    #[must_use]
    pub fn captured(&self, field: Field) -> Option<u32> {
        match field.group().flag() {
            Some(flag) if !self.has(flag) => None,
            _ => Some(self.get(field)),
        }
    }

    /// The version/flags word at offset 12.
    fn info_word(&self) -> u32 {
        let [flags_lo, flags_hi] = self.content.bits().to_le_bytes();
        u32::from_le_bytes([self.version.minor, self.version.major, flags_lo, flags_hi])
    }

    /// The record as 35 words in layout order.
    #[must_use]
    pub fn to_words(&self) -> [u32; Self::WORDS] {
        [
            self.magic_number,
            self.checksum,
            self.count,
            self.info_word(),
            self.r0,
            self.r1,
            self.r2,
            self.r3,
            self.r4,
            self.r5,
            self.r6,
            self.r7,
            self.r8,
            self.r9,
            self.r10,
            self.r11,
            self.r12,
            self.lr,
            self.return_address,
            self.xpsr,
            self.integrity_signature,
            self.xpsr_in_handler,
            self.exc_return,
            self.msp,
            self.psp,
            self.msplim,
            self.psplim,
            self.cfsr,
            self.hfsr,
            self.dfsr,
            self.mmfar,
            self.bfar,
            self.afsr,
            self.sfsr,
            self.sfar,
        ]
    }

    /// Rebuild a record from 35 words in layout order.
    #[must_use]
    pub fn from_words(words: &[u32; Self::WORDS]) -> Self {
        let [magic_number, checksum, count, info, r0, r1, r2, r3, r4, r5, r6, r7, r8, r9, r10, r11, r12, lr, return_address, xpsr, integrity_signature, xpsr_in_handler, exc_return, msp, psp, msplim, psplim, cfsr, hfsr, dfsr, mmfar, bfar, afsr, sfsr, sfar] =
            *words;
        let [minor, major, flags_lo, flags_hi] = info.to_le_bytes();
        Self {
            magic_number,
            checksum,
            count,
            version: SchemaVersion { major, minor },
            content: ContentFlags::from_bits_retain(u16::from_le_bytes([flags_lo, flags_hi])),
            r0,
            r1,
            r2,
            r3,
            r4,
            r5,
            r6,
            r7,
            r8,
            r9,
            r10,
            r11,
            r12,
            lr,
            return_address,
            xpsr,
            integrity_signature,
            xpsr_in_handler,
            exc_return,
            msp,
            psp,
            msplim,
            psplim,
            cfsr,
            hfsr,
            dfsr,
            mmfar,
            bfar,
            afsr,
            sfsr,
            sfar,
        }
    }

    /// Encode into the 140-byte little-endian wire layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        for (chunk, word) in buf.chunks_exact_mut(4).zip(self.to_words()) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        buf
    }

    /// Decode from the 140-byte wire layout. Total: never fails.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let mut words = [0u32; Self::WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            let mut le = [0u8; 4];
            le.copy_from_slice(chunk);
            *word = u32::from_le_bytes(le);
        }
        Self::from_words(&words)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::*;

    #[test]
    fn record_is_140_bytes_without_padding() {
        assert_eq!(core::mem::size_of::<FaultRecord>(), 140);
        assert_eq!(FaultRecord::WORDS, 35);
    }

    #[test]
    fn magic_bytes_spell_fltr() {
        assert_eq!(MAGIC_NUMBER.to_le_bytes(), *b"FltR");
        assert_eq!(MAGIC_NUMBER, 0x5274_6C46);
    }

    #[test]
    fn wire_offsets_match_layout_table() {
        let mut r = FaultRecord::zeroed();
        r.magic_number = MAGIC_NUMBER;
        r.count = 7;
        r.version = SchemaVersion { major: 1, minor: 2 };
        r.content = ContentFlags::STATE_CONTEXT | ContentFlags::TZ_SECURE;
        r.r0 = 0x1111_1111;
        r.return_address = 0x0800_5678;
        r.integrity_signature = 0xFEFA_125B;
        r.psp = 0x2000_0100;
        r.cfsr = 0x0000_0082;
        r.sfar = 0xDEAD_BEEF;

        let b = r.to_bytes();
        assert_eq!(&b[0..4], b"FltR");
        assert_eq!(u32::from_le_bytes(b[8..12].try_into().unwrap()), 7);
        assert_eq!(b[12], 2, "minor at offset 12");
        assert_eq!(b[13], 1, "major at offset 13");
        assert_eq!(u16::from_le_bytes([b[14], b[15]]), 0x0021);
        assert_eq!(u32::from_le_bytes(b[16..20].try_into().unwrap()), 0x1111_1111);
        assert_eq!(u32::from_le_bytes(b[72..76].try_into().unwrap()), 0x0800_5678);
        assert_eq!(u32::from_le_bytes(b[80..84].try_into().unwrap()), 0xFEFA_125B);
        assert_eq!(u32::from_le_bytes(b[96..100].try_into().unwrap()), 0x2000_0100);
        assert_eq!(u32::from_le_bytes(b[108..112].try_into().unwrap()), 0x82);
        assert_eq!(u32::from_le_bytes(b[136..140].try_into().unwrap()), 0xDEAD_BEEF);
    }

    #[test]
    fn field_offsets_match_struct_layout() {
        assert_eq!(core::mem::offset_of!(FaultRecord, count), 8);
        assert_eq!(core::mem::offset_of!(FaultRecord, version), 12);
        assert_eq!(core::mem::offset_of!(FaultRecord, content), 14);
        assert_eq!(core::mem::offset_of!(FaultRecord, r0), 16);
        assert_eq!(core::mem::offset_of!(FaultRecord, integrity_signature), 80);
        assert_eq!(core::mem::offset_of!(FaultRecord, msplim), 100);
        assert_eq!(core::mem::offset_of!(FaultRecord, cfsr), 108);
        assert_eq!(core::mem::offset_of!(FaultRecord, sfar), 136);
    }

    #[test]
    fn erased_flash_pattern_decodes_without_panicking() {
        let r = FaultRecord::from_bytes(&[0xFF; FaultRecord::SIZE]);
        assert_eq!(r.magic_number, 0xFFFF_FFFF);
        assert_eq!(r.content.reserved_bits(), 0xFFC0);
        assert_eq!(r.version, SchemaVersion { major: 0xFF, minor: 0xFF });
    }

    #[test]
    fn get_and_set_cover_every_field_distinctly() {
        let mut r = FaultRecord::zeroed();
        for (i, field) in Field::ALL.iter().enumerate() {
            r.set(*field, 0x100 + i as u32);
        }
        for (i, field) in Field::ALL.iter().enumerate() {
            assert_eq!(r.get(*field), 0x100 + i as u32, "{}", field.name());
        }
        // Header word (magic, checksum, version/flags) untouched by field access.
        assert_eq!(r.magic_number, 0);
        assert_eq!(r.content, ContentFlags::empty());
    }

    #[test]
    fn captured_respects_group_flag() {
        let mut r = FaultRecord::zeroed();
        r.cfsr = 0x8200;
        assert_eq!(r.captured(Field::Cfsr), None);
        r.content.set(ContentFlags::FAULT_REGS, true);
        assert_eq!(r.captured(Field::Cfsr), Some(0x8200));
        // Handler context is never gated.
        r.exc_return = 0xFFFF_FFFD;
        assert_eq!(r.captured(Field::ExcReturn), Some(0xFFFF_FFFD));
    }

    #[test]
    fn content_flags_set_and_clear_are_independent() {
        let mut f = ContentFlags::empty();
        f.set(ContentFlags::FAULT_REGS, true);
        f.set(ContentFlags::ARMV8M, true);
        f.set(ContentFlags::FAULT_REGS, false);
        assert!(!f.contains(ContentFlags::FAULT_REGS));
        assert!(f.contains(ContentFlags::ARMV8M));
        assert_eq!(f.bits(), 0x0010);
        assert_eq!(f.iter().count(), 1);
    }

    #[test]
    fn flag_bits_match_layout_table() {
        let names: Vec<(&str, u16)> = ContentFlags::all()
            .iter_names()
            .map(|(name, flag)| (name, flag.bits()))
            .collect();
        assert_eq!(
            names,
            [
                ("STATE_CONTEXT", 0x01_u16),
                ("LIMIT_REGS", 0x02),
                ("FAULT_REGS", 0x04),
                ("SECURE_FAULT_REGS", 0x08),
                ("ARMV8M", 0x10),
                ("TZ_SECURE", 0x20),
            ]
        );
        assert_eq!(core::mem::size_of::<ContentFlags>(), 2);
    }

    #[test]
    fn reserved_bits_survive_a_byte_round_trip() {
        let mut r = FaultRecord::zeroed();
        r.content = ContentFlags::from_bits_retain(0x8004);
        let back = FaultRecord::from_bytes(&r.to_bytes());
        assert_eq!(back.content.bits(), 0x8004);
        assert_eq!(back.content.reserved_bits(), 0x8000);
        assert!(back.has(ContentFlags::FAULT_REGS));
        assert_eq!(back.content.iter_names().count(), 1);
    }
}
