//! Integrity codec: magic sentinel, schema version and CRC-32.
//!
//! # Checksum parameters
//!
//! CRC-32/ISO-HDLC (the zlib / Ethernet CRC), as implemented by `crc32fast`:
//!
//! | Parameter  | Value        |
//! |------------|--------------|
//! | Width      | 32           |
//! | Polynomial | `0x04C11DB7` |
//! | Init       | `0xFFFFFFFF` |
//! | RefIn      | true         |
//! | RefOut     | true         |
//! | XorOut     | `0xFFFFFFFF` |
//! | Check      | `0xCBF43926` (`"123456789"`) |
//!
//! The CRC covers bytes `[8..140]` of the wire layout, i.e. everything except
//! the magic number and the checksum itself. A newer minor version extends
//! the covered range over its appended fields, so decoding one needs its
//! image length.

use thiserror_no_std::Error;

use crate::record::{FaultRecord, SchemaVersion, CHECKSUM_START, MAGIC_NUMBER};

/// Error decoding a record image read from outside the firmware (dump file,
/// debugger memory read).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Fewer bytes supplied than the record image needs.
    #[error("record image truncated: {len} bytes, need {needed}")]
    Truncated {
        /// Bytes supplied.
        len: usize,
        /// Bytes required.
        needed: usize,
    },
    /// The magic number is not `"FltR"`: no record, or never written.
    #[error("bad magic number 0x{found:08X}")]
    BadMagic {
        /// Value found at offset 0.
        found: u32,
    },
    /// Layout major version is not one this decoder understands.
    #[error("unsupported record version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found.
        major: u8,
        /// Minor version found.
        minor: u8,
    },
    /// A newer minor version appends fields this decoder does not know the
    /// size of; the caller must supply the image length.
    #[error("record version {major}.{minor} is newer than this decoder; image length required")]
    UnknownLength {
        /// Major version found.
        major: u8,
        /// Minor version found.
        minor: u8,
    },
    /// The supplied image length cannot hold this record version.
    #[error("image length {len} does not match record version {major}.{minor}")]
    BadLength {
        /// Length supplied by the caller.
        len: usize,
        /// Major version found.
        major: u8,
        /// Minor version found.
        minor: u8,
    },
    /// Stored and computed checksums differ: the record is stale or corrupt.
    #[error("checksum mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}")]
    ChecksumMismatch {
        /// Checksum stored in the record.
        stored: u32,
        /// Checksum computed over the supplied bytes.
        computed: u32,
    },
}

/// CRC-32 of a record over every byte except magic and checksum.
#[must_use]
pub fn checksum(record: &FaultRecord) -> u32 {
    let bytes = record.to_bytes();
    crc32fast::hash(bytes.get(CHECKSUM_START..).unwrap_or(&[]))
}

/// Write magic, current schema version and a fresh checksum. Always succeeds.
///
/// Version is written before the checksum is computed, so the checksum
/// covers it.
pub fn stamp(record: &mut FaultRecord) {
    record.magic_number = MAGIC_NUMBER;
    record.version = SchemaVersion::CURRENT;
    record.checksum = checksum(record);
}

/// `true` iff the magic matches and the stored checksum equals a fresh one.
///
/// Pure: never mutates, never panics, accepts arbitrary bytes.
#[must_use]
pub fn is_valid(record: &FaultRecord) -> bool {
    record.magic_number == MAGIC_NUMBER && record.checksum == checksum(record)
}

/// Image length in bytes of each known minor of the current major version,
/// indexed by minor.
const MINOR_IMAGE_LEN: [usize; 1] = [FaultRecord::SIZE];

/// Image length of a record version this build knows, or `None` for a newer
/// minor (or another major).
#[must_use]
pub fn image_len(version: SchemaVersion) -> Option<usize> {
    if version.major != SchemaVersion::CURRENT.major {
        return None;
    }
    MINOR_IMAGE_LEN.get(usize::from(version.minor)).copied()
}

/// Decode and validate a record image at the start of `bytes`.
///
/// The checksum covers exactly the record's own image, whose length comes
/// from its schema version; bytes after it (the rest of a RAM dump) are
/// ignored. Records with an unknown major version are rejected. A newer minor
/// version cannot be sized here and fails with
/// [`DecodeError::UnknownLength`]; use [`decode_with_len`] for it.
///
/// # Errors
///
/// See [`DecodeError`].
pub fn decode(bytes: &[u8]) -> Result<FaultRecord, DecodeError> {
    decode_image(bytes, None)
}

/// Like [`decode`], with the image length supplied by the caller.
///
/// Needed for a record written by a newer minor version, whose appended
/// fields this build cannot size. The checksum then covers `[8..len]` and
/// the known prefix is returned.
///
/// # Errors
///
/// See [`DecodeError`]. For a known version, `len` must equal its image
/// length; for a newer minor it must be at least [`FaultRecord::SIZE`].
pub fn decode_with_len(bytes: &[u8], len: usize) -> Result<FaultRecord, DecodeError> {
    decode_image(bytes, Some(len))
}

fn decode_image(bytes: &[u8], len: Option<usize>) -> Result<FaultRecord, DecodeError> {
    let prefix: &[u8; FaultRecord::SIZE] = bytes
        .get(..FaultRecord::SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::Truncated {
            len: bytes.len(),
            needed: FaultRecord::SIZE,
        })?;
    let record = FaultRecord::from_bytes(prefix);
    let SchemaVersion { major, minor } = record.version;

    if record.magic_number != MAGIC_NUMBER {
        return Err(DecodeError::BadMagic {
            found: record.magic_number,
        });
    }
    if major != SchemaVersion::CURRENT.major {
        return Err(DecodeError::UnsupportedVersion { major, minor });
    }

    let covered_len = match (image_len(record.version), len) {
        (Some(known), None) => known,
        (Some(known), Some(len)) if len == known => known,
        (None, Some(len)) if len >= FaultRecord::SIZE => len,
        (None, None) => return Err(DecodeError::UnknownLength { major, minor }),
        (_, Some(len)) => return Err(DecodeError::BadLength { len, major, minor }),
    };
    let image = bytes.get(..covered_len).ok_or(DecodeError::Truncated {
        len: bytes.len(),
        needed: covered_len,
    })?;

    let computed = crc32fast::hash(image.get(CHECKSUM_START..).unwrap_or(&[]));
    if computed != record.checksum {
        return Err(DecodeError::ChecksumMismatch {
            stored: record.checksum,
            computed,
        });
    }
    Ok(record)
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
    use crate::record::ContentFlags;

    fn sample() -> FaultRecord {
        let mut r = FaultRecord::zeroed();
        r.count = 1;
        r.content = ContentFlags::STATE_CONTEXT;
        r.r0 = 1;
        r.return_address = 0x0800_5678;
        r.exc_return = 0xFFFF_FFFD;
        r
    }

    #[test]
    fn crc_parameters_match_iso_hdlc_check_value() {
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn stamped_record_is_valid() {
        let mut r = sample();
        assert!(!is_valid(&r));
        stamp(&mut r);
        assert!(is_valid(&r));
        assert_eq!(r.version, SchemaVersion::CURRENT);
        assert_eq!(r.magic_number, MAGIC_NUMBER);
    }

    #[test]
    fn checksum_ignores_magic_and_checksum_fields() {
        let mut a = sample();
        let b = a;
        a.magic_number = 0x1234_5678;
        a.checksum = 0x9ABC_DEF0;
        assert_eq!(checksum(&a), checksum(&b));
    }

    #[test]
    fn changing_version_invalidates() {
        let mut r = sample();
        stamp(&mut r);
        r.version.minor = r.version.minor.wrapping_add(1);
        assert!(!is_valid(&r));
    }

    #[test]
    fn all_ones_memory_is_not_valid() {
        let r = FaultRecord::from_bytes(&[0xFF; FaultRecord::SIZE]);
        assert!(!is_valid(&r));
    }

    #[test]
    fn decode_accepts_stamped_image() {
        let mut r = sample();
        stamp(&mut r);
        assert_eq!(decode(&r.to_bytes()), Ok(r));
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(
            decode(&[0u8; 12]),
            Err(DecodeError::Truncated { len: 12, needed: 140 })
        );
    }

    #[test]
    fn decode_rejects_bad_magic() {
        let mut r = sample();
        stamp(&mut r);
        let mut bytes = r.to_bytes();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(DecodeError::BadMagic { .. })));
    }

    #[test]
    fn decode_rejects_unknown_major() {
        let mut r = sample();
        stamp(&mut r);
        r.version.major = 9;
        r.checksum = checksum(&r);
        assert_eq!(
            decode(&r.to_bytes()),
            Err(DecodeError::UnsupportedVersion { major: 9, minor: 0 })
        );
    }

    /// A v1.1 image: the 1.0 prefix plus `extra` appended bytes, checksummed
    /// over `[8..140 + extra.len()]`.
    fn newer_minor_image(extra: &[u8]) -> std::vec::Vec<u8> {
        let mut r = sample();
        r.magic_number = MAGIC_NUMBER;
        r.version = SchemaVersion {
            major: SchemaVersion::CURRENT.major,
            minor: SchemaVersion::CURRENT.minor + 1,
        };
        let mut image = r.to_bytes().to_vec();
        image.extend_from_slice(extra);
        let crc = crc32fast::hash(&image[8..]);
        image[4..8].copy_from_slice(&crc.to_le_bytes());
        image
    }

    #[test]
    fn decode_ignores_bytes_after_the_record() {
        let mut r = sample();
        stamp(&mut r);
        let mut dump = r.to_bytes().to_vec();
        dump.extend_from_slice(&[0xA5; 64]);
        assert_eq!(decode(&dump), Ok(r));
    }

    #[test]
    fn decode_newer_minor_needs_explicit_length() {
        let image = newer_minor_image(&[1, 2, 3, 4]);
        let minor = SchemaVersion::CURRENT.minor + 1;
        assert_eq!(
            decode(&image),
            Err(DecodeError::UnknownLength { major: 1, minor })
        );

        let decoded = decode_with_len(&image, FaultRecord::SIZE + 4).unwrap();
        assert_eq!(decoded.r0, 1);
        assert_eq!(decoded.version.minor, minor);
    }

    #[test]
    fn decode_newer_minor_inside_larger_dump() {
        let mut dump = newer_minor_image(&[1, 2, 3, 4]);
        dump.extend_from_slice(&[0xEE; 64]);
        assert!(decode_with_len(&dump, FaultRecord::SIZE + 4).is_ok());
        // The length decides what the checksum covers.
        assert!(matches!(
            decode_with_len(&dump, FaultRecord::SIZE + 8),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
        assert!(matches!(
            decode_with_len(&dump, dump.len() + 4),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn decode_with_len_checks_known_versions() {
        let mut r = sample();
        stamp(&mut r);
        let bytes = r.to_bytes();
        assert_eq!(decode_with_len(&bytes, FaultRecord::SIZE), Ok(r));
        assert_eq!(
            decode_with_len(&bytes, 144),
            Err(DecodeError::BadLength { len: 144, major: 1, minor: 0 })
        );

        let newer = newer_minor_image(&[]);
        assert_eq!(
            decode_with_len(&newer, 136),
            Err(DecodeError::BadLength { len: 136, major: 1, minor: 1 })
        );
    }

    #[test]
    fn image_len_knows_only_current_layouts() {
        assert_eq!(image_len(SchemaVersion::CURRENT), Some(FaultRecord::SIZE));
        assert_eq!(image_len(SchemaVersion { major: 1, minor: 1 }), None);
        assert_eq!(image_len(SchemaVersion { major: 2, minor: 0 }), None);
    }

    #[test]
    fn decode_reports_checksum_mismatch() {
        let mut r = sample();
        stamp(&mut r);
        let mut bytes = r.to_bytes();
        bytes[20] ^= 0x01;
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::ChecksumMismatch { .. })
        ));
    }
}
