//! xtask decode: validate and print a fault record from a RAM dump.
//!
//! The dump is raw bytes as written by a debugger, e.g.
//! `probe-rs read b32 0x2001fe00 35 --chip STM32H743ZITx` converted to
//! binary, or GDB's `dump binary memory fault.bin FAULT_RECORD FAULT_RECORD+140`.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use fault::{decode, decode_with_len, DecodeError, FaultRecord, FaultReport, MAGIC_NUMBER};

/// Entry point called from main.rs
pub fn run(dump: &Path, offset: usize, scan: bool, len: Option<usize>) -> Result<()> {
    let bytes = fs::read(dump).with_context(|| format!("reading {}", dump.display()))?;
    println!(
        "{}",
        format!("Decoding {} ({} bytes)", dump.display(), bytes.len()).cyan()
    );

    if scan {
        let found = scan_records(&bytes, len);
        if found.is_empty() {
            bail!(
                "no valid fault record in {} (records newer than this build need --len)",
                dump.display()
            );
        }
        for (at, record) in &found {
            println!();
            println!("{}", format!("record at offset 0x{at:X}").green().bold());
            print!("{}", FaultReport::new(record));
        }
        return Ok(());
    }

    let record = decode_at(&bytes, offset, len)?;
    println!();
    print!("{}", FaultReport::new(&record));
    Ok(())
}

/// Decode the record image starting at `offset`.
///
/// The image length comes from the record's version unless `len` is given;
/// the rest of the dump never enters the checksum.
pub(crate) fn decode_at(bytes: &[u8], offset: usize, len: Option<usize>) -> Result<FaultRecord> {
    let image = bytes
        .get(offset..)
        .ok_or_else(|| anyhow!("offset 0x{offset:X} is past the end of the dump"))?;
    let decoded = match len {
        Some(len) => decode_with_len(image, len),
        None => decode(image),
    };
    decoded.map_err(|err| match err {
        DecodeError::UnknownLength { .. } => anyhow!("at offset 0x{offset:X}: {err} (pass --len)"),
        _ => anyhow!("at offset 0x{offset:X}: {err}"),
    })
}

/// Every word-aligned offset holding a record that passes validation.
pub(crate) fn scan_records(bytes: &[u8], len: Option<usize>) -> Vec<(usize, FaultRecord)> {
    let magic = MAGIC_NUMBER.to_le_bytes();
    (0..bytes.len())
        .step_by(4)
        .filter(|&at| bytes.get(at..).is_some_and(|rest| rest.starts_with(&magic)))
        .filter_map(|at| decode_at(bytes, at, len).ok().map(|record| (at, record)))
        .collect()
}

/// Parse a byte count or offset: decimal or `0x`-prefixed hex.
pub(crate) fn parse_number(arg: &str) -> Result<usize, String> {
    let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(&hex.replace('_', ""), 16),
        None => arg.replace('_', "").parse(),
    };
    parsed.map_err(|err| format!("invalid number '{arg}': {err}"))
}

#[cfg(test)]
#[allow(clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use fault::{stamp, ContentFlags, SchemaVersion};

    /// A 1.1 record: the 1.0 layout plus one appended word in the checksum.
    fn newer_minor_record() -> Vec<u8> {
        let mut rec = bus_fault();
        rec.version.minor = SchemaVersion::CURRENT.minor + 1;
        let mut image = rec.to_bytes().to_vec();
        image.extend_from_slice(&0x1234_5678u32.to_le_bytes());
        let crc = crc32fast::hash(&image[8..]);
        image[4..8].copy_from_slice(&crc.to_le_bytes());
        image
    }
    use tempfile::TempDir;

    fn bus_fault() -> FaultRecord {
        let mut rec = FaultRecord::zeroed();
        rec.count = 4;
        rec.content = ContentFlags::STATE_CONTEXT | ContentFlags::FAULT_REGS;
        rec.xpsr_in_handler = 5;
        rec.exc_return = 0xFFFF_FFFD;
        rec.return_address = 0x0800_1234;
        rec.cfsr = 0x8200;
        rec.bfar = 0xCFFF_FFF0;
        stamp(&mut rec);
        rec
    }

    fn dump_with_record_at(offset: usize, len: usize) -> Vec<u8> {
        let mut dump = vec![0xEE; len];
        dump[offset..offset + FaultRecord::SIZE].copy_from_slice(&bus_fault().to_bytes());
        dump
    }

    #[test]
    fn decode_at_reads_record_inside_dump() {
        let dump = dump_with_record_at(0x40, 0x200);
        let rec = decode_at(&dump, 0x40, None).unwrap();
        assert_eq!(rec.count, 4);
        assert_eq!(rec.version, SchemaVersion::CURRENT);
        assert_eq!(rec.bfar, 0xCFFF_FFF0);
    }

    #[test]
    fn decode_at_wrong_offset_reports_bad_magic() {
        let dump = dump_with_record_at(0x40, 0x200);
        let err = decode_at(&dump, 0x44, None).unwrap_err().to_string();
        assert!(err.contains("magic"), "{err}");
        assert!(err.contains("0x44"), "{err}");
    }

    #[test]
    fn decode_at_past_end_fails() {
        let dump = dump_with_record_at(0, FaultRecord::SIZE);
        assert!(decode_at(&dump, 0x1000, None).is_err());
        assert!(decode_at(&dump, 4, None).is_err());
    }

    #[test]
    fn scan_finds_only_valid_records() {
        let mut dump = dump_with_record_at(0x80, 0x400);
        // Magic without a valid checksum must not be reported.
        dump[0x200..0x204].copy_from_slice(&MAGIC_NUMBER.to_le_bytes());
        let found = scan_records(&dump, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 0x80);
        assert_eq!(found[0].1.return_address, 0x0800_1234);
    }

    #[test]
    fn decode_at_ignores_trailing_dump_bytes() {
        let dump = dump_with_record_at(0, 0x200);
        assert_eq!(decode_at(&dump, 0, None).unwrap().count, 4);
    }

    #[test]
    fn newer_minor_record_inside_dump_decodes_with_len() {
        let mut dump = vec![0xEE; 0x40];
        dump.extend_from_slice(&newer_minor_record());
        dump.extend_from_slice(&[0xEE; 64]);

        let err = decode_at(&dump, 0x40, None).unwrap_err().to_string();
        assert!(err.contains("--len"), "{err}");

        let rec = decode_at(&dump, 0x40, Some(FaultRecord::SIZE + 4)).unwrap();
        assert_eq!(rec.version.minor, SchemaVersion::CURRENT.minor + 1);
        assert_eq!(rec.bfar, 0xCFFF_FFF0);

        assert!(scan_records(&dump, None).is_empty());
        let found = scan_records(&dump, Some(FaultRecord::SIZE + 4));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, 0x40);
    }

    #[test]
    fn scan_empty_dump() {
        assert!(scan_records(&[], None).is_empty());
        assert!(scan_records(&[0u8; 3], None).is_empty());
    }

    #[test]
    fn parse_number_accepts_hex_and_decimal() {
        assert_eq!(parse_number("64"), Ok(64));
        assert_eq!(parse_number("0x40"), Ok(64));
        assert_eq!(parse_number("0X1_00"), Ok(256));
        assert!(parse_number("0xZZ").is_err());
        assert!(parse_number("-1").is_err());
    }

    #[test]
    fn run_decodes_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fault.bin");
        fs::write(&path, dump_with_record_at(0, FaultRecord::SIZE)).unwrap();
        run(&path, 0, false, None).unwrap();
        run(&path, 0, true, None).unwrap();
    }

    #[test]
    fn run_rejects_corrupt_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fault.bin");
        let mut dump = dump_with_record_at(0, FaultRecord::SIZE);
        dump[100] ^= 0x01;
        fs::write(&path, dump).unwrap();
        let err = run(&path, 0, false, None).unwrap_err().to_string();
        assert!(err.contains("checksum"), "{err}");
        assert!(run(&path, 0, true, None).is_err());
    }

    #[test]
    fn run_missing_file_has_context() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("absent.bin");
        let err = format!("{:#}", run(&path, 0, false, None).unwrap_err());
        assert!(err.contains("absent.bin"), "{err}");
    }
}
