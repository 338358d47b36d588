// Desktop/tooling crate: unwrap/expect/panic acceptable in non-embedded code.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod check;
mod decode;
mod flash;
mod test;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Fault record development tasks", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and print a fault record from a raw RAM dump
    Decode {
        /// Binary dump file (debugger memory read)
        dump: PathBuf,
        /// Byte offset of the record inside the dump (decimal or 0x-hex)
        #[arg(long, default_value = "0", value_parser = decode::parse_number)]
        offset: usize,
        /// Search every word-aligned offset for valid records instead
        #[arg(long, conflicts_with = "offset")]
        scan: bool,
        /// Record image length in bytes, for records newer than this build
        #[arg(long, value_parser = decode::parse_number)]
        len: Option<usize>,
    },
    /// Build the demo firmware, flash it and stream RTT via probe-rs
    Flash {
        /// Build and flash release version
        #[arg(short, long)]
        release: bool,
        /// Halt at a breakpoint after saving instead of resetting
        #[arg(long)]
        halt: bool,
    },
    /// Check the fault crate and firmware on every architecture variant
    Check,
    /// Run all host tests (unit, integration, property and doc)
    Test {
        /// Run only unit tests
        #[arg(long)]
        unit: bool,
        /// Run only integration tests
        #[arg(long)]
        integration: bool,
        /// Override the proptest case count for integration tests
        #[arg(long)]
        proptest_cases: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode {
            dump,
            offset,
            scan,
            len,
        } => decode::run(&dump, offset, scan, len),
        Commands::Flash { release, halt } => flash::run(release, halt),
        Commands::Check => check::run(),
        Commands::Test {
            unit,
            integration,
            proptest_cases,
        } => test::run(unit, integration, proptest_cases),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn decode_parses_hex_offset() {
        let cli = Cli::try_parse_from(["xtask", "decode", "ram.bin", "--offset", "0x1fe00"]).unwrap();
        match cli.command {
            Commands::Decode {
                offset, scan, len, ..
            } => {
                assert_eq!(offset, 0x1_FE00);
                assert!(!scan);
                assert_eq!(len, None);
            }
            _ => panic!("expected decode"),
        }
    }

    #[test]
    fn decode_scan_excludes_offset() {
        assert!(Cli::try_parse_from(["xtask", "decode", "ram.bin", "--scan", "--offset", "4"]).is_err());
        assert!(Cli::try_parse_from(["xtask", "decode", "ram.bin", "--scan"]).is_ok());
    }

    #[test]
    fn decode_accepts_image_length() {
        let cli = Cli::try_parse_from(["xtask", "decode", "ram.bin", "--scan", "--len", "0x90"]).unwrap();
        match cli.command {
            Commands::Decode { scan, len, .. } => {
                assert!(scan);
                assert_eq!(len, Some(144));
            }
            _ => panic!("expected decode"),
        }
    }
}
