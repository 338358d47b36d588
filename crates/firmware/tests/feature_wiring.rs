//! Cargo feature wiring tests.
// Audit test file: expect/unwrap are intentional test mechanisms.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use fault::Capabilities;
use fault_firmware::board;

const CARGO_TOML: &str = include_str!("../Cargo.toml");

/// `hardware` must turn on defmt in the fault crate too, or the
/// `cfg_attr(feature = "defmt", ...)` derives there stay off and the
/// firmware's `defmt::Format` bounds fail.
#[test]
fn defmt_feature_propagates_to_fault() {
    assert!(CARGO_TOML.contains(r#"defmt = ["dep:defmt", "fault/defmt"]"#));
    let hardware = CARGO_TOML
        .split("hardware = [")
        .nth(1)
        .and_then(|rest| rest.split(']').next())
        .expect("hardware feature missing");
    assert!(hardware.contains("\"defmt\""));
    assert!(hardware.contains("\"dep:cortex-m-rt\""));
}

#[test]
fn demo_binary_requires_hardware() {
    let bin = CARGO_TOML.split("[[bin]]").nth(1).expect("no [[bin]] target");
    assert!(bin.contains(r#"name = "fault-demo""#));
    assert!(bin.contains(r#"required-features = ["hardware"]"#));
}

#[test]
fn variant_features_pick_capabilities() {
    let preset = if cfg!(feature = "armv81m-main") {
        Capabilities::ARMV81M_MAIN
    } else if cfg!(feature = "armv8m-main") {
        Capabilities::ARMV8M_MAIN
    } else if cfg!(feature = "armv8m-base") {
        Capabilities::ARMV8M_BASE
    } else if cfg!(feature = "armv7m") && !cfg!(feature = "armv7em") {
        Capabilities::ARMV7M
    } else if cfg!(feature = "armv6m") && !cfg!(any(feature = "armv7m", feature = "armv7em")) {
        Capabilities::ARMV6M
    } else {
        Capabilities::ARMV7EM
    };
    let expected = if cfg!(feature = "tz-secure") {
        preset.secure()
    } else {
        preset
    };
    assert_eq!(board::CAPABILITIES, expected);
    assert_eq!(board::CONFIG.capabilities, expected);
    assert_eq!(board::CONFIG.ram, board::STACK_RAM);
}
