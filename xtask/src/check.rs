use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

/// One cross build of the firmware crate.
pub(crate) struct TargetCheck {
    pub label: &'static str,
    pub target: &'static str,
    pub features: &'static str,
}

/// Every architecture variant the capture engine distinguishes, on the
/// target triple that variant builds for.
pub(crate) const TARGETS: &[TargetCheck] = &[
    TargetCheck {
        label: "Armv6-M",
        target: "thumbv6m-none-eabi",
        features: "hardware,armv6m",
    },
    TargetCheck {
        label: "Armv7-M",
        target: "thumbv7m-none-eabi",
        features: "hardware,armv7m",
    },
    TargetCheck {
        label: "Armv7E-M (reference board)",
        target: "thumbv7em-none-eabihf",
        features: "hardware,armv7em",
    },
    TargetCheck {
        label: "Armv8-M Baseline, secure",
        target: "thumbv8m.base-none-eabi",
        features: "hardware,armv8m-base,tz-secure",
    },
    TargetCheck {
        label: "Armv8-M Mainline",
        target: "thumbv8m.main-none-eabihf",
        features: "hardware,armv8m-main",
    },
    TargetCheck {
        label: "Armv8.1-M Mainline, secure",
        target: "thumbv8m.main-none-eabihf",
        features: "hardware,armv81m-main,tz-secure",
    },
];

impl TargetCheck {
    fn args(&self) -> Vec<&'static str> {
        vec![
            "check",
            "-p",
            "fault-firmware",
            "--target",
            self.target,
            "--no-default-features",
            "--features",
            self.features,
        ]
    }
}

pub fn run() -> Result<()> {
    println!();
    println!("{}", "🔍 Checking firmware builds...".cyan().bold());
    println!();

    let total_start = Instant::now();

    // Check 1: fault crate builds without std on the smallest target
    run_step(
        "fault crate (no_std, thumbv6m)",
        &[
            "check",
            "-p",
            "fault",
            "--target",
            "thumbv6m-none-eabi",
            "--features",
            "defmt",
        ],
    )?;

    // Check 2: firmware on every architecture variant
    for check in TARGETS {
        run_step(
            &format!("firmware {} ({})", check.label, check.target),
            &check.args(),
        )?;
    }

    // Check 3: Clippy lints
    println!("{}", "  Running clippy lints...".cyan());
    let clippy_start = Instant::now();

    let clippy_output = Command::new("cargo")
        .args(["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])
        .output()
        .context("Failed to run clippy")?;

    if clippy_output.status.success() {
        println!(
            "{}",
            format!(
                "  ✓ Clippy passed in {:.2}s",
                clippy_start.elapsed().as_secs_f64()
            )
            .green()
        );
    } else {
        eprintln!("{}", "  ⚠ Clippy warnings found".yellow().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&clippy_output.stderr));
        // Don't fail on clippy warnings, just show them
    }
    println!();

    // Check 4: Format check
    println!("{}", "  Checking code formatting...".cyan());

    let fmt_output = Command::new("cargo")
        .args(["fmt", "--all", "--check"])
        .output()
        .context("Failed to run cargo fmt")?;

    if fmt_output.status.success() {
        println!("{}", "  ✓ Formatting check passed".green());
    } else {
        eprintln!("{}", "  ⚠ Formatting issues found".yellow().bold());
        eprintln!("     Run 'cargo fmt --all' to fix");
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ All checks completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

fn run_step(label: &str, args: &[&str]) -> Result<()> {
    println!("{}", format!("  Checking {label}...").cyan());
    let start = Instant::now();

    let output = Command::new("cargo")
        .args(args)
        .output()
        .with_context(|| format!("Failed to check {label}"))?;

    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {label} failed").red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{label} check failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ {label} passed in {:.2}s",
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    Ok(())
}
