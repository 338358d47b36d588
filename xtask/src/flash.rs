use anyhow::{Context, Result};
use colored::Colorize;
use std::process::Command;
use std::time::Instant;

const TARGET: &str = "thumbv7em-none-eabihf";
const CHIP: &str = "STM32H743ZITx";

pub fn run(release: bool, halt: bool) -> Result<()> {
    let mode = if release { "release" } else { "debug" };

    println!();
    println!(
        "{}",
        format!("🔨 Building fault-demo ({mode} mode)...").cyan().bold()
    );
    println!();

    let build_start = Instant::now();
    let mut build_cmd = Command::new("cargo");
    build_cmd.args(["build", "-p", "fault-firmware", "--bin", "fault-demo", "--target", TARGET]);
    build_cmd.arg("--features").arg(if halt {
        "hardware,halt-on-fault"
    } else {
        "hardware"
    });

    if release {
        build_cmd.arg("--release");
    }

    let build_output = build_cmd.output().context("Failed to run cargo build")?;

    if !build_output.status.success() {
        eprintln!("{}", "✗ Build failed".red().bold());
        eprintln!();
        eprintln!("{}", String::from_utf8_lossy(&build_output.stderr));
        anyhow::bail!("Build failed");
    }

    println!(
        "{}",
        format!(
            "✓ Build successful in {:.2}s",
            build_start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();

    // probe-rs run streams RTT until interrupted, so inherit stdio.
    println!("{}", "📡 Flashing and attaching RTT...".cyan().bold());
    println!(
        "   {}",
        "Each reset alternates between a provoked BusFault and its report".dimmed()
    );
    println!();

    let status = Command::new("probe-rs")
        .arg("run")
        .arg(binary_path(release))
        .args(["--chip", CHIP])
        .status()
        .context("Failed to run probe-rs. Is probe-rs installed? (cargo install probe-rs-tools)")?;

    if !status.success() {
        anyhow::bail!("probe-rs exited with {status}");
    }

    Ok(())
}

fn binary_path(release: bool) -> String {
    let profile = if release { "release" } else { "debug" };
    format!("target/{TARGET}/{profile}/fault-demo")
}
