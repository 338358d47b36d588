use anyhow::{Context, Result};
use colored::Colorize;
use std::process::{Command, Output};
use std::time::Instant;

pub fn run(unit_only: bool, integration_only: bool, proptest_cases: Option<u32>) -> Result<()> {
    println!();
    println!("{}", "🧪 Running tests...".cyan().bold());
    println!();

    let total_start = Instant::now();

    let run_unit = !integration_only;
    let run_integration = !unit_only;

    // Test 1: Unit tests (every #[cfg(test)] module on the host)
    if run_unit {
        run_suite("unit", &["test", "--workspace", "--lib", "--bins"], None)?;
    }

    // Test 2: Integration and property tests under crates/*/tests
    if run_integration {
        run_suite(
            "integration",
            &["test", "--workspace", "--tests"],
            proptest_cases,
        )?;
    }

    // Test 3: Doc tests
    println!("{}", "  Running doc tests...".cyan());
    let doc_start = Instant::now();

    let doc_output = Command::new("cargo")
        .args(["test", "--doc", "--workspace"])
        .output()
        .context("Failed to run doc tests")?;

    if doc_output.status.success() {
        let summary = summarize(&String::from_utf8_lossy(&doc_output.stdout));
        println!(
            "{}",
            format!(
                "  ✓ Doc tests passed {} in {:.2}s",
                summary,
                doc_start.elapsed().as_secs_f64()
            )
            .green()
        );
    } else {
        eprintln!("{}", "  ⚠ Doc tests failed".yellow().bold());
    }
    println!();

    println!(
        "{}",
        format!(
            "✓ All tests completed in {:.2}s",
            total_start.elapsed().as_secs_f64()
        )
        .green()
        .bold()
    );
    println!();

    Ok(())
}

fn run_suite(name: &str, args: &[&str], proptest_cases: Option<u32>) -> Result<()> {
    println!("{}", format!("  Running {name} tests...").cyan());
    let start = Instant::now();

    let mut cmd = Command::new("cargo");
    cmd.args(args);
    if let Some(cases) = proptest_cases {
        cmd.env("PROPTEST_CASES", cases.to_string());
    }
    let output: Output = cmd
        .output()
        .with_context(|| format!("Failed to run {name} tests"))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !output.status.success() {
        eprintln!("{}", format!("  ✗ {name} tests failed").red().bold());
        eprintln!();
        for line in stdout.lines() {
            eprintln!("  {line}");
        }
        eprintln!("{}", String::from_utf8_lossy(&output.stderr));
        anyhow::bail!("{name} tests failed");
    }

    println!(
        "{}",
        format!(
            "  ✓ {name} tests passed {} in {:.2}s",
            summarize(&stdout),
            start.elapsed().as_secs_f64()
        )
        .green()
    );
    println!();
    Ok(())
}

/// Totals across every "test result:" line cargo prints (one per test binary).
fn summarize(output: &str) -> String {
    let mut passed = 0u64;
    let mut failed = 0u64;
    let mut ignored = 0u64;
    let mut binaries = 0u64;

    for line in output.lines() {
        let Some(result) = line.split("test result:").nth(1) else {
            continue;
        };
        binaries = binaries.saturating_add(1);
        for part in result.split(';') {
            let mut words = part.split_whitespace().rev();
            let (Some(label), Some(count)) = (words.next(), words.next()) else {
                continue;
            };
            let Ok(count) = count.parse::<u64>() else {
                continue;
            };
            match label {
                "passed" => passed = passed.saturating_add(count),
                "failed" => failed = failed.saturating_add(count),
                "ignored" => ignored = ignored.saturating_add(count),
                _ => {}
            }
        }
    }

    if binaries == 0 {
        return "(summary not available)".to_string();
    }
    format!("({passed} passed, {failed} failed, {ignored} ignored across {binaries} binaries)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_sums_every_binary() {
        let out = "\
running 3 tests
test result: ok. 3 passed; 0 failed; 1 ignored; 0 measured; 0 filtered out; finished in 0.01s
running 5 tests
test result: ok. 5 passed; 0 failed; 0 ignored; 0 measured; 0 filtered out; finished in 0.20s
";
        assert_eq!(
            summarize(out),
            "(8 passed, 0 failed, 1 ignored across 2 binaries)"
        );
    }

    #[test]
    fn summarize_without_results() {
        assert_eq!(summarize("Compiling fault v0.1.0"), "(summary not available)");
    }
}
