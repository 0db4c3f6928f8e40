//! Console sections for pipeline results

use std::io::{self, Write};

use fwsign_core::{Error, Prerequisite, ReleaseSummary, Resolution, Stage};

const RULE_WIDTH: usize = 60;

fn rule() -> String {
    "=".repeat(RULE_WIDTH)
}

/// Print a section header
pub fn banner(title: &str) {
    println!();
    println!("{}", rule());
    println!("{}", title);
    println!("{}", rule());
}

/// Format an integer with comma thousands separators
pub fn grouped(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn complete(summary: &ReleaseSummary) {
    let image_name = summary
        .image_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let manifest_name = summary
        .manifest_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    banner("✅ FIRMWARE SIGNING COMPLETE");
    println!("Version: {}", summary.version);
    if summary.used_default_version {
        println!("  (version metadata unavailable, default used)");
    }
    println!("Output directory: {}/", summary.release_dir.display());
    println!(
        "  - {:<16}({} bytes)",
        image_name,
        grouped(summary.image_size)
    );
    println!("    └─ Signature:   {} bytes", summary.signature_size);
    println!("    └─ Firmware:    {} bytes", grouped(summary.firmware_size));
    println!("  - {}", manifest_name);
    println!("SHA-256: {}", summary.image_sha256);
    println!();
    println!("Next steps:");
    for (i, step) in summary.next_steps().iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    println!("{}", rule());
    println!();
}

pub fn skipped(missing: &Prerequisite) {
    banner("POST-BUILD: Firmware Signing");
    println!("⚠ WARNING: {}: {}", missing, missing.path.display());
    println!("  Skipping firmware signing. To enable signing:");
    for (i, step) in missing.remediation().iter().enumerate() {
        println!("  {}. {}", i + 1, step);
    }
    println!();
}

pub fn failed(stage: Stage, error: &Error) {
    // Failure sections go to stdout with the rest of the banner
    let _ = write_failed(&mut io::stdout().lock(), stage, error);
}

pub fn unconfigured(error: &anyhow::Error) {
    let _ = write_unconfigured(&mut io::stdout().lock(), error);
}

fn write_banner(out: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", rule())?;
    writeln!(out, "{}", title)?;
    writeln!(out, "{}", rule())
}

fn write_failed(out: &mut impl Write, stage: Stage, error: &Error) -> io::Result<()> {
    write_banner(out, "POST-BUILD: Firmware Signing")?;
    writeln!(out, "❌ ERROR during {}: {}", stage, error)?;
    if stage == Stage::Manifest {
        writeln!(out, "   The signed image was written; only the manifest is missing.")?;
    } else {
        writeln!(out, "   No signed image or manifest was published.")?;
    }
    writeln!(out)
}

fn write_unconfigured(out: &mut impl Write, error: &anyhow::Error) -> io::Result<()> {
    write_banner(out, "POST-BUILD: Firmware Signing")?;
    writeln!(out, "❌ ERROR in configuration: {:#}", error)?;
    writeln!(out, "   Skipping firmware signing. Fix fwsign.json or the command-line options.")?;
    writeln!(out)
}

pub fn version(resolution: &Resolution) {
    match resolution {
        Resolution::Resolved(v) => println!("{}", v),
        Resolution::UsedDefault(v) => println!("{} (default)", v),
    }
}
