//! Plain-text rendering of session results.
//!
//! Shared by the interactive shell and the one-shot subcommands. Every
//! renderer returns a `String` without a trailing newline.

use std::fmt::Write as _;

use crate::analyze::{Analysis, AnalysisMode};
use crate::error::Result;
use crate::hexdump::HexDump;
use crate::manifest::{ManifestReport, Severity};
use crate::profile::Profile;
use crate::session::{ListedStructure, Region, Status};

const RULE_WIDTH: usize = 60;

/// Text shown when a profile has no rows.
pub const EMPTY_PROFILE: &str = "Profile is empty.";

fn rule() -> String {
    "-".repeat(RULE_WIDTH)
}

/// The raw profile rows as a table.
#[must_use]
pub fn profile_table(profile: &Profile) -> String {
    if profile.is_empty() {
        return EMPTY_PROFILE.to_string();
    }
    let mut out = format!(
        "{:<20} {:<12} {:<8} {:<8} {}\n{}",
        "name",
        "offset",
        "size",
        "rOffset",
        "parent",
        rule()
    );
    for entry in profile.entries() {
        let _ = write!(
            out,
            "\n{:<20} {:<12} {:<8} {:<8} {}",
            entry.name, entry.offset, entry.size, entry.r_offset, entry.parent
        );
    }
    out
}

/// Resolved offsets for every structure.
#[must_use]
pub fn listing(rows: &[ListedStructure]) -> String {
    if rows.is_empty() {
        return EMPTY_PROFILE.to_string();
    }
    let mut out = format!("{:<20} {:<18} {}\n{}", "name", "resolved_offset", "size", rule());
    for row in rows {
        let offset = row
            .offset
            .map_or_else(|| format!("{:<18}", "N/A"), |off| format!("0x{off:08X}"));
        let _ = write!(out, "\n{:<20} {offset} {}", row.name, row.size);
    }
    out
}

/// What is loaded and what has been written.
#[must_use]
pub fn status(status: &Status) -> String {
    let mut out = String::new();
    match &status.profile {
        Some(path) => {
            let _ = writeln!(
                out,
                "Profile: {} ({} structures)",
                path.display(),
                status.profile_entries
            );
        }
        None if status.profile_entries > 0 => {
            let _ = writeln!(out, "Profile: <unsaved> ({} structures)", status.profile_entries);
        }
        None => out.push_str("Profile: None\n"),
    }
    match &status.image {
        Some(image) => {
            let area = image.area.map_or_else(|| "unknown area".to_string(), |a| a.to_string());
            let _ = writeln!(
                out,
                "Image:   {} ({} bytes, {area})\n         blake3 {}",
                image.path.display(),
                image.size,
                image.fingerprint
            );
        }
        None => out.push_str("Image:   None\n"),
    }
    if status.outputs.is_empty() {
        out.push_str("Outputs: None");
    } else {
        out.push_str("Outputs:");
        for path in &status.outputs {
            let _ = write!(out, "\n  {}", path.display());
        }
    }
    out
}

/// A raw region as read by `hex`.
///
/// # Errors
///
/// Returns an error if `width` is outside `1..=64`.
pub fn region(region: Region, data: &[u8], width: usize) -> Result<String> {
    let dump = HexDump::new(data, offset_u64(region.offset), width)?;
    Ok(format!(
        "--- Hexdump at 0x{:X} ({} bytes) ---\n{dump}\n--- End of data ---",
        region.offset, region.size
    ))
}

/// An analysis result: header, hexdump, footer and any warnings.
///
/// # Errors
///
/// Returns an error if `width` is outside `1..=64`.
pub fn analysis(analysis: &Analysis, width: usize) -> Result<String> {
    let name = &analysis.name;
    let mut out = String::new();

    if let Some(update) = &analysis.profile_update {
        let _ = writeln!(
            out,
            "[INFO] Profile for '{name}' differs from the binary: offset {} -> 0x{:X}, size {} -> 0x{:X}",
            hex_or_none(update.profile_offset),
            analysis.offset,
            hex_or_none(update.profile_size),
            analysis.size
        );
        match &update.write_error {
            None => {
                let _ = writeln!(out, "[INFO] Updated profile written to {}", update.path.display());
            }
            Some(err) => {
                let _ = writeln!(out, "[ERROR] Failed to write updated profile: {err}");
            }
        }
    }

    if analysis.mode == AnalysisMode::Relative && !analysis.in_bounds {
        let _ = write!(
            out,
            "[WARNING] '{name}' at 0x{:X} with size 0x{:X} runs outside the binary; nothing to show.",
            analysis.offset, analysis.size
        );
        return Ok(out);
    }

    let header = match analysis.mode {
        AnalysisMode::Absolute => format!(
            "--- Contents of '{name}' (Offset: 0x{:X}, Size: {} bytes) ---",
            analysis.offset, analysis.size
        ),
        AnalysisMode::Relative => format!(
            "--- Contents of '{name}' (Resolved Offset: 0x{:X}, Size (from binary): {:X} bytes) ---",
            analysis.offset, analysis.size
        ),
        AnalysisMode::Resolved => format!(
            "--- Contents of '{name}' (Resolved Offset: 0x{:X}, Size: {} bytes) ---",
            analysis.offset, analysis.size
        ),
    };
    let dump = HexDump::new(&analysis.data, offset_u64(analysis.offset), width)?;
    let _ = write!(out, "{header}\n{dump}\n--- End of data ---");

    if !analysis.in_bounds {
        let _ = write!(
            out,
            "\n[WARNING] '{name}' (0x{:X} + {} bytes) extends past the end of the binary; output truncated.",
            analysis.offset, analysis.size
        );
    }
    Ok(out)
}

/// Manifest issues grouped under a one-line summary.
#[must_use]
pub fn manifest_report(report: &ManifestReport) -> String {
    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);
    let mut out = format!(
        "Checked {} entries: {errors} error(s), {warnings} warning(s)",
        report.entries_checked
    );
    for issue in &report.issues {
        let label = match issue.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
        };
        let _ = write!(
            out,
            "\n  [{label}] #{} {}: {}",
            issue.index,
            issue.path,
            issue.message()
        );
    }
    out
}

fn hex_or_none(value: Option<i64>) -> String {
    value.map_or_else(|| "None".to_string(), |v| format!("0x{v:X}"))
}

/// Negative offsets never reach a hexdump with data; show them as zero.
fn offset_u64(offset: i64) -> u64 {
    u64::try_from(offset).unwrap_or(0)
}
