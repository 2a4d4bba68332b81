//! PLC memory areas and the dump file naming convention.
//!
//! Dumps are named `<AreaTag>_<YYYYMMDDhhmmss>.bin`, where the tag is either
//! `ExtRAM` (external memory module) or `OnChipRAM` (internal memory). Each
//! area has a fixed dump size.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Expected size of an external RAM dump (512 KiB).
pub const EXT_RAM_SIZE: u64 = 512 * 1024;

/// Expected size of an on-chip RAM dump (128 KiB).
pub const ON_CHIP_RAM_SIZE: u64 = 128 * 1024;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

static DUMP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(ExtRAM|OnChipRAM)_([0-9]{14})\.bin$").expect("dump name pattern is valid")
});

/// A PLC memory area that can be dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryArea {
    /// The external RAM module.
    #[serde(rename = "ExtRAM")]
    ExtRam,
    /// The controller's on-chip RAM.
    #[serde(rename = "OnChipRAM")]
    OnChipRam,
}

impl MemoryArea {
    /// The tag used in dump file names.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::ExtRam => "ExtRAM",
            Self::OnChipRam => "OnChipRAM",
        }
    }

    /// The size in bytes every dump of this area should have.
    #[must_use]
    pub fn expected_size(self) -> u64 {
        match self {
            Self::ExtRam => EXT_RAM_SIZE,
            Self::OnChipRam => ON_CHIP_RAM_SIZE,
        }
    }

    /// Look up an area by its file name tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ExtRAM" => Some(Self::ExtRam),
            "OnChipRAM" => Some(Self::OnChipRam),
            _ => None,
        }
    }

    /// Whether a free-text description names the opposite area.
    ///
    /// An `ExtRAM` dump described as "on-chip", or an `OnChipRAM` dump
    /// described as "external", is contradictory.
    #[must_use]
    pub fn contradicts(self, description: &str) -> bool {
        let lower = description.to_ascii_lowercase();
        match self {
            Self::ExtRam => lower.contains("on-chip") || lower.contains("onchip"),
            Self::OnChipRam => lower.contains("external"),
        }
    }
}

impl std::fmt::Display for MemoryArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Why a file name failed the dump naming convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpNameError {
    /// The name is not `<AreaTag>_<14 digits>.bin`.
    Pattern,
    /// The 14 digits are not a real calendar date-time.
    Timestamp(String),
}

/// A parsed dump file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DumpName {
    /// Which memory area was dumped.
    pub area: MemoryArea,
    /// When the dump was taken.
    pub captured_at: NaiveDateTime,
}

impl DumpName {
    /// Parse a bare file name such as `ExtRAM_20240315093000.bin`.
    ///
    /// # Errors
    ///
    /// Returns [`DumpNameError::Pattern`] if the name does not follow the
    /// convention and [`DumpNameError::Timestamp`] if the digits are not a
    /// valid date-time.
    pub fn parse(file_name: &str) -> Result<Self, DumpNameError> {
        let caps = DUMP_NAME.captures(file_name).ok_or(DumpNameError::Pattern)?;
        let area = MemoryArea::from_tag(&caps[1]).ok_or(DumpNameError::Pattern)?;
        let digits = &caps[2];
        let captured_at = NaiveDateTime::parse_from_str(digits, TIMESTAMP_FORMAT)
            .map_err(|_| DumpNameError::Timestamp(digits.to_string()))?;
        Ok(Self { area, captured_at })
    }

    /// Parse the final component of a path.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| Self::parse(name).ok())
    }

    /// Render the canonical file name.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.bin",
            self.area.tag(),
            self.captured_at.format(TIMESTAMP_FORMAT)
        )
    }
}
