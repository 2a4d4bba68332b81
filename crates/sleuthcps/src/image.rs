//! In-memory copies of PLC dump files.
//!
//! A [`MemoryImage`] owns the raw bytes of one dump. All offsets taken by its
//! accessors are signed, because profile arithmetic can go negative; anything
//! below zero or past the end is simply out of range.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::area::{DumpName, MemoryArea};
use crate::error::{Error, Result};

/// A memory dump loaded from disk.
#[derive(Debug, Clone)]
pub struct MemoryImage {
    path: PathBuf,
    data: Vec<u8>,
    area: Option<MemoryArea>,
}

impl MemoryImage {
    /// Read a dump file into memory.
    ///
    /// If the file name follows the dump naming convention, the memory area
    /// is recorded and a size that disagrees with the area is logged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageOpen`] if the file cannot be read.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path).map_err(|source| Error::ImageOpen {
            path: path.clone(),
            source,
        })?;
        debug!("Read {} bytes from {}", data.len(), path.display());

        let image = Self::from_bytes(path, data);
        if let Some(area) = image.area {
            if image.len() as u64 != area.expected_size() {
                warn!(
                    "{} is named as an {} dump but holds {} bytes (expected {})",
                    image.path.display(),
                    area,
                    image.len(),
                    area.expected_size()
                );
            }
        }
        Ok(image)
    }

    /// Wrap bytes that are already in memory.
    #[must_use]
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        let path = path.into();
        let area = DumpName::from_path(&path).map(|name| name.area);
        Self { path, data, area }
    }

    /// Where the image was loaded from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The memory area named by the file, if it follows the convention.
    #[must_use]
    pub fn area(&self) -> Option<MemoryArea> {
        self.area
    }

    /// Image length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the image holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// BLAKE3 digest of the image contents, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        blake3::hash(&self.data).to_hex().to_string()
    }

    /// Whether `[offset, offset + size)` lies entirely inside the image.
    #[must_use]
    pub fn contains(&self, offset: i64, size: i64) -> bool {
        self.range(offset, size).is_some()
    }

    /// Borrow `size` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] unless the whole range is inside the image.
    pub fn slice(&self, offset: i64, size: i64) -> Result<&[u8]> {
        self.range(offset, size)
            .map(|(start, end)| &self.data[start..end])
            .ok_or(Error::OutOfRange { offset, size })
    }

    /// Borrow up to `size` bytes at `offset`, trimmed to the image.
    ///
    /// Ranges that start past the end, or have a negative start or size,
    /// yield an empty slice.
    #[must_use]
    pub fn slice_clamped(&self, offset: i64, size: i64) -> &[u8] {
        let (Ok(start), Ok(size)) = (usize::try_from(offset), usize::try_from(size)) else {
            return &[];
        };
        let start = start.min(self.data.len());
        let end = start.saturating_add(size).min(self.data.len());
        &self.data[start..end]
    }

    /// Read a little-endian `u32` at `at`.
    #[must_use]
    pub fn read_u32_le(&self, at: i64) -> Option<u32> {
        let bytes = self.slice(at, 4).ok()?;
        Some(u32::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Read a little-endian `u64` at `at`.
    #[must_use]
    pub fn read_u64_le(&self, at: i64) -> Option<u64> {
        let bytes = self.slice(at, 8).ok()?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    fn range(&self, offset: i64, size: i64) -> Option<(usize, usize)> {
        let start = usize::try_from(offset).ok()?;
        let len = usize::try_from(size).ok()?;
        let end = start.checked_add(len)?;
        (end <= self.data.len()).then_some((start, end))
    }
}
