//! Structure analysis over a [`Session`].
//!
//! Two strategies locate a structure's bytes:
//!
//! - **Absolute** trusts the profile: `offset` and `size` come straight from
//!   the CSV.
//! - **Relative** trusts the image: the offset is resolved through the
//!   `rOffset` chain, the size is read from the dump, and a profile that
//!   disagrees with the dump is corrected and written back next to the
//!   original.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::profile::{write_rows, StructureEntry};
use crate::session::{write_output, Region, Session};

/// How an analysis located its structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Offset and size taken from the profile.
    Absolute,
    /// Offset resolved through parents, size read from the image.
    Relative,
    /// Offset resolved through parents, size taken from the profile.
    Resolved,
}

/// A profile correction made during relative analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    /// Where the corrected profile was written.
    pub path: PathBuf,
    /// The size the profile claimed before the correction.
    pub profile_size: Option<i64>,
    /// The offset the profile claimed before the correction.
    pub profile_offset: Option<i64>,
    /// Why the corrected profile could not be written, if it wasn't.
    pub write_error: Option<String>,
}

/// The outcome of analyzing one structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Analysis {
    /// Structure name.
    pub name: String,
    /// Strategy used.
    pub mode: AnalysisMode,
    /// Start of the structure.
    pub offset: i64,
    /// Length of the structure.
    pub size: i64,
    /// Whether `[offset, offset + size)` lies inside the image.
    pub in_bounds: bool,
    /// The bytes to display, trimmed to the image.
    #[serde(skip)]
    pub data: Vec<u8>,
    /// Set when relative analysis corrected the profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_update: Option<ProfileUpdate>,
}

impl Analysis {
    /// The analyzed byte range.
    #[must_use]
    pub fn region(&self) -> Region {
        Region {
            offset: self.offset,
            size: self.size,
        }
    }
}

impl Session {
    /// Analyze a structure using the offset and size written in the profile.
    ///
    /// A range that runs past the image is not an error; the analysis is
    /// marked out of bounds and carries whatever bytes do exist.
    ///
    /// # Errors
    ///
    /// Fails if the structure is unknown, lacks an `offset` or `size`, has
    /// non-numeric cells, or no image is loaded.
    pub fn analyze_abs(&self, name: &str) -> Result<Analysis> {
        let entry = self.require_profile()?.require(name)?;
        let offset = entry
            .parsed_offset()?
            .ok_or_else(|| Error::missing_field(name, "offset"))?;
        let size = entry
            .parsed_size()?
            .ok_or_else(|| Error::missing_field(name, "size"))?;
        let image = self.require_image()?;

        let in_bounds = image.contains(offset, size);
        if !in_bounds {
            debug!("'{name}' runs outside the image: 0x{offset:X} + {size} bytes");
        }
        Ok(Analysis {
            name: name.to_string(),
            mode: AnalysisMode::Absolute,
            offset,
            size,
            in_bounds,
            data: image.slice_clamped(offset, size).to_vec(),
            profile_update: None,
        })
    }

    /// Analyze a structure by resolving it against the image.
    ///
    /// The offset comes from the resolver. If resolution discovered a size in
    /// a metadata record, that size is used. Otherwise the size is the `u32`
    /// stored just before the resolved offset, and the `u32` at the offset is
    /// taken as the real data pointer.
    ///
    /// When the profile's `offset` or `size` differs from what the image says,
    /// the entry is corrected and the whole profile is written to its updated
    /// path, which then becomes the session's profile path.
    ///
    /// # Errors
    ///
    /// Fails if no image is loaded, the structure is unknown or cannot be
    /// resolved, or its size prefix lies outside the image.
    pub fn analyze_rel(&mut self, name: &str) -> Result<Analysis> {
        let image = self.image.as_ref().ok_or(Error::NoImageLoaded)?;
        let profile = self.profile.as_ref().ok_or(Error::NoProfileLoaded)?;
        profile.require(name)?;

        let mut offset = self.resolver.resolve(profile, Some(image), name)?;
        let size = if let Some(size) = self.resolver.resolved_size(name) {
            size
        } else {
            let unreadable = |pointer| Error::SizeUnreadable {
                name: name.to_string(),
                pointer,
            };
            let size_ptr = offset.checked_sub(4).ok_or_else(|| unreadable(offset))?;
            let size = image
                .read_u32_le(size_ptr)
                .map(i64::from)
                .ok_or_else(|| unreadable(size_ptr))?;
            if let Some(pointer) = image.read_u32_le(offset) {
                debug!("'{name}' dereferenced 0x{offset:X} -> 0x{pointer:X}");
                offset = i64::from(pointer);
                self.resolver.record(name, offset, size);
            }
            size
        };

        let profile_update = self.reconcile_profile(name, offset, size);

        let image = self.require_image()?;
        let in_bounds = image.contains(offset, size);
        let data = if in_bounds {
            image.slice_clamped(offset, size).to_vec()
        } else {
            debug!("'{name}' runs outside the image: 0x{offset:X} + 0x{size:X} bytes");
            Vec::new()
        };

        Ok(Analysis {
            name: name.to_string(),
            mode: AnalysisMode::Relative,
            offset,
            size,
            in_bounds,
            data,
            profile_update,
        })
    }

    /// Bring the profile entry for `name` in line with the image.
    ///
    /// The correction is made on a copy, which replaces the session's
    /// profile only once it has been written.
    fn reconcile_profile(&mut self, name: &str, offset: i64, size: i64) -> Option<ProfileUpdate> {
        let current = self.profile.as_mut()?;
        let entry = current.get(name)?;

        let (profile_size, profile_offset) = match (entry.parsed_size(), entry.parsed_offset()) {
            (Ok(size), Ok(offset)) => (size, offset),
            _ => (None, None),
        };
        if profile_size == Some(size) && profile_offset == Some(offset) {
            return None;
        }

        debug!(
            "Profile disagrees with image for '{name}': profile={profile_size:?} binary={size}"
        );
        let mut updated = current.clone();
        let entry = updated.get_mut(name)?;
        entry.size = format!("0x{size:X}");
        entry.offset = format!("0x{offset:X}");

        // Keep rewriting the same file instead of stacking suffixes.
        let suffix = &self.updated_suffix;
        let path = match current.path() {
            Some(path) if path.as_os_str().to_string_lossy().ends_with(suffix.as_str()) => {
                path.to_path_buf()
            }
            _ => current.updated_path(suffix),
        };
        let write_error = match updated.write(&path) {
            Ok(()) => {
                updated.set_path(&path);
                *current = updated;
                None
            }
            Err(err) => {
                warn!("Failed to write updated profile: {err}");
                Some(err.to_string())
            }
        };

        Some(ProfileUpdate {
            path,
            profile_size,
            profile_offset,
            write_error,
        })
    }

    /// Show a structure at its resolved offset with the size from the profile.
    ///
    /// # Errors
    ///
    /// Fails if no image is loaded, the structure cannot be resolved, or its
    /// `size` is missing or not a number.
    pub fn view(&mut self, name: &str) -> Result<Analysis> {
        let (offset, size) = self.locate_with_profile_size(name)?;
        let image = self.require_image()?;
        Ok(Analysis {
            name: name.to_string(),
            mode: AnalysisMode::Resolved,
            offset,
            size,
            in_bounds: image.contains(offset, size),
            data: image.slice_clamped(offset, size).to_vec(),
            profile_update: None,
        })
    }

    /// Write a structure's bytes to `output`, or `<name>.bin` in the output
    /// directory. Returns the written path and byte count.
    ///
    /// Bytes past the end of the image are not written.
    ///
    /// # Errors
    ///
    /// Fails like [`Session::view`], or if the file cannot be written.
    pub fn dump(&mut self, name: &str, output: Option<&Path>) -> Result<(PathBuf, usize)> {
        let (offset, size) = self.locate_with_profile_size(name)?;
        let path = output.map_or_else(
            || self.output_dir().join(format!("{name}.bin")),
            Path::to_path_buf,
        );
        let data = self.require_image()?.slice_clamped(offset, size);
        let written = data.len();
        write_output(&path, data)?;
        Ok((self.record_output(path), written))
    }

    fn locate_with_profile_size(&mut self, name: &str) -> Result<(i64, i64)> {
        let image = self.image.as_ref().ok_or(Error::NoImageLoaded)?;
        let profile = self.profile.as_ref().ok_or(Error::NoProfileLoaded)?;
        let offset = self.resolver.resolve(profile, Some(image), name)?;
        let size = profile
            .require(name)?
            .parsed_size()?
            .ok_or_else(|| Error::missing_field(name, "size"))?;
        Ok((offset, size))
    }

    /// Write a copy of the profile with every `offset` replaced by its
    /// resolved value in `0x` notation.
    ///
    /// # Errors
    ///
    /// Returns the first resolution failure, or a write error.
    pub fn write_resolved(&mut self, path: &Path) -> Result<PathBuf> {
        let profile = self.profile.as_ref().ok_or(Error::NoProfileLoaded)?;
        let mut rows = Vec::with_capacity(profile.len());
        for entry in profile.entries() {
            let offset = self.resolver.resolve(profile, self.image.as_ref(), &entry.name)?;
            rows.push(StructureEntry {
                offset: format!("0x{offset:X}"),
                ..entry.clone()
            });
        }

        let mut buffer = Vec::new();
        write_rows(&mut buffer, rows.iter())?;
        write_output(path, &buffer)?;
        Ok(self.record_output(path.to_path_buf()))
    }
}
