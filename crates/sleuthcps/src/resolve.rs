//! Offset resolution for profile structures.
//!
//! Absolute entries resolve to their `offset` cell. Relative entries resolve
//! their parent first, then look for a `(data pointer, size)` metadata record
//! at `parent + rOffset`. When no valid record is found there (or no image is
//! loaded) the structure is assumed to start at `parent + rOffset` itself.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::image::MemoryImage;
use crate::profile::Profile;

/// Which on-image layout a metadata record was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataLayout {
    /// 32-bit size stored in the four bytes before a 32-bit pointer.
    SizePrefixed32,
    /// 64-bit pointer followed by a 32-bit size.
    Inline64,
}

/// A decoded metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Metadata {
    /// Where the structure's data starts.
    pub data_ptr: i64,
    /// Length of the data in bytes.
    pub size: i64,
    /// How the record was laid out.
    pub layout: MetadataLayout,
}

/// Decode the metadata record at `pointer`.
///
/// The size-prefixed 32-bit layout is tried first and the inline 64-bit
/// layout second. A candidate is accepted only if its data range lies inside
/// the image.
///
/// # Errors
///
/// Returns [`Error::MetadataNotFound`] if neither layout yields a valid record.
pub fn read_metadata(image: &MemoryImage, pointer: i64) -> Result<Metadata> {
    let not_found = Error::MetadataNotFound { pointer };
    if !image.contains(pointer, 8) {
        return Err(not_found);
    }

    let data_ptr = image.read_u32_le(pointer).map(i64::from);
    // A pointer in the first four bytes has no room for a size prefix.
    let size = image.read_u32_le(pointer - 4).map_or(0, i64::from);
    if let Some(data_ptr) = data_ptr {
        if accept(image, data_ptr, size) {
            trace!("Size-prefixed metadata at 0x{pointer:X}: 0x{data_ptr:X} + {size}");
            return Ok(Metadata {
                data_ptr,
                size,
                layout: MetadataLayout::SizePrefixed32,
            });
        }
    }

    let data_ptr = image
        .read_u64_le(pointer)
        .and_then(|ptr| i64::try_from(ptr).ok());
    let size = image.read_u32_le(pointer + 8).map(i64::from);
    if let (Some(data_ptr), Some(size)) = (data_ptr, size) {
        if accept(image, data_ptr, size) {
            trace!("Inline 64-bit metadata at 0x{pointer:X}: 0x{data_ptr:X} + {size}");
            return Ok(Metadata {
                data_ptr,
                size,
                layout: MetadataLayout::Inline64,
            });
        }
    }

    Err(not_found)
}

fn accept(image: &MemoryImage, data_ptr: i64, size: i64) -> bool {
    usize::try_from(data_ptr).is_ok_and(|ptr| ptr < image.len()) && image.contains(data_ptr, size)
}

/// Caches resolved offsets and any sizes discovered along the way.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    offsets: HashMap<String, i64>,
    sizes: HashMap<String, i64>,
}

impl Resolver {
    /// Create an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the absolute offset of `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStructure`] for names missing from the profile,
    /// [`Error::CircularReference`] when parents loop, [`Error::Unlocatable`]
    /// for entries with neither placement, and [`Error::InvalidValue`] for
    /// cells that are not numbers.
    pub fn resolve(
        &mut self,
        profile: &Profile,
        image: Option<&MemoryImage>,
        name: &str,
    ) -> Result<i64> {
        let mut chain = Vec::new();
        self.resolve_chain(profile, image, name, &mut chain)
    }

    fn resolve_chain(
        &mut self,
        profile: &Profile,
        image: Option<&MemoryImage>,
        name: &str,
        chain: &mut Vec<String>,
    ) -> Result<i64> {
        if let Some(&offset) = self.offsets.get(name) {
            return Ok(offset);
        }
        if chain.iter().any(|seen| seen == name) {
            chain.push(name.to_string());
            return Err(Error::CircularReference {
                chain: chain.join(" -> "),
            });
        }
        chain.push(name.to_string());

        let entry = profile.require(name)?;

        if let Some(offset) = entry.parsed_offset()? {
            debug!("'{name}' has absolute offset 0x{offset:X}");
            self.offsets.insert(name.to_string(), offset);
            return Ok(offset);
        }

        let (Some(r_offset), Some(parent)) = (entry.parsed_r_offset()?, entry.parent()) else {
            return Err(Error::Unlocatable {
                name: name.to_string(),
            });
        };

        let parent_offset = self.resolve_chain(profile, image, parent, chain)?;
        let meta_ptr = parent_offset.saturating_add(r_offset);

        if let Some(meta) = image.and_then(|image| read_metadata(image, meta_ptr).ok()) {
            debug!(
                "'{name}' resolved through {:?} metadata at 0x{meta_ptr:X} to 0x{:X} ({} bytes)",
                meta.layout, meta.data_ptr, meta.size
            );
            self.record(name, meta.data_ptr, meta.size);
            return Ok(meta.data_ptr);
        }

        debug!("'{name}' has no metadata at 0x{meta_ptr:X}, using it as the data offset");
        self.offsets.insert(name.to_string(), meta_ptr);
        Ok(meta_ptr)
    }

    /// Resolve every entry in profile order, collecting each outcome.
    pub fn resolve_all(
        &mut self,
        profile: &Profile,
        image: Option<&MemoryImage>,
    ) -> Vec<(String, Result<i64>)> {
        profile
            .entries()
            .iter()
            .map(|entry| {
                let outcome = self.resolve(profile, image, &entry.name);
                (entry.name.clone(), outcome)
            })
            .collect()
    }

    /// The cached offset for `name`, if resolved.
    #[must_use]
    pub fn resolved_offset(&self, name: &str) -> Option<i64> {
        self.offsets.get(name).copied()
    }

    /// The size discovered for `name` while resolving, if any.
    #[must_use]
    pub fn resolved_size(&self, name: &str) -> Option<i64> {
        self.sizes.get(name).copied()
    }

    /// Store an offset and size for `name`, overriding earlier results.
    pub fn record(&mut self, name: &str, offset: i64, size: i64) {
        self.offsets.insert(name.to_string(), offset);
        self.sizes.insert(name.to_string(), size);
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.offsets.clear();
        self.sizes.clear();
    }
}
