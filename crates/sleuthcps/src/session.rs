//! Investigation state shared by the shell and the one-shot commands.
//!
//! A [`Session`] holds at most one profile and one image, the resolver cache
//! built from them, and the list of files it has written.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::area::MemoryArea;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::image::MemoryImage;
use crate::profile::Profile;
use crate::resolve::Resolver;

/// A byte range inside the loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    /// First byte.
    pub offset: i64,
    /// Length in bytes.
    pub size: i64,
}

/// One row of a structure listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedStructure {
    /// Structure name.
    pub name: String,
    /// Resolved offset, or `None` when resolution failed.
    pub offset: Option<i64>,
    /// The raw `size` cell.
    pub size: String,
}

/// Details of the loaded image for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageStatus {
    /// Where the image was loaded from.
    pub path: PathBuf,
    /// Length in bytes.
    pub size: usize,
    /// Memory area named by the file, if any.
    pub area: Option<MemoryArea>,
    /// BLAKE3 digest of the contents.
    pub fingerprint: String,
}

/// Snapshot of what the session has loaded and produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Path of the loaded profile.
    pub profile: Option<PathBuf>,
    /// Number of profile entries.
    pub profile_entries: usize,
    /// The loaded image.
    pub image: Option<ImageStatus>,
    /// Files written during this session.
    pub outputs: Vec<PathBuf>,
}

/// The working state of an investigation.
#[derive(Debug)]
pub struct Session {
    pub(crate) profile: Option<Profile>,
    pub(crate) image: Option<MemoryImage>,
    pub(crate) resolver: Resolver,
    outputs: Vec<PathBuf>,
    output_dir: PathBuf,
    pub(crate) updated_suffix: String,
}

impl Session {
    /// Create an empty session using the output settings from `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            profile: None,
            image: None,
            resolver: Resolver::new(),
            outputs: Vec::new(),
            output_dir: config.output_dir(),
            updated_suffix: config.output.updated_profile_suffix.clone(),
        }
    }

    /// Load a CSV profile, replacing the current one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileRead`] if the profile cannot be loaded. The
    /// current profile is kept in that case.
    pub fn load_profile(&mut self, path: impl AsRef<Path>) -> Result<&Profile> {
        let profile = Profile::load(path)?;
        info!(
            "Loaded CSV profile {} ({} entries)",
            profile.path().map(|p| p.display().to_string()).unwrap_or_default(),
            profile.len()
        );
        self.resolver.clear();
        Ok(self.profile.insert(profile))
    }

    /// Install an already-built profile.
    pub fn set_profile(&mut self, profile: Profile) {
        self.resolver.clear();
        self.profile = Some(profile);
    }

    /// Load a memory image, replacing the current one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageOpen`] if the file cannot be read. The current
    /// image is kept in that case.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> Result<&MemoryImage> {
        let image = MemoryImage::open(path)?;
        info!("Loaded binary {} ({} bytes)", image.path().display(), image.len());
        self.resolver.clear();
        Ok(self.image.insert(image))
    }

    /// Install an already-built image.
    pub fn set_image(&mut self, image: MemoryImage) {
        self.resolver.clear();
        self.image = Some(image);
    }

    /// The loaded profile.
    #[must_use]
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// The loaded image.
    #[must_use]
    pub fn image(&self) -> Option<&MemoryImage> {
        self.image.as_ref()
    }

    /// Files written so far, in order.
    #[must_use]
    pub fn outputs(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Directory that generated files are written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Change the directory generated files are written to.
    pub fn set_output_dir(&mut self, dir: impl Into<PathBuf>) {
        self.output_dir = dir.into();
    }

    pub(crate) fn require_profile(&self) -> Result<&Profile> {
        self.profile.as_ref().ok_or(Error::NoProfileLoaded)
    }

    pub(crate) fn require_image(&self) -> Result<&MemoryImage> {
        self.image.as_ref().ok_or(Error::NoImageLoaded)
    }

    /// Summarize the session.
    #[must_use]
    pub fn status(&self) -> Status {
        Status {
            profile: self.profile.as_ref().and_then(|p| p.path().map(Path::to_path_buf)),
            profile_entries: self.profile.as_ref().map_or(0, Profile::len),
            image: self.image.as_ref().map(|image| ImageStatus {
                path: image.path().to_path_buf(),
                size: image.len(),
                area: image.area(),
                fingerprint: image.fingerprint(),
            }),
            outputs: self.outputs.clone(),
        }
    }

    /// Resolve every structure from scratch.
    ///
    /// Entries that fail to resolve are listed with no offset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoProfileLoaded`] if there is no profile.
    pub fn list(&mut self) -> Result<Vec<ListedStructure>> {
        let profile = self.profile.as_ref().ok_or(Error::NoProfileLoaded)?;
        self.resolver.clear();
        let outcomes = self.resolver.resolve_all(profile, self.image.as_ref());

        Ok(outcomes
            .into_iter()
            .zip(profile.entries())
            .map(|((name, outcome), entry)| {
                if let Err(err) = &outcome {
                    debug!("Could not resolve '{name}': {err}");
                }
                ListedStructure {
                    name,
                    offset: outcome.ok(),
                    size: entry.size.clone(),
                }
            })
            .collect())
    }

    /// Validate a raw byte range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoImageLoaded`] without an image and
    /// [`Error::OutOfRange`] if the range is not fully inside it.
    pub fn hex(&self, offset: i64, size: i64) -> Result<Region> {
        self.require_image()?.slice(offset, size)?;
        Ok(Region { offset, size })
    }

    /// Bytes of a region, trimmed to the image.
    #[must_use]
    pub fn bytes(&self, region: Region) -> &[u8] {
        self.image
            .as_ref()
            .map(|image| image.slice_clamped(region.offset, region.size))
            .unwrap_or_default()
    }

    /// Write a region to `<name>_<offset>_<size>.img` in the output directory.
    ///
    /// Unnamed regions use `unknown` as their name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfRange`] if the region is not fully inside the
    /// image, or an I/O error if the file cannot be written.
    pub fn extract(&mut self, region: Region, name: Option<&str>) -> Result<PathBuf> {
        let data = self.require_image()?.slice(region.offset, region.size)?;
        let file_name = format!(
            "{}_{}_{}.img",
            name.unwrap_or("unknown"),
            region.offset,
            region.size
        );
        let path = self.output_dir.join(file_name);
        write_output(&path, data)?;
        Ok(self.record_output(path))
    }

    pub(crate) fn record_output(&mut self, path: PathBuf) -> PathBuf {
        let path = std::fs::canonicalize(&path).unwrap_or(path);
        info!("Wrote {}", path.display());
        self.outputs.push(path.clone());
        path
    }
}

/// Write `data` to `path`, creating the parent directory when needed.
pub(crate) fn write_output(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    std::fs::write(path, data).map_err(|source| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    })
}
