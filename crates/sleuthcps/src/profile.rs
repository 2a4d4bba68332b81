//! CSV structure profiles.
//!
//! A profile names the structures of interest inside a dump. Each row carries
//! `name, offset, size, rOffset, parent`; a structure is placed either by an
//! absolute `offset` or by an `rOffset` relative to its `parent`. Cells are
//! kept as the raw text from the file so that rewriting a profile preserves
//! whatever notation the author used.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::numeric::parse_number;

/// File name used when a profile without a path has to be written back.
pub const FALLBACK_UPDATED_PROFILE: &str = "profile_updated.csv";

/// One row of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureEntry {
    /// Unique structure name.
    pub name: String,
    /// Absolute offset into the image.
    pub offset: String,
    /// Structure size in bytes.
    pub size: String,
    /// Offset of this structure's metadata relative to its parent.
    #[serde(rename = "rOffset")]
    pub r_offset: String,
    /// Name of the structure `rOffset` is relative to.
    pub parent: String,
}

fn non_empty(cell: &str) -> Option<&str> {
    (!cell.is_empty()).then_some(cell)
}

impl StructureEntry {
    /// Create an entry placed at an absolute offset.
    #[must_use]
    pub fn absolute(name: impl Into<String>, offset: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offset: offset.into(),
            size: size.into(),
            ..Self::default()
        }
    }

    /// Create an entry placed relative to a parent.
    #[must_use]
    pub fn relative(
        name: impl Into<String>,
        r_offset: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            r_offset: r_offset.into(),
            parent: parent.into(),
            ..Self::default()
        }
    }

    /// The `offset` cell, if set.
    #[must_use]
    pub fn offset(&self) -> Option<&str> {
        non_empty(&self.offset)
    }

    /// The `size` cell, if set.
    #[must_use]
    pub fn size(&self) -> Option<&str> {
        non_empty(&self.size)
    }

    /// The `rOffset` cell, if set.
    #[must_use]
    pub fn r_offset(&self) -> Option<&str> {
        non_empty(&self.r_offset)
    }

    /// The `parent` cell, if set.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        non_empty(&self.parent)
    }

    /// The `offset` cell as a number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the cell is set but not a number.
    pub fn parsed_offset(&self) -> Result<Option<i64>> {
        self.parse_cell("offset", self.offset())
    }

    /// The `size` cell as a number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the cell is set but not a number.
    pub fn parsed_size(&self) -> Result<Option<i64>> {
        self.parse_cell("size", self.size())
    }

    /// The `rOffset` cell as a number.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] if the cell is set but not a number.
    pub fn parsed_r_offset(&self) -> Result<Option<i64>> {
        self.parse_cell("rOffset", self.r_offset())
    }

    fn parse_cell(&self, field: &'static str, cell: Option<&str>) -> Result<Option<i64>> {
        cell.map(|text| {
            parse_number(text).map_err(|_| Error::invalid_value(&self.name, field, text))
        })
        .transpose()
    }
}

/// An ordered set of structure entries keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    path: Option<PathBuf>,
    entries: Vec<StructureEntry>,
    index: HashMap<String, usize>,
}

impl Profile {
    /// Load a profile from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileRead`] if the file cannot be opened or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path).map_err(|source| Error::ProfileRead {
            path: path.clone(),
            source: source.into(),
        })?;
        let mut profile = Self::from_reader(file, &path)?;
        debug!("Loaded profile {} with {} entries", path.display(), profile.len());
        profile.path = Some(path);
        Ok(profile)
    }

    /// Parse a profile from any reader. `origin` is only used in errors.
    ///
    /// Header names and cells are trimmed, rows without a name are skipped and
    /// a repeated name replaces the earlier row in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileRead`] if the CSV is malformed.
    pub fn from_reader<R: Read>(reader: R, origin: &Path) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut profile = Self::default();
        for row in csv_reader.deserialize::<StructureEntry>() {
            let entry = row.map_err(|source| Error::ProfileRead {
                path: origin.to_path_buf(),
                source,
            })?;
            if entry.name.is_empty() {
                continue;
            }
            profile.insert(entry);
        }
        Ok(profile)
    }

    /// Build an in-memory profile.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = StructureEntry>) -> Self {
        let mut profile = Self::default();
        for entry in entries {
            profile.insert(entry);
        }
        profile
    }

    /// Add an entry, replacing any existing entry with the same name.
    pub fn insert(&mut self, entry: StructureEntry) {
        if let Some(&slot) = self.index.get(&entry.name) {
            self.entries[slot] = entry;
        } else {
            self.index.insert(entry.name.clone(), self.entries.len());
            self.entries.push(entry);
        }
    }

    /// Look up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StructureEntry> {
        self.index.get(name).map(|&slot| &self.entries[slot])
    }

    /// Look up an entry by name for modification.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut StructureEntry> {
        self.index.get(name).map(|&slot| &mut self.entries[slot])
    }

    /// Look up an entry, failing if it is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStructure`] if no entry has this name.
    pub fn require(&self, name: &str) -> Result<&StructureEntry> {
        self.get(name).ok_or_else(|| Error::unknown_structure(name))
    }

    /// Whether an entry with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Entries in file order.
    #[must_use]
    pub fn entries(&self) -> &[StructureEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the profile has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The file this profile was loaded from or last written to.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a new backing file.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    /// Where a corrected copy of this profile should be written.
    #[must_use]
    pub fn updated_path(&self, suffix: &str) -> PathBuf {
        match &self.path {
            Some(path) => {
                let mut name = path.as_os_str().to_owned();
                name.push(suffix);
                PathBuf::from(name)
            }
            None => PathBuf::from(FALLBACK_UPDATED_PROFILE),
        }
    }

    /// Write the profile as CSV to a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileWrite`] if the file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path).map_err(|source| Error::ProfileWrite {
            path: path.to_path_buf(),
            source: source.into(),
        })?;
        self.write_to(file).map_err(|err| match err {
            Error::ProfileWrite { source, .. } => Error::ProfileWrite {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    /// Write the profile as CSV with a `name,offset,size,rOffset,parent` header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProfileWrite`] if serialization or the writer fails.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        write_rows(writer, self.entries.iter())
    }
}

/// Serialize rows with the standard profile header.
pub(crate) fn write_rows<'a, W: Write>(
    writer: W,
    rows: impl Iterator<Item = &'a StructureEntry>,
) -> Result<()> {
    let to_error = |source| Error::ProfileWrite {
        path: PathBuf::new(),
        source,
    };
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row).map_err(to_error)?;
    }
    csv_writer
        .flush()
        .map_err(|source| to_error(source.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
name , offset, size ,rOffset, parent
header, 0x0, 0x20,,
tags,,,0x10,header
 , 0x40, 4,,
config, 0x100, 64, ,
";

    fn sample() -> Profile {
        Profile::from_reader(SAMPLE.as_bytes(), Path::new("sample.csv")).unwrap()
    }

    #[test]
    fn test_parse_trims_and_skips_unnamed() {
        let profile = sample();
        assert_eq!(profile.len(), 3);
        let names: Vec<&str> = profile.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["header", "tags", "config"]);

        let header = profile.get("header").unwrap();
        assert_eq!(header.offset(), Some("0x0"));
        assert_eq!(header.size(), Some("0x20"));
        assert_eq!(header.r_offset(), None);
    }

    #[test]
    fn test_relative_entry_fields() {
        let profile = sample();
        let tags = profile.get("tags").unwrap();
        assert_eq!(tags.offset(), None);
        assert_eq!(tags.r_offset(), Some("0x10"));
        assert_eq!(tags.parent(), Some("header"));
        assert_eq!(tags.parsed_r_offset().unwrap(), Some(16));
    }

    #[test]
    fn test_missing_and_extra_columns() {
        let csv = "name,size,comment\nblob,12,scratch area\n";
        let profile = Profile::from_reader(csv.as_bytes(), Path::new("x.csv")).unwrap();
        let blob = profile.get("blob").unwrap();
        assert_eq!(blob.size(), Some("12"));
        assert_eq!(blob.offset(), None);
        assert_eq!(blob.parent(), None);
    }

    #[test]
    fn test_duplicate_name_replaces_in_place() {
        let csv = "name,offset,size\na,0,1\nb,1,1\na,8,2\n";
        let profile = Profile::from_reader(csv.as_bytes(), Path::new("x.csv")).unwrap();
        assert_eq!(profile.len(), 2);
        assert_eq!(profile.entries()[0].name, "a");
        assert_eq!(profile.entries()[0].offset, "8");
    }

    #[test]
    fn test_parsed_values() {
        let entry = StructureEntry::absolute("x", "0x40", "16");
        assert_eq!(entry.parsed_offset().unwrap(), Some(0x40));
        assert_eq!(entry.parsed_size().unwrap(), Some(16));

        let bad = StructureEntry::absolute("x", "forty", "16");
        let err = bad.parsed_offset().unwrap_err();
        assert!(matches!(err, Error::InvalidValue { field: "offset", .. }));
    }

    #[test]
    fn test_require_unknown() {
        let profile = sample();
        assert!(profile.require("header").is_ok());
        assert!(matches!(
            profile.require("nope"),
            Err(Error::UnknownStructure { .. })
        ));
    }

    #[test]
    fn test_updated_path() {
        let mut profile = sample();
        assert_eq!(
            profile.updated_path("_updated.csv"),
            PathBuf::from(FALLBACK_UPDATED_PROFILE)
        );
        profile.set_path("/cases/plc.csv");
        assert_eq!(
            profile.updated_path("_updated.csv"),
            PathBuf::from("/cases/plc.csv_updated.csv")
        );
    }

    #[test]
    fn test_write_to_header_and_rows() {
        let profile = Profile::from_entries([
            StructureEntry::absolute("header", "0x0", "0x20"),
            StructureEntry::relative("tags", "0x10", "header"),
        ]);
        let mut out = Vec::new();
        profile.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "name,offset,size,rOffset,parent\nheader,0x0,0x20,,\ntags,,,0x10,header\n"
        );
    }

    #[test]
    fn test_write_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profile.csv");
        let profile = sample();
        profile.write(&path).unwrap();

        let reloaded = Profile::load(&path).unwrap();
        assert_eq!(reloaded.entries(), profile.entries());
        assert_eq!(reloaded.path(), Some(path.as_path()));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Profile::load("/nonexistent/profile.csv").unwrap_err();
        assert!(matches!(err, Error::ProfileRead { .. }));
    }
}
