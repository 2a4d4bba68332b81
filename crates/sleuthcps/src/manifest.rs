//! Evidence manifest checking.
//!
//! Challenge documents list their artifacts in a Markdown table:
//!
//! ```text
//! | # | Description                    | Path                              | SHA-256 |
//! |---|--------------------------------|-----------------------------------|---------|
//! | 1 | PLC's external RAM image dump  | `PLC/ExtRAM_20240315093000.bin`   | `ab12…` |
//! ```
//!
//! [`Manifest::check`] validates the table on its own; [`Manifest::verify`]
//! additionally compares it with the files on disk.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::area::{DumpName, DumpNameError};
use crate::error::{Error, Result};

/// Length of a hex-encoded SHA-256 digest.
const DIGEST_HEX_LEN: usize = 64;

/// One artifact row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// Ordinal from the first column.
    pub index: u32,
    /// Human-readable label.
    pub description: String,
    /// Path relative to the evidence root.
    pub path: String,
    /// Expected digest as written.
    pub hash: String,
    /// 1-based line in the source document.
    pub line: usize,
}

impl ManifestEntry {
    fn file_name(&self) -> &str {
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }
}

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Worth a look, not necessarily wrong.
    Warning,
    /// The manifest or the evidence is inconsistent.
    Error,
}

/// What is wrong with an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IssueKind {
    /// The path appears on an earlier row.
    DuplicatePath {
        /// Index of the first row with this path.
        first_index: u32,
    },
    /// The hash is not 64 hex characters.
    MalformedHash,
    /// A `.bin` file that does not follow `<AreaTag>_<YYYYMMDDhhmmss>.bin`.
    UnrecognizedDumpName,
    /// The timestamp digits are not a real date-time.
    InvalidTimestamp {
        /// The offending digits.
        digits: String,
    },
    /// The description names the other memory area.
    DescriptionMismatch,
    /// The file does not exist under the evidence root.
    MissingFile,
    /// The dump's size does not match its memory area.
    SizeMismatch {
        /// Size the area requires.
        expected: u64,
        /// Size on disk.
        actual: u64,
    },
    /// The file's SHA-256 differs from the manifest.
    HashMismatch {
        /// Digest computed from the file.
        actual: String,
    },
}

impl IssueKind {
    /// Severity of this kind of issue.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::UnrecognizedDumpName | Self::DescriptionMismatch => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// A problem found on one manifest row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Row index.
    pub index: u32,
    /// Row path.
    pub path: String,
    /// Severity of the problem.
    pub severity: Severity,
    /// The problem.
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl Issue {
    fn new(entry: &ManifestEntry, kind: IssueKind) -> Self {
        Self {
            index: entry.index,
            path: entry.path.clone(),
            severity: kind.severity(),
            kind,
        }
    }

    /// A one-line explanation.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.kind {
            IssueKind::DuplicatePath { first_index } => {
                format!("path already listed as item {first_index}")
            }
            IssueKind::MalformedHash => "hash is not a 64-character hex digest".to_string(),
            IssueKind::UnrecognizedDumpName => {
                "file name does not follow <AreaTag>_<YYYYMMDDhhmmss>.bin".to_string()
            }
            IssueKind::InvalidTimestamp { digits } => {
                format!("timestamp {digits} is not a valid date-time")
            }
            IssueKind::DescriptionMismatch => {
                "description names a different memory area than the file name".to_string()
            }
            IssueKind::MissingFile => "file not found".to_string(),
            IssueKind::SizeMismatch { expected, actual } => {
                format!("size {actual} bytes, expected {expected}")
            }
            IssueKind::HashMismatch { actual } => format!("SHA-256 is {actual}"),
        }
    }
}

/// The outcome of checking a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManifestReport {
    /// Rows examined.
    pub entries_checked: usize,
    /// Problems found, in row order.
    pub issues: Vec<Issue>,
}

impl ManifestReport {
    /// Whether any issue is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Number of issues with the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Process status for a check: failure if any issue is an error.
    /// Warnings alone still succeed.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.has_errors() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    }
}

/// Options for [`Manifest::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckOptions {
    /// Report descriptions that contradict the dump's area.
    pub check_descriptions: bool,
    /// Compute SHA-256 of every file.
    pub verify_hashes: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            check_descriptions: true,
            verify_hashes: true,
        }
    }
}

/// A parsed artifact manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    source: Option<PathBuf>,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Read and parse a manifest document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileRead`] if the file cannot be read, or a parse
    /// error as for [`Manifest::parse`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut manifest = Self::parse_named(&text, &path.display().to_string())?;
        manifest.source = Some(path.to_path_buf());
        Ok(manifest)
    }

    /// Parse the artifact table out of a Markdown document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ManifestParse`] for a numbered row with too few
    /// columns and [`Error::ManifestEmpty`] when no rows are found.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_named(text, "manifest")
    }

    fn parse_named(text: &str, source_name: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line_no = i + 1;
            let Some(cells) = table_cells(line) else {
                continue;
            };
            if cells.iter().all(|c| is_separator(c)) {
                continue;
            }
            let Ok(index) = clean(cells[0]).parse::<u32>() else {
                // Header rows and unrelated tables.
                continue;
            };
            if cells.len() < 4 {
                return Err(Error::manifest_parse(
                    line_no,
                    format!("expected 4 columns, found {}", cells.len()),
                ));
            }
            entries.push(ManifestEntry {
                index,
                description: clean(cells[1]),
                path: clean(cells[2]),
                hash: clean(cells[3]),
                line: line_no,
            });
        }

        if entries.is_empty() {
            return Err(Error::ManifestEmpty {
                source_name: source_name.to_string(),
            });
        }
        debug!("Parsed {} manifest rows from {source_name}", entries.len());
        Ok(Self {
            source: None,
            entries,
        })
    }

    /// The rows in document order.
    #[must_use]
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Where the manifest was loaded from.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Check the table itself: unique paths, digest format, dump names and
    /// descriptions.
    #[must_use]
    pub fn check(&self, options: CheckOptions) -> ManifestReport {
        let mut issues = Vec::new();
        let mut seen: HashMap<&str, u32> = HashMap::new();

        for entry in &self.entries {
            if let Some(&first_index) = seen.get(entry.path.as_str()) {
                issues.push(Issue::new(entry, IssueKind::DuplicatePath { first_index }));
            } else {
                seen.insert(entry.path.as_str(), entry.index);
            }

            if !is_digest(&entry.hash) {
                issues.push(Issue::new(entry, IssueKind::MalformedHash));
            }

            let file_name = entry.file_name();
            if !has_bin_extension(file_name) {
                continue;
            }
            match DumpName::parse(file_name) {
                Ok(dump) => {
                    if options.check_descriptions && dump.area.contradicts(&entry.description) {
                        issues.push(Issue::new(entry, IssueKind::DescriptionMismatch));
                    }
                }
                Err(DumpNameError::Timestamp(digits)) => {
                    issues.push(Issue::new(entry, IssueKind::InvalidTimestamp { digits }));
                }
                Err(DumpNameError::Pattern) => {
                    issues.push(Issue::new(entry, IssueKind::UnrecognizedDumpName));
                }
            }
        }

        ManifestReport {
            entries_checked: self.entries.len(),
            issues,
        }
    }

    /// Check the table and compare it with the files under `root`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileRead`] if an existing file cannot be hashed.
    pub fn verify(&self, root: &Path, options: CheckOptions) -> Result<ManifestReport> {
        let mut report = self.check(options);

        for entry in &self.entries {
            let path = root.join(&entry.path);
            let metadata = match std::fs::metadata(&path) {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => {
                    report.issues.push(Issue::new(entry, IssueKind::MissingFile));
                    continue;
                }
            };

            if let Ok(dump) = DumpName::parse(entry.file_name()) {
                let expected = dump.area.expected_size();
                if metadata.len() != expected {
                    report.issues.push(Issue::new(
                        entry,
                        IssueKind::SizeMismatch {
                            expected,
                            actual: metadata.len(),
                        },
                    ));
                }
            }

            if options.verify_hashes && is_digest(&entry.hash) {
                let actual = sha256_file(&path)?;
                if !actual.eq_ignore_ascii_case(&entry.hash) {
                    report
                        .issues
                        .push(Issue::new(entry, IssueKind::HashMismatch { actual }));
                }
            }
        }

        report.issues.sort_by_key(|issue| issue.index);
        Ok(report)
    }
}

/// Split a Markdown table row into trimmed cells.
fn table_cells(line: &str) -> Option<Vec<&str>> {
    let line = line.trim();
    let inner = line.strip_prefix('|')?;
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    Some(inner.split('|').map(str::trim).collect())
}

fn is_separator(cell: &str) -> bool {
    let body = cell.trim_matches(':');
    !body.is_empty() && body.bytes().all(|b| b == b'-')
}

/// Strip code spans and unwrap `[text](target)` links.
fn clean(cell: &str) -> String {
    let cell = cell.trim().trim_matches('`').trim();
    if let (Some(open), true) = (cell.find("]("), cell.ends_with(')')) {
        if cell.starts_with('[') {
            return cell[open + 2..cell.len() - 1].trim().to_string();
        }
    }
    cell.to_string()
}

fn is_digest(hash: &str) -> bool {
    hash.len() == DIGEST_HEX_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit())
}

fn has_bin_extension(file_name: &str) -> bool {
    Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("bin"))
}

/// Hex-encoded SHA-256 of a file, read in chunks.
fn sha256_file(path: &Path) -> Result<String> {
    let read_error = |source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    };
    let mut file = std::fs::File::open(path).map_err(read_error)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).map_err(read_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}
