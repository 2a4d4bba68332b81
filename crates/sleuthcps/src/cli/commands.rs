//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::hexdump::check_width;

/// Interactive shell arguments.
#[derive(Debug, Default, Args)]
pub struct ShellCommand {
    /// Preload a CSV structure profile
    #[arg(short, long, value_name = "CSV")]
    pub profile: Option<PathBuf>,

    /// Preload a memory image
    #[arg(short, long, value_name = "BIN")]
    pub image: Option<PathBuf>,

    /// Do not print the ASCII banner
    #[arg(long)]
    pub no_banner: bool,
}

/// Show the rows of a profile.
#[derive(Debug, Args)]
pub struct ShowCommand {
    /// CSV structure profile
    #[arg(short, long, value_name = "CSV")]
    pub profile: PathBuf,
}

/// List every structure with its resolved offset.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// CSV structure profile
    #[arg(short, long, value_name = "CSV")]
    pub profile: PathBuf,

    /// Memory image used to follow metadata pointers
    #[arg(short, long, value_name = "BIN")]
    pub image: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Hexdump a raw byte range.
#[derive(Debug, Args)]
pub struct HexCommand {
    /// Memory image
    #[arg(short, long, value_name = "BIN")]
    pub image: PathBuf,

    /// Start offset (decimal, 0x, 0o or 0b)
    pub offset: String,

    /// Number of bytes
    pub size: String,

    /// Bytes per line (1-64)
    #[arg(short, long, value_parser = parse_width)]
    pub width: Option<usize>,

    /// Also write the bytes to an .img file
    #[arg(short, long)]
    pub extract: bool,
}

/// How `analyze` locates a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AnalyzeMode {
    /// Offset and size from the profile
    #[default]
    Abs,
    /// Resolve through parents and read the size from the image
    Rel,
}

/// Analyze one structure.
#[derive(Debug, Args)]
pub struct AnalyzeCommand {
    /// Structure name
    pub name: String,

    /// CSV structure profile
    #[arg(short, long, value_name = "CSV")]
    pub profile: PathBuf,

    /// Memory image
    #[arg(short, long, value_name = "BIN")]
    pub image: PathBuf,

    /// Location strategy
    #[arg(short, long, value_enum, default_value = "abs")]
    pub mode: AnalyzeMode,

    /// Bytes per line (1-64)
    #[arg(short, long, value_parser = parse_width)]
    pub width: Option<usize>,

    /// Also write the bytes to an .img file
    #[arg(short, long)]
    pub extract: bool,

    /// Output as JSON (no hexdump)
    #[arg(short, long)]
    pub json: bool,
}

/// Show a structure at its resolved offset with the profile's size.
#[derive(Debug, Args)]
pub struct ViewCommand {
    /// Structure name
    pub name: String,

    /// CSV structure profile
    #[arg(short, long, value_name = "CSV")]
    pub profile: PathBuf,

    /// Memory image
    #[arg(short, long, value_name = "BIN")]
    pub image: PathBuf,

    /// Bytes per line (1-64)
    #[arg(short, long, value_parser = parse_width)]
    pub width: Option<usize>,
}

/// Write a structure's bytes to a file.
#[derive(Debug, Args)]
pub struct DumpCommand {
    /// Structure name
    pub name: String,

    /// CSV structure profile
    #[arg(short, long, value_name = "CSV")]
    pub profile: PathBuf,

    /// Memory image
    #[arg(short, long, value_name = "BIN")]
    pub image: PathBuf,

    /// Output file (defaults to <name>.bin in the output directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Write a profile with every offset resolved.
#[derive(Debug, Args)]
pub struct ResolveCommand {
    /// CSV structure profile
    #[arg(short, long, value_name = "CSV")]
    pub profile: PathBuf,

    /// Memory image used to follow metadata pointers
    #[arg(short, long, value_name = "BIN")]
    pub image: Option<PathBuf>,

    /// Where to write the resolved CSV
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

/// Manifest commands.
#[derive(Debug, Subcommand)]
pub enum ManifestCommand {
    /// Check an artifact manifest and, optionally, the files it lists
    Check {
        /// Markdown document containing the artifact table
        file: PathBuf,

        /// Directory the artifact paths are relative to; enables file checks
        #[arg(short, long, value_name = "DIR")]
        root: Option<PathBuf>,

        /// Skip SHA-256 verification of artifact files
        #[arg(long)]
        no_hash: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

fn parse_width(value: &str) -> Result<usize, String> {
    let width: usize = value.parse().map_err(|e| format!("{e}"))?;
    check_width(width).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_width_bounds() {
        assert_eq!(parse_width("8"), Ok(8));
        assert_eq!(parse_width("64"), Ok(64));
        assert!(parse_width("0").is_err());
        assert!(parse_width("65").is_err());
        assert!(parse_width("6148914691236517206").is_err());
        assert!(parse_width("wide").is_err());
    }

    #[test]
    fn test_analyze_mode_default() {
        assert_eq!(AnalyzeMode::default(), AnalyzeMode::Abs);
    }

    #[test]
    fn test_shell_command_default() {
        let cmd = ShellCommand::default();
        assert!(cmd.profile.is_none());
        assert!(cmd.image.is_none());
        assert!(!cmd.no_banner);
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }

    #[test]
    fn test_manifest_command_debug() {
        let cmd = ManifestCommand::Check {
            file: PathBuf::from("README.md"),
            root: None,
            no_hash: true,
            json: false,
        };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("no_hash: true"));
    }

    #[test]
    fn test_analyze_mode_debug() {
        assert_eq!(format!("{:?}", AnalyzeMode::Rel), "Rel");
    }
}
