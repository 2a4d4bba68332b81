//! Command-line interface for sleuthcps.
//!
//! This module provides the CLI structure for the `sleuth` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AnalyzeCommand, AnalyzeMode, ConfigCommand, DumpCommand, HexCommand, ListCommand,
    ManifestCommand, ResolveCommand, ShellCommand, ShowCommand, ViewCommand,
};

use crate::logging::Verbosity;

/// sleuth - Inspect PLC memory dumps through CSV structure profiles
///
/// Without a command, starts the interactive shell.
#[derive(Debug, Parser)]
#[command(name = "sleuth")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the interactive shell
    Shell(ShellCommand),

    /// Print the rows of a profile
    Show(ShowCommand),

    /// List structures with their resolved offsets
    List(ListCommand),

    /// Hexdump a raw byte range
    Hex(HexCommand),

    /// Analyze a named structure
    Analyze(AnalyzeCommand),

    /// Show a structure at its resolved offset
    View(ViewCommand),

    /// Write a structure's bytes to a file
    Dump(DumpCommand),

    /// Write a copy of a profile with every offset resolved
    Resolve(ResolveCommand),

    /// Check artifact manifests
    #[command(subcommand)]
    Manifest(ManifestCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
