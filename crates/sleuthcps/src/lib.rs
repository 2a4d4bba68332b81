//! `sleuthcps` - Inspect PLC memory dumps through CSV structure profiles
//!
//! This library loads raw memory images and CSV profiles describing named
//! structures inside them, resolves each structure's location (directly or
//! through a chain of parent-relative metadata pointers), and renders or
//! extracts the bytes. It also checks artifact manifests listing the dumps.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod analyze;
pub mod area;
pub mod cli;
pub mod config;
pub mod error;
pub mod hexdump;
pub mod image;
pub mod logging;
pub mod manifest;
pub mod numeric;
pub mod profile;
pub mod repl;
pub mod report;
pub mod resolve;
pub mod session;

pub use analyze::{Analysis, AnalysisMode, ProfileUpdate};
pub use area::{DumpName, MemoryArea};
pub use config::Config;
pub use error::{Error, Result};
pub use image::MemoryImage;
pub use logging::init_logging;
pub use manifest::{Manifest, ManifestReport};
pub use profile::{Profile, StructureEntry};
pub use repl::Repl;
pub use resolve::Resolver;
pub use session::{Region, Session};
