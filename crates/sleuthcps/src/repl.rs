//! The interactive `sleuth>` shell.
//!
//! [`Repl`] drives a [`Session`] from lines of text. Input and output are
//! generic so the shell runs the same against a terminal or a test buffer.

use std::io::{self, BufRead, Write};
use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::error::Error;
use crate::hexdump::check_width;
use crate::numeric::parse_number;
use crate::report;
use crate::session::Session;

/// Printed on startup unless disabled.
pub const BANNER: &str = r"
  /$$$$$$  /$$                       /$$     /$$              /$$$$$$  /$$$$$$$   /$$$$$$
 /$$__  $$| $$                      | $$    | $$             /$$__  $$| $$__  $$ /$$__  $$
| $$  \__/| $$  /$$$$$$  /$$   /$$ /$$$$$$  | $$$$$$$       | $$  \__/| $$  \ $$| $$  \__/
|  $$$$$$ | $$ /$$__  $$| $$  | $$|_  $$_/  | $$__  $$      | $$      | $$$$$$$/|  $$$$$$
 \____  $$| $$| $$$$$$$$| $$  | $$  | $$    | $$  \ $$      | $$      | $$____/  \____  $$
 /$$  \ $$| $$| $$_____/| $$  | $$  | $$ /$$| $$  | $$      | $$    $$| $$       /$$  \ $$
|  $$$$$$/| $$|  $$$$$$$|  $$$$$$/  |  $$$$/| $$  | $$      |  $$$$$$/| $$      |  $$$$$$/
 \______/ |__/ \_______/ \______/    \___/  |__/  |__/       \______/ |__/       \______/
";

/// Output of `help`.
pub const HELP_TEXT: &str = "Available commands:
  h|help                       Show this help text
  loadcsv <path>               Load CSV profile and display its contents
  setimg <path>                Set target image dump for analysis
  showcsv                      Print currently loaded CSV entries
  status                       Show current CSV, target image, and generated output files
  list                         List structures (names and resolved offsets)
  hex <offset> <size> [w=N] [extract]
                               Show hex dump from absolute offset (0x... or decimal)
  aa|analyze_abs <name> [w=N] [extract]
                               Analyze a structure using the CSV offset and size
  ar|analyze_rel <name> [w=N] [extract]
                               Resolve the rOffset chain and read the size from the binary
  exit|quit                    Exit the program

  [w=N] sets bytes per line; [extract] (or -e) also writes the bytes to a file.";

const QUOTE_HINT: &str = "If your path contains spaces, wrap it in quotes. \
If it ends with a backslash, escape it or use forward slashes.";

/// Trailing options shared by `hex`, `aa` and `ar`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewOptions {
    /// Bytes per hexdump line, if overridden.
    pub width: Option<usize>,
    /// Also write the bytes to a file.
    pub extract: bool,
}

/// A parsed shell command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `h`, `help`
    Help,
    /// `loadcsv`, `setcsv`
    LoadProfile(String),
    /// `setimg`, `loadbin`, `setbin`, `loadimg`
    LoadImage(String),
    /// `showcsv`
    ShowProfile,
    /// `status`
    Status,
    /// `list`
    List,
    /// `hex <offset> <size>`
    Hex {
        /// Offset as typed.
        offset: String,
        /// Size as typed.
        size: String,
        /// Trailing options.
        options: ViewOptions,
    },
    /// `aa`, `analyze_abs`
    AnalyzeAbs {
        /// Structure name.
        name: String,
        /// Trailing options.
        options: ViewOptions,
    },
    /// `ar`, `analyze_rel`
    AnalyzeRel {
        /// Structure name.
        name: String,
        /// Trailing options.
        options: ViewOptions,
    },
    /// `exit`, `quit`
    Exit,
}

/// Why a line is not a runnable command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Required arguments are missing; holds the usage line.
    Usage(&'static str),
    /// The command word is not recognized.
    Unknown(String),
    /// A `w=` option is not a positive integer.
    InvalidWidth(String),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(usage) => write!(f, "Usage: {usage}"),
            Self::Unknown(cmd) => write!(f, "Unknown command: {cmd}. Type 'h' for help."),
            Self::InvalidWidth(value) => write!(f, "Invalid width: {value}"),
        }
    }
}

impl Command {
    /// Build a command from already tokenized words.
    ///
    /// The command word is matched case-insensitively. Returns `Ok(None)` for
    /// an empty token list.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] for unknown commands, missing arguments and
    /// malformed `w=` options.
    pub fn parse(tokens: &[String]) -> Result<Option<Self>, CommandError> {
        let Some((word, args)) = tokens.split_first() else {
            return Ok(None);
        };
        let word = word.to_lowercase();
        let command = match word.as_str() {
            "h" | "help" => Self::Help,
            "loadcsv" | "setcsv" => Self::LoadProfile(
                args.first()
                    .cloned()
                    .ok_or(CommandError::Usage("loadcsv <path>"))?,
            ),
            "setimg" | "loadbin" | "setbin" | "loadimg" => Self::LoadImage(
                args.first()
                    .cloned()
                    .ok_or(CommandError::Usage("setimg <path>"))?,
            ),
            "showcsv" => Self::ShowProfile,
            "status" => Self::Status,
            "list" => Self::List,
            "hex" => match args {
                [offset, size, rest @ ..] => Self::Hex {
                    offset: offset.clone(),
                    size: size.clone(),
                    options: parse_options(rest)?,
                },
                _ => return Err(CommandError::Usage("hex <offset> <size> [w=N] [extract]")),
            },
            "aa" | "analyze_abs" => match args {
                [name, rest @ ..] => Self::AnalyzeAbs {
                    name: name.clone(),
                    options: parse_options(rest)?,
                },
                [] => return Err(CommandError::Usage("analyze_abs <name> [w=N] [extract]")),
            },
            "ar" | "analyze_rel" => match args {
                [name, rest @ ..] => Self::AnalyzeRel {
                    name: name.clone(),
                    options: parse_options(rest)?,
                },
                [] => return Err(CommandError::Usage("analyze_rel <name> [w=N] [extract]")),
            },
            "exit" | "quit" => Self::Exit,
            _ => return Err(CommandError::Unknown(word)),
        };
        Ok(Some(command))
    }
}

fn parse_options(args: &[String]) -> Result<ViewOptions, CommandError> {
    let mut options = ViewOptions::default();
    for arg in args {
        if let Some(value) = arg.strip_prefix("w=") {
            match value.parse::<usize>().ok().and_then(|w| check_width(w).ok()) {
                Some(width) => options.width = Some(width),
                None => return Err(CommandError::InvalidWidth(value.to_string())),
            }
        } else if arg == "extract" || arg == "-e" {
            options.extract = true;
        }
    }
    Ok(options)
}

/// Split a line shell-style, or on whitespace if the quoting is broken.
///
/// The second value is `false` when the fallback was used.
#[must_use]
pub fn tokenize(line: &str) -> (Vec<String>, bool) {
    match shlex::split(line) {
        Some(tokens) => (tokens, true),
        None => (line.split_whitespace().map(str::to_string).collect(), false),
    }
}

/// Whether the loop should keep reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Stop the loop.
    Exit,
}

/// An interactive shell bound to a session and an output sink.
#[derive(Debug)]
pub struct Repl<W: Write> {
    session: Session,
    out: W,
    width: usize,
    prompt: String,
}

impl<W: Write> Repl<W> {
    /// Create a shell with display settings from `config`.
    pub fn new(session: Session, config: &Config, out: W) -> Self {
        Self {
            session,
            out,
            width: config.display.hexdump_width,
            prompt: config.display.prompt.clone(),
        }
    }

    /// The session being driven.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Consume the shell, returning its session and output sink.
    pub fn into_parts(self) -> (Session, W) {
        (self.session, self.out)
    }

    /// Print the ASCII banner.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    pub fn banner(&mut self) -> io::Result<()> {
        writeln!(self.out, "{BANNER}")
    }

    /// Load a profile and/or image before the loop starts.
    ///
    /// Failures are reported and do not stop the shell.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    pub fn preload(&mut self, profile: Option<&Path>, image: Option<&Path>) -> io::Result<()> {
        if let Some(path) = profile {
            if let Err(err) = self.session.load_profile(path) {
                writeln!(self.out, "Failed to preload profile '{}': {err}", path.display())?;
            }
        }
        if let Some(path) = image {
            if let Err(err) = self.session.load_image(path) {
                writeln!(self.out, "Failed to preload image '{}': {err}", path.display())?;
            }
        }
        Ok(())
    }

    /// Read and execute lines until `exit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if reading input or writing output fails.
    pub fn run<R: BufRead>(&mut self, input: R) -> io::Result<()> {
        writeln!(self.out, "Interactive mode. Type 'h' or 'help' for commands.")?;
        let mut lines = input.lines();
        loop {
            write!(self.out, "{}", self.prompt)?;
            self.out.flush()?;
            let Some(line) = lines.next().transpose()? else {
                writeln!(self.out, "\nExiting.")?;
                return Ok(());
            };
            if self.execute(&line)? == Flow::Exit {
                return Ok(());
            }
        }
    }

    /// Execute one line of input.
    ///
    /// # Errors
    ///
    /// Returns an error only if the output cannot be written; command
    /// failures are printed.
    pub fn execute(&mut self, line: &str) -> io::Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let (tokens, quoted) = tokenize(line);
        if !quoted {
            writeln!(self.out, "Input parse error: unbalanced quotes")?;
            writeln!(self.out, "{QUOTE_HINT}")?;
        }

        let command = match Command::parse(&tokens) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(Flow::Continue),
            Err(err) => {
                writeln!(self.out, "{err}")?;
                return Ok(Flow::Continue);
            }
        };
        debug!("Executing {command:?}");

        match command {
            Command::Help => writeln!(self.out, "{HELP_TEXT}")?,
            Command::LoadProfile(path) => self.load_profile(&path)?,
            Command::LoadImage(path) => self.load_image(&path)?,
            Command::ShowProfile => match self.session.profile() {
                Some(profile) => writeln!(self.out, "{}", report::profile_table(profile))?,
                None => writeln!(self.out, "No CSV profile loaded.")?,
            },
            Command::Status => {
                let status = self.session.status();
                writeln!(self.out, "{}", report::status(&status))?;
            }
            Command::List => match self.session.list() {
                Ok(rows) => writeln!(self.out, "{}", report::listing(&rows))?,
                Err(Error::NoProfileLoaded) => writeln!(self.out, "No CSV loaded.")?,
                Err(err) => writeln!(self.out, "Error in list: {err}")?,
            },
            Command::Hex {
                offset,
                size,
                options,
            } => self.hex(&offset, &size, options)?,
            Command::AnalyzeAbs { name, options } => {
                let result = self.session.analyze_abs(&name);
                self.show_analysis("analyze_abs", &name, result, options)?;
            }
            Command::AnalyzeRel { name, options } => {
                let result = self.session.analyze_rel(&name);
                self.show_analysis("analyze_rel", &name, result, options)?;
            }
            Command::Exit => {
                writeln!(self.out, "Exiting.")?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }

    fn load_profile(&mut self, path: &str) -> io::Result<()> {
        match self.session.load_profile(path) {
            Ok(profile) => {
                let table = report::profile_table(profile);
                let count = profile.len();
                writeln!(self.out, "Loaded CSV profile: {path} ({count} entries)")?;
                writeln!(self.out, "{table}")
            }
            Err(err) => {
                writeln!(self.out, "Error loading CSV '{path}': {err}")?;
                self.explain_path(path)
            }
        }
    }

    fn load_image(&mut self, path: &str) -> io::Result<()> {
        match self.session.load_image(path) {
            Ok(image) => {
                let len = image.len();
                writeln!(self.out, "Loaded binary: {path} ({len} bytes)")
            }
            Err(err) => {
                writeln!(self.out, "Error loading binary '{path}': {err}")?;
                self.explain_path(path)
            }
        }
    }

    fn explain_path(&mut self, path: &str) -> io::Result<()> {
        let cwd = std::env::current_dir().unwrap_or_default();
        writeln!(self.out, " Current working directory: {}", cwd.display())?;
        writeln!(self.out, " Attempted path (absolute): {}", cwd.join(path).display())
    }

    fn hex(&mut self, offset: &str, size: &str, options: ViewOptions) -> io::Result<()> {
        let region = parse_number(offset)
            .and_then(|offset| Ok((offset, parse_number(size)?)))
            .and_then(|(offset, size)| self.session.hex(offset, size));
        let region = match region {
            Ok(region) => region,
            Err(err) => return writeln!(self.out, "Error in hex: {err}"),
        };

        let width = options.width.unwrap_or(self.width);
        match report::region(region, self.session.bytes(region), width) {
            Ok(text) => writeln!(self.out, "{text}")?,
            Err(err) => return writeln!(self.out, "Error in hex: {err}"),
        }
        if options.extract {
            self.extract(region, None)?;
        }
        Ok(())
    }

    fn show_analysis(
        &mut self,
        command: &str,
        name: &str,
        result: crate::Result<crate::analyze::Analysis>,
        options: ViewOptions,
    ) -> io::Result<()> {
        let analysis = match result {
            Ok(analysis) => analysis,
            Err(err) => return writeln!(self.out, "Error in {command}('{name}'): {err}"),
        };
        let width = options.width.unwrap_or(self.width);
        match report::analysis(&analysis, width) {
            Ok(text) => writeln!(self.out, "{text}")?,
            Err(err) => return writeln!(self.out, "Error in {command}('{name}'): {err}"),
        }
        if options.extract && analysis.in_bounds {
            self.extract(analysis.region(), Some(name))?;
        }
        Ok(())
    }

    fn extract(&mut self, region: crate::session::Region, name: Option<&str>) -> io::Result<()> {
        match self.session.extract(region, name) {
            Ok(path) => writeln!(self.out, "Wrote extract to: {}", path.display()),
            Err(err) => writeln!(self.out, "Error writing extract file: {err}"),
        }
    }
}
