//! `sleuth` - CLI for sleuthcps
//!
//! This binary provides the interactive shell and one-shot commands for
//! inspecting PLC memory dumps, plus artifact manifest checks.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use sleuthcps::cli::{
    AnalyzeCommand, AnalyzeMode, Cli, Command, ConfigCommand, DumpCommand, HexCommand,
    ListCommand, ManifestCommand, ResolveCommand, ShellCommand, ViewCommand,
};
use sleuthcps::manifest::CheckOptions;
use sleuthcps::numeric::parse_number;
use sleuthcps::{init_logging, report, Config, Manifest, Profile, Repl, Session};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

fn main() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command.unwrap_or(Command::Shell(ShellCommand::default())) {
        Command::Shell(cmd) => handle_shell(&config, &cmd)?,
        Command::Show(cmd) => {
            let profile = Profile::load(&cmd.profile)?;
            println!("{}", report::profile_table(&profile));
        }
        Command::List(cmd) => handle_list(&config, &cmd)?,
        Command::Hex(cmd) => handle_hex(&config, &cmd)?,
        Command::Analyze(cmd) => handle_analyze(&config, &cmd)?,
        Command::View(cmd) => handle_view(&config, &cmd)?,
        Command::Dump(cmd) => handle_dump(&config, &cmd)?,
        Command::Resolve(cmd) => handle_resolve(&config, &cmd)?,
        Command::Manifest(cmd) => return handle_manifest(&config, cmd),
        Command::Config(cmd) => handle_config(&config, cmd)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn open_session(config: &Config, profile: Option<&Path>, image: Option<&Path>) -> CliResult<Session> {
    let mut session = Session::new(config);
    if let Some(path) = profile {
        session.load_profile(path)?;
    }
    if let Some(path) = image {
        session.load_image(path)?;
    }
    Ok(session)
}

fn handle_shell(config: &Config, cmd: &ShellCommand) -> CliResult {
    let stdout = io::stdout();
    let mut repl = Repl::new(Session::new(config), config, stdout.lock());
    if config.display.banner && !cmd.no_banner {
        repl.banner()?;
    }
    repl.preload(cmd.profile.as_deref(), cmd.image.as_deref())?;
    repl.run(io::stdin().lock())?;
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> CliResult {
    let mut session = open_session(config, Some(cmd.profile.as_path()), cmd.image.as_deref())?;
    let rows = session.list()?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{}", report::listing(&rows));
    }
    Ok(())
}

fn handle_hex(config: &Config, cmd: &HexCommand) -> CliResult {
    let mut session = open_session(config, None, Some(cmd.image.as_path()))?;
    let region = session.hex(parse_number(&cmd.offset)?, parse_number(&cmd.size)?)?;
    let width = cmd.width.unwrap_or(config.display.hexdump_width);
    println!("{}", report::region(region, session.bytes(region), width)?);
    if cmd.extract {
        let path = session.extract(region, None)?;
        println!("Wrote extract to: {}", path.display());
    }
    Ok(())
}

fn handle_analyze(config: &Config, cmd: &AnalyzeCommand) -> CliResult {
    let mut session = open_session(config, Some(cmd.profile.as_path()), Some(cmd.image.as_path()))?;
    let analysis = match cmd.mode {
        AnalyzeMode::Abs => session.analyze_abs(&cmd.name)?,
        AnalyzeMode::Rel => session.analyze_rel(&cmd.name)?,
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        let width = cmd.width.unwrap_or(config.display.hexdump_width);
        println!("{}", report::analysis(&analysis, width)?);
    }
    if cmd.extract && analysis.in_bounds {
        let path = session.extract(analysis.region(), Some(&cmd.name))?;
        println!("Wrote extract to: {}", path.display());
    }
    Ok(())
}

fn handle_view(config: &Config, cmd: &ViewCommand) -> CliResult {
    let mut session = open_session(config, Some(cmd.profile.as_path()), Some(cmd.image.as_path()))?;
    let analysis = session.view(&cmd.name)?;
    let width = cmd.width.unwrap_or(config.display.hexdump_width);
    println!("{}", report::analysis(&analysis, width)?);
    Ok(())
}

fn handle_dump(config: &Config, cmd: &DumpCommand) -> CliResult {
    let mut session = open_session(config, Some(cmd.profile.as_path()), Some(cmd.image.as_path()))?;
    let (path, written) = session.dump(&cmd.name, cmd.output.as_deref())?;
    println!("Dumped {written} bytes from '{}' to '{}'.", cmd.name, path.display());
    Ok(())
}

fn handle_resolve(config: &Config, cmd: &ResolveCommand) -> CliResult {
    let mut session = open_session(config, Some(cmd.profile.as_path()), cmd.image.as_deref())?;
    let path = session.write_resolved(&cmd.output)?;
    println!("Wrote resolved profile to '{}'.", path.display());
    Ok(())
}

fn handle_manifest(config: &Config, cmd: ManifestCommand) -> CliResult<ExitCode> {
    match cmd {
        ManifestCommand::Check {
            file,
            root,
            no_hash,
            json,
        } => {
            let manifest = Manifest::load(&file)?;
            let options = CheckOptions {
                check_descriptions: config.manifest.check_descriptions,
                verify_hashes: config.manifest.verify_hashes && !no_hash,
            };
            let outcome = match root {
                Some(root) => manifest.verify(&root, options)?,
                None => manifest.check(options),
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", report::manifest_report(&outcome));
            }
            Ok(outcome.exit_code())
        }
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Display]");
                println!("  Hexdump width:      {}", config.display.hexdump_width);
                println!("  Banner:             {}", config.display.banner);
                println!("  Prompt:             {:?}", config.display.prompt);
                println!();
                println!("[Output]");
                println!("  Directory:          {}", config.output_dir().display());
                println!(
                    "  Updated suffix:     {}",
                    config.output.updated_profile_suffix
                );
                println!();
                println!("[Manifest]");
                println!("  Verify hashes:      {}", config.manifest.verify_hashes);
                println!(
                    "  Check descriptions: {}",
                    config.manifest.check_descriptions
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
