#![forbid(unsafe_code)]

//! ecconv — command-line front end.
//!
//! CLI entry point: parses arguments, dispatches subcommands, renders output.

use std::io::{BufRead as _, Write as _};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser};
use colored::Colorize as _;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ecconv::config::Config;
use ecconv::engine::NewConverter;
use ecconv::status::{ConvType, ProcessTypeFlags};
use ecconv::{ConverterSession, ConverterSettings, EcError};

/// Convert text with SIL EncConverters from the command line.
///
/// Binds the ECDriver library at runtime, lets you pick or name a
/// converter, and pushes text through it.
#[derive(Parser, Debug)]
#[command(name = "ecconv", version, about, long_about = None)]
struct Cli {
    /// Show binding and conversion progress.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show everything including marshalling details.
    #[arg(long, global = true)]
    trace: bool,

    /// Output as JSON for machine consumption.
    #[arg(long, global = true)]
    json: bool,

    /// Load the driver from this path instead of searching for it.
    #[arg(long, global = true, env = "ECCONV_LIBRARY")]
    library: Option<PathBuf>,

    /// File that remembers the active converter.
    #[arg(long, global = true, env = "ECCONV_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Report whether the driver loads and which entry points it exports.
    Status,

    /// Open the EncConverters picker and remember the chosen converter.
    Pick {
        /// Do not save the chosen converter.
        #[arg(long)]
        no_save: bool,
    },

    /// Activate a converter by name and remember it.
    Set {
        /// Converter name as registered with EncConverters.
        name: String,
        #[command(flatten)]
        opts: DirectionOpts,
        /// Do not save the converter.
        #[arg(long)]
        no_save: bool,
    },

    /// Convert TEXT, or each line of stdin, with a converter.
    Convert {
        /// Text to convert. Reads stdin line by line when omitted.
        text: Option<String>,
        /// Converter to use instead of the remembered one.
        #[arg(long, short = 'c')]
        converter: Option<String>,
        #[command(flatten)]
        opts: DirectionOpts,
    },

    /// Print the repository's description of a converter.
    Describe {
        /// Converter name.
        name: String,
    },

    /// Register a new converter in the repository.
    Add {
        /// Friendly name to register the converter under.
        name: String,
        /// Technical spec, e.g. the path of a TECkit map.
        spec: String,
        /// Conversion type, e.g. Legacy_to_from_Unicode.
        #[arg(long, default_value = "Unknown", value_parser = parse_conv_type)]
        conv_type: ConvType,
        /// Left-hand encoding name.
        #[arg(long, default_value = "")]
        left: String,
        /// Right-hand encoding name.
        #[arg(long, default_value = "")]
        right: String,
        /// ProcessTypeFlags bits.
        #[arg(long, default_value_t = 0)]
        process_type: u16,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: clap_complete::Shell,
    },
}

/// Direction and normalization. Flags left out keep the remembered value
/// (or the default: forward, no normalization).
#[derive(clap::Args, Debug, Clone, Copy)]
struct DirectionOpts {
    /// Convert right to left.
    #[arg(long, conflicts_with = "forward")]
    reverse: bool,
    /// Convert left to right.
    #[arg(long)]
    forward: bool,
    /// Output normalization form.
    #[arg(long)]
    norm: Option<i32>,
}

impl DirectionOpts {
    fn direction(self) -> Option<bool> {
        match (self.forward, self.reverse) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn apply(self, settings: ConverterSettings) -> ConverterSettings {
        settings.with_overrides(self.direction(), self.norm)
    }
}

fn parse_conv_type(value: &str) -> Result<ConvType, String> {
    ConvType::parse(value).ok_or_else(|| {
        let known: Vec<String> = ConvType::ALL.iter().map(|t| format!("{t:?}")).collect();
        format!("unknown conversion type '{value}'. Known: {}", known.join(", "))
    })
}

/// Initialize the tracing subscriber based on CLI flags.
///
/// Priority: `--trace` > `--verbose` > `RUST_LOG` env var > default (warn).
fn init_tracing(cli: &Cli) {
    let filter = if cli.trace {
        EnvFilter::new("ecconv=trace")
    } else if cli.verbose {
        EnvFilter::new("ecconv=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}

fn report_error(err: &anyhow::Error, as_json: bool) {
    let kind = err
        .downcast_ref::<EcError>()
        .map_or("error", EcError::kind);
    if as_json {
        println!(
            "{}",
            json!({ "ok": false, "error_type": kind, "message": format!("{err:#}") })
        );
    } else {
        eprintln!("{} {err:#}", "error:".red().bold());
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if cli.library.is_some() {
        config.library.clone_from(&cli.library);
    }
    if cli.settings.is_some() {
        config.settings_path.clone_from(&cli.settings);
    }

    match &cli.command {
        Command::Status => cmd_status(&config, cli.json),
        Command::Pick { no_save } => cmd_pick(&config, *no_save, cli.json),
        Command::Set {
            name,
            opts,
            no_save,
        } => cmd_set(&config, name, *opts, *no_save, cli.json),
        Command::Convert {
            text,
            converter,
            opts,
        } => cmd_convert(&config, text.as_deref(), converter.as_deref(), *opts, cli.json),
        Command::Describe { name } => {
            let mut session = ConverterSession::from_config(&config);
            let description = session.describe_converter(name)?;
            if cli.json {
                println!("{}", json!({ "ok": true, "name": name, "description": description }));
            } else {
                println!("{description}");
            }
            Ok(())
        }
        Command::Add {
            name,
            spec,
            conv_type,
            left,
            right,
            process_type,
        } => {
            let new = NewConverter {
                name: name.clone(),
                spec: spec.clone(),
                conv_type: *conv_type,
                left_encoding: left.clone(),
                right_encoding: right.clone(),
                process_type: ProcessTypeFlags(*process_type),
            };
            let mut session = ConverterSession::from_config(&config);
            session.add_converter(&new)?;
            if cli.json {
                println!("{}", json!({ "ok": true, "name": name }));
            } else {
                println!("{} added converter '{name}'", "ok".green().bold());
            }
            Ok(())
        }
        Command::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "ecconv", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn cmd_status(config: &Config, as_json: bool) -> anyhow::Result<()> {
    let mut session = ConverterSession::from_config(config);
    let bound = session.ensure_bound()?;
    let path = bound.path().map(|p| p.display().to_string());
    let missing = bound.missing_symbols();
    let installed = bound.engine().ok().map(|engine| engine.is_installed());

    if as_json {
        println!(
            "{}",
            json!({
                "ok": missing.is_empty() && installed == Some(true),
                "path": path,
                "missing_symbols": missing,
                "installed": installed,
            })
        );
    } else {
        println!(
            "driver:    {}",
            path.as_deref().unwrap_or("(in-process)").bold()
        );
        if missing.is_empty() {
            println!("symbols:   {}", "all resolved".green());
        } else {
            println!("symbols:   {} {}", "missing".red(), missing.join(", "));
        }
        match installed {
            Some(true) => println!("installed: {}", "yes".green()),
            Some(false) => println!("installed: {}", "no".red()),
            None => println!("installed: {}", "unknown".yellow()),
        }
    }

    if !missing.is_empty() {
        return Err(EcError::EngineUnavailable {
            reason: format!("missing entry points: {}", missing.join(", ")),
        }
        .into());
    }
    if installed == Some(false) {
        return Err(EcError::EngineNotInstalled.into());
    }
    Ok(())
}

fn cmd_pick(config: &Config, no_save: bool, as_json: bool) -> anyhow::Result<()> {
    let mut session = ConverterSession::from_config(config);
    let picked = match session.try_pick_converter() {
        Ok(picked) => picked,
        Err(EcError::SelectionCancelled) => {
            if as_json {
                println!("{}", json!({ "ok": true, "picked": null }));
            } else {
                println!("{}", "No converter picked.".yellow());
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let saved = save_unless(config, &picked, no_save)?;
    print_active(&picked, saved.as_ref(), as_json);
    Ok(())
}

fn cmd_set(
    config: &Config,
    name: &str,
    opts: DirectionOpts,
    no_save: bool,
    as_json: bool,
) -> anyhow::Result<()> {
    let settings = opts.apply(ConverterSettings::new(name, true, 0));
    let mut session = ConverterSession::from_config(config);
    session.try_set_converter(settings.clone())?;
    let saved = save_unless(config, &settings, no_save)?;
    print_active(&settings, saved.as_ref(), as_json);
    Ok(())
}

fn cmd_convert(
    config: &Config,
    text: Option<&str>,
    converter: Option<&str>,
    opts: DirectionOpts,
    as_json: bool,
) -> anyhow::Result<()> {
    let settings = match converter {
        Some(name) => ConverterSettings::new(name, true, 0),
        None => remembered(config)?.ok_or(EcError::NoActiveConverter)?,
    };
    let settings = opts.apply(settings);
    debug!(%settings, "converter for this run");

    let mut session = ConverterSession::from_config(config);
    session.try_set_converter(settings)?;

    let inputs: Vec<String> = match text {
        Some(text) => vec![text.to_string()],
        None => std::io::stdin()
            .lock()
            .lines()
            .collect::<Result<Vec<_>, _>>()
            .context("reading stdin")?,
    };

    let mut stdout = std::io::stdout().lock();
    for input in &inputs {
        let output = session.try_convert(input)?;
        if as_json {
            writeln!(stdout, "{}", json!({ "input": input, "output": output }))?;
        } else {
            writeln!(stdout, "{output}")?;
        }
    }
    Ok(())
}

fn remembered(config: &Config) -> anyhow::Result<Option<ConverterSettings>> {
    match &config.settings_path {
        Some(path) => ConverterSettings::load(path),
        None => Ok(None),
    }
}

fn save_unless(
    config: &Config,
    settings: &ConverterSettings,
    no_save: bool,
) -> anyhow::Result<Option<PathBuf>> {
    if no_save {
        return Ok(None);
    }
    let Some(path) = &config.settings_path else {
        return Ok(None);
    };
    settings.save(path)?;
    Ok(Some(path.clone()))
}

fn print_active(settings: &ConverterSettings, saved: Option<&PathBuf>, as_json: bool) {
    if as_json {
        println!(
            "{}",
            json!({ "ok": true, "converter": settings, "saved_to": saved })
        );
    } else {
        println!("{} {settings}", "active".green().bold());
        if let Some(path) = saved {
            println!("saved to {}", path.display());
        }
    }
}
