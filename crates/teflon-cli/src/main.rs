//! # teflon CLI
//!
//! Launch programs that cannot set setgid bits or change file groups.

use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use teflon_config::logging::{init_logging, LogLevel};
use teflon_config::{log_cli_debug, Config};

mod launch;
mod library;

/// Exit status after printing usage, whether asked for or not.
const EXIT_USAGE: i32 = 1;

/// Run programs without letting them set setgid bits or change groups
#[derive(Parser)]
#[command(name = "teflon")]
#[command(version, about, long_about = None, arg_required_else_help = true)]
struct Cli {
    /// Inception layer to preload (overrides config and discovery)
    #[arg(long, global = true, value_name = "PATH")]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program with the inception layer preloaded
    Run {
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true,
            value_name = "PROGRAM"
        )]
        command: Vec<OsString>,
    },

    /// Run a program with the inception layer removed from the preload list
    Unwrap {
        #[arg(
            trailing_var_arg = true,
            allow_hyphen_values = true,
            required = true,
            value_name = "PROGRAM"
        )]
        command: Vec<OsString>,
    },

    /// Print shell code for eval that activates the inception layer
    Env {
        /// Print code that removes it instead
        #[arg(long)]
        unwrap: bool,
    },

    /// Show the effective configuration
    Config {
        /// Print the built-in defaults instead
        #[arg(long)]
        default: bool,
    },

    /// `teflon PROGRAM [ARGS..]` is the same as `teflon run -- PROGRAM [ARGS..]`
    #[command(external_subcommand)]
    External(Vec<OsString>),
}

fn main() -> Result<()> {
    #[cfg(unix)]
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                let _ = e.print();
                std::process::exit(EXIT_USAGE);
            }
            _ => e.exit(),
        },
    };
    let mut config = Config::load().context("Failed to load teflon configuration")?;
    if let Some(library) = cli.library {
        config.preload.library = Some(library);
    }

    init_logging(LogLevel::parse(&config.log.level).unwrap_or(LogLevel::Warn));
    log_cli_debug!(
        "Configuration loaded",
        marker = config.preload.marker.as_str()
    );

    let marker = config.preload.marker.as_str();
    match cli.command {
        Commands::Run { command } | Commands::External(command) => {
            let library = library::find_inception_layer(config.preload.library.as_deref())?;
            launch::cmd_run(&library, marker, &command)
        }
        Commands::Unwrap { command } => launch::cmd_unwrap(marker, &command),
        Commands::Env { unwrap: true } => launch::cmd_env_unwrap(marker),
        Commands::Env { unwrap: false } => {
            let library = library::find_inception_layer(config.preload.library.as_deref())?;
            launch::cmd_env(&library, marker)
        }
        Commands::Config { default } => {
            if default {
                print!("{}", Config::default_toml());
            } else {
                print!("{}", config.to_toml().context("render configuration")?);
            }
            Ok(())
        }
    }
}
