mod cmd;
mod exit;
mod logging;
mod output;
mod settings;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::{parse_u8, Command};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "xenowire", version, about = "Encode and decode xenowire frames")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    /// JSON file with protocol settings and message code definitions.
    #[arg(long, value_name = "PATH", env = "XENOWIRE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Checksum preload byte; overrides the config file.
    #[arg(long, value_name = "BYTE", value_parser = parse_u8, global = true)]
    preload: Option<u8>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = Settings::load(cli.config.as_deref(), cli.preload)
        .and_then(|settings| cmd::run(cli.command, &settings, format));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
