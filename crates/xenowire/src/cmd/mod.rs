use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;
use crate::settings::Settings;

pub mod decode;
pub mod encode;
pub mod sync;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build one frame and print it.
    Encode(EncodeArgs),
    /// Feed bytes through a receiving session and print what it delivers.
    Decode(DecodeArgs),
    /// Print idle sync patterns.
    Sync(SyncArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, settings: &Settings, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, settings, format),
        Command::Decode(args) => decode::run(args, settings, format),
        Command::Sync(args) => sync::run(args, settings, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Message code (decimal or 0x-prefixed hex).
    #[arg(long, short = 'c', value_parser = parse_u16)]
    pub code: u16,
    /// Unique id to stamp on the frame.
    #[arg(long, default_value = "1", value_parser = parse_u16)]
    pub id: u16,
    /// Payload as a UTF-8 string.
    #[arg(long, conflicts_with = "hex")]
    pub data: Option<String>,
    /// Payload as hex digits.
    #[arg(long, conflicts_with = "data")]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Wire bytes as hex digits (whitespace ignored).
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub input: Option<String>,
    /// Read raw wire bytes from a file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Feed input in chunks of this many bytes.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk: Option<u64>,
    /// Treat codes missing from the config as unknown.
    #[arg(long)]
    pub strict: bool,
    /// Also print the reply frames the session queued.
    #[arg(long)]
    pub replies: bool,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Number of sync patterns.
    #[arg(default_value = "1")]
    pub count: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a `u16` given in decimal or with a `0x` prefix.
pub fn parse_u16(input: &str) -> Result<u16, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(digits) => u16::from_str_radix(digits, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid 16-bit value {input:?}: {err}"))
}

/// Parse a `u8` given in decimal or with a `0x` prefix.
pub fn parse_u8(input: &str) -> Result<u8, String> {
    let value = parse_u16(input)?;
    u8::try_from(value).map_err(|_| format!("{input:?} does not fit in one byte"))
}

/// Decode hex digits, ignoring whitespace and `:` separators.
pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && *c != ':')
        .collect();
    hex::decode(&digits).map_err(|err| CliError::usage(format!("invalid hex input: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_accept_hex_and_decimal() {
        assert_eq!(parse_u16("0x0100"), Ok(0x0100));
        assert_eq!(parse_u16("256"), Ok(256));
        assert_eq!(parse_u8("0xAF"), Ok(0xAF));
        assert!(parse_u8("0x100").is_err());
        assert!(parse_u16("nope").is_err());
    }

    #[test]
    fn hex_ignores_separators() {
        assert_eq!(parse_hex("08 00:00 c0").unwrap(), vec![0x08, 0x00, 0x00, 0xC0]);
        assert_eq!(parse_hex("0A0b").unwrap(), vec![0x0A, 0x0B]);
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }
}
