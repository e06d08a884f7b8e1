pub mod program;
pub mod run;

pub use program::{handle_program_command, program_command};
pub use run::{
    check_command, handle_check, handle_instructions, handle_run, instructions_command,
    run_command,
};

use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::compiler::ProgramError;
use crate::config::{ConfigError, RuntimeConfig};
use crate::events::LogFormat;
use crate::host::HostError;
use crate::storage::StorageError;
use crate::vm::{Cast, InstructionRegistry};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Program(#[from] ProgramError),

    #[error("{0}")]
    Host(#[from] HostError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

/// The full command line interface
pub fn build_cli() -> Command {
    Command::new("cast-vm")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Runs event-reactive YAML programs")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log at debug level unless RUST_LOG says otherwise")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("Output format for events and reports")
                .value_parser(["pretty", "json"])
                .global(true),
        )
        .arg(
            Arg::new("max-branch-depth")
                .long("max-branch-depth")
                .value_name("N")
                .help("Deepest allowed nesting of branch programs")
                .value_parser(clap::value_parser!(usize))
                .global(true),
        )
        .subcommand(check_command())
        .subcommand(run_command())
        .subcommand(instructions_command())
        .subcommand(program_command())
}

/// Run the subcommand selected in `matches`
pub async fn dispatch(matches: &ArgMatches) -> Result<(), AppError> {
    let config = runtime_config(matches)?;

    match matches.subcommand() {
        Some(("check", sub)) => handle_check(sub, &config),
        Some(("run", sub)) => handle_run(sub, &config).await,
        Some(("instructions", _)) => handle_instructions(&config),
        Some(("program", sub)) => handle_program_command(sub, &config).await,
        _ => Err("no command given".into()),
    }
}

/// Environment settings with command line overrides applied
pub fn runtime_config(matches: &ArgMatches) -> Result<RuntimeConfig, AppError> {
    let mut config = RuntimeConfig::from_env()?;
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.log_format = format.parse::<LogFormat>()?;
    }
    if let Some(depth) = matches.get_one::<usize>("max-branch-depth") {
        config.max_branch_depth = *depth;
    }
    Ok(config)
}

pub(crate) fn registry_for(config: &RuntimeConfig) -> InstructionRegistry {
    InstructionRegistry::with_builtins().with_max_branch_depth(config.max_branch_depth)
}

/// Arguments describing the cast a program runs for
pub(crate) fn cast_args() -> Vec<Arg> {
    vec![
        Arg::new("cast-id")
            .long("cast-id")
            .value_name("ID")
            .help("Identifier exposed as cast.id"),
        Arg::new("address")
            .long("address")
            .value_name("ADDRESS")
            .help("Contract address exposed as cast.address"),
        Arg::new("chain-id")
            .long("chain-id")
            .value_name("N")
            .help("Chain id exposed as cast.chainId")
            .value_parser(clap::value_parser!(u64)),
    ]
}

pub(crate) fn cast_from(matches: &ArgMatches, default_id: &str) -> Cast {
    let id = matches
        .get_one::<String>("cast-id")
        .map(String::as_str)
        .unwrap_or(default_id);
    let mut cast = Cast::new(id);
    if let Some(address) = matches.get_one::<String>("address") {
        cast = cast.with_address(address.as_str());
    }
    if let Some(chain_id) = matches.get_one::<u64>("chain-id") {
        cast = cast.with_chain_id(*chain_id);
    }
    cast
}

pub(crate) fn event_arg() -> Arg {
    Arg::new("event")
        .short('e')
        .long("event")
        .value_name("FILE")
        .help("JSON file holding the event payload")
}

/// Read the event file named by `--event`, if any
pub(crate) fn read_event(matches: &ArgMatches) -> Result<Option<Value>, AppError> {
    match matches.get_one::<String>("event") {
        Some(path) => {
            let contents = read_file(path)?;
            Ok(Some(serde_json::from_str(&contents)?))
        }
        None => Ok(None),
    }
}

pub(crate) fn read_file(path: &str) -> Result<String, AppError> {
    if !Path::new(path).exists() {
        return Err(format!("File not found: {}", path).into());
    }
    Ok(fs::read_to_string(path)?)
}
