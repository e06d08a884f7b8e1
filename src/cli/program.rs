use clap::{Arg, ArgMatches, Command};
use colored::Colorize;
use serde_json::Value;

use crate::cli::run::print_report;
use crate::cli::{cast_args, cast_from, event_arg, read_event, read_file, AppError};
use crate::config::RuntimeConfig;
use crate::host::ProgramHost;
use crate::storage::FileProgramStore;
use crate::vm::Services;

/// Default directory of the file program store
pub const DEFAULT_STORE_DIR: &str = ".cast-vm";

fn id_arg() -> Arg {
    Arg::new("id")
        .value_name("ID")
        .help("Program id")
        .required(true)
}

fn source_arg() -> Arg {
    Arg::new("file")
        .value_name("FILE")
        .help("YAML program file")
        .required(true)
}

/// Create the program command and its subcommands
pub fn program_command() -> Command {
    Command::new("program")
        .about("Manage stored programs and trigger them with events")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("store")
                .long("store")
                .value_name("DIR")
                .help("Directory holding stored programs")
                .default_value(DEFAULT_STORE_DIR),
        )
        .subcommand(
            Command::new("create")
                .about("Compile and store a new program")
                .arg(id_arg())
                .arg(source_arg())
                .args(cast_args()),
        )
        .subcommand(
            Command::new("update")
                .about("Compile and replace a stored program")
                .arg(id_arg())
                .arg(source_arg())
                .args(cast_args()),
        )
        .subcommand(
            Command::new("delete")
                .about("Remove a stored program")
                .arg(id_arg()),
        )
        .subcommand(Command::new("list").about("List stored program ids"))
        .subcommand(
            Command::new("trigger")
                .about("Run a stored program against an event")
                .arg(id_arg())
                .arg(event_arg()),
        )
        .subcommand(
            Command::new("dispatch")
                .about("Run every stored program listening to an address")
                .arg(
                    Arg::new("address")
                        .long("address")
                        .value_name("ADDRESS")
                        .help("Contract address that emitted the event")
                        .required(true),
                )
                .arg(event_arg()),
        )
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String, AppError> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| AppError::Other(format!("missing argument '{}'", name)))
}

pub async fn handle_program_command(
    matches: &ArgMatches,
    config: &RuntimeConfig,
) -> Result<(), AppError> {
    let dir = required(matches, "store")?;
    let store = FileProgramStore::new(dir)?;
    let mut host = ProgramHost::new(store, Services::new(config.clone())?);

    match matches.subcommand() {
        Some(("create", sub)) => {
            let id = required(sub, "id")?;
            let source = read_file(required(sub, "file")?)?;
            let record = host.create(id, &source, cast_from(sub, id))?;
            println!("{} program '{}'", "Created".green(), record.id);
        }
        Some(("update", sub)) => {
            let id = required(sub, "id")?;
            let source = read_file(required(sub, "file")?)?;
            let previous = host.get(id)?;
            let cast = if sub.contains_id("cast-id")
                || sub.contains_id("address")
                || sub.contains_id("chain-id")
            {
                cast_from(sub, id)
            } else {
                previous.cast
            };
            let record = host.update(id, &source, cast)?;
            println!("{} program '{}'", "Updated".green(), record.id);
        }
        Some(("delete", sub)) => {
            let record = host.delete(required(sub, "id")?)?;
            println!("{} program '{}'", "Deleted".yellow(), record.id);
        }
        Some(("list", _)) => {
            for id in host.list()? {
                println!("{}", id);
            }
        }
        Some(("trigger", sub)) => {
            let id = required(sub, "id")?;
            let event = read_event(sub)?.unwrap_or(Value::Null);
            let report = host.handle_event(id, event).await?;
            print_report(&report, config.log_format)?;
        }
        Some(("dispatch", sub)) => {
            let address = required(sub, "address")?;
            let event = read_event(sub)?.unwrap_or(Value::Null);
            let reports = host.dispatch(address, event).await?;
            if reports.is_empty() {
                println!("No programs listen to {}", address);
            }
            for report in &reports {
                print_report(report, config.log_format)?;
            }
        }
        _ => return Err("unknown program command".into()),
    }
    Ok(())
}
