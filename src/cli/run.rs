use clap::{Arg, ArgMatches, Command};
use colored::Colorize;
use log::debug;
use serde_json::json;

use crate::cli::{cast_args, cast_from, event_arg, read_event, read_file, registry_for, AppError};
use crate::compiler::{compile_source, ProgramError};
use crate::config::RuntimeConfig;
use crate::events::{print_events, LogFormat};
use crate::host::ExecutionReport;
use crate::vm::{ExecutionStatus, Services, VM};

fn file_arg() -> Arg {
    Arg::new("file")
        .value_name("FILE")
        .help("YAML program file")
        .required(true)
}

pub fn check_command() -> Command {
    Command::new("check")
        .about("Parse and compile a program without running it")
        .arg(file_arg())
}

pub fn run_command() -> Command {
    Command::new("run")
        .about("Compile a program and run it once against an event")
        .arg(file_arg())
        .arg(event_arg())
        .args(cast_args())
}

pub fn instructions_command() -> Command {
    Command::new("instructions").about("List every instruction with its argument schema")
}

fn print_program_error(err: &ProgramError) {
    match err {
        ProgramError::Parse(errors) => {
            for error in errors {
                eprintln!("{} {}", "error:".red().bold(), error);
            }
        }
        ProgramError::Compile(error) => eprintln!("{} {}", "error:".red().bold(), error),
    }
}

pub fn handle_check(matches: &ArgMatches, config: &RuntimeConfig) -> Result<(), AppError> {
    let path = matches
        .get_one::<String>("file")
        .ok_or("missing program file")?;
    let source = read_file(path)?;
    let registry = registry_for(config);

    match compile_source(&source, &registry) {
        Ok((document, program)) => {
            println!(
                "{} {} (version {}, {} instructions)",
                "ok".green().bold(),
                document.name.as_deref().unwrap_or(path),
                document.version,
                program.len()
            );
            for (position, call) in program.calls().iter().enumerate() {
                println!("  {:>3}  {}", position, call.name);
            }
            Ok(())
        }
        Err(err) => {
            print_program_error(&err);
            Err(format!("{} was rejected", path).into())
        }
    }
}

pub async fn handle_run(matches: &ArgMatches, config: &RuntimeConfig) -> Result<(), AppError> {
    let path = matches
        .get_one::<String>("file")
        .ok_or("missing program file")?;
    let source = read_file(path)?;
    let event = read_event(matches)?;
    let cast = cast_from(matches, "local");

    let registry = registry_for(config);
    let (_, program) = compile_source(&source, &registry).map_err(|err| {
        print_program_error(&err);
        err
    })?;

    let mut vm = VM::new(Services::new(config.clone())?);
    vm.load_program(program, &cast);
    debug!("Running {} for cast '{}'", path, cast.id);

    let error = vm.execute(event).await.err();
    let report = ExecutionReport {
        program_id: path.clone(),
        status: vm.status(),
        error: error.as_ref().map(ToString::to_string),
        events: vm.get_events().to_vec(),
        globals: vm.globals().clone(),
    };
    print_report(&report, config.log_format)?;

    match error {
        Some(err) => Err(format!("execution failed: {}", err).into()),
        None => Ok(()),
    }
}

pub(crate) fn print_report(report: &ExecutionReport, format: LogFormat) -> Result<(), AppError> {
    match format {
        LogFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        LogFormat::Pretty => {
            let status = report.status.to_string();
            let status = match report.status {
                ExecutionStatus::Completed => status.green(),
                ExecutionStatus::Halted => status.yellow(),
                _ => status.red(),
            };
            println!("{} {}: {}", "Program".bold(), report.program_id, status);
            if let Some(error) = &report.error {
                println!("{} {}", "Error:".red(), error);
            }
            print_events(&report.events, format);
            println!("{}", "Globals:".bold());
            println!("{}", serde_json::to_string_pretty(&report.globals)?);
        }
    }
    Ok(())
}

pub fn handle_instructions(config: &RuntimeConfig) -> Result<(), AppError> {
    let registry = registry_for(config);
    let listing: Vec<_> = registry
        .specs()
        .map(|spec| json!({ "name": spec.name(), "args": spec.args_schema() }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
