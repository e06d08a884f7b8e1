use cast_vm::cli;
use colored::Colorize;
use env_logger::Env;
use std::process;

#[tokio::main]
async fn main() {
    let matches = cli::build_cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    if let Err(err) = cli::dispatch(&matches).await {
        eprintln!("{} {}", "Error:".red().bold(), err);
        process::exit(1);
    }
}
