//! `uad` binary entry point.

mod cli_app;

use clap::Parser;
use colored::Colorize;

use cli_app::Cli;

fn main() {
    let cli = Cli::parse();
    if let Err(err) = cli_app::run(&cli) {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(err.exit_code());
    }
}
