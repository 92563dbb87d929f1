// Entrypoint for the CLI application.
// Keeps `main` small: parse arguments, set up logging, hand off to the UI
// layer and turn any error into a message plus a non-zero exit status.

use std::process::ExitCode;

use clap::Parser;
use mockfactory_cli::{cli::Cli, logging, ui};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    match ui::run(cli) {
        Ok(code) => code,
        Err(e) => {
            ui::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
