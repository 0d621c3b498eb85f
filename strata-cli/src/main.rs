//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::io::Write;
use std::process::ExitCode;

use strata_cli::CliError;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match strata_cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            let mut stderr = std::io::stderr().lock();
            if writeln!(stderr, "strata: {err}").is_err() {
                return ExitCode::from(2);
            }
            ExitCode::FAILURE
        }
    }
}
