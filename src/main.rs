//! Stagehand - command-line tool for building and staging deployable services

use std::process::ExitCode;

use stagehand::cli;

fn main() -> ExitCode {
    cli::run()
}
