//! Assetflow - command-line tool for running asset pipelines

use std::process::ExitCode;

use assetflow::cli;

fn main() -> ExitCode {
    cli::run()
}
