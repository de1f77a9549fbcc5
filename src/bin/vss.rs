// src/bin/vss.rs

use clap::Parser;
use colored::*;
use log::LevelFilter;
use vss::{
    cli::{self, Cli, dispatcher},
    core::orchestrator::RunError,
    t,
};

/// Sets up logging, dispatches, and turns every error into an exit code in one place.
fn main() {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if cli.debug {
        logger.filter_module("vss", LevelFilter::Debug);
    }
    logger.init();

    if let Err(e) = dispatcher::dispatch(cli) {
        let code = cli::exit_code_for(&e);

        if let Some(RunError::ScriptFailed { name, code }) = e.downcast_ref::<RunError>() {
            eprintln!(
                "\n{}",
                format!(t!("run.error.script_failed"), name = name, code = code)
                    .red()
                    .bold()
            );
        } else if code == 1 {
            eprintln!("\n{}: {}", t!("common.error").red().bold(), e);
        }
        // Cancelled prompts (0) and interrupted scripts (130) end quietly.
        std::process::exit(code);
    }
}
