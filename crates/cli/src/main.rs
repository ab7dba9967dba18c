//! Tally CLI: race concurrent clients on one counter.
//!
//! ```text
//! tally run --scenario optimistic --clients 5 --requests-per-client 10000 --reset --prepare
//! tally read --scenario optimistic
//! tally scenarios
//! ```
//!
//! Exit codes: 0 success, 1 error, 2 consistency violated.

mod commands;
mod format;
mod parse;

use std::process;

use tally::Tally;
use tracing_subscriber::EnvFilter;

use commands::build_cli;
use format::{format_counter, format_error, format_report, format_scenarios, OutputMode};
use parse::{load_config, matches_to_action, CliAction};

const EXIT_ERROR: i32 = 1;
const EXIT_VIOLATION: i32 = 2;

fn main() {
    init_logging();

    let matches = build_cli().get_matches();
    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(EXIT_ERROR);
        }
    };

    if action == CliAction::Scenarios {
        println!("{}", format_scenarios(mode));
        return;
    }

    let config = match load_config(&matches, |name| std::env::var(name).ok()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("(error) {}", e);
            process::exit(EXIT_ERROR);
        }
    };

    let tally = match Tally::open(config) {
        Ok(tally) => tally,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(EXIT_ERROR);
        }
    };

    process::exit(execute(&tally, action, mode));
}

/// Logs go to stderr so report output stays clean; `RUST_LOG` overrides
/// the default `info` level.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute(tally: &Tally, action: CliAction, mode: OutputMode) -> i32 {
    let outcome = match action {
        CliAction::Run { prepare } => {
            let run = || {
                if prepare {
                    tally.prepare()?;
                }
                tally.run()
            };
            match run() {
                Ok(report) => {
                    println!("{}", format_report(&report, mode));
                    return if report.is_violation() {
                        EXIT_VIOLATION
                    } else {
                        0
                    };
                }
                Err(e) => Err(e),
            }
        }
        CliAction::Prepare => tally.prepare().map(|()| {
            tracing::info!(scenario = %tally.scenario(), "store prepared");
        }),
        CliAction::Reset { value } => tally
            .reset_to(value.unwrap_or(tally.config().initial_value))
            .and_then(|()| tally.read())
            .map(|state| println!("{}", format_counter(&state, mode))),
        CliAction::Read => tally
            .read()
            .map(|state| println!("{}", format_counter(&state, mode))),
        CliAction::Scenarios => {
            println!("{}", format_scenarios(mode));
            Ok(())
        }
    };

    match outcome {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            EXIT_ERROR
        }
    }
}
