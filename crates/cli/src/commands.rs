//! Clap command tree.

use clap::builder::PossibleValuesParser;
use clap::{value_parser, Arg, ArgAction, Command};
use tally::{BackendKind, ScenarioKind};

fn scenario_names() -> PossibleValuesParser {
    PossibleValuesParser::new(ScenarioKind::ALL.map(|k| k.name()))
}

fn backend_names() -> PossibleValuesParser {
    PossibleValuesParser::new(BackendKind::ALL.map(|b| b.name()))
}

/// Build the `tally` command.
pub fn build_cli() -> Command {
    Command::new("tally")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Race concurrent clients on one counter and check what survives")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_name("FILE")
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("scenario")
                .long("scenario")
                .short('s')
                .global(true)
                .value_parser(scenario_names())
                .help("Scenario to run or whose store to act on"),
        )
        .arg(
            Arg::new("backend")
                .long("backend")
                .short('b')
                .global(true)
                .value_parser(backend_names())
                .help("Backend, when no scenario is given"),
        )
        .arg(
            Arg::new("sql-path")
                .long("sql-path")
                .global(true)
                .value_name("PATH")
                .help("SQLite database file"),
        )
        .arg(
            Arg::new("file")
                .long("file")
                .global(true)
                .value_name("PATH")
                .help("Counter file for the file backend"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print JSON instead of text"),
        )
        .subcommand(
            Command::new("run")
                .about("Run one scenario and report throughput and consistency")
                .arg(
                    Arg::new("clients")
                        .long("clients")
                        .short('n')
                        .value_parser(value_parser!(usize))
                        .help("Concurrent workers"),
                )
                .arg(
                    Arg::new("requests-per-client")
                        .long("requests-per-client")
                        .short('r')
                        .value_parser(value_parser!(usize))
                        .help("Increments per worker"),
                )
                .arg(
                    Arg::new("reset")
                        .long("reset")
                        .action(ArgAction::SetTrue)
                        .help("Reset the counter before running"),
                )
                .arg(
                    Arg::new("prepare")
                        .long("prepare")
                        .action(ArgAction::SetTrue)
                        .help("Create the backing store first if absent"),
                )
                .arg(
                    Arg::new("redo-operation")
                        .long("redo-operation")
                        .action(ArgAction::SetTrue)
                        .help("Reissue atomic calls that lose their session"),
                )
                .arg(
                    Arg::new("think-time-ms")
                        .long("think-time-ms")
                        .value_parser(value_parser!(u64))
                        .help("Sleep between read and write"),
                ),
        )
        .subcommand(Command::new("prepare").about("Create the backing store if absent"))
        .subcommand(
            Command::new("reset").about("Overwrite the counter").arg(
                Arg::new("value")
                    .long("value")
                    .value_parser(value_parser!(u64))
                    .help("New value (default: configured initial value)"),
            ),
        )
        .subcommand(Command::new("read").about("Print the current counter"))
        .subcommand(Command::new("scenarios").about("List scenarios"))
}
