//! ArgMatches → configuration and action.
//!
//! Configuration is layered: defaults, then the `--config` file, then
//! `TALLY_*` environment variables, then command-line flags.

use clap::ArgMatches;
use std::path::PathBuf;
use tally::TallyConfig;

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    /// Run the configured scenario.
    Run {
        /// Prepare the store first
        prepare: bool,
    },
    /// Create the store if absent.
    Prepare,
    /// Overwrite the counter; `None` means the configured initial value.
    Reset {
        /// New value
        value: Option<u64>,
    },
    /// Print the counter.
    Read,
    /// List scenarios.
    Scenarios,
}

/// Convert clap ArgMatches into a CliAction.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, String> {
    let (sub_name, sub_matches) = matches
        .subcommand()
        .ok_or_else(|| "No command provided".to_string())?;

    match sub_name {
        "run" => Ok(CliAction::Run {
            prepare: sub_matches.get_flag("prepare"),
        }),
        "prepare" => Ok(CliAction::Prepare),
        "reset" => Ok(CliAction::Reset {
            value: sub_matches.get_one::<u64>("value").copied(),
        }),
        "read" => Ok(CliAction::Read),
        "scenarios" => Ok(CliAction::Scenarios),
        other => Err(format!("Unknown command: {}", other)),
    }
}

/// Build the run configuration from every layer.
pub fn load_config<F>(matches: &ArgMatches, env: F) -> Result<TallyConfig, String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => TallyConfig::load(path).map_err(|e| e.to_string())?,
        None => TallyConfig::default(),
    };
    config.apply_env_with(env).map_err(|e| e.to_string())?;
    apply_flags(&mut config, matches)?;
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn apply_flags(config: &mut TallyConfig, matches: &ArgMatches) -> Result<(), String> {
    if let Some(name) = matches.get_one::<String>("backend") {
        config.backend = Some(name.parse().map_err(|e: tally::Error| e.to_string())?);
        config.scenario = None;
    }
    if let Some(name) = matches.get_one::<String>("scenario") {
        config.scenario = Some(name.parse().map_err(|e: tally::Error| e.to_string())?);
        if matches.get_one::<String>("backend").is_none() {
            config.backend = None;
        }
    }
    if let Some(path) = matches.get_one::<String>("sql-path") {
        config.sql.path = PathBuf::from(path);
    }
    if let Some(path) = matches.get_one::<String>("file") {
        config.file.path = PathBuf::from(path);
    }

    if let Some(("run", run)) = matches.subcommand() {
        if let Some(n) = run.get_one::<usize>("clients") {
            config.workers = *n;
        }
        if let Some(r) = run.get_one::<usize>("requests-per-client") {
            config.requests_per_worker = *r;
        }
        if run.get_flag("reset") {
            config.reset = true;
        }
        if run.get_flag("redo-operation") {
            config.grid.redo_operation = true;
        }
        if let Some(ms) = run.get_one::<u64>("think-time-ms") {
            config.think_time_ms = *ms;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_cli;
    use tally::ScenarioKind;

    fn matches(args: &[&str]) -> ArgMatches {
        build_cli().try_get_matches_from(args).unwrap()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn run_flags_override_defaults() {
        let m = matches(&[
            "tally",
            "run",
            "--scenario",
            "row-locking",
            "--clients",
            "5",
            "--requests-per-client",
            "200",
            "--reset",
            "--prepare",
            "--sql-path",
            "/tmp/c.db",
        ]);
        assert_eq!(matches_to_action(&m).unwrap(), CliAction::Run { prepare: true });

        let config = load_config(&m, no_env).unwrap();
        assert_eq!(config.scenario_kind(), ScenarioKind::RowLocking);
        assert_eq!(config.workers, 5);
        assert_eq!(config.requests_per_worker, 200);
        assert!(config.reset);
        assert_eq!(config.sql.path, PathBuf::from("/tmp/c.db"));
    }

    #[test]
    fn flags_beat_environment() {
        let m = matches(&["tally", "run", "--scenario", "in-place", "--clients", "3"]);
        let config = load_config(&m, |name| match name {
            "TALLY_WORKERS" => Some("9".into()),
            "TALLY_REQUESTS_PER_WORKER" => Some("11".into()),
            "TALLY_SCENARIO" => Some("optimistic".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.workers, 3);
        assert_eq!(config.requests_per_worker, 11);
        assert_eq!(config.scenario_kind(), ScenarioKind::InPlace);
    }

    #[test]
    fn scenario_flag_clears_env_backend() {
        let m = matches(&["tally", "read", "--scenario", "atomic-long"]);
        let config = load_config(&m, |name| {
            (name == "TALLY_BACKEND").then(|| "sql".to_string())
        })
        .unwrap();
        assert_eq!(config.scenario_kind(), ScenarioKind::AtomicLong);
    }

    #[test]
    fn backend_flag_picks_default_scenario() {
        let m = matches(&["tally", "prepare", "--backend", "map"]);
        let config = load_config(&m, no_env).unwrap();
        assert_eq!(config.scenario_kind(), ScenarioKind::MapPessimistic);
        assert_eq!(matches_to_action(&m).unwrap(), CliAction::Prepare);
    }

    #[test]
    fn mismatched_backend_and_scenario_is_rejected() {
        let m = matches(&["tally", "run", "--backend", "map", "--scenario", "in-place"]);
        assert!(load_config(&m, no_env).unwrap_err().contains("configuration fault"));
    }

    #[test]
    fn zero_clients_is_rejected() {
        let m = matches(&["tally", "run", "--clients", "0"]);
        assert!(load_config(&m, no_env).is_err());
    }

    #[test]
    fn redo_and_think_time_flags() {
        let m = matches(&[
            "tally",
            "run",
            "--scenario",
            "atomic-long",
            "--redo-operation",
            "--think-time-ms",
            "10",
        ]);
        let config = load_config(&m, no_env).unwrap();
        assert!(config.grid.redo_operation);
        assert_eq!(config.think_time_ms, 10);
    }

    #[test]
    fn reset_value_is_optional() {
        let m = matches(&["tally", "reset", "--value", "42"]);
        assert_eq!(
            matches_to_action(&m).unwrap(),
            CliAction::Reset { value: Some(42) }
        );
        let m = matches(&["tally", "reset"]);
        assert_eq!(matches_to_action(&m).unwrap(), CliAction::Reset { value: None });
    }

    #[test]
    fn unknown_scenario_is_a_parse_error() {
        assert!(build_cli()
            .try_get_matches_from(["tally", "run", "--scenario", "nope"])
            .is_err());
    }
}
