//! Output formatting for human and JSON modes.

use serde_json::json;
use tally::{CounterState, RunReport, ScenarioKind};

/// Output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Plain text
    Human,
    /// One JSON document
    Json,
}

/// Format a run report.
pub fn format_report(report: &RunReport, mode: OutputMode) -> String {
    match mode {
        OutputMode::Human => report.to_string(),
        OutputMode::Json => serde_json::to_string_pretty(report)
            .unwrap_or_else(|e| format!("(error) cannot encode report: {}", e)),
    }
}

/// Format a counter read.
pub fn format_counter(state: &CounterState, mode: OutputMode) -> String {
    match (mode, state.version) {
        (OutputMode::Human, Some(version)) => format!("{} (version {})", state.value, version),
        (OutputMode::Human, None) => state.value.to_string(),
        (OutputMode::Json, _) => json!({ "count": state.value, "version": state.version }).to_string(),
    }
}

/// Format the scenario catalogue.
pub fn format_scenarios(mode: OutputMode) -> String {
    match mode {
        OutputMode::Human => ScenarioKind::ALL
            .iter()
            .map(|k| {
                format!(
                    "{:<16} {:<7} {}",
                    k.name(),
                    k.backend().name(),
                    k.correctness()
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
        OutputMode::Json => {
            let rows: Vec<_> = ScenarioKind::ALL
                .iter()
                .map(|k| {
                    json!({
                        "scenario": k.name(),
                        "backend": k.backend().name(),
                        "correctness": k.correctness(),
                        "retries": k.retries(),
                    })
                })
                .collect();
            serde_json::Value::Array(rows).to_string()
        }
    }
}

/// Format an error.
pub fn format_error(e: &tally::Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Human => format!("(error) {}", e),
        OutputMode::Json => json!({ "error": e.kind(), "message": e.to_string() }).to_string(),
    }
}
