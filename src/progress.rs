//! Search progress reporting.
//!
//! Reports per-store progress while a search session streams, so users see
//! which stores have answered and how much is left. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;
use std::str::FromStr;

use price_scout_core::Outcome;

use crate::session::{SearchSession, SessionEvent, SessionState};

/// Reports session progress. Implementations write to stderr (human or JSON).
pub trait SearchProgressReporter: Send + Sync {
    /// Emit one event. Called by the search driver after every session event.
    fn report(&self, session: &SearchSession, event: &SessionEvent);
}

/// Human-friendly progress on stderr:
/// `[2/9  22%] Ripley  ✓  1,204 results  3.40s`.
pub struct StderrProgress;

impl SearchProgressReporter for StderrProgress {
    fn report(&self, session: &SearchSession, event: &SessionEvent) {
        let prefix = format!(
            "[{}/{} {:>3}%]",
            session.completed_sources(),
            session.expected_sources(),
            (session.progress_fraction() * 100.0).round() as u64
        );
        let line = match event {
            SessionEvent::Progress(status) => {
                let mark = match status.outcome {
                    Outcome::Ok => "✓".to_string(),
                    Outcome::Failed => {
                        format!("✗ {}", status.detail.as_deref().unwrap_or("failed"))
                    }
                    Outcome::Pending => "…".to_string(),
                };
                format!(
                    "{} {}  {}  {} results  {:.2}s\n",
                    prefix,
                    status.display_name,
                    mark,
                    format_number(status.result_count),
                    status.elapsed_seconds
                )
            }
            SessionEvent::Results { count } => {
                format!("{} received {} results\n", prefix, format_number(*count as u64))
            }
            SessionEvent::Finished(state) => match state {
                SessionState::Completed => format!("{} search complete\n", prefix),
                SessionState::Cancelled => "search cancelled\n".to_string(),
                SessionState::Failed => format!(
                    "search failed: {}\n",
                    session
                        .error()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "unknown error".to_string())
                ),
                SessionState::Idle | SessionState::Running => return,
            },
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl SearchProgressReporter for JsonProgress {
    fn report(&self, session: &SearchSession, event: &SessionEvent) {
        let obj = match event {
            SessionEvent::Progress(status) => serde_json::json!({
                "event": "progress",
                "session": session.id().to_string(),
                "status": status,
                "completed": session.completed_sources(),
                "total": session.expected_sources(),
                "fraction": session.progress_fraction(),
            }),
            SessionEvent::Results { count } => serde_json::json!({
                "event": "results",
                "session": session.id().to_string(),
                "count": count,
            }),
            SessionEvent::Finished(state) => serde_json::json!({
                "event": "finished",
                "session": session.id().to_string(),
                "state": state,
                "error": session.error().map(|e| e.to_string()),
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl SearchProgressReporter for NoProgress {
    fn report(&self, _session: &SearchSession, _event: &SessionEvent) {}
}

pub(crate) fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn SearchProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

impl FromStr for ProgressMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" | "none" => Ok(ProgressMode::Off),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            other => Err(format!(
                "unknown progress mode '{}'. Use off, human, or json.",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn progress_mode_parses() {
        assert_eq!("json".parse::<ProgressMode>(), Ok(ProgressMode::Json));
        assert_eq!("off".parse::<ProgressMode>(), Ok(ProgressMode::Off));
        assert!("loud".parse::<ProgressMode>().is_err());
    }
}
