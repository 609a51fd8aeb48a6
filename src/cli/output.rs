//! Status output in human, JSON and key=value formats
//!
//! Status goes to stdout, one record per build event, while tracing logs go
//! to stderr. The JSON and key=value formats emit exactly one line per event
//! so CI log scrapers can follow a run.
//!
//! # Example
//!
//! ```
//! use build_retry::cli::output::{OutputFormat, OutputFormatter};
//! use build_retry::progress::BuildEvent;
//!
//! let formatter = OutputFormatter::new(OutputFormat::KeyValue);
//! let line = formatter.format_event(&BuildEvent::WarmupStarted {
//!     image: "python:3.11-slim".to_string(),
//! });
//! assert!(line.contains("event=warmup_started"));
//! ```

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::warn;

use crate::config::BuildRetryConfig;
use crate::orchestrator::{BuildOutcome, PreconditionFailure};
use crate::progress::{BuildEvent, ProgressHandler};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Progress lines and a summary banner
    #[default]
    Human,
    /// One JSON object per line
    Json,
    /// One line of `key=value` pairs per event
    KeyValue,
}

/// Formats build events and configuration for stdout
#[derive(Debug, Clone, Copy)]
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Renders one event. Human output may span several lines; the structured
    /// formats never do.
    pub fn format_event(&self, event: &BuildEvent) -> String {
        match self.format {
            OutputFormat::Human => format_event_human(event),
            OutputFormat::Json => {
                let (name, fields) = event_fields(event);
                format_record_json(name, fields)
            }
            OutputFormat::KeyValue => {
                let (name, fields) = event_fields(event);
                format_record_kv(name, fields)
            }
        }
    }

    /// Renders configuration display
    pub fn format_config(&self, config: &BuildRetryConfig) -> Result<String> {
        let config_map: BTreeMap<String, String> = config.to_display_map().into_iter().collect();
        match self.format {
            OutputFormat::Human => Ok(config.to_string()),
            OutputFormat::Json => serde_json::to_string_pretty(&config_map)
                .context("Failed to serialize config to JSON"),
            OutputFormat::KeyValue => Ok(config_map
                .iter()
                .map(|(key, value)| format!("{}={}", key, kv_value(&Value::String(value.clone()))))
                .collect::<Vec<_>>()
                .join("\n")),
        }
    }
}

fn secs(duration: Duration) -> f64 {
    (duration.as_millis() as f64) / 1000.0
}

fn path_value(path: &Path) -> Value {
    Value::String(path.display().to_string())
}

/// Stable event name plus its fields in display order
fn event_fields(event: &BuildEvent) -> (&'static str, Vec<(&'static str, Value)>) {
    match event {
        BuildEvent::Started { target, candidates } => (
            "started",
            vec![("target", json!(target)), ("candidates", json!(candidates))],
        ),
        BuildEvent::EngineReady { engine } => ("engine_ready", vec![("engine", json!(engine))]),
        BuildEvent::EngineUnavailable { engine, reason } => (
            "engine_unavailable",
            vec![("engine", json!(engine)), ("reason", json!(reason))],
        ),
        BuildEvent::WarmupStarted { image } => ("warmup_started", vec![("image", json!(image))]),
        BuildEvent::WarmupComplete { image, elapsed } => (
            "warmup_complete",
            vec![("image", json!(image)), ("elapsed_secs", json!(secs(*elapsed)))],
        ),
        BuildEvent::WarmupFailed { image, error } => (
            "warmup_failed",
            vec![("image", json!(image)), ("error", json!(error))],
        ),
        BuildEvent::CandidateSkipped { candidate } => {
            ("candidate_skipped", vec![("candidate", path_value(candidate))])
        }
        BuildEvent::AttemptStarted {
            candidate,
            attempt,
            max_attempts,
        } => (
            "attempt_started",
            vec![
                ("candidate", path_value(candidate)),
                ("attempt", json!(attempt)),
                ("max_attempts", json!(max_attempts)),
            ],
        ),
        BuildEvent::AttemptSucceeded {
            candidate,
            attempt,
            elapsed,
        } => (
            "attempt_succeeded",
            vec![
                ("candidate", path_value(candidate)),
                ("attempt", json!(attempt)),
                ("elapsed_secs", json!(secs(*elapsed))),
            ],
        ),
        BuildEvent::AttemptFailed {
            candidate,
            attempt,
            max_attempts,
            error,
        } => (
            "attempt_failed",
            vec![
                ("candidate", path_value(candidate)),
                ("attempt", json!(attempt)),
                ("max_attempts", json!(max_attempts)),
                ("error", json!(error)),
            ],
        ),
        BuildEvent::RetryScheduled {
            candidate,
            next_attempt,
            delay,
        } => (
            "retry_scheduled",
            vec![
                ("candidate", path_value(candidate)),
                ("next_attempt", json!(next_attempt)),
                ("delay_secs", json!(delay.as_secs())),
            ],
        ),
        BuildEvent::CandidateExhausted {
            candidate,
            attempts,
        } => (
            "candidate_exhausted",
            vec![
                ("candidate", path_value(candidate)),
                ("attempts", json!(attempts)),
            ],
        ),
        BuildEvent::Finished {
            target,
            outcome,
            total_time,
        } => {
            let mut fields = vec![
                ("target", json!(target)),
                ("outcome", json!(outcome.label())),
                ("exit_code", json!(outcome.exit_code())),
            ];
            match outcome {
                BuildOutcome::Success { candidate, attempt } => {
                    fields.push(("candidate", path_value(candidate)));
                    fields.push(("attempt", json!(attempt)));
                }
                BuildOutcome::Failure { hints } => fields.push(("hints", json!(hints))),
                BuildOutcome::PreconditionFailed(failure) => {
                    fields.push(("reason", json!(failure.to_string())))
                }
                BuildOutcome::Cancelled => {}
            }
            fields.push(("total_secs", json!(secs(*total_time))));
            ("finished", fields)
        }
    }
}

fn format_record_json(name: &str, fields: Vec<(&'static str, Value)>) -> String {
    let mut record = Map::new();
    record.insert("event".to_string(), json!(name));
    record.insert(
        "timestamp".to_string(),
        json!(chrono::Utc::now().to_rfc3339()),
    );
    for (key, value) in fields {
        record.insert(key.to_string(), value);
    }
    Value::Object(record).to_string()
}

fn format_record_kv(name: &str, fields: Vec<(&'static str, Value)>) -> String {
    let mut parts = vec![
        format!("ts={}", chrono::Utc::now().to_rfc3339()),
        format!("event={}", name),
    ];
    for (key, value) in fields {
        match value {
            // hints=[a, b] becomes hints_1=a hints_2=b
            Value::Array(items) => parts.extend(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| format!("{}_{}={}", key, i + 1, kv_value(item))),
            ),
            value => parts.push(format!("{}={}", key, kv_value(&value))),
        }
    }
    parts.join(" ")
}

/// Bare when unambiguous, JSON-quoted otherwise
fn kv_value(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => Value::String(value.to_string()).to_string(),
        Value::String(s) => {
            let needs_quotes = s.is_empty()
                || s
                    .chars()
                    .any(|c| c.is_whitespace() || c == '"' || c == '=' || c.is_control());
            if needs_quotes {
                Value::String(s.clone()).to_string()
            } else {
                s.clone()
            }
        }
        other => other.to_string(),
    }
}

fn format_event_human(event: &BuildEvent) -> String {
    match event {
        BuildEvent::Started { target, candidates } => {
            format!("Building {} ({} build file(s) to try)", target, candidates)
        }
        BuildEvent::EngineReady { engine } => format!("\u{2713} Build engine ready ({})", engine),
        BuildEvent::EngineUnavailable { engine, reason } => {
            format!("\u{2717} Build engine unavailable ({}): {}", engine, reason)
        }
        BuildEvent::WarmupStarted { image } => format!("Pre-pulling base image {}...", image),
        BuildEvent::WarmupComplete { image, elapsed } => {
            format!("\u{2713} Base image {} ready ({:.1}s)", image, secs(*elapsed))
        }
        BuildEvent::WarmupFailed { image, error } => format!(
            "\u{26A0} Could not pre-pull {}: {} (continuing)",
            image, error
        ),
        BuildEvent::CandidateSkipped { candidate } => {
            format!("Skipping {}: file not found", candidate.display())
        }
        BuildEvent::AttemptStarted {
            candidate,
            attempt,
            max_attempts,
        } => format!(
            "Building with {} (attempt {}/{})",
            candidate.display(),
            attempt,
            max_attempts
        ),
        BuildEvent::AttemptSucceeded {
            candidate,
            attempt,
            elapsed,
        } => format!(
            "\u{2713} Build with {} succeeded on attempt {} ({:.1}s)",
            candidate.display(),
            attempt,
            secs(*elapsed)
        ),
        BuildEvent::AttemptFailed {
            attempt,
            max_attempts,
            error,
            ..
        } => format!("\u{2717} Attempt {}/{} failed: {}", attempt, max_attempts, error),
        BuildEvent::RetryScheduled { delay, .. } => {
            format!("Retrying in {}s...", delay.as_secs())
        }
        BuildEvent::CandidateExhausted {
            candidate,
            attempts,
        } => format!(
            "All {} attempt(s) with {} failed",
            attempts,
            candidate.display()
        ),
        BuildEvent::Finished {
            target,
            outcome,
            total_time,
        } => format_outcome_human(target, outcome, *total_time),
    }
}

fn format_outcome_human(target: &str, outcome: &BuildOutcome, total_time: Duration) -> String {
    let mut output = String::new();

    match outcome {
        BuildOutcome::Success { candidate, attempt } => {
            output.push_str("\n\u{2713} Build Complete\n");
            output.push_str(RULE);
            output.push('\n');
            output.push_str(&format!("Image:       {}\n", target));
            output.push_str(&format!("Build file:  {}\n", candidate.display()));
            output.push_str(&format!("Attempt:     {}\n", attempt));
        }
        BuildOutcome::Failure { hints } => {
            output.push_str("\n\u{2717} Build Failed\n");
            output.push_str(RULE);
            output.push('\n');
            output.push_str(&format!("Image:       {}\n", target));
            output.push_str("Every build file was tried without success.\n\n");
            output.push_str("Troubleshooting:\n");
            for (i, hint) in hints.iter().enumerate() {
                let connector = if i == hints.len() - 1 {
                    "\u{2514}"
                } else {
                    "\u{251C}"
                };
                output.push_str(&format!("{}\u{2500} {}\n", connector, hint));
            }
        }
        BuildOutcome::PreconditionFailed(failure) => {
            output.push_str("\n\u{2717} Build Not Started\n");
            output.push_str(RULE);
            output.push('\n');
            output.push_str(&format!("Image:       {}\n", target));
            output.push_str(&format!("Reason:      {}\n", failure));
            match failure {
                PreconditionFailure::EngineUnavailable(_) => {
                    output.push_str("\nIs the Docker daemon running? Try: docker info\n");
                }
                PreconditionFailure::PrimaryConfigMissing(_) => {
                    output.push_str("\nPass the build file with --file or set --context.\n");
                }
            }
        }
        BuildOutcome::Cancelled => {
            output.push_str("\n\u{26A0} Build Cancelled\n");
            output.push_str(RULE);
            output.push('\n');
            output.push_str(&format!("Image:       {}\n", target));
        }
    }

    output.push_str(&format!("Total time:  {:.1}s", secs(total_time)));
    output
}

/// Progress handler that writes formatted status records
pub struct StatusPrinter {
    formatter: OutputFormatter,
    out: Mutex<Box<dyn Write + Send>>,
}

impl StatusPrinter {
    pub fn new(formatter: OutputFormatter, out: Box<dyn Write + Send>) -> Self {
        Self {
            formatter,
            out: Mutex::new(out),
        }
    }

    pub fn stdout(formatter: OutputFormatter) -> Self {
        Self::new(formatter, Box::new(io::stdout()))
    }
}

impl ProgressHandler for StatusPrinter {
    fn on_progress(&self, event: &BuildEvent) {
        let line = self.formatter.format_event(event);
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
            warn!("Failed to write status output: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn failed_attempt() -> BuildEvent {
        BuildEvent::AttemptFailed {
            candidate: PathBuf::from("Dockerfile"),
            attempt: 2,
            max_attempts: 3,
            error: "pull access denied".to_string(),
        }
    }

    #[test]
    fn test_json_event_is_single_line_object() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let line = formatter.format_event(&failed_attempt());

        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["event"], "attempt_failed");
        assert_eq!(parsed["candidate"], "Dockerfile");
        assert_eq!(parsed["attempt"], 2);
        assert_eq!(parsed["max_attempts"], 3);
        assert_eq!(parsed["error"], "pull access denied");
        assert!(parsed["timestamp"].is_string());
    }

    #[test]
    fn test_json_finished_includes_outcome() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let line = formatter.format_event(&BuildEvent::Finished {
            target: "app".to_string(),
            outcome: BuildOutcome::Failure {
                hints: vec!["Check network connectivity".to_string()],
            },
            total_time: Duration::from_millis(1500),
        });

        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["target"], "app");
        assert_eq!(parsed["outcome"], "failure");
        assert_eq!(parsed["exit_code"], 1);
        assert_eq!(parsed["hints"][0], "Check network connectivity");
        assert_eq!(parsed["total_secs"], 1.5);
    }

    #[test]
    fn test_kv_quotes_values_with_spaces() {
        let formatter = OutputFormatter::new(OutputFormat::KeyValue);
        let line = formatter.format_event(&failed_attempt());

        assert!(line.starts_with("ts="));
        assert!(line.contains("event=attempt_failed"));
        assert!(line.contains("candidate=Dockerfile"));
        assert!(line.contains("attempt=2"));
        assert!(line.contains("error=\"pull access denied\""));
    }

    /// Splits a key=value record on spaces outside double quotes
    fn kv_tokens(line: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut escaped = false;
        for c in line.chars() {
            if escaped {
                escaped = false;
            } else if c == '\\' && in_quotes {
                escaped = true;
            } else if c == '"' {
                in_quotes = !in_quotes;
            } else if c == ' ' && !in_quotes {
                tokens.push(std::mem::take(&mut current));
                continue;
            }
            current.push(c);
        }
        tokens.push(current);
        tokens
    }

    #[test]
    fn test_kv_failure_outcome_is_all_key_value_pairs() {
        let formatter = OutputFormatter::new(OutputFormat::KeyValue);
        let line = formatter.format_event(&BuildEvent::Finished {
            target: "app".to_string(),
            outcome: BuildOutcome::Failure {
                hints: vec![
                    "Last error: Build with Dockerfile failed: a=b".to_string(),
                    "Check network connectivity".to_string(),
                ],
            },
            total_time: Duration::from_secs(1),
        });

        assert!(!line.contains('\n'));
        for token in kv_tokens(&line) {
            let (key, value) = token
                .split_once('=')
                .unwrap_or_else(|| panic!("token without '=': {:?} in {}", token, line));
            assert!(
                !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
                "bad key {:?} in {}",
                key,
                line
            );
            assert!(!value.is_empty());
        }
        assert!(line.contains("outcome=failure"));
        assert!(line.contains("hints_2=\"Check network connectivity\""));
        assert!(!line.contains('['));
    }

    #[test]
    fn test_kv_value_rendering() {
        assert_eq!(kv_value(&json!("plain")), "plain");
        assert_eq!(kv_value(&json!("")), "\"\"");
        assert_eq!(kv_value(&json!("a=b")), "\"a=b\"");
        assert_eq!(kv_value(&json!(10)), "10");
        assert_eq!(kv_value(&json!(true)), "true");
        assert_eq!(kv_value(&json!({"a": 1})), "\"{\\\"a\\\":1}\"");
    }

    #[test]
    fn test_human_attempt_lines() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        assert_eq!(
            formatter.format_event(&failed_attempt()),
            "\u{2717} Attempt 2/3 failed: pull access denied"
        );
        assert_eq!(
            formatter.format_event(&BuildEvent::RetryScheduled {
                candidate: PathBuf::from("Dockerfile"),
                next_attempt: 3,
                delay: Duration::from_secs(10),
            }),
            "Retrying in 10s..."
        );
    }

    #[test]
    fn test_human_failure_banner_lists_hints() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        let banner = formatter.format_event(&BuildEvent::Finished {
            target: "app".to_string(),
            outcome: BuildOutcome::Failure {
                hints: vec!["first".to_string(), "second".to_string()],
            },
            total_time: Duration::from_secs(42),
        });

        assert!(banner.contains("Build Failed"));
        assert!(banner.contains("Troubleshooting:"));
        assert!(banner.contains("\u{251C}\u{2500} first"));
        assert!(banner.contains("\u{2514}\u{2500} second"));
        assert!(banner.ends_with("Total time:  42.0s"));
    }

    #[test]
    fn test_human_precondition_banner() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        let banner = formatter.format_event(&BuildEvent::Finished {
            target: "app".to_string(),
            outcome: BuildOutcome::PreconditionFailed(PreconditionFailure::PrimaryConfigMissing(
                PathBuf::from("Dockerfile"),
            )),
            total_time: Duration::ZERO,
        });

        assert!(banner.contains("Build Not Started"));
        assert!(banner.contains("primary build file not found: Dockerfile"));
    }

    #[test]
    fn test_format_config_variants() {
        let config = BuildRetryConfig::default();

        let human = OutputFormatter::new(OutputFormat::Human)
            .format_config(&config)
            .unwrap();
        assert!(human.contains("Build Retry Configuration:"));

        let json = OutputFormatter::new(OutputFormat::Json)
            .format_config(&config)
            .unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["max_attempts"], "3");

        let kv = OutputFormatter::new(OutputFormat::KeyValue)
            .format_config(&config)
            .unwrap();
        assert!(kv.lines().any(|l| l == "base_image=python:3.11-slim"));
    }

    #[test]
    fn test_status_printer_writes_one_line_per_event() {
        let buffer = SharedBuffer::default();
        let printer = StatusPrinter::new(
            OutputFormatter::new(OutputFormat::KeyValue),
            Box::new(buffer.clone()),
        );

        printer.on_progress(&BuildEvent::WarmupStarted {
            image: "python:3.11-slim".to_string(),
        });
        printer.on_progress(&failed_attempt());

        let contents = buffer.contents();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("event=warmup_started"));
        assert!(lines[1].contains("event=attempt_failed"));
    }
}
