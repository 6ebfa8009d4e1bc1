//! Terminal output helpers for the CLI.
//!
//! Colored status lines, a spinner shown while the pipeline runs, and the
//! summary printed above a report.

use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::time::Duration;

use crate::models::{FlightSource, PipelineResult};

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Check if stderr is a terminal (where the spinner draws).
pub fn stderr_is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Status types for colored output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Error,
    Warning,
    Info,
}

/// Status icons for different outcomes.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Success => "✓",
        Status::Error => "✗",
        Status::Warning => "⚠",
        Status::Info => "ℹ",
    }
}

/// Icon per flight stream
pub fn source_icon(source: FlightSource) -> &'static str {
    match source {
        FlightSource::Structured => "✈",
        FlightSource::HiddenCity => "🔀",
        FlightSource::SuggestedHiddenCity => "🤖",
    }
}

/// A colored status line
pub fn status_line(status: Status, msg: &str) -> String {
    let icon = status_icon(status);
    match status {
        Status::Success => format!("{} {}", icon.green().bold(), msg),
        Status::Error => format!("{} {}", icon.red().bold(), msg),
        Status::Warning => format!("{} {}", icon.yellow().bold(), msg),
        Status::Info => format!("{} {}", icon.cyan().bold(), msg),
    }
}

/// Summary block printed before the report on a terminal
pub fn summary(result: &PipelineResult) -> String {
    let counts = &result.source_counts;
    let mut lines = Vec::new();

    let headline = if result.success {
        status_line(
            Status::Success,
            &format!("Found {} flights in {:.1}s", counts.total(), result.elapsed_ms as f64 / 1000.0),
        )
    } else {
        status_line(Status::Error, "AI analysis unavailable, showing plain statistics")
    };
    lines.push(headline);

    for (source, count) in [
        (FlightSource::Structured, counts.structured),
        (FlightSource::HiddenCity, counts.hidden_city),
        (FlightSource::SuggestedHiddenCity, counts.ai_recommended),
    ] {
        lines.push(format!(
            "  {} {:<26} {}",
            source_icon(source),
            source.name().dimmed(),
            count.bold()
        ));
    }

    match (&result.model_used, result.fallback_used) {
        (Some(model), true) => lines.push(status_line(
            Status::Warning,
            &format!("Report written by fallback model {}", model.yellow()),
        )),
        (Some(model), false) => lines.push(status_line(
            Status::Info,
            &format!("Report written by {}", model.cyan()),
        )),
        (None, _) => {}
    }

    lines.join("\n")
}

/// Spinner shown on stderr while a search runs
pub struct SearchSpinner {
    pb: indicatif::ProgressBar,
}

impl SearchSpinner {
    pub fn new(msg: &str) -> Self {
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));

        Self { pb }
    }

    /// A spinner that draws nothing (non-interactive output)
    pub fn hidden() -> Self {
        Self {
            pb: indicatif::ProgressBar::hidden(),
        }
    }

    pub fn set_message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }

    /// Stop and erase the spinner
    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}
