//! Terminal output for the CLI commands.
//!
//! Every printed line goes through one [`Line`] value so that human and
//! JSON rendering stay in step. JSON mode writes one object per line to
//! stdout; quiet mode keeps warnings and errors only.

use std::fmt::Display;
use std::sync::OnceLock;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use parking_lot::RwLock;
use serde::Serialize;

/// Output flags taken from the global CLI options.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub quiet: bool,
    pub verbose: u8,
}

impl OutputConfig {
    #[must_use]
    pub const fn new(json: bool, quiet: bool, verbose: u8) -> Self {
        Self {
            json,
            quiet,
            verbose,
        }
    }
}

static CONFIG: OnceLock<RwLock<OutputConfig>> = OnceLock::new();

fn current() -> OutputConfig {
    *CONFIG.get_or_init(RwLock::default).read()
}

/// Apply the global output flags. Call once before printing anything.
pub fn configure(config: OutputConfig) {
    *CONFIG.get_or_init(RwLock::default).write() = config;
}

#[must_use]
pub fn is_json() -> bool {
    current().json
}

#[must_use]
pub fn is_quiet() -> bool {
    current().quiet
}

/// Number of `-v` flags given.
#[must_use]
pub fn verbosity() -> u8 {
    current().verbose
}

/// Colour applied to a value in human output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Good,
    Bad,
    Accent,
    Muted,
}

/// Colour a value for a field. JSON output gets the plain text.
#[must_use]
pub fn paint(value: impl Display, tone: Tone) -> String {
    let value = value.to_string();
    if is_json() {
        return value;
    }
    match tone {
        Tone::Good => value.green().to_string(),
        Tone::Bad => value.red().to_string(),
        Tone::Accent => value.cyan().to_string(),
        Tone::Muted => value.dimmed().to_string(),
    }
}

/// One unit of output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
enum Line<'a> {
    Header { app: &'a str, version: &'a str },
    Section { title: &'a str },
    Field { label: &'a str, value: String },
    Success { message: &'a str },
    Warning { message: &'a str },
    Error { message: &'a str },
    Note { message: &'a str },
    Dispatch { key: &'a str, outcome: &'a str, good: bool },
    TableHeader { columns: Vec<&'a str> },
    TableRow { cells: Vec<String> },
}

impl Line<'_> {
    /// Kept in quiet mode.
    const fn is_problem(&self) -> bool {
        matches!(self, Self::Warning { .. } | Self::Error { .. })
    }

    const fn to_stderr(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    fn human(&self) -> String {
        match self {
            Self::Header { app, version } => format!("{} {}\n", app.bold(), version.dimmed()),
            Self::Section { title } => format!("\n{}", title.bold()),
            Self::Field { label, value } => format!("  {:<14} {value}", label.dimmed()),
            Self::Success { message } => format!("  {} {message}", "✓".green()),
            Self::Warning { message } => format!("  {} {message}", "⚠".yellow()),
            Self::Error { message } => format!("  {} {message}", "×".red()),
            Self::Note { message } => format!("  {}", message.dimmed()),
            Self::Dispatch { key, outcome, good } => {
                let outcome = if *good {
                    outcome.green().to_string()
                } else {
                    outcome.red().to_string()
                };
                format!("  {:<14} {outcome}", key.dimmed())
            }
            Self::TableHeader { .. } | Self::TableRow { .. } => String::new(),
        }
    }
}

fn emit(line: &Line<'_>) {
    let config = current();
    let text = if config.json {
        match serde_json::to_string(line) {
            Ok(text) => text,
            Err(_) => return,
        }
    } else {
        if config.quiet && !line.is_problem() {
            return;
        }
        line.human()
    };
    if line.to_stderr() {
        eprintln!("{text}");
    } else {
        println!("{text}");
    }
}

/// Program name and version.
pub fn header(version: &str) {
    emit(&Line::Header {
        app: env!("CARGO_PKG_NAME"),
        version,
    });
}

pub fn section(title: &str) {
    emit(&Line::Section { title });
}

/// A labelled value, aligned with its neighbours.
pub fn field(label: &str, value: impl Display) {
    emit(&Line::Field {
        label,
        value: value.to_string(),
    });
}

pub fn success(message: &str) {
    emit(&Line::Success { message });
}

pub fn warning(message: &str) {
    emit(&Line::Warning { message });
}

/// Printed to stderr in every mode.
pub fn error(message: &str) {
    emit(&Line::Error { message });
}

pub fn note(message: &str) {
    emit(&Line::Note { message });
}

/// One dispatch result. `good` colours the outcome.
pub fn dispatch(key: &str, outcome: &str, good: bool) {
    emit(&Line::Dispatch { key, outcome, good });
}

/// Right-aligned fixed-width table. Cells wider than their column are cut.
pub struct Table<'a> {
    columns: &'a [(&'a str, usize)],
}

impl<'a> Table<'a> {
    /// Print the header and separator rows.
    #[must_use]
    pub fn start(columns: &'a [(&'a str, usize)]) -> Self {
        let table = Self { columns };
        let config = current();
        if config.json {
            emit(&Line::TableHeader {
                columns: columns.iter().map(|(name, _)| *name).collect(),
            });
        } else if !config.quiet {
            let names: Vec<String> = columns.iter().map(|(name, _)| (*name).to_string()).collect();
            println!("{}", table.layout(&names).dimmed());
            let rule: Vec<String> = columns.iter().map(|(_, w)| "─".repeat(*w)).collect();
            println!("{}", table.layout(&rule).dimmed());
        }
        table
    }

    pub fn row(&self, cells: &[String]) {
        let config = current();
        if config.json {
            emit(&Line::TableRow {
                cells: cells.to_vec(),
            });
        } else if !config.quiet {
            println!("{}", self.layout(cells));
        }
    }

    fn layout(&self, cells: &[String]) -> String {
        let mut line = String::from(" ");
        for (cell, (_, width)) in cells.iter().zip(self.columns) {
            line.push(' ');
            line.push_str(&format!("{:>width$}", fit(cell, *width), width = *width));
        }
        line
    }
}

fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{kept}…")
}

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// A spinner for one slow step. Hidden in JSON and quiet mode.
pub struct Progress {
    bar: ProgressBar,
}

impl Progress {
    #[must_use]
    pub fn start(message: &str) -> Self {
        let config = current();
        let bar = if config.json || config.quiet {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_strings(SPINNER_FRAMES)
                .template("  {spinner:.cyan} {msg}")
            {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        };
        bar.set_message(message.to_string());
        Self { bar }
    }

    pub fn succeed(self, message: &str) {
        self.bar.finish_and_clear();
        success(message);
    }

    /// Failures still print in quiet mode.
    pub fn fail(self, message: &str) {
        self.bar.finish_and_clear();
        warning(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_lines_carry_type_and_payload() {
        let line = Line::Dispatch {
            key: "ab12",
            outcome: "confirmed",
            good: true,
        };
        let value: serde_json::Value = serde_json::from_str(&serde_json::to_string(&line).unwrap()).unwrap();
        assert_eq!(value["type"], "dispatch");
        assert_eq!(value["payload"]["outcome"], "confirmed");
    }

    #[test]
    fn quiet_mode_keeps_problems_only() {
        assert!(Line::Warning { message: "x" }.is_problem());
        assert!(Line::Error { message: "x" }.is_problem());
        assert!(!Line::Field {
            label: "Pools",
            value: "3".into()
        }
        .is_problem());
    }

    #[test]
    fn table_cells_are_cut_to_width() {
        assert_eq!(fit("SOL/USDC", 24), "SOL/USDC");
        let cut = fit("ABCDEFGHIJKLMNOPQRSTUVWXYZ", 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with('…'));

        let columns = [("Pool", 6), ("APY %", 6)];
        let table = Table { columns: &columns };
        let line = table.layout(&["ABCDEFGH".to_string(), "12.50".to_string()]);
        assert_eq!(line, "  ABCDE…  12.50");
    }
}
