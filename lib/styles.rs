//! CLI styles for clap, spinners and progress bars.

use clap::builder::styling::{AnsiColor, Color, Style, Styles};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Single-line spinner that resolves into a `✓` or `✗` status line.
pub struct Spinner {
    bar: ProgressBar,
    message: String,
    indent: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Spinner {
    /// Start a spinner with the default indent.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_indent(message, 2)
    }

    /// Start a spinner indented by `indent` spaces.
    pub fn with_indent(message: impl Into<String>, indent: usize) -> Self {
        let message = message.into();
        let bar = ProgressBar::new_spinner();
        let template = format!("{}{{spinner:.cyan}} {{msg}}", " ".repeat(indent));
        bar.set_style(
            ProgressStyle::default_spinner()
                .template(&template)
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ "),
        );
        bar.set_message(message.clone());
        bar.enable_steady_tick(Duration::from_millis(80));

        Self {
            bar,
            message,
            indent,
        }
    }

    /// Stop the spinner and print a success line.
    pub fn succeed(self, message: Option<&str>) {
        self.bar.finish_and_clear();
        println!(
            "{}{} {}",
            " ".repeat(self.indent),
            "✓".bright_green(),
            message.unwrap_or(&self.message)
        );
    }

    /// Stop the spinner and print a failure line.
    pub fn fail(self, message: Option<&str>) {
        self.bar.finish_and_clear();
        println!(
            "{}{} {}",
            " ".repeat(self.indent),
            "✗".bright_red(),
            message.unwrap_or(&self.message)
        );
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

pub fn styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .usage(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
}

/// Byte progress bar for streaming an archive upload.
pub fn upload_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  Uploading [{bar:30.cyan/dim}] {bytes:>10}/{total_bytes:<10} {bytes_per_sec}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█░░"),
    );
    pb
}

/// Human readable byte size.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
    }
}
