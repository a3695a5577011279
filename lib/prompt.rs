//! Interactive CLI prompts.
//!
//! Uses cliclack with a custom theme matching the Shoutem style (sky blue).
//! Components that need user input take a `&dyn Prompter` so they can be
//! driven by scripted answers in tests.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use cliclack::{Theme, ThemeState, confirm, input, multiselect, set_theme};
use console::{Style, Term};

use crate::error::{CliError, CliResult};

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

static CTRLC_HANDLER_SET: AtomicBool = AtomicBool::new(false);

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Custom theme matching the Shoutem style.
pub struct ShoutemTheme;

/// User interaction needed by the publish pipeline.
pub trait Prompter: Send + Sync {
    /// Ask a yes/no question.
    fn confirm(&self, message: &str, default: bool) -> CliResult<bool>;

    /// Let the user pick a subset of paths; all are selected initially.
    fn select_paths(&self, message: &str, paths: &[PathBuf]) -> CliResult<Vec<PathBuf>>;

    /// Ask for a line of text.
    fn input(&self, message: &str) -> CliResult<String>;
}

/// Supplies a replacement when a version cannot be published.
pub trait VersionSupplier: Send + Sync {
    /// Return a new version given the rejected one and a suggested default.
    fn next_version(&self, rejected: &str, suggested: &str) -> CliResult<String>;
}

/// Prompter backed by the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Theme for ShoutemTheme {
    fn bar_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().color256(39),
            ThemeState::Error(_) => Style::new().red(),
            _ => Style::new().dim(),
        }
    }

    fn state_symbol_color(&self, state: &ThemeState) -> Style {
        match state {
            ThemeState::Active => Style::new().color256(39),
            ThemeState::Submit => Style::new().color256(39),
            ThemeState::Error(_) => Style::new().red(),
            _ => Style::new().dim(),
        }
    }

    fn input_style(&self, _state: &ThemeState) -> Style {
        Style::new()
    }

    fn placeholder_style(&self, _state: &ThemeState) -> Style {
        Style::new().dim()
    }
}

impl Prompter for TerminalPrompter {
    fn confirm(&self, message: &str, default: bool) -> CliResult<bool> {
        ensure_interactive()?;
        init_theme();
        map_cancelled(confirm(message).initial_value(default).interact())
    }

    fn select_paths(&self, message: &str, paths: &[PathBuf]) -> CliResult<Vec<PathBuf>> {
        ensure_interactive()?;
        init_theme();

        let items: Vec<(PathBuf, String, &str)> = paths
            .iter()
            .map(|p| (p.clone(), p.display().to_string(), ""))
            .collect();

        map_cancelled(
            multiselect(message)
                .items(&items)
                .initial_values(paths.to_vec())
                .max_rows(20)
                .required(false)
                .interact(),
        )
    }

    fn input(&self, message: &str) -> CliResult<String> {
        ensure_interactive()?;
        init_theme();
        map_cancelled(input(message).interact())
    }
}

impl VersionSupplier for TerminalPrompter {
    fn next_version(&self, rejected: &str, suggested: &str) -> CliResult<String> {
        ensure_interactive()?;
        init_theme();

        map_cancelled(
            input(format!(
                "Version {} is already published. Specify another version:",
                rejected
            ))
            .default_input(suggested)
            .validate(|value: &String| {
                if semver::Version::parse(value).is_ok() {
                    Ok(())
                } else {
                    Err("Version must be a valid semantic version (X.Y.Z)")
                }
            })
            .interact(),
        )
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Initialize the theme for cliclack prompts and set up Ctrl+C handler.
pub fn init_theme() {
    set_theme(ShoutemTheme);

    if !CTRLC_HANDLER_SET.swap(true, Ordering::SeqCst) {
        let _ = ctrlc::set_handler(|| {
            let term = Term::stderr();
            let _ = term.show_cursor();
            std::process::exit(130);
        });
    }
}

/// Prompts need a terminal; fail instead of hanging on a closed stdin.
fn ensure_interactive() -> CliResult<()> {
    if std::io::stdin().is_terminal() {
        Ok(())
    } else {
        Err(CliError::Generic(
            "Interactive input required but stdin is not a terminal (use --noconfirm)".into(),
        ))
    }
}

/// Convert IO interrupted errors to Cancelled for clean exit on ESC.
fn map_cancelled<T>(result: Result<T, std::io::Error>) -> CliResult<T> {
    result.map_err(|e| {
        if e.kind() == std::io::ErrorKind::Interrupted {
            CliError::Cancelled
        } else {
            CliError::Io(e)
        }
    })
}
