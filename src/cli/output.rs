//! Output formatting utilities for CLI commands

use std::io::{self, Write};

use clap::ValueEnum;
use is_terminal::IsTerminal;

/// How a command prints its result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Readable summary
    #[default]
    Human,
    /// Pretty-printed JSON
    Json,
}

/// Wrap `text` in an ANSI color when stdout is a terminal.
pub fn color(code: &str, text: &str) -> String {
    if io::stdout().is_terminal() {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}

/// Format error message for display
pub fn format_error(operation: &str, details: impl std::fmt::Display) -> String {
    format!("{} failed: {}", operation, details)
}

/// Print a serializable value as pretty JSON.
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| format_error("Serializing output", e))?;
    let mut out = io::stdout().lock();
    writeln!(out, "{}", text).map_err(|e| format_error("Writing output", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_names_operation() {
        assert_eq!(
            format_error("Loading index", "no such file"),
            "Loading index failed: no such file"
        );
    }
}
