use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use renderer::ShaderPicker;
use tracing::warn;

/// Asks for a shader path on the terminal.
#[derive(Debug, Default)]
pub struct StdinPicker;

impl ShaderPicker for StdinPicker {
    fn pick(&mut self) -> Option<PathBuf> {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "shader path (empty to cancel): ");
        let _ = stderr.flush();
        read_selection(io::stdin().lock())
    }
}

fn read_selection<R: BufRead>(mut reader: R) -> Option<PathBuf> {
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => parse_selection(&line),
        Err(err) => {
            warn!(error = %err, "failed to read shader path");
            None
        }
    }
}

/// Trims whitespace and one pair of surrounding quotes, as left by
/// drag-and-drop into a terminal.
fn parse_selection(line: &str) -> Option<PathBuf> {
    let trimmed = line.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|quote| {
            trimmed
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(trimmed);
    (!unquoted.is_empty()).then(|| PathBuf::from(unquoted))
}
