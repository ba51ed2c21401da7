//! Output rendering for the CLI: human tables or machine JSON.

use anyhow::Result;
use serde::Serialize;

/// How command payloads are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Plain text for terminals.
    Human,
    /// Pretty-printed JSON for scripts and agents.
    Json,
}

/// Render `payload` to stdout in the selected mode.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render<T: Serialize>(
    mode: OutputMode,
    payload: &T,
    human: impl FnOnce(&T) -> String,
) -> Result<()> {
    match mode {
        OutputMode::Json => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputMode::Human => {
            let text = human(payload);
            if !text.is_empty() {
                println!("{text}");
            }
        }
    }
    Ok(())
}
