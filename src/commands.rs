//! Slash-command classification for outgoing text
//!
//! Commands are executed by the server; the client only needs to know
//! whether a message is a command (no thinking indicator) and whether it
//! switches the active model (refresh the model list when the reply ends).

use crate::reducer::SendIntent;

/// A parsed `/name args` command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    /// Lowercased command name without the leading slash
    pub name: String,

    /// Trimmed text after the name (may be empty)
    pub args: String,
}

impl SlashCommand {
    /// Parse `text` as a slash command
    ///
    /// Returns `None` for ordinary messages, including a lone `/`.
    pub fn parse(text: &str) -> Option<Self> {
        let body = text.trim().strip_prefix('/')?;
        let mut parts = body.splitn(2, char::is_whitespace);
        let name = parts.next().filter(|n| !n.is_empty())?.to_lowercase();
        let args = parts.next().unwrap_or("").trim().to_string();
        Some(Self { name, args })
    }

    /// `/model <name>` switches the active model
    pub fn switches_model(&self) -> bool {
        self.name == "model" && !self.args.is_empty()
    }
}

/// Classify outgoing text into a send intent
pub fn classify(text: &str) -> SendIntent {
    match SlashCommand::parse(text) {
        Some(cmd) => SendIntent::command(cmd.switches_model()),
        None => SendIntent::message(),
    }
}
