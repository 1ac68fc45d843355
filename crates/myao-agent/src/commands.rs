//! Slash commands addressed to the bot

/// A recognized bot command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    /// List available commands
    Help,
    /// Summarize and replace the memory
    Reset,
}

impl BotCommand {
    /// Parse the command from the second whitespace token, as in
    /// `@myao /reset`. Unknown commands are not commands.
    pub fn parse(text: &str) -> Option<Self> {
        match text.split_whitespace().nth(1)? {
            "/help" => Some(BotCommand::Help),
            "/reset" => Some(BotCommand::Reset),
            _ => None,
        }
    }
}

pub fn help_message() -> &'static str {
    "Available commands:\n/help - Show this help\n/reset - Reset the old memories\n"
}
