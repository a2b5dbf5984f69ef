//! Bot command parsing.

/// Commands the bot answers to; anything else starting with `/` is ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Chat,
    Model(Option<String>),
    Status,
    Ping,
    Help,
}

impl BotCommand {
    /// `(name, description)` pairs for the Telegram command menu.
    pub const MENU: [(&'static str, &'static str); 6] = [
        ("start", "Forward-only mode: DMs go to the owner"),
        ("chat", "Chat mode: DMs are answered by GPT"),
        ("model", "Show or switch the GPT model"),
        ("status", "Show current mode and model"),
        ("ping", "Check that the bot is alive"),
        ("help", "List commands"),
    ];

    /// Parse a message text into a command.
    ///
    /// Telegram may send `/cmd@botname arg1 ...`; commands addressed to a
    /// different bot return `None`, as do unknown commands.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let (name, target, arg) = split_command(text)?;
        if let (Some(target), Some(me)) = (target, bot_username) {
            if !target.eq_ignore_ascii_case(me) {
                return None;
            }
        }

        let cmd = match name.as_str() {
            "start" => BotCommand::Start,
            "chat" => BotCommand::Chat,
            "model" => BotCommand::Model(arg.split_whitespace().next().map(str::to_string)),
            "status" => BotCommand::Status,
            "ping" => BotCommand::Ping,
            "help" => BotCommand::Help,
            _ => return None,
        };
        Some(cmd)
    }

    /// Commands that change global bot settings.
    pub fn is_admin(&self) -> bool {
        matches!(self, BotCommand::Chat | BotCommand::Model(Some(_)))
    }
}

/// Whether `text` looks like a command at all (known or not).
pub fn is_command(text: &str) -> bool {
    split_command(text).is_some()
}

fn split_command(text: &str) -> Option<(String, Option<&str>, &str)> {
    let rest = text.trim().strip_prefix('/')?;
    let mut parts = rest.splitn(2, char::is_whitespace);
    let head = parts.next().unwrap_or("");
    let arg = parts.next().unwrap_or("").trim();

    let (name, target) = match head.split_once('@') {
        Some((n, t)) => (n, Some(t)),
        None => (head, None),
    };
    if name.is_empty() {
        return None;
    }
    Some((name.to_lowercase(), target, arg))
}
