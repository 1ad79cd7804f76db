//! Command vocabulary, classification, and argument parsing.
//!
//! Parsing is pure syntactic validation: no storage, no transport. Argument
//! faults come back as [`CommandError`] -- data the dispatcher turns into a
//! reply, never a raised fault.

use std::fmt;

use multifeed_types::RedirectionId;

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// Create a redirection between two syntactically valid channel
    /// references (normalized to `@username` form, not yet resolved).
    Add {
        source: String,
        destination: String,
    },
    Activate(RedirectionId),
    Deactivate(RedirectionId),
    Remove(RedirectionId),
    List,
    /// A recognized command from the reserved filter/transformation
    /// vocabulary that is not active yet.
    Reserved(&'static str),
}

/// A malformed or missing argument for a recognized command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    /// The command the operator attempted (e.g. `/activate`).
    pub command: &'static str,
    /// What was wrong with the arguments.
    pub detail: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error in command {}: {}", self.command, self.detail)
    }
}

/// How a command's arguments are parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    /// No arguments accepted.
    Bare,
    /// Two channel references: source and destination.
    ChannelPair,
    /// A single redirection id.
    Id,
    /// Reserved vocabulary; arguments are not inspected.
    Reserved,
}

/// One entry of the fixed command vocabulary.
#[derive(Debug)]
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    grammar: Grammar,
}

/// The closed command vocabulary, built once. The reserved tail covers the
/// filter/transformation commands that parse but are not yet routed to any
/// lifecycle operation.
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "/start",
        usage: "/start",
        grammar: Grammar::Bare,
    },
    CommandSpec {
        name: "/help",
        usage: "/help",
        grammar: Grammar::Bare,
    },
    CommandSpec {
        name: "/add",
        usage: "/add <source> <destination>",
        grammar: Grammar::ChannelPair,
    },
    CommandSpec {
        name: "/activate",
        usage: "/activate <redirection-id>",
        grammar: Grammar::Id,
    },
    CommandSpec {
        name: "/deactivate",
        usage: "/deactivate <redirection-id>",
        grammar: Grammar::Id,
    },
    CommandSpec {
        name: "/remove",
        usage: "/remove <redirection-id>",
        grammar: Grammar::Id,
    },
    CommandSpec {
        name: "/list",
        usage: "/list",
        grammar: Grammar::Bare,
    },
    CommandSpec {
        name: "/filter",
        usage: "/filter <redirection-id> <name> <state>",
        grammar: Grammar::Reserved,
    },
    CommandSpec {
        name: "/filters",
        usage: "/filters <redirection-id>",
        grammar: Grammar::Reserved,
    },
    CommandSpec {
        name: "/transform",
        usage: "/transform <redirection-id> <old> <new>",
        grammar: Grammar::Reserved,
    },
    CommandSpec {
        name: "/transforms",
        usage: "/transforms <redirection-id>",
        grammar: Grammar::Reserved,
    },
    CommandSpec {
        name: "/transformrank",
        usage: "/transformrank <redirection-id> <rank> <rank>",
        grammar: Grammar::Reserved,
    },
    CommandSpec {
        name: "/transformremove",
        usage: "/transformremove <transformation-id>",
        grammar: Grammar::Reserved,
    },
];

/// Match the first token of `text` against the command vocabulary.
///
/// Bot-mention suffixes are stripped (`/list@multifeed_bot` matches `/list`).
/// Returns `None` for anything outside the fixed vocabulary.
pub fn classify(text: &str) -> Option<&'static CommandSpec> {
    let first = text.trim().split_whitespace().next()?;
    let name = first.split('@').next().unwrap_or(first).to_lowercase();
    COMMANDS.iter().find(|spec| spec.name == name)
}

impl CommandSpec {
    /// Parse the full message text against this command's grammar.
    pub fn parse(&'static self, text: &str) -> Result<Command, CommandError> {
        let args: Vec<&str> = text.trim().split_whitespace().skip(1).collect();

        match self.grammar {
            Grammar::Bare => {
                if !args.is_empty() {
                    return Err(self.error(format!("takes no arguments (usage: {})", self.usage)));
                }
                Ok(match self.name {
                    "/start" => Command::Start,
                    "/help" => Command::Help,
                    _ => Command::List,
                })
            }
            Grammar::ChannelPair => {
                let (source, destination) = match args.as_slice() {
                    [s, d] => (*s, *d),
                    _ => {
                        return Err(self.error(format!(
                            "expected SOURCE and DESTINATION channels (usage: {})",
                            self.usage
                        )))
                    }
                };
                let source = normalize_channel_ref(source).map_err(|e| self.error(e))?;
                let destination = normalize_channel_ref(destination).map_err(|e| self.error(e))?;
                Ok(Command::Add {
                    source,
                    destination,
                })
            }
            Grammar::Id => {
                let id = match args.as_slice() {
                    [raw] => parse_redirection_id(raw).map_err(|e| self.error(e))?,
                    [] => {
                        return Err(self.error(format!(
                            "missing redirection id (usage: {})",
                            self.usage
                        )))
                    }
                    _ => {
                        return Err(self.error(format!(
                            "expected a single redirection id (usage: {})",
                            self.usage
                        )))
                    }
                };
                Ok(match self.name {
                    "/activate" => Command::Activate(id),
                    "/deactivate" => Command::Deactivate(id),
                    _ => Command::Remove(id),
                })
            }
            Grammar::Reserved => Ok(Command::Reserved(self.name)),
        }
    }

    fn error(&self, detail: String) -> CommandError {
        CommandError {
            command: self.name,
            detail,
        }
    }
}

/// Validate a channel reference and normalize it to `@username` form.
///
/// Accepted shapes: `@name`, `name`, `t.me/name`, `https://t.me/name`.
/// Usernames follow the platform rules: 5-32 characters from
/// `[A-Za-z0-9_]`, starting with a letter.
fn normalize_channel_ref(raw: &str) -> Result<String, String> {
    let stripped = raw
        .strip_prefix("https://t.me/")
        .or_else(|| raw.strip_prefix("http://t.me/"))
        .or_else(|| raw.strip_prefix("t.me/"))
        .or_else(|| raw.strip_prefix('@'))
        .unwrap_or(raw);

    let valid_len = (5..=32).contains(&stripped.len());
    let valid_start = stripped.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_chars = stripped
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_len && valid_start && valid_chars {
        Ok(format!("@{stripped}"))
    } else {
        Err(format!("`{raw}` is not a valid channel reference"))
    }
}

fn parse_redirection_id(raw: &str) -> Result<RedirectionId, String> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(RedirectionId::new(id)),
        _ => Err(format!("`{raw}` is not a valid redirection id")),
    }
}
