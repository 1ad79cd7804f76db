//! Reply payloads and user-facing message text.
//!
//! Every dispatcher outcome maps to a [`Reply`]; the transport layer only
//! ever sees finished text plus a parse mode.

use multifeed_types::{Redirection, RedirectionId};

use crate::command::CommandError;

/// Formatting applied by the transport when sending the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    Plain,
    Markdown,
    Html,
}

/// A finished user-visible reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub mode: ReplyMode,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: ReplyMode::Plain,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: ReplyMode::Markdown,
        }
    }

    pub fn html(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mode: ReplyMode::Html,
        }
    }
}

/// Escape the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn welcome() -> Reply {
    Reply::plain("Welcome to MultiFeed Bot! \u{1f525}\n\nSend /help to get usage instructions")
}

pub fn help() -> Reply {
    Reply::markdown(
        "Typical workflow in the bot:\n\n\
         1. You have two links:\n\
         - `SOURCE` - link to the channel to forward messages FROM \
         (no admin permissions required)\n\
         - `DESTINATION` - link to the channel to forward messages TO \
         (you can add new admins there)\n\n\
         2. You use `/add` command to create a new redirection from \
         `SOURCE` channel to your `DESTINATION` channel\n\n\
         3. You give posting permissions in `DESTINATION` channel TO THE \
         ACCOUNT that was specified after successful execution of step #2\n\n\
         4. You activate the newly created redirection using `/activate` \
         command\n\n\
         Having all 4 steps completed, you can enjoy automatic messages \
         forwarding from `SOURCE` to `DESTINATION` \u{1f525}",
    )
}

pub fn unknown_command() -> Reply {
    Reply::plain("\u{274c} Command does not exist.\n\nType /help")
}

pub fn command_error(error: &CommandError) -> Reply {
    Reply::markdown(format!(
        "\u{274c} Error in command : {}\n\n**{}**",
        error.command, error.detail
    ))
}

pub fn reserved_command(name: &str) -> Reply {
    Reply::plain(format!("{name} is not available yet"))
}

pub fn generic_error() -> Reply {
    Reply::plain("\u{274c} Some error occurred")
}

pub fn added(redirection: &Redirection) -> Reply {
    Reply::html(format!(
        "\u{2714} New Redirection added <code>[{}]</code>",
        redirection.id
    ))
}

pub fn activated(id: RedirectionId) -> Reply {
    Reply::html(format!("Redirection activated <code>[{id}]</code>"))
}

pub fn deactivated(id: RedirectionId) -> Reply {
    Reply::html(format!("Redirection deactivated <code>[{id}]</code>"))
}

pub fn removed(id: RedirectionId) -> Reply {
    Reply::html(format!("Redirection removed <code>[{id}]</code>"))
}

pub fn duplicate(existing: RedirectionId) -> Reply {
    Reply::html(format!(
        "\u{26a0} Such redirection already exists <code>[{existing}]</code>"
    ))
}

pub fn not_found(id: RedirectionId) -> Reply {
    Reply::html(format!("\u{274c} Redirection <code>[{id}]</code> not found"))
}

pub fn channel_not_found(reference: &str) -> Reply {
    Reply::html(format!(
        "\u{274c} Channel {} was not found.\n\nCheck the link and try again",
        escape_html(reference)
    ))
}

pub fn permission_denied(destination: &str) -> Reply {
    Reply::html(format!(
        "\u{274c} No posting permission in {}.\n\n\
         Grant posting rights in the destination channel and run /activate again",
        escape_html(destination)
    ))
}

/// Render `/list` output: one line per redirection with a state glyph.
pub fn listing(redirections: &[Redirection]) -> Reply {
    if redirections.is_empty() {
        return Reply::html("You have no redirections".to_string());
    }

    let mut text = String::new();
    for redirection in redirections {
        let state = if redirection.active { "\u{1f535}" } else { "\u{1f534}" };
        text.push_str(&format!(
            "--- {state} <code>[{}]</code> {} =&gt; {}\n",
            redirection.id,
            escape_html(&redirection.source.title),
            escape_html(&redirection.destination.title),
        ));
    }
    Reply::html(text)
}
