//! Routes inbound text to lifecycle operations and converts every outcome
//! into a reply.
//!
//! `handle` is a pure function of the message and sender: the caller
//! (poll loop, tests) supplies the send step. Nothing escapes the
//! dispatcher -- one message's failure must not affect the next.

use rand::Rng;
use tracing::{debug, error, warn};

use multifeed_types::OwnerId;

use crate::command::{self, Command};
use crate::format::{self, Reply};
use crate::lifecycle::{LifecycleError, RedirectionLifecycle};
use crate::transport::TransportError;

/// Identity of the message sender, drawn from the inbound event.
#[derive(Debug, Clone)]
pub struct SenderContext {
    /// Private chat id of the operator; doubles as the owner id.
    pub chat_id: i64,
    pub username: Option<String>,
}

/// Turns raw operator text into a [`Reply`].
pub struct CommandDispatcher {
    lifecycle: RedirectionLifecycle,
}

impl CommandDispatcher {
    pub fn new(lifecycle: RedirectionLifecycle) -> Self {
        Self { lifecycle }
    }

    /// Interpret one inbound message and produce the reply to send.
    pub async fn handle(&self, text: &str, sender: &SenderContext) -> Reply {
        let Some(spec) = command::classify(text) else {
            debug!(chat_id = sender.chat_id, "unrecognized command");
            return format::unknown_command();
        };

        let parsed = match spec.parse(text) {
            Ok(command) => command,
            Err(error) => {
                debug!(chat_id = sender.chat_id, command = spec.name, %error, "argument error");
                return format::command_error(&error);
            }
        };

        let owner = OwnerId::new(sender.chat_id);
        match parsed {
            // Onboarding commands carry no lifecycle semantics.
            Command::Start => {
                self.register_user(sender);
                format::welcome()
            }
            Command::Help => format::help(),

            Command::Add {
                source,
                destination,
            } => match self.lifecycle.add(owner, &source, &destination).await {
                Ok(created) => format::added(&created),
                Err(error) => lifecycle_error_reply(error),
            },
            Command::Activate(id) => match self.lifecycle.activate(owner, id).await {
                Ok(()) => format::activated(id),
                Err(error) => lifecycle_error_reply(error),
            },
            Command::Deactivate(id) => match self.lifecycle.deactivate(owner, id).await {
                Ok(()) => format::deactivated(id),
                Err(error) => lifecycle_error_reply(error),
            },
            Command::Remove(id) => match self.lifecycle.remove(owner, id).await {
                Ok(()) => format::removed(id),
                Err(error) => lifecycle_error_reply(error),
            },
            Command::List => match self.lifecycle.list(owner) {
                Ok(redirections) => format::listing(&redirections),
                Err(error) => lifecycle_error_reply(error),
            },

            Command::Reserved(name) => format::reserved_command(name),
        }
    }

    fn register_user(&self, sender: &SenderContext) {
        let referral_seed = rand::thread_rng().gen_range(0..1000);
        if let Err(error) = self.lifecycle.store().create_user(
            sender.chat_id,
            sender.username.as_deref(),
            referral_seed,
        ) {
            // Registration failure is invisible to the operator.
            warn!(chat_id = sender.chat_id, %error, "failed to store user record");
        }
    }
}

fn lifecycle_error_reply(error: LifecycleError) -> Reply {
    match error {
        LifecycleError::Duplicate { existing } => format::duplicate(existing),
        LifecycleError::NotFound(id) => format::not_found(id),
        LifecycleError::Permission { destination } => format::permission_denied(&destination),
        LifecycleError::Transport(TransportError::ChannelNotFound(reference)) => {
            format::channel_not_found(&reference)
        }
        LifecycleError::Store(e) => {
            error!(error = %e, "store failure while handling command");
            format::generic_error()
        }
        LifecycleError::Transport(e) => {
            error!(error = %e, "transport failure while handling command");
            format::generic_error()
        }
    }
}
