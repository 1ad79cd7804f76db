//! Long-polling loop for Telegram Bot API `getUpdates`.
//!
//! Pulls updates, filters them down to private-chat text messages, and
//! hands each one to the dispatcher on its own task so a slow command
//! never stalls the poll cycle.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use multifeed_core::{CommandDispatcher, SenderContext, Transport};

use crate::api::TelegramApi;
use crate::types::Message;

/// Run the long-polling loop until the cancellation signal fires.
///
/// Each private-chat text message is dispatched concurrently; the reply is
/// sent through `transport` and delivery failures are logged, never
/// retried. `getUpdates` failures back off exponentially up to a minute.
pub async fn poll_loop(
    api: Arc<TelegramApi>,
    dispatcher: Arc<CommandDispatcher>,
    transport: Arc<dyn Transport>,
    poll_timeout: u64,
    mut cancel: watch::Receiver<bool>,
) {
    let mut offset: Option<i64> = None;
    let mut backoff_secs = 1u64;

    info!("Telegram poller started");

    loop {
        if *cancel.borrow() {
            info!("Telegram poller shutting down");
            return;
        }

        let updates = tokio::select! {
            result = api.get_updates(offset, poll_timeout) => result,
            _ = cancel.changed() => {
                info!("Telegram poller cancelled");
                return;
            }
        };

        match updates {
            Ok(updates) => {
                backoff_secs = 1;

                for update in updates {
                    // Advance offset to acknowledge this update
                    offset = Some(update.update_id + 1);

                    let Some(msg) = update.message else { continue };
                    if !is_private_text(&msg) {
                        debug!(chat_id = msg.chat.id, "ignoring non-command update");
                        continue;
                    }

                    let dispatcher = dispatcher.clone();
                    let transport = transport.clone();
                    tokio::spawn(async move {
                        handle_message(&dispatcher, transport.as_ref(), msg).await;
                    });
                }
            }
            Err(e) => {
                warn!(error = %e, backoff_secs, "getUpdates failed, backing off");
                tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
                backoff_secs = (backoff_secs * 2).min(60);
            }
        }
    }
}

fn is_private_text(msg: &Message) -> bool {
    msg.chat.chat_type.as_deref() == Some("private") && msg.text.is_some()
}

async fn handle_message(dispatcher: &CommandDispatcher, transport: &dyn Transport, msg: Message) {
    let Some(text) = msg.text else { return };
    let sender = SenderContext {
        chat_id: msg.chat.id,
        username: msg.from.and_then(|u| u.username),
    };

    let reply = dispatcher.handle(&text, &sender).await;
    if let Err(e) = transport.send_reply(sender.chat_id, &reply).await {
        warn!(chat_id = sender.chat_id, error = %e, "failed to deliver reply");
    }
}
