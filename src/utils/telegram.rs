use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatAction;
use tokio::task::JoinHandle;
use tracing::warn;

// Telegram clears a chat action after about five seconds.
const TYPING_REFRESH_INTERVAL: Duration = Duration::from_secs(4);

/// Shows "typing..." in a chat until dropped.
pub struct TypingIndicator {
    task_handle: Option<JoinHandle<()>>,
}

impl TypingIndicator {
    pub fn start(bot: Bot, chat_id: ChatId) -> Self {
        let task_handle = tokio::spawn(async move {
            loop {
                if let Err(err) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
                    warn!("chat {} typing indicator failed: {err}", chat_id.0);
                }
                tokio::time::sleep(TYPING_REFRESH_INTERVAL).await;
            }
        });

        Self {
            task_handle: Some(task_handle),
        }
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}
