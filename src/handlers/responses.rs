use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ReplyParameters};
use teloxide::RequestError;
use tracing::warn;

use crate::flow::machine::{
    DEAL_CALLBACK_PREFIX, LANG_CALLBACK_PREFIX, NEW_FLOW_CALLBACK, PHOTOS_DONE_CALLBACK,
};
use crate::flow::session::{DealType, Language};
use crate::flow::{Keyboard, Reply};
use crate::utils::text::split_message;

const SEND_RETRY_ATTEMPTS: usize = 3;

pub fn keyboard_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    match keyboard {
        Keyboard::NewFlow => InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("🔁 Новый объект", NEW_FLOW_CALLBACK),
        ]]),
        Keyboard::DealTypes => InlineKeyboardMarkup::new(
            DealType::ALL
                .into_iter()
                .map(|deal| {
                    vec![InlineKeyboardButton::callback(
                        deal.label(),
                        format!("{DEAL_CALLBACK_PREFIX}{}", deal.code()),
                    )]
                })
                .collect::<Vec<_>>(),
        ),
        Keyboard::Languages => InlineKeyboardMarkup::new(vec![Language::ALL
            .into_iter()
            .map(|language| {
                InlineKeyboardButton::callback(
                    language.button_label(),
                    format!("{LANG_CALLBACK_PREFIX}{}", language.code()),
                )
            })
            .collect::<Vec<_>>()]),
        Keyboard::PhotosDone => InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback("Готово, фото загружены ✅", PHOTOS_DONE_CALLBACK),
        ]]),
    }
}

fn telegram_retryable_error(err: &RequestError) -> bool {
    matches!(
        err,
        RequestError::Network(_) | RequestError::RetryAfter(_) | RequestError::Io(_)
    )
}

async fn send_message_with_retry(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    reply_to: Option<MessageId>,
    keyboard: Option<Keyboard>,
) -> Result<Message> {
    let mut delay = Duration::from_secs_f32(1.5);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let mut request = bot.send_message(chat_id, text.to_string());
        if let Some(reply_to) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(reply_to));
        }
        if let Some(keyboard) = keyboard {
            request = request.reply_markup(keyboard_markup(keyboard));
        }
        match request.await {
            Ok(message) => return Ok(message),
            Err(err) => {
                if !telegram_retryable_error(&err) || attempt == SEND_RETRY_ATTEMPTS {
                    return Err(err.into());
                }
                warn!("send_message attempt {attempt} failed: {err}");
                if let RequestError::RetryAfter(wait) = err {
                    tokio::time::sleep(wait.duration()).await;
                } else {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

/// Sends a state-machine reply, quoting `trigger` when the reply asks for it.
pub async fn send_reply(
    bot: &Bot,
    chat_id: ChatId,
    trigger: Option<MessageId>,
    reply: &Reply,
) -> Result<()> {
    let reply_to = if reply.quote { trigger } else { None };
    send_message_with_retry(bot, chat_id, &reply.text, reply_to, reply.keyboard).await?;
    Ok(())
}

/// Sends plain text in chunks of at most `limit` chars, in order. Chunks
/// that are only whitespace are skipped since Telegram rejects them.
pub async fn send_chunks(bot: &Bot, chat_id: ChatId, text: &str, limit: usize) -> Result<usize> {
    let mut sent = 0;
    for chunk in split_message(text, limit) {
        if chunk.trim().is_empty() {
            continue;
        }
        send_message_with_retry(bot, chat_id, chunk, None, None).await?;
        sent += 1;
    }
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use teloxide::types::InlineKeyboardButtonKind;

    use super::*;
    use crate::flow::Event;

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn every_button_maps_back_to_an_event() {
        for keyboard in [
            Keyboard::NewFlow,
            Keyboard::DealTypes,
            Keyboard::Languages,
            Keyboard::PhotosDone,
        ] {
            for data in callback_data(&keyboard_markup(keyboard)) {
                assert!(Event::from_callback(&data).is_some(), "dead button {data}");
            }
        }
    }

    #[test]
    fn deal_buttons_are_stacked_and_languages_share_a_row() {
        let deals = keyboard_markup(Keyboard::DealTypes);
        assert_eq!(deals.inline_keyboard.len(), 3);
        let languages = keyboard_markup(Keyboard::Languages);
        assert_eq!(languages.inline_keyboard.len(), 1);
        assert_eq!(languages.inline_keyboard[0].len(), 3);
        assert_eq!(
            callback_data(&languages),
            vec!["LANG:ru", "LANG:en", "LANG:sr"]
        );
    }
}
