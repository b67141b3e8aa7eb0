use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::MessageId;
use tracing::{error, info, warn};

use crate::flow::{
    conclude_generation, generate_listing, handle_event, Event, GenerationJob, Outcome, Reply,
};
use crate::handlers::media::TelegramPhotoSource;
use crate::handlers::responses::{send_chunks, send_reply};
use crate::state::AppState;
use crate::utils::telegram::TypingIndicator;
use crate::utils::timing::CommandTimer;

/// Feeds one event into the chat's flow and sends the replies. Returns the
/// notice meant for a callback acknowledgement, if any. A generation job is
/// started in the background so the dispatcher keeps serving other chats;
/// if the replies cannot be delivered the job is released instead.
pub async fn apply_event(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    user_id: Option<i64>,
    trigger: Option<MessageId>,
    event: Event,
) -> Result<Option<String>> {
    let Outcome {
        replies,
        notice,
        job,
    } = handle_event(
        &state.sessions,
        chat_id.0,
        event,
        state.config.vision_max_images,
    );

    let notice = match send_outcome(bot, chat_id, trigger, &replies, notice).await {
        Ok(notice) => notice,
        Err(err) => {
            if let Some(job) = &job {
                state.sessions.finish_generation(job.chat_id, job.ticket);
                warn!("chat {} generation dropped, replies failed: {err:#}", job.chat_id);
            }
            return Err(err);
        }
    };

    if let Some(job) = job {
        let bot = bot.clone();
        let state = state.clone();
        tokio::spawn(async move {
            run_generation(bot, state, job, user_id).await;
        });
    }

    Ok(notice)
}

async fn send_outcome(
    bot: &Bot,
    chat_id: ChatId,
    trigger: Option<MessageId>,
    replies: &[Reply],
    notice: Option<String>,
) -> Result<Option<String>> {
    for reply in replies {
        send_reply(bot, chat_id, trigger, reply).await?;
    }

    // Typed selections have no callback to carry the notice.
    if trigger.is_some() && replies.is_empty() {
        if let Some(text) = notice {
            send_reply(bot, chat_id, trigger, &Reply::quoted(text)).await?;
            return Ok(None);
        }
    }
    Ok(notice)
}

async fn run_generation(bot: Bot, state: AppState, job: GenerationJob, user_id: Option<i64>) {
    let chat_id = ChatId(job.chat_id);
    let mut timer = CommandTimer::start("generate", job.chat_id, user_id, Some(job.ticket));
    let typing = TypingIndicator::start(bot.clone(), chat_id);
    let photos = TelegramPhotoSource::new(bot.clone(), &state.config.bot_token);
    info!(
        "chat {} generating from {} photo(s); {} session(s) in memory",
        job.chat_id,
        job.photos.len(),
        state.sessions.len()
    );

    let result = generate_listing(&photos, &state.model, &state.settings, &job).await;
    drop(typing);

    match &result {
        Ok(listing) => {
            let limit = state.config.telegram_chunk_limit;
            match send_chunks(&bot, chat_id, &listing.text, limit).await {
                Ok(chunks) => {
                    info!("chat {} received listing in {chunks} message(s)", job.chat_id);
                    timer.complete(
                        "ok",
                        Some(format!(
                            "chunks={chunks} feature_fields={}",
                            listing.features.features().len()
                        )),
                    );
                }
                Err(err) => {
                    error!("chat {} listing delivery failed: {err:#}", job.chat_id);
                    timer.complete("delivery_failed", Some(err.to_string()));
                }
            }
        }
        Err(err) => {
            error!("chat {} generation failed: {err}", job.chat_id);
            timer.complete("error", Some(err.to_string()));
        }
    }

    let closing = conclude_generation(&state.sessions, &job, &result);
    if let Err(err) = send_reply(&bot, chat_id, None, &closing).await {
        warn!("chat {} follow-up message failed: {err:#}", job.chat_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::flow::session::{DealType, Language, Step};
    use crate::flow::PhotoRef;

    const CHAT: i64 = 42;

    #[tokio::test]
    async fn undeliverable_generate_reply_releases_the_chat() {
        let state = AppState::new(Config::for_tests());
        for event in [
            Event::NewFlow {
                argument: String::new(),
            },
            Event::ChooseDealType(DealType::Sale),
            Event::ChooseLanguage(Language::Ru),
            Event::Text("Адрес: Main St 1".to_string()),
            Event::Photo(PhotoRef {
                file_id: "file-0".to_string(),
                unique_id: "uniq-0".to_string(),
            }),
        ] {
            handle_event(&state.sessions, CHAT, event, 8);
        }

        let unreachable = url::Url::parse("http://127.0.0.1:9/").unwrap();
        let bot = Bot::new("123:abc").set_api_url(unreachable);
        let result = apply_event(&bot, &state, ChatId(CHAT), None, None, Event::Generate).await;
        assert!(result.is_err());

        let session = state.sessions.get(CHAT);
        assert!(!session.is_busy());
        assert_eq!(session.step, Step::Idle);

        let retry = handle_event(&state.sessions, CHAT, Event::Generate, 8);
        assert!(retry.job.is_none());
        assert!(!retry.replies[0].text.contains("Уже генерирую"));
    }
}
