use std::error::Error;
use std::net::SocketAddr;

use dotenvy::dotenv;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, UpdateListener};
use teloxide::utils::command::BotCommands;
use tracing::{error, info, warn};

mod config;
mod flow;
mod handlers;
mod llm;
mod state;
mod utils;

use config::Config;
use flow::{classify_text, Event, PhotoRef};
use handlers::health::with_liveness_route;
use handlers::listing::apply_event;
use handlers::media::photo_from_message;
use state::AppState;
use utils::logging::init_logging;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Команды бота-риелтора:")]
enum Command {
    #[command(description = "приветствие и кнопка «Новый объект»")]
    Start,
    #[command(description = "новый объект; можно сразу указать цель: /new аренда")]
    New(String),
    #[command(description = "как пользоваться ботом")]
    Help,
    #[command(description = "сбросить текущий объект")]
    Cancel,
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

fn user_id(user: Option<&teloxide::types::User>) -> Option<i64> {
    user.and_then(|user| i64::try_from(user.id.0).ok())
}

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let config = Config::load()?;
    let _guards = init_logging(&config.log_level);

    let bot = Bot::new(config.bot_token.clone());
    info!(
        "Starting realtor listing bot (vision={}, text={})",
        config.openai_vision_model, config.openai_text_model
    );

    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {err}");
    }

    let webhook_url = config.webhook_url();
    let port = config.port;
    let state = AppState::new(config);

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(dptree::filter_map(|msg: Message| photo_from_message(&msg)).endpoint(handle_photo))
        .branch(
            dptree::filter_map(|msg: Message| msg.text().map(str::to_string))
                .endpoint(handle_text),
        )
        .endpoint(ignore_message);

    let callback_handler = Update::filter_callback_query().endpoint(handle_callback_query);

    let handler = dptree::entry()
        .branch(message_handler)
        .branch(callback_handler);

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build();

    match webhook_url {
        Some(url) => {
            let address = SocketAddr::from(([0, 0, 0, 0], port));
            let url = url::Url::parse(&url)?;
            info!("Webhook mode: listening on {address}, url={url}");
            let (mut listener, stop_flag, router) =
                webhooks::axum_to_router(bot, webhooks::Options::new(address, url)).await?;
            let stop_token = listener.stop_token();
            let tcp_listener = tokio::net::TcpListener::bind(address).await?;
            tokio::spawn(async move {
                let served = axum::serve(tcp_listener, with_liveness_route(router))
                    .with_graceful_shutdown(stop_flag)
                    .await;
                if let Err(err) = served {
                    error!("Webhook server failed: {err}");
                    stop_token.stop();
                }
            });
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the webhook listener"),
                )
                .await;
        }
        None => {
            info!("WEBHOOK_HOST is not set; using long polling");
            dispatcher.dispatch().await;
        }
    }

    Ok(())
}

async fn handle_command(
    bot: Bot,
    state: AppState,
    message: Message,
    command: Command,
) -> HandlerResult {
    let event = match command {
        Command::Start => Event::Start,
        Command::New(argument) => Event::NewFlow {
            argument: argument.trim().to_string(),
        },
        Command::Help => Event::Help,
        Command::Cancel => Event::Cancel,
    };
    apply_event(
        &bot,
        &state,
        message.chat.id,
        user_id(message.from.as_ref()),
        Some(message.id),
        event,
    )
    .await?;
    Ok(())
}

async fn handle_photo(
    bot: Bot,
    state: AppState,
    message: Message,
    photo: PhotoRef,
) -> HandlerResult {
    apply_event(
        &bot,
        &state,
        message.chat.id,
        user_id(message.from.as_ref()),
        Some(message.id),
        Event::Photo(photo),
    )
    .await?;
    Ok(())
}

async fn handle_text(bot: Bot, state: AppState, message: Message, text: String) -> HandlerResult {
    apply_event(
        &bot,
        &state,
        message.chat.id,
        user_id(message.from.as_ref()),
        Some(message.id),
        classify_text(&text),
    )
    .await?;
    Ok(())
}

async fn handle_callback_query(bot: Bot, state: AppState, query: CallbackQuery) -> HandlerResult {
    let event = query.data.as_deref().and_then(Event::from_callback);
    let chat_id = query.message.as_ref().map(|message| message.chat().id);

    let notice = match (event, chat_id) {
        (Some(event), Some(chat_id)) => {
            match apply_event(
                &bot,
                &state,
                chat_id,
                user_id(Some(&query.from)),
                None,
                event,
            )
            .await
            {
                Ok(notice) => notice,
                Err(err) => {
                    error!("callback {:?} failed: {err:#}", query.data);
                    None
                }
            }
        }
        _ => {
            warn!("Ignoring callback without chat or known data: {:?}", query.data);
            None
        }
    };

    let mut answer = bot.answer_callback_query(query.id.clone());
    if let Some(notice) = notice {
        answer = answer.text(notice);
    }
    if let Err(err) = answer.await {
        warn!("answer_callback_query failed: {err}");
    }
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
