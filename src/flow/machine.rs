use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::flow::metadata::parse_metadata;
use crate::flow::session::{DealType, Language, PhotoRef, Step};
use crate::flow::store::{GenerationJob, GenerationRefusal, SessionStore};

pub const NEW_FLOW_CALLBACK: &str = "NEW_FLOW";
pub const PHOTOS_DONE_CALLBACK: &str = "PHOTOS_DONE";
pub const DEAL_CALLBACK_PREFIX: &str = "DEAL:";
pub const LANG_CALLBACK_PREFIX: &str = "LANG:";

const LANG_HINT: &str = "Язык можно выбрать кнопкой или написать: «Язык: ru» (ru/en/sr).";

const META_TEMPLATE: &str = "Пришли данные об объекте одним сообщением, по строкам «Поле: значение»:

Адрес:
Район:
Площадь:
Планировка:
Этаж:
Этажность:
Высота потолков:
Коммуникации:
Особенности локации:
Животные:
Доступно с:
Цена:
Контакт:

Любой свободный текст тоже пригодится: ремонт, документы, торг, что остаётся из мебели.";

const HELP_TEXT: &str = "Я бот-риелтор: собираю данные и фото объекта и пишу объявление.

Порядок:
1. /new — новый объект, выбери цель (Продажа/Аренда/Презентация)
2. выбери язык объявления (ru/en/sr)
3. пришли данные об объекте одним сообщением
4. пришли 3–12 фото и нажми «Готово, фото загружены ✅» или напиши «Создай описание»

/cancel — сбросить текущий объект
/help — эта подсказка";

static LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:язык|language|lang|jezik)\s*[:：]\s*([a-zа-я]{2})\s*$")
        .expect("valid language regex")
});
static GENERATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)создай\s+описание|^\s*(?:generate|сгенерируй|gotovo|generiši)\s*[.!]*\s*$")
        .expect("valid generate regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start,
    NewFlow { argument: String },
    Help,
    Cancel,
    UnknownCommand(String),
    ChooseDealType(DealType),
    ChooseLanguage(Language),
    UnsupportedLanguage(String),
    Text(String),
    Photo(PhotoRef),
    Generate,
}

impl Event {
    pub fn from_callback(data: &str) -> Option<Event> {
        if data == NEW_FLOW_CALLBACK {
            return Some(Event::NewFlow {
                argument: String::new(),
            });
        }
        if data == PHOTOS_DONE_CALLBACK {
            return Some(Event::Generate);
        }
        if let Some(code) = data.strip_prefix(DEAL_CALLBACK_PREFIX) {
            return DealType::from_code(code).map(Event::ChooseDealType);
        }
        if let Some(code) = data.strip_prefix(LANG_CALLBACK_PREFIX) {
            return Language::from_code(code).map(Event::ChooseLanguage);
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    NewFlow,
    DealTypes,
    Languages,
    PhotosDone,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<Keyboard>,
    /// Quote the message that triggered the event.
    pub quote: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            keyboard: None,
            quote: false,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Reply {
            text: text.into(),
            keyboard: Some(keyboard),
            quote: false,
        }
    }

    pub fn quoted(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            keyboard: None,
            quote: true,
        }
    }
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub replies: Vec<Reply>,
    /// Short acknowledgement for button presses that changed nothing.
    pub notice: Option<String>,
    pub job: Option<GenerationJob>,
}

impl Outcome {
    fn replies(replies: Vec<Reply>) -> Self {
        Outcome {
            replies,
            ..Outcome::default()
        }
    }

    fn reply(reply: Reply) -> Self {
        Outcome::replies(vec![reply])
    }

    fn notice(notice: &str) -> Self {
        Outcome {
            notice: Some(notice.to_string()),
            ..Outcome::default()
        }
    }
}

type Recognizer = fn(&str) -> Option<Event>;

/// Text recognizers in priority order; the first match wins and anything
/// unclaimed becomes `Event::Text`.
const TEXT_RECOGNIZERS: [(&str, Recognizer); 4] = [
    ("command", recognize_command),
    ("language", recognize_language),
    ("deal_type", recognize_deal_type),
    ("generate", recognize_generate),
];

fn recognize_command(text: &str) -> Option<Event> {
    let trimmed = text.trim_start();
    let rest = trimmed.strip_prefix('/')?;
    let (head, argument) = rest
        .split_once(char::is_whitespace)
        .unwrap_or((rest, ""));
    let name = head.split('@').next().unwrap_or_default().to_lowercase();
    let event = match name.as_str() {
        "start" => Event::Start,
        "new" => Event::NewFlow {
            argument: argument.trim().to_string(),
        },
        "help" => Event::Help,
        "cancel" => Event::Cancel,
        _ => Event::UnknownCommand(name),
    };
    Some(event)
}

fn recognize_language(text: &str) -> Option<Event> {
    let caps = LANGUAGE_RE.captures(text)?;
    let code = caps[1].to_lowercase();
    Some(match Language::from_code(&code) {
        Some(language) => Event::ChooseLanguage(language),
        None => Event::UnsupportedLanguage(code),
    })
}

fn recognize_deal_type(text: &str) -> Option<Event> {
    DealType::from_exact_keyword(text).map(Event::ChooseDealType)
}

fn recognize_generate(text: &str) -> Option<Event> {
    GENERATE_RE.is_match(text).then_some(Event::Generate)
}

pub fn classify_text(text: &str) -> Event {
    for (name, recognizer) in TEXT_RECOGNIZERS {
        if let Some(event) = recognizer(text) {
            debug!("text claimed by {name} recognizer");
            return event;
        }
    }
    Event::Text(text.trim().to_string())
}

fn hint_for_step(step: Step) -> Reply {
    match step {
        Step::Idle => Reply::with_keyboard(
            "Чтобы начать, нажми «Новый объект» или отправь /new.",
            Keyboard::NewFlow,
        ),
        Step::AwaitingDealType => {
            Reply::with_keyboard("Сначала выбери цель объявления:", Keyboard::DealTypes)
        }
        Step::AwaitingLanguage => Reply::with_keyboard(
            format!("Выбери язык объявления. {LANG_HINT}"),
            Keyboard::Languages,
        ),
        Step::AwaitingMetadata => Reply::text("Сначала пришли данные об объекте текстом, потом фото."),
        Step::CollectingPhotos => Reply::with_keyboard(
            "Данные уже приняты. Пришли фото и нажми кнопку ниже, когда закончишь.",
            Keyboard::PhotosDone,
        ),
    }
}

fn busy_reply() -> Reply {
    Reply::text("Уже генерирую описание, подожди немного ⏳")
}

fn deal_chosen_reply(deal: DealType) -> Reply {
    Reply::with_keyboard(
        format!("Цель: {}\nТеперь выбери язык объявления. {LANG_HINT}", deal.label()),
        Keyboard::Languages,
    )
}

/// Applies one event to the chat's session and returns what to send back.
/// A returned job means the caller must run the generation pipeline and
/// then call `SessionStore::finish_generation`.
pub fn handle_event(
    store: &SessionStore,
    chat_id: i64,
    event: Event,
    max_photos: usize,
) -> Outcome {
    match event {
        Event::Start => {
            store.reset(chat_id);
            Outcome::reply(Reply::with_keyboard(
                "Привет! Я бот-риелтор. Соберу данные и фото объекта и сгенерирую объявление.\n\n\
                 Нажми «Новый объект» или отправь /new.",
                Keyboard::NewFlow,
            ))
        }
        Event::NewFlow { argument } => {
            store.reset(chat_id);
            match DealType::from_keyword(&argument) {
                Some(deal) => {
                    store.with_session(chat_id, |session| {
                        session.payload.deal_type = Some(deal);
                        session.step = Step::AwaitingLanguage;
                    });
                    info!("chat {chat_id} started a new listing ({})", deal.code());
                    Outcome::reply(deal_chosen_reply(deal))
                }
                None => {
                    store.with_session(chat_id, |session| session.step = Step::AwaitingDealType);
                    info!("chat {chat_id} started a new listing");
                    Outcome::reply(Reply::with_keyboard(
                        "Ок! Новый объект. Выбери цель объявления:",
                        Keyboard::DealTypes,
                    ))
                }
            }
        }
        Event::Help => Outcome::reply(Reply::text(HELP_TEXT)),
        Event::Cancel => {
            store.reset(chat_id);
            Outcome::reply(Reply::with_keyboard(
                "Сбросил текущий объект. Чтобы начать заново — /new.",
                Keyboard::NewFlow,
            ))
        }
        Event::UnknownCommand(name) => Outcome::reply(Reply::text(format!(
            "Не знаю команду /{name}. Доступно: /new, /cancel, /help."
        ))),
        Event::ChooseDealType(deal) => {
            let accepted = store.with_session(chat_id, |session| {
                if session.step != Step::AwaitingDealType {
                    return false;
                }
                session.payload.deal_type = Some(deal);
                session.step = Step::AwaitingLanguage;
                true
            });
            if accepted {
                Outcome::reply(deal_chosen_reply(deal))
            } else {
                Outcome::notice("Цель сейчас не выбирается. Новый объект — /new.")
            }
        }
        Event::ChooseLanguage(language) => {
            let accepted = store.with_session(chat_id, |session| {
                if session.step != Step::AwaitingLanguage {
                    return false;
                }
                session.payload.language = Some(language);
                session.step = Step::AwaitingMetadata;
                true
            });
            if accepted {
                Outcome::replies(vec![
                    Reply::text(format!("Ок, язык: {}", language.code().to_uppercase())),
                    Reply::text(META_TEMPLATE),
                ])
            } else {
                Outcome::notice("Язык сейчас не выбирается. Новый объект — /new.")
            }
        }
        Event::UnsupportedLanguage(code) => Outcome::reply(Reply::text(format!(
            "Язык «{code}» не поддерживается. {LANG_HINT}"
        ))),
        Event::Text(text) => {
            let session = store.get(chat_id);
            if session.is_busy() {
                return Outcome::reply(busy_reply());
            }
            if session.step != Step::AwaitingMetadata {
                return Outcome::reply(hint_for_step(session.step));
            }
            let parsed = parse_metadata(&text);
            store.with_session(chat_id, |session| {
                session.payload.merge_metadata(parsed);
                session.step = Step::CollectingPhotos;
            });
            Outcome::reply(Reply::with_keyboard(
                "Принял данные. Пришли 3–12 фото (можно альбомом). Когда закончишь — нажми кнопку ниже.",
                Keyboard::PhotosDone,
            ))
        }
        Event::Photo(photo) => store.with_session(chat_id, |session| {
            if session.is_busy() {
                return Outcome::reply(busy_reply());
            }
            if session.step != Step::CollectingPhotos {
                return Outcome::reply(hint_for_step(session.step));
            }
            let added = session.add_photo(photo);
            let total = session.photos.len();
            let mut text = if added {
                format!("Фото добавлено ✅ (всего: {total})")
            } else {
                format!("Это фото уже есть (всего: {total})")
            };
            if added && total == max_photos + 1 {
                text.push_str(&format!("\nВ описание пойдут первые {max_photos} фото."));
            }
            Outcome::reply(Reply::quoted(text))
        }),
        Event::Generate => match store.begin_generation(chat_id, max_photos) {
            Ok(job) => {
                info!(
                    "chat {chat_id} requested generation with {} of {} photo(s)",
                    job.photos.len(),
                    job.total_photos
                );
                Outcome {
                    replies: vec![Reply::text("Готово, фото загружены ✅\nГенерирую описание… 10–20 секунд ⏳")],
                    notice: None,
                    job: Some(job),
                }
            }
            Err(GenerationRefusal::NoPhotos) => Outcome::reply(Reply::with_keyboard(
                "Пока нет ни одного фото. Пришли 3–12 фото и снова нажми кнопку.",
                Keyboard::PhotosDone,
            )),
            Err(GenerationRefusal::Busy) => Outcome::reply(busy_reply()),
            Err(GenerationRefusal::WrongStep(step)) => Outcome::reply(hint_for_step(step)),
        },
    }
}
