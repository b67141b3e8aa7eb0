use std::future::Future;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::flow::machine::{Keyboard, Reply};
use crate::flow::session::PhotoRef;
use crate::flow::store::{GenerationJob, SessionStore};
use crate::llm::composer::compose_listing;
use crate::llm::features::{extract_features, FeatureExtraction};
use crate::llm::{ImagePayload, LlmError, ModelClient};

/// Resolves a stored photo reference to image bytes.
pub trait PhotoSource: Send + Sync {
    fn fetch(&self, photo: &PhotoRef) -> impl Future<Output = anyhow::Result<ImagePayload>> + Send;
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to fetch photo {file_id}: {detail}")]
    Photo { file_id: String, detail: String },
    #[error(transparent)]
    Model(#[from] LlmError),
    #[error("text model returned an empty listing")]
    EmptyListing,
}

impl GenerationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            GenerationError::Model(LlmError::Unauthorized) => {
                "Ошибка 401 у модели: ключ не принят. Проверь OPENAI_API_KEY в настройках окружения."
            }
            GenerationError::Model(LlmError::RateLimited) => {
                "Перегрузка или лимит модели (429). Подожди минуту или проверь биллинг."
            }
            _ => "Не вышло создать описание 😔. Ошибка записана в логи, попробуй ещё раз: /new",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub vision_model: String,
    pub text_model: String,
    pub temperature: f32,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            vision_model: config.openai_vision_model.clone(),
            text_model: config.openai_text_model.clone(),
            temperature: config.openai_temperature,
        }
    }
}

#[derive(Debug)]
pub struct GeneratedListing {
    pub text: String,
    pub features: FeatureExtraction,
}

/// Fetches the job's photos, extracts visual features and composes the
/// listing, strictly in that order. Photo and model failures abort; a
/// malformed feature reply does not.
pub async fn generate_listing<P, M>(
    photos: &P,
    model: &M,
    settings: &PipelineSettings,
    job: &GenerationJob,
) -> Result<GeneratedListing, GenerationError>
where
    P: PhotoSource,
    M: ModelClient,
{
    match serde_json::to_string(&job.payload) {
        Ok(payload) => debug!("chat {} listing payload: {payload}", job.chat_id),
        Err(err) => warn!("chat {} payload not serializable: {err}", job.chat_id),
    }

    let mut images = Vec::with_capacity(job.photos.len());
    for photo in &job.photos {
        let image = photos
            .fetch(photo)
            .await
            .map_err(|err| GenerationError::Photo {
                file_id: photo.file_id.clone(),
                detail: err.to_string(),
            })?;
        images.push(image);
    }

    let features = extract_features(model, &settings.vision_model, images).await?;
    let text = compose_listing(
        model,
        &settings.text_model,
        settings.temperature,
        &job.payload,
        &features.features(),
    )
    .await?;

    if text.trim().is_empty() {
        return Err(GenerationError::EmptyListing);
    }

    info!(
        "chat {} listing composed: {} chars, features_empty={}",
        job.chat_id,
        text.chars().count(),
        features.is_empty()
    );
    Ok(GeneratedListing { text, features })
}

/// Releases the chat after a generation cycle, whatever its outcome, and
/// returns the closing message. A stale ticket leaves the session alone.
pub fn conclude_generation(
    store: &SessionStore,
    job: &GenerationJob,
    result: &Result<GeneratedListing, GenerationError>,
) -> Reply {
    if !store.finish_generation(job.chat_id, job.ticket) {
        info!(
            "chat {} moved on during generation; keeping its new session",
            job.chat_id
        );
    }

    match result {
        Ok(_) => Reply::with_keyboard("Готово! Хочешь ещё один объект?", Keyboard::NewFlow),
        Err(err) => Reply::with_keyboard(err.user_message(), Keyboard::NewFlow),
    }
}
