use std::sync::Arc;

use crate::config::Config;
use crate::flow::{PipelineSettings, SessionStore};
use crate::llm::OpenAiClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionStore,
    pub model: OpenAiClient,
    pub settings: PipelineSettings,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let model = OpenAiClient::from_config(&config);
        let settings = PipelineSettings::from_config(&config);
        AppState {
            config: Arc::new(config),
            sessions: SessionStore::new(),
            model,
            settings,
        }
    }
}
