pub mod composer;
pub mod features;
pub mod media;
pub mod openai;

pub use media::ImagePayload;
pub use openai::{LlmError, ModelClient, OpenAiClient};
