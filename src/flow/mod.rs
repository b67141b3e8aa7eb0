pub mod machine;
pub mod metadata;
pub mod pipeline;
pub mod session;
pub mod store;

pub use machine::{classify_text, handle_event, Event, Keyboard, Outcome, Reply};
pub use pipeline::{conclude_generation, generate_listing, PhotoSource, PipelineSettings};
pub use session::PhotoRef;
pub use store::{GenerationJob, SessionStore};
