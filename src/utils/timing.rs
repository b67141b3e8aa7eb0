use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::info;

/// Tracks one generation cycle from trigger to final reply on the
/// `bot.timing` target.
#[derive(Debug)]
pub struct CommandTimer {
    command: String,
    chat_id: i64,
    user_id: Option<i64>,
    ticket: Option<u64>,
    started_at: DateTime<Utc>,
    started_perf: Instant,
    completed: bool,
}

impl CommandTimer {
    pub fn start(command: &str, chat_id: i64, user_id: Option<i64>, ticket: Option<u64>) -> Self {
        let timer = CommandTimer {
            command: command.to_string(),
            chat_id,
            user_id,
            ticket,
            started_at: Utc::now(),
            started_perf: Instant::now(),
            completed: false,
        };
        info!(
            target: "bot.timing",
            "event=command_received command={} chat_id={} user_id={:?} ticket={:?} received_at={}",
            timer.command,
            timer.chat_id,
            timer.user_id,
            timer.ticket,
            timer.started_at.to_rfc3339()
        );
        timer
    }

    pub fn complete(&mut self, status: &str, detail: Option<String>) {
        if self.completed {
            return;
        }
        self.completed = true;
        info!(
            target: "bot.timing",
            "event=command_completed command={} chat_id={} ticket={:?} started_at={} completed_at={} duration_s={:.3} status={} detail={}",
            self.command,
            self.chat_id,
            self.ticket,
            self.started_at.to_rfc3339(),
            Utc::now().to_rfc3339(),
            self.started_perf.elapsed().as_secs_f64(),
            status,
            detail.unwrap_or_default()
        );
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        self.complete("dropped", None);
    }
}

pub async fn log_llm_timing<T, E, F, Fut>(
    provider: &str,
    model: &str,
    operation: &str,
    images: usize,
    call: F,
) -> Result<T, E>
where
    E: Display,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let started_perf = Instant::now();
    info!(
        target: "bot.timing",
        "event=llm_request provider={} model={} operation={} images={} started_at={}",
        provider,
        model,
        operation,
        images,
        Utc::now().to_rfc3339()
    );

    let result = call().await;
    let (status, detail) = match &result {
        Ok(_) => ("success", String::new()),
        Err(err) => ("error", err.to_string()),
    };

    info!(
        target: "bot.timing",
        "event=llm_response provider={} model={} operation={} completed_at={} duration_s={:.3} status={} detail={}",
        provider,
        model,
        operation,
        Utc::now().to_rfc3339(),
        started_perf.elapsed().as_secs_f64(),
        status,
        detail
    );

    result
}
