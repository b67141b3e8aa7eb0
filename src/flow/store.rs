use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::flow::session::{ListingPayload, PhotoRef, Session, Step};

/// Snapshot handed to the generation pipeline. The session itself stays in
/// `CollectingPhotos` and is marked busy until `finish_generation`.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub chat_id: i64,
    pub ticket: u64,
    pub payload: ListingPayload,
    pub photos: Vec<PhotoRef>,
    pub total_photos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationRefusal {
    WrongStep(Step),
    NoPhotos,
    Busy,
}

/// In-memory sessions keyed by chat id. Entries are never expired; they are
/// only replaced on reset, so memory grows with the number of distinct chats.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<i64, Session>>>,
    next_ticket: Arc<AtomicU64>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the chat's session, creating it if absent.
    pub fn get(&self, chat_id: i64) -> Session {
        let mut sessions = self.sessions.lock();
        sessions.entry(chat_id).or_default().clone()
    }

    /// Runs `f` against the chat's session under the store lock.
    pub fn with_session<T>(&self, chat_id: i64, f: impl FnOnce(&mut Session) -> T) -> T {
        let mut sessions = self.sessions.lock();
        f(sessions.entry(chat_id).or_default())
    }

    pub fn reset(&self, chat_id: i64) {
        self.sessions.lock().insert(chat_id, Session::default());
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn begin_generation(
        &self,
        chat_id: i64,
        max_photos: usize,
    ) -> Result<GenerationJob, GenerationRefusal> {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(chat_id).or_default();

        if session.is_busy() {
            return Err(GenerationRefusal::Busy);
        }
        if session.step != Step::CollectingPhotos {
            return Err(GenerationRefusal::WrongStep(session.step));
        }
        if session.photos.is_empty() {
            return Err(GenerationRefusal::NoPhotos);
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
        session.generation = Some(ticket);

        Ok(GenerationJob {
            chat_id,
            ticket,
            payload: session.payload.clone(),
            photos: session.photos.iter().take(max_photos).cloned().collect(),
            total_photos: session.photos.len(),
        })
    }

    /// Resets the session if `ticket` is still the generation in flight.
    /// Returns false when the user already restarted the flow meanwhile.
    pub fn finish_generation(&self, chat_id: i64, ticket: u64) -> bool {
        let mut sessions = self.sessions.lock();
        match sessions.get(&chat_id) {
            Some(session) if session.generation == Some(ticket) => {
                sessions.insert(chat_id, Session::default());
                true
            }
            _ => false,
        }
    }
}
