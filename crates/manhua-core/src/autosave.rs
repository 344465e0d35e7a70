//! Debounced auto-save of the active page into persisted history.
//!
//! The controller is a small state machine around one owned timer task:
//!
//! ```text
//! Idle --schedule--> Pending --deadline reset--> Pending
//!                    Pending --fire--> Idle (record saved)
//!                    Pending --cancel--> Idle
//! ```
//!
//! Every observed change cancels the pending timer first. A new timer is
//! only started when the active page exists, is not analyzing and has at
//! least one translation item. The record is captured when the timer is
//! scheduled, so what gets saved is exactly what was observed.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_AUTOSAVE_DELAY_MS;
use crate::model::TranslationItem;
use crate::page::{Page, PageId};
use crate::settings::Genre;
use crate::store::{HistoryStore, PersistedHistoryRecord};

/// The inputs a save depends on. A change to any of them restarts the timer.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Observation {
    page_id: PageId,
    file_name: String,
    translations: Vec<TranslationItem>,
    genre: Genre,
    analyzing: bool,
}

impl Observation {
    fn of(page: &Page, genre: Genre) -> Self {
        Self {
            page_id: page.id().clone(),
            file_name: page.source_file_name().to_string(),
            translations: page.translations().to_vec(),
            genre,
            analyzing: page.is_analyzing(),
        }
    }

    fn is_saveable(&self) -> bool {
        !self.analyzing && !self.translations.is_empty()
    }
}

struct PendingSave {
    handle: JoinHandle<()>,
    observation: Observation,
}

pub struct AutoPersistController {
    history: Arc<HistoryStore>,
    delay: Duration,
    pending: Option<PendingSave>,
    last_observed: Option<Observation>,
    saved_at: Arc<watch::Sender<Option<i64>>>,
}

impl AutoPersistController {
    pub fn new(history: Arc<HistoryStore>) -> Self {
        Self::with_delay(history, Duration::from_millis(DEFAULT_AUTOSAVE_DELAY_MS))
    }

    pub fn with_delay(history: Arc<HistoryStore>, delay: Duration) -> Self {
        let (saved_at, _) = watch::channel(None);
        Self {
            history,
            delay,
            pending: None,
            last_observed: None,
            saved_at: Arc::new(saved_at),
        }
    }

    /// Report the current active page (or its absence) and genre.
    ///
    /// Must be called from within a tokio runtime: scheduling spawns the
    /// timer task. Repeating an identical observation leaves the timer alone.
    pub fn observe(&mut self, active: Option<&Page>, genre: Genre) {
        let observation = active.map(|page| Observation::of(page, genre));
        if observation == self.last_observed {
            return;
        }

        self.cancel();
        self.last_observed.clone_from(&observation);

        let Some(observation) = observation.filter(Observation::is_saveable) else {
            return;
        };

        debug!(
            "Auto-save for page {} scheduled in {:?}",
            observation.page_id, self.delay
        );

        let history = Arc::clone(&self.history);
        let saved_at = Arc::clone(&self.saved_at);
        let delay = self.delay;
        let captured = observation.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            save(&history, &saved_at, captured);
        });

        self.pending = Some(PendingSave {
            handle,
            observation,
        });
    }

    /// Drop the pending save, if any. Has no other effect.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            debug!("Auto-save for page {} cancelled", pending.observation.page_id);
        }
    }

    /// Save the pending record now instead of waiting for the timer.
    ///
    /// Returns whether a save was performed.
    pub fn flush(&mut self) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        if pending.handle.is_finished() {
            return false;
        }

        pending.handle.abort();
        save(&self.history, &self.saved_at, pending.observation)
    }

    /// Whether a save is scheduled and has not fired yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.handle.is_finished())
    }

    /// Time of the last successful save, in milliseconds since the Unix epoch.
    pub fn last_saved_at(&self) -> Option<i64> {
        *self.saved_at.borrow()
    }

    /// Watch the last-saved timestamp (the "auto-saved" indicator).
    pub fn subscribe(&self) -> watch::Receiver<Option<i64>> {
        self.saved_at.subscribe()
    }

    pub const fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for AutoPersistController {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
        }
    }
}

/// Upsert the record. Failures are logged and swallowed.
fn save(
    history: &HistoryStore,
    saved_at: &watch::Sender<Option<i64>>,
    observation: Observation,
) -> bool {
    let timestamp = crate::util::now_millis();
    let page_id = observation.page_id;
    let record = PersistedHistoryRecord {
        id: page_id.to_string(),
        file_name: observation.file_name,
        timestamp,
        genre: observation.genre,
        translations: observation.translations,
    };

    match history.upsert(record) {
        Ok(()) => {
            info!("Auto-saved page {}", page_id);
            saved_at.send_replace(Some(timestamp));
            true
        }
        Err(e) => {
            warn!("Auto-save of page {} failed: {}", page_id, e);
            false
        }
    }
}
