use std::time::{Duration, Instant};

use anyhow::Result;
use strum::Display;
use time::OffsetDateTime;

use crate::config::AutoSaveConfig;
use crate::notebook::NotebookId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SaveTrigger {
    Debounced,
    Interval,
    Structural,
    Manual,
}

#[derive(Debug, Clone)]
pub enum AutoSaveStatus {
    Disabled,
    Inactive,
    Idle {
        notebook_id: NotebookId,
        last_saved_at: Option<OffsetDateTime>,
    },
    Pending {
        notebook_id: NotebookId,
        since: OffsetDateTime,
    },
    Error {
        notebook_id: NotebookId,
        message: String,
        occurred_at: OffsetDateTime,
    },
}

#[derive(Debug, Clone)]
pub enum AutoSaveEvent {
    Saved {
        notebook_id: NotebookId,
        trigger: SaveTrigger,
        timestamp: OffsetDateTime,
    },
    Error {
        notebook_id: NotebookId,
        trigger: SaveTrigger,
        message: String,
    },
}

#[derive(Debug)]
pub struct AutoSaveRuntime {
    enabled: bool,
    debounce: Duration,
    interval: Duration,
    session: Option<Session>,
}

#[derive(Debug)]
struct Session {
    notebook_id: NotebookId,
    dirty: bool,
    dirty_since: Option<Instant>,
    dirty_since_wall: Option<OffsetDateTime>,
    structural_pending: bool,
    next_interval: Instant,
    last_saved_at: Option<OffsetDateTime>,
    last_error: Option<AutoSaveFailure>,
}

#[derive(Debug, Clone)]
struct AutoSaveFailure {
    message: String,
    occurred_at: OffsetDateTime,
}

impl AutoSaveRuntime {
    pub fn new(config: &AutoSaveConfig) -> Self {
        Self {
            enabled: config.enabled,
            debounce: config.debounce(),
            interval: config.interval(),
            session: None,
        }
    }

    pub fn status(&self) -> AutoSaveStatus {
        if !self.enabled {
            return AutoSaveStatus::Disabled;
        }
        let Some(session) = &self.session else {
            return AutoSaveStatus::Inactive;
        };
        if let Some(failure) = &session.last_error {
            return AutoSaveStatus::Error {
                notebook_id: session.notebook_id.clone(),
                message: failure.message.clone(),
                occurred_at: failure.occurred_at,
            };
        }
        if session.dirty {
            let since = session
                .dirty_since_wall
                .unwrap_or_else(OffsetDateTime::now_utc);
            return AutoSaveStatus::Pending {
                notebook_id: session.notebook_id.clone(),
                since,
            };
        }
        AutoSaveStatus::Idle {
            notebook_id: session.notebook_id.clone(),
            last_saved_at: session.last_saved_at,
        }
    }

    pub fn has_active_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn has_dirty_changes(&self) -> bool {
        self.session.as_ref().map(|s| s.dirty).unwrap_or(false)
    }

    pub fn start_session(&mut self, notebook_id: NotebookId, now: Instant) {
        tracing::debug!(id = %notebook_id, "autosave session started");
        self.session = Some(Session::new(notebook_id, now + self.interval));
    }

    pub fn end_session(&mut self, notebook_id: &NotebookId) {
        if self
            .session
            .as_ref()
            .is_some_and(|s| &s.notebook_id == notebook_id)
        {
            self.session = None;
        }
    }

    pub fn note_input(&mut self, now: Instant) {
        if let Some(session) = self.session.as_mut() {
            session.mark_dirty(now);
        }
    }

    pub fn request_structural(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.structural_pending = true;
        }
    }

    /// The trigger that should run at `now`, if any. Structural saves win over timers.
    pub fn due(&self, now: Instant) -> Option<SaveTrigger> {
        let session = self.session.as_ref()?;
        if session.structural_pending {
            return Some(SaveTrigger::Structural);
        }
        if !self.enabled {
            return None;
        }
        let settled = session
            .dirty_since
            .is_some_and(|since| now.saturating_duration_since(since) >= self.debounce);
        if session.dirty && settled {
            return Some(SaveTrigger::Debounced);
        }
        if now >= session.next_interval {
            return Some(SaveTrigger::Interval);
        }
        None
    }

    pub fn finish(
        &mut self,
        trigger: SaveTrigger,
        outcome: Result<()>,
        now: Instant,
    ) -> Option<AutoSaveEvent> {
        let interval = self.interval;
        let session = self.session.as_mut()?;
        let timestamp = OffsetDateTime::now_utc();
        if trigger == SaveTrigger::Interval {
            session.next_interval = now + interval;
        }
        if trigger == SaveTrigger::Structural {
            session.structural_pending = false;
        }
        match outcome {
            Ok(()) => {
                session.dirty = false;
                session.dirty_since = None;
                session.dirty_since_wall = None;
                session.last_saved_at = Some(timestamp);
                session.last_error = None;
                Some(AutoSaveEvent::Saved {
                    notebook_id: session.notebook_id.clone(),
                    trigger,
                    timestamp,
                })
            }
            Err(err) => {
                let message = format!("{err:#}");
                tracing::warn!(id = %session.notebook_id, %trigger, error = %message, "save failed");
                session.last_error = Some(AutoSaveFailure {
                    message: message.clone(),
                    occurred_at: timestamp,
                });
                // Keep retrying on the debounce path until a save lands.
                if session.dirty {
                    session.dirty_since = Some(now);
                }
                Some(AutoSaveEvent::Error {
                    notebook_id: session.notebook_id.clone(),
                    trigger,
                    message,
                })
            }
        }
    }
}

impl Session {
    fn new(notebook_id: NotebookId, next_interval: Instant) -> Self {
        Self {
            notebook_id,
            dirty: false,
            dirty_since: None,
            dirty_since_wall: None,
            structural_pending: false,
            next_interval,
            last_saved_at: None,
            last_error: None,
        }
    }

    fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.dirty_since = Some(now);
        if self.dirty_since_wall.is_none() {
            self.dirty_since_wall = Some(OffsetDateTime::now_utc());
        }
    }
}
