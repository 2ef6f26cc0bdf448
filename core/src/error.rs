use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::warn;

/// Failures of the asynchronous collaborators. None of them are fatal: local
/// state stays as it is and the failure is reported to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Failed to load meal plans {from} to {to}: {reason}")]
    FetchRange {
        from: NaiveDate,
        to: NaiveDate,
        reason: String,
    },

    #[error("Failed to load meal plan for {date}: {reason}")]
    FetchDay { date: NaiveDate, reason: String },

    #[error("Failed to save meal plan for {date}: {reason}")]
    Persist { date: NaiveDate, reason: String },

    #[error("Failed to update pantry for {date}: {reason}")]
    PantryConsume { date: NaiveDate, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("Slide {0} is outside the viewing window")]
    SlideOutOfRange(usize),

    #[error("Slide {next} is not adjacent to slide {current}")]
    NotAdjacent { current: usize, next: usize },
}

/// User-facing failure sink. Every report is logged; if a receiver was
/// attached it also gets a copy (the toast queue in a UI, stderr in the CLI).
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    tx: Option<UnboundedSender<SyncError>>,
}

impl Reporter {
    #[must_use]
    pub fn channel() -> (Self, UnboundedReceiver<SyncError>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn report(&self, err: SyncError) {
        warn!("{err}");
        if let Some(tx) = &self.tx {
            // receiver gone means nobody is listening any more
            let _ = tx.send(err);
        }
    }
}
