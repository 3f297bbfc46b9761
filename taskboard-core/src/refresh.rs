/// Refresh generations and the published board model.
///
/// Every refresh takes a ticket with a new generation before it starts
/// reading files. A finished refresh is published only if nothing newer was
/// published in the meantime, so a slow refresh can never overwrite the
/// result of a faster, later one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::board::BoardViewModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    generation: u64,
}

impl RefreshTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub type ModelReceiver = watch::Receiver<Option<Arc<BoardViewModel>>>;

pub struct BoardState {
    next_generation: AtomicU64,
    /// Highest generation published so far. Guarded together with the send.
    published: Mutex<u64>,
    tx: watch::Sender<Option<Arc<BoardViewModel>>>,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardState {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            next_generation: AtomicU64::new(1),
            published: Mutex::new(0),
            tx,
        }
    }

    /// Start a refresh.
    pub fn begin(&self) -> RefreshTicket {
        RefreshTicket {
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Publish the model built under `ticket`. When a newer generation has
    /// already been published the model is handed back unpublished.
    pub fn publish(
        &self,
        ticket: RefreshTicket,
        mut model: BoardViewModel,
    ) -> Result<Arc<BoardViewModel>, BoardViewModel> {
        let mut published = self.published.lock().unwrap_or_else(PoisonError::into_inner);
        if ticket.generation <= *published {
            log::debug!(
                "[taskboard.refresh.stale] Dropped generation {} (current {})",
                ticket.generation,
                *published
            );
            return Err(model);
        }
        *published = ticket.generation;
        model.generation = ticket.generation;
        let model = Arc::new(model);
        self.tx.send_replace(Some(model.clone()));
        Ok(model)
    }

    /// Latest published model, if any refresh has completed.
    pub fn current(&self) -> Option<Arc<BoardViewModel>> {
        self.tx.borrow().clone()
    }

    pub fn published_generation(&self) -> u64 {
        *self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every accepted model.
    pub fn subscribe(&self) -> ModelReceiver {
        self.tx.subscribe()
    }
}
