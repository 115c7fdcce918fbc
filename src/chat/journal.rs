use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

use crate::db::Store;

use super::hub::Delivery;
use super::participant::Participant;

const JOURNAL_CAPACITY: usize = 64;

/// A storage write produced by one connection.
#[derive(Debug)]
pub enum Write {
    Profile(Participant),
    Message(Delivery),
    Offline(Participant),
}

/// Per-connection storage writer. Writes run one at a time in the order they
/// were recorded, off the relay path; failures are logged and dropped.
#[derive(Clone)]
pub struct Journal {
    tx: mpsc::Sender<Write>,
}

impl Journal {
    /// Starts the writer. It stops once every `Journal` handle is dropped and
    /// the backlog is written.
    pub fn spawn(store: Store) -> (Journal, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel(JOURNAL_CAPACITY);
        let writer = tokio::spawn(async move {
            while let Some(write) = rx.recv().await {
                apply(&store, write).await;
            }
        });
        (Journal { tx }, writer)
    }

    pub async fn record(&self, write: Write) {
        if self.tx.send(write).await.is_err() {
            warn!("storage writer is gone, write dropped");
        }
    }
}

async fn apply(store: &Store, write: Write) {
    match write {
        Write::Profile(participant) => {
            if let Err(e) = store.upsert_profile(&participant).await {
                warn!(participant = %participant.id, error = %e, "failed to save profile");
            }
        }
        Write::Message(delivery) => {
            if let Err(e) = store.append_message(&delivery).await {
                warn!(room = %delivery.event.room_id, error = %e, "failed to log message");
            }
        }
        Write::Offline(participant) => {
            if let Err(e) = store.mark_offline(&participant).await {
                warn!(participant = %participant.id, error = %e, "failed to mark offline");
            }
        }
    }
}
