use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::db::snapshot_repository::SnapshotStore;
use crate::models::Conversation;

enum WriteCommand {
    Save(Vec<Conversation>),
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget writer in front of a [`SnapshotStore`].
///
/// Snapshots are handed to a background task over a channel and written in
/// submission order; when several are queued only the newest is written.
/// Write failures are logged and dropped.
#[derive(Clone)]
pub struct SnapshotWriter {
    tx: mpsc::UnboundedSender<WriteCommand>,
}

impl SnapshotWriter {
    /// Spawns the writer task. Must be called inside a Tokio runtime.
    pub fn spawn(store: Arc<dyn SnapshotStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(store, rx));
        Self { tx }
    }

    /// Queues a snapshot without waiting for it to be written.
    pub fn save(&self, conversations: Vec<Conversation>) {
        if self.tx.send(WriteCommand::Save(conversations)).is_err() {
            warn!("Snapshot writer has stopped; snapshot dropped");
        }
    }

    /// Waits until every snapshot queued before this call has been handled.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(WriteCommand::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

async fn run(store: Arc<dyn SnapshotStore>, mut rx: mpsc::UnboundedReceiver<WriteCommand>) {
    while let Some(command) = rx.recv().await {
        match command {
            WriteCommand::Flush(ack) => {
                let _ = ack.send(());
            }
            WriteCommand::Save(mut latest) => {
                // Coalesce to the newest queued snapshot, answering any flush
                // requests only after the write below.
                let mut pending_acks = Vec::new();
                while let Ok(next) = rx.try_recv() {
                    match next {
                        WriteCommand::Save(newer) => latest = newer,
                        WriteCommand::Flush(ack) => pending_acks.push(ack),
                    }
                }
                match store.save(&latest).await {
                    Ok(()) => debug!("Saved snapshot of {} conversations", latest.len()),
                    Err(e) => warn!("Snapshot save failed, continuing without persistence: {e}"),
                }
                for ack in pending_acks {
                    let _ = ack.send(());
                }
            }
        }
    }
}
