use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tokio::sync::watch;

use super::documents::{DocChange, DocPath, Document};

/// Latest known state of one document; `document` is `None` when it does not
/// exist.
#[derive(Debug, Clone, PartialEq)]
pub struct DocSnapshot {
    pub path: DocPath,
    pub document: Option<Document>,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("document watch closed")]
pub struct WatchClosed;

/// Live senders keyed by document path. Only touched from the database worker
/// thread, so registration and publication are ordered with the writes.
#[derive(Default)]
pub(crate) struct WatchRegistry {
    senders: Mutex<HashMap<String, watch::Sender<DocSnapshot>>>,
}

impl WatchRegistry {
    pub(crate) fn register(&self, path: &DocPath, current: Option<Document>) -> DocumentWatch {
        let snapshot = DocSnapshot {
            path: path.clone(),
            document: current,
        };
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        senders.retain(|_, sender| !sender.is_closed());

        let receiver = match senders.get(path.as_str()) {
            Some(sender) => {
                sender.send_if_modified(|latest| {
                    if *latest == snapshot {
                        return false;
                    }
                    *latest = snapshot;
                    true
                });
                sender.subscribe()
            }
            None => {
                let (sender, receiver) = watch::channel(snapshot);
                senders.insert(path.as_str().to_string(), sender);
                receiver
            }
        };
        DocumentWatch {
            receiver,
            primed: false,
        }
    }

    pub(crate) fn publish(&self, changes: Vec<DocChange>) {
        if changes.is_empty() {
            return;
        }
        let senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        for change in changes {
            if let Some(sender) = senders.get(change.path.as_str()) {
                sender.send_replace(DocSnapshot {
                    path: change.path,
                    document: change.document,
                });
            }
        }
    }
}

/// Stream of snapshots for one document. The first call to
/// [`DocumentWatch::next`] yields the state at registration time.
pub struct DocumentWatch {
    receiver: watch::Receiver<DocSnapshot>,
    primed: bool,
}

impl DocumentWatch {
    pub async fn next(&mut self) -> Result<DocSnapshot, WatchClosed> {
        if !self.primed {
            self.primed = true;
            return Ok(self.receiver.borrow_and_update().clone());
        }
        self.receiver.changed().await.map_err(|_| WatchClosed)?;
        Ok(self.receiver.borrow_and_update().clone())
    }
}
