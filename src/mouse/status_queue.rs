use crate::mouse::types::MouseStatus;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Producer side of the status queue, owned by the event handlers
#[derive(Debug, Clone)]
pub struct StatusSender {
    sender: mpsc::UnboundedSender<MouseStatus>,
}

impl StatusSender {
    /// Never blocks; the queue grows until the consumer drains it.
    pub fn push(&self, status: MouseStatus) {
        match self.sender.send(status) {
            Ok(_) => debug!("Queued status for {:?}", status.button),
            Err(e) => warn!("Status queue closed, dropping {:?}", e.0),
        }
    }
}

/// Consumer side of the status queue
///
/// Press notifications come out in the order the presses happened.
#[derive(Debug)]
pub struct StatusQueue {
    receiver: Mutex<mpsc::UnboundedReceiver<MouseStatus>>,
}

impl StatusQueue {
    pub fn try_pop(&self) -> Option<MouseStatus> {
        self.receiver.lock().try_recv().ok()
    }

    /// Takes everything currently queued
    pub fn drain(&self) -> Vec<MouseStatus> {
        let mut receiver = self.receiver.lock();
        let mut statuses = Vec::new();
        while let Ok(status) = receiver.try_recv() {
            statuses.push(status);
        }
        statuses
    }

    pub fn clear(&self) {
        let dropped = self.drain().len();
        if dropped > 0 {
            debug!("Cleared {} queued mouse statuses", dropped);
        }
    }
}

pub fn status_channel() -> (StatusSender, StatusQueue) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        StatusSender { sender },
        StatusQueue {
            receiver: Mutex::new(receiver),
        },
    )
}
