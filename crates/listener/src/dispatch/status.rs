use log::{info, warn};
use std::fmt;
use tokio::sync::mpsc;

/// Enough room for every message a runtime ever sends: starting, error, closed.
pub const STATUS_CHANNEL_CAPACITY: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenerStatus {
    Starting,
    Error(String),
    Closed,
}

impl fmt::Display for ListenerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerStatus::Starting => write!(f, "Starting HTTP listener"),
            ListenerStatus::Error(msg) => write!(f, "Error occurred: {msg}"),
            ListenerStatus::Closed => write!(f, "Listener closed"),
        }
    }
}

pub fn status_channel() -> (StatusReporter, mpsc::Receiver<ListenerStatus>) {
    let (sender, receiver) = mpsc::channel(STATUS_CHANNEL_CAPACITY);
    (StatusReporter { sender }, receiver)
}

/// Producer half of the status channel.
///
/// [`StatusReporter::close`] takes the reporter by value: it sends
/// [`ListenerStatus::Closed`] and drops the sender, so the receiver sees the
/// channel end right after that message. Nothing can be published after it.
#[derive(Debug)]
pub struct StatusReporter {
    sender: mpsc::Sender<ListenerStatus>,
}

impl StatusReporter {
    pub async fn publish(&self, status: ListenerStatus) {
        info!("Listener status: {status}");
        if self.sender.send(status).await.is_err() {
            warn!("Status receiver dropped, listener status not delivered");
        }
    }

    pub async fn close(self) {
        self.publish(ListenerStatus::Closed).await;
    }
}
