//! Engine-facing notification protocol
//!
//! The engine hands the driver a proxy. The driver reports utterance
//! progress through it and keeps the engine's busy flag current.
//! Notifications may be sent from backend callback threads, so proxies
//! must be `Send + Sync`.

use log::debug;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Mutex;

/// Notifications the driver sends to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// An utterance was submitted to the backend
    StartedUtterance,
    /// The backend reached a word boundary
    StartedWord { location: usize, length: usize },
    /// Rendering ended; `completed` is false when `stop()` interrupted it
    FinishedUtterance { completed: bool },
}

impl Notification {
    /// Event name as seen by the engine
    pub fn name(&self) -> &'static str {
        match self {
            Notification::StartedUtterance => "started-utterance",
            Notification::StartedWord { .. } => "started-word",
            Notification::FinishedUtterance { .. } => "finished-utterance",
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notification::StartedUtterance => write!(f, "{}", self.name()),
            Notification::StartedWord { location, length } => write!(
                f,
                "{} location={} length={}",
                self.name(),
                location,
                length
            ),
            Notification::FinishedUtterance { completed } => {
                write!(f, "{} completed={}", self.name(), completed)
            }
        }
    }
}

/// The engine side of the driver contract
pub trait EngineProxy: Send + Sync {
    /// Mark the engine busy or idle
    fn set_busy(&self, busy: bool);

    /// Whether the engine currently considers the driver busy
    fn is_busy(&self) -> bool;

    /// Deliver a notification to the engine
    fn notify(&self, notification: Notification);
}

/// Proxy that keeps every notification it receives
///
/// Useful for embedding the driver without an engine loop, and for tests.
#[derive(Default)]
pub struct RecordingProxy {
    busy: AtomicBool,
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of notifications received so far
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    /// Most recent notification, if any
    pub fn last(&self) -> Option<Notification> {
        self.notifications
            .lock()
            .ok()
            .and_then(|n| n.last().cloned())
    }

    /// Drop recorded notifications
    pub fn clear(&self) {
        if let Ok(mut n) = self.notifications.lock() {
            n.clear();
        }
    }
}

impl EngineProxy for RecordingProxy {
    fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn notify(&self, notification: Notification) {
        debug!("notify: {}", notification);
        if let Ok(mut n) = self.notifications.lock() {
            n.push(notification);
        }
    }
}

/// Proxy that forwards notifications over a channel
///
/// The command line front end uses this to block until the backend
/// reports `finished-utterance`.
pub struct ChannelProxy {
    busy: AtomicBool,
    tx: Mutex<Sender<Notification>>,
}

impl ChannelProxy {
    pub fn new(tx: Sender<Notification>) -> Self {
        Self {
            busy: AtomicBool::new(false),
            tx: Mutex::new(tx),
        }
    }
}

impl EngineProxy for ChannelProxy {
    fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn notify(&self, notification: Notification) {
        debug!("notify: {}", notification);
        if let Ok(tx) = self.tx.lock() {
            // Receiver gone means nobody is waiting any more
            let _ = tx.send(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;

    #[test]
    fn test_notification_names() {
        assert_eq!(Notification::StartedUtterance.name(), "started-utterance");
        assert_eq!(
            Notification::StartedWord {
                location: 0,
                length: 5
            }
            .name(),
            "started-word"
        );
        assert_eq!(
            Notification::FinishedUtterance { completed: true }.name(),
            "finished-utterance"
        );
    }

    #[test]
    fn test_display() {
        let n = Notification::StartedWord {
            location: 6,
            length: 5,
        };
        assert_eq!(n.to_string(), "started-word location=6 length=5");
    }

    #[test]
    fn test_recording_proxy() {
        let proxy = RecordingProxy::new();
        assert!(!proxy.is_busy());

        proxy.set_busy(true);
        assert!(proxy.is_busy());

        proxy.notify(Notification::StartedUtterance);
        proxy.notify(Notification::FinishedUtterance { completed: true });
        assert_eq!(proxy.notifications().len(), 2);
        assert_eq!(
            proxy.last(),
            Some(Notification::FinishedUtterance { completed: true })
        );

        proxy.clear();
        assert!(proxy.notifications().is_empty());
    }

    #[test]
    fn test_channel_proxy_forwards() {
        let (tx, rx) = channel();
        let proxy = ChannelProxy::new(tx);

        proxy.notify(Notification::StartedUtterance);
        assert_eq!(rx.recv().unwrap(), Notification::StartedUtterance);
    }

    #[test]
    fn test_channel_proxy_without_receiver() {
        let (tx, rx) = channel();
        drop(rx);
        let proxy = ChannelProxy::new(tx);

        // Must not panic
        proxy.notify(Notification::StartedUtterance);
    }
}
