//! Backend event relay
//!
//! Turns backend events into engine notifications. The completion flag
//! is the only state shared between the driver's call path and the
//! backend's callback path.

use crate::proxy::{EngineProxy, Notification};
use crate::speech::{BackendEvent, EventSink};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct EventRelay {
    proxy: Arc<dyn EngineProxy>,
    /// False once `stop()` interrupted the current utterance
    completed: AtomicBool,
}

impl EventRelay {
    pub fn new(proxy: Arc<dyn EngineProxy>) -> Self {
        Self {
            proxy,
            completed: AtomicBool::new(true),
        }
    }

    /// A new utterance starts out as completing naturally
    pub fn begin(&self) {
        self.completed.store(true, Ordering::SeqCst);
    }

    /// The current utterance will finish interrupted
    pub fn interrupt(&self) {
        self.completed.store(false, Ordering::SeqCst);
    }

    pub fn completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn handle(&self, event: BackendEvent) {
        match event {
            BackendEvent::WillSpeak => {
                // started-utterance is sent from say()
                debug!("Backend is about to speak");
            }
            BackendEvent::Word { location, length } => {
                self.proxy
                    .notify(Notification::StartedWord { location, length });
            }
            BackendEvent::Finished { success } => {
                let completed = self.completed();
                debug!(
                    "Utterance finished (backend success={}, completed={})",
                    success, completed
                );
                self.proxy
                    .notify(Notification::FinishedUtterance { completed });
                self.proxy.set_busy(false);
            }
        }
    }

    /// Callback target to register with a backend
    pub fn sink(self: &Arc<Self>) -> EventSink {
        let relay = Arc::clone(self);
        Arc::new(move |event| relay.handle(event))
    }
}
