//! Scoped console/dialog observation for one page
//!
//! Create the observer before the action whose side effects matter; it only
//! sees events emitted after [`PageObserver::attach`]. Dropping it releases
//! the subscription.

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::warn;

use crate::page::{ConsoleMessage, DialogEvent, Page, PageEvent, PageEventKind};

pub struct PageObserver {
    page: u64,
    rx: broadcast::Receiver<PageEvent>,
    console: Vec<ConsoleMessage>,
    dialogs: Vec<DialogEvent>,
    /// Events dropped because the channel outran this observer
    missed: u64,
}

impl PageObserver {
    pub fn attach<P: Page + ?Sized>(page: &P) -> Self {
        Self {
            page: page.id(),
            rx: page.subscribe(),
            console: Vec::new(),
            dialogs: Vec::new(),
            missed: 0,
        }
    }

    /// Move everything received so far into the local buffers
    fn drain(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.page == self.page => match event.kind {
                    PageEventKind::Console(message) => self.console.push(message),
                    PageEventKind::Dialog(dialog) => self.dialogs.push(dialog),
                },
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Observer for page {} missed {} events", self.page, skipped);
                    self.missed += skipped;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Text of every console message at error level
    pub fn console_errors(&mut self) -> Vec<String> {
        self.drain();
        self.console
            .iter()
            .filter(|m| m.is_error())
            .map(|m| m.text.clone())
            .collect()
    }

    pub fn console_messages(&mut self) -> Vec<ConsoleMessage> {
        self.drain();
        self.console.clone()
    }

    pub fn dialogs(&mut self) -> Vec<DialogEvent> {
        self.drain();
        self.dialogs.clone()
    }

    /// Events lost to channel lag; any of them may have been a dialog
    pub fn missed_events(&mut self) -> u64 {
        self.drain();
        self.missed
    }
}
