// Tue Jan 13 2026 - Alex

use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::Notify;

/// One-shot abort for a whole verification run. The first reason wins.
#[derive(Clone, Default)]
pub struct FatalSignal {
    reason: Rc<RefCell<Option<String>>>,
    notify: Rc<Notify>,
}

impl FatalSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self, reason: impl Into<String>) -> bool {
        {
            let mut slot = self.reason.borrow_mut();
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason.into());
        }
        self.notify.notify_waiters();
        true
    }

    pub fn is_fired(&self) -> bool {
        self.reason.borrow().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        self.reason.borrow().clone()
    }

    /// Completes once the signal fires, immediately if it already has.
    pub async fn wait(&self) -> String {
        loop {
            let notified = self.notify.notified();
            if let Some(reason) = self.reason() {
                return reason;
            }
            notified.await;
        }
    }

    pub fn reset(&self) {
        *self.reason.borrow_mut() = None;
    }
}
