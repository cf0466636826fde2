// Tue Jan 13 2026 - Alex

use std::cell::RefCell;

/// One flag per scan task; a task flips its flag when it finishes.
#[derive(Debug, Default)]
pub struct SettledSet {
    flags: RefCell<Vec<bool>>,
}

impl SettledSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> usize {
        let mut flags = self.flags.borrow_mut();
        flags.push(false);
        flags.len() - 1
    }

    pub fn settle(&self, token: usize) {
        if let Some(flag) = self.flags.borrow_mut().get_mut(token) {
            *flag = true;
        }
    }

    pub fn len(&self) -> usize {
        self.flags.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.borrow().is_empty()
    }

    pub fn pending(&self) -> usize {
        self.flags.borrow().iter().filter(|f| !**f).count()
    }

    pub fn is_settled(&self) -> bool {
        self.pending() == 0
    }

    pub fn clear(&self) {
        self.flags.borrow_mut().clear();
    }
}

/// Decides when draining may stop: the set must be fully settled and keep
/// the same size for `required` consecutive polls.
#[derive(Debug, Default)]
pub struct DrainWatch {
    last_len: Option<usize>,
    stable: usize,
}

impl DrainWatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, set: &SettledSet, required: usize) -> bool {
        let len = set.len();
        if set.is_settled() && self.last_len == Some(len) {
            self.stable += 1;
        } else {
            self.stable = 0;
        }
        self.last_len = Some(len);
        self.stable >= required
    }

    pub fn stable_cycles(&self) -> usize {
        self.stable
    }
}
