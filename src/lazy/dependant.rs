// Tue Jan 13 2026 - Alex

use crate::lazy::resolver::LazyRegistry;
use crate::lazy::LazyError;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type LazyFactory<T> = Rc<dyn Fn(&LazyRegistry) -> Option<T>>;

pub const DEFAULT_ATTEMPTS: usize = 5;

/// A value computed from other searches on first use. The factory is tried
/// again on each access until it produces something or runs out of attempts.
pub struct DependantLazy<T> {
    label: String,
    registry: LazyRegistry,
    factory: LazyFactory<T>,
    attempts: usize,
    tried: Cell<usize>,
    value: RefCell<Option<T>>,
}

impl<T: Clone + 'static> DependantLazy<T> {
    pub(crate) fn new(label: String, registry: LazyRegistry, factory: LazyFactory<T>, attempts: usize) -> Self {
        Self {
            label,
            registry,
            factory,
            attempts: attempts.max(1),
            tried: Cell::new(0),
            value: RefCell::new(None),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_resolved(&self) -> bool {
        self.value.borrow().is_some()
    }

    pub fn get(&self) -> Result<T, LazyError> {
        if let Some(value) = self.value.borrow().as_ref() {
            return Ok(value.clone());
        }
        if self.tried.get() >= self.attempts {
            return Err(LazyError::AttemptsExhausted {
                attempts: self.attempts,
            });
        }

        self.tried.set(self.tried.get() + 1);
        match (self.factory)(&self.registry) {
            Some(value) => {
                *self.value.borrow_mut() = Some(value.clone());
                Ok(value)
            }
            None => Err(LazyError::NotYetAvailable {
                query: self.label.clone(),
            }),
        }
    }
}
