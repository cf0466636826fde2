// Tue Jan 13 2026 - Alex

//! Values a search will produce once the module it describes shows up.

use crate::lazy::LazyError;
use crate::registry::ExportValue;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// How access to a still-pending value behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Access fails with a descriptive error.
    #[default]
    Strict,
    /// Access does nothing and yields no value.
    Lenient,
}

type Waiter<T> = Box<dyn FnOnce(&T)>;

enum State<T> {
    Pending(Vec<Waiter<T>>),
    Resolved(T),
    Failed(String),
}

struct Inner<T> {
    state: State<T>,
    description: String,
    strictness: Strictness,
}

/// A single-threaded placeholder that becomes a value at most once.
pub struct Deferred<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    pub fn pending(description: impl Into<String>, strictness: Strictness) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                state: State::Pending(Vec::new()),
                description: description.into(),
                strictness,
            })),
        }
    }

    pub fn resolved(description: impl Into<String>, value: T) -> Self {
        let deferred = Self::pending(description, Strictness::Strict);
        deferred.resolve(value);
        deferred
    }

    pub fn description(&self) -> String {
        self.inner.borrow().description.clone()
    }

    pub fn strictness(&self) -> Strictness {
        self.inner.borrow().strictness
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.inner.borrow().state, State::Resolved(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.inner.borrow().state, State::Failed(_))
    }

    pub fn try_get(&self) -> Option<T> {
        match &self.inner.borrow().state {
            State::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn get(&self) -> Result<T, LazyError> {
        let inner = self.inner.borrow();
        match &inner.state {
            State::Resolved(value) => Ok(value.clone()),
            State::Pending(_) => Err(LazyError::NotYetAvailable {
                query: inner.description.clone(),
            }),
            State::Failed(reason) => Err(LazyError::Failed {
                query: inner.description.clone(),
                reason: reason.clone(),
            }),
        }
    }

    /// Runs `f` on the value. While pending, a strict placeholder errors and
    /// a lenient one returns `Ok(None)`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> Result<Option<R>, LazyError> {
        if let Some(value) = self.try_get() {
            return Ok(Some(f(&value)));
        }
        if self.strictness() == Strictness::Lenient {
            return Ok(None);
        }
        self.get().map(|_| None)
    }

    /// Calls `f` once the value exists; immediately if it already does.
    pub fn on_resolve(&self, f: impl FnOnce(&T) + 'static) {
        let value = {
            let mut inner = self.inner.borrow_mut();
            match &mut inner.state {
                State::Pending(waiters) => {
                    waiters.push(Box::new(f));
                    return;
                }
                State::Resolved(value) => value.clone(),
                State::Failed(_) => return,
            }
        };
        f(&value);
    }

    /// First resolution wins. Waiters run after the internal borrow is
    /// released, so they may touch this placeholder again.
    pub fn resolve(&self, value: T) -> bool {
        let waiters = {
            let mut inner = self.inner.borrow_mut();
            match std::mem::replace(&mut inner.state, State::Resolved(value.clone())) {
                State::Pending(waiters) => waiters,
                previous => {
                    inner.state = previous;
                    return false;
                }
            }
        };

        for waiter in waiters {
            waiter(&value);
        }
        true
    }

    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let mut inner = self.inner.borrow_mut();
        if !matches!(inner.state, State::Pending(_)) {
            return false;
        }
        inner.state = State::Failed(reason.into());
        true
    }

    pub fn map<U: Clone + 'static>(&self, f: impl FnOnce(&T) -> U + 'static) -> Deferred<U> {
        let mapped = Deferred::pending(self.description(), self.strictness());
        let target = mapped.clone();
        self.on_resolve(move |value| {
            target.resolve(f(value));
        });
        mapped
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let state = match inner.state {
            State::Pending(_) => "pending",
            State::Resolved(_) => "resolved",
            State::Failed(_) => "failed",
        };
        f.debug_struct("Deferred")
            .field("description", &inner.description)
            .field("state", &state)
            .finish()
    }
}

/// Property forwarding for placeholders of module exports.
pub trait ExportAccess {
    fn prop(&self, key: &str) -> Result<Option<ExportValue>, LazyError>;
    fn source(&self) -> Result<Option<String>, LazyError>;
}

impl ExportAccess for Deferred<ExportValue> {
    fn prop(&self, key: &str) -> Result<Option<ExportValue>, LazyError> {
        self.with(|value| value.prop(key).cloned()).map(Option::flatten)
    }

    fn source(&self) -> Result<Option<String>, LazyError> {
        self.with(|value| value.callable_source().map(str::to_string))
            .map(Option::flatten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_strict_access_before_resolution() {
        let d: Deferred<u32> = Deferred::pending("find(x)", Strictness::Strict);
        assert!(!d.is_resolved());
        let err = d.get().unwrap_err();
        assert_eq!(err.to_string(), "find(x) is not yet available");
        assert!(d.with(|v| *v).is_err());
    }

    #[test]
    fn test_lenient_access_is_noop() {
        let d: Deferred<u32> = Deferred::pending("find(x)", Strictness::Lenient);
        assert_eq!(d.with(|v| *v + 1).unwrap(), None);
        d.resolve(1);
        assert_eq!(d.with(|v| *v + 1).unwrap(), Some(2));
    }

    #[test]
    fn test_first_resolution_wins() {
        let d = Deferred::pending("x", Strictness::Strict);
        assert!(d.resolve(1));
        assert!(!d.resolve(2));
        assert!(!d.fail("late"));
        assert_eq!(d.get().unwrap(), 1);
    }

    #[test]
    fn test_waiters_run_in_order() {
        let d = Deferred::pending("x", Strictness::Strict);
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["a", "b"] {
            let seen = seen.clone();
            d.on_resolve(move |v: &u32| seen.borrow_mut().push(format!("{}{}", tag, v)));
        }
        d.resolve(7);
        assert_eq!(*seen.borrow(), vec!["a7", "b7"]);

        let late = Rc::new(Cell::new(0));
        let l = late.clone();
        d.on_resolve(move |v| l.set(*v));
        assert_eq!(late.get(), 7);
    }

    #[test]
    fn test_waiter_may_reenter() {
        let d = Deferred::pending("x", Strictness::Strict);
        let again = d.clone();
        let observed = Rc::new(Cell::new(0));
        let o = observed.clone();
        d.on_resolve(move |_| o.set(again.get().unwrap()));
        d.resolve(5u32);
        assert_eq!(observed.get(), 5);
    }

    #[test]
    fn test_failed_state() {
        let d: Deferred<u32> = Deferred::pending("find(x)", Strictness::Strict);
        assert!(d.fail("no module"));
        assert!(d.is_failed());
        assert!(!d.resolve(1));
        assert!(matches!(d.get(), Err(LazyError::Failed { .. })));
    }

    #[test]
    fn test_map_follows_source() {
        let d = Deferred::pending("x", Strictness::Strict);
        let doubled = d.map(|v: &u32| v * 2);
        assert!(!doubled.is_resolved());
        d.resolve(4);
        assert_eq!(doubled.get().unwrap(), 8);
    }

    #[test]
    fn test_export_prop_forwarding() {
        let d = Deferred::pending("byProps(\"fooExport\")", Strictness::Strict);
        assert!(d.prop("fooExport").is_err());
        d.resolve(ExportValue::object(vec![("fooExport", ExportValue::function("function(){return 1}"))]));
        let prop = d.prop("fooExport").unwrap().unwrap();
        assert_eq!(prop.callable_source(), Some("function(){return 1}"));
        assert_eq!(d.prop("missing").unwrap(), None);
    }
}
