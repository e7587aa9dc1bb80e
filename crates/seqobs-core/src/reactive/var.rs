use crate::reactive::{ComputationContext, Dependency};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A value that reruns the computations reading it when it is replaced.
///
/// Clones share the value.
pub struct ReactiveVar<T> {
    inner: Rc<VarInner<T>>,
}

struct VarInner<T> {
    value: RefCell<T>,
    dep: Dependency,
}

impl<T> Clone for ReactiveVar<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone> ReactiveVar<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(VarInner {
                value: RefCell::new(value),
                dep: Dependency::new(),
            }),
        }
    }

    /// Read the value and depend on it.
    pub fn get(&self, cx: &ComputationContext) -> T {
        self.inner.dep.depend(cx);
        self.get_untracked()
    }

    pub fn get_untracked(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replace the value and invalidate every reader.
    pub fn set(&self, value: T) {
        *self.inner.value.borrow_mut() = value;
        self.inner.dep.changed();
    }

    /// Modify the value in place and invalidate every reader.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        f(&mut self.inner.value.borrow_mut());
        self.inner.dep.changed();
    }
}

impl<T: Clone + PartialEq> ReactiveVar<T> {
    /// Replace the value only if it differs. Returns whether it did.
    pub fn set_if_changed(&self, value: T) -> bool {
        if *self.inner.value.borrow() == value {
            return false;
        }
        self.set(value);
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for ReactiveVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveVar")
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}
