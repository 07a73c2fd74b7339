//! Range-scoped bump arena with typed, bounds-checked handles.
//!
//! A `Capsule` owns a fixed-capacity arena tagged with a range name.
//! Handles remember the range that allocated them; access goes through the
//! capsule together with the currently active [`RangeContext`], and fails
//! when the active range no longer matches. This models a coarse ownership
//! region for teaching purposes; nothing in the compiler pipeline depends
//! on it.

use std::marker::PhantomData;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapsuleError {
    #[error("capsule range violation: access from '{active}' but owned by '{owned}'")]
    RangeViolation { owned: String, active: String },
    #[error("capsule index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("capsule arena exhausted: requested {requested} slots, {remaining} remaining")]
    OutOfCapacity { requested: usize, remaining: usize },
    #[error("capsule handle is stale")]
    StaleHandle,
}

/// The active range name. `enter` saves the previous range so nested
/// ranges unwind in order.
#[derive(Debug)]
pub struct RangeContext {
    current: String,
    stack: Vec<String>,
}

impl RangeContext {
    pub fn new(initial: impl Into<String>) -> Self {
        RangeContext {
            current: initial.into(),
            stack: Vec::new(),
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn enter(&mut self, range: impl Into<String>) {
        self.stack.push(std::mem::replace(&mut self.current, range.into()));
    }

    pub fn leave(&mut self) {
        if let Some(previous) = self.stack.pop() {
            self.current = previous;
        }
    }
}

#[derive(Debug)]
pub struct Capsule<T> {
    slots: Vec<T>,
    capacity: usize,
    range: String,
}

/// Handle into a capsule allocation. Indexing is bounds-checked against the
/// allocation, not the arena.
#[derive(Debug, Clone)]
pub struct CapsuleHandle<T> {
    start: usize,
    len: usize,
    range: String,
    _ty: PhantomData<T>,
}

impl<T> CapsuleHandle<T> {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn check(&self, index: usize, ctx: &RangeContext) -> Result<(), CapsuleError> {
        if ctx.current() != self.range {
            return Err(CapsuleError::RangeViolation {
                owned: self.range.clone(),
                active: ctx.current().to_string(),
            });
        }
        if index >= self.len {
            return Err(CapsuleError::IndexOutOfBounds {
                index,
                len: self.len,
            });
        }
        Ok(())
    }
}

impl<T: Default> Capsule<T> {
    pub fn with_capacity(capacity: usize, range: impl Into<String>) -> Self {
        Capsule {
            slots: Vec::new(),
            capacity,
            range: range.into(),
        }
    }

    pub fn range(&self) -> &str {
        &self.range
    }

    pub fn alloc(&mut self, count: usize) -> Result<CapsuleHandle<T>, CapsuleError> {
        let remaining = self.capacity - self.slots.len();
        if count > remaining {
            return Err(CapsuleError::OutOfCapacity {
                requested: count,
                remaining,
            });
        }
        let start = self.slots.len();
        self.slots.extend((0..count).map(|_| T::default()));
        Ok(CapsuleHandle {
            start,
            len: count,
            range: self.range.clone(),
            _ty: PhantomData,
        })
    }

    /// Drop every allocation. Handles from before the reset become stale.
    pub fn reset(&mut self) {
        self.slots.clear();
    }

    pub fn get(
        &self,
        handle: &CapsuleHandle<T>,
        index: usize,
        ctx: &RangeContext,
    ) -> Result<&T, CapsuleError> {
        handle.check(index, ctx)?;
        self.slots
            .get(handle.start + index)
            .ok_or(CapsuleError::StaleHandle)
    }

    pub fn get_mut(
        &mut self,
        handle: &CapsuleHandle<T>,
        index: usize,
        ctx: &RangeContext,
    ) -> Result<&mut T, CapsuleError> {
        handle.check(index, ctx)?;
        self.slots
            .get_mut(handle.start + index)
            .ok_or(CapsuleError::StaleHandle)
    }
}
