//! Bounded growable stack
//!
//! Backs both the value stack and the execution stack of a processor.
//! Storage grows on demand up to a fixed capacity.

use crate::error::{Result, ScriptError};

#[derive(Debug)]
pub struct FastStack<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> FastStack<T> {
    pub fn new(capacity: usize) -> Self {
        FastStack {
            items: Vec::new(),
            capacity,
        }
    }

    /// Push an item, failing once the capacity is reached
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.items.len() >= self.capacity {
            return Err(ScriptError::StackOverflow {
                capacity: self.capacity,
            });
        }
        self.items.push(item);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Remove and return the top `n` items, bottom first
    pub fn pop_n(&mut self, n: usize) -> Option<Vec<T>> {
        let at = self.items.len().checked_sub(n)?;
        Some(self.items.split_off(at))
    }

    /// Drop everything above `len`
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}
