//! Shared mutable table
//!
//! Only what the core needs: string-keyed reads and writes for the global
//! table. Tables are reference types, so clones alias the same storage.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: Rc<RefCell<HashMap<String, Value>>>,
}

impl Table {
    pub fn new() -> Self {
        Table::default()
    }

    /// Read a key; missing keys read as nil
    pub fn get(&self, key: &str) -> Value {
        self.entries
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    /// Write a key; storing nil removes it and tuples are collapsed first
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let key: String = key.into();
        let value = value.to_scalar();
        let mut entries = self.entries.borrow_mut();
        if matches!(value, Value::Nil) {
            entries.remove(&key);
        } else {
            entries.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn ptr_eq(&self, other: &Table) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    pub(crate) fn as_ptr(&self) -> *const RefCell<HashMap<String, Value>> {
        Rc::as_ptr(&self.entries)
    }
}
