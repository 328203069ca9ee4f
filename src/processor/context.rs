//! Host function view of the calling processor

use std::rc::Rc;

use super::Processor;
use crate::coroutine::{Coroutine, Resumed};
use crate::debug::CallStackEntry;
use crate::error::Result;
use crate::table::Table;
use crate::value::Value;

/// Handed to every host function invocation
///
/// Reentering script code goes through `call`, which runs on the same
/// processor (and the same stacks) as the script that called the host.
pub struct ExecutionContext<'a> {
    processor: &'a mut Processor,
}

impl<'a> ExecutionContext<'a> {
    pub(crate) fn new(processor: &'a mut Processor) -> Self {
        ExecutionContext { processor }
    }

    /// Call a script function on the calling processor
    pub fn call(&mut self, function: &Value, args: &[Value]) -> Result<Value> {
        self.processor.call(Some(function), args)
    }

    pub fn globals(&self) -> &Table {
        self.processor.globals()
    }

    pub fn get_global(&self, name: &str) -> Value {
        self.processor.globals().get(name)
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.processor.globals().set(name, value);
    }

    /// Create a coroutine parented to the calling processor
    pub fn create_coroutine(&self, function: &Value) -> Result<Rc<Coroutine>> {
        self.processor.spawn_coroutine(function)
    }

    pub fn resume(&mut self, coroutine: &Rc<Coroutine>, args: &[Value]) -> Result<Resumed> {
        self.processor.resume_child(coroutine, args)
    }

    /// Handle of the processor executing this host function
    pub fn current_coroutine(&self) -> Option<Rc<Coroutine>> {
        self.processor.coroutine()
    }

    pub fn can_yield(&self) -> bool {
        self.processor.can_yield()
    }

    pub fn execution_nesting(&self) -> usize {
        self.processor.execution_nesting()
    }

    pub fn call_stack(&self) -> Vec<CallStackEntry> {
        self.processor.call_stack()
    }

    pub fn processor(&self) -> &Processor {
        self.processor
    }
}
