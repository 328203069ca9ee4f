//! # Processor - one execution context of a script
//!
//! A processor owns a value stack and an execution stack and drives bytecode
//! through the dispatch loop. Every script has exactly one main processor;
//! each coroutine gets its own.
//!
//! ## Sharing
//!
//! The root chunk, global table, debug context and performance stats are
//! shared (reference counted) between a processor and every coroutine spawned
//! from it. A coroutine keeps only a weak reference to its parent, so the
//! processor tree never forms an ownership cycle.
//!
//! ## Entry points
//!
//! - `call()`: host-initiated call; yielding is disabled for its duration
//! - `resume()`: coroutine start/continue, driven by `Coroutine::resume`

mod call;
mod context;
mod dispatch;
mod resume;

#[cfg(test)]
mod tests;

use std::rc::{Rc, Weak};

use tracing::debug;
use uuid::Uuid;

pub use context::ExecutionContext;
pub(crate) use dispatch::LoopExit;

use crate::chunk::Chunk;
use crate::config::VmConfig;
use crate::coroutine::Coroutine;
use crate::debug::{CallStackEntry, DebugContext};
use crate::diagnostics::PerformanceStats;
use crate::error::{Result, ScriptError};
use crate::frame::CallFrame;
use crate::guard::ExecutionGuard;
use crate::stack::FastStack;
use crate::table::Table;
use crate::value::{Closure, Value};

/* ===================== Shared state ===================== */

/// Resources shared by every processor of one script
#[derive(Debug, Clone)]
pub(crate) struct SharedState {
    pub chunk: Rc<Chunk>,
    pub globals: Table,
    pub debug: Rc<DebugContext>,
    pub stats: Rc<PerformanceStats>,
    pub config: Rc<VmConfig>,
}

impl SharedState {
    /// Entry point of a closure's function, or `NotAFunction`
    pub fn entry_point(&self, closure: &Closure) -> Result<usize> {
        self.chunk
            .function(closure.function)
            .map(|proto| proto.entry_point)
            .ok_or(ScriptError::NotAFunction {
                function: closure.function,
            })
    }
}

/* ===================== Processor ===================== */

#[derive(Debug)]
pub struct Processor {
    id: Uuid,
    value_stack: FastStack<Value>,
    execution_stack: FastStack<CallFrame>,
    shared: SharedState,

    /// Coroutine handle wrapping this processor
    handle: Weak<Coroutine>,

    /// Resumer-side parent; `None` only for the main processor
    parent: Option<Weak<Coroutine>>,

    /// Function a not-yet-started coroutine will run
    entry: Option<Closure>,

    can_yield: bool,

    /// Where to continue on the next resume; set only while suspended
    saved_ip: Option<usize>,

    guard: ExecutionGuard,
}

impl Processor {
    fn with_parts(
        handle: Weak<Coroutine>,
        parent: Option<Weak<Coroutine>>,
        entry: Option<Closure>,
        shared: SharedState,
    ) -> Self {
        Processor {
            id: Uuid::new_v4(),
            value_stack: FastStack::new(shared.config.value_stack_capacity),
            execution_stack: FastStack::new(shared.config.execution_stack_capacity),
            shared,
            handle,
            parent,
            entry,
            can_yield: true,
            saved_ip: None,
            guard: ExecutionGuard::new(),
        }
    }

    pub(crate) fn new_main(handle: Weak<Coroutine>, shared: SharedState) -> Self {
        let processor = Processor::with_parts(handle, None, None, shared);
        debug!(processor = %processor.id, "created main processor");
        processor
    }

    pub(crate) fn new_coroutine(
        handle: Weak<Coroutine>,
        parent: Weak<Coroutine>,
        function: Closure,
        shared: SharedState,
    ) -> Self {
        let processor = Processor::with_parts(handle, Some(parent), Some(function), shared);
        debug!(processor = %processor.id, "created coroutine processor");
        processor
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_main(&self) -> bool {
        self.parent.is_none()
    }

    /// Handle of the processor that spawned this one
    pub fn parent(&self) -> Option<Rc<Coroutine>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Handle wrapping this processor
    pub fn coroutine(&self) -> Option<Rc<Coroutine>> {
        self.handle.upgrade()
    }

    pub fn globals(&self) -> &Table {
        &self.shared.globals
    }

    pub fn chunk(&self) -> &Rc<Chunk> {
        &self.shared.chunk
    }

    pub fn can_yield(&self) -> bool {
        self.can_yield
    }

    pub fn saved_instruction_pointer(&self) -> Option<usize> {
        self.saved_ip
    }

    pub fn execution_nesting(&self) -> usize {
        self.guard.nesting()
    }

    pub fn guard(&self) -> &ExecutionGuard {
        &self.guard
    }

    pub fn value_stack_len(&self) -> usize {
        self.value_stack.len()
    }

    pub fn execution_stack_len(&self) -> usize {
        self.execution_stack.len()
    }

    /// Raw value stack contents, bottom first (for debuggers)
    pub fn value_stack(&self) -> &[Value] {
        self.value_stack.as_slice()
    }

    /// Frames currently on the execution stack, innermost first
    pub fn call_stack(&self) -> Vec<CallStackEntry> {
        self.execution_stack
            .iter()
            .rev()
            .map(|frame| CallStackEntry {
                function_name: self
                    .shared
                    .chunk
                    .function(frame.function)
                    .map(|proto| proto.name.clone())
                    .unwrap_or_else(|| format!("#{}", frame.function)),
                entry_point: frame.debug_entry_point,
                base_pointer: frame.base_pointer,
                return_address: frame.return_address,
            })
            .collect()
    }

    /* ===================== Guard ===================== */

    fn enter_processor(&self) -> Result<()> {
        self.guard.enter()?;
        Ok(())
    }

    fn leave_processor(&self) {
        if self.guard.leave() {
            self.shared.debug.signal_execution_ended(self.id);
        }
    }

    /* ===================== Coroutines ===================== */

    /// Spawn a coroutine running `function`, parented to this processor
    pub(crate) fn spawn_coroutine(&self, function: &Value) -> Result<Rc<Coroutine>> {
        match function {
            Value::Closure(closure) => {
                self.shared.entry_point(closure)?;
                Ok(Coroutine::spawn(
                    self.shared.clone(),
                    self.handle.clone(),
                    closure.clone(),
                ))
            }
            other => Err(ScriptError::NotCallable {
                type_name: other.type_name(),
            }),
        }
    }
}
