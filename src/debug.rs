//! Debugger attachment point
//!
//! A single `DebugContext` is shared by the main processor and every coroutine
//! spawned from it. The core only emits lifecycle signals and exposes frame
//! data; rendering belongs to the attached debugger.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

use crate::frame::ReturnAddress;

/// Receiver of execution-lifecycle signals
pub trait Debugger {
    /// Top-level execution of a processor ended (nesting went 1 -> 0)
    fn signal_execution_ended(&self, processor: Uuid);
}

#[derive(Default)]
pub struct DebugContext {
    attached: RefCell<Option<Rc<dyn Debugger>>>,
}

impl DebugContext {
    pub fn new() -> Rc<Self> {
        Rc::new(DebugContext::default())
    }

    pub fn attach(&self, debugger: Rc<dyn Debugger>) {
        *self.attached.borrow_mut() = Some(debugger);
    }

    pub fn detach(&self) -> Option<Rc<dyn Debugger>> {
        self.attached.borrow_mut().take()
    }

    pub fn is_attached(&self) -> bool {
        self.attached.borrow().is_some()
    }

    pub(crate) fn signal_execution_ended(&self, processor: Uuid) {
        // Clone out so the debugger may attach/detach from inside the callback
        let debugger = self.attached.borrow().clone();
        if let Some(debugger) = debugger {
            debugger.signal_execution_ended(processor);
        }
    }
}

impl fmt::Debug for DebugContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugContext")
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// One row of a rendered call stack, innermost first
#[derive(Debug, Clone, PartialEq)]
pub struct CallStackEntry {
    pub function_name: String,
    pub entry_point: usize,
    pub base_pointer: usize,
    pub return_address: ReturnAddress,
}

impl CallStackEntry {
    /// Whether the host entered this frame directly
    pub fn is_host_boundary(&self) -> bool {
        self.return_address.is_host()
    }
}
