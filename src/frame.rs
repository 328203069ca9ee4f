//! Frame descriptors
//!
//! One descriptor per in-flight function invocation. The descriptor only
//! records where the frame's window starts and where control goes on return;
//! the arguments and locals themselves live on the value stack.

use std::rc::Rc;

use crate::value::ClosureScope;

/// Where control goes when a frame returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnAddress {
    /// Entered directly from the host; returning hands the result back to it
    Host,
    /// Entered by a script call; resume the caller at this instruction
    Instruction(usize),
}

impl ReturnAddress {
    pub fn is_host(self) -> bool {
        matches!(self, ReturnAddress::Host)
    }
}

/// Execution frame
///
/// Value stack layout around a frame:
///
/// ```text
/// [callee][arg1 .. argN][N] | locals .. temporaries
///                           ^ base_pointer
/// ```
#[derive(Debug, Clone)]
pub struct CallFrame {
    /// Value-stack height where this frame's locals begin
    pub base_pointer: usize,

    pub return_address: ReturnAddress,

    /// Captured variables visible to the executing function
    pub closure_scope: Rc<ClosureScope>,

    /// Instruction index where the function body begins
    pub debug_entry_point: usize,

    /// Index into the root chunk's function table
    pub function: usize,
}

impl CallFrame {
    /// Slot holding the argument count sentinel
    pub fn argc_slot(&self) -> usize {
        self.base_pointer - 1
    }
}
