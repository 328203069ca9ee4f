//! Error types for the execution core
//!
//! Two families:
//! - `ScriptError`: anything raised while entering, running or resuming a processor
//! - `LoadError`: a serialized chunk that fails validation before it can run

use thiserror::Error;

use crate::coroutine::CoroutineState;

/// Errors produced by the execution core
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScriptError {
    /// A non-closure value was handed to a call
    #[error("attempt to call a {type_name} value")]
    NotCallable { type_name: &'static str },

    /// The closure refers to a function index the root chunk does not define
    #[error("function #{function} has no compiled entry point")]
    NotAFunction { function: usize },

    /// The processor is bound to another OS thread
    #[error("cannot enter the same processor from two different threads: {owner} and {caller}")]
    CrossThreadAccess { owner: u64, caller: u64 },

    /// A yield was attempted while a host call is on the stack
    #[error("attempt to yield across a host-call boundary")]
    YieldAcrossHostBoundary,

    #[error("cannot resume dead coroutine")]
    CoroutineDead,

    #[error("cannot resume non-suspended coroutine (state: {state})")]
    CoroutineNotSuspended { state: CoroutineState },

    #[error("stack overflow (capacity {capacity})")]
    StackOverflow { capacity: usize },

    /// A frame tried to address a slot outside its window
    #[error("invalid stack access at slot {index}")]
    InvalidStackAccess { index: usize },

    /// The host tried to reenter a processor through the script handle
    #[error("processor is busy; reenter through the execution context")]
    ProcessorBusy,

    /// Any error raised by executing bytecode
    #[error("{message}")]
    Runtime { message: String },
}

impl ScriptError {
    /// Build a script runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        ScriptError::Runtime {
            message: message.into(),
        }
    }

    /// Whether the processor must be considered unusable after this error
    ///
    /// Thread-affinity violations and stack corruption are not recoverable;
    /// everything else leaves the processor ready for another call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScriptError::CrossThreadAccess { .. } | ScriptError::InvalidStackAccess { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors found while validating a root chunk
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to parse chunk: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("chunk defines no functions")]
    Empty,

    #[error("function '{name}' has entry point {entry_point} outside the code ({len} instructions)")]
    EntryPointOutOfRange {
        name: String,
        entry_point: usize,
        len: usize,
    },

    #[error("instruction {at} jumps to {target}, outside the code ({len} instructions)")]
    JumpOutOfRange { at: usize, target: usize, len: usize },

    #[error("instruction {at} references undefined function #{function}")]
    UndefinedFunction { at: usize, function: usize },
}
