//! Coroutine handles
//!
//! A `Coroutine` is the script-visible wrapper around a processor. The main
//! processor of a script is wrapped too (state `Main`, never resumable).
//!
//! State machine:
//!
//! ```text
//! NotStarted --resume--> Running --yield--> Suspended --resume--> Running
//!                        Running --resume other--> Normal --other stops--> Running
//!                        Running --return / error--> Dead (terminal)
//! ```
//!
//! The state lives on the handle rather than inside the processor so it stays
//! readable while the processor is borrowed by its own dispatch loop.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, ScriptError};
use crate::processor::{LoopExit, Processor, SharedState};
use crate::value::{Closure, Value};

/* ===================== State ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoroutineState {
    /// The script's main processor
    Main,
    /// Created, never resumed
    NotStarted,
    Running,
    /// Resumed another coroutine and is waiting for it to stop
    Normal,
    /// Stopped at a yield
    Suspended,
    /// Returned or failed; terminal
    Dead,
}

impl CoroutineState {
    pub fn is_resumable(self) -> bool {
        matches!(self, CoroutineState::NotStarted | CoroutineState::Suspended)
    }

    pub fn name(self) -> &'static str {
        match self {
            CoroutineState::Main => "main",
            CoroutineState::NotStarted => "not_started",
            CoroutineState::Running => "running",
            CoroutineState::Normal => "normal",
            CoroutineState::Suspended => "suspended",
            CoroutineState::Dead => "dead",
        }
    }
}

impl fmt::Display for CoroutineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a successful resume
#[derive(Debug, Clone, PartialEq)]
pub struct Resumed {
    /// `Suspended` after a yield, `Dead` after a return
    pub state: CoroutineState,
    /// Yielded or returned values (a tuple when more than one)
    pub value: Value,
}

/* ===================== Handle ===================== */

pub struct Coroutine {
    id: Uuid,
    state: Cell<CoroutineState>,
    processor: RefCell<Processor>,
}

impl Coroutine {
    /// Wrap a fresh main processor
    pub(crate) fn new_main(shared: SharedState) -> Rc<Self> {
        Rc::new_cyclic(|handle| {
            let processor = Processor::new_main(handle.clone(), shared);
            Coroutine {
                id: processor.id(),
                state: Cell::new(CoroutineState::Main),
                processor: RefCell::new(processor),
            }
        })
    }

    /// Create a not-started coroutine running `function`
    pub(crate) fn spawn(shared: SharedState, parent: Weak<Coroutine>, function: Closure) -> Rc<Self> {
        Rc::new_cyclic(|handle| {
            let processor = Processor::new_coroutine(handle.clone(), parent, function, shared);
            Coroutine {
                id: processor.id(),
                state: Cell::new(CoroutineState::NotStarted),
                processor: RefCell::new(processor),
            }
        })
    }

    /// Id of the wrapped processor
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> CoroutineState {
        self.state.get()
    }

    pub fn is_main(&self) -> bool {
        self.state.get() == CoroutineState::Main
    }

    pub(crate) fn set_state(&self, state: CoroutineState) {
        self.state.set(state);
    }

    /// Borrow the wrapped processor; `None` while it is executing
    pub fn processor(&self) -> Option<std::cell::Ref<'_, Processor>> {
        self.processor.try_borrow().ok()
    }

    pub(crate) fn processor_mut(&self) -> Result<std::cell::RefMut<'_, Processor>> {
        self.processor
            .try_borrow_mut()
            .map_err(|_| ScriptError::ProcessorBusy)
    }

    /// Start or continue the coroutine
    ///
    /// Returns the yielded values (state `Suspended`) or the returned values
    /// (state `Dead`). A runtime error kills the coroutine and is returned as
    /// the failure. Dead coroutines never run again. A processor that is
    /// currently borrowed yields `ProcessorBusy` and leaves the state as is.
    pub fn resume(&self, args: &[Value]) -> Result<Resumed> {
        let from = self.state.get();
        match from {
            CoroutineState::Dead => return Err(ScriptError::CoroutineDead),
            state if !state.is_resumable() => {
                return Err(ScriptError::CoroutineNotSuspended { state })
            }
            _ => {}
        }

        let mut processor = self.processor_mut()?;

        debug!(coroutine = %self.id, from = %from, "resume");
        self.state.set(CoroutineState::Running);

        match processor.resume(args) {
            Ok(LoopExit::Yielded { value, .. }) => {
                self.state.set(CoroutineState::Suspended);
                Ok(Resumed {
                    state: CoroutineState::Suspended,
                    value,
                })
            }
            Ok(LoopExit::Returned(value)) => {
                self.state.set(CoroutineState::Dead);
                debug!(coroutine = %self.id, "coroutine finished");
                Ok(Resumed {
                    state: CoroutineState::Dead,
                    value,
                })
            }
            Err(err @ ScriptError::CrossThreadAccess { .. }) => {
                // Rejected before anything ran
                self.state.set(from);
                Err(err)
            }
            Err(err) => {
                self.state.set(CoroutineState::Dead);
                debug!(coroutine = %self.id, error = %err, "coroutine died");
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("id", &self.id)
            .field("state", &self.state.get())
            .finish()
    }
}
