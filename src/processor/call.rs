//! Host call entry and frame construction

use std::rc::Rc;

use tracing::{debug, info_span};

use super::{LoopExit, Processor};
use crate::diagnostics::PerformanceCounter;
use crate::error::{Result, ScriptError};
use crate::frame::{CallFrame, ReturnAddress};
use crate::value::{normalize_args, Closure, Value};

impl Processor {
    /// Call a script function from the host
    ///
    /// With `function == None` the callee is the value already on top of the
    /// value stack, and that slot is consumed by the call.
    ///
    /// Yielding is disabled for the whole call, including frames reentered
    /// from host functions beneath it. The guard, the yield flag and the stack
    /// heights are restored before returning, whether the call succeeded or not.
    pub fn call(&mut self, function: Option<&Value>, args: &[Value]) -> Result<Value> {
        self.enter_processor()?;

        let span = info_span!("execution", processor = %self.id);
        let _span = span.enter();
        let stopwatch = self
            .shared
            .stats
            .start_stopwatch(PerformanceCounter::Execution);

        let value_height = match function {
            Some(_) => self.value_stack.len(),
            None => self.value_stack.len().saturating_sub(1),
        };
        let frame_height = self.execution_stack.len();
        let could_yield = std::mem::replace(&mut self.can_yield, false);

        let result = self
            .push_host_frame(function, args)
            .and_then(|entry| self.processing_loop(entry))
            .and_then(|exit| match exit {
                LoopExit::Returned(value) => Ok(value),
                LoopExit::Yielded { .. } => Err(ScriptError::YieldAcrossHostBoundary),
            });

        self.value_stack.truncate(value_height);
        self.execution_stack.truncate(frame_height);
        self.can_yield = could_yield;

        drop(stopwatch);
        self.leave_processor();

        result
    }

    /// Push everything a host-to-script call needs; returns the entry point
    pub(crate) fn push_host_frame(&mut self, function: Option<&Value>, args: &[Value]) -> Result<usize> {
        let callee = match function {
            Some(function) => function.clone(),
            None => self.value_stack.peek().cloned().unwrap_or(Value::Nil),
        };

        let Value::Closure(closure) = callee.to_scalar() else {
            return Err(ScriptError::NotCallable {
                type_name: callee.type_name(),
            });
        };
        let entry_point = self.shared.entry_point(&closure)?;

        if function.is_some() {
            self.value_stack.push(Value::Closure(closure.clone()))?;
        }
        self.push_arguments(args)?;
        self.push_frame(&closure, entry_point, ReturnAddress::Host)?;

        Ok(entry_point)
    }

    /// Push normalized arguments followed by the argument count sentinel
    pub(crate) fn push_arguments(&mut self, args: &[Value]) -> Result<usize> {
        let args = normalize_args(args);
        let argc = args.len();

        for arg in args {
            self.value_stack.push(arg)?;
        }
        self.value_stack.push(Value::Number(argc as f64))?;

        Ok(argc)
    }

    /// Push a frame whose window starts at the current stack height
    pub(crate) fn push_frame(
        &mut self,
        closure: &Closure,
        entry_point: usize,
        return_address: ReturnAddress,
    ) -> Result<()> {
        let frame = CallFrame {
            base_pointer: self.value_stack.len(),
            return_address,
            closure_scope: Rc::clone(&closure.scope),
            debug_entry_point: entry_point,
            function: closure.function,
        };

        debug!(
            processor = %self.id,
            function = closure.function,
            base_pointer = frame.base_pointer,
            depth = self.execution_stack.len() + 1,
            "push frame"
        );

        self.execution_stack.push(frame)
    }

    /// Pop the top frame and drop its callee, arguments and locals
    pub(crate) fn pop_frame(&mut self) -> Result<CallFrame> {
        let frame = self
            .execution_stack
            .pop()
            .ok_or(ScriptError::InvalidStackAccess { index: 0 })?;

        let argc = self.argument_count(&frame)?;
        let callee_slot = argc
            .checked_add(2)
            .and_then(|span| frame.base_pointer.checked_sub(span))
            .ok_or(ScriptError::InvalidStackAccess {
                index: frame.base_pointer,
            })?;
        self.value_stack.truncate(callee_slot);

        debug!(
            processor = %self.id,
            function = frame.function,
            depth = self.execution_stack.len(),
            "pop frame"
        );

        Ok(frame)
    }

    /// Read a frame's argument count sentinel
    pub(crate) fn argument_count(&self, frame: &CallFrame) -> Result<usize> {
        let slot = frame.argc_slot();
        match self.value_stack.get(slot) {
            Some(Value::Number(n)) if *n >= 0.0 => Ok(*n as usize),
            _ => Err(ScriptError::InvalidStackAccess { index: slot }),
        }
    }
}
