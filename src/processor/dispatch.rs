//! Dispatch loop
//!
//! Executes instructions from an entry point until the frame entered from the
//! host returns or the processor yields. Script-to-script calls push frames
//! and keep looping; host functions are invoked inline with an
//! `ExecutionContext`, which is how the host reenters the same processor.
//!
//! Every stack read is relative to the current frame's base pointer. A frame
//! can never pop or address a slot below it; the only sanctioned look below is
//! `Args`, which reads the frame's own argument block.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use super::{ExecutionContext, Processor};
use crate::coroutine::{Coroutine, CoroutineState, Resumed};
use crate::error::{Result, ScriptError};
use crate::frame::{CallFrame, ReturnAddress};
use crate::instruction::{Capture, Instruction};
use crate::value::{normalize_args, Closure, ClosureScope, Value};

/* ===================== Loop exit ===================== */

/// Why the dispatch loop handed control back
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LoopExit {
    /// The host-entered frame returned
    Returned(Value),
    /// A yield executed; continue at `resume_at` on the next resume
    Yielded { value: Value, resume_at: usize },
}

impl Processor {
    /* ===================== Main loop ===================== */

    pub(crate) fn processing_loop(&mut self, entry: usize) -> Result<LoopExit> {
        let chunk = Rc::clone(&self.shared.chunk);
        let mut ip = entry;

        loop {
            let instruction = chunk.instruction(ip).ok_or_else(|| {
                ScriptError::runtime(format!("instruction pointer {} out of range", ip))
            })?;
            trace!(processor = %self.id, ip, ?instruction, "dispatch");
            ip += 1;

            match instruction {
                Instruction::Nop => {}

                Instruction::Literal { v } => self.push(v.to_value())?,

                Instruction::Pop => {
                    self.pop()?;
                }

                Instruction::Args => self.execute_args()?,

                Instruction::Local { index } => {
                    let value = self.local(*index)?.clone();
                    self.push(value)?;
                }

                Instruction::StoreLocal { index } => {
                    let value = self.pop()?.to_scalar();
                    *self.local_mut(*index)? = value;
                }

                Instruction::Upvalue { index } => {
                    let value = self.upvalue(*index)?.borrow().clone();
                    self.push(value)?;
                }

                Instruction::StoreUpvalue { index } => {
                    let value = self.pop()?.to_scalar();
                    *self.upvalue(*index)?.borrow_mut() = value;
                }

                Instruction::Global { name } => {
                    let value = self.shared.globals.get(name);
                    self.push(value)?;
                }

                Instruction::StoreGlobal { name } => {
                    let value = self.pop()?;
                    self.shared.globals.set(name.as_str(), value);
                }

                Instruction::Closure { function, captures } => {
                    let scope = self.capture(captures)?;
                    self.push(Value::Closure(Closure::new(*function, Rc::new(scope))))?;
                }

                Instruction::Call { argc } => {
                    if let Some(entry) = self.execute_call(*argc, ip)? {
                        ip = entry;
                    }
                }

                Instruction::Ret { count } => {
                    let value = self.pop_values(*count)?;
                    let frame = self.pop_frame()?;
                    match frame.return_address {
                        ReturnAddress::Host => return Ok(LoopExit::Returned(value)),
                        ReturnAddress::Instruction(at) => {
                            self.push(value)?;
                            ip = at;
                        }
                    }
                }

                Instruction::Yield { count } => {
                    if !self.can_yield {
                        return Err(ScriptError::YieldAcrossHostBoundary);
                    }
                    let value = self.pop_values(*count)?;
                    debug!(processor = %self.id, resume_at = ip, "yield");
                    return Ok(LoopExit::Yielded {
                        value,
                        resume_at: ip,
                    });
                }

                Instruction::Tuple { count } => {
                    let values = self.pop_n(*count)?;
                    self.push(Value::tuple(normalize_args(&values)))?;
                }

                Instruction::Jump { target } => ip = *target,

                Instruction::JumpIfFalse { target } => {
                    if !self.pop()?.is_truthy() {
                        ip = *target;
                    }
                }

                Instruction::Add => self.arithmetic("add", |a, b| a + b)?,

                Instruction::Sub => self.arithmetic("subtract", |a, b| a - b)?,

                Instruction::Lt => {
                    let (a, b) = self.pop_operands()?;
                    let less = match (&a, &b) {
                        (Value::Number(x), Value::Number(y)) => x < y,
                        (Value::String(x), Value::String(y)) => x < y,
                        _ => {
                            return Err(ScriptError::runtime(format!(
                                "attempt to compare {} with {}",
                                a.type_name(),
                                b.type_name()
                            )))
                        }
                    };
                    self.push(Value::Boolean(less))?;
                }

                Instruction::Eq => {
                    let (a, b) = self.pop_operands()?;
                    self.push(Value::Boolean(a == b))?;
                }

                Instruction::Not => {
                    let value = self.pop()?;
                    self.push(Value::Boolean(!value.is_truthy()))?;
                }

                Instruction::Concat => {
                    let (a, b) = self.pop_operands()?;
                    for operand in [&a, &b] {
                        if !matches!(operand, Value::String(_) | Value::Number(_)) {
                            return Err(ScriptError::runtime(format!(
                                "attempt to concatenate a {} value",
                                operand.type_name()
                            )));
                        }
                    }
                    self.push(Value::from(format!("{}{}", a, b)))?;
                }

                Instruction::Error => {
                    let value = self.pop()?.to_scalar();
                    return Err(ScriptError::runtime(value.to_string()));
                }

                Instruction::CoCreate => {
                    let function = self.pop()?.to_scalar();
                    let coroutine = self.spawn_coroutine(&function)?;
                    self.push(Value::Coroutine(coroutine))?;
                }

                Instruction::CoResume { argc } => self.execute_resume(*argc)?,

                Instruction::CoStatus => match self.pop()?.to_scalar() {
                    Value::Coroutine(coroutine) => {
                        self.push(Value::from(coroutine.status().to_string()))?
                    }
                    other => {
                        return Err(ScriptError::runtime(format!(
                            "bad argument #1 to 'status' (coroutine expected, got {})",
                            other.type_name()
                        )))
                    }
                },

                Instruction::CoRunning => {
                    let running = self
                        .coroutine()
                        .map(Value::Coroutine)
                        .unwrap_or(Value::Nil);
                    self.push(running)?;
                }
            }
        }
    }

    /* ===================== Calls ===================== */

    /// Execute `Call`; returns the callee's entry point for script functions
    fn execute_call(&mut self, argc: usize, return_ip: usize) -> Result<Option<usize>> {
        let args = normalize_args(&self.pop_n(argc)?);
        let callee = self.pop()?.to_scalar();

        match callee {
            Value::Closure(closure) => {
                let entry_point = self.shared.entry_point(&closure)?;
                self.push(Value::Closure(closure.clone()))?;
                self.push_arguments(&args)?;
                self.push_frame(
                    &closure,
                    entry_point,
                    ReturnAddress::Instruction(return_ip),
                )?;
                Ok(Some(entry_point))
            }
            Value::Function(host) => {
                let result = {
                    let mut context = ExecutionContext::new(self);
                    (host.callback)(&mut context, &args)?
                };
                self.push(result)?;
                Ok(None)
            }
            other => Err(ScriptError::NotCallable {
                type_name: other.type_name(),
            }),
        }
    }

    /// Copy declared parameters into the frame's first locals
    fn execute_args(&mut self) -> Result<()> {
        let frame = self.current_frame()?.clone();
        let proto = self
            .shared
            .chunk
            .function(frame.function)
            .cloned()
            .ok_or(ScriptError::NotAFunction {
                function: frame.function,
            })?;

        let argc = self.argument_count(&frame)?;
        let first = frame
            .argc_slot()
            .checked_sub(argc)
            .ok_or(ScriptError::InvalidStackAccess {
                index: frame.argc_slot(),
            })?;
        let args: Vec<Value> = self.value_stack.as_slice()[first..frame.argc_slot()].to_vec();

        for i in 0..proto.params {
            self.push(args.get(i).cloned().unwrap_or(Value::Nil))?;
        }
        if proto.variadic {
            let rest = args.get(proto.params..).unwrap_or_default().to_vec();
            self.push(Value::tuple(rest))?;
        }

        Ok(())
    }

    /// Resume a coroutine from script code
    ///
    /// Pushes `(true, values..)` on success and `(false, message)` when the
    /// coroutine fails; only fatal errors escape.
    fn execute_resume(&mut self, argc: usize) -> Result<()> {
        let args = normalize_args(&self.pop_n(argc)?);
        let target = self.pop()?.to_scalar();

        let Value::Coroutine(coroutine) = target else {
            return Err(ScriptError::runtime(format!(
                "bad argument #1 to 'resume' (coroutine expected, got {})",
                target.type_name()
            )));
        };

        let outcome = self.resume_child(&coroutine, &args);
        let packed = match outcome {
            Ok(Resumed { value, .. }) => {
                let mut values = vec![Value::Boolean(true)];
                values.extend(value.into_values());
                values
            }
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => vec![Value::Boolean(false), Value::from(err.to_string())],
        };

        self.push(Value::tuple(packed))
    }

    /// Resume another coroutine, marking this one `Normal` while it waits
    pub(crate) fn resume_child(
        &mut self,
        coroutine: &Rc<Coroutine>,
        args: &[Value],
    ) -> Result<Resumed> {
        let me = self
            .coroutine()
            .filter(|me| me.status() == CoroutineState::Running && !Rc::ptr_eq(me, coroutine));

        if let Some(me) = &me {
            me.set_state(CoroutineState::Normal);
        }
        let outcome = coroutine.resume(args);
        if let Some(me) = &me {
            me.set_state(CoroutineState::Running);
        }

        outcome
    }

    /* ===================== Frame-relative stack access ===================== */

    fn current_frame(&self) -> Result<&CallFrame> {
        self.execution_stack
            .peek()
            .ok_or(ScriptError::InvalidStackAccess { index: 0 })
    }

    fn base_pointer(&self) -> usize {
        self.execution_stack
            .peek()
            .map(|frame| frame.base_pointer)
            .unwrap_or(0)
    }

    pub(crate) fn push(&mut self, value: Value) -> Result<()> {
        self.value_stack.push(value)
    }

    fn pop(&mut self) -> Result<Value> {
        let len = self.value_stack.len();
        if len <= self.base_pointer() {
            return Err(ScriptError::InvalidStackAccess {
                index: len.wrapping_sub(1),
            });
        }
        self.value_stack
            .pop()
            .ok_or(ScriptError::InvalidStackAccess { index: 0 })
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let len = self.value_stack.len();
        let floor = self.base_pointer().checked_add(n);
        if floor.map_or(true, |floor| len < floor) {
            return Err(ScriptError::InvalidStackAccess {
                index: len.wrapping_sub(n),
            });
        }
        self.value_stack
            .pop_n(n)
            .ok_or(ScriptError::InvalidStackAccess { index: 0 })
    }

    /// Pop the top `count` values as a return/yield result
    fn pop_values(&mut self, count: usize) -> Result<Value> {
        match count {
            0 => Ok(Value::Nil),
            1 => self.pop(),
            _ => {
                let values = self.pop_n(count)?;
                Ok(Value::from_values(normalize_args(&values)))
            }
        }
    }

    fn pop_operands(&mut self) -> Result<(Value, Value)> {
        let b = self.pop()?.to_scalar();
        let a = self.pop()?.to_scalar();
        Ok((a, b))
    }

    fn frame_slot(&self, index: usize) -> Result<usize> {
        self.base_pointer()
            .checked_add(index)
            .ok_or(ScriptError::InvalidStackAccess { index })
    }

    fn local(&self, index: usize) -> Result<&Value> {
        let slot = self.frame_slot(index)?;
        self.value_stack
            .get(slot)
            .ok_or(ScriptError::InvalidStackAccess { index: slot })
    }

    fn local_mut(&mut self, index: usize) -> Result<&mut Value> {
        let slot = self.frame_slot(index)?;
        self.value_stack
            .get_mut(slot)
            .ok_or(ScriptError::InvalidStackAccess { index: slot })
    }

    fn upvalue(&self, index: usize) -> Result<Rc<RefCell<Value>>> {
        let frame = self.current_frame()?;
        frame.closure_scope.cell(index).cloned().ok_or_else(|| {
            ScriptError::runtime(format!("upvalue #{} is not captured", index))
        })
    }

    fn capture(&self, captures: &[Capture]) -> Result<ClosureScope> {
        let cells = captures
            .iter()
            .map(|capture| match capture {
                Capture::Local(index) => Ok(Rc::new(RefCell::new(self.local(*index)?.to_scalar()))),
                Capture::Upvalue(index) => self.upvalue(*index),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(ClosureScope::new(cells))
    }

    fn arithmetic(&mut self, verb: &str, op: impl Fn(f64, f64) -> f64) -> Result<()> {
        let (a, b) = self.pop_operands()?;
        match (a.as_number(), b.as_number()) {
            (Some(x), Some(y)) => self.push(Value::Number(op(x, y))),
            _ => Err(ScriptError::runtime(format!(
                "attempt to {} a {} with a {}",
                verb,
                a.type_name(),
                b.type_name()
            ))),
        }
    }
}
