//! Script: host-facing owner of one root chunk and its processors
//!
//! Creating a script eagerly creates the main processor and wraps it in the
//! main coroutine handle. The script owns that handle, so the main processor
//! lives exactly as long as the script; coroutine processors live as long as
//! some value references their handle.

use std::rc::Rc;

use tracing::info;

use crate::chunk::Chunk;
use crate::config::VmConfig;
use crate::coroutine::{Coroutine, Resumed};
use crate::debug::{DebugContext, Debugger};
use crate::diagnostics::PerformanceStats;
use crate::error::{LoadError, Result, ScriptError};
use crate::processor::SharedState;
use crate::table::Table;
use crate::value::{Closure, ClosureScope, HostFunction, Value};

pub struct Script {
    shared: SharedState,
    main: Rc<Coroutine>,
}

impl Script {
    pub fn new(chunk: Chunk) -> Self {
        Script::with_config(chunk, VmConfig::default())
    }

    pub fn with_config(chunk: Chunk, config: VmConfig) -> Self {
        let shared = SharedState {
            chunk: Rc::new(chunk),
            globals: Table::new(),
            debug: DebugContext::new(),
            stats: PerformanceStats::new(config.performance_stats),
            config: Rc::new(config),
        };
        let main = Coroutine::new_main(shared.clone());

        info!(
            main = %main.id(),
            fingerprint = %shared.chunk.fingerprint(),
            functions = shared.chunk.functions.len(),
            instructions = shared.chunk.code.len(),
            "script loaded"
        );

        Script { shared, main }
    }

    /// Parse, validate and load a JSON chunk
    pub fn from_json(source: &str, config: VmConfig) -> std::result::Result<Self, LoadError> {
        Ok(Script::with_config(Chunk::from_json(source)?, config))
    }

    pub fn chunk(&self) -> &Rc<Chunk> {
        &self.shared.chunk
    }

    pub fn config(&self) -> &VmConfig {
        &self.shared.config
    }

    pub fn globals(&self) -> &Table {
        &self.shared.globals
    }

    pub fn get_global(&self, name: &str) -> Value {
        self.shared.globals.get(name)
    }

    pub fn set_global(&self, name: &str, value: Value) {
        self.shared.globals.set(name, value);
    }

    /// Expose a host function as a global
    pub fn register_function(&self, function: HostFunction) {
        let name = function.name.to_string();
        self.shared.globals.set(name, Value::Function(function));
    }

    /// Handle wrapping the main processor
    pub fn main_coroutine(&self) -> &Rc<Coroutine> {
        &self.main
    }

    /// Closure over function #0 with an empty scope
    pub fn main_function(&self) -> Value {
        Value::Closure(Closure::new(0, ClosureScope::empty()))
    }

    /// Run the chunk's main body
    pub fn run(&self) -> Result<Value> {
        self.call(&self.main_function(), &[])
    }

    /// Call a script function on the main processor
    ///
    /// Host functions already running inside this script must reenter through
    /// their `ExecutionContext`; doing it here fails with `ProcessorBusy`.
    pub fn call(&self, function: &Value, args: &[Value]) -> Result<Value> {
        let mut processor = self.main.processor_mut()?;
        processor.call(Some(function), args)
    }

    /// Call the script function stored in a global
    pub fn call_global(&self, name: &str, args: &[Value]) -> Result<Value> {
        let function = self.get_global(name);
        if matches!(function, Value::Nil) {
            return Err(ScriptError::runtime(format!("global '{}' is not defined", name)));
        }
        self.call(&function, args)
    }

    /// Create a coroutine parented to the main processor
    pub fn create_coroutine(&self, function: &Value) -> Result<Rc<Coroutine>> {
        match function.to_scalar() {
            Value::Closure(closure) => {
                self.shared.entry_point(&closure)?;
                Ok(Coroutine::spawn(
                    self.shared.clone(),
                    Rc::downgrade(&self.main),
                    closure,
                ))
            }
            other => Err(ScriptError::NotCallable {
                type_name: other.type_name(),
            }),
        }
    }

    pub fn resume(&self, coroutine: &Coroutine, args: &[Value]) -> Result<Resumed> {
        coroutine.resume(args)
    }

    pub fn attach_debugger(&self, debugger: Rc<dyn Debugger>) {
        self.shared.debug.attach(debugger);
    }

    pub fn debug_context(&self) -> &Rc<DebugContext> {
        &self.shared.debug
    }

    pub fn performance_stats(&self) -> &Rc<PerformanceStats> {
        &self.shared.stats
    }
}
