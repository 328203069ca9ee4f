pub mod chunk;
pub mod cli;
pub mod config;
pub mod coroutine;
pub mod debug;
pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod guard;
pub mod instruction;
pub mod processor;
pub mod script;
pub mod stack;
pub mod table;
pub mod value;

// Re-export main types
pub use chunk::{Chunk, FunctionProto};
pub use config::VmConfig;
pub use coroutine::{Coroutine, CoroutineState, Resumed};
pub use debug::{CallStackEntry, DebugContext, Debugger};
pub use diagnostics::{PerformanceCounter, PerformanceStats};
pub use error::{LoadError, Result, ScriptError};
pub use instruction::{Capture, Constant, Instruction};
pub use processor::{ExecutionContext, Processor};
pub use script::Script;
pub use table::Table;
pub use value::{Closure, ClosureScope, HostFunction, Value};
