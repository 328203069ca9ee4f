//! Test helpers for processor tests
//!
//! Chunks are assembled from JSON instruction lists. `ChunkBuilder` lays the
//! function bodies out one after another, fixes up entry points and jump
//! targets, and generates a main body that stores every function in a global
//! of the same name.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::json;
use uuid::Uuid;

use crate::chunk::{Chunk, FunctionProto};
use crate::config::VmConfig;
use crate::debug::Debugger;
use crate::instruction::Instruction;
use crate::script::Script;
use crate::value::Value;

pub fn num(n: f64) -> Value {
    Value::Number(n)
}

pub fn string(s: &str) -> Value {
    Value::from(s)
}

/* ===================== Chunk assembly ===================== */

struct PendingFunction {
    name: String,
    params: usize,
    variadic: bool,
    body: Vec<Instruction>,
}

#[derive(Default)]
pub struct ChunkBuilder {
    functions: Vec<PendingFunction>,
}

impl ChunkBuilder {
    pub fn new() -> Self {
        ChunkBuilder::default()
    }

    /// Add a function; its index is its position plus one (main is #0).
    /// Jump targets in `body` are relative to the body's first instruction.
    pub fn function(mut self, name: &str, params: usize, variadic: bool, body: serde_json::Value) -> Self {
        let body: Vec<Instruction> =
            serde_json::from_value(body).expect("Function body deserialization failed");
        self.functions.push(PendingFunction {
            name: name.to_string(),
            params,
            variadic,
            body,
        });
        self
    }

    pub fn build(self) -> Chunk {
        let mut code = Vec::new();
        let mut functions = vec![FunctionProto {
            name: "main".to_string(),
            entry_point: 0,
            params: 0,
            variadic: false,
        }];

        for (i, function) in self.functions.iter().enumerate() {
            code.push(Instruction::Closure {
                function: i + 1,
                captures: vec![],
            });
            code.push(Instruction::StoreGlobal {
                name: function.name.clone(),
            });
        }
        code.push(Instruction::Ret { count: 0 });

        for function in self.functions {
            let entry_point = code.len();
            functions.push(FunctionProto {
                name: function.name,
                entry_point,
                params: function.params,
                variadic: function.variadic,
            });
            code.extend(function.body.into_iter().map(|instruction| match instruction {
                Instruction::Jump { target } => Instruction::Jump {
                    target: target + entry_point,
                },
                Instruction::JumpIfFalse { target } => Instruction::JumpIfFalse {
                    target: target + entry_point,
                },
                other => other,
            }));
        }

        let chunk = Chunk { functions, code };
        chunk.validate().expect("Chunk validation failed");
        chunk
    }
}

/// Functions shared by the processor tests
///
/// Indices matter only where a body builds a closure (`make_counter` -> #7,
/// `capture_copy` -> #25).
pub fn library() -> Chunk {
    ChunkBuilder::new()
        // #1
        .function("add", 2, false, json!([
            { "t": "Args" },
            { "t": "Local", "index": 0 },
            { "t": "Local", "index": 1 },
            { "t": "Add" },
            { "t": "Ret", "count": 1 }
        ]))
        // #2
        .function("pack", 0, true, json!([
            { "t": "Args" },
            { "t": "Local", "index": 0 },
            { "t": "Ret", "count": 1 }
        ]))
        // #3
        .function("fail", 0, false, json!([
            { "t": "Literal", "v": { "t": "Str", "v": "boom" } },
            { "t": "Error" }
        ]))
        // #4
        .function("yield_one", 0, false, json!([
            { "t": "Literal", "v": { "t": "Num", "v": 1 } },
            { "t": "Yield", "count": 1 },
            { "t": "Literal", "v": { "t": "Str", "v": "resumed" } },
            { "t": "Ret", "count": 1 }
        ]))
        // #5
        .function("two", 0, false, json!([
            { "t": "Literal", "v": { "t": "Num", "v": 1 } },
            { "t": "Literal", "v": { "t": "Num", "v": 2 } },
            { "t": "Ret", "count": 2 }
        ]))
        // #6
        .function("make_counter", 0, false, json!([
            { "t": "Args" },
            { "t": "Literal", "v": { "t": "Num", "v": 0 } },
            { "t": "Closure", "function": 7, "captures": [{ "t": "Local", "v": 0 }] },
            { "t": "Ret", "count": 1 }
        ]))
        // #7
        .function("counter_inc", 0, false, json!([
            { "t": "Upvalue", "index": 0 },
            { "t": "Literal", "v": { "t": "Num", "v": 1 } },
            { "t": "Add" },
            { "t": "StoreUpvalue", "index": 0 },
            { "t": "Upvalue", "index": 0 },
            { "t": "Ret", "count": 1 }
        ]))
        // #8: outer(f) = reenter(f, 10)
        .function("outer", 1, false, json!([
            { "t": "Args" },
            { "t": "Global", "name": "reenter" },
            { "t": "Local", "index": 0 },
            { "t": "Literal", "v": { "t": "Num", "v": 10 } },
            { "t": "Call", "argc": 2 },
            { "t": "Ret", "count": 1 }
        ]))
        // #9: double(x) = probe(); x + x
        .function("double", 1, false, json!([
            { "t": "Args" },
            { "t": "Global", "name": "probe" },
            { "t": "Call", "argc": 0 },
            { "t": "Pop" },
            { "t": "Local", "index": 0 },
            { "t": "Local", "index": 0 },
            { "t": "Add" },
            { "t": "Ret", "count": 1 }
        ]))
        // #10: gen(a): b = yield a; c = yield a + b; return c, "end"
        .function("gen", 1, false, json!([
            { "t": "Args" },
            { "t": "Local", "index": 0 },
            { "t": "Yield", "count": 1 },
            { "t": "Local", "index": 0 },
            { "t": "Add" },
            { "t": "Yield", "count": 1 },
            { "t": "Literal", "v": { "t": "Str", "v": "end" } },
            { "t": "Ret", "count": 2 }
        ]))
        // #11: drives gen from script code
        .function("drive", 0, false, json!([
            { "t": "Args" },
            { "t": "Global", "name": "gen" },
            { "t": "CoCreate" },
            { "t": "Local", "index": 0 },
            { "t": "Literal", "v": { "t": "Num", "v": 10 } },
            { "t": "CoResume", "argc": 1 },
            { "t": "Local", "index": 0 },
            { "t": "CoStatus" },
            { "t": "Local", "index": 0 },
            { "t": "Literal", "v": { "t": "Num", "v": 5 } },
            { "t": "CoResume", "argc": 1 },
            { "t": "Local", "index": 1 },
            { "t": "Local", "index": 2 },
            { "t": "Local", "index": 3 },
            { "t": "Ret", "count": 3 }
        ]))
        // #12: add(two())
        .function("sum_two", 0, false, json!([
            { "t": "Global", "name": "add" },
            { "t": "Global", "name": "two" },
            { "t": "Call", "argc": 0 },
            { "t": "Call", "argc": 1 },
            { "t": "Ret", "count": 1 }
        ]))
        // #13: add(two(), 10)
        .function("add_two_ten", 0, false, json!([
            { "t": "Global", "name": "add" },
            { "t": "Global", "name": "two" },
            { "t": "Call", "argc": 0 },
            { "t": "Literal", "v": { "t": "Num", "v": 10 } },
            { "t": "Call", "argc": 2 },
            { "t": "Ret", "count": 1 }
        ]))
        // #14
        .function("bad_pop", 0, false, json!([
            { "t": "Args" },
            { "t": "Pop" }
        ]))
        // #15
        .function("bad_local", 0, false, json!([
            { "t": "Args" },
            { "t": "Local", "index": 5 },
            { "t": "Ret", "count": 1 }
        ]))
        // #16
        .function("rec", 0, false, json!([
            { "t": "Args" },
            { "t": "Global", "name": "rec" },
            { "t": "Call", "argc": 0 },
            { "t": "Ret", "count": 1 }
        ]))
        // #17
        .function("self_resume", 0, false, json!([
            { "t": "CoRunning" },
            { "t": "CoResume", "argc": 0 },
            { "t": "Ret", "count": 1 }
        ]))
        // #18: count_to(n): i = 0; while i < n do i = i + 1 end; return i
        .function("count_to", 1, false, json!([
            { "t": "Args" },
            { "t": "Literal", "v": { "t": "Num", "v": 0 } },
            { "t": "Local", "index": 1 },
            { "t": "Local", "index": 0 },
            { "t": "Lt" },
            { "t": "JumpIfFalse", "target": 11 },
            { "t": "Local", "index": 1 },
            { "t": "Literal", "v": { "t": "Num", "v": 1 } },
            { "t": "Add" },
            { "t": "StoreLocal", "index": 1 },
            { "t": "Jump", "target": 2 },
            { "t": "Local", "index": 1 },
            { "t": "Ret", "count": 1 }
        ]))
        // #19: try_yield(yield_one); yield "after"; return "done"
        .function("co_try_yield", 0, false, json!([
            { "t": "Global", "name": "try_yield" },
            { "t": "Global", "name": "yield_one" },
            { "t": "Call", "argc": 1 },
            { "t": "Pop" },
            { "t": "Literal", "v": { "t": "Str", "v": "after" } },
            { "t": "Yield", "count": 1 },
            { "t": "Literal", "v": { "t": "Str", "v": "done" } },
            { "t": "Ret", "count": 1 }
        ]))
        // #20: resume_arg(co) = coroutine.resume(co)
        .function("resume_arg", 1, false, json!([
            { "t": "Args" },
            { "t": "Local", "index": 0 },
            { "t": "CoResume", "argc": 0 },
            { "t": "Ret", "count": 1 }
        ]))
        // #21
        .function("call_check", 0, false, json!([
            { "t": "Global", "name": "check" },
            { "t": "Call", "argc": 0 },
            { "t": "Ret", "count": 1 }
        ]))
        // #22: return (yield 1, 2)
        .function("yield_pair", 0, false, json!([
            { "t": "Literal", "v": { "t": "Num", "v": 1 } },
            { "t": "Literal", "v": { "t": "Num", "v": 2 } },
            { "t": "Yield", "count": 2 },
            { "t": "Ret", "count": 1 }
        ]))
        // #23
        .function("double_three", 0, false, json!([
            { "t": "Global", "name": "double" },
            { "t": "Literal", "v": { "t": "Num", "v": 3 } },
            { "t": "Call", "argc": 1 },
            { "t": "Ret", "count": 1 }
        ]))
        // #24: x = 1; f = closure(#25, x); return f(), x, f
        .function("capture_copy", 0, false, json!([
            { "t": "Args" },
            { "t": "Literal", "v": { "t": "Num", "v": 1 } },
            { "t": "Closure", "function": 25, "captures": [{ "t": "Local", "v": 0 }] },
            { "t": "Local", "index": 1 },
            { "t": "Call", "argc": 0 },
            { "t": "Local", "index": 0 },
            { "t": "Local", "index": 1 },
            { "t": "Ret", "count": 3 }
        ]))
        // #25: upvalue 0 = upvalue 0 + 5
        .function("bump_five", 0, false, json!([
            { "t": "Upvalue", "index": 0 },
            { "t": "Literal", "v": { "t": "Num", "v": 5 } },
            { "t": "Add" },
            { "t": "StoreUpvalue", "index": 0 },
            { "t": "Upvalue", "index": 0 },
            { "t": "Ret", "count": 1 }
        ]))
        .build()
}

/// Load the library and run its main body
pub fn library_script() -> Script {
    library_script_with_config(VmConfig::default())
}

pub fn library_script_with_config(config: VmConfig) -> Script {
    let script = Script::with_config(library(), config);
    script.run().expect("Main body failed");
    script
}

/// Load the library with extra globals set before its main body runs
pub fn library_script_with_globals(globals: HashMap<&str, Value>) -> Script {
    let script = Script::new(library());
    for (name, value) in globals {
        script.set_global(name, value);
    }
    script.run().expect("Main body failed");
    script
}

/* ===================== Debugger ===================== */

/// Counts execution-ended signals
#[derive(Default)]
pub struct CountingDebugger {
    pub ended: Cell<usize>,
    pub processors: RefCell<Vec<Uuid>>,
}

impl Debugger for CountingDebugger {
    fn signal_execution_ended(&self, processor: Uuid) {
        self.ended.set(self.ended.get() + 1);
        self.processors.borrow_mut().push(processor);
    }
}

pub fn attach_counter(script: &Script) -> Rc<CountingDebugger> {
    let debugger = Rc::new(CountingDebugger::default());
    script.attach_debugger(debugger.clone());
    debugger
}
