//! Instruction set understood by the dispatch loop
//!
//! Serialized with an internal `t` tag so chunks read naturally as JSON:
//! `{"t": "Call", "argc": 2}`.

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Literal operand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Constant {
    Nil,
    Bool(bool),
    Num(f64),
    Str(String),
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Nil => Value::Nil,
            Constant::Bool(b) => Value::Boolean(*b),
            Constant::Num(n) => Value::Number(*n),
            Constant::Str(s) => Value::from(s.as_str()),
        }
    }
}

/// Where a new closure takes each of its captured cells from
///
/// Locals are captured by value: the closure gets its own cell holding a copy,
/// and the frame's slot and the cell evolve independently afterwards. Only
/// `Upvalue` captures share a cell between closures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum Capture {
    /// Copy a local of the current frame into a fresh cell (no aliasing)
    Local(usize),
    /// Share a cell of the current frame's closure scope
    Upvalue(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Instruction {
    Nop,
    /// Push a constant
    Literal { v: Constant },
    Pop,
    /// Move the frame's arguments into its first locals
    ///
    /// Declared parameters missing from the call read as nil; a variadic
    /// function receives the surplus as a tuple in the local after its params.
    Args,
    Local { index: usize },
    StoreLocal { index: usize },
    Upvalue { index: usize },
    StoreUpvalue { index: usize },
    Global { name: String },
    StoreGlobal { name: String },
    Closure { function: usize, captures: Vec<Capture> },
    /// Stack: `[callee, arg1 .. argN]`
    Call { argc: usize },
    /// Return the top `count` values (0 returns nil)
    Ret { count: usize },
    /// Yield the top `count` values; the resume values are pushed in their place
    Yield { count: usize },
    /// Pack the top `count` values into one tuple
    Tuple { count: usize },
    Jump { target: usize },
    JumpIfFalse { target: usize },
    Add,
    Sub,
    Lt,
    Eq,
    Not,
    Concat,
    /// Raise the top value as a runtime error
    Error,
    /// Turn the function on top into a new coroutine
    CoCreate,
    /// Stack: `[coroutine, arg1 .. argN]`; pushes `(true, values..)` or `(false, message)`
    CoResume { argc: usize },
    CoStatus,
    /// Push the handle of the running processor
    CoRunning,
}

impl Instruction {
    /// Jump target, if this instruction branches
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Instruction::Jump { target } | Instruction::JumpIfFalse { target } => Some(*target),
            _ => None,
        }
    }
}
