//! Runtime value types
//!
//! `Value` is a closed sum over every kind of value the core touches. Reference
//! kinds (tables, functions, closures, coroutines, userdata) are reference
//! counted and compare by identity.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::coroutine::Coroutine;
use crate::error::Result;
use crate::processor::ExecutionContext;
use crate::table::Table;

/* ===================== Value ===================== */

/// Runtime value
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Boolean(bool),
    Number(f64),
    String(Rc<str>),
    Table(Table),
    /// Host function reference
    Function(HostFunction),
    /// Script function bundled with its captured scope
    Closure(Closure),
    Coroutine(Rc<Coroutine>),
    /// Transient multi-value result; collapsed or expanded before it is stored
    Tuple(Rc<[Value]>),
    UserData(Rc<dyn Any>),
}

impl Value {
    pub fn tuple(values: Vec<Value>) -> Self {
        Value::Tuple(values.into())
    }

    /// Pack values the way a multi-value return does: none is Nil, one is itself
    pub fn from_values(mut values: Vec<Value>) -> Self {
        match values.len() {
            0 => Value::Nil,
            1 => values.pop().unwrap_or(Value::Nil),
            _ => Value::tuple(values),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Function(_) | Value::Closure(_) => "function",
            Value::Coroutine(_) => "thread",
            Value::Tuple(_) => "tuple",
            Value::UserData(_) => "userdata",
        }
    }

    /// Check if value is truthy (only nil and false are not)
    pub fn is_truthy(&self) -> bool {
        match self.to_scalar() {
            Value::Nil | Value::Boolean(false) => false,
            _ => true,
        }
    }

    /// Collapse a tuple to its first element (nil when empty)
    pub fn to_scalar(&self) -> Value {
        match self {
            Value::Tuple(items) => items.first().map(Value::to_scalar).unwrap_or(Value::Nil),
            other => other.clone(),
        }
    }

    /// Expand into the list of values it stands for
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Value::Tuple(items) => items.to_vec(),
            other => vec![other],
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Normalize an argument list
///
/// A trailing tuple expands in place; a tuple anywhere else collapses to its
/// first element. Only the last expression of a list yields multiple values.
pub fn normalize_args(args: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(args.len());

    for (i, arg) in args.iter().enumerate() {
        let is_last = i + 1 == args.len();
        match arg {
            Value::Tuple(items) if is_last => out.extend(items.iter().map(Value::to_scalar)),
            Value::Tuple(_) => out.push(arg.to_scalar()),
            other => out.push(other.clone()),
        }
    }

    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(&a.callback, &b.callback),
            (Value::Closure(a), Value::Closure(b)) => {
                a.function == b.function && Rc::ptr_eq(&a.scope, &b.scope)
            }
            (Value::Coroutine(a), Value::Coroutine(b)) => Rc::ptr_eq(a, b),
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::UserData(a), Value::UserData(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("nil"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => f.write_str(s),
            Value::Table(t) => write!(f, "table: {:p}", t.as_ptr()),
            Value::Function(h) => write!(f, "function: builtin '{}'", h.name),
            Value::Closure(c) => write!(f, "function: #{}", c.function),
            Value::Coroutine(co) => write!(f, "thread: {}", co.id()),
            Value::Tuple(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\t")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::UserData(u) => write!(f, "userdata: {:p}", Rc::as_ptr(u)),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

/* ===================== Closures ===================== */

/// Captured-variable scope visible to an executing function
///
/// Each cell is shared between the closure and whoever else captured it.
#[derive(Debug, Default)]
pub struct ClosureScope {
    cells: Vec<Rc<RefCell<Value>>>,
}

impl ClosureScope {
    pub fn new(cells: Vec<Rc<RefCell<Value>>>) -> Self {
        ClosureScope { cells }
    }

    pub fn empty() -> Rc<Self> {
        Rc::new(ClosureScope::default())
    }

    pub fn cell(&self, index: usize) -> Option<&Rc<RefCell<Value>>> {
        self.cells.get(index)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Script function value: an index into the root chunk's function table plus
/// the scope it closed over
#[derive(Debug, Clone)]
pub struct Closure {
    pub function: usize,
    pub scope: Rc<ClosureScope>,
}

impl Closure {
    pub fn new(function: usize, scope: Rc<ClosureScope>) -> Self {
        Closure { function, scope }
    }
}

/* ===================== Host functions ===================== */

pub type HostCallback = dyn Fn(&mut ExecutionContext<'_>, &[Value]) -> Result<Value>;

/// Function implemented by the host application
#[derive(Clone)]
pub struct HostFunction {
    pub name: Rc<str>,
    pub callback: Rc<HostCallback>,
}

impl HostFunction {
    pub fn new<F>(name: &str, callback: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>, &[Value]) -> Result<Value> + 'static,
    {
        HostFunction {
            name: name.into(),
            callback: Rc::new(callback),
        }
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn test_normalize_collapses_middle_tuple() {
        let args = vec![num(1.0), Value::tuple(vec![num(2.0), num(3.0)]), num(4.0)];
        assert_eq!(normalize_args(&args), vec![num(1.0), num(2.0), num(4.0)]);
    }

    #[test]
    fn test_normalize_expands_trailing_tuple() {
        let args = vec![num(1.0), num(4.0), Value::tuple(vec![num(2.0), num(3.0)])];
        assert_eq!(
            normalize_args(&args),
            vec![num(1.0), num(4.0), num(2.0), num(3.0)]
        );
    }

    #[test]
    fn test_normalize_empty_tuples() {
        // An empty tuple in the middle still occupies a slot (as nil)
        let args = vec![Value::tuple(vec![]), num(1.0), Value::tuple(vec![])];
        assert_eq!(normalize_args(&args), vec![Value::Nil, num(1.0)]);
    }

    #[test]
    fn test_scalar_of_nested_tuple() {
        let nested = Value::tuple(vec![Value::tuple(vec![num(7.0), num(8.0)]), num(9.0)]);
        assert_eq!(nested.to_scalar(), num(7.0));
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(!Value::tuple(vec![Value::Nil, num(1.0)]).is_truthy());
    }

    #[test]
    fn test_from_values() {
        assert_eq!(Value::from_values(vec![]), Value::Nil);
        assert_eq!(Value::from_values(vec![num(1.0)]), num(1.0));
        assert_eq!(
            Value::from_values(vec![num(1.0), num(2.0)]),
            Value::tuple(vec![num(1.0), num(2.0)])
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(num(3.0).to_string(), "3");
        assert_eq!(num(2.5).to_string(), "2.5");
        assert_eq!(Value::tuple(vec![num(1.0), Value::from("a")]).to_string(), "1\ta");
    }

    #[test]
    fn test_reference_equality() {
        let scope = ClosureScope::empty();
        let a = Value::Closure(Closure::new(0, scope.clone()));
        let b = Value::Closure(Closure::new(0, scope));
        let c = Value::Closure(Closure::new(0, ClosureScope::empty()));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
