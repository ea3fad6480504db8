use std::{
    collections::HashMap,
    fmt,
    fmt::{Debug, Display, Formatter},
    rc::Rc,
};

use crate::{
    error::{FiddleError, Result},
    obj::{Closure, CompiledFunction, NativeFunction},
};

/// A runtime value. All values are immutable; composite values share their
/// contents by reference count, so cloning is cheap everywhere.
#[derive(Clone)]
pub enum Value {
    Int(i64),
    Bool(bool),
    Null,
    String(Rc<str>),
    Array(Rc<Vec<Value>>),
    Hash(Rc<HashMap<HashKey, Value>>),
    Function(Rc<CompiledFunction>),
    Closure(Rc<Closure>),
    NativeFunction(NativeFunction),
}

impl Value {
    /// Only `null` and `false` are falsey; everything else, including 0 and
    /// the empty string, is truthy.
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Bool(false) | Value::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Hash(_) => "hash",
            Value::Function(_) => "function",
            Value::Closure(_) => "closure",
            Value::NativeFunction(_) => "builtin",
        }
    }

    pub fn hash_key(&self) -> Result<HashKey> {
        match self {
            Value::Int(i) => Ok(HashKey::Int(*i)),
            Value::Bool(b) => Ok(HashKey::Bool(*b)),
            Value::String(s) => Ok(HashKey::String(Rc::clone(s))),
            other => Err(FiddleError::runtime(format!(
                "unusable as hash key: {}",
                other.type_name()
            ))),
        }
    }
}

/// The subset of values usable as hash-literal keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashKey {
    Int(i64),
    Bool(bool),
    String(Rc<str>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Hash(a), Value::Hash(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(x) => Display::fmt(x, f),
            Value::Bool(x) => Display::fmt(x, f),
            Value::Null => f.write_str("null"),
            Value::String(x) => f.write_str(x),
            Value::Array(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    Display::fmt(element, f)?;
                }
                f.write_str("]")
            }
            Value::Hash(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Value::Function(x) => Display::fmt(x, f),
            Value::Closure(x) => Display::fmt(x, f),
            Value::NativeFunction(x) => Display::fmt(x, f),
        }
    }
}

impl Display for HashKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Int(x) => Display::fmt(x, f),
            HashKey::Bool(x) => Display::fmt(x, f),
            HashKey::String(x) => f.write_str(x),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}
