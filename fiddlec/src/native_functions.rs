use std::rc::Rc;

use crate::{
    error::{FiddleError, Result},
    obj::NativeFunction,
    value::Value,
};

/// The builtin table. `OpGetBuiltin`'s operand indexes into this slice, so
/// the order here is part of the instruction encoding.
pub const BUILTINS: &[NativeFunction] = &[
    NativeFunction {
        name: "len",
        function: len,
    },
    NativeFunction {
        name: "puts",
        function: puts,
    },
    NativeFunction {
        name: "first",
        function: first,
    },
    NativeFunction {
        name: "last",
        function: last,
    },
    NativeFunction {
        name: "rest",
        function: rest,
    },
    NativeFunction {
        name: "push",
        function: push,
    },
];

fn check_arity(name: &str, args: &[Value], want: usize) -> Result<()> {
    if args.len() != want {
        return FiddleError::runtime_err(format!(
            "wrong number of arguments to `{name}`: want {want}, got {}",
            args.len()
        ));
    }
    Ok(())
}

fn len(args: &[Value]) -> Result<Value> {
    check_arity("len", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::Int(s.len() as i64)),
        Value::Array(elements) => Ok(Value::Int(elements.len() as i64)),
        other => FiddleError::runtime_err(format!(
            "argument to `len` not supported, got {}",
            other.type_name()
        )),
    }
}

fn puts(args: &[Value]) -> Result<Value> {
    for arg in args {
        println!("{arg}");
    }
    Ok(Value::Null)
}

fn first(args: &[Value]) -> Result<Value> {
    check_arity("first", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(elements.first().cloned().unwrap_or(Value::Null)),
        other => FiddleError::runtime_err(format!(
            "argument to `first` must be array, got {}",
            other.type_name()
        )),
    }
}

fn last(args: &[Value]) -> Result<Value> {
    check_arity("last", args, 1)?;
    match &args[0] {
        Value::Array(elements) => Ok(elements.last().cloned().unwrap_or(Value::Null)),
        other => FiddleError::runtime_err(format!(
            "argument to `last` must be array, got {}",
            other.type_name()
        )),
    }
}

fn rest(args: &[Value]) -> Result<Value> {
    check_arity("rest", args, 1)?;
    match &args[0] {
        Value::Array(elements) => {
            if elements.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::Array(Rc::new(elements[1..].to_vec())))
            }
        }
        other => FiddleError::runtime_err(format!(
            "argument to `rest` must be array, got {}",
            other.type_name()
        )),
    }
}

fn push(args: &[Value]) -> Result<Value> {
    check_arity("push", args, 2)?;
    match &args[0] {
        Value::Array(elements) => {
            let mut extended = elements.as_ref().clone();
            extended.push(args[1].clone());
            Ok(Value::Array(Rc::new(extended)))
        }
        other => FiddleError::runtime_err(format!(
            "argument to `push` must be array, got {}",
            other.type_name()
        )),
    }
}
