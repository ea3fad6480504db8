use std::{
    fmt,
    fmt::{Display, Formatter},
    rc::Rc,
};

use crate::{error::Result, value::Value};

/// A function literal's finished compilation output: a self-contained
/// instruction stream plus the stack layout the VM needs to frame a call.
#[derive(Debug, PartialEq, Eq)]
pub struct CompiledFunction {
    pub instructions: Vec<u8>,
    /// Slots to reserve above the base pointer, parameters included.
    pub num_locals: usize,
    pub num_parameters: usize,
}

impl Display for CompiledFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("<fn>")
    }
}

/// A compiled function paired with the values it captured from enclosing
/// scopes, in the order the compiler first resolved them.
#[derive(Debug, PartialEq)]
pub struct Closure {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Value>,
}

impl Display for Closure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("<closure>")
    }
}

pub type NativeFn = fn(args: &[Value]) -> Result<Value>;

/// A predeclared builtin, referenced by `OpGetBuiltin` through its index in
/// `native_functions::BUILTINS`.
#[derive(Clone, Copy, Debug)]
pub struct NativeFunction {
    pub name: &'static str,
    pub function: NativeFn,
}

impl PartialEq for NativeFunction {
    fn eq(&self, other: &Self) -> bool {
        self.function == other.function
    }
}

impl Display for NativeFunction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("<native fn>")
    }
}
