use std::{collections::HashMap, mem, rc::Rc};

use crate::{
    compiler::{Bytecode, Compiler},
    error::{FiddleError, Result},
    native_functions::BUILTINS,
    obj::{Closure, CompiledFunction, NativeFunction},
    op_code::{lookup, read_u16, OpCode, OPERAND_WIDTH},
    parser::parse,
    stack::Stack,
    symbol_table::SymbolTable,
    value::Value,
};

const STACK_SIZE: usize = 2048;
const GLOBALS_SIZE: usize = 65536;
const FRAMES_MAX: usize = 1024;

/// One function activation: the closure being executed, its instruction
/// pointer, and where its locals start on the value stack.
struct Frame {
    closure: Rc<Closure>,
    ip: usize,
    base_pointer: usize,
}

impl Frame {
    fn new(closure: Rc<Closure>, base_pointer: usize) -> Frame {
        Frame {
            closure,
            ip: 0,
            base_pointer,
        }
    }
}

pub struct Vm {
    stack: Stack<Value, STACK_SIZE>,
    globals: Vec<Value>,
    frames: Vec<Frame>,
    /// Carried across `interpret` calls so a REPL session's definitions keep
    /// their global slot assignments.
    symbol_table: SymbolTable,
}

impl Vm {
    pub fn new() -> Vm {
        Vm {
            stack: Stack::new(),
            globals: vec![Value::Null; GLOBALS_SIZE],
            frames: Vec::with_capacity(FRAMES_MAX),
            symbol_table: SymbolTable::with_builtins(),
        }
    }

    /// Compile and run one source text. Returns the value of the last
    /// expression statement executed, `Null` for an empty program.
    pub fn interpret(&mut self, source: &str) -> Result<Value> {
        let program = parse(source)?;
        let mut compiler = Compiler::with_state(mem::take(&mut self.symbol_table));
        let bytecode = compiler.compile(&program);
        // Restored even when compilation failed, so later inputs still see
        // every definition made so far
        self.symbol_table = compiler.take_symbol_table();
        self.run(bytecode?)
    }

    pub fn run(&mut self, bytecode: Bytecode) -> Result<Value> {
        let Bytecode {
            instructions,
            constants,
        } = bytecode;
        let main_function = Rc::new(CompiledFunction {
            instructions,
            num_locals: 0,
            num_parameters: 0,
        });
        let main_closure = Rc::new(Closure {
            function: main_function,
            free: vec![],
        });
        self.stack.truncate(0);
        self.frames.clear();
        self.frames.push(Frame::new(main_closure, 0));

        loop {
            let byte = {
                let frame = self.current_frame();
                let instructions = &frame.closure.function.instructions;
                if frame.ip >= instructions.len() {
                    break;
                }
                let byte = instructions[frame.ip];
                frame.ip += 1;
                byte
            };
            let opcode = lookup(byte)?;

            #[cfg(feature = "debug_trace_execution")]
            {
                eprint!("{:?}", self.stack);
                eprintln!("{}", opcode.name());
            }

            match opcode {
                OpCode::Constant => {
                    let index = self.read_operand();
                    self.stack.push(constants[index].clone())?;
                }
                OpCode::Add
                | OpCode::Subtract
                | OpCode::Multiply
                | OpCode::Divide
                | OpCode::Equal
                | OpCode::NotEqual
                | OpCode::GreaterThan => self.binary_operation(opcode)?,
                OpCode::Pop => {
                    self.stack.pop()?;
                }
                OpCode::True => self.stack.push(Value::Bool(true))?,
                OpCode::False => self.stack.push(Value::Bool(false))?,
                OpCode::Null => self.stack.push(Value::Null)?,
                OpCode::Minus => {
                    let value = self.stack.pop()?;
                    match value {
                        Value::Int(i) => self.stack.push(Value::Int(i.wrapping_neg()))?,
                        other => {
                            return FiddleError::runtime_err(format!(
                                "unsupported type for negation: {}",
                                other.type_name()
                            ))
                        }
                    }
                }
                OpCode::Bang => {
                    let value = self.stack.pop()?;
                    self.stack.push(Value::Bool(value.is_falsey()))?;
                }
                OpCode::Jump => {
                    let target = self.read_operand();
                    self.current_frame().ip = target;
                }
                OpCode::JumpNotTruthy => {
                    let target = self.read_operand();
                    let condition = self.stack.pop()?;
                    if condition.is_falsey() {
                        self.current_frame().ip = target;
                    }
                }
                OpCode::GetGlobal => {
                    let index = self.read_operand();
                    self.stack.push(self.globals[index].clone())?;
                }
                OpCode::SetGlobal => {
                    let index = self.read_operand();
                    self.globals[index] = self.stack.pop()?;
                }
                OpCode::GetLocal => {
                    let index = self.read_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack.read(base_pointer + index).clone();
                    self.stack.push(value)?;
                }
                OpCode::SetLocal => {
                    let index = self.read_operand();
                    let base_pointer = self.current_frame().base_pointer;
                    let value = self.stack.pop()?;
                    self.stack.write(base_pointer + index, value);
                }
                OpCode::GetFree => {
                    let index = self.read_operand();
                    let value = self.current_frame().closure.free[index].clone();
                    self.stack.push(value)?;
                }
                OpCode::GetBuiltin => {
                    let index = self.read_operand();
                    self.stack.push(Value::NativeFunction(BUILTINS[index]))?;
                }
                OpCode::Array => {
                    let count = self.read_operand();
                    let start = self.stack.len() - count;
                    let mut elements = Vec::with_capacity(count);
                    for i in start..start + count {
                        elements.push(self.stack.read(i).clone());
                    }
                    self.stack.truncate(start);
                    self.stack.push(Value::Array(Rc::new(elements)))?;
                }
                OpCode::Hash => {
                    // The operand counts pairs; twice as many values are
                    // waiting on the stack
                    let count = self.read_operand();
                    let start = self.stack.len() - 2 * count;
                    let mut pairs = HashMap::with_capacity(count);
                    for i in (start..start + 2 * count).step_by(2) {
                        let key = self.stack.read(i).hash_key()?;
                        let value = self.stack.read(i + 1).clone();
                        pairs.insert(key, value);
                    }
                    self.stack.truncate(start);
                    self.stack.push(Value::Hash(Rc::new(pairs)))?;
                }
                OpCode::Index => {
                    let index = self.stack.pop()?;
                    let left = self.stack.pop()?;
                    let result = match (&left, &index) {
                        (Value::Array(elements), Value::Int(i)) => {
                            // Out of range reads yield null, not an error
                            if *i < 0 || *i as usize >= elements.len() {
                                Value::Null
                            } else {
                                elements[*i as usize].clone()
                            }
                        }
                        (Value::Hash(pairs), _) => pairs
                            .get(&index.hash_key()?)
                            .cloned()
                            .unwrap_or(Value::Null),
                        _ => {
                            return FiddleError::runtime_err(format!(
                                "index operator not supported: {}",
                                left.type_name()
                            ))
                        }
                    };
                    self.stack.push(result)?;
                }
                OpCode::Call => {
                    let argc = self.read_operand();
                    self.call_value(argc)?;
                }
                OpCode::Closure => {
                    let constant = self.read_operand();
                    let free_count = self.read_operand();
                    let function = match &constants[constant] {
                        Value::Function(function) => Rc::clone(function),
                        other => {
                            return FiddleError::runtime_err(format!(
                                "not a function: {}",
                                other.type_name()
                            ))
                        }
                    };
                    let start = self.stack.len() - free_count;
                    let mut free = Vec::with_capacity(free_count);
                    for i in start..start + free_count {
                        free.push(self.stack.read(i).clone());
                    }
                    self.stack.truncate(start);
                    self.stack
                        .push(Value::Closure(Rc::new(Closure { function, free })))?;
                }
                OpCode::ReturnValue | OpCode::Return => {
                    let result = if opcode == OpCode::ReturnValue {
                        self.stack.pop()?
                    } else {
                        Value::Null
                    };
                    if let Some(frame) = self.frames.pop() {
                        if self.frames.is_empty() {
                            // A top-level `return` ends the program
                            self.stack.truncate(frame.base_pointer);
                            return Ok(result);
                        }
                        // Drop the frame's locals and the callee itself
                        self.stack.truncate(frame.base_pointer - 1);
                        self.stack.push(result)?;
                    }
                }
            }
        }

        Ok(self.stack.last_popped().clone())
    }

    // One frame is always live while the dispatch loop runs.
    fn current_frame(&mut self) -> &mut Frame {
        let index = self.frames.len() - 1;
        &mut self.frames[index]
    }

    /// Read the next operand from the current frame and step its instruction
    /// pointer past it. The compiler only emits whole instructions, so the
    /// read is in bounds.
    fn read_operand(&mut self) -> usize {
        let frame = self.current_frame();
        let operand = read_u16(&frame.closure.function.instructions[frame.ip..]);
        frame.ip += OPERAND_WIDTH;
        operand as usize
    }

    fn binary_operation(&mut self, opcode: OpCode) -> Result<()> {
        let right = self.stack.pop()?;
        let left = self.stack.pop()?;
        let result = match (opcode, &left, &right) {
            (OpCode::Add, Value::Int(l), Value::Int(r)) => Value::Int(l.wrapping_add(*r)),
            (OpCode::Subtract, Value::Int(l), Value::Int(r)) => Value::Int(l.wrapping_sub(*r)),
            (OpCode::Multiply, Value::Int(l), Value::Int(r)) => Value::Int(l.wrapping_mul(*r)),
            (OpCode::Divide, Value::Int(l), Value::Int(r)) => {
                if *r == 0 {
                    return FiddleError::runtime_err("division by zero");
                }
                Value::Int(l.wrapping_div(*r))
            }
            (OpCode::Add, Value::String(l), Value::String(r)) => {
                Value::String(Rc::from(format!("{l}{r}").as_str()))
            }
            (OpCode::Equal, Value::Int(l), Value::Int(r)) => Value::Bool(l == r),
            (OpCode::NotEqual, Value::Int(l), Value::Int(r)) => Value::Bool(l != r),
            (OpCode::GreaterThan, Value::Int(l), Value::Int(r)) => Value::Bool(l > r),
            (OpCode::Equal, Value::Bool(l), Value::Bool(r)) => Value::Bool(l == r),
            (OpCode::NotEqual, Value::Bool(l), Value::Bool(r)) => Value::Bool(l != r),
            _ => {
                return FiddleError::runtime_err(format!(
                    "unsupported types for binary operation: {} {}",
                    left.type_name(),
                    right.type_name()
                ))
            }
        };
        self.stack.push(result)
    }

    /// Dispatch a call on whatever sits below the arguments.
    fn call_value(&mut self, argc: usize) -> Result<()> {
        let callee = self.stack.peek(argc).clone();
        match callee {
            Value::Closure(closure) => self.call_closure(closure, argc),
            // A bare function is a closure that captured nothing
            Value::Function(function) => {
                let closure = Rc::new(Closure {
                    function,
                    free: vec![],
                });
                self.call_closure(closure, argc)
            }
            Value::NativeFunction(native) => self.call_native(native, argc),
            other => FiddleError::runtime_err(format!(
                "calling non-function: {}",
                other.type_name()
            )),
        }
    }

    fn call_closure(&mut self, closure: Rc<Closure>, argc: usize) -> Result<()> {
        let want = closure.function.num_parameters;
        if argc != want {
            return FiddleError::runtime_err(format!(
                "wrong number of arguments: want {want}, got {argc}"
            ));
        }
        if self.frames.len() == FRAMES_MAX {
            return FiddleError::runtime_err("stack overflow");
        }
        // Arguments already sit where the frame's first locals go
        let base_pointer = self.stack.len() - argc;
        let num_locals = closure.function.num_locals;
        self.frames.push(Frame::new(closure, base_pointer));
        self.stack.grow(base_pointer + num_locals)
    }

    fn call_native(&mut self, native: NativeFunction, argc: usize) -> Result<()> {
        let start = self.stack.len() - argc;
        let mut args = Vec::with_capacity(argc);
        for i in start..start + argc {
            args.push(self.stack.read(i).clone());
        }
        let result = (native.function)(&args)?;
        // Pop the arguments and the callee itself
        self.stack.truncate(start - 1);
        self.stack.push(result)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_source(source: &str) -> Value {
        Vm::new().interpret(source).unwrap()
    }

    fn run_error(source: &str) -> String {
        match Vm::new().interpret(source).unwrap_err() {
            FiddleError::Runtime(message) => message,
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    fn assert_int_cases(cases: &[(&str, i64)]) {
        for (source, expected) in cases {
            assert_eq!(run_source(source), Value::Int(*expected), "{source}");
        }
    }

    fn assert_bool_cases(cases: &[(&str, bool)]) {
        for (source, expected) in cases {
            assert_eq!(run_source(source), Value::Bool(*expected), "{source}");
        }
    }

    #[test]
    fn integer_arithmetic() {
        assert_int_cases(&[
            ("1", 1),
            ("1 + 2", 3),
            ("1 - 2", -1),
            ("4 / 2", 2),
            ("50 / 2 * 2 + 10 - 5", 55),
            ("5 * (2 + 10)", 60),
            ("-5", -5),
            ("-50 + 100 + -50", 0),
        ]);
    }

    #[test]
    fn division_by_zero_is_fatal() {
        assert_eq!(run_error("1 / 0"), "division by zero");
    }

    #[test]
    fn boolean_expressions() {
        assert_bool_cases(&[
            ("true", true),
            ("false", false),
            ("1 < 2", true),
            ("1 > 2", false),
            ("1 == 1", true),
            ("1 != 1", false),
            ("true == true", true),
            ("true != false", true),
            ("(1 < 2) == true", true),
            ("!true", false),
            ("!!5", true),
            ("!(if (false) { 5 })", true),
        ]);
    }

    #[test]
    fn conditionals() {
        assert_int_cases(&[
            ("if (true) { 10 }", 10),
            ("if (1) { 10 }", 10),
            ("if (1 < 2) { 10 } else { 20 }", 10),
            ("if (1 > 2) { 10 } else { 20 }", 20),
            ("if (if (false) { 10 }) { 10 } else { 20 }", 20),
        ]);
        assert_eq!(run_source("if (false) { 10 }"), Value::Null);
    }

    #[test]
    fn the_last_popped_value_is_the_result() {
        assert_int_cases(&[("1; 2; 3", 3)]);
    }

    #[test]
    fn global_let_statements() {
        assert_int_cases(&[
            ("let one = 1; one", 1),
            ("let one = 1; let two = 2; one + two", 3),
            ("let one = 1; let two = one + one; one + two", 3),
        ]);
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(
            run_source(r#""fid" + "dle""#),
            Value::String("fiddle".into())
        );
    }

    #[test]
    fn strings_do_not_compare() {
        assert!(run_error(r#""a" == "a""#).contains("unsupported types"));
    }

    #[test]
    fn array_literals_and_indexing() {
        assert_int_cases(&[
            ("[1, 2, 3][1]", 2),
            ("[1, 2, 3][0 + 2]", 3),
            ("[[1, 1, 1]][0][0]", 1),
            ("let a = [1, 2 * 2, 3 + 3]; a[2]", 6),
        ]);
        assert_eq!(run_source("[1, 2, 3][99]"), Value::Null);
        assert_eq!(run_source("[1][-1]"), Value::Null);
        assert_eq!(run_source("[]"), Value::Array(Rc::new(vec![])));
    }

    #[test]
    fn hash_literals_and_indexing() {
        assert_int_cases(&[
            ("{1: 1, 2: 2}[1]", 1),
            ("{1: 1, 2: 2}[2]", 2),
            (r#"{"one": 1}["one"]"#, 1),
            ("{true: 5}[true]", 5),
        ]);
        assert_eq!(run_source("{1: 1}[5]"), Value::Null);
        assert_eq!(run_source("{}[0]"), Value::Null);
    }

    #[test]
    fn unhashable_keys_are_errors() {
        assert_eq!(run_error("{[1]: 1}"), "unusable as hash key: array");
        assert_eq!(run_error("{1: 1}[[1]]"), "unusable as hash key: array");
    }

    #[test]
    fn indexing_a_non_collection_is_an_error() {
        assert_eq!(run_error("5[1]"), "index operator not supported: integer");
    }

    #[test]
    fn function_calls() {
        assert_int_cases(&[
            ("let f = fn() { 5 + 10 }; f()", 15),
            ("let f = fn() { return 99; 100; }; f()", 99),
            ("let a = fn() { 1 }; let b = fn() { a() + 1 }; b()", 2),
            ("fn() { 24 }()", 24),
        ]);
        assert_eq!(run_source("let f = fn() { }; f()"), Value::Null);
    }

    #[test]
    fn functions_with_locals_and_arguments() {
        assert_int_cases(&[
            ("let one = fn() { let one = 1; one }; one()", 1),
            ("let identity = fn(a) { a }; identity(4)", 4),
            ("let sum = fn(a, b) { a + b }; sum(1, 2)", 3),
            (
                "let sum = fn(a, b) { let c = a + b; c }; sum(1, 2) + sum(3, 4)",
                10,
            ),
            (
                "let global = 10;
                 let sum = fn(a, b) { let c = a + b; c + global };
                 sum(1, 2) + global",
                23,
            ),
        ]);
    }

    #[test]
    fn wrong_argument_count_is_an_error() {
        assert_eq!(
            run_error("let f = fn(a) { a }; f(1, 2);"),
            "wrong number of arguments: want 1, got 2"
        );
        assert_eq!(
            run_error("fn(a, b) { a + b }(1)"),
            "wrong number of arguments: want 2, got 1"
        );
    }

    #[test]
    fn calling_a_non_function_is_an_error() {
        assert_eq!(run_error("let x = 5; x();"), "calling non-function: integer");
    }

    #[test]
    fn builtin_functions() {
        assert_int_cases(&[
            (r#"len("fiddle")"#, 6),
            ("len([1, 2, 3])", 3),
            ("first([5, 6])", 5),
            ("last([5, 6])", 6),
            ("len(rest([1, 2, 3]))", 2),
            ("len(push([1], 2))", 2),
        ]);
        assert_eq!(run_source("first([])"), Value::Null);
        assert_eq!(run_source(r#"puts("hi")"#), Value::Null);
    }

    #[test]
    fn closures_capture_their_environment() {
        assert_int_cases(&[
            (
                "let newClosure = fn(a) { fn() { a } };
                 let closure = newClosure(99);
                 closure()",
                99,
            ),
            (
                "let newAdder = fn(a, b) { fn(c) { a + b + c } };
                 let adder = newAdder(1, 2);
                 adder(8)",
                11,
            ),
            (
                "let newAdderOuter = fn(a, b) {
                     let c = a + b;
                     fn(d) { let e = d + c; fn(f) { f + e } }
                 };
                 let newAdderInner = newAdderOuter(1, 2);
                 let adder = newAdderInner(3);
                 adder(8)",
                14,
            ),
        ]);
    }

    #[test]
    fn global_recursion() {
        assert_int_cases(&[
            (
                "let countDown = fn(x) { if (x == 0) { 0 } else { countDown(x - 1) } };
                 countDown(3)",
                0,
            ),
            (
                "let fib = fn(x) { if (x < 2) { x } else { fib(x - 1) + fib(x - 2) } };
                 fib(10)",
                55,
            ),
        ]);
    }

    #[test]
    fn runaway_recursion_overflows_the_frame_stack() {
        assert_eq!(
            run_error("let f = fn() { f() }; f()"),
            "stack overflow"
        );
    }

    #[test]
    fn top_level_return_ends_the_program() {
        assert_eq!(run_source("return 5; 10;"), Value::Int(5));
    }

    #[test]
    fn definitions_persist_across_interpret_calls() {
        let mut vm = Vm::new();
        vm.interpret("let a = 5;").unwrap();
        assert_eq!(vm.interpret("a * 2").unwrap(), Value::Int(10));
        assert_eq!(
            vm.interpret("let double = fn(x) { x * 2 }; double(a)").unwrap(),
            Value::Int(10)
        );

        // A failing input must not lose earlier definitions.
        assert!(vm.interpret("nope").is_err());
        assert_eq!(vm.interpret("a").unwrap(), Value::Int(5));
    }
}
