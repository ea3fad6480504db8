use std::{mem, rc::Rc};

use crate::{
    ast::{Block, Expr, InfixOp, PrefixOp, Program, Stmt},
    error::{FiddleError, Result},
    obj::CompiledFunction,
    op_code::{lookup, make, OpCode},
    symbol_table::{Symbol, SymbolScope, SymbolTable},
    value::Value,
};

/// The compiler's finished output and the VM's sole input.
#[derive(Debug)]
pub struct Bytecode {
    pub instructions: Vec<u8>,
    pub constants: Vec<Value>,
}

#[derive(Clone, Copy)]
struct EmittedInstruction {
    opcode: OpCode,
    position: usize,
}

/// One function body under compilation: its own instruction buffer plus the
/// last two emissions for peephole decisions.
#[derive(Default)]
struct CompilationScope {
    instructions: Vec<u8>,
    last_instruction: Option<EmittedInstruction>,
    previous_instruction: Option<EmittedInstruction>,
}

macro_rules! current_scope {
    ($self:ident) => {
        $self.scopes[$self.scope_index]
    };
}

pub struct Compiler {
    constants: Vec<Value>,
    symbol_table: SymbolTable,
    scopes: Vec<CompilationScope>,
    scope_index: usize,
}

impl Compiler {
    pub fn new() -> Compiler {
        Self::with_state(SymbolTable::with_builtins())
    }

    /// Resume with an existing global table so a REPL's definitions keep
    /// their slot indices across inputs.
    pub fn with_state(symbol_table: SymbolTable) -> Compiler {
        Compiler {
            constants: vec![],
            symbol_table,
            scopes: vec![CompilationScope::default()],
            scope_index: 0,
        }
    }

    pub fn take_symbol_table(&mut self) -> SymbolTable {
        mem::take(&mut self.symbol_table)
    }

    /// Compile a program. Failing top-level statements don't stop the walk;
    /// their errors are collected and reported together.
    pub fn compile(&mut self, program: &Program) -> Result<Bytecode> {
        let mut errors = FiddleError::CompileErrors(vec![]);
        for statement in &program.statements {
            self.statement(statement)
                .unwrap_or_else(|e| errors.append(e));
        }
        errors.to_result(())?;

        let scope = &mut current_scope!(self);
        let instructions = mem::take(&mut scope.instructions);
        scope.last_instruction = None;
        scope.previous_instruction = None;

        #[cfg(feature = "debug_print_code")]
        if let Ok(text) = crate::disassembler::disassemble(&instructions) {
            eprintln!("== <main> ==\n{text}");
        }

        Ok(Bytecode {
            instructions,
            constants: mem::take(&mut self.constants),
        })
    }

    fn statement(&mut self, statement: &Stmt) -> Result<()> {
        match statement {
            Stmt::Let { name, value, line } => {
                // Defined before the value compiles so a global function can
                // call itself by name.
                let symbol = self
                    .symbol_table
                    .define(name)
                    .map_err(|e| e.with_line(*line))?;
                self.expression(value)?;
                let opcode = if symbol.scope == SymbolScope::Global {
                    OpCode::SetGlobal
                } else {
                    OpCode::SetLocal
                };
                self.emit(opcode, &[symbol.index])?;
            }
            Stmt::Return { value, .. } => {
                self.expression(value)?;
                self.emit(OpCode::ReturnValue, &[])?;
            }
            Stmt::Expr { expr, .. } => {
                self.expression(expr)?;
                self.emit(OpCode::Pop, &[])?;
            }
        }
        Ok(())
    }

    fn expression(&mut self, expression: &Expr) -> Result<()> {
        match expression {
            Expr::Int(value) => {
                let constant = self.add_constant(Value::Int(*value))?;
                self.emit(OpCode::Constant, &[constant])?;
            }
            Expr::Bool(value) => {
                self.emit(if *value { OpCode::True } else { OpCode::False }, &[])?;
            }
            Expr::Str(value) => {
                let constant = self.add_constant(Value::String(Rc::from(value.as_str())))?;
                self.emit(OpCode::Constant, &[constant])?;
            }
            Expr::Ident { name, line } => {
                let symbol = self
                    .symbol_table
                    .resolve(name)
                    .map_err(|e| e.with_line(*line))?;
                self.load_symbol(&symbol)?;
            }
            Expr::Prefix { op, right, .. } => {
                self.expression(right)?;
                match op {
                    PrefixOp::Bang => self.emit(OpCode::Bang, &[])?,
                    PrefixOp::Minus => self.emit(OpCode::Minus, &[])?,
                };
            }
            Expr::Infix {
                op, left, right, ..
            } => {
                // `<` swaps its operands and reuses OpGreaterThan; there is
                // no less-than opcode.
                if *op == InfixOp::Less {
                    self.expression(right)?;
                    self.expression(left)?;
                    self.emit(OpCode::GreaterThan, &[])?;
                    return Ok(());
                }
                self.expression(left)?;
                self.expression(right)?;
                let opcode = match op {
                    InfixOp::Add => OpCode::Add,
                    InfixOp::Subtract => OpCode::Subtract,
                    InfixOp::Multiply => OpCode::Multiply,
                    InfixOp::Divide => OpCode::Divide,
                    InfixOp::Equal => OpCode::Equal,
                    InfixOp::NotEqual => OpCode::NotEqual,
                    InfixOp::Greater | InfixOp::Less => OpCode::GreaterThan,
                };
                self.emit(opcode, &[])?;
            }
            Expr::If {
                condition,
                consequence,
                alternative,
                ..
            } => self.if_expression(condition, consequence, alternative.as_ref())?,
            Expr::Function {
                parameters,
                body,
                line,
            } => self.function_literal(parameters, body, *line)?,
            Expr::Call {
                callee, arguments, ..
            } => {
                self.expression(callee)?;
                for argument in arguments {
                    self.expression(argument)?;
                }
                self.emit(OpCode::Call, &[arguments.len()])?;
            }
            Expr::Array(elements) => {
                for element in elements {
                    self.expression(element)?;
                }
                self.emit(OpCode::Array, &[elements.len()])?;
            }
            Expr::HashLit(pairs) => {
                for (key, value) in pairs {
                    self.expression(key)?;
                    self.expression(value)?;
                }
                // Operand is the pair count; the VM pops twice as many values
                self.emit(OpCode::Hash, &[pairs.len()])?;
            }
            Expr::Index { left, index, .. } => {
                self.expression(left)?;
                self.expression(index)?;
                self.emit(OpCode::Index, &[])?;
            }
        }
        Ok(())
    }

    fn if_expression(
        &mut self,
        condition: &Expr,
        consequence: &Block,
        alternative: Option<&Block>,
    ) -> Result<()> {
        self.expression(condition)?;

        // Placeholder operand, patched once the consequence length is known
        let jump_not_truthy = self.emit(OpCode::JumpNotTruthy, &[9999])?;
        self.block(consequence)?;
        if self.last_instruction_is(OpCode::Pop) {
            self.remove_last_instruction();
        }
        let jump = self.emit(OpCode::Jump, &[9999])?;

        let after_consequence = current_scope!(self).instructions.len();
        self.change_operand(jump_not_truthy, after_consequence)?;

        match alternative {
            Some(alternative) => {
                self.block(alternative)?;
                if self.last_instruction_is(OpCode::Pop) {
                    self.remove_last_instruction();
                }
            }
            // A conditional always leaves exactly one value on the stack
            None => {
                self.emit(OpCode::Null, &[])?;
            }
        }
        let after_alternative = current_scope!(self).instructions.len();
        self.change_operand(jump, after_alternative)?;
        Ok(())
    }

    fn function_literal(&mut self, parameters: &[String], body: &Block, line: u32) -> Result<()> {
        self.enter_scope();
        let compiled = self.function_scope(parameters, body, line);
        let (instructions, free_symbols, num_locals) = self.leave_scope();
        // Propagated only after the scope stack is rebalanced
        compiled?;

        #[cfg(feature = "debug_print_code")]
        if let Ok(text) = crate::disassembler::disassemble(&instructions) {
            eprintln!("== <fn> ==\n{text}");
        }

        for free in &free_symbols {
            self.load_symbol(free)?;
        }
        let function = Value::Function(Rc::new(CompiledFunction {
            instructions,
            num_locals,
            num_parameters: parameters.len(),
        }));
        let constant = self.add_constant(function)?;
        if free_symbols.is_empty() {
            self.emit(OpCode::Constant, &[constant])?;
        } else {
            self.emit(OpCode::Closure, &[constant, free_symbols.len()])?;
        }
        Ok(())
    }

    /// The parts of function compilation that run inside the new scope.
    fn function_scope(&mut self, parameters: &[String], body: &Block, line: u32) -> Result<()> {
        for parameter in parameters {
            self.symbol_table
                .define(parameter)
                .map_err(|e| e.with_line(line))?;
        }
        self.block(body)?;
        if self.last_instruction_is(OpCode::Pop) {
            self.replace_last_with_return()?;
        }
        if !self.last_instruction_is(OpCode::ReturnValue) {
            self.emit(OpCode::Return, &[])?;
        }
        Ok(())
    }

    fn block(&mut self, block: &Block) -> Result<()> {
        for statement in &block.statements {
            self.statement(statement)?;
        }
        Ok(())
    }

    fn load_symbol(&mut self, symbol: &Symbol) -> Result<()> {
        let opcode = match symbol.scope {
            SymbolScope::Global => OpCode::GetGlobal,
            SymbolScope::Local => OpCode::GetLocal,
            SymbolScope::Builtin => OpCode::GetBuiltin,
            SymbolScope::Free => OpCode::GetFree,
        };
        self.emit(opcode, &[symbol.index])?;
        Ok(())
    }

    /// Append an instruction to the current scope's buffer and return the
    /// byte offset it was written at.
    fn emit(&mut self, opcode: OpCode, operands: &[usize]) -> Result<usize> {
        let instruction = make(opcode, operands)?;
        let scope = &mut current_scope!(self);
        let position = scope.instructions.len();
        scope.instructions.extend_from_slice(&instruction);
        scope.previous_instruction = scope.last_instruction;
        scope.last_instruction = Some(EmittedInstruction { opcode, position });
        Ok(position)
    }

    fn last_instruction_is(&self, opcode: OpCode) -> bool {
        matches!(
            current_scope!(self).last_instruction,
            Some(EmittedInstruction { opcode: last, .. }) if last == opcode
        )
    }

    fn remove_last_instruction(&mut self) {
        let scope = &mut current_scope!(self);
        if let Some(last) = scope.last_instruction {
            scope.instructions.truncate(last.position);
            scope.last_instruction = scope.previous_instruction;
        }
    }

    /// Rewrite a trailing `OpPop` into `OpReturnValue`, making the last
    /// expression of a function body its return value.
    fn replace_last_with_return(&mut self) -> Result<()> {
        let position = match current_scope!(self).last_instruction {
            Some(last) => last.position,
            None => return Ok(()),
        };
        let instruction = make(OpCode::ReturnValue, &[])?;
        self.replace_instruction(position, &instruction);
        if let Some(last) = current_scope!(self).last_instruction.as_mut() {
            last.opcode = OpCode::ReturnValue;
        }
        Ok(())
    }

    /// Back-patch: rewrite the operand of the instruction previously emitted
    /// at `position` now that its real value is known.
    fn change_operand(&mut self, position: usize, operand: usize) -> Result<()> {
        let opcode = lookup(current_scope!(self).instructions[position])?;
        let instruction = make(opcode, &[operand])?;
        self.replace_instruction(position, &instruction);
        Ok(())
    }

    fn replace_instruction(&mut self, position: usize, instruction: &[u8]) {
        let scope = &mut current_scope!(self);
        scope.instructions[position..position + instruction.len()].copy_from_slice(instruction);
    }

    fn add_constant(&mut self, value: Value) -> Result<usize> {
        if self.constants.len() > u16::MAX as usize {
            return Err(FiddleError::compile_unlocated("too many constants"));
        }
        self.constants.push(value);
        Ok(self.constants.len() - 1)
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::default());
        self.scope_index += 1;
        let outer = mem::take(&mut self.symbol_table);
        self.symbol_table = SymbolTable::enclosed(outer);
    }

    /// Pop the finished function scope, yielding its instruction buffer, its
    /// captured symbols, and how many locals it defined. The enclosing
    /// symbol table is moved back into place.
    fn leave_scope(&mut self) -> (Vec<u8>, Vec<Symbol>, usize) {
        let scope = self.scopes.pop().unwrap_or_default();
        self.scope_index -= 1;
        let table = mem::take(&mut self.symbol_table);
        let num_locals = table.num_definitions;
        let free_symbols = table.free_symbols;
        self.symbol_table = table.outer.map(|outer| *outer).unwrap_or_default();
        (scope.instructions, free_symbols, num_locals)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
