use std::collections::HashMap;

use crate::{
    error::{FiddleError, Result},
    native_functions::BUILTINS,
};

/// Where a resolved name lives at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SymbolScope {
    /// A slot in the VM's global array.
    Global,
    /// A slot above the executing frame's base pointer.
    Local,
    /// An entry in the builtin table.
    Builtin,
    /// A value captured into the executing closure.
    Free,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// One node in the chain of lexical scopes. The global table has no outer;
/// each function body compiled gets its own table whose outer is the scope
/// the function literal appears in. The chain is owned: entering a function
/// scope moves the current table into the new one, leaving moves it back out
/// (see `Compiler::enter_scope`/`leave_scope`).
#[derive(Debug, Default)]
pub struct SymbolTable {
    pub outer: Option<Box<SymbolTable>>,
    store: HashMap<String, Symbol>,
    /// Count of `define`d names in this table only; the next free index.
    pub num_definitions: usize,
    /// Symbols captured from enclosing function scopes, in the order they
    /// were first resolved. Their indices are `OpGetFree` operands.
    pub free_symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// The global table with the builtin names preseeded.
    pub fn with_builtins() -> SymbolTable {
        let mut table = SymbolTable::new();
        for (index, builtin) in BUILTINS.iter().enumerate() {
            table.define_builtin(index, builtin.name);
        }
        table
    }

    pub fn enclosed(outer: SymbolTable) -> SymbolTable {
        SymbolTable {
            outer: Some(Box::new(outer)),
            ..SymbolTable::default()
        }
    }

    fn scope(&self) -> SymbolScope {
        if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        }
    }

    /// Assign `name` the next free index in this table. Defining a name twice
    /// in the same table is an error; shadowing an outer table's name is not.
    pub fn define(&mut self, name: &str) -> Result<Symbol> {
        if self.store.contains_key(name) {
            return Err(FiddleError::compile_unlocated(format!(
                "duplicate definition of `{name}`"
            )));
        }
        // Slot indices must fit a 2-byte operand
        if self.num_definitions > u16::MAX as usize {
            return Err(FiddleError::compile_unlocated(
                if self.outer.is_none() {
                    "too many global variables"
                } else {
                    "too many local variables"
                },
            ));
        }
        let symbol = Symbol {
            name: name.to_string(),
            scope: self.scope(),
            index: self.num_definitions,
        };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());
        Ok(symbol)
    }

    /// Register a predeclared builtin at a caller-supplied index. Only used
    /// on the global table at startup.
    pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Builtin,
            index,
        };
        self.store.insert(name.to_string(), symbol.clone());
        symbol
    }

    /// Look `name` up innermost-to-outermost. A hit in an enclosing
    /// *function* scope (anything other than the true global scope or the
    /// builtin table) is rewritten into a Free symbol here, recording the
    /// capture so the enclosing function can load it when building the
    /// closure.
    pub fn resolve(&mut self, name: &str) -> Result<Symbol> {
        if let Some(symbol) = self.store.get(name) {
            return Ok(symbol.clone());
        }
        let outer = match self.outer.as_mut() {
            Some(outer) => outer,
            None => {
                return Err(FiddleError::compile_unlocated(format!(
                    "undefined variable `{name}`"
                )))
            }
        };
        let symbol = outer.resolve(name)?;
        match symbol.scope {
            SymbolScope::Global | SymbolScope::Builtin => Ok(symbol),
            SymbolScope::Local | SymbolScope::Free => Ok(self.define_free(symbol)),
        }
    }

    fn define_free(&mut self, original: Symbol) -> Symbol {
        let symbol = Symbol {
            name: original.name.clone(),
            scope: SymbolScope::Free,
            index: self.free_symbols.len(),
        };
        self.free_symbols.push(original);
        self.store.insert(symbol.name.clone(), symbol.clone());
        symbol
    }
}
