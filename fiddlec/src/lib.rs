//#![warn(clippy::pedantic)]

mod native_functions;
mod scanner;
mod stack;

pub mod ast;
pub mod compiler;
pub mod disassembler;
pub mod error;
pub mod obj;
pub mod op_code;
pub mod parser;
pub mod symbol_table;
pub mod value;
pub mod vm;
