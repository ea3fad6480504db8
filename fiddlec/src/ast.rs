//! The syntax tree the parser hands to the compiler. Closed sum types with
//! exhaustive matching everywhere: adding a node kind is a compile-time
//! exhaustiveness failure in every consumer, not a runtime fallthrough.

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, value: Expr, line: u32 },
    Return { value: Expr, line: u32 },
    Expr { expr: Expr, line: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    Str(String),
    Ident {
        name: String,
        line: u32,
    },
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
        line: u32,
    },
    Infix {
        op: InfixOp,
        left: Box<Expr>,
        right: Box<Expr>,
        line: u32,
    },
    If {
        condition: Box<Expr>,
        consequence: Block,
        alternative: Option<Block>,
        line: u32,
    },
    Function {
        parameters: Vec<String>,
        body: Block,
        line: u32,
    },
    Call {
        callee: Box<Expr>,
        arguments: Vec<Expr>,
        line: u32,
    },
    Array(Vec<Expr>),
    HashLit(Vec<(Expr, Expr)>),
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
        line: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    Bang,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equal,
    NotEqual,
    Greater,
    Less,
}
