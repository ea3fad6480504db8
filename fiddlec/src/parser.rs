use crate::{
    ast::{Block, Expr, InfixOp, PrefixOp, Program, Stmt},
    error::{FiddleError, Result},
    scanner::{Scanner, Token, TokenType},
};

/// Parse a whole source text. Statement-level errors are collected and
/// reported together; the parser resynchronizes at the next `;`.
pub fn parse(source: &str) -> Result<Program> {
    Parser::new(source).parse_program()
}

#[derive(Clone, Copy, PartialEq, PartialOrd)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
    Index,
}

fn precedence_of(token_type: TokenType) -> Precedence {
    match token_type {
        TokenType::EqualEqual | TokenType::BangEqual => Precedence::Equals,
        TokenType::Less | TokenType::Greater => Precedence::LessGreater,
        TokenType::Plus | TokenType::Minus => Precedence::Sum,
        TokenType::Star | TokenType::Slash => Precedence::Product,
        TokenType::LeftParen => Precedence::Call,
        TokenType::LeftBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

pub struct Parser<'source> {
    scanner: Scanner<'source>,
    current: Token<'source>,
    peek: Token<'source>,
}

impl<'source> Parser<'source> {
    pub fn new(source: &'source str) -> Self {
        let mut scanner = Scanner::new(source);
        let current = scanner.scan_token();
        let peek = scanner.scan_token();
        Self {
            scanner,
            current,
            peek,
        }
    }

    pub fn parse_program(mut self) -> Result<Program> {
        let mut errors = FiddleError::CompileErrors(vec![]);
        let mut statements = vec![];
        while self.current.token_type != TokenType::Eof {
            match self.statement() {
                Ok(statement) => statements.push(statement),
                Err(error) => {
                    errors.append(error);
                    self.synchronize();
                }
            }
            self.advance();
        }
        errors.to_result(Program { statements })
    }

    fn advance(&mut self) {
        self.current = self.peek;
        self.peek = self.scanner.scan_token();
    }

    /// Skip to the next statement boundary after an error.
    fn synchronize(&mut self) {
        while !matches!(
            self.current.token_type,
            TokenType::Semicolon | TokenType::Eof
        ) {
            self.advance();
        }
    }

    fn expect_peek(&mut self, expected: TokenType) -> Result<()> {
        if self.peek.token_type == expected {
            self.advance();
            return Ok(());
        }
        if self.peek.token_type == TokenType::Error {
            return FiddleError::compile_err(self.peek.line, self.peek.lexeme);
        }
        FiddleError::compile_err(
            self.peek.line,
            format!(
                "expected {}, found `{}`",
                describe(expected),
                self.peek.lexeme
            ),
        )
    }

    // Statements leave `current` on their final token; the program/block
    // loops advance past it.

    fn statement(&mut self) -> Result<Stmt> {
        match self.current.token_type {
            TokenType::Let => self.let_statement(),
            TokenType::Return => self.return_statement(),
            _ => self.expression_statement(),
        }
    }

    fn let_statement(&mut self) -> Result<Stmt> {
        let line = self.current.line;
        self.expect_peek(TokenType::Identifier)?;
        let name = self.current.lexeme.to_string();
        self.expect_peek(TokenType::Assign)?;
        self.advance();
        let value = self.expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();
        Ok(Stmt::Let { name, value, line })
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let line = self.current.line;
        self.advance();
        let value = self.expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();
        Ok(Stmt::Return { value, line })
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let line = self.current.line;
        let expr = self.expression(Precedence::Lowest)?;
        self.skip_optional_semicolon();
        Ok(Stmt::Expr { expr, line })
    }

    fn skip_optional_semicolon(&mut self) {
        if self.peek.token_type == TokenType::Semicolon {
            self.advance();
        }
    }

    fn expression(&mut self, precedence: Precedence) -> Result<Expr> {
        let mut left = self.prefix()?;
        while self.peek.token_type != TokenType::Semicolon
            && precedence < precedence_of(self.peek.token_type)
        {
            self.advance();
            left = self.infix(left)?;
        }
        Ok(left)
    }

    fn prefix(&mut self) -> Result<Expr> {
        match self.current.token_type {
            TokenType::Int => {
                let line = self.current.line;
                self.current.lexeme.parse::<i64>().map(Expr::Int).map_err(
                    |_| FiddleError::compile(line, "integer literal out of range"),
                )
            }
            TokenType::String => {
                // The lexeme includes the surrounding quotes
                let lexeme = self.current.lexeme;
                Ok(Expr::Str(lexeme[1..lexeme.len() - 1].to_string()))
            }
            TokenType::Identifier => Ok(Expr::Ident {
                name: self.current.lexeme.to_string(),
                line: self.current.line,
            }),
            TokenType::True => Ok(Expr::Bool(true)),
            TokenType::False => Ok(Expr::Bool(false)),
            TokenType::Bang => self.prefix_expression(PrefixOp::Bang),
            TokenType::Minus => self.prefix_expression(PrefixOp::Minus),
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression(Precedence::Lowest)?;
                self.expect_peek(TokenType::RightParen)?;
                Ok(expr)
            }
            TokenType::If => self.if_expression(),
            TokenType::Fn => self.function_literal(),
            TokenType::LeftBracket => Ok(Expr::Array(
                self.expression_list(TokenType::RightBracket)?,
            )),
            TokenType::LeftBrace => self.hash_literal(),
            TokenType::Error => {
                FiddleError::compile_err(self.current.line, self.current.lexeme)
            }
            TokenType::Eof => {
                FiddleError::compile_err(self.current.line, "unexpected end of input")
            }
            _ => FiddleError::compile_err(
                self.current.line,
                format!("unexpected token `{}`", self.current.lexeme),
            ),
        }
    }

    fn prefix_expression(&mut self, op: PrefixOp) -> Result<Expr> {
        let line = self.current.line;
        self.advance();
        let right = self.expression(Precedence::Prefix)?;
        Ok(Expr::Prefix {
            op,
            right: Box::new(right),
            line,
        })
    }

    fn infix(&mut self, left: Expr) -> Result<Expr> {
        let op = match self.current.token_type {
            TokenType::Plus => InfixOp::Add,
            TokenType::Minus => InfixOp::Subtract,
            TokenType::Star => InfixOp::Multiply,
            TokenType::Slash => InfixOp::Divide,
            TokenType::EqualEqual => InfixOp::Equal,
            TokenType::BangEqual => InfixOp::NotEqual,
            TokenType::Less => InfixOp::Less,
            TokenType::Greater => InfixOp::Greater,
            TokenType::LeftParen => return self.call_expression(left),
            TokenType::LeftBracket => return self.index_expression(left),
            _ => {
                return FiddleError::compile_err(
                    self.current.line,
                    format!("`{}` is not an infix operator", self.current.lexeme),
                )
            }
        };
        let line = self.current.line;
        let precedence = precedence_of(self.current.token_type);
        self.advance();
        let right = self.expression(precedence)?;
        Ok(Expr::Infix {
            op,
            left: Box::new(left),
            right: Box::new(right),
            line,
        })
    }

    fn if_expression(&mut self) -> Result<Expr> {
        let line = self.current.line;
        self.expect_peek(TokenType::LeftParen)?;
        self.advance();
        let condition = self.expression(Precedence::Lowest)?;
        self.expect_peek(TokenType::RightParen)?;
        self.expect_peek(TokenType::LeftBrace)?;
        let consequence = self.block()?;
        let alternative = if self.peek.token_type == TokenType::Else {
            self.advance();
            self.expect_peek(TokenType::LeftBrace)?;
            Some(self.block()?)
        } else {
            None
        };
        Ok(Expr::If {
            condition: Box::new(condition),
            consequence,
            alternative,
            line,
        })
    }

    /// `current` is the opening brace; leaves `current` on the closing one.
    fn block(&mut self) -> Result<Block> {
        let line = self.current.line;
        let mut statements = vec![];
        self.advance();
        while self.current.token_type != TokenType::RightBrace {
            if self.current.token_type == TokenType::Eof {
                return FiddleError::compile_err(line, "unclosed block, expected `}`");
            }
            statements.push(self.statement()?);
            self.advance();
        }
        Ok(Block { statements })
    }

    fn function_literal(&mut self) -> Result<Expr> {
        let line = self.current.line;
        self.expect_peek(TokenType::LeftParen)?;
        let parameters = self.parameters()?;
        self.expect_peek(TokenType::LeftBrace)?;
        let body = self.block()?;
        Ok(Expr::Function {
            parameters,
            body,
            line,
        })
    }

    fn parameters(&mut self) -> Result<Vec<String>> {
        let mut parameters = vec![];
        if self.peek.token_type == TokenType::RightParen {
            self.advance();
            return Ok(parameters);
        }
        self.expect_peek(TokenType::Identifier)?;
        parameters.push(self.current.lexeme.to_string());
        while self.peek.token_type == TokenType::Comma {
            self.advance();
            self.expect_peek(TokenType::Identifier)?;
            parameters.push(self.current.lexeme.to_string());
        }
        self.expect_peek(TokenType::RightParen)?;
        Ok(parameters)
    }

    fn call_expression(&mut self, callee: Expr) -> Result<Expr> {
        let line = self.current.line;
        let arguments = self.expression_list(TokenType::RightParen)?;
        Ok(Expr::Call {
            callee: Box::new(callee),
            arguments,
            line,
        })
    }

    /// `current` is the opening delimiter; leaves `current` on `end`.
    fn expression_list(&mut self, end: TokenType) -> Result<Vec<Expr>> {
        let mut list = vec![];
        if self.peek.token_type == end {
            self.advance();
            return Ok(list);
        }
        self.advance();
        list.push(self.expression(Precedence::Lowest)?);
        while self.peek.token_type == TokenType::Comma {
            self.advance();
            self.advance();
            list.push(self.expression(Precedence::Lowest)?);
        }
        self.expect_peek(end)?;
        Ok(list)
    }

    fn index_expression(&mut self, left: Expr) -> Result<Expr> {
        let line = self.current.line;
        self.advance();
        let index = self.expression(Precedence::Lowest)?;
        self.expect_peek(TokenType::RightBracket)?;
        Ok(Expr::Index {
            left: Box::new(left),
            index: Box::new(index),
            line,
        })
    }

    fn hash_literal(&mut self) -> Result<Expr> {
        let mut pairs = vec![];
        while self.peek.token_type != TokenType::RightBrace {
            self.advance();
            let key = self.expression(Precedence::Lowest)?;
            self.expect_peek(TokenType::Colon)?;
            self.advance();
            let value = self.expression(Precedence::Lowest)?;
            pairs.push((key, value));
            if self.peek.token_type != TokenType::RightBrace {
                self.expect_peek(TokenType::Comma)?;
            }
        }
        self.expect_peek(TokenType::RightBrace)?;
        Ok(Expr::HashLit(pairs))
    }
}

fn describe(token_type: TokenType) -> &'static str {
    match token_type {
        TokenType::Identifier => "an identifier",
        TokenType::Assign => "`=`",
        TokenType::LeftParen => "`(`",
        TokenType::RightParen => "`)`",
        TokenType::LeftBrace => "`{`",
        TokenType::RightBrace => "`}`",
        TokenType::RightBracket => "`]`",
        TokenType::Colon => "`:`",
        TokenType::Comma => "`,`",
        _ => "a token",
    }
}
