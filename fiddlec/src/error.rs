use std::fmt::{self, Display, Formatter};

pub type Result<T> = std::result::Result<T, FiddleError>;

#[derive(Debug, PartialEq, Eq)]
pub enum FiddleError {
    /// A malformed instruction stream: unknown opcode byte, an operand width
    /// the decoder doesn't implement, or a stream that ends mid-instruction.
    Bytecode(BytecodeError),
    Compile(CompileError),
    CompileErrors(Vec<CompileError>),
    Runtime(String),
}

#[derive(Debug, PartialEq, Eq)]
pub struct CompileError {
    /// Source line of the originating token, when one is available.
    pub line: Option<u32>,
    pub message: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum BytecodeError {
    UnknownOpcode(u8),
    UnsupportedOperandWidth(usize),
    /// The stream ended before the instruction's declared operands.
    TruncatedOperand { offset: usize },
}

impl FiddleError {
    pub fn compile<M: Into<String>>(line: u32, message: M) -> FiddleError {
        FiddleError::Compile(CompileError {
            line: Some(line),
            message: message.into(),
        })
    }

    pub fn compile_err<T, M: Into<String>>(line: u32, message: M) -> Result<T> {
        Err(Self::compile(line, message))
    }

    /// A compile error with no useful source location.
    pub fn compile_unlocated<M: Into<String>>(message: M) -> FiddleError {
        FiddleError::Compile(CompileError {
            line: None,
            message: message.into(),
        })
    }

    pub fn runtime<M: Into<String>>(message: M) -> FiddleError {
        FiddleError::Runtime(message.into())
    }

    pub fn runtime_err<T, M: Into<String>>(message: M) -> Result<T> {
        Err(Self::runtime(message))
    }

    /// Attach a line to a location-less compile error, leaving any other
    /// error untouched.
    pub fn with_line(self, line: u32) -> FiddleError {
        match self {
            FiddleError::Compile(CompileError {
                line: None,
                message,
            }) => Self::compile(line, message),
            other => other,
        }
    }

    /// Fold another error into this aggregate. Only meaningful on
    /// `CompileErrors`; the compiler collects one error per failing top-level
    /// statement instead of stopping at the first.
    pub fn append(&mut self, error: FiddleError) {
        if let FiddleError::CompileErrors(errors) = self {
            match error {
                FiddleError::Compile(e) => errors.push(e),
                FiddleError::CompileErrors(mut es) => errors.append(&mut es),
                FiddleError::Bytecode(e) => errors.push(CompileError {
                    line: None,
                    message: e.to_string(),
                }),
                FiddleError::Runtime(message) => {
                    errors.push(CompileError {
                        line: None,
                        message,
                    });
                }
            }
        }
    }

    /// `Ok(ok)` if no errors were collected, the aggregate otherwise.
    pub fn to_result<T>(self, ok: T) -> Result<T> {
        match self {
            FiddleError::CompileErrors(errors) if errors.is_empty() => Ok(ok),
            FiddleError::CompileErrors(mut errors) if errors.len() == 1 => {
                Err(FiddleError::Compile(errors.remove(0)))
            }
            error => Err(error),
        }
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "line {}: {}", line, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl Display for BytecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BytecodeError::UnknownOpcode(byte) => write!(f, "unknown opcode {byte}"),
            BytecodeError::UnsupportedOperandWidth(width) => {
                write!(f, "unsupported operand width {width}")
            }
            BytecodeError::TruncatedOperand { offset } => {
                write!(f, "instruction stream truncated at offset {offset}")
            }
        }
    }
}

impl Display for FiddleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FiddleError::Bytecode(e) => Display::fmt(e, f),
            FiddleError::Compile(e) => Display::fmt(e, f),
            FiddleError::CompileErrors(errors) => {
                for (i, e) in errors.iter().enumerate() {
                    if i > 0 {
                        f.write_str("\n")?;
                    }
                    Display::fmt(e, f)?;
                }
                Ok(())
            }
            FiddleError::Runtime(message) => f.write_str(message),
        }
    }
}

impl From<BytecodeError> for FiddleError {
    fn from(error: BytecodeError) -> Self {
        FiddleError::Bytecode(error)
    }
}
