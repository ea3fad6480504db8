use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::IntoStaticStr;

use crate::error::{BytecodeError, Result};

/// Every operand in the encoding is this wide: an unsigned big-endian
/// integer written immediately after the opcode byte.
pub const OPERAND_WIDTH: usize = 2;

/// One-byte instruction tags. The discriminant of the first variant is the
/// encoding's byte 0, so `Constant` must stay first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive, IntoStaticStr)]
#[repr(u8)]
pub enum OpCode {
    /// Push constants[operand] onto the stack
    Constant,

    Add,
    Subtract,
    Multiply,
    Divide,

    Pop,

    // Literals stored directly as instructions
    True,
    False,
    Null,

    Equal,
    NotEqual,
    GreaterThan,

    Minus,
    Bang,

    JumpNotTruthy,
    Jump,

    GetGlobal,
    SetGlobal,
    GetLocal,
    SetLocal,
    GetFree,
    GetBuiltin,

    Array,
    Hash,
    Index,

    Call,
    /// Wrap constants[operand 0] and the top (operand 1) stack values into a
    /// closure
    Closure,
    ReturnValue,
    Return,
}

impl OpCode {
    /// Byte widths of the operands following this opcode, in order.
    pub fn operand_widths(self) -> &'static [usize] {
        match self {
            OpCode::Constant
            | OpCode::JumpNotTruthy
            | OpCode::Jump
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::GetLocal
            | OpCode::SetLocal
            | OpCode::GetFree
            | OpCode::GetBuiltin
            | OpCode::Array
            | OpCode::Hash
            | OpCode::Call => &[OPERAND_WIDTH],
            OpCode::Closure => &[OPERAND_WIDTH, OPERAND_WIDTH],
            OpCode::Add
            | OpCode::Subtract
            | OpCode::Multiply
            | OpCode::Divide
            | OpCode::Pop
            | OpCode::True
            | OpCode::False
            | OpCode::Null
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::GreaterThan
            | OpCode::Minus
            | OpCode::Bang
            | OpCode::Index
            | OpCode::ReturnValue
            | OpCode::Return => &[],
        }
    }

    /// Human-readable name as used by the disassembler, e.g. `OpConstant`.
    pub fn name(self) -> String {
        format!("Op{}", <&'static str>::from(self))
    }
}

/// Decode an opcode byte, rejecting bytes outside the instruction set.
pub fn lookup(byte: u8) -> Result<OpCode> {
    OpCode::try_from(byte).map_err(|_| BytecodeError::UnknownOpcode(byte).into())
}

/// Encode an opcode and its operands into their byte representation: the
/// opcode byte followed by each operand big-endian in its declared width.
/// The caller must supply exactly as many operands as the opcode declares.
pub fn make(op: OpCode, operands: &[usize]) -> Result<Vec<u8>> {
    let widths = op.operand_widths();
    debug_assert_eq!(operands.len(), widths.len());

    let mut instruction = Vec::with_capacity(1 + widths.iter().sum::<usize>());
    instruction.push(op.into());
    for (operand, width) in operands.iter().zip(widths) {
        match width {
            2 => instruction.extend_from_slice(&(*operand as u16).to_be_bytes()),
            w => return Err(BytecodeError::UnsupportedOperandWidth(*w).into()),
        }
    }
    Ok(instruction)
}

/// Decode the operands of `op` from the bytes following its opcode byte.
/// Returns the operand values and the number of bytes consumed.
pub fn read_operands(op: OpCode, instructions: &[u8]) -> Result<(Vec<usize>, usize)> {
    let mut operands = Vec::with_capacity(op.operand_widths().len());
    let mut offset = 0;
    for width in op.operand_widths() {
        match width {
            2 => {
                if instructions.len() < offset + 2 {
                    return Err(BytecodeError::TruncatedOperand {
                        offset: instructions.len(),
                    }
                    .into());
                }
                operands.push(read_u16(&instructions[offset..]) as usize);
            }
            w => return Err(BytecodeError::UnsupportedOperandWidth(*w).into()),
        }
        offset += width;
    }
    Ok((operands, offset))
}

/// Read a big-endian u16 from the front of `instructions`. The compiler only
/// ever emits whole instructions, so the VM's operand reads are in bounds by
/// construction.
pub fn read_u16(instructions: &[u8]) -> u16 {
    u16::from_be_bytes([instructions[0], instructions[1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FiddleError;

    #[test]
    fn make_is_byte_exact() {
        let instruction = make(OpCode::Constant, &[65534]).unwrap();
        assert_eq!(instruction, vec![0x00, 0xFF, 0xFE]);
    }

    #[test]
    fn make_encodes_every_operand_big_endian() {
        let cases: &[(OpCode, &[usize], &[u8])] = &[
            (OpCode::Constant, &[65535], &[OpCode::Constant as u8, 255, 255]),
            (OpCode::GetLocal, &[255], &[OpCode::GetLocal as u8, 0, 255]),
            (
                OpCode::Closure,
                &[65534, 255],
                &[OpCode::Closure as u8, 255, 254, 0, 255],
            ),
            (OpCode::Add, &[], &[OpCode::Add as u8]),
        ];
        for (op, operands, expected) in cases {
            assert_eq!(make(*op, operands).unwrap(), *expected);
        }
    }

    #[test]
    fn read_operands_round_trips() {
        let cases: &[(OpCode, &[usize])] = &[
            (OpCode::Constant, &[65535]),
            (OpCode::JumpNotTruthy, &[12]),
            (OpCode::Closure, &[65535, 255]),
            (OpCode::Call, &[3]),
            (OpCode::Pop, &[]),
        ];
        for (op, operands) in cases {
            let instruction = make(*op, operands).unwrap();
            assert_eq!(lookup(instruction[0]).unwrap(), *op);
            let (decoded, read) = read_operands(*op, &instruction[1..]).unwrap();
            assert_eq!(read, instruction.len() - 1);
            assert_eq!(decoded, *operands);
        }
    }

    #[test]
    fn lookup_rejects_unknown_bytes() {
        assert_eq!(
            lookup(0xFF),
            Err(FiddleError::Bytecode(BytecodeError::UnknownOpcode(0xFF)))
        );
    }

    #[test]
    fn read_operands_rejects_truncated_stream() {
        let err = read_operands(OpCode::Constant, &[0x01]).unwrap_err();
        assert_eq!(
            err,
            FiddleError::Bytecode(BytecodeError::TruncatedOperand { offset: 1 })
        );
    }

    #[test]
    fn names_carry_the_op_prefix() {
        assert_eq!(OpCode::Constant.name(), "OpConstant");
        assert_eq!(OpCode::GreaterThan.name(), "OpGreaterThan");
        assert_eq!(OpCode::JumpNotTruthy.name(), "OpJumpNotTruthy");
    }
}
