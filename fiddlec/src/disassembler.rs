use crate::{
    error::{BytecodeError, FiddleError, Result},
    op_code::{lookup, read_operands},
};

/// Decode a full instruction stream into one line per instruction:
/// a 4-digit zero-padded byte offset, the opcode name, and the decoded
/// operand values, newline-joined with no trailing newline.
pub fn disassemble(instructions: &[u8]) -> Result<String> {
    let mut text = String::new();
    let mut offset = 0;
    while offset < instructions.len() {
        let op = lookup(instructions[offset])?;
        let (operands, read) =
            read_operands(op, &instructions[offset + 1..]).map_err(|e| match e {
                // Rebase the truncation point onto the full stream
                FiddleError::Bytecode(BytecodeError::TruncatedOperand { offset: at }) => {
                    BytecodeError::TruncatedOperand {
                        offset: offset + 1 + at,
                    }
                    .into()
                }
                other => other,
            })?;

        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(&format!("{:04} {}", offset, op.name()));
        for operand in operands {
            text.push_str(&format!(" {operand}"));
        }

        offset += 1 + read;
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op_code::{make, OpCode};

    fn concat(instructions: Vec<Vec<u8>>) -> Vec<u8> {
        instructions.into_iter().flatten().collect()
    }

    #[test]
    fn formats_offsets_names_and_operands() {
        let instructions = concat(vec![
            make(OpCode::Constant, &[1]).unwrap(),
            make(OpCode::Constant, &[2]).unwrap(),
            make(OpCode::Constant, &[65535]).unwrap(),
        ]);
        assert_eq!(
            disassemble(&instructions).unwrap(),
            "0000 OpConstant 1\n0003 OpConstant 2\n0006 OpConstant 65535"
        );
    }

    #[test]
    fn formats_mixed_arities() {
        let instructions = concat(vec![
            make(OpCode::Add, &[]).unwrap(),
            make(OpCode::GetLocal, &[1]).unwrap(),
            make(OpCode::Constant, &[2]).unwrap(),
            make(OpCode::Closure, &[65535, 255]).unwrap(),
        ]);
        assert_eq!(
            disassemble(&instructions).unwrap(),
            "0000 OpAdd\n0001 OpGetLocal 1\n0004 OpConstant 2\n0007 OpClosure 65535 255"
        );
    }

    #[test]
    fn empty_stream_is_empty_text() {
        assert_eq!(disassemble(&[]).unwrap(), "");
    }

    #[test]
    fn rejects_unknown_opcode() {
        let err = disassemble(&[0xAB]).unwrap_err();
        assert_eq!(
            err,
            FiddleError::Bytecode(BytecodeError::UnknownOpcode(0xAB))
        );
    }

    #[test]
    fn reports_truncation_at_stream_offset() {
        // OpConstant declares a 2-byte operand but only one byte follows.
        let mut instructions = make(OpCode::Add, &[]).unwrap();
        instructions.push(OpCode::Constant as u8);
        instructions.push(0x01);
        let err = disassemble(&instructions).unwrap_err();
        assert_eq!(
            err,
            FiddleError::Bytecode(BytecodeError::TruncatedOperand { offset: 3 })
        );
    }
}
