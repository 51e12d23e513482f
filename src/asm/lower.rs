//! Pseudo-instruction lowering
//!
//! Expands every synthetic item into real RV32I instructions. The
//! two-word pseudos (`la`, `li`) write their second instruction into
//! the filler slot the parser reserved, so the output list has exactly
//! one instruction per input slot and every label offset computed
//! before lowering stays valid.

use super::parser::{AsmInstr, Pseudo};
use crate::instr::Instruction;
use crate::opcodes::InstrCode;

fn register(code: InstrCode, rd: u8, rs1: u8, rs2: u8) -> Instruction {
    Instruction::Register { code, rd, rs1, rs2 }
}

fn immediate(code: InstrCode, rd: u8, rs: u8, operand: i32) -> Instruction {
    Instruction::Immediate {
        code,
        rd,
        rs,
        operand,
    }
}

/// Lower a parsed item list to real instructions
pub fn lower(items: &[AsmInstr]) -> Vec<Instruction> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            AsmInstr::Real(instr) => out.push(*instr),
            // Consumed by the two-word pseudo just before it
            AsmInstr::Filler => {}
            AsmInstr::Pseudo(pseudo) => match *pseudo {
                Pseudo::BranchZero { code, rs, offset } => {
                    let real = match code {
                        InstrCode::Beqz => InstrCode::Beq,
                        _ => InstrCode::Bne,
                    };
                    out.push(Instruction::Branch {
                        code: real,
                        rs1: rs,
                        rs2: 0,
                        offset,
                    });
                }
                Pseudo::JumpAbs { offset } => out.push(Instruction::Jump {
                    code: InstrCode::Jal,
                    rd: 0,
                    offset,
                }),
                Pseudo::Call { offset } => out.push(Instruction::Jump {
                    code: InstrCode::Jal,
                    rd: 1,
                    offset,
                }),
                Pseudo::JumpReg { rs } => out.push(immediate(InstrCode::Jalr, 0, rs, 0)),
                Pseudo::Ret => out.push(immediate(InstrCode::Jalr, 0, 1, 0)),
                Pseudo::Nop => out.push(immediate(InstrCode::Addi, 0, 0, 0)),
                Pseudo::RegToReg { code, rd, rs } => out.push(match code {
                    InstrCode::Mv => register(InstrCode::Add, rd, 0, rs),
                    InstrCode::Neg => register(InstrCode::Sub, rd, 0, rs),
                    _ => immediate(InstrCode::Xori, rd, rs, -1),
                }),
                Pseudo::Set { code, rd, rs } => out.push(match code {
                    InstrCode::Seqz => immediate(InstrCode::Sltiu, rd, rs, 1),
                    _ => register(InstrCode::Sltu, rd, 0, rs),
                }),
                Pseudo::LoadAddress { rd, addr } => {
                    out.push(Instruction::UpperImmediate {
                        code: InstrCode::Auipc,
                        rd,
                        operand: addr & !0xfff,
                    });
                    out.push(immediate(InstrCode::Addi, rd, rd, addr & 0xfff));
                }
                Pseudo::LoadImm { rd, imm } => {
                    out.push(Instruction::UpperImmediate {
                        code: InstrCode::Lui,
                        rd,
                        operand: imm & !0xfff,
                    });
                    out.push(immediate(InstrCode::Addi, rd, rd, imm & 0xfff));
                }
            },
        }
    }
    out
}
