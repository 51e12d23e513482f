//! The instruction model shared by the assembler, decoder and hart
//!
//! Field names follow the instruction set reference: `rd` is the
//! destination, `rs`/`rs1`/`rs2` are sources, `rbase` is the base
//! address register of a store. Immediates and offsets are carried
//! sign-extended as `i32`, with one deliberate exception: the
//! upper-immediate operand of `lui`/`auipc` is stored *pre-shifted*
//! (low 12 bits zero), which is the value the instruction actually
//! loads.

use std::fmt;

use itertools::Itertools;

use crate::opcodes::InstrCode;

/// One RV32I instruction (or an undecodable word).
///
/// The six shapes correspond to the R/I/S/B/U/J encoding formats.
/// `Error` carries the raw 32-bit word that failed to decode, so the
/// disassembler can still render it and the hart can decide what to do
/// with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Register {
        code: InstrCode,
        rd: u8,
        rs1: u8,
        rs2: u8,
    },
    Immediate {
        code: InstrCode,
        rd: u8,
        rs: u8,
        operand: i32,
    },
    Store {
        code: InstrCode,
        rbase: u8,
        rs: u8,
        offset: i32,
    },
    Branch {
        code: InstrCode,
        rs1: u8,
        rs2: u8,
        offset: i32,
    },
    UpperImmediate {
        code: InstrCode,
        rd: u8,
        operand: i32,
    },
    Jump {
        code: InstrCode,
        rd: u8,
        offset: i32,
    },
    Error {
        raw: u32,
    },
}

impl Instruction {
    pub fn code(&self) -> InstrCode {
        match self {
            Instruction::Register { code, .. }
            | Instruction::Immediate { code, .. }
            | Instruction::Store { code, .. }
            | Instruction::Branch { code, .. }
            | Instruction::UpperImmediate { code, .. }
            | Instruction::Jump { code, .. } => *code,
            Instruction::Error { .. } => InstrCode::Error,
        }
    }

    /// The pc-relative byte offset of a jump-like (branch or jump)
    /// instruction, if this is one
    pub fn jump_offset(&self) -> Option<i32> {
        match self {
            Instruction::Branch { offset, .. } | Instruction::Jump { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Patch the offset of a jump-like instruction (used by label
    /// fix-up). No effect on other shapes.
    pub fn set_jump_offset(&mut self, new_offset: i32) {
        match self {
            Instruction::Branch { offset, .. } | Instruction::Jump { offset, .. } => {
                *offset = new_offset
            }
            _ => {}
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Register { code, rd, rs1, rs2 } => {
                write!(f, "{code} x{rd}, x{rs1}, x{rs2}")
            }
            Instruction::Immediate {
                code,
                rd,
                rs,
                operand,
            } => match code {
                InstrCode::Ecall | InstrCode::Ebreak | InstrCode::Fence | InstrCode::FenceI => {
                    write!(f, "{code}")
                }
                code if code.is_load() || *code == InstrCode::Jalr => {
                    write!(f, "{code} x{rd}, {operand}(x{rs})")
                }
                code => write!(f, "{code} x{rd}, x{rs}, {operand}"),
            },
            Instruction::Store {
                code,
                rbase,
                rs,
                offset,
            } => {
                write!(f, "{code} x{rs}, {offset}(x{rbase})")
            }
            Instruction::Branch {
                code,
                rs1,
                rs2,
                offset,
            } => {
                write!(f, "{code} x{rs1}, x{rs2}, {offset}")
            }
            Instruction::UpperImmediate { code, rd, operand } => {
                // Render the 20-bit source field, not the shifted value
                write!(f, "{code} x{rd}, {}", operand >> 12)
            }
            Instruction::Jump { code, rd, offset } => {
                write!(f, "{code} x{rd}, {offset}")
            }
            Instruction::Error { raw } => {
                let bytes = raw.to_le_bytes();
                write!(f, "<{}>", bytes.iter().map(|b| format!("{b:02x}")).join(" "))
            }
        }
    }
}
