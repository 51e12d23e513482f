//! Instruction encoder
//!
//! Serialises one [`Instruction`] into its 32-bit RV32I word. The
//! opcode, funct3 and funct7 fields are table-driven from the
//! [`InstrCode`] catalog; this module only knows how to shuffle the
//! operand bits into each of the R/I/S/B/U/J shapes.

use thiserror::Error;

use crate::instr::Instruction;
use crate::opcodes::InstrCode;
use crate::utils::{bit_range, low_bits};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("instruction {0} has no RV32I machine encoding")]
    Unencodable(InstrCode),
}

/// Make an I-type instruction. The immediate is masked to 12 bits.
fn itype(imm: u32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (imm & low_bits::<u32>(12)) << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | opcode
}

/// Make an U- or J-type instruction (for J-type, build the immediate
/// field with jtype_imm_field first)
fn ujtype(imm: u32, rd: u32, opcode: u32) -> u32 {
    (imm & low_bits::<u32>(20)) << 12 | rd << 7 | opcode
}

/// Make an R- or S-type instruction. These have the same field layout;
/// the meaning of a and b is:
///
/// R-type: a = funct7, b = rd
/// S-type: a = imm[11:5], b = imm[4:0]
fn rstype(a: u32, rs2: u32, rs1: u32, funct3: u32, b: u32, opcode: u32) -> u32 {
    a << 25 | rs2 << 20 | rs1 << 15 | funct3 << 12 | b << 7 | opcode
}

/// The shift-by-immediate instructions use I-type, but with the lower
/// 5 bits of the immediate holding the shift amount (shamt) and the
/// upper 7 bits distinguishing arithmetical from logical right shift.
fn shifts_imm_field(shamt: u32, upper: u32) -> u32 {
    (upper << 5) | bit_range(shamt, 4, 0)
}

/// Shuffle a byte offset into the 20-bit field of the U-type shape,
/// making it J-type
fn jtype_imm_field(offset: i32) -> u32 {
    let imm = offset as u32;
    let imm20 = bit_range(imm, 20, 20);
    let imm19_12 = bit_range(imm, 19, 12);
    let imm11 = bit_range(imm, 11, 11);
    let imm10_1 = bit_range(imm, 10, 1);
    (imm20 << 19) | (imm10_1 << 9) | (imm11 << 8) | imm19_12
}

/// Returns (a, b) suitable for use with rstype for the conditional
/// branch instructions (B-type)
fn btype_imm_fields(offset: i32) -> (u32, u32) {
    let imm = offset as u32;
    let imm12 = bit_range(imm, 12, 12);
    let imm11 = bit_range(imm, 11, 11);
    let imm10_5 = bit_range(imm, 10, 5);
    let imm4_1 = bit_range(imm, 4, 1);
    let a = (imm12 << 6) | imm10_5;
    let b = (imm4_1 << 1) | imm11;
    (a, b)
}

/// Encode one instruction as a 32-bit word.
///
/// Pseudo-instructions, the RV64 word operations and the `Error`
/// sentinel have no encoding and are rejected.
pub fn encode(instr: &Instruction) -> Result<u32, EncodeError> {
    let code = instr.code();
    let unencodable = || EncodeError::Unencodable(code);
    let word = match *instr {
        Instruction::Register { rd, rs1, rs2, .. } => {
            let opcode = code.opcode().ok_or_else(unencodable)?;
            let funct3 = code.funct3().ok_or_else(unencodable)?;
            rstype(
                code.funct7(),
                rs2.into(),
                rs1.into(),
                funct3,
                rd.into(),
                opcode,
            )
        }
        Instruction::Immediate {
            code, rd, rs, operand,
        } => {
            let opcode = code.opcode().ok_or_else(unencodable)?;
            let funct3 = code.funct3().ok_or_else(unencodable)?;
            let imm = match code {
                code if code.is_short_imm() => {
                    shifts_imm_field(operand as u32, code.funct7())
                }
                InstrCode::Ecall => 0,
                InstrCode::Ebreak => 1,
                _ => operand as u32,
            };
            itype(imm, rs.into(), funct3, rd.into(), opcode)
        }
        Instruction::Store {
            code,
            rbase,
            rs,
            offset,
        } => {
            let opcode = code.opcode().ok_or_else(unencodable)?;
            let funct3 = code.funct3().ok_or_else(unencodable)?;
            let imm = offset as u32;
            let imm11_5 = bit_range(imm, 11, 5);
            let imm4_0 = bit_range(imm, 4, 0);
            rstype(imm11_5, rs.into(), rbase.into(), funct3, imm4_0, opcode)
        }
        Instruction::Branch {
            code,
            rs1,
            rs2,
            offset,
        } => {
            let opcode = code.opcode().ok_or_else(unencodable)?;
            let funct3 = code.funct3().ok_or_else(unencodable)?;
            let (a, b) = btype_imm_fields(offset);
            rstype(a, rs2.into(), rs1.into(), funct3, b, opcode)
        }
        Instruction::UpperImmediate { code, rd, operand } => {
            let opcode = code.opcode().ok_or_else(unencodable)?;
            // The operand is carried pre-shifted; keep its upper 20 bits
            (operand as u32 & 0xffff_f000) | u32::from(rd) << 7 | opcode
        }
        Instruction::Jump { code, rd, offset } => {
            let opcode = code.opcode().ok_or_else(unencodable)?;
            ujtype(jtype_imm_field(offset), rd.into(), opcode)
        }
        Instruction::Error { .. } => return Err(unencodable()),
    };
    Ok(word)
}
