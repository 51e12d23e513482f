//! Instruction decoder
//!
//! The inverse of [`crate::encode`]. Decoding is total: any 32-bit
//! word decodes to *something*, with unrecognised encodings coming
//! back as [`Instruction::Error`] carrying the raw word. Only the
//! execution engine decides whether that is fatal.
//!
//! A word decodes to a real instruction only if re-encoding that
//! instruction reproduces the word bit-exactly, which is what keeps
//! the encode/decode round trip tight (non-canonical funct7 bits, for
//! example, are rejected rather than ignored).

use crate::instr::Instruction;
use crate::opcodes::*;
use crate::utils::{bit_range, sign_extend_to_i32};

/// Makes a function called field_name which extracts
/// instr[end:start] (verilog notation) from a 32-bit word.
macro_rules! make_field_getter {
    ($field_name:ident, $end:expr, $start:expr) => {
        fn $field_name(instr: u32) -> u32 {
            bit_range(instr, $end, $start)
        }
    };
}

make_field_getter!(opcode_field, 6, 0);
make_field_getter!(rd_field, 11, 7);
make_field_getter!(funct3_field, 14, 12);
make_field_getter!(rs1_field, 19, 15);
make_field_getter!(rs2_field, 24, 20);
make_field_getter!(funct7_field, 31, 25);

/// Sign-extended 12-bit immediate of an I-type instruction
fn imm_itype(instr: u32) -> i32 {
    sign_extend_to_i32(bit_range(instr, 31, 20), 12)
}

/// Sign-extended 12-bit immediate of an S-type instruction,
/// reassembled from the funct7 and rd fields
fn imm_stype(instr: u32) -> i32 {
    let imm = (funct7_field(instr) << 5) | rd_field(instr);
    sign_extend_to_i32(imm, 12)
}

/// Sign-extended 13-bit immediate of a B-type instruction
fn imm_btype(instr: u32) -> i32 {
    let imm12 = bit_range(instr, 31, 31);
    let imm11 = bit_range(instr, 7, 7);
    let imm10_5 = bit_range(instr, 30, 25);
    let imm4_1 = bit_range(instr, 11, 8);
    let imm = (imm12 << 12) | (imm11 << 11) | (imm10_5 << 5) | (imm4_1 << 1);
    sign_extend_to_i32(imm, 13)
}

/// Sign-extended 21-bit offset of a J-type instruction
fn imm_jtype(instr: u32) -> i32 {
    let imm20 = bit_range(instr, 31, 31);
    let imm19_12 = bit_range(instr, 19, 12);
    let imm11 = bit_range(instr, 20, 20);
    let imm10_1 = bit_range(instr, 30, 21);
    let imm = (imm20 << 20) | (imm19_12 << 12) | (imm11 << 11) | (imm10_1 << 1);
    sign_extend_to_i32(imm, 21)
}

/// Upper immediate in its pre-shifted form, signed via bit 31
fn imm_utype(instr: u32) -> i32 {
    (instr & 0xffff_f000) as i32
}

/// Decode a 32-bit word into an instruction. Never fails; unknown
/// encodings decode to [`Instruction::Error`].
pub fn decode(word: u32) -> Instruction {
    let rd = rd_field(word) as u8;
    let rs1 = rs1_field(word) as u8;
    let rs2 = rs2_field(word) as u8;
    let funct3 = funct3_field(word);
    let funct7 = funct7_field(word);
    let unknown = Instruction::Error { raw: word };

    match opcode_field(word) {
        OP => {
            let code = match (funct3, funct7) {
                (FUNCT3_ADD, FUNCT7_ZERO) => InstrCode::Add,
                (FUNCT3_ADD, FUNCT7_SUB) => InstrCode::Sub,
                (FUNCT3_SLL, FUNCT7_ZERO) => InstrCode::Sll,
                (FUNCT3_SLT, FUNCT7_ZERO) => InstrCode::Slt,
                (FUNCT3_SLTU, FUNCT7_ZERO) => InstrCode::Sltu,
                (FUNCT3_XOR, FUNCT7_ZERO) => InstrCode::Xor,
                (FUNCT3_SRL, FUNCT7_ZERO) => InstrCode::Srl,
                (FUNCT3_SRL, FUNCT7_SRA) => InstrCode::Sra,
                (FUNCT3_OR, FUNCT7_ZERO) => InstrCode::Or,
                (FUNCT3_AND, FUNCT7_ZERO) => InstrCode::And,
                _ => return unknown,
            };
            Instruction::Register { code, rd, rs1, rs2 }
        }
        OP_IMM => {
            let (code, operand) = match funct3 {
                FUNCT3_ADD => (InstrCode::Addi, imm_itype(word)),
                FUNCT3_SLT => (InstrCode::Slti, imm_itype(word)),
                FUNCT3_SLTU => (InstrCode::Sltiu, imm_itype(word)),
                FUNCT3_XOR => (InstrCode::Xori, imm_itype(word)),
                FUNCT3_OR => (InstrCode::Ori, imm_itype(word)),
                FUNCT3_AND => (InstrCode::Andi, imm_itype(word)),
                FUNCT3_SLL if funct7 == FUNCT7_ZERO => (InstrCode::Slli, rs2.into()),
                FUNCT3_SRL if funct7 == FUNCT7_ZERO => (InstrCode::Srli, rs2.into()),
                FUNCT3_SRL if funct7 == FUNCT7_SRA => (InstrCode::Srai, rs2.into()),
                _ => return unknown,
            };
            Instruction::Immediate {
                code,
                rd,
                rs: rs1,
                operand,
            }
        }
        OP_JALR if funct3 == 0b000 => Instruction::Immediate {
            code: InstrCode::Jalr,
            rd,
            rs: rs1,
            operand: imm_itype(word),
        },
        OP_LOAD => {
            let code = match funct3 {
                FUNCT3_B => InstrCode::Lb,
                FUNCT3_H => InstrCode::Lh,
                FUNCT3_W => InstrCode::Lw,
                FUNCT3_D => InstrCode::Ld,
                FUNCT3_BU => InstrCode::Lbu,
                FUNCT3_HU => InstrCode::Lhu,
                FUNCT3_WU => InstrCode::Lwu,
                _ => return unknown,
            };
            Instruction::Immediate {
                code,
                rd,
                rs: rs1,
                operand: imm_itype(word),
            }
        }
        OP_MISC_MEM => {
            let code = match funct3 {
                FUNCT3_FENCE => InstrCode::Fence,
                FUNCT3_FENCE_I => InstrCode::FenceI,
                _ => return unknown,
            };
            Instruction::Immediate {
                code,
                rd,
                rs: rs1,
                operand: imm_itype(word),
            }
        }
        OP_SYSTEM if funct3 == 0b000 => {
            let code = match bit_range(word, 31, 20) {
                0 => InstrCode::Ecall,
                1 => InstrCode::Ebreak,
                _ => return unknown,
            };
            Instruction::Immediate {
                code,
                rd,
                rs: rs1,
                operand: imm_itype(word),
            }
        }
        OP_STORE => {
            let code = match funct3 {
                FUNCT3_B => InstrCode::Sb,
                FUNCT3_H => InstrCode::Sh,
                FUNCT3_W => InstrCode::Sw,
                FUNCT3_D => InstrCode::Sd,
                _ => return unknown,
            };
            Instruction::Store {
                code,
                rbase: rs1,
                rs: rs2,
                offset: imm_stype(word),
            }
        }
        OP_BRANCH => {
            let code = match funct3 {
                FUNCT3_BEQ => InstrCode::Beq,
                FUNCT3_BNE => InstrCode::Bne,
                FUNCT3_BLT => InstrCode::Blt,
                FUNCT3_BGE => InstrCode::Bge,
                FUNCT3_BLTU => InstrCode::Bltu,
                FUNCT3_BGEU => InstrCode::Bgeu,
                _ => return unknown,
            };
            Instruction::Branch {
                code,
                rs1,
                rs2,
                offset: imm_btype(word),
            }
        }
        OP_LUI => Instruction::UpperImmediate {
            code: InstrCode::Lui,
            rd,
            operand: imm_utype(word),
        },
        OP_AUIPC => Instruction::UpperImmediate {
            code: InstrCode::Auipc,
            rd,
            operand: imm_utype(word),
        },
        OP_JAL => Instruction::Jump {
            code: InstrCode::Jal,
            rd,
            offset: imm_jtype(word),
        },
        _ => unknown,
    }
}
