//! Mnemonic catalog and encoding tables
//!
//! Every mnemonic the toolchain understands lives in [`InstrCode`],
//! including the pseudo-instructions the assembler expands and the
//! RV64-only tags that are recognised but not executed. The enum is
//! laid out in contiguous category blocks so that the category
//! predicates are plain range comparisons.

use std::fmt;

// Major opcodes (RISC-V specification chapter 19)
pub const OP_LUI: u32 = 0b0110111;
pub const OP_AUIPC: u32 = 0b0010111;
pub const OP_JAL: u32 = 0b1101111;
pub const OP_JALR: u32 = 0b1100111;
pub const OP_IMM: u32 = 0b0010011;
pub const OP: u32 = 0b0110011;
pub const OP_BRANCH: u32 = 0b1100011;
pub const OP_LOAD: u32 = 0b0000011;
pub const OP_STORE: u32 = 0b0100011;
pub const OP_MISC_MEM: u32 = 0b0001111;
pub const OP_SYSTEM: u32 = 0b1110011;

// Conditional branches
pub const FUNCT3_BEQ: u32 = 0b000;
pub const FUNCT3_BNE: u32 = 0b001;
pub const FUNCT3_BLT: u32 = 0b100;
pub const FUNCT3_BGE: u32 = 0b101;
pub const FUNCT3_BLTU: u32 = 0b110;
pub const FUNCT3_BGEU: u32 = 0b111;

// Load and store widths
pub const FUNCT3_B: u32 = 0b000;
pub const FUNCT3_H: u32 = 0b001;
pub const FUNCT3_W: u32 = 0b010;
pub const FUNCT3_D: u32 = 0b011;
pub const FUNCT3_BU: u32 = 0b100;
pub const FUNCT3_HU: u32 = 0b101;
pub const FUNCT3_WU: u32 = 0b110;

// Register-immediate and register-register operations
pub const FUNCT3_ADD: u32 = 0b000;
pub const FUNCT3_SLL: u32 = 0b001;
pub const FUNCT3_SLT: u32 = 0b010;
pub const FUNCT3_SLTU: u32 = 0b011;
pub const FUNCT3_XOR: u32 = 0b100;
pub const FUNCT3_SRL: u32 = 0b101;
pub const FUNCT3_OR: u32 = 0b110;
pub const FUNCT3_AND: u32 = 0b111;

// fence and fence.i
pub const FUNCT3_FENCE: u32 = 0b000;
pub const FUNCT3_FENCE_I: u32 = 0b001;

pub const FUNCT7_ZERO: u32 = 0b0000000;
pub const FUNCT7_SUB: u32 = 0b0100000;
pub const FUNCT7_SRA: u32 = 0b0100000;

/// Every mnemonic known to the toolchain.
///
/// The declaration order is significant: variants are grouped into the
/// blocks pseudo / register / immediate / store / branch / upper /
/// jump, and the `is_*` predicates test membership by comparing against
/// the block boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstrCode {
    // Pseudo-instructions (expanded by the assembler, never encoded)
    Mv,
    Li,
    La,
    J,
    Jr,
    Ret,
    Nop,
    Call,
    Seqz,
    Snez,
    Not,
    Neg,
    Beqz,
    Bnez,
    // Register-register
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    // RV64 word operations: recognised tags, not implemented
    Addw,
    Subw,
    Sllw,
    Srlw,
    Sraw,
    // Register-immediate
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Jalr,
    Lb,
    Lh,
    Lw,
    Ld,
    Lbu,
    Lhu,
    Lwu,
    Fence,
    FenceI,
    Ecall,
    Ebreak,
    // Stores
    Sb,
    Sh,
    Sw,
    Sd,
    // Conditional branches
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    // Upper-immediate
    Lui,
    Auipc,
    // Unconditional jump
    Jal,
    /// Sentinel for unparseable mnemonics and undecodable words
    Error,
}

impl InstrCode {
    /// Map a source mnemonic to its code. Lower-case exact match only;
    /// `fence.i` is spelled with the dot.
    pub fn try_parse(text: &str) -> Option<InstrCode> {
        use InstrCode::*;
        let code = match text {
            "mv" => Mv,
            "li" => Li,
            "la" => La,
            "j" => J,
            "jr" => Jr,
            "ret" => Ret,
            "nop" => Nop,
            "call" => Call,
            "seqz" => Seqz,
            "snez" => Snez,
            "not" => Not,
            "neg" => Neg,
            "beqz" => Beqz,
            "bnez" => Bnez,
            "add" => Add,
            "sub" => Sub,
            "sll" => Sll,
            "slt" => Slt,
            "sltu" => Sltu,
            "xor" => Xor,
            "srl" => Srl,
            "sra" => Sra,
            "or" => Or,
            "and" => And,
            "addw" => Addw,
            "subw" => Subw,
            "sllw" => Sllw,
            "srlw" => Srlw,
            "sraw" => Sraw,
            "addi" => Addi,
            "slti" => Slti,
            "sltiu" => Sltiu,
            "xori" => Xori,
            "ori" => Ori,
            "andi" => Andi,
            "slli" => Slli,
            "srli" => Srli,
            "srai" => Srai,
            "jalr" => Jalr,
            "lb" => Lb,
            "lh" => Lh,
            "lw" => Lw,
            "ld" => Ld,
            "lbu" => Lbu,
            "lhu" => Lhu,
            "lwu" => Lwu,
            "fence" => Fence,
            "fence.i" => FenceI,
            "ecall" => Ecall,
            "ebreak" => Ebreak,
            "sb" => Sb,
            "sh" => Sh,
            "sw" => Sw,
            "sd" => Sd,
            "beq" => Beq,
            "bne" => Bne,
            "blt" => Blt,
            "bge" => Bge,
            "bltu" => Bltu,
            "bgeu" => Bgeu,
            "lui" => Lui,
            "auipc" => Auipc,
            "jal" => Jal,
            _ => return None,
        };
        Some(code)
    }

    pub fn is_pseudo(&self) -> bool {
        *self >= InstrCode::Mv && *self <= InstrCode::Bnez
    }

    pub fn is_reg_type(&self) -> bool {
        *self >= InstrCode::Add && *self <= InstrCode::Sraw
    }

    pub fn is_imm_type(&self) -> bool {
        *self >= InstrCode::Addi && *self <= InstrCode::Ebreak
    }

    pub fn is_store_type(&self) -> bool {
        *self >= InstrCode::Sb && *self <= InstrCode::Sd
    }

    pub fn is_branch_type(&self) -> bool {
        *self >= InstrCode::Beq && *self <= InstrCode::Bgeu
    }

    pub fn is_upper_type(&self) -> bool {
        *self == InstrCode::Lui || *self == InstrCode::Auipc
    }

    pub fn is_jump_type(&self) -> bool {
        *self == InstrCode::Jal
    }

    pub fn is_load(&self) -> bool {
        *self >= InstrCode::Lb && *self <= InstrCode::Lwu
    }

    /// Shift-by-immediate forms whose operand is a 5-bit shamt
    pub fn is_short_imm(&self) -> bool {
        *self >= InstrCode::Slli && *self <= InstrCode::Srai
    }

    /// Major opcode of a real (encodable) instruction
    pub fn opcode(&self) -> Option<u32> {
        use InstrCode::*;
        let op = match self {
            Add | Sub | Sll | Slt | Sltu | Xor | Srl | Sra | Or | And => OP,
            Addi | Slti | Sltiu | Xori | Ori | Andi | Slli | Srli | Srai => OP_IMM,
            Jalr => OP_JALR,
            Lb | Lh | Lw | Ld | Lbu | Lhu | Lwu => OP_LOAD,
            Fence | FenceI => OP_MISC_MEM,
            Ecall | Ebreak => OP_SYSTEM,
            Sb | Sh | Sw | Sd => OP_STORE,
            Beq | Bne | Blt | Bge | Bltu | Bgeu => OP_BRANCH,
            Lui => OP_LUI,
            Auipc => OP_AUIPC,
            Jal => OP_JAL,
            _ => return None,
        };
        Some(op)
    }

    pub fn funct3(&self) -> Option<u32> {
        use InstrCode::*;
        let funct3 = match self {
            Add | Sub => FUNCT3_ADD,
            Sll => FUNCT3_SLL,
            Slt => FUNCT3_SLT,
            Sltu => FUNCT3_SLTU,
            Xor => FUNCT3_XOR,
            Srl | Sra => FUNCT3_SRL,
            Or => FUNCT3_OR,
            And => FUNCT3_AND,
            Addi => FUNCT3_ADD,
            Slti => FUNCT3_SLT,
            Sltiu => FUNCT3_SLTU,
            Xori => FUNCT3_XOR,
            Ori => FUNCT3_OR,
            Andi => FUNCT3_AND,
            Slli => FUNCT3_SLL,
            Srli | Srai => FUNCT3_SRL,
            Jalr => 0b000,
            Lb => FUNCT3_B,
            Lh => FUNCT3_H,
            Lw => FUNCT3_W,
            Ld => FUNCT3_D,
            Lbu => FUNCT3_BU,
            Lhu => FUNCT3_HU,
            Lwu => FUNCT3_WU,
            Fence => FUNCT3_FENCE,
            FenceI => FUNCT3_FENCE_I,
            Ecall | Ebreak => 0b000,
            Sb => FUNCT3_B,
            Sh => FUNCT3_H,
            Sw => FUNCT3_W,
            Sd => FUNCT3_D,
            Beq => FUNCT3_BEQ,
            Bne => FUNCT3_BNE,
            Blt => FUNCT3_BLT,
            Bge => FUNCT3_BGE,
            Bltu => FUNCT3_BLTU,
            Bgeu => FUNCT3_BGEU,
            _ => return None,
        };
        Some(funct3)
    }

    /// funct7 is 0100000 for sub, sra and srai, zero for the other
    /// R-type and shift-immediate codes
    pub fn funct7(&self) -> u32 {
        match self {
            InstrCode::Sub | InstrCode::Sra | InstrCode::Srai => FUNCT7_SUB,
            _ => FUNCT7_ZERO,
        }
    }
}

impl fmt::Display for InstrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InstrCode::FenceI => "fence.i",
            InstrCode::Error => "<error>",
            other => {
                // All other mnemonics are the lower-cased variant name
                return write!(f, "{}", format!("{other:?}").to_lowercase());
            }
        };
        write!(f, "{text}")
    }
}
