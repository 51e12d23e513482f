//! Assembly parser
//!
//! Two-phase design over the token stream. Phase one walks statements,
//! recording labels and building one item per instruction; pseudo
//! forms become synthetic [`Pseudo`] items and label references are
//! remembered in a fix-up table with a placeholder offset. Phase two
//! patches every fix-up once all labels are known.
//!
//! Labels point at the *next* instruction to be emitted, and forward
//! references are allowed. Because `la` and `li` lower to two machine
//! words, the parser reserves a [`AsmInstr::Filler`] slot right after
//! them, so an instruction's index times four is its byte address both
//! before and after lowering.

use std::collections::HashMap;

use thiserror::Error;

use super::lexer::Token;
use super::AssembleError;
use crate::instr::Instruction;
use crate::opcodes::InstrCode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),
    #[error("unexpected {0} at start of statement")]
    UnexpectedToken(String),
    #[error("{mnemonic} expects {expected} operand(s), found {found}")]
    WrongOperandCount {
        mnemonic: InstrCode,
        expected: &'static str,
        found: usize,
    },
    #[error("{mnemonic}: invalid register name '{name}'")]
    InvalidRegister { mnemonic: InstrCode, name: String },
    #[error("{mnemonic}: expected {expected}, found {found}")]
    WrongOperandKind {
        mnemonic: InstrCode,
        expected: &'static str,
        found: String,
    },
    #[error("{mnemonic}: immediate {value} does not fit in {bits} bits")]
    ImmediateOutOfRange {
        mnemonic: InstrCode,
        value: i64,
        bits: u32,
    },
    #[error("missing comma between operands of {0}")]
    MissingComma(InstrCode),
    #[error("{0}: malformed offset(base) operand")]
    MalformedOffsetAndBase(InstrCode),
    #[error("label '{0}' defined more than once")]
    DuplicateLabel(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("undefined label '{name}' referenced by instruction {index}")]
    Undefined { name: String, index: usize },
}

/// One parsed statement slot. Synthetic forms only live between the
/// parser and the lowering pass; the encoder never sees them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmInstr {
    Real(Instruction),
    Pseudo(Pseudo),
    /// Slot reserved after a two-word pseudo so that label arithmetic
    /// stays index-stable across lowering
    Filler,
}

/// The pseudo-instruction forms of the assembly language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    /// beqz / bnez
    BranchZero {
        code: InstrCode,
        rs: u8,
        offset: i32,
    },
    /// j
    JumpAbs { offset: i32 },
    /// call
    Call { offset: i32 },
    /// jr
    JumpReg { rs: u8 },
    /// la (two words; addr is an absolute byte address)
    LoadAddress { rd: u8, addr: i32 },
    /// li (two words)
    LoadImm { rd: u8, imm: i32 },
    /// mv / not / neg
    RegToReg { code: InstrCode, rd: u8, rs: u8 },
    /// seqz / snez
    Set { code: InstrCode, rd: u8, rs: u8 },
    Nop,
    Ret,
}

impl AsmInstr {
    /// Patch a resolved label into this item. Jump-like items take the
    /// pc-relative byte offset; `la` takes the absolute byte address.
    fn patch_label_target(&mut self, index: usize, target: usize) {
        let relative = ((target as i64 - index as i64) * 4) as i32;
        match self {
            AsmInstr::Real(instr) => instr.set_jump_offset(relative),
            AsmInstr::Pseudo(
                Pseudo::BranchZero { offset, .. }
                | Pseudo::JumpAbs { offset }
                | Pseudo::Call { offset },
            ) => *offset = relative,
            AsmInstr::Pseudo(Pseudo::LoadAddress { addr, .. }) => *addr = (target * 4) as i32,
            _ => {}
        }
    }
}

/// Resolve a register name: `x0`..`x31` or an ABI name
pub fn parse_register(name: &str) -> Option<u8> {
    let index = match name {
        "zero" => 0,
        "ra" => 1,
        "sp" => 2,
        "gp" => 3,
        "tp" => 4,
        "t0" => 5,
        "t1" => 6,
        "t2" => 7,
        "s0" | "fp" => 8,
        "s1" => 9,
        "a0" => 10,
        "a1" => 11,
        "a2" => 12,
        "a3" => 13,
        "a4" => 14,
        "a5" => 15,
        "a6" => 16,
        "a7" => 17,
        "s2" => 18,
        "s3" => 19,
        "s4" => 20,
        "s5" => 21,
        "s6" => 22,
        "s7" => 23,
        "s8" => 24,
        "s9" => 25,
        "s10" => 26,
        "s11" => 27,
        "t3" => 28,
        "t4" => 29,
        "t5" => 30,
        "t6" => 31,
        _ => {
            let digits = name.strip_prefix('x')?;
            let n: u8 = digits.parse().ok()?;
            return (n <= 31).then_some(n);
        }
    };
    Some(index)
}

struct Fixup {
    index: usize,
    label: String,
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    items: Vec<AsmInstr>,
    labels: HashMap<String, usize>,
    fixups: Vec<Fixup>,
}

/// Parse a token stream into the synthetic instruction list, with all
/// label references resolved
pub fn parse(tokens: &[Token]) -> Result<Vec<AsmInstr>, AssembleError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        items: Vec::new(),
        labels: HashMap::new(),
        fixups: Vec::new(),
    };
    parser.run()?;
    parser.resolve_labels()?;
    Ok(parser.items)
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Phase 1: the statement loop
    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(token) = self.peek().cloned() {
            match token {
                Token::Delim('\n') => {
                    self.bump();
                }
                Token::Ident(name) => {
                    self.bump();
                    if matches!(self.peek(), Some(Token::Delim(':'))) {
                        self.bump();
                        if self.labels.insert(name.clone(), self.items.len()).is_some() {
                            return Err(ParseError::DuplicateLabel(name));
                        }
                    } else {
                        let code = InstrCode::try_parse(&name)
                            .ok_or(ParseError::UnknownMnemonic(name))?;
                        self.parse_instruction(code)?;
                    }
                }
                other => return Err(ParseError::UnexpectedToken(format!("{other:?}"))),
            }
        }
        Ok(())
    }

    /// Phase 2: patch every recorded fix-up
    fn resolve_labels(&mut self) -> Result<(), LabelError> {
        for fixup in &self.fixups {
            let target = *self.labels.get(&fixup.label).ok_or(LabelError::Undefined {
                name: fixup.label.clone(),
                index: fixup.index,
            })?;
            self.items[fixup.index].patch_label_target(fixup.index, target);
        }
        Ok(())
    }

    /// Read operands until the end of the statement. The terminating
    /// newline is left in place so the statement loop consumes exactly
    /// one per instruction.
    fn read_operands(&mut self, code: InstrCode) -> Result<Vec<Token>, ParseError> {
        let mut operands = Vec::new();
        loop {
            if matches!(self.peek(), None | Some(Token::Delim('\n'))) {
                break;
            }
            operands.push(self.read_operand(code)?);
            match self.peek() {
                None | Some(Token::Delim('\n')) => break,
                Some(Token::Delim(',')) => {
                    self.bump();
                }
                Some(_) => return Err(ParseError::MissingComma(code)),
            }
        }
        Ok(operands)
    }

    /// Read one operand, folding `number ( ident )` into a single
    /// OffsetAndBase token
    fn read_operand(&mut self, code: InstrCode) -> Result<Token, ParseError> {
        match self.bump() {
            Some(Token::Ident(name)) => Ok(Token::Ident(name)),
            Some(Token::Number(n)) => {
                if !matches!(self.peek(), Some(Token::Delim('('))) {
                    return Ok(Token::Number(n));
                }
                self.bump();
                let base = match self.bump() {
                    Some(Token::Ident(base)) => base,
                    _ => return Err(ParseError::MalformedOffsetAndBase(code)),
                };
                match self.bump() {
                    Some(Token::Delim(')')) => Ok(Token::OffsetAndBase(n, base)),
                    _ => Err(ParseError::MalformedOffsetAndBase(code)),
                }
            }
            other => Err(ParseError::WrongOperandKind {
                mnemonic: code,
                expected: "a register, immediate or label",
                found: format!("{other:?}"),
            }),
        }
    }

    fn parse_instruction(&mut self, code: InstrCode) -> Result<(), ParseError> {
        let operands = self.read_operands(code)?;
        if code.is_pseudo() {
            return self.build_pseudo(code, &operands);
        }
        let instr = self.build_real(code, &operands)?;
        self.items.push(AsmInstr::Real(instr));
        Ok(())
    }

    fn build_real(&mut self, code: InstrCode, operands: &[Token]) -> Result<Instruction, ParseError> {
        if code.is_reg_type() {
            let [rd, rs1, rs2] = expect_count::<3>(code, operands, "3")?;
            return Ok(Instruction::Register {
                code,
                rd: register(code, rd)?,
                rs1: register(code, rs1)?,
                rs2: register(code, rs2)?,
            });
        }
        if code.is_branch_type() {
            let [rs1, rs2, target] = expect_count::<3>(code, operands, "3")?;
            let offset = self.target_operand(code, target, 13)?;
            return Ok(Instruction::Branch {
                code,
                rs1: register(code, rs1)?,
                rs2: register(code, rs2)?,
                offset,
            });
        }
        if code.is_jump_type() {
            let [rd, target] = expect_count::<2>(code, operands, "2")?;
            let offset = self.target_operand(code, target, 21)?;
            return Ok(Instruction::Jump {
                code,
                rd: register(code, rd)?,
                offset,
            });
        }
        if code.is_upper_type() {
            let [rd, imm] = expect_count::<2>(code, operands, "2")?;
            let value = immediate(code, imm, 20)?;
            return Ok(Instruction::UpperImmediate {
                code,
                rd: register(code, rd)?,
                operand: ((value as i64) << 12) as i32,
            });
        }
        if code.is_store_type() {
            return match operands {
                [rs, Token::OffsetAndBase(offset, base)] => Ok(Instruction::Store {
                    code,
                    rbase: register_name(code, base)?,
                    rs: register(code, rs)?,
                    offset: check_range(code, *offset, 12)?,
                }),
                [rbase, rs, offset] => Ok(Instruction::Store {
                    code,
                    rbase: register(code, rbase)?,
                    rs: register(code, rs)?,
                    offset: immediate(code, offset, 12)?,
                }),
                _ => Err(ParseError::WrongOperandCount {
                    mnemonic: code,
                    expected: "2 or 3",
                    found: operands.len(),
                }),
            };
        }
        // Immediate-type: system and fence forms are bare, loads and
        // jalr additionally accept the offset(base) form
        match code {
            InstrCode::Ecall | InstrCode::Ebreak | InstrCode::Fence | InstrCode::FenceI => {
                expect_count::<0>(code, operands, "0")?;
                Ok(Instruction::Immediate {
                    code,
                    rd: 0,
                    rs: 0,
                    operand: if code == InstrCode::Ebreak { 1 } else { 0 },
                })
            }
            code if code.is_load() || code == InstrCode::Jalr => match operands {
                [rd, rs, imm] => Ok(Instruction::Immediate {
                    code,
                    rd: register(code, rd)?,
                    rs: register(code, rs)?,
                    operand: immediate(code, imm, 12)?,
                }),
                [rd, Token::OffsetAndBase(offset, base)] => Ok(Instruction::Immediate {
                    code,
                    rd: register(code, rd)?,
                    rs: register_name(code, base)?,
                    operand: check_range(code, *offset, 12)?,
                }),
                _ => Err(ParseError::WrongOperandCount {
                    mnemonic: code,
                    expected: "2 or 3",
                    found: operands.len(),
                }),
            },
            code => {
                let bits = if code.is_short_imm() { 5 } else { 12 };
                let [rd, rs, imm] = expect_count::<3>(code, operands, "3")?;
                Ok(Instruction::Immediate {
                    code,
                    rd: register(code, rd)?,
                    rs: register(code, rs)?,
                    operand: immediate(code, imm, bits)?,
                })
            }
        }
    }

    fn build_pseudo(&mut self, code: InstrCode, operands: &[Token]) -> Result<(), ParseError> {
        let pseudo = match code {
            InstrCode::Mv | InstrCode::Not | InstrCode::Neg => {
                let [rd, rs] = expect_count::<2>(code, operands, "2")?;
                Pseudo::RegToReg {
                    code,
                    rd: register(code, rd)?,
                    rs: register(code, rs)?,
                }
            }
            InstrCode::Seqz | InstrCode::Snez => {
                let [rd, rs] = expect_count::<2>(code, operands, "2")?;
                Pseudo::Set {
                    code,
                    rd: register(code, rd)?,
                    rs: register(code, rs)?,
                }
            }
            InstrCode::Nop => {
                expect_count::<0>(code, operands, "0")?;
                Pseudo::Nop
            }
            InstrCode::Ret => {
                expect_count::<0>(code, operands, "0")?;
                Pseudo::Ret
            }
            InstrCode::Jr => {
                let [rs] = expect_count::<1>(code, operands, "1")?;
                Pseudo::JumpReg {
                    rs: register(code, rs)?,
                }
            }
            InstrCode::J => {
                let [target] = expect_count::<1>(code, operands, "1")?;
                let offset = self.target_operand(code, target, 21)?;
                Pseudo::JumpAbs { offset }
            }
            InstrCode::Call => {
                let [target] = expect_count::<1>(code, operands, "1")?;
                let offset = self.target_operand(code, target, 21)?;
                Pseudo::Call { offset }
            }
            InstrCode::Beqz | InstrCode::Bnez => {
                let [rs, target] = expect_count::<2>(code, operands, "2")?;
                let rs = register(code, rs)?;
                let offset = self.target_operand(code, target, 13)?;
                Pseudo::BranchZero { code, rs, offset }
            }
            InstrCode::Li => {
                let [rd, imm] = expect_count::<2>(code, operands, "2")?;
                Pseudo::LoadImm {
                    rd: register(code, rd)?,
                    imm: immediate(code, imm, 32)?,
                }
            }
            InstrCode::La => {
                let [rd, addr] = expect_count::<2>(code, operands, "2")?;
                let rd = register(code, rd)?;
                let addr = self.target_operand(code, addr, 32)?;
                Pseudo::LoadAddress { rd, addr }
            }
            _ => unreachable!("build_pseudo is only called for pseudo codes"),
        };
        self.items.push(AsmInstr::Pseudo(pseudo));
        if matches!(code, InstrCode::Li | InstrCode::La) {
            self.items.push(AsmInstr::Filler);
        }
        Ok(())
    }

    /// A branch/jump target: either a numeric offset (range-checked)
    /// or a label reference resolved in phase 2
    fn target_operand(
        &mut self,
        code: InstrCode,
        token: &Token,
        bits: u32,
    ) -> Result<i32, ParseError> {
        match token {
            Token::Number(n) => check_range(code, *n, bits),
            Token::Ident(label) => {
                self.fixups.push(Fixup {
                    index: self.items.len(),
                    label: label.clone(),
                });
                Ok(0)
            }
            other => Err(ParseError::WrongOperandKind {
                mnemonic: code,
                expected: "an offset or label",
                found: format!("{other:?}"),
            }),
        }
    }
}

/// Check that exactly N operands were supplied and view them as an array
fn expect_count<'a, const N: usize>(
    code: InstrCode,
    operands: &'a [Token],
    expected: &'static str,
) -> Result<&'a [Token; N], ParseError> {
    operands
        .try_into()
        .map_err(|_| ParseError::WrongOperandCount {
            mnemonic: code,
            expected,
            found: operands.len(),
        })
}

fn register(code: InstrCode, token: &Token) -> Result<u8, ParseError> {
    match token {
        Token::Ident(name) => register_name(code, name),
        other => Err(ParseError::WrongOperandKind {
            mnemonic: code,
            expected: "a register",
            found: format!("{other:?}"),
        }),
    }
}

fn register_name(code: InstrCode, name: &str) -> Result<u8, ParseError> {
    parse_register(name).ok_or_else(|| ParseError::InvalidRegister {
        mnemonic: code,
        name: name.to_owned(),
    })
}

fn immediate(code: InstrCode, token: &Token, bits: u32) -> Result<i32, ParseError> {
    match token {
        Token::Number(n) => check_range(code, *n, bits),
        other => Err(ParseError::WrongOperandKind {
            mnemonic: code,
            expected: "an immediate",
            found: format!("{other:?}"),
        }),
    }
}

/// An N-bit immediate accepts both its signed and unsigned spellings:
/// -2^(N-1) ..= 2^N - 1
fn check_range(code: InstrCode, value: i64, bits: u32) -> Result<i32, ParseError> {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << bits) - 1;
    if (min..=max).contains(&value) {
        Ok(value as i32)
    } else {
        Err(ParseError::ImmediateOutOfRange {
            mnemonic: code,
            value,
            bits,
        })
    }
}
