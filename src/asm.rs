//! The assembler pipeline
//!
//! Source text goes through the lexer, the two-phase parser (which
//! resolves labels), the pseudo-instruction lowering pass, and finally
//! the encoder. The pipeline fails fast: the first error of any stage
//! aborts the assembly with a message naming the offending token or
//! mnemonic.

pub mod lexer;
pub mod lower;
pub mod parser;

use thiserror::Error;

use crate::encode::{encode, EncodeError};
use crate::instr::Instruction;

#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("lex error: {0}")]
    Lex(#[from] lexer::LexError),
    #[error("parse error: {0}")]
    Parse(#[from] parser::ParseError),
    #[error("label error: {0}")]
    Label(#[from] parser::LabelError),
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),
}

/// Assemble source text into real instructions (lowered, labels
/// resolved, not yet encoded)
pub fn assemble_instrs(source: &str) -> Result<Vec<Instruction>, AssembleError> {
    let tokens = lexer::lex(source)?;
    let items = parser::parse(&tokens)?;
    Ok(lower::lower(&items))
}

/// Assemble source text into 32-bit machine words
pub fn assemble_words(source: &str) -> Result<Vec<u32>, AssembleError> {
    assemble_instrs(source)?
        .iter()
        .map(|instr| encode(instr).map_err(AssembleError::from))
        .collect()
}

/// Assemble source text into a little-endian byte image
pub fn assemble(source: &str) -> Result<Vec<u8>, AssembleError> {
    let words = assemble_words(source)?;
    Ok(words.iter().flat_map(|word| word.to_le_bytes()).collect())
}
