//! Disassembler formatter
//!
//! Renders decoded instructions as assembly source. Jump and branch
//! targets that land inside the buffer get auto-generated labels
//! (`L_0`, `L_1`, ...) emitted on their own line before the target
//! instruction, so the output feeds straight back into the assembler
//! and reproduces the same bytes. Each instruction line carries its
//! byte address in a trailing comment, padded to the width of the
//! largest address; targets outside the buffer keep their raw offset
//! and a warning note in that comment instead.

use itertools::Itertools;

use crate::decode::decode;
use crate::instr::Instruction;
use crate::opcodes::InstrCode;

const WARNING: &str = "WARNING: target outside of loaded code";

/// Auto-generated label names for every in-range jump/branch target,
/// in the order the targets are first seen
struct Labels {
    targets: Vec<i64>,
    ordinal_width: usize,
    code_len: i64,
}

impl Labels {
    fn harvest(instrs: &[Instruction]) -> Self {
        let code_len = instrs.len() as i64 * 4;
        let mut targets = Vec::new();
        for (index, instr) in instrs.iter().enumerate() {
            if let Some(offset) = instr.jump_offset() {
                let target = index as i64 * 4 + i64::from(offset);
                // Only word-aligned targets can name an instruction
                if (0..code_len).contains(&target)
                    && target % 4 == 0
                    && !targets.contains(&target)
                {
                    targets.push(target);
                }
            }
        }
        let ordinal_width = match targets.len() {
            0 | 1 => 1,
            n => (n - 1).to_string().len(),
        };
        Self {
            targets,
            ordinal_width,
            code_len,
        }
    }

    fn get(&self, target: i64) -> Option<String> {
        self.targets
            .iter()
            .position(|&t| t == target)
            .map(|ordinal| format!("L_{ordinal:0width$}", width = self.ordinal_width))
    }
}

/// Render the instruction text of one line, substituting a label for
/// an in-range jump/branch target. Returns the text and whether the
/// target (if any) fell outside the buffer.
fn render(instr: &Instruction, index: usize, labels: &Labels) -> (String, bool) {
    // The all-zero word and the canonical addi x0, x0, 0 are both nop
    match instr {
        Instruction::Error { raw: 0 } => return ("nop".to_owned(), false),
        Instruction::Immediate {
            code: InstrCode::Addi,
            rd: 0,
            rs: 0,
            operand: 0,
        } => return ("nop".to_owned(), false),
        _ => {}
    }
    if let Some(offset) = instr.jump_offset() {
        let target = index as i64 * 4 + i64::from(offset);
        if let Some(label) = labels.get(target) {
            let text = match instr {
                Instruction::Branch {
                    code, rs1, rs2, ..
                } => format!("{code} x{rs1}, x{rs2}, {label}"),
                Instruction::Jump { code, rd, .. } => format!("{code} x{rd}, {label}"),
                _ => unreachable!("only branches and jumps carry a jump offset"),
            };
            return (text, false);
        }
        let out_of_range = !(0..labels.code_len).contains(&target);
        return (instr.to_string(), out_of_range);
    }
    (instr.to_string(), false)
}

/// Disassemble a sequence of decoded instructions into source text
pub fn disassemble(instrs: &[Instruction]) -> String {
    let labels = Labels::harvest(instrs);
    let max_addr = (instrs.len().max(1) - 1) * 4;
    let addr_width = format!("{max_addr:x}").len();

    let mut lines = Vec::new();
    for (index, instr) in instrs.iter().enumerate() {
        let addr = index * 4;
        if let Some(label) = labels.get(addr as i64) {
            lines.push(format!("{label}:"));
        }
        let (text, out_of_range) = render(instr, index, &labels);
        let note = if out_of_range {
            format!(" {WARNING}")
        } else {
            String::new()
        };
        lines.push(format!(
            "{text:<28}# 0x{addr:0width$x}{note}",
            width = addr_width
        ));
    }
    lines.iter().map(|line| line.trim_end()).join("\n") + "\n"
}

/// Decode and disassemble raw machine words
pub fn disassemble_words(words: &[u32]) -> String {
    let instrs: Vec<Instruction> = words.iter().map(|&word| decode(word)).collect();
    disassemble(&instrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_label_generation() {
        // jal x0, +8; nop; nop -- the target is index 2
        let text = disassemble_words(&[0x0080_006f, 0x0000_0013, 0x0000_0013]);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("jal x0, L_0"));
        assert!(lines[0].ends_with("# 0x0"));
        assert!(lines[1].starts_with("nop"));
        assert!(lines[1].ends_with("# 0x4"));
        assert_eq!(lines[2], "L_0:");
        assert!(lines[3].starts_with("nop"));
        assert!(lines[3].ends_with("# 0x8"));
    }

    #[test]
    fn check_out_of_range_target_warns() {
        // jal x0, +16 in a two-word buffer
        let text = disassemble_words(&[0x0100_006f, 0x0000_0013]);
        assert!(text
            .lines()
            .next()
            .unwrap()
            .contains("jal x0, 16"));
        assert!(text.contains("WARNING: target outside of loaded code"));
    }

    #[test]
    fn check_zero_word_renders_nop() {
        let text = disassemble_words(&[0x0000_0000]);
        assert!(text.starts_with("nop"));
    }

    #[test]
    fn check_unknown_word_renders_bytes() {
        let text = disassemble_words(&[0xdead_beef]);
        assert!(text.starts_with("<ef be ad de>"));
    }

    #[test]
    fn check_backward_branch_label() {
        // addi x1, x1, 1; blt x1, x2, -4
        let text = disassemble_words(&[0x0010_8093, 0xfe20_cee3]);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "L_0:");
        assert!(lines[1].starts_with("addi x1, x1, 1"));
        assert!(lines[2].starts_with("blt x1, x2, L_0"));
    }

    #[test]
    fn check_addresses_pad_to_widest() {
        let words = vec![0x0000_0013; 5];
        let text = disassemble_words(&words);
        // Largest address is 0x10, so all addresses are two digits
        assert!(text.contains("# 0x00"));
        assert!(text.contains("# 0x10"));
    }
}
