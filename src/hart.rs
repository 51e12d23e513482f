//! Single RISC-V hardware thread
//!
//! This is the simplest possible RISC-V hart: one privilege level, the
//! RV32I base only, memory fully readable and writable, and every trap
//! fatal to the execution environment. The initial state is a set of
//! register and memory values fixed when the [`Processor`] is built:
//! x2 (the stack pointer) starts at the memory length, everything else
//! at zero, and the program counter wherever the loader put it.
//!
//! [`Processor::step`] executes exactly one instruction and reports
//! whether execution should continue. Three conditions halt cleanly
//! rather than trap: the program counter reaching the end of memory,
//! fetching an all-zero word (unused memory is zero-initialised), and
//! a taken branch or jump landing on its own address, which can never
//! make progress again.
//!
//! `ecall` performs no system call here; it is acknowledged and
//! stepped over, as are `ebreak` and the fences.

pub mod memory;
pub mod registers;

use thiserror::Error;

use self::memory::{AccessError, Memory, Wordsize};
use self::registers::Registers;
use crate::decode::decode;
use crate::instr::Instruction;
use crate::opcodes::InstrCode;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("program counter 0x{pc:x} is outside memory of length 0x{len:x}")]
    ProgramCounterOutOfBounds { pc: u32, len: usize },
    #[error("instruction fetch at 0x{pc:x} is not 4-byte aligned")]
    MisalignedFetch { pc: u32 },
    #[error("branch or jump offset {offset} is not a multiple of 4")]
    MisalignedTarget { offset: i32 },
    #[error("invalid instruction 0x{raw:08x}")]
    InvalidInstruction { raw: u32 },
    #[error("{0} used a 64-bit memory access on a 32-bit hart")]
    SixtyFourBitOnly(InstrCode),
    #[error("instruction {0} is not implemented on this hart")]
    Unimplemented(InstrCode),
    #[error("memory access failed: {0}")]
    Access(#[from] AccessError),
}

/// Where the program counter goes after one instruction
enum Control {
    /// Fall through to pc + 4
    Next,
    /// The instruction assigned the pc itself
    Jump(u32),
}

/// A single hart plus the memory it owns
#[derive(Debug, Clone)]
pub struct Processor {
    registers: Registers,
    prev_registers: Registers,
    pc: u32,
    memory: Memory,
    trace: bool,
}

fn execute_register(
    registers: &mut Registers,
    code: InstrCode,
    rd: u8,
    rs1: u8,
    rs2: u8,
) -> Result<(), ExecutionError> {
    let src1 = registers.x(rs1);
    let src2 = registers.x(rs2);
    let shamt = (src2 & 0x1f) as u32;
    let value = match code {
        InstrCode::Add => src1.wrapping_add(src2),
        InstrCode::Sub => src1.wrapping_sub(src2),
        InstrCode::Sll => src1.wrapping_shl(shamt),
        InstrCode::Slt => (src1 < src2) as i32,
        InstrCode::Sltu => ((src1 as u32) < (src2 as u32)) as i32,
        InstrCode::Xor => src1 ^ src2,
        InstrCode::Srl => ((src1 as u32) >> shamt) as i32,
        InstrCode::Sra => src1 >> shamt,
        InstrCode::Or => src1 | src2,
        InstrCode::And => src1 & src2,
        // addw and friends: RV64-only tags
        other => return Err(ExecutionError::Unimplemented(other)),
    };
    registers.set_x(rd, value);
    Ok(())
}

/// Compute the width and extension of a load, read memory and place
/// the result in rd. The effective address is base + sign-extended
/// offset; out-of-bounds accesses are fatal.
fn execute_load(
    processor: &mut Processor,
    code: InstrCode,
    rd: u8,
    rs: u8,
    operand: i32,
) -> Result<(), ExecutionError> {
    let base = processor.registers.x(rs) as u32;
    let addr = base.wrapping_add(operand as u32);
    let value = match code {
        InstrCode::Lb => {
            let byte = processor.memory.read(addr, Wordsize::Byte)?;
            i32::from(byte as u8 as i8)
        }
        InstrCode::Lh => {
            let half = processor.memory.read(addr, Wordsize::Halfword)?;
            i32::from(half as u16 as i16)
        }
        InstrCode::Lw => {
            let word = processor.memory.read(addr, Wordsize::Word)?;
            word as u32 as i32
        }
        InstrCode::Lbu => {
            let byte = processor.memory.read(addr, Wordsize::Byte)?;
            byte as u8 as i32
        }
        InstrCode::Lhu => {
            let half = processor.memory.read(addr, Wordsize::Halfword)?;
            half as u16 as i32
        }
        other => return Err(ExecutionError::SixtyFourBitOnly(other)),
    };
    processor.registers.set_x(rd, value);
    Ok(())
}

fn execute_store(
    processor: &mut Processor,
    code: InstrCode,
    rbase: u8,
    rs: u8,
    offset: i32,
) -> Result<(), ExecutionError> {
    let base = processor.registers.x(rbase) as u32;
    let addr = base.wrapping_add(offset as u32);
    let value = u64::from(processor.registers.x(rs) as u32);
    let width = match code {
        InstrCode::Sb => Wordsize::Byte,
        InstrCode::Sh => Wordsize::Halfword,
        InstrCode::Sw => Wordsize::Word,
        other => return Err(ExecutionError::SixtyFourBitOnly(other)),
    };
    processor.memory.write(addr, value, width)?;
    Ok(())
}

fn branch_taken(registers: &Registers, code: InstrCode, rs1: u8, rs2: u8) -> bool {
    let src1 = registers.x(rs1);
    let src2 = registers.x(rs2);
    match code {
        InstrCode::Beq => src1 == src2,
        InstrCode::Bne => src1 != src2,
        InstrCode::Blt => src1 < src2,
        InstrCode::Bge => src1 >= src2,
        InstrCode::Bltu => (src1 as u32) < (src2 as u32),
        _ => (src1 as u32) >= (src2 as u32),
    }
}

impl Processor {
    /// Build a hart owning the given memory image. The stack pointer
    /// x2 starts at the memory length; the pc starts at zero (use
    /// [`Processor::set_pc`] to start elsewhere).
    pub fn new(memory: Vec<u8>) -> Self {
        let memory = Memory::new(memory);
        let mut registers = Registers::default();
        registers.set_x(2, memory.len() as i32);
        Self {
            registers,
            prev_registers: registers,
            pc: 0,
            memory,
            trace: false,
        }
    }

    pub fn pc(&self) -> u32 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.pc = pc;
    }

    /// Read the value of register xn
    pub fn x(&self, n: u8) -> i32 {
        self.registers.x(n)
    }

    /// Write the value of register xn (writes to x0 are discarded)
    pub fn set_x(&mut self, n: u8, value: i32) {
        self.registers.set_x(n, value);
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// The register file as it was before the last cycle, for
    /// change-highlighting displays
    pub fn prev_registers(&self) -> &Registers {
        &self.prev_registers
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Print each executed instruction along with its pc
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// Execute one instruction.
    ///
    /// Returns `Ok(false)` when the hart has halted cleanly: the pc
    /// reached the end of memory, an all-zero word was fetched, or a
    /// taken branch/jump targeted its own address. Everything else
    /// that stops execution is a fatal [`ExecutionError`].
    pub fn step(&mut self) -> Result<bool, ExecutionError> {
        self.prev_registers = self.registers;
        let len = self.memory.len();
        if u64::from(self.pc) == len as u64 {
            return Ok(false);
        }
        if self.pc % 4 != 0 {
            return Err(ExecutionError::MisalignedFetch { pc: self.pc });
        }
        if u64::from(self.pc) + 4 > len as u64 {
            return Err(ExecutionError::ProgramCounterOutOfBounds { pc: self.pc, len });
        }

        let raw = self.memory.read(self.pc, Wordsize::Word)? as u32;
        let instr = decode(raw);
        if self.trace {
            eprintln!("pc=0x{:08x} {}", self.pc, instr);
        }
        if let Instruction::Error { raw } = instr {
            // Unused memory is zero-initialised; an all-zero word ends
            // execution quietly
            return if raw == 0 {
                Ok(false)
            } else {
                Err(ExecutionError::InvalidInstruction { raw })
            };
        }
        if let Some(offset) = instr.jump_offset() {
            if offset % 4 != 0 {
                return Err(ExecutionError::MisalignedTarget { offset });
            }
        }

        let entry_pc = self.pc;
        match self.execute(&instr)? {
            Control::Next => {
                self.pc = entry_pc.wrapping_add(4);
                Ok(true)
            }
            Control::Jump(target) => {
                self.pc = target;
                // A taken branch or jump that lands on itself can
                // never make progress
                Ok(target != entry_pc)
            }
        }
    }

    /// Step until the hart halts. Returns the number of cycles run,
    /// counting the halting cycle.
    pub fn run(&mut self) -> Result<u64, ExecutionError> {
        let mut mcycle = 0;
        loop {
            mcycle += 1;
            if !self.step()? {
                return Ok(mcycle);
            }
        }
    }

    fn execute(&mut self, instr: &Instruction) -> Result<Control, ExecutionError> {
        match *instr {
            Instruction::Register { code, rd, rs1, rs2 } => {
                execute_register(&mut self.registers, code, rd, rs1, rs2)?;
                Ok(Control::Next)
            }
            Instruction::Immediate {
                code,
                rd,
                rs,
                operand,
            } => self.execute_immediate(code, rd, rs, operand),
            Instruction::Store {
                code,
                rbase,
                rs,
                offset,
            } => {
                execute_store(self, code, rbase, rs, offset)?;
                Ok(Control::Next)
            }
            Instruction::Branch {
                code,
                rs1,
                rs2,
                offset,
            } => {
                if branch_taken(&self.registers, code, rs1, rs2) {
                    Ok(Control::Jump(self.pc.wrapping_add(offset as u32)))
                } else {
                    Ok(Control::Next)
                }
            }
            Instruction::UpperImmediate { code, rd, operand } => {
                // The operand arrives pre-shifted
                let value = match code {
                    InstrCode::Lui => operand,
                    _ => self.pc.wrapping_add(operand as u32) as i32,
                };
                self.registers.set_x(rd, value);
                Ok(Control::Next)
            }
            Instruction::Jump { rd, offset, .. } => {
                let return_address = self.pc.wrapping_add(4);
                self.registers.set_x(rd, return_address as i32);
                Ok(Control::Jump(self.pc.wrapping_add(offset as u32)))
            }
            Instruction::Error { raw } => Err(ExecutionError::InvalidInstruction { raw }),
        }
    }

    fn execute_immediate(
        &mut self,
        code: InstrCode,
        rd: u8,
        rs: u8,
        operand: i32,
    ) -> Result<Control, ExecutionError> {
        let src = self.registers.x(rs);
        let shamt = (operand & 0x1f) as u32;
        let value = match code {
            InstrCode::Addi => src.wrapping_add(operand),
            InstrCode::Slti => (src < operand) as i32,
            InstrCode::Sltiu => ((src as u32) < (operand as u32)) as i32,
            InstrCode::Xori => src ^ operand,
            InstrCode::Ori => src | operand,
            InstrCode::Andi => src & operand,
            InstrCode::Slli => src.wrapping_shl(shamt),
            InstrCode::Srli => ((src as u32) >> shamt) as i32,
            InstrCode::Srai => src >> shamt,
            InstrCode::Jalr => {
                let return_address = self.pc.wrapping_add(4);
                let target = (src as u32).wrapping_add(operand as u32);
                self.registers.set_x(rd, return_address as i32);
                return Ok(Control::Jump(target));
            }
            code if code.is_load() => {
                execute_load(self, code, rd, rs, operand)?;
                return Ok(Control::Next);
            }
            // ecall, ebreak, fence, fence.i: acknowledged, no effect
            _ => return Ok(Control::Next),
        };
        self.registers.set_x(rd, value);
        Ok(Control::Next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    fn processor_for(source: &str, memory_len: usize) -> Processor {
        let image = assemble(source).unwrap();
        assert!(image.len() <= memory_len);
        let mut memory = vec![0; memory_len];
        memory[..image.len()].copy_from_slice(&image);
        Processor::new(memory)
    }

    #[test]
    fn check_initial_state() {
        let processor = Processor::new(vec![0; 64]);
        assert_eq!(processor.pc(), 0);
        assert_eq!(processor.x(2), 64);
        for n in (0..32).filter(|&n| n != 2) {
            assert_eq!(processor.x(n), 0);
        }
    }

    #[test]
    fn check_step_advances_pc_and_registers() {
        let mut processor = processor_for("addi x1, x0, 7\nadd x3, x1, x1", 64);
        assert!(processor.step().unwrap());
        assert_eq!(processor.pc(), 4);
        assert_eq!(processor.x(1), 7);
        assert_eq!(processor.prev_registers().x(1), 0);
        assert!(processor.step().unwrap());
        assert_eq!(processor.x(3), 14);
    }

    #[test]
    fn check_halt_on_zero_word() {
        let mut processor = processor_for("addi x1, x0, 1", 64);
        assert!(processor.step().unwrap());
        // The rest of memory is zero
        assert!(!processor.step().unwrap());
        assert_eq!(processor.pc(), 4);
    }

    #[test]
    fn check_halt_at_end_of_memory() {
        let mut processor = processor_for("nop\nnop", 8);
        assert!(processor.step().unwrap());
        assert!(processor.step().unwrap());
        assert!(!processor.step().unwrap());
        assert_eq!(processor.pc(), 8);
    }

    #[test]
    fn check_halt_on_self_jump() {
        let mut processor = processor_for("j 0", 64);
        assert!(!processor.step().unwrap());
        assert_eq!(processor.pc(), 0);
    }

    #[test]
    fn check_branch_taken_and_not_taken() {
        let mut processor = processor_for("beq x0, x0, 8\nnop\nbne x0, x0, -8", 64);
        assert!(processor.step().unwrap());
        assert_eq!(processor.pc(), 8);
        // bne x0, x0 is never taken; falls through
        assert!(processor.step().unwrap());
        assert_eq!(processor.pc(), 12);
    }

    #[test]
    fn check_signed_and_unsigned_compares() {
        let mut processor = Processor::new(vec![0; 16]);
        processor.set_x(1, -1);
        processor.set_x(2, 1);
        execute_register(&mut processor.registers, InstrCode::Slt, 3, 1, 2).unwrap();
        assert_eq!(processor.x(3), 1);
        // As unsigned, -1 is the largest value
        execute_register(&mut processor.registers, InstrCode::Sltu, 3, 1, 2).unwrap();
        assert_eq!(processor.x(3), 0);
    }

    #[test]
    fn check_shift_semantics() {
        let mut processor = Processor::new(vec![0; 16]);
        processor.set_x(1, -16);
        processor.set_x(2, 2);
        execute_register(&mut processor.registers, InstrCode::Sra, 3, 1, 2).unwrap();
        assert_eq!(processor.x(3), -4);
        execute_register(&mut processor.registers, InstrCode::Srl, 3, 1, 2).unwrap();
        assert_eq!(processor.x(3), (0xffff_fff0u32 >> 2) as i32);
        // Only the low five bits of rs2 count
        processor.set_x(2, 33);
        execute_register(&mut processor.registers, InstrCode::Sll, 3, 2, 2).unwrap();
        assert_eq!(processor.x(3), 66);
    }

    #[test]
    fn check_load_store_round_trip() {
        let mut processor = processor_for("sw x1, 16(x0)\nlw x4, 16(x0)", 64);
        processor.set_x(1, 0x1234_5678);
        processor.step().unwrap();
        processor.step().unwrap();
        assert_eq!(processor.x(4), 0x1234_5678);
    }

    #[test]
    fn check_load_sign_extension() {
        let mut memory = vec![0; 64];
        memory[32] = 0x80;
        let image = assemble("lb x1, 32(x0)\nlbu x3, 32(x0)").unwrap();
        memory[..image.len()].copy_from_slice(&image);
        let mut processor = Processor::new(memory);
        processor.step().unwrap();
        processor.step().unwrap();
        assert_eq!(processor.x(1), -128);
        assert_eq!(processor.x(3), 128);
    }

    #[test]
    fn check_access_violation_is_fatal() {
        let mut processor = processor_for("lw x1, 60(x0)", 64);
        assert!(matches!(
            processor.step(),
            Err(ExecutionError::Access(_))
        ));
    }

    #[test]
    fn check_invalid_instruction_is_fatal() {
        let mut memory = vec![0; 16];
        memory[..4].copy_from_slice(&0xffff_ffffu32.to_le_bytes());
        let mut processor = Processor::new(memory);
        assert_eq!(
            processor.step(),
            Err(ExecutionError::InvalidInstruction { raw: 0xffff_ffff })
        );
    }

    #[test]
    fn check_64_bit_ops_are_fatal() {
        let mut processor = processor_for("sd x1, 0(x0)", 64);
        assert_eq!(
            processor.step(),
            Err(ExecutionError::SixtyFourBitOnly(InstrCode::Sd))
        );
        let mut processor = processor_for("ld x1, 0(x0)", 64);
        assert_eq!(
            processor.step(),
            Err(ExecutionError::SixtyFourBitOnly(InstrCode::Ld))
        );
    }

    #[test]
    fn check_misaligned_branch_offset_is_fatal() {
        // beq x0, x0, 2: a multiple of 2 but not of 4
        let mut processor = processor_for("beq x0, x0, 2", 64);
        assert_eq!(
            processor.step(),
            Err(ExecutionError::MisalignedTarget { offset: 2 })
        );
    }

    #[test]
    fn check_x0_stays_zero() {
        let mut processor = processor_for("addi x0, x0, 5\nlui x0, 100", 64);
        processor.step().unwrap();
        assert_eq!(processor.x(0), 0);
        processor.step().unwrap();
        assert_eq!(processor.x(0), 0);
    }

    #[test]
    fn check_system_instructions_are_no_ops() {
        let mut processor = processor_for("ecall\nebreak\nfence\nfence.i", 64);
        for _ in 0..4 {
            assert!(processor.step().unwrap());
        }
        assert_eq!(processor.pc(), 16);
        for n in (0..32).filter(|&n| n != 2) {
            assert_eq!(processor.x(n), 0);
        }
    }

    #[test]
    fn check_jal_links_and_jumps() {
        let mut processor = processor_for("jal x1, 8\nnop\nnop", 64);
        assert!(processor.step().unwrap());
        assert_eq!(processor.pc(), 8);
        assert_eq!(processor.x(1), 4);
    }

    #[test]
    fn check_run_counts_cycles() {
        let mut processor = processor_for("nop\nnop\nnop", 12);
        // Three instructions plus the halting fall-off cycle
        assert_eq!(processor.run().unwrap(), 4);
    }
}
