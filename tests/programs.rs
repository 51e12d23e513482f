//! End-to-end scenarios: assemble a program, run it to halt, check
//! the architectural state

use minirv::asm::assemble;
use minirv::hart::{ExecutionError, Processor};

fn load(source: &str, memory_len: usize) -> Processor {
    let image = assemble(source).unwrap();
    assert!(image.len() <= memory_len, "program does not fit");
    let mut memory = vec![0u8; memory_len];
    memory[..image.len()].copy_from_slice(&image);
    Processor::new(memory)
}

#[test]
fn fibonacci_of_six() {
    let source = "\
addi x5, x0, 6
addi x4, x0, 1
addi x2, x0, 0
addi x3, x0, 1
loop:
beq x4, x5, done
add x1, x2, x3
mv x2, x3
mv x3, x1
addi x4, x4, 1
j loop
done:
j done
";
    let mut processor = load(source, 4096);
    processor.run().unwrap();
    assert_eq!(processor.x(3), 8, "fib(6)");
    assert_eq!(processor.x(5), 6);
    assert_eq!(processor.x(4), 6);
}

#[test]
fn load_store_round_trip() {
    let source = "\
li x1, 0x1234
sw x1, 16(x0)
lw x2, 16(x0)
";
    let mut processor = load(source, 64);
    processor.run().unwrap();
    assert_eq!(processor.x(1), 0x1234);
    assert_eq!(processor.x(2), 0x1234);
}

#[test]
fn branch_backward_label_loop() {
    let source = "\
addi x2, x0, 5
loop:
addi x1, x1, 1
blt x1, x2, loop
";
    let mut processor = load(source, 64);
    let cycles = processor.run().unwrap();
    assert_eq!(processor.x(1), 5);
    // Five loop iterations, the lead-in, and the halting fetch
    assert_eq!(cycles, 1 + 2 * 5 + 1);
}

#[test]
fn auipc_jalr_self_jump_halts() {
    // auipc leaves the code base in x5; the jalr then targets its own
    // address, which the infinite-loop detection catches
    let source = "\
auipc x5, 0
jalr x0, x5, 4
";
    let mut processor = load(source, 64);
    assert!(processor.step().unwrap());
    assert_eq!(processor.x(5), 0);
    assert!(!processor.step().unwrap());
    assert_eq!(processor.pc(), 4);
}

#[test]
fn invalid_instruction_faults() {
    let mut memory = vec![0u8; 64];
    memory[..4].copy_from_slice(&0xffff_ffffu32.to_le_bytes());
    let mut processor = Processor::new(memory);
    assert_eq!(
        processor.run(),
        Err(ExecutionError::InvalidInstruction { raw: 0xffff_ffff })
    );
}

#[test]
fn halt_determinism_on_self_branch() {
    // A taken branch with offset zero halts on exactly that cycle
    let source = "\
addi x1, x0, 1
self: beq x1, x1, self
";
    let mut processor = load(source, 64);
    assert!(processor.step().unwrap());
    assert!(!processor.step().unwrap());
    assert_eq!(processor.pc(), 4);
}

#[test]
fn x0_invariant_over_many_steps() {
    let source = "\
addi x0, x0, 100
lui x0, 4
loop:
addi x1, x1, 1
addi x0, x1, 0
blt x1, x2, loop
";
    let mut processor = load(source, 256);
    processor.set_x(2, 50);
    loop {
        match processor.step() {
            Ok(true) => assert_eq!(processor.x(0), 0),
            Ok(false) => break,
            Err(e) => panic!("unexpected fault: {e}"),
        }
    }
    assert_eq!(processor.x(0), 0);
}

#[test]
fn pc_alignment_invariant() {
    let source = "\
addi x2, x0, 3
loop:
addi x1, x1, 1
blt x1, x2, loop
jal x0, 8
nop
nop
";
    let mut processor = load(source, 64);
    loop {
        assert_eq!(processor.pc() % 4, 0, "pc must stay 4-byte aligned");
        match processor.step() {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => panic!("unexpected fault: {e}"),
        }
    }
}

#[test]
fn stack_pointer_initialised_to_memory_length() {
    let source = "\
addi x2, x2, -4
sw x1, 0(x2)
lw x3, 0(x2)
";
    let mut processor = load(source, 4096);
    processor.set_x(1, 99);
    processor.run().unwrap();
    assert_eq!(processor.x(2), 4092);
    assert_eq!(processor.x(3), 99);
}

#[test]
fn call_and_ret() {
    let source = "\
call func
j done
func:
addi x3, x0, 42
ret
done:
j done
";
    let mut processor = load(source, 256);
    processor.run().unwrap();
    assert_eq!(processor.x(3), 42);
    assert_eq!(processor.x(1), 4, "call links the return address");
    // Halted on the self-jump at 'done' (byte address 16)
    assert_eq!(processor.pc(), 16);
}
