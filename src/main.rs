use std::fs;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use clap_num::maybe_hex;

use minirv::asm::assemble;
use minirv::disasm::disassemble_words;
use minirv::hart::Processor;

/// RV32I assembler, disassembler and emulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Assemble a source file into raw little-endian machine words
    Asm {
        /// Path to the assembly source, or - for stdin
        input: String,
        /// Output path for the machine-code image
        #[arg(short, long, default_value = "out.bin")]
        output: PathBuf,
    },
    /// Disassemble a raw machine-code image
    Disasm {
        /// Path to the image, or - for stdin
        input: String,
        /// Byte-reverse each 4-byte group before decoding
        #[arg(long)]
        big_endian: bool,
    },
    /// Run a raw machine-code image on the emulator
    Run {
        /// Path to the image, or - for stdin
        input: String,
        /// Memory size in bytes (use 0x prefix for hexadecimal)
        #[arg(short, long, value_parser = maybe_hex::<u32>, default_value = "4096")]
        memory_size: u32,
        /// Initial program counter
        #[arg(short, long, value_parser = maybe_hex::<u32>, default_value = "0")]
        pc: u32,
        /// Print each instruction as it executes
        #[arg(short, long)]
        trace: bool,
        /// Byte-reverse each 4-byte group before loading
        #[arg(long)]
        big_endian: bool,
    },
}

fn read_input(path: &str) -> Result<Vec<u8>> {
    if path == "-" {
        let mut bytes = Vec::new();
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("reading stdin")?;
        Ok(bytes)
    } else {
        fs::read(path).with_context(|| format!("reading {path}"))
    }
}

/// Split an image into 32-bit words, honouring the input byte order
fn words_from_bytes(bytes: &[u8], big_endian: bool) -> Result<Vec<u32>> {
    if bytes.len() % 4 != 0 {
        bail!(
            "machine code length {} is not a multiple of 4 bytes",
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|chunk| {
            let chunk: [u8; 4] = chunk.try_into().expect("chunks_exact yields 4-byte chunks");
            if big_endian {
                u32::from_be_bytes(chunk)
            } else {
                u32::from_le_bytes(chunk)
            }
        })
        .collect())
}

fn print_registers(processor: &Processor) {
    for n in 0..32u8 {
        let value = processor.x(n);
        println!("x{n:<2} = 0x{:08x} ({value})", value as u32);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Asm { input, output } => {
            let source = String::from_utf8(read_input(&input)?)
                .with_context(|| format!("{input} is not valid UTF-8"))?;
            let image = assemble(&source)
                .with_context(|| format!("failed to assemble {input}"))?;
            fs::write(&output, &image)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("wrote {} bytes to {}", image.len(), output.display());
        }
        Command::Disasm { input, big_endian } => {
            let bytes = read_input(&input)?;
            let words = words_from_bytes(&bytes, big_endian)?;
            print!("{}", disassemble_words(&words));
        }
        Command::Run {
            input,
            memory_size,
            pc,
            trace,
            big_endian,
        } => {
            let bytes = read_input(&input)?;
            let words = words_from_bytes(&bytes, big_endian)?;
            let mut memory = vec![0u8; memory_size as usize];
            let image: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();
            if image.len() > memory.len() {
                bail!(
                    "image of {} bytes does not fit in a memory of {} bytes",
                    image.len(),
                    memory.len()
                );
            }
            memory[..image.len()].copy_from_slice(&image);

            let mut processor = Processor::new(memory);
            processor.set_pc(pc);
            processor.set_trace(trace);

            let mut mcycle: u64 = 0;
            loop {
                mcycle += 1;
                match processor.step() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(e) => bail!(
                        "execution failed at pc=0x{:x}, mcycle={mcycle}: {e}",
                        processor.pc()
                    ),
                }
            }
            println!(
                "halted at pc=0x{:x} after {mcycle} cycle(s)",
                processor.pc()
            );
            print_registers(&processor);
        }
    }
    Ok(())
}
