use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use rv32vm::ecall::EcallTable;
use rv32vm::hart::Hart;
use rv32vm::memory::Bus;

#[derive(Parser)]
#[command(
    name = "rv32vm",
    version,
    about = "RV32IMAFD interpreter — run flat binaries on an emulated hart"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a flat binary image until a breakpoint, a fault, or the budget
    Run {
        /// Path to the image (raw binary)
        #[arg(short, long)]
        image: PathBuf,

        /// RAM size in KiB (default: 16 MiB)
        #[arg(short, long, default_value = "16384")]
        memory: u32,

        /// Load address (hex, default: 0x0)
        #[arg(long, default_value = "0x0")]
        load_addr: String,

        /// Entry pc (hex; defaults to the load address)
        #[arg(long)]
        entry: Option<String>,

        /// Stop after N instructions
        #[arg(long, default_value = "100000000")]
        max_insns: u64,
    },
}

fn parse_hex(s: &str) -> u32 {
    u32::from_str_radix(s.trim_start_matches("0x"), 16).expect("invalid hex address")
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            image,
            memory,
            load_addr,
            entry,
            max_insns,
        } => {
            let load = parse_hex(&load_addr);
            let entry = entry.as_deref().map(parse_hex).unwrap_or(load);

            let data = std::fs::read(&image).unwrap_or_else(|e| {
                eprintln!("failed to read {}: {e}", image.display());
                std::process::exit(1);
            });

            let bus = Arc::new(Bus::new(0, memory.saturating_mul(1024)));
            bus.load_binary(&data, load);
            log::info!(
                "loaded {} ({} bytes) at {:#010x}, entry {:#010x}",
                image.display(),
                data.len(),
                load,
                entry
            );

            let mut hart = Hart::new(Arc::clone(&bus), entry, 0, Arc::new(EcallTable::new()));
            hart.paused.store(false, Ordering::Relaxed);

            let outcome = loop {
                if hart.csrs.cycles >= max_insns {
                    break Ok(false);
                }
                match hart.step(1024) {
                    Ok(true) => break Ok(true),
                    Ok(false) => {}
                    Err(e) => break Err(e),
                }
            };

            match outcome {
                Ok(true) => log::info!("stopped at breakpoint"),
                Ok(false) => log::info!("instruction budget exhausted"),
                Err(e) => eprintln!("hart fault: {e}"),
            }

            println!(
                "pc = {:#010x}  cycles = {}  privilege = {:?}",
                hart.pc, hart.csrs.cycles, hart.privilege
            );
            for row in 0..8 {
                for col in 0..4 {
                    let i = row * 4 + col;
                    print!("x{i:<2} = {:08x}  ", hart.regs[i]);
                }
                println!();
            }
        }
    }
}
