use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use cpu8_emulator::config::{parse_poke, RunConfig, ServerConfig};
use cpu8_emulator::console::render_step;
use cpu8_emulator::server::run_server;
use cpu8_emulator::{CpuError, InputSource, LineInput, ProgramImage, PromptedInput, CPU};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Opts {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a machine-code listing, reading READ input from stdin
    Run {
        /// Listing with one decimal byte per line
        #[arg(default_value = "MachineCode.mc")]
        program: PathBuf,

        /// Stop after this many instructions
        #[arg(long)]
        max_steps: Option<u64>,

        /// Pre-seed memory, e.g. `--poke 5=3`
        #[arg(long = "poke", value_name = "ADDR=VALUE", value_parser = parse_poke)]
        pokes: Vec<(u8, u8)>,

        /// Print each executed instruction as a JSON line
        #[arg(long)]
        json: bool,

        /// Only print the final state
        #[arg(short, long)]
        quiet: bool,
    },

    /// Host machines over HTTP
    Serve {
        #[arg(short, long, default_value = "127.0.0.1:3030")]
        listen: SocketAddr,

        #[arg(long, default_value_t = 10_000)]
        max_steps_per_request: u32,
    },
}

fn run(config: RunConfig) -> Result<(), Box<dyn std::error::Error>> {
    let program = ProgramImage::from_file(&config.program)?;
    let mut cpu = CPU::with_program(program);
    for &(address, value) in &config.pokes {
        cpu.memory_mut().write(address, value)?;
    }

    let mut input: Box<dyn InputSource> = if config.json || config.quiet {
        Box::new(LineInput::stdin())
    } else {
        Box::new(PromptedInput::new(LineInput::stdin(), std::io::stderr(), "Enter char value: "))
    };
    let summary = cpu.run(input.as_mut(), config.max_steps, |event| {
        if config.quiet {
            return;
        }
        if config.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => error!(%e, "cannot encode step event"),
            }
        } else {
            print!("{}", render_step(event));
        }
    })?;

    if !config.json {
        let regs = cpu.registers().snapshot();
        let flags = cpu.flags();
        println!(
            "{} after {} instructions: A {} B {} C {} D {} E {} | C {} Z {} V {} N {}",
            if summary.halted { "Halted" } else { "Stopped" },
            summary.steps_executed,
            regs.a,
            regs.b,
            regs.c,
            regs.d,
            regs.e,
            flags.carry(),
            flags.zero(),
            flags.overflow(),
            flags.negative(),
        );
    }
    Ok(())
}

// EX_SOFTWARE from sysexits.h
const INTERNAL_FAULT_EXIT: u8 = 70;

fn report(err: &(dyn std::error::Error + 'static)) -> ExitCode {
    match err.downcast_ref::<CpuError>() {
        Some(fault) if fault.is_internal() => {
            error!(pc = fault.pc, "internal arithmetic unit fault: {}", fault);
            ExitCode::from(INTERNAL_FAULT_EXIT)
        }
        Some(fault) => {
            error!(pc = fault.pc, "program fault: {}", fault);
            ExitCode::FAILURE
        }
        None => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    match opts.command {
        Command::Run {
            program,
            max_steps,
            pokes,
            json,
            quiet,
        } => {
            let config = RunConfig {
                program,
                max_steps,
                pokes,
                json,
                quiet,
            };
            if let Err(e) = run(config) {
                return report(&*e);
            }
        }
        Command::Serve {
            listen,
            max_steps_per_request,
        } => {
            let config = ServerConfig {
                listen,
                max_steps_per_request,
            };
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("cannot start runtime: {}", e);
                    return ExitCode::FAILURE;
                }
            };
            runtime.block_on(run_server(config));
        }
    }
    ExitCode::SUCCESS
}
