//! Superscalar pipeline simulator CLI.
//!
//! Single entry point for running assembly benchmarks: loads an optional
//! JSON configuration, assembles the program, runs to the exit syscall or
//! the cycle limit, and prints the results (text table or JSON).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use mips_core::config::Config;
use mips_core::sim::loader;
use mips_core::Simulator;

#[derive(Parser, Debug)]
#[command(
    name = "sim",
    author,
    version,
    about = "Cycle-accurate superscalar out-of-order pipeline simulator",
    long_about = "Run a MIPS-like assembly program through a superscalar, \
out-of-order core with renaming, reservation stations, a reorder buffer, \
branch prediction, and split I/D caches.\n\nExamples:\n  \
sim run -f benchmarks/matmul.asm\n  \
sim run -f benchmarks/fib.asm --config cfg.json --json"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run an assembly program.
    Run {
        /// Assembly file to execute.
        #[arg(short, long)]
        file: PathBuf,

        /// JSON configuration file (defaults apply when omitted).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Emit the results record as JSON instead of the text table.
        #[arg(long)]
        json: bool,

        /// Per-stage trace lines to stderr.
        #[arg(long)]
        trace: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            file,
            config,
            json,
            trace,
        } => cmd_run(file, config, json, trace),
    }
}

/// Loads config and program, runs the simulation, and prints the report.
fn cmd_run(file: PathBuf, config_path: Option<PathBuf>, json: bool, trace: bool) {
    let mut config = match config_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path).unwrap_or_else(|e| {
                eprintln!("error: could not read config '{}': {}", path.display(), e);
                process::exit(1);
            });
            serde_json::from_str::<Config>(&text).unwrap_or_else(|e| {
                eprintln!("error: invalid config '{}': {}", path.display(), e);
                process::exit(1);
            })
        }
        None => Config::default(),
    };
    if trace {
        config.simulation.trace = true;
    }

    let program = loader::load_program(&file).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    });

    if !json {
        println!(
            "Program: {} ({} instructions)",
            file.display(),
            program.insts.len()
        );
        println!(
            "Core: fetch/issue/commit {}/{}/{}  rob={}  predictor={:?}",
            config.pipeline.fetch_width,
            config.pipeline.issue_width,
            config.pipeline.commit_width,
            config.pipeline.rob_capacity,
            config.branch_predictor.kind
        );
    }

    let mut sim = Simulator::new(&config, program).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(1);
    });

    match sim.run() {
        Ok(report) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).expect("report serializes")
                );
            } else {
                if !sim.halted() {
                    println!("\n[!] cycle limit reached before exit syscall");
                }
                report.print();
            }
        }
        Err(e) => {
            eprintln!("\n[!] {}", e);
            sim.report().print();
            process::exit(1);
        }
    }
}
