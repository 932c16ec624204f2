extern crate env_logger;
#[macro_use]
extern crate log;
extern crate minmips;

use std::env;
use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process;

use minmips::pipeline::{self, Config, Machine, StepOutcome};

const DEFAULT_INPUT: &'static str = "opcode.txt";

fn on_off(flag: bool) -> &'static str {
    if flag { "ON" } else { "OFF" }
}

fn run(input: &str, config: Config, trace: bool) -> minmips::Result<()> {
    let program = pipeline::load(BufReader::new(File::open(input)?))?;
    info!("loaded {} instructions from {}", program.len(), input);

    let mut machine = Machine::new(program, config);
    let stdout = io::stdout();
    let mut out = stdout.lock();

    if trace && !machine.is_done() {
        loop {
            machine.dump(&mut out)?;
            write!(out, "\n")?;
            if let StepOutcome::Done = machine.step() {
                break;
            }
        }
    } else {
        machine.run();
    }

    machine.chart(&mut out)?;
    Ok(())
}

fn main() {
    env_logger::init();

    let mut input = DEFAULT_INPUT.to_owned();
    let mut config = Config::default();
    let mut trace = false;

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--no-forwarding" => config.forwarding = false,
            "--no-prediction" => config.prediction = false,
            "--no-reordering" => config.reordering = false,
            "--trace" => trace = true,
            _ if arg.starts_with("--") => {
                eprintln!("Usage: minmips-pipeline [INPUT] [--no-forwarding] \
                           [--no-prediction] [--no-reordering] [--trace]");
                process::exit(2);
            }
            _ => input = arg.clone(),
        }
    }

    println!("MIPS 5-Stage Pipeline Simulator");
    println!("Branch Prediction: {}", on_off(config.prediction));
    println!("Forwarding: {}", on_off(config.forwarding));
    println!("Reordering: {}\n", on_off(config.reordering));

    match run(&input, config, trace) {
        Ok(()) => println!("\nSimulation completed successfully!"),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
