extern crate env_logger;
extern crate minmips;

use std::env;
use std::process;

use minmips::translate;

const DEFAULT_INPUT: &'static str = "opcode.txt";
const DEFAULT_OUTPUT: &'static str = "test.asm";

fn main() {
    env_logger::init();

    let mut args = env::args().skip(1);
    let input = args.next().unwrap_or_else(|| DEFAULT_INPUT.to_owned());
    let output = args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_owned());

    match translate::translate_file(&input, &output) {
        Ok(_) => {
            println!("Conversion complete. Check '{}' for the generated assembly.", output);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
