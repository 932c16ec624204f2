//! Static reordering to hide data hazards.
//!
//! When an instruction would stall waiting on the one right before it, a
//! later independent instruction is moved in between. Nothing is moved
//! across a branch or jump.

use decode::Instruction;
use super::Entry;

/// Does `consumer`, issued directly after `producer`, have to wait for it?
pub fn stalls(producer: &Instruction, consumer: &Instruction, forwarding: bool) -> bool {
    match producer.dest() {
        Some(reg) if consumer.sources().contains(&reg) => !forwarding || producer.is_load(),
        _ => false,
    }
}

// Can `later` be moved up past `earlier` without changing the result?
fn independent(earlier: &Instruction, later: &Instruction) -> bool {
    if let Some(reg) = earlier.dest() {
        if later.sources().contains(&reg) || later.dest() == Some(reg) {
            return false;
        }
    }
    if let Some(reg) = later.dest() {
        if earlier.sources().contains(&reg) {
            return false;
        }
    }
    // Addresses aren't known, so only loads may pass each other.
    !(earlier.is_memory() && later.is_memory() && !(earlier.is_load() && later.is_load()))
}

fn find_filler(program: &[Entry], producer: usize) -> Option<usize> {
    let written = program[producer].inst.dest();

    for j in (producer + 2)..program.len() {
        let candidate = &program[j].inst;
        if candidate.is_control() {
            return None;
        }
        if let Some(reg) = written {
            if candidate.sources().contains(&reg) {
                continue;
            }
        }
        let skipped = &program[(producer + 1)..j];
        if skipped.iter().all(|e| independent(&e.inst, candidate)) {
            return Some(j);
        }
    }
    None
}

/// Reorder `program` in place, returning how many instructions were moved.
pub fn reorder(program: &mut Vec<Entry>, forwarding: bool) -> usize {
    let mut moved = 0;
    let mut i = 0;

    while i + 1 < program.len() {
        if !program[i + 1].inst.is_control()
            && stalls(&program[i].inst, &program[i + 1].inst, forwarding)
        {
            if let Some(j) = find_filler(program, i) {
                debug!("moving {} up after {}", program[j].inst, program[i].inst);
                let entry = program.remove(j);
                program.insert(i + 1, entry);
                moved += 1;
            }
        }
        i += 1;
    }

    moved
}
