//! Cycle-by-cycle model of a classic five-stage pipeline
//! (fetch, decode, execute, memory, writeback) running decoded instructions.
//!
//! Register values are not simulated. Every branch is treated as taken, and
//! since targets are not resolved the instruction stream is the listing
//! order; a misprediction costs the two wrong-path fetches behind the branch.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{self, BufRead};

use Result;
use decode::{self, Instruction};
use translate;

pub mod schedule;

/// Length of one clock cycle, in picoseconds.
pub const CYCLE_TIME_PS: u64 = 200;

/// Cycles shown by `Machine::chart`.
pub const CHART_CYCLES: usize = 50;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    IF,
    ID,
    EX,
    MEM,
    WB,
}

pub const STAGES: [Stage; 5] = [Stage::IF, Stage::ID, Stage::EX, Stage::MEM, Stage::WB];

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Stage::IF => "IF",
            Stage::ID => "ID",
            Stage::EX => "EX",
            Stage::MEM => "MEM",
            Stage::WB => "WB",
        };
        f.pad(name)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// Bypass ALU results to the next instruction. Loads still cost a cycle.
    pub forwarding: bool,
    /// Per-address one-bit branch predictor. Without it every branch or jump
    /// squashes the instructions fetched behind it.
    pub prediction: bool,
    /// Move independent instructions into stall slots before running.
    pub reordering: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            forwarding: true,
            prediction: true,
            reordering: true,
        }
    }
}

/// An instruction together with the address it was loaded at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub pc: u32,
    pub inst: Instruction,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Stall,
    Flush,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Event::Stall => f.write_str("STALL (Data Hazard)"),
            Event::Flush => f.write_str("FLUSH (Branch Misprediction)"),
        }
    }
}

#[derive(Clone, Debug)]
pub enum StepOutcome {
    Running,
    Done,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Stats {
    pub cycles: usize,
    pub retired: usize,
    pub stalls: usize,
    pub flushes: usize,
}

impl Stats {
    /// Cycles per instruction, or `None` if nothing ran.
    pub fn cpi(&self) -> Option<f64> {
        if self.retired == 0 {
            None
        } else {
            Some(self.cycles as f64 / self.retired as f64)
        }
    }

    /// Instructions per cycle.
    pub fn throughput(&self) -> Option<f64> {
        if self.cycles == 0 {
            None
        } else {
            Some(self.retired as f64 / self.cycles as f64)
        }
    }

    pub fn time_ps(&self) -> u64 {
        self.cycles as u64 * CYCLE_TIME_PS
    }
}

type Slots = [Option<usize>; 5];

#[derive(Clone)]
pub struct Machine {
    pub cycle: usize,
    config: Config,
    program: Vec<Entry>,
    slots: Slots,
    next_fetch: usize,
    retired: usize,
    predictor: HashMap<u32, bool>,
    history: Vec<Slots>,
    events: BTreeMap<usize, Event>,
}

/// Read a binary listing and keep the lines that decode.
///
/// Blank lines are skipped and so are lines that fail to decode, with a
/// warning. Only I/O failures are errors.
pub fn load<R: BufRead>(input: R) -> Result<Vec<Instruction>> {
    let mut program = vec![];
    for line in input.lines() {
        let line = line?;
        let word = translate::clean_line(&line);
        if word.is_empty() {
            continue;
        }
        match decode::decode_str(word) {
            Ok(inst) => program.push(inst),
            Err(e) => warn!("skipping {}: {}", word, e),
        }
    }
    Ok(program)
}

impl Machine {
    pub fn new(program: Vec<Instruction>, config: Config) -> Machine {
        let mut entries: Vec<Entry> = program.into_iter().enumerate()
            .map(|(i, inst)| Entry { pc: 4 * i as u32, inst: inst })
            .collect();

        if config.reordering {
            let moved = schedule::reorder(&mut entries, config.forwarding);
            debug!("reordering moved {} instructions", moved);
        }

        Machine {
            cycle: 0,
            config: config,
            program: entries,
            slots: [None; 5],
            next_fetch: 0,
            retired: 0,
            predictor: HashMap::new(),
            history: vec![],
            events: BTreeMap::new(),
        }
    }

    /// Instructions in issue order, after any reordering.
    pub fn program(&self) -> &[Entry] {
        &self.program
    }

    pub fn events(&self) -> &BTreeMap<usize, Event> {
        &self.events
    }

    pub fn is_done(&self) -> bool {
        self.retired == self.program.len()
    }

    pub fn stats(&self) -> Stats {
        Stats {
            cycles: self.cycle,
            retired: self.retired,
            stalls: self.events.values().filter(|&&e| e == Event::Stall).count(),
            flushes: self.events.values().filter(|&&e| e == Event::Flush).count(),
        }
    }

    /// Stage occupied by program entry `index` during `cycle`.
    pub fn stage_at(&self, index: usize, cycle: usize) -> Option<Stage> {
        let slots = match self.history.get(cycle) {
            Some(slots) => slots,
            None => return None,
        };
        slots.iter().position(|&s| s == Some(index)).map(|n| STAGES[n])
    }

    // Must the instruction in ID wait instead of entering EX?
    fn must_stall(&self, consumer: usize, ex: Option<usize>, mem: Option<usize>) -> bool {
        let reads = self.program[consumer].inst.sources();
        let feeds = |producer: Option<usize>| {
            match producer.and_then(|p| self.program[p].inst.dest()) {
                Some(reg) => reads.contains(&reg),
                None => false,
            }
        };

        if self.config.forwarding {
            // Only a load's value arrives too late to forward.
            feeds(ex) && ex.map_or(false, |p| self.program[p].inst.is_load())
        } else {
            feeds(ex) || feeds(mem)
        }
    }

    // Resolve a control transfer entering EX. Returns true on misprediction.
    fn resolve(&mut self, index: usize) -> bool {
        let (pc, jump) = {
            let entry = &self.program[index];
            if !entry.inst.is_control() {
                return false;
            }
            (entry.pc, entry.inst.is_jump())
        };

        // Register values aren't simulated.
        let taken = true;
        if !self.config.prediction {
            return true;
        }

        let predicted = *self.predictor.entry(pc).or_insert(jump);
        self.predictor.insert(pc, taken);
        predicted != taken
    }

    fn note(&mut self, event: Event) {
        debug!("cycle {}: {}", self.cycle, event);
        self.events.insert(self.cycle, event);
    }

    pub fn step(&mut self) -> StepOutcome {
        const IF: usize = 0;
        const ID: usize = 1;
        const EX: usize = 2;
        const MEM: usize = 3;
        const WB: usize = 4;

        let old = self.slots;
        let mut new: Slots = [None; 5];
        new[WB] = old[MEM];
        new[MEM] = old[EX];

        let stall = match old[ID] {
            Some(id) => self.must_stall(id, old[EX], old[MEM]),
            None => false,
        };

        if stall {
            new[ID] = old[ID];
            new[IF] = old[IF];
            self.note(Event::Stall);
        } else {
            new[EX] = old[ID];
            new[ID] = old[IF];

            let flushed = match new[EX] {
                Some(ex) if self.resolve(ex) => Some(ex),
                _ => None,
            };

            if let Some(ex) = flushed {
                new[ID] = None;
                self.next_fetch = ex + 1;
                self.note(Event::Flush);
            } else if self.next_fetch < self.program.len() {
                new[IF] = Some(self.next_fetch);
                self.next_fetch += 1;
            }
        }

        if new[WB].is_some() {
            self.retired += 1;
        }

        self.slots = new;
        self.history.push(new);
        self.cycle += 1;

        if self.is_done() {
            StepOutcome::Done
        } else {
            StepOutcome::Running
        }
    }

    pub fn run(&mut self) -> Stats {
        while !self.is_done() {
            self.step();
        }
        self.stats()
    }

    /// Print what each stage holds right now.
    pub fn dump<W>(&self, writer: &mut W) -> io::Result<()>
        where W: io::Write,
    {
        write!(writer, "Cycle: {}\n", self.cycle)?;
        for (stage, slot) in STAGES.iter().zip(self.slots.iter()) {
            match *slot {
                Some(i) => write!(writer, "{:<4}: {}\n", stage, self.program[i].inst)?,
                None => write!(writer, "{:<4}: -\n", stage)?,
            }
        }
        Ok(())
    }

    /// Print the stage chart, statistics and event list.
    pub fn chart<W>(&self, writer: &mut W) -> io::Result<()>
        where W: io::Write,
    {
        let shown = if self.cycle < CHART_CYCLES { self.cycle } else { CHART_CYCLES };

        write!(writer, "Instructions: {} | Cycles: {}", self.program.len(), self.cycle)?;
        if self.cycle > CHART_CYCLES {
            write!(writer, " (showing first {})", CHART_CYCLES)?;
        }
        write!(writer, "\n\n{:<20}", "Instruction")?;
        for c in 0..shown {
            write!(writer, "{:<4}", c)?;
        }
        write!(writer, "\n{}\n", "-".repeat(20 + 4 * shown))?;

        for (i, entry) in self.program.iter().enumerate() {
            let text: String = entry.inst.to_string().chars().take(18).collect();
            write!(writer, "{:<20}", text)?;
            for c in 0..shown {
                match self.stage_at(i, c) {
                    Some(stage) => write!(writer, "{:<4}", stage)?,
                    None => write!(writer, "    ")?,
                }
            }
            write!(writer, "\n")?;
        }

        write!(writer, "{:<20}", "EVENTS")?;
        for c in 0..shown {
            let mark = if self.events.contains_key(&c) { "!" } else { "" };
            write!(writer, "{:<4}", mark)?;
        }
        write!(writer, "\n\n")?;

        let stats = self.stats();
        write!(writer, "Statistics:\n")?;
        write!(writer, "Total Cycles: {}\n", stats.cycles)?;
        write!(writer, "Executed Instructions: {}\n", stats.retired)?;
        if let Some(cpi) = stats.cpi() {
            write!(writer, "CPI: {:.2}\n", cpi)?;
        }
        if let Some(ipc) = stats.throughput() {
            write!(writer, "Throughput (instr/cycle): {:.3}\n", ipc)?;
        }
        write!(writer, "Total Time (ps): {}\n", stats.time_ps())?;

        write!(writer, "\nPipeline Events:\n")?;
        for (cycle, event) in &self.events {
            write!(writer, "Cycle {}: {}\n", cycle, event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use std::io::Cursor;
    use decode::{Instruction, Reg};
    use decode::formats::{ROperands, IOperands, JOperands};
    use super::{Config, Entry, Event, Machine, Stage, StepOutcome, load};

    fn r(n: u32) -> Reg {
        Reg::new(n).unwrap()
    }

    pub fn add(rd: u32, rs: u32, rt: u32) -> Instruction {
        Instruction::ADD(ROperands { rd: r(rd), rs: r(rs), rt: r(rt) })
    }

    pub fn lw(rt: u32, rs: u32) -> Instruction {
        Instruction::LW(IOperands { rs: r(rs), rt: r(rt), imm: 0 })
    }

    pub fn sw(rt: u32, rs: u32) -> Instruction {
        Instruction::SW(IOperands { rs: r(rs), rt: r(rt), imm: 0 })
    }

    pub fn beq(rs: u32, rt: u32) -> Instruction {
        Instruction::BEQ(IOperands { rs: r(rs), rt: r(rt), imm: 0 })
    }

    pub fn j() -> Instruction {
        Instruction::J(JOperands { target: 0 })
    }

    pub fn text(program: &[Entry]) -> Vec<String> {
        program.iter().map(|e| e.inst.to_string()).collect()
    }

    fn config(forwarding: bool, prediction: bool, reordering: bool) -> Config {
        Config { forwarding: forwarding, prediction: prediction, reordering: reordering }
    }

    fn cycles(program: Vec<Instruction>, config: Config) -> usize {
        Machine::new(program, config).run().cycles
    }

    #[test]
    fn test_no_hazards() {
        let stats = Machine::new(vec![add(8, 1, 2), add(9, 3, 4), add(10, 5, 6)],
                                 Config::default()).run();
        assert_eq!(7, stats.cycles);
        assert_eq!(3, stats.retired);
        assert_eq!(0, stats.stalls);
        assert_eq!(1400, stats.time_ps());
    }

    #[test]
    fn test_empty_program() {
        let mut machine = Machine::new(vec![], Config::default());
        let stats = machine.run();
        assert_eq!(0, stats.cycles);
        assert_eq!(None, stats.cpi());
        assert_eq!(None, stats.throughput());
    }

    #[test]
    fn test_load_use_stall() {
        let mut machine = Machine::new(vec![lw(8, 0), add(9, 8, 8)], config(true, true, false));
        let stats = machine.run();
        assert_eq!(7, stats.cycles);
        assert_eq!(1, stats.stalls);
        assert_eq!(Some(&Event::Stall), machine.events().get(&3));
        assert_eq!(Some(3.5), stats.cpi());

        // the add sits in ID for two cycles
        assert_eq!(Some(Stage::ID), machine.stage_at(1, 2));
        assert_eq!(Some(Stage::ID), machine.stage_at(1, 3));
        assert_eq!(Some(Stage::EX), machine.stage_at(1, 4));
        assert_eq!(Some(Stage::WB), machine.stage_at(1, 6));
    }

    #[test]
    fn test_forwarding_on_off() {
        let dependent = || vec![add(8, 1, 2), add(9, 8, 8)];
        assert_eq!(6, cycles(dependent(), config(true, true, false)));
        assert_eq!(8, cycles(dependent(), config(false, true, false)));

        // one instruction between producer and consumer
        let spaced = || vec![add(8, 1, 2), add(10, 3, 4), add(9, 8, 8)];
        assert_eq!(7, cycles(spaced(), config(true, true, false)));
        assert_eq!(8, cycles(spaced(), config(false, true, false)));

        let load_use = || vec![lw(8, 0), add(9, 8, 8)];
        assert_eq!(7, cycles(load_use(), config(true, true, false)));
        assert_eq!(8, cycles(load_use(), config(false, true, false)));
    }

    #[test]
    fn test_reordering_hides_load_use() {
        let program = || vec![lw(8, 0), add(9, 8, 8), add(10, 11, 12)];
        assert_eq!(8, cycles(program(), config(true, true, false)));

        let mut machine = Machine::new(program(), config(true, true, true));
        let stats = machine.run();
        assert_eq!(7, stats.cycles);
        assert_eq!(0, stats.stalls);
        assert_eq!("add $t2, $t3, $t4", machine.program()[1].inst.to_string());
    }

    #[test]
    fn test_branch_prediction() {
        // jumps are always predicted taken
        let jump = || vec![j(), add(8, 1, 2), add(9, 3, 4)];
        assert_eq!(7, cycles(jump(), config(true, true, false)));
        assert_eq!(9, cycles(jump(), config(true, false, false)));

        // a cold predictor says not taken
        let mut machine = Machine::new(vec![beq(1, 2), add(8, 1, 2), add(9, 3, 4)],
                                       config(true, true, false));
        let stats = machine.run();
        assert_eq!(9, stats.cycles);
        assert_eq!(1, stats.flushes);
        assert_eq!(Some(&Event::Flush), machine.events().get(&2));
    }

    #[test]
    fn test_step_outcome() {
        let mut machine = Machine::new(vec![add(8, 1, 2)], Config::default());
        for _ in 0..4 {
            match machine.step() {
                StepOutcome::Running => (),
                StepOutcome::Done => panic!("finished early at cycle {}", machine.cycle),
            }
        }
        match machine.step() {
            StepOutcome::Done => (),
            StepOutcome::Running => panic!("still running"),
        }
    }

    #[test]
    fn test_dump() {
        let mut machine = Machine::new(vec![lw(8, 0), add(9, 8, 8)], Config::default());
        machine.step();
        machine.step();
        let mut out = vec![];
        machine.dump(&mut out).unwrap();
        assert_eq!("Cycle: 2\n\
                    IF  : add $t1, $t0, $t0\n\
                    ID  : lw $t0, 0($zero)\n\
                    EX  : -\n\
                    MEM : -\n\
                    WB  : -\n",
                   String::from_utf8(out).unwrap());
    }

    #[test]
    fn test_chart() {
        let mut machine = Machine::new(vec![lw(8, 0), add(9, 8, 8)], config(true, true, false));
        machine.run();
        let mut out = vec![];
        machine.chart(&mut out).unwrap();
        let chart = String::from_utf8(out).unwrap();

        assert!(chart.starts_with("Instructions: 2 | Cycles: 7\n"));
        assert!(chart.contains("lw $t0, 0($zero)    IF  ID  EX  MEM WB"));
        assert!(chart.contains("add $t1, $t0, $t0       IF  ID  ID  EX  MEM WB"));
        assert!(chart.contains("EVENTS                          !"));
        assert!(chart.contains("Total Cycles: 7\n"));
        assert!(chart.contains("CPI: 3.50\n"));
        assert!(chart.contains("Throughput (instr/cycle): 0.286\n"));
        assert!(chart.contains("Total Time (ps): 1400\n"));
        assert!(chart.contains("Cycle 3: STALL (Data Hazard)\n"));
    }

    #[test]
    fn test_load_skips_bad_lines() {
        let listing = "# program\n\
                       10001100000010000000000000000000\n\
                       \n\
                       11111100000000000000000000000000\n\
                       00000001000010000100100000100000 # add $t1, $t0, $t0\n";
        let program = load(Cursor::new(listing)).unwrap();
        assert_eq!(vec![lw(8, 0), add(9, 8, 8)], program);
    }
}
