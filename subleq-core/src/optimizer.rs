//! The peephole superoptimizer: a single pass over the loaded image that classifies
//! every address as one typed extended opcode.
//!
//! The scan tries patterns in a fixed priority order (§4.4 of the design notes); the
//! first one that matches claims the address. Addresses nothing claims default to raw
//! `SUBLEQ`, which is always semantically correct — fusion is a pure optimization, not
//! a requirement for correctness.

use crate::memory::{Memory, IO_PORT, MEMORY_SIZE};
use crate::opcode::{Instruction, Opcode};
use crate::pattern::PatternMatcher;

/// Snapshots of the initial image, consulted by patterns whose idiom depends on a
/// constant living at a particular address. Not kept in sync with runtime writes: the
/// optimizer runs exactly once, before any instruction executes.
pub struct InitialValueTables {
    is_zero: Box<[bool; MEMORY_SIZE]>,
    is_one: Box<[bool; MEMORY_SIZE]>,
    is_neg_one: Box<[bool; MEMORY_SIZE]>,
}

impl InitialValueTables {
    pub fn build(memory: &Memory) -> Self {
        let mut is_zero = Box::new([false; MEMORY_SIZE]);
        let mut is_one = Box::new([false; MEMORY_SIZE]);
        let mut is_neg_one = Box::new([false; MEMORY_SIZE]);
        for address in 0..MEMORY_SIZE {
            let word = memory.peek(address as u16);
            is_zero[address] = word == 0;
            is_one[address] = word == 1;
            is_neg_one[address] = word == IO_PORT;
        }
        InitialValueTables { is_zero, is_one, is_neg_one }
    }

    fn is_zero(&self, address: u16) -> bool {
        self.is_zero[address as usize]
    }

    fn is_one(&self, address: u16) -> bool {
        self.is_one[address as usize]
    }

    fn is_neg_one(&self, address: u16) -> bool {
        self.is_neg_one[address as usize]
    }
}

/// The result of the optimization pass: one extended instruction per address.
pub struct ExtendedProgram {
    instructions: Vec<Instruction>,
}

impl ExtendedProgram {
    pub fn get(&self, pc: u16) -> Instruction {
        self.instructions[pc as usize]
    }

    /// How many addresses were classified as each opcode. This is a static property
    /// of the optimization pass, independent of which addresses actually execute.
    pub fn substitution_counts(&self) -> [u64; Opcode::COUNT] {
        let mut counts = [0u64; Opcode::COUNT];
        for instruction in &self.instructions {
            counts[instruction.opcode.index()] += 1;
        }
        counts
    }
}

/// Builds the `-O` program: every address executes as raw SUBLEQ, with no pattern
/// matching at all. Used by the CLI's `--no-optimize` flag and by the equivalence
/// tests that compare it against the optimized program.
pub fn disabled(memory: &Memory) -> ExtendedProgram {
    let instructions = (0..MEMORY_SIZE)
        .map(|i| {
            let pc = i as u16;
            Instruction::raw(
                memory.peek(pc),
                memory.peek(pc.wrapping_add(1)),
                memory.peek(pc.wrapping_add(2)),
            )
        })
        .collect();
    ExtendedProgram { instructions }
}

/// Runs the full optimization pass over `memory` for the first `load_size` addresses.
/// Addresses at or beyond `load_size` are never scanned and keep the default raw
/// `SUBLEQ` classification, since nothing but the cross-compiler's own output could
/// have put a recognizable idiom there.
pub fn optimize(memory: &Memory, load_size: usize) -> ExtendedProgram {
    let tables = InitialValueTables::build(memory);
    let mut instructions: Vec<Instruction> = (0..MEMORY_SIZE)
        .map(|i| {
            let pc = i as u16;
            Instruction::raw(
                memory.peek(pc),
                memory.peek(pc.wrapping_add(1)),
                memory.peek(pc.wrapping_add(2)),
            )
        })
        .collect();

    let mut matcher = PatternMatcher::new();
    for i in 0..load_size {
        let pc = i as u16;
        if let Some(instruction) = classify(memory, &tables, &mut matcher, pc) {
            instructions[i] = instruction;
        }
    }

    ExtendedProgram { instructions }
}

/// Tries every pattern in priority order and returns the first match's instruction.
fn classify(
    memory: &Memory,
    tables: &InitialValueTables,
    matcher: &mut PatternMatcher,
    pc: u16,
) -> Option<Instruction> {
    match_istore(memory, matcher, pc)
        .or_else(|| match_iload_or_ldinc(memory, tables, matcher, pc))
        .or_else(|| match_lshift(memory, matcher, pc))
        .or_else(|| match_iadd(memory, matcher, pc))
        .or_else(|| match_inv(memory, tables, matcher, pc))
        .or_else(|| match_isub(memory, matcher, pc))
        .or_else(|| match_ijmp(memory, matcher, pc))
        .or_else(|| match_mov(memory, matcher, pc))
        .or_else(|| match_double_or_add(memory, matcher, pc))
        .or_else(|| match_neg(memory, matcher, pc))
        .or_else(|| match_zero(memory, matcher, pc))
        .or_else(|| match_halt(memory, matcher, pc))
        .or_else(|| match_jmp(memory, matcher, pc))
        .or_else(|| match_get(memory, matcher, pc))
        .or_else(|| match_put(memory, matcher, pc))
        .or_else(|| match_inc_dec_sub(memory, tables, matcher, pc))
}

fn match_istore(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    const PATTERN: &str = "0Z> 11> 22> Z3> Z4> ZZ> 56> 77> Z7> 6Z> ZZ> 66>";
    matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let dst = matcher.slot(0)?;
    let src = matcher.slot(5)?;
    Some(Instruction::new(Opcode::Istore, src, dst, 0))
}

fn match_iload_or_ldinc(
    memory: &Memory,
    tables: &InitialValueTables,
    matcher: &mut PatternMatcher,
    pc: u16,
) -> Option<Instruction> {
    const PATTERN: &str = "00> !Z> Z0> ZZ> 11> ?Z> Z1> ZZ>";
    let result = matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let jump_back = matcher.slot(0)?;
    if jump_back != pc.wrapping_add(15) {
        return None;
    }
    let dst = matcher.slot(1)?;
    let src = *result.bangs.first()?;

    // Look ahead for the trailing `M[src] += 1` that fuses ILOAD into LDINC.
    let lookahead_pc = pc.wrapping_add(24);
    if let Some(inc) = matcher.try_match(memory, lookahead_pc, "!!>", &[], &[]) {
        let first = inc.bangs[0];
        let second = inc.bangs[1];
        if first != second && tables.is_neg_one(first) && second == src {
            return Some(Instruction::new(Opcode::Ldinc, src, dst, 0));
        }
    }
    Some(Instruction::new(Opcode::Iload, src, dst, 0))
}

/// Greedily consumes consecutive `"!Z> Z!> ZZ>"` triples that double the same address,
/// fusing a run of two or more into one `LSHIFT`. A run of exactly one is left for
/// `match_double_or_add` to claim as `DOUBLE`.
fn match_lshift(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    const PATTERN: &str = "!Z> Z!> ZZ>";
    const PATTERN_LEN: u16 = 9;

    let mut run: u16 = 0;
    let mut dst: Option<u16> = None;
    loop {
        let offset_pc = pc.wrapping_add(run * PATTERN_LEN);
        let Some(result) = matcher.try_match(memory, offset_pc, PATTERN, &[], &[]) else {
            break;
        };
        let (a, b) = (result.bangs[0], result.bangs[1]);
        if a != b {
            break;
        }
        match dst {
            None => dst = Some(a),
            Some(d) if d == a => {}
            Some(_) => break,
        }
        run += 1;
    }

    if run >= 2 {
        Some(Instruction::new(Opcode::Lshift, run, dst.unwrap(), 0))
    } else {
        None
    }
}

fn match_iadd(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    const PATTERN: &str = "01> 23> 44> 14> 3Z> 11> 33>";
    matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let dst = matcher.slot(0)?;
    let src = matcher.slot(2)?;
    Some(Instruction::new(Opcode::Iadd, src, dst, 0))
}

fn match_inv(
    memory: &Memory,
    tables: &InitialValueTables,
    matcher: &mut PatternMatcher,
    pc: u16,
) -> Option<Instruction> {
    const PATTERN: &str = "00> 10> 11> 2Z> Z1> ZZ> !1>";
    let result = matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let one_cell = *result.bangs.first()?;
    if !tables.is_one(one_cell) {
        return None;
    }
    let dst = matcher.slot(1)?;
    Some(Instruction::new(Opcode::Inv, 0, dst, 0))
}

fn match_isub(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    const PATTERN: &str = "01> 33> 14> 5Z> 11>";
    matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let dst = matcher.slot(0)?;
    let src = matcher.slot(5)?;
    Some(Instruction::new(Opcode::Isub, src, dst, 0))
}

fn match_ijmp(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    const PATTERN: &str = "00> !Z> Z0> ZZ> ZZ>";
    let result = matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let jump_back = matcher.slot(0)?;
    if jump_back != pc.wrapping_add(14) {
        return None;
    }
    let dst = *result.bangs.first()?;
    Some(Instruction::new(Opcode::IJmp, 0, dst, 0))
}

fn match_mov(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    const PATTERN: &str = "00> !Z> Z0> ZZ>";
    let result = matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let dst = matcher.slot(0)?;
    let src = *result.bangs.first()?;
    if dst == src {
        return None;
    }
    Some(Instruction::new(Opcode::Mov, src, dst, 0))
}

fn match_double_or_add(
    memory: &Memory,
    matcher: &mut PatternMatcher,
    pc: u16,
) -> Option<Instruction> {
    const PATTERN: &str = "!Z> Z!> ZZ>";
    let result = matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let (src, dst) = (result.bangs[0], result.bangs[1]);
    if src == dst {
        Some(Instruction::new(Opcode::Double, 0, dst, 0))
    } else {
        Some(Instruction::new(Opcode::Add, src, dst, 0))
    }
}

fn match_neg(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    const PATTERN: &str = "00> 10>";
    matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let dst = matcher.slot(0)?;
    let src = matcher.slot(1)?;
    Some(Instruction::new(Opcode::Neg, src, dst, 0))
}

fn match_zero(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    const PATTERN: &str = "00>";
    matcher.try_match(memory, pc, PATTERN, &[], &[])?;
    let dst = matcher.slot(0)?;
    Some(Instruction::new(Opcode::Zero, 0, dst, 0))
}

fn match_halt(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    let result = matcher.try_match(memory, pc, "ZZ!", &[], &[])?;
    let target = *result.bangs.first()?;
    if target != IO_PORT {
        return None;
    }
    Some(Instruction::new(Opcode::Halt, 0, 0, 0))
}

fn match_jmp(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    let result = matcher.try_match(memory, pc, "00!", &[], &[])?;
    let zeroed = matcher.slot(0)?;
    let target = *result.bangs.first()?;
    if target == pc {
        // A jump back to its own address is an infinite loop; treat it as a halt.
        // `zeroed` still gets written to, matching the raw `M[b] -= M[a]` self-
        // subtraction the idiom performs before the (never-useful) jump.
        return Some(Instruction::new(Opcode::Halt, 0, zeroed, 0));
    }
    Some(Instruction::new(Opcode::Jmp, zeroed, target, 0))
}

fn match_get(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    let result = matcher.try_match(memory, pc, "N!>", &[], &[])?;
    let dst = *result.bangs.first()?;
    Some(Instruction::new(Opcode::Get, 0, dst, 0))
}

fn match_put(memory: &Memory, matcher: &mut PatternMatcher, pc: u16) -> Option<Instruction> {
    let result = matcher.try_match(memory, pc, "!N>", &[], &[])?;
    let src = *result.bangs.first()?;
    Some(Instruction::new(Opcode::Put, src, 0, 0))
}

fn match_inc_dec_sub(
    memory: &Memory,
    tables: &InitialValueTables,
    matcher: &mut PatternMatcher,
    pc: u16,
) -> Option<Instruction> {
    let result = matcher.try_match(memory, pc, "!!>", &[], &[])?;
    let (a, b) = (result.bangs[0], result.bangs[1]);
    if a == b {
        return None;
    }
    if tables.is_neg_one(a) {
        Some(Instruction::new(Opcode::Inc, 0, b, 0))
    } else if tables.is_one(a) {
        Some(Instruction::new(Opcode::Dec, 0, b, 0))
    } else {
        Some(Instruction::new(Opcode::Sub, a, b, 0))
    }
}
