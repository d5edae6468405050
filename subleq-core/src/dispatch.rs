//! The tail-chained dispatcher.
//!
//! `Vm::run` is a single `loop` that decodes the extended instruction at the current
//! PC, matches on its opcode to invoke the matching handler, and folds the handler's
//! result back into the loop variable. No handler recurses or calls back into `run`,
//! so stack depth stays O(1) regardless of how many instructions execute — the
//! "transfer must not grow the call stack" contract is satisfied by ordinary `match`
//! arms rather than a computed goto, since nothing here calls itself.

use crate::error::{HaltReason, VmError};
use crate::io::{InputStream, OutputStream};
use crate::memory::{is_branch_taken, Memory, HALT_BOUNDARY, IO_PORT, MEMORY_SIZE};
use crate::opcode::{Instruction, Opcode};
use crate::optimizer::ExtendedProgram;

/// What a handler wants the loop to do next.
enum Step {
    Continue(u16),
    Halt,
}

/// Everything the statistics/profiler epilogue needs once the dispatch loop exits.
pub struct RunReport {
    pub halt_reason: HaltReason,
    pub instructions_executed: u64,
    pub memory_accesses: u64,
    pub dynamic_counts: [u64; Opcode::COUNT],
    /// Per-address execution counts; only collected when `Vm::run`'s `profile` flag
    /// is set, since it costs one array write per dispatch step.
    pub pc_hotspots: Option<Box<[u64]>>,
}

pub struct Vm {
    memory: Memory,
    program: ExtendedProgram,
    pc: u16,
}

impl Vm {
    pub fn new(memory: Memory, program: ExtendedProgram) -> Self {
        Vm { memory, program, pc: 0 }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// The classified program this VM is executing, for the `-s`/`-p` epilogue's
    /// substitution-count table (§6). The dispatch loop itself never needs this
    /// back once `run` is in progress; it's exposed purely for reporting.
    pub fn program(&self) -> &ExtendedProgram {
        &self.program
    }

    /// Runs until halt or a hard I/O error. End-of-input is not an error from this
    /// method's point of view: it's folded into `HaltReason::InputEof` (see §7).
    ///
    /// `max_steps` bounds how many instructions are dispatched before giving up with
    /// `HaltReason::StepLimitReached`; pass `None` for the unbounded run the CLI
    /// always wants. A bound matters only to callers deliberately comparing against a
    /// raw SUBLEQ program that does not halt on its own (see the optimizer's
    /// self-jump-to-`HALT` degrade, which turns an infinite loop into a clean halt).
    pub fn run<I: InputStream, O: OutputStream>(
        &mut self,
        input: &mut I,
        output: &mut O,
        profile: bool,
        max_steps: Option<u64>,
    ) -> Result<RunReport, VmError> {
        let mut dynamic_counts = [0u64; Opcode::COUNT];
        let mut pc_hotspots = if profile {
            Some(vec![0u64; MEMORY_SIZE].into_boxed_slice())
        } else {
            None
        };
        let mut instructions_executed: u64 = 0;

        let halt_reason = loop {
            let pc = self.pc;
            let instruction = self.program.get(pc);

            instructions_executed += 1;
            dynamic_counts[instruction.opcode.index()] += 1;
            if let Some(hotspots) = pc_hotspots.as_deref_mut() {
                hotspots[pc as usize] += 1;
            }

            let step = match dispatch_one(&mut self.memory, pc, instruction, input, output) {
                Ok(step) => step,
                Err(VmError::InputEof) => break HaltReason::InputEof,
                Err(err) => return Err(err),
            };

            match step {
                Step::Continue(next_pc) => {
                    if next_pc >= HALT_BOUNDARY {
                        break HaltReason::PcOutOfRange;
                    }
                    self.pc = next_pc;
                }
                Step::Halt => break HaltReason::HaltOpcode,
            }

            if let Some(limit) = max_steps {
                if instructions_executed >= limit {
                    break HaltReason::StepLimitReached;
                }
            }
        };

        Ok(RunReport {
            halt_reason,
            instructions_executed,
            memory_accesses: self.memory.accesses(),
            dynamic_counts,
            pc_hotspots,
        })
    }
}

fn lshift16(value: u16, amount: u16) -> u16 {
    if amount >= 16 {
        0
    } else {
        ((value as u32) << amount) as u16
    }
}

/// Performs one extended instruction's effect and reports the next PC (or a halt).
/// The only opcodes that compute PC directly are `Jmp`, `IJmp`, `Halt`, and `Subleq`
/// on a taken branch; every other opcode uses its fixed advance from §4.2.
fn dispatch_one<I: InputStream, O: OutputStream>(
    memory: &mut Memory,
    pc: u16,
    instruction: Instruction,
    input: &mut I,
    output: &mut O,
) -> Result<Step, VmError> {
    let Instruction { opcode, src, dst, aux } = instruction;

    let next = match opcode {
        Opcode::Subleq => return subleq(memory, pc, src, dst, aux, input, output),
        Opcode::Jmp => {
            memory.write(src, 0);
            return Ok(Step::Continue(dst));
        }
        Opcode::IJmp => {
            let target = memory.read(dst);
            return Ok(Step::Continue(target));
        }
        Opcode::Mov => {
            let value = memory.read(src);
            memory.write(dst, value);
            pc.wrapping_add(12)
        }
        Opcode::Add => {
            let value = memory.read(dst).wrapping_add(memory.read(src));
            memory.write(dst, value);
            pc.wrapping_add(9)
        }
        Opcode::Sub => {
            let value = memory.read(dst).wrapping_sub(memory.read(src));
            memory.write(dst, value);
            pc.wrapping_add(3)
        }
        Opcode::Zero => {
            memory.write(dst, 0);
            pc.wrapping_add(3)
        }
        Opcode::Neg => {
            let value = 0u16.wrapping_sub(memory.read(src));
            memory.write(dst, value);
            pc.wrapping_add(6)
        }
        Opcode::Inc => {
            let value = memory.read(dst).wrapping_add(1);
            memory.write(dst, value);
            pc.wrapping_add(3)
        }
        Opcode::Dec => {
            let value = memory.read(dst).wrapping_sub(1);
            memory.write(dst, value);
            pc.wrapping_add(3)
        }
        Opcode::Inv => {
            let value = !memory.read(dst);
            memory.write(dst, value);
            pc.wrapping_add(21)
        }
        Opcode::Double => {
            let value = lshift16(memory.read(dst), 1);
            memory.write(dst, value);
            pc.wrapping_add(9)
        }
        Opcode::Lshift => {
            let value = lshift16(memory.read(dst), src);
            memory.write(dst, value);
            pc.wrapping_add(src.wrapping_mul(9))
        }
        Opcode::Iadd => {
            let pointer = memory.read(dst);
            let value = memory.read(pointer).wrapping_add(memory.read(src));
            memory.write(pointer, value);
            pc.wrapping_add(21)
        }
        Opcode::Isub => {
            let pointer = memory.read(dst);
            let value = memory.read(pointer).wrapping_sub(memory.read(src));
            memory.write(pointer, value);
            pc.wrapping_add(15)
        }
        Opcode::Iload => {
            load_indirect(memory, src, dst, input)?;
            pc.wrapping_add(24)
        }
        Opcode::Ldinc => {
            load_indirect(memory, src, dst, input)?;
            let incremented = memory.read(src).wrapping_add(1);
            memory.write(src, incremented);
            pc.wrapping_add(27)
        }
        Opcode::Istore => {
            let pointer = memory.read(dst);
            let value = memory.read(src);
            memory.write(pointer, value);
            pc.wrapping_add(36)
        }
        Opcode::Put => {
            let byte = memory.read(src) as u8;
            output.write_byte(byte)?;
            pc.wrapping_add(3)
        }
        Opcode::Get => {
            let byte = input.read_byte()?.ok_or(VmError::InputEof)?;
            memory.write(dst, byte as u16);
            pc.wrapping_add(3)
        }
        Opcode::Halt => {
            // A genuine `ZZ!` idiom's `dst` is always 0 (self-subtraction of address
            // 0); a self-jump-to-`HALT` degrade (§4.4 #13) carries the address the
            // idiom zeroed before looping. Either way raw SUBLEQ performs exactly one
            // write of 0 to that cell before its branch; skipping it here would leave
            // optimized memory diverging from `-O` memory at that address.
            memory.write(dst, 0);
            return Ok(Step::Halt);
        }
    };

    Ok(Step::Continue(next))
}

/// `ILOAD`'s dereference: `M[dst] := M[M[src]]`, except that if the pointer at `src`
/// is the I/O sentinel, a byte is read and its two's-complement negation is stored
/// instead of the byte itself. This mirrors the raw SUBLEQ subtraction path the idiom
/// was built from (`M[b] -= M[a]` with `M[b]` zero beforehand); storing the byte
/// unnegated would diverge from unoptimized (`-O`) execution.
fn load_indirect<I: InputStream>(
    memory: &mut Memory,
    src: u16,
    dst: u16,
    input: &mut I,
) -> Result<(), VmError> {
    let pointer = memory.read(src);
    let value = if pointer == IO_PORT {
        let byte = input.read_byte()?.ok_or(VmError::InputEof)?;
        0u16.wrapping_sub(byte as u16)
    } else {
        memory.read(pointer)
    };
    memory.write(dst, value);
    Ok(())
}

/// The raw three-operand SUBLEQ step, including its I/O and branch conditions.
fn subleq<I: InputStream, O: OutputStream>(
    memory: &mut Memory,
    pc: u16,
    a: u16,
    b: u16,
    c: u16,
    input: &mut I,
    output: &mut O,
) -> Result<Step, VmError> {
    if a == IO_PORT {
        let byte = input.read_byte()?.ok_or(VmError::InputEof)?;
        memory.write(b, byte as u16);
        return Ok(Step::Continue(pc.wrapping_add(3)));
    }
    if b == IO_PORT {
        let byte = memory.read(a) as u8;
        output.write_byte(byte)?;
        return Ok(Step::Continue(pc.wrapping_add(3)));
    }

    let result = memory.read(b).wrapping_sub(memory.read(a));
    memory.write(b, result);

    if is_branch_taken(result) {
        Ok(Step::Continue(c))
    } else {
        Ok(Step::Continue(pc.wrapping_add(3)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;
    use crate::optimizer::optimize;
    use std::io::Cursor;

    fn run_raw(words: &[u16], input: &[u8]) -> (Vm, RunReport, Vec<u8>) {
        let mut memory = Memory::new();
        let load_size = memory.load(words);
        let program = optimize(&memory, load_size);
        let mut vm = Vm::new(memory, program);
        let mut input_stream = Cursor::new(input.to_vec());
        let mut output = Vec::new();
        let report = vm.run(&mut input_stream, &mut output, false, None).unwrap();
        (vm, report, output)
    }

    #[test]
    fn scenario_one_self_branch_halts_out_of_range() {
        let (vm, report, output) = run_raw(&[3, 3, 6, 0, 0, 0xFFFF], &[]);
        assert_eq!(report.halt_reason, HaltReason::PcOutOfRange);
        assert!(output.is_empty());
        assert_eq!(vm.memory().peek(3), 0);
    }

    #[test]
    fn scenario_two_echoes_one_byte() {
        let (_, report, output) =
            run_raw(&[0xFFFF, 10, 3, 10, 0xFFFF, 6, 0, 0, 0xFFFF, 0, 0, 0], b"A");
        assert_eq!(output, b"A");
        assert_eq!(report.halt_reason, HaltReason::HaltOpcode);
    }

    #[test]
    fn input_eof_is_a_clean_halt() {
        let (_, report, _) = run_raw(&[0xFFFF, 0, 3], &[]);
        assert_eq!(report.halt_reason, HaltReason::InputEof);
    }

    #[test]
    fn branch_taken_on_zero_and_on_negative() {
        // M[1] == M[0] == 0 -> result 0 -> branch taken.
        let (_, report, _) = run_raw(&[0, 1, 6, 0, 0, 0xFFFF], &[]);
        assert_eq!(report.halt_reason, HaltReason::PcOutOfRange);

        // M[1] = 5, M[0] = 10 -> result wraps negative -> branch taken.
        let mut memory = Memory::new();
        memory.load(&[0, 1, 6, 10, 5, 0xFFFF]);
        let program = optimize(&memory, 6);
        let mut vm = Vm::new(memory, program);
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        let report = vm.run(&mut input, &mut output, false, None).unwrap();
        assert_eq!(report.halt_reason, HaltReason::PcOutOfRange);
        assert_eq!(vm.memory().peek(1), (5u16).wrapping_sub(10));
    }

    #[test]
    fn optimized_and_unoptimized_runs_agree() {
        // A ZERO idiom followed by a halt; compare running it through the
        // optimizer against interpreting every address as raw SUBLEQ.
        let words = [5u16, 5, 3, 0, 0, 0xFFFF];

        let mut optimized_memory = Memory::new();
        let load_size = optimized_memory.load(&words);
        let optimized_program = optimize(&optimized_memory, load_size);
        let mut optimized_vm = Vm::new(optimized_memory, optimized_program);

        let mut raw_memory = Memory::new();
        raw_memory.load(&words);
        let raw_program = crate::optimizer::disabled(&raw_memory);
        let mut raw_vm = Vm::new(raw_memory, raw_program);

        let mut in1 = Cursor::new(Vec::new());
        let mut out1 = Vec::new();
        let mut in2 = Cursor::new(Vec::new());
        let mut out2 = Vec::new();

        let report1 = optimized_vm.run(&mut in1, &mut out1, false, None).unwrap();
        let report2 = raw_vm.run(&mut in2, &mut out2, false, None).unwrap();

        assert_eq!(out1, out2);
        assert_eq!(report1.halt_reason, report2.halt_reason);
        assert_eq!(optimized_vm.memory().as_slice(), raw_vm.memory().as_slice());
    }
}
