//! Pure computation backing the `-s`/`-p` reports (§6). Rendering the numbers into
//! text tables and writing `profiler_report.txt` are the binary crate's job; this
//! module only turns the raw counters `Vm::run` hands back into ranked, percentaged
//! rows so that logic is unit-testable without going through a CLI.

use crate::opcode::Opcode;
use crate::optimizer::ExtendedProgram;

/// One row of the `-s` statistics table: how many addresses were classified as
/// `opcode`, how many times it actually executed, and that execution count's share
/// of the whole run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpcodeStat {
    pub opcode: Opcode,
    pub substitutions: u64,
    pub executions: u64,
    pub percent_of_dynamic: f64,
}

/// Builds one row per opcode, in `Opcode::ALL` order, from the optimizer's static
/// substitution counts and the dispatcher's dynamic execution counts.
pub fn opcode_table(
    substitution_counts: &[u64; Opcode::COUNT],
    dynamic_counts: &[u64; Opcode::COUNT],
    total_instructions: u64,
) -> Vec<OpcodeStat> {
    Opcode::ALL
        .iter()
        .map(|&opcode| {
            let executions = dynamic_counts[opcode.index()];
            let percent_of_dynamic = percent(executions, total_instructions);
            OpcodeStat {
                opcode,
                substitutions: substitution_counts[opcode.index()],
                executions,
                percent_of_dynamic,
            }
        })
        .collect()
}

/// One hot PC: how often it executed, that count's share of the run, and which
/// opcode lives there (so a report can name it without a second lookup).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HotSpot {
    pub pc: u16,
    pub count: u64,
    pub percent_of_total: f64,
    pub opcode: Opcode,
}

/// Ranks the profiler's per-address exec counts, keeping only addresses whose count
/// exceeds `min_count`, descending by count, truncated to `limit` entries. Ties break
/// by address so the ranking is deterministic across runs (§8's determinism property).
pub fn hotspots(
    pc_hotspots: &[u64],
    program: &ExtendedProgram,
    total_instructions: u64,
    min_count: u64,
    limit: usize,
) -> Vec<HotSpot> {
    let mut ranked: Vec<HotSpot> = pc_hotspots
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count > min_count)
        .map(|(pc, &count)| HotSpot {
            pc: pc as u16,
            count,
            percent_of_total: percent(count, total_instructions),
            opcode: program.get(pc as u16).opcode,
        })
        .collect();

    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.pc.cmp(&b.pc)));
    ranked.truncate(limit);
    ranked
}

fn percent(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}
