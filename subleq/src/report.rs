//! Renders the `-s`/`-p` epilogue (§6) from `subleq_core::stats`' pure computation.
//! Kept deliberately plain — fixed-width columns, no color, no progress spinners —
//! so the output can be redirected or diffed in CI.

use std::fs::File;
use std::io::{self, Write};
use std::time::Duration;

use subleq_core::dispatch::RunReport;
use subleq_core::optimizer::ExtendedProgram;
use subleq_core::stats::{self, HotSpot, OpcodeStat};

/// Writes the `-s` table to `stderr`: one row per opcode, then run-wide totals.
pub fn print_stats(program: &ExtendedProgram, report: &RunReport, elapsed: Duration) {
    let substitutions = program.substitution_counts();
    let rows = stats::opcode_table(&substitutions, &report.dynamic_counts, report.instructions_executed);

    eprintln!(
        "{:<8} {:>12} {:>14} {:>8}",
        "OPCODE", "SUBSTITUTED", "EXECUTED", "% DYN"
    );
    for row in &rows {
        print_opcode_row(&mut io::stderr(), row).ok();
    }

    let total_substitutions: u64 = substitutions.iter().sum();
    eprintln!("---");
    eprintln!("total substitutions : {total_substitutions}");
    eprintln!("total instructions  : {}", report.instructions_executed);
    eprintln!("elapsed             : {:.6}s", elapsed.as_secs_f64());
}

fn print_opcode_row<W: Write>(w: &mut W, row: &OpcodeStat) -> io::Result<()> {
    writeln!(
        w,
        "{:<8} {:>12} {:>14} {:>7.2}%",
        row.opcode.name(),
        row.substitutions,
        row.executions,
        row.percent_of_dynamic
    )
}

/// Writes the `-p` summary to `stderr` and the full report to `profiler_report.txt`.
pub fn print_profile(program: &ExtendedProgram, report: &RunReport, elapsed: Duration) {
    let hotspots_arr = report
        .pc_hotspots
        .as_deref()
        .expect("profile flag implies pc_hotspots was collected");
    let instructions_per_second = if elapsed.as_secs_f64() > 0.0 {
        report.instructions_executed as f64 / elapsed.as_secs_f64()
    } else {
        0.0
    };
    let accesses_per_instruction = if report.instructions_executed > 0 {
        report.memory_accesses as f64 / report.instructions_executed as f64
    } else {
        0.0
    };

    eprintln!("---");
    eprintln!("total instructions     : {}", report.instructions_executed);
    eprintln!("total memory accesses  : {}", report.memory_accesses);
    eprintln!("instructions / second  : {instructions_per_second:.2}");
    eprintln!("memory accesses / inst : {accesses_per_instruction:.4}");

    let top_ten = stats::hotspots(hotspots_arr, program, report.instructions_executed, 0, 10);
    eprintln!("top {} hottest PCs:", top_ten.len());
    for hot in &top_ten {
        print_hotspot_row(&mut io::stderr(), hot).ok();
    }

    if let Err(e) = write_profiler_report(program, report, hotspots_arr) {
        eprintln!("warning: failed to write profiler_report.txt: {e}");
    }
}

fn print_hotspot_row<W: Write>(w: &mut W, hot: &HotSpot) -> io::Result<()> {
    writeln!(
        w,
        "  pc={:<6} count={:<10} {:>6.2}% {}",
        hot.pc, hot.count, hot.percent_of_total, hot.opcode.name()
    )
}

/// The full instruction mix plus every tracked hot spot (exec count > 100, up to
/// 64 entries, descending), matching §6's `profiler_report.txt` contract.
fn write_profiler_report(
    program: &ExtendedProgram,
    report: &RunReport,
    hotspots_arr: &[u64],
) -> io::Result<()> {
    let mut file = File::create("profiler_report.txt")?;

    writeln!(file, "SUBLEQ profiler report")?;
    writeln!(file, "total instructions: {}", report.instructions_executed)?;
    writeln!(file, "total memory accesses: {}", report.memory_accesses)?;
    writeln!(file)?;

    writeln!(file, "instruction mix:")?;
    let substitutions = program.substitution_counts();
    let rows = stats::opcode_table(&substitutions, &report.dynamic_counts, report.instructions_executed);
    for row in &rows {
        print_opcode_row(&mut file, row)?;
    }
    writeln!(file)?;

    let ranked = stats::hotspots(hotspots_arr, program, report.instructions_executed, 100, 64);
    writeln!(file, "hot spots (count > 100, top {}):", ranked.len())?;
    for hot in &ranked {
        print_hotspot_row(&mut file, hot)?;
    }

    Ok(())
}
