//! Command-line front end for `subleq-core`: loads an image file, runs it through
//! the engine with real stdio wired in, and renders the optional `-s`/`-p`
//! epilogue. See §6/§12 of the design notes for the CLI contract.

mod image;
mod report;
mod stdio;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use subleq_core::{disabled, optimize, HaltReason, Memory, Vm, VmError};

use crate::image::{load_image_file, LoadError};
use crate::stdio::StdioOutput;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a SUBLEQ image file (decimal integers, comma/whitespace separated).
    image: PathBuf,

    /// Disable the peephole optimizer; execute raw SUBLEQ only.
    #[arg(short = 'O', long = "no-optimize")]
    no_optimize: bool,

    /// Print end-of-run substitution/execution statistics.
    #[arg(short = 's', long = "stats")]
    stats: bool,

    /// Enable the profiler (PC heat map, hot-spot ranking, profiler_report.txt).
    #[arg(short = 'p', long = "profile")]
    profile: bool,

    /// Unknown extra arguments are warned about and ignored (§6), not rejected.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    extra: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.extra.is_empty() {
        eprintln!("warning: ignoring unknown arguments: {}", cli.extra.join(" "));
    }

    let words = match load_image_file(&cli.image) {
        Ok(words) => words,
        Err(err) => return report_load_error(&err),
    };

    let mut memory = Memory::new();
    let load_size = memory.load(&words);
    let program = if cli.no_optimize {
        disabled(&memory)
    } else {
        optimize(&memory, load_size)
    };

    let mut vm = Vm::new(memory, program);
    let mut input = io::stdin();
    let mut output = StdioOutput::new();

    let start = Instant::now();
    let run_result = vm.run(&mut input, &mut output, cli.profile, None);
    let elapsed = start.elapsed();

    let run_report = match run_result {
        Ok(run_report) => run_report,
        Err(err) => return report_vm_error(&err),
    };

    if cli.stats || cli.profile {
        report::print_stats(vm.program(), &run_report, elapsed);
    }
    if cli.profile {
        report::print_profile(vm.program(), &run_report, elapsed);
    }

    match run_report.halt_reason {
        HaltReason::PcOutOfRange | HaltReason::HaltOpcode | HaltReason::InputEof => {
            ExitCode::SUCCESS
        }
        // `run` is always called above with `max_steps: None`; this variant exists
        // only for tests that bound a deliberately non-terminating raw program.
        HaltReason::StepLimitReached => unreachable!("the CLI never sets a step bound"),
    }
}

fn report_load_error(err: &LoadError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::FAILURE
}

fn report_vm_error(err: &VmError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::FAILURE
}

#[cfg(test)]
mod cli_tests {
    use super::Cli;
    use clap::Parser;

    #[test]
    fn parses_bare_image_path() {
        let cli = Cli::try_parse_from(["subleq", "image.sq"]).unwrap();
        assert_eq!(cli.image.to_str(), Some("image.sq"));
        assert!(!cli.no_optimize);
        assert!(!cli.stats);
        assert!(!cli.profile);
        assert!(cli.extra.is_empty());
    }

    #[test]
    fn parses_all_three_flags() {
        let cli = Cli::try_parse_from(["subleq", "-O", "-s", "-p", "image.sq"]).unwrap();
        assert!(cli.no_optimize);
        assert!(cli.stats);
        assert!(cli.profile);
    }

    #[test]
    fn long_flag_aliases_match_the_short_forms() {
        let cli =
            Cli::try_parse_from(["subleq", "--no-optimize", "--stats", "--profile", "image.sq"])
                .unwrap();
        assert!(cli.no_optimize);
        assert!(cli.stats);
        assert!(cli.profile);
    }

    #[test]
    fn unknown_trailing_arguments_are_captured_not_rejected() {
        let cli = Cli::try_parse_from(["subleq", "image.sq", "--bogus", "extra"]).unwrap();
        assert_eq!(cli.extra, vec!["--bogus", "extra"]);
    }

    #[test]
    fn missing_image_path_is_a_parse_error() {
        assert!(Cli::try_parse_from(["subleq"]).is_err());
    }
}
