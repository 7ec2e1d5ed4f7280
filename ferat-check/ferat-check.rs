//! Verifier for the expansion step of FERAT proofs

use clap::Arg;
use ferat_common::{
    as_error, check::check_expansion, comment, config, expansion::Expansion,
    input::read_compressed_file, memory::{format_memory_usage, HeapSpace},
    output::{install_signal_handler, print_key_value, print_solution, Timer},
    puts, qbf::parse_qbf,
};
use std::io::{Error, ErrorKind};

/// Run `ferat-check`.
fn main() {
    std::process::exit(run_frontend());
}

/// Run `ferat-check`, returning its exit code.
///
/// This is a separate function because `std::process::exit` does not
/// call destructors.
fn run_frontend() -> i32 {
    install_signal_handler();
    let app = clap::App::new("ferat-check")
        .version(env!("CARGO_PKG_VERSION"))
        .version_short("v")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .after_help(
            "Input files may be compressed - supported file extensions are: zst, gz, bz2, xz and lz4.",
        )
        .arg(
            Arg::with_name("QBF")
                .required(true)
                .help("QBF input file in QDIMACS format"),
        )
        .arg(
            Arg::with_name("EXPANSION")
                .required(true)
                .help("expansion input file in DIMACS format with mapping comments"),
        )
        .arg(
            Arg::with_name("SILENT")
                .short("s")
                .long("silent")
                .help("Suppress warnings."),
        )
        .arg(
            Arg::with_name("MEMORY_USAGE_BREAKDOWN")
                .short("m")
                .long("memory-breakdown")
                .help("Output detailed memory usage metrics.")
                .hidden(true),
        );
    let matches = match app.get_matches_safe() {
        Ok(matches) => matches,
        Err(err) => match err.kind {
            clap::ErrorKind::HelpDisplayed | clap::ErrorKind::VersionDisplayed => {
                puts!("{}\n", err.message);
                return 0;
            }
            _ => {
                eprintln!("{}", err.message);
                return config::EXIT_CLI_FAILURE;
            }
        },
    };
    let qbf_filename = matches.value_of("QBF").unwrap();
    let expansion_filename = matches.value_of("EXPANSION").unwrap();
    let silent = matches.is_present("SILENT");

    let total_timer = timer("total time", silent);

    let phase_timer = timer("QBF parsing time", silent);
    let mut qbf_input = match read_compressed_file(qbf_filename, silent) {
        Ok(input) => input,
        Err(err) => return fatal("cannot open QBF input file", &err),
    };
    let mut qbf = match parse_qbf(&mut qbf_input) {
        Ok(qbf) => qbf,
        Err(err) => return fatal("failed to parse QBF", &err),
    };
    comment!(
        "Parsed QBF with max variable {} and {} clause[s]",
        qbf.max_var,
        qbf.matrix.number_of_clauses()
    );
    drop(phase_timer);

    let phase_timer = timer("QBF sorting time", silent);
    qbf.sort_matrix();
    comment!("Sorted QBF clauses by quantifier index");
    drop(phase_timer);

    let phase_timer = timer("expansion parsing time", silent);
    let expansion_input = match read_compressed_file(expansion_filename, silent) {
        Ok(input) => input,
        Err(err) => return fatal("cannot open CNF expansion file", &err),
    };
    let mut expansion = match Expansion::parse_preamble(expansion_input) {
        Ok(expansion) => expansion,
        Err(err) => return fatal("failed to parse CNF expansion", &err),
    };
    comment!(
        "Parsed CNF expansion with max variable {}, reporting {} clause[s]",
        expansion.p_max_var,
        expansion.p_num_clauses
    );
    drop(phase_timer);

    let phase_timer = timer("expansion verification time", silent);
    let result = match check_expansion(&mut qbf, &mut expansion) {
        Ok(result) => result,
        Err(err) => return fatal("failed to check expansion", &err),
    };
    drop(phase_timer);

    if matches.is_present("MEMORY_USAGE_BREAKDOWN") {
        print_key_value("memory-qbf (MB)", format_memory_usage(qbf.heap_space()));
        print_key_value(
            "memory-expansion (MB)",
            format_memory_usage(expansion.heap_space()),
        );
    }

    comment!("");
    let exit_code = if result.is_verified() {
        print_solution("VERIFIED");
        config::EXIT_VERIFIED
    } else {
        print_solution("NOT VERIFIED");
        result.print();
        config::EXIT_NOT_VERIFIED
    };
    comment!("");
    drop(total_timer);
    exit_code
}

/// Create a phase timer, silenced along with the warnings.
fn timer(name: &'static str, silent: bool) -> Timer {
    let mut timer = Timer::name(name);
    timer.disabled = silent;
    timer
}

/// Report an unrecoverable error and pick the exit code for it.
fn fatal(context: &str, err: &Error) -> i32 {
    as_error!({
        puts!("c {}: {}\n", context, err);
    });
    if err.kind() == ErrorKind::InvalidData {
        config::EXIT_PARSING_FAILURE
    } else {
        1
    }
}
