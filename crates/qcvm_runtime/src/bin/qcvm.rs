//! qcvm CLI entry point.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use qcvm_runtime::Session;
use qcvm_vm::{BuiltinNumbering, VmConfig};
use tracing_subscriber::EnvFilter;

/// CLI configuration parsed from arguments.
#[derive(Default)]
struct CliConfig {
    progs: Option<PathBuf>,
    show_help: bool,
    show_version: bool,
    // Inspection
    list_functions: bool,
    list_globals: bool,
    list_fields: bool,
    disasm: Vec<String>,
    // Execution
    run: Vec<String>,
    time: Option<f32>,
    active: bool,
    trace: bool,
    profile: Option<usize>,
    no_remap: bool,
    max_edicts: Option<usize>,
    seed: Option<u64>,
    // State
    dump_edicts: bool,
    save: Option<PathBuf>,
    restore: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("\x1b[31mError: {e}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

fn value<T: std::str::FromStr>(
    args: &[String],
    i: &mut usize,
    flag: &str,
) -> Result<T, Box<dyn std::error::Error>> {
    *i += 1;
    let raw = args
        .get(*i)
        .ok_or_else(|| format!("{flag} requires a value"))?;
    Ok(raw
        .parse()
        .map_err(|_| format!("invalid {flag} value: {raw}"))?)
}

fn parse_args(args: &[String]) -> Result<CliConfig, Box<dyn std::error::Error>> {
    let mut config = CliConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => config.show_help = true,
            "-V" | "--version" => config.show_version = true,
            "--functions" => config.list_functions = true,
            "--globals" => config.list_globals = true,
            "--fields" => config.list_fields = true,
            "--disasm" => config.disasm.push(value(args, &mut i, "--disasm")?),
            "--run" => config.run.push(value(args, &mut i, "--run")?),
            "--time" => config.time = Some(value(args, &mut i, "--time")?),
            "--active" => config.active = true,
            "--trace" => config.trace = true,
            "--profile" => config.profile = Some(10),
            "--profile-top" => config.profile = Some(value(args, &mut i, "--profile-top")?),
            "--no-remap" => config.no_remap = true,
            "--max-edicts" => config.max_edicts = Some(value(args, &mut i, "--max-edicts")?),
            "--seed" => config.seed = Some(value(args, &mut i, "--seed")?),
            "--dump-edicts" => config.dump_edicts = true,
            "--save" => config.save = Some(value(args, &mut i, "--save")?),
            "--restore" => config.restore = Some(value(args, &mut i, "--restore")?),
            arg if arg.starts_with('-') => {
                return Err(format!("unknown option: {arg}").into());
            }
            path => {
                if config.progs.replace(PathBuf::from(path)).is_some() {
                    return Err("only one program image may be given".into());
                }
            }
        }
        i += 1;
    }

    Ok(config)
}

fn init_logging(trace: bool) {
    let default = if trace {
        "info,qcvm::trace=trace"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn vm_config(cli: &CliConfig) -> VmConfig {
    let mut config = VmConfig::default().with_trace(cli.trace);
    if cli.no_remap {
        config = config.with_builtin_numbering(BuiltinNumbering::Default);
    }
    if let Some(max) = cli.max_edicts {
        let initial = config.initial_edicts.min(max);
        let batch = config.edict_batch;
        config = config.with_edicts(initial, batch, max);
    }
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    config
}

fn section(title: &str, lines: &[String]) {
    println!("\x1b[1;36m=== {title} ===\x1b[0m");
    for line in lines {
        println!("{line}");
    }
    println!();
}

fn run(args: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let cli = parse_args(&args)?;

    if cli.show_help {
        print_help();
        return Ok(());
    }

    if cli.show_version {
        println!("qcvm {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logging(cli.trace);

    let path = cli
        .progs
        .clone()
        .unwrap_or_else(|| PathBuf::from("progs.dat"));
    let mut session = Session::open(&path, vm_config(&cli))?;

    if let Some(saved) = &cli.restore {
        session.load_snapshot(saved)?;
    }

    if cli.list_functions {
        section("Functions", &session.function_listing());
    }
    if cli.list_globals {
        section("Globals", &session.global_listing());
    }
    if cli.list_fields {
        section("Fields", &session.field_listing());
    }
    for name in &cli.disasm {
        section(name, &session.disassemble(name)?);
    }

    if let Some(time) = cli.time {
        session.vm_mut().set_time(time)?;
    }
    if cli.active {
        session.activate();
    }
    for name in &cli.run {
        session.run(name)?;
    }

    if let Some(top) = cli.profile {
        let lines: Vec<String> = session
            .vm()
            .profile(top)
            .iter()
            .map(|e| format!("{:>10} {:>8} {}", e.statements, e.calls, e.name))
            .collect();
        section("Profile (statements, calls)", &lines);
    }

    if cli.dump_edicts {
        section("Edicts", &session.edict_dump());
    }

    if let Some(out) = &cli.save {
        session.save(out)?;
    }

    Ok(())
}

fn print_help() {
    println!(
        "\x1b[1mqcvm\x1b[0m - QuakeC progs inspector and runner

\x1b[1mUSAGE:\x1b[0m
    qcvm [OPTIONS] [PROGS]

\x1b[1mARGUMENTS:\x1b[0m
    [PROGS]    Program image to load (default: progs.dat)

\x1b[1mOPTIONS:\x1b[0m
    -h, --help           Print help information
    -V, --version        Print version information

\x1b[1mINSPECTION:\x1b[0m
    --functions          List functions and builtin bindings
    --globals            List global definitions with values
    --fields             List entity fields
    --disasm NAME        Disassemble a function (repeatable)

\x1b[1mEXECUTION:\x1b[0m
    --run NAME           Run a function (repeatable, in order)
    --time T             Set the time global before running
    --active             Run with the world entity read-only
    --trace              Log every executed statement
    --profile            Print the 10 busiest functions
    --profile-top N      Print the N busiest functions
    --no-remap           Keep compiled-in builtin numbers
    --max-edicts N       Limit the number of entities
    --seed N             Seed for the random builtin

\x1b[1mSTATE:\x1b[0m
    --dump-edicts        Dump every live entity after running
    --save PATH          Save a snapshot after running
    --restore PATH       Restore a snapshot before running

\x1b[1mEXAMPLES:\x1b[0m
    qcvm --functions progs.dat
    qcvm --disasm worldspawn progs.dat
    qcvm --run main --profile progs.dat
    qcvm --run worldspawn --save start.sav progs.dat

Set RUST_LOG to change the log filter (default: info)."
    );
}
