use std::{fs, process::ExitCode};

use clap::Parser;
use log::LevelFilter;
use wisp::tracer::TracingHook;
use wisp::{display_value, Context, Vm, VmConfig};

/// Run a wisp script file.
#[derive(Debug, Parser)]
#[command(name = "wisp", version, about)]
struct Cli {
    /// Path to the source file to run.
    script: String,

    /// Log every dispatched instruction at trace level (`RUST_LOG=trace`).
    #[arg(long)]
    trace: bool,

    /// Operand/call/environment stack capacities, in that order.
    #[arg(long, value_names = ["OPERAND", "CALL", "ENV"], num_args = 3)]
    stack_caps: Option<Vec<usize>>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    simple_logger::SimpleLogger::new().with_level(LevelFilter::Warn).init().expect("logger installs once");

    let source = match fs::read_to_string(&cli.script) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error reading {}: {err}", cli.script);
            return ExitCode::FAILURE;
        }
    };

    let config = match cli.stack_caps {
        Some(caps) => VmConfig { operand_cap: caps[0], call_cap: caps[1], env_cap: caps[2] },
        None => VmConfig::default(),
    };

    let mut ctx = Context::new();
    let script = match ctx.load_script(&cli.script, &source) {
        Ok(script) => script,
        Err(err) => {
            eprint!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.trace {
        let mut vm = Vm::with_hook(config, TracingHook);
        vm.exec(&mut ctx, &script)
    } else {
        let mut vm = Vm::new(config);
        vm.exec(&mut ctx, &script)
    };

    match result {
        Ok(value) => {
            println!("{}", display_value(value, &ctx.interns, &ctx.heap));
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprint!("{err}");
            ExitCode::FAILURE
        }
    }
}
