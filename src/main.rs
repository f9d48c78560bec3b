//! Lumen CLI: execute files or run the REPL.

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process;

use colored::Colorize;

use lumenlang::bytecode::Vm;
use lumenlang::error::LumenError;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// Exit codes follow the BSD sysexits convention.
const EX_USAGE: i32 = 64;
const EX_DATAERR: i32 = 65;
const EX_SOFTWARE: i32 = 70;
const EX_IOERR: i32 = 74;

/// CLI options parsed from arguments.
struct Options {
    script: Option<String>,
    disassemble: bool,
}

fn print_usage() {
    eprintln!("Lumen {} - Lumen Interpreter", VERSION);
    eprintln!();
    eprintln!("Usage: lumen [options] [script.lum]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --disassemble   Print bytecode before executing");
    eprintln!("  --help, -h      Show this help message");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  lumen                     Start interactive REPL");
    eprintln!("  lumen script.lum          Run a script file");
    eprintln!("  lumen --disassemble script.lum  Show bytecode, then run");
}

fn parse_args() -> Options {
    let mut options = Options {
        script: None,
        disassemble: false,
    };

    for arg in env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                process::exit(0);
            }
            "--disassemble" => options.disassemble = true,
            _ if arg.starts_with('-') => {
                eprintln!("{} unknown option '{}'", "error:".red().bold(), arg);
                print_usage();
                process::exit(EX_USAGE);
            }
            _ => {
                if options.script.is_some() {
                    eprintln!("{} expected a single script file", "error:".red().bold());
                    print_usage();
                    process::exit(EX_USAGE);
                }
                options.script = Some(arg);
            }
        }
    }

    options
}

/// Print each diagnostic an error carries and return the exit code.
fn report_error(error: &LumenError) -> i32 {
    match error {
        LumenError::Lexer(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            EX_DATAERR
        }
        LumenError::Parse(errors) => {
            for e in errors {
                eprintln!("{} {}", "error:".red().bold(), e);
            }
            EX_DATAERR
        }
        LumenError::Compile(errors) => {
            for e in errors {
                eprintln!("{} {}", "error:".red().bold(), e);
            }
            EX_DATAERR
        }
        LumenError::Runtime(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            EX_SOFTWARE
        }
        LumenError::Io(e) => {
            eprintln!("{} {}", "error:".red().bold(), e);
            EX_IOERR
        }
    }
}

fn run_file(path: &str, disassemble: bool) {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!(
                "{} could not read '{}': {}",
                "error:".red().bold(),
                path,
                e
            );
            process::exit(EX_IOERR);
        }
    };

    if let Err(error) = lumenlang::run_with_options(&source, disassemble) {
        process::exit(report_error(&error));
    }
}

/// Read-eval-print loop. Globals persist across lines, so a `var`
/// defined on one line is visible on the next.
fn run_repl(disassemble: bool) {
    println!("Lumen {} REPL. Press Ctrl-D to exit.", VERSION);

    let mut vm = Vm::new();
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                break;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        match lumenlang::compile(&line) {
            Ok(function) => {
                if disassemble {
                    print!("{}", lumenlang::disassemble(&function));
                    println!("---");
                }
                if let Err(error) = vm.interpret(function) {
                    report_error(&LumenError::from(error));
                }
            }
            Err(error) => {
                report_error(&error);
            }
        }
    }
}

fn main() {
    let options = parse_args();

    match options.script {
        Some(path) => run_file(&path, options.disassemble),
        None => run_repl(options.disassemble),
    }
}
