//! mjs - script runner and interactive shell

use std::fs;
use std::process::ExitCode;

use clap::Parser;
use mujs::{Options, State};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

#[derive(Parser)]
#[command(name = "mjs", version, about = "Embeddable JavaScript interpreter")]
struct Args {
    /// Script file to run; starts a REPL when omitted
    file: Option<String>,

    /// Evaluate a snippet instead of a file
    #[arg(short = 'e', long = "eval", value_name = "CODE", conflicts_with = "file")]
    eval: Option<String>,

    /// Allow assignment to undeclared globals
    #[arg(long)]
    loose: bool,

    /// Print the compiled bytecode instead of running
    #[cfg(feature = "dump")]
    #[arg(long)]
    dump: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let mut state = State::with_options(Options {
        strict: !args.loose,
        ..Options::default()
    });

    #[cfg(feature = "dump")]
    if args.dump {
        return dump(&state, &args);
    }

    if let Some(code) = &args.eval {
        return run_source(&mut state, code);
    }
    if let Some(file) = &args.file {
        let source = match fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("mjs: cannot read {file}: {err}");
                return ExitCode::FAILURE;
            }
        };
        return run_source(&mut state, &source);
    }
    repl(&mut state)
}

/// Evaluate and print a non-undefined completion value, shell style.
fn run_source(state: &mut State, source: &str) -> ExitCode {
    match state.eval(source) {
        Ok(value) => {
            if !value.is_undefined() {
                println!("{value}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("mjs: {err}");
            ExitCode::FAILURE
        }
    }
}

fn repl(state: &mut State) -> ExitCode {
    println!("mjs - interactive shell, Ctrl+D to exit");

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            eprintln!("mjs: cannot start line editor: {err}");
            return ExitCode::FAILURE;
        }
    };
    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match state.eval(line) {
                    Ok(value) => {
                        if !value.is_undefined() {
                            println!("{value}");
                        }
                    }
                    Err(err) => println!("{err}"),
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("mjs: {err}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

#[cfg(feature = "dump")]
fn dump(state: &State, args: &Args) -> ExitCode {
    let source = match (&args.eval, &args.file) {
        (Some(code), _) => code.clone(),
        (None, Some(file)) => match fs::read_to_string(file) {
            Ok(source) => source,
            Err(err) => {
                eprintln!("mjs: cannot read {file}: {err}");
                return ExitCode::FAILURE;
            }
        },
        (None, None) => {
            eprintln!("mjs: --dump needs a file or -e CODE");
            return ExitCode::FAILURE;
        }
    };
    match state.disassemble(&source) {
        Ok(listing) => {
            print!("{listing}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("mjs: SyntaxError: {err}");
            ExitCode::FAILURE
        }
    }
}
