//! Minimal embedding: register a native callback and call it from a script.
//!
//! ```sh
//! cargo run --example hello
//! ```

use std::process::ExitCode;

use mujs::State;

fn main() -> ExitCode {
    let mut state = State::new();

    state.register("hello", 1, |frame| {
        println!("Hello, {}!", frame.arg_str(0));
        Ok(mujs::Value::Undefined)
    });

    match state.do_string("hello('world');") {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("hello: {err}");
            ExitCode::FAILURE
        }
    }
}
