use crate::evaluator::Interpreter;
use std::io::{self, BufRead, Write};

/// Interactive shell. One interpreter lives for the whole session, so
/// variables and functions persist between lines until 'reset'.
pub fn start() {
    println!("=== codelang REPL ===");
    println!("Type 'exit' or 'quit' to exit");
    println!("Type 'reset' to clear all variables");
    println!("Type 'help' for help");
    println!();

    let mut interpreter = Interpreter::new();
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!(">>> ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line.trim().to_string(),
            Some(Err(error)) => {
                eprintln!("Error reading input: {}", error);
                break;
            }
            None => {
                // EOF (Ctrl+D or piped input ended)
                println!();
                break;
            }
        };

        if line.is_empty() {
            continue;
        }

        match line.as_str() {
            "exit" | "quit" => {
                println!("Goodbye!");
                break;
            }
            "reset" => {
                interpreter.reset();
                println!("Environment reset.");
                continue;
            }
            "help" => {
                print_help();
                continue;
            }
            _ => {}
        }

        // A line opening a block keeps reading until braces balance
        let source = if line.ends_with('{') {
            read_block(&mut lines, line)
        } else {
            line
        };

        if let Err(error) = interpreter.run_source(&source) {
            error.report(&source, None);
        }
    }
}

/// Collect continuation lines until every '{' has its '}'. EOF ends the
/// block early with whatever was collected.
fn read_block<I>(lines: &mut I, first: String) -> String
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut source = first;
    source.push('\n');
    let mut depth = 1i32;

    while depth > 0 {
        print!("... ");
        let _ = io::stdout().flush();

        let line = match lines.next() {
            Some(Ok(line)) => line,
            _ => break,
        };

        for c in line.chars() {
            if c == '{' {
                depth += 1;
            }
            if c == '}' {
                depth -= 1;
            }
        }

        source.push_str(&line);
        source.push('\n');
    }

    source
}

fn print_help() {
    println!("=== codelang Help ===");
    println!();
    println!("Available commands:");
    println!("  exit, quit  - Exit REPL");
    println!("  reset       - Clear all variables and functions");
    println!("  help        - Show this help");
    println!();
    println!("Example code:");
    println!("  int32 x = 5;");
    println!("  println(x);");
    println!();
    println!("  fn int32 add(int32 a, int32 b) {{");
    println!("    return a + b;");
    println!("  }}");
    println!();
}
