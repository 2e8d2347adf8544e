use crate::evaluator::Interpreter;
use crate::lexer::Lexer;
use crate::parser::Parser;

/// Run a whole source file through the pipeline with a fresh interpreter.
/// Errors are reported against the source; returns whether the run
/// completed cleanly. Verbose mode traces the pipeline stages.
pub fn run(source: &str, filename: Option<&str>, verbose: bool) -> bool {
    if verbose {
        println!("=== Tokenizing ===");
    }

    let mut lexer = Lexer::new(source.to_string());
    let tokens = match lexer.scan_tokens() {
        Ok(tokens) => tokens,
        Err(error) => {
            error.report(source, filename);
            return false;
        }
    };

    if verbose {
        println!("Tokens:");
        for token in &tokens {
            println!("  {:?} {:?}", token.token_type, token.lexeme);
        }
        println!();
        println!("=== Parsing ===");
    }

    let mut parser = Parser::new(tokens);
    let program = match parser.parse() {
        Ok(program) => program,
        Err(error) => {
            error.report(source, filename);
            return false;
        }
    };

    if verbose {
        println!("AST created successfully");
        println!();
        println!("=== Interpreting ===");
    }

    let mut interpreter = Interpreter::new();
    if let Err(error) = interpreter.interpret(&program) {
        error.report(source, filename);
        return false;
    }

    if verbose {
        println!();
        println!("=== Execution completed ===");
    }

    true
}
