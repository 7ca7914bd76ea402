pub mod analyzer;
pub mod ast;
pub mod cli;
pub mod codegen;
pub mod diag;
pub mod ir;
pub mod lexer;
pub mod parser;
pub mod position;
pub mod project;
pub mod source;
pub mod target;
pub mod token;
pub mod types;

use std::path::Path;

use diag::ErrorHandler;
use target::Platform;

/// Run the whole pipeline over one source file. Returns the emitted NASM
/// text, or `None` once any stage has reported an error to the sink; the
/// caller decides when and how diagnostics are printed.
pub fn compile(
    source: &Path,
    platform: Platform,
    handler: &mut ErrorHandler,
    verbose: bool,
) -> Option<String> {
    let mut lexer = lexer::Lexer::new(handler);
    if !lexer.analyze(source) {
        return None;
    }
    let tokens = lexer.into_tokens();
    if verbose {
        print!("{}", token::dump_tokens(&tokens));
    }

    let mut program = parser::Parser::new(tokens, handler).parse();
    if handler.has_errors() {
        return None;
    }
    if verbose {
        print!("{program}");
    }

    if !analyzer::Analyzer::new(handler).analyze(&mut program) {
        return None;
    }

    let (mut instructions, externals) = codegen::generate(&program, platform, handler);
    if handler.has_errors() {
        return None;
    }

    codegen::validate(&mut instructions);
    if verbose {
        print!("{}", ir::dump_instructions(&instructions));
    }

    Some(codegen::emit(&instructions, &externals, platform))
}
