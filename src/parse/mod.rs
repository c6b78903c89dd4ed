//! Declaration parser — lexes and parses the supported C subset, driving
//! the frontend assembler's capture callbacks.

pub mod lexer;
pub mod parser;

pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::Result;
use crate::frontend::Frontend;

/// Parse a complete declaration source, populating the frontend's model.
pub fn parse(source: &str, fe: &mut Frontend) -> Result<()> {
    let toks = Lexer::new(source).tokenize()?;
    Parser::new(toks, fe).parse()
}
