//! Recursive-descent parser over the declaration token stream.
//!
//! The parser owns no model state; it drives the [`Frontend`] callbacks in
//! the order the assembler expects. Declarations the model cannot express
//! (unions, function declarators, unnamed untypedef'd structs) are skipped
//! with a warning rather than aborting the run.

use tracing::{debug, warn};

use crate::frontend::{Frontend, SymKind};
use crate::parse::lexer::{Token, TokenKind};
use crate::{Error, Result};

/// Words that may make up a native type name.
const TYPE_WORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "_Bool",
];

/// Qualifiers and storage specifiers with no effect on the model.
const SKIP_WORDS: &[&str] = &[
    "const", "volatile", "restrict", "static", "extern", "register", "inline",
];

enum Declarator {
    Named(String),
    Unnamed,
    /// A `(`-introduced declarator: function or function pointer.
    Function,
}

pub struct Parser<'a> {
    toks: Vec<Token>,
    pos: usize,
    fe: &'a mut Frontend,
}

impl<'a> Parser<'a> {
    pub fn new(toks: Vec<Token>, fe: &'a mut Frontend) -> Self {
        Parser { toks, pos: 0, fe }
    }

    fn peek(&self) -> &Token {
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        self.fe.set_line(tok.line);
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn err(&self, msg: impl Into<String>) -> Error {
        Error::Syntax {
            line: self.peek().line,
            msg: msg.into(),
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<()> {
        if self.peek().is_punct(p) {
            self.bump();
            Ok(())
        } else {
            Err(self.err(format!("expected '{p}', found '{}'", self.peek().text)))
        }
    }

    fn skip_qualifiers(&mut self) {
        while self.peek().kind == TokenKind::Ident && SKIP_WORDS.contains(&self.peek().text.as_str())
        {
            self.bump();
        }
    }

    /// Skip to the next `;` at brace/paren depth zero (consuming it), or
    /// stop short of a scope-closing `}`.
    fn skip_declaration(&mut self) {
        let mut depth = 0usize;
        while !self.at_eof() {
            let tok = self.peek();
            if depth == 0 {
                if tok.is_punct(";") {
                    self.bump();
                    return;
                }
                if tok.is_punct("}") {
                    return;
                }
            }
            if tok.is_punct("{") || tok.is_punct("(") {
                depth += 1;
            } else if tok.is_punct("}") || tok.is_punct(")") {
                depth = depth.saturating_sub(1);
            }
            self.bump();
        }
    }

    /// `_Pragma ( "..." )`
    fn parse_pragma_operator(&mut self) -> Result<()> {
        self.bump(); // _Pragma
        self.expect_punct("(")?;
        let tok = self.bump();
        if tok.kind != TokenKind::StrLit {
            return Err(self.err("expected string literal in _Pragma"));
        }
        self.expect_punct(")")?;
        self.fe.handle_pragma(&tok.text);
        Ok(())
    }

    //
    // Top level
    //

    pub fn parse(&mut self) -> Result<()> {
        while !self.at_eof() {
            let tok = self.peek().clone();
            self.fe.set_line(tok.line);
            match tok.kind {
                TokenKind::Pragma => {
                    self.bump();
                    self.fe.handle_pragma(&tok.text);
                }
                TokenKind::Punct if tok.text == ";" => {
                    self.bump();
                }
                TokenKind::Ident if tok.text == "_Pragma" => {
                    self.parse_pragma_operator()?;
                }
                TokenKind::Ident if tok.text == "typedef" => {
                    self.parse_typedef()?;
                }
                TokenKind::Ident if tok.text == "struct" => {
                    self.parse_struct_specifier()?;
                    self.skip_declaration();
                }
                TokenKind::Ident if tok.text == "union" => {
                    warn!(line = tok.line, "skipping unsupported union declaration");
                    self.skip_declaration();
                }
                TokenKind::Ident if tok.text == "enum" => {
                    self.parse_enum_specifier()?;
                    self.skip_declaration();
                }
                _ => {
                    debug!(line = tok.line, "skipping declaration of no interest");
                    self.skip_declaration();
                }
            }
        }
        Ok(())
    }

    //
    // Typedefs
    //

    fn parse_typedef(&mut self) -> Result<()> {
        self.bump(); // typedef
        self.skip_qualifiers();

        if self.peek().is_ident("union") {
            warn!(line = self.peek().line, "skipping unsupported union typedef");
            self.skip_declaration();
            self.fe.reset_info();
            return Ok(());
        }

        self.fe.capture(false);
        let mut base = self.parse_type_specifier()?;
        if let Some(base) = &base {
            self.fe.set_type(base);
        }

        loop {
            match self.parse_declarator()? {
                Declarator::Named(name) => {
                    self.fe.add_typedef_name(&name);
                    self.fe.set_name(&name);
                    self.fe.end_capture(false)?;
                    // `typedef struct {...} a, b;`: later declarators
                    // alias the first name.
                    if base.is_none() {
                        base = Some(name);
                    }
                }
                Declarator::Unnamed => {
                    return Err(self.err("typedef is missing a name"));
                }
                Declarator::Function => {
                    warn!(
                        line = self.peek().line,
                        "skipping unsupported function typedef"
                    );
                    self.skip_declaration();
                    self.fe.abort_capture();
                    self.fe.reset_info();
                    self.fe.drop_unnamed();
                    return Ok(());
                }
            }
            if self.peek().is_punct(",") {
                self.bump();
                self.fe.capture(false);
                self.fe.reset_info();
                if let Some(base) = &base {
                    self.fe.set_type(base);
                }
                continue;
            }
            break;
        }
        self.expect_punct(";")?;
        self.fe.reset_info();
        Ok(())
    }

    //
    // Specifiers
    //

    /// Parse a type specifier, returning the textual base type name, or
    /// `None` when an unnamed struct body was consumed (the frontend holds
    /// it pending).
    fn parse_type_specifier(&mut self) -> Result<Option<String>> {
        self.skip_qualifiers();
        let tok = self.peek().clone();

        if tok.is_ident("struct") {
            return self.parse_struct_specifier();
        }
        if tok.is_ident("enum") {
            self.parse_enum_specifier()?;
            // Enumerations are integer-shaped as far as serialization goes.
            return Ok(Some("int".to_string()));
        }

        // Multi-word native type names, kept textually.
        if tok.kind == TokenKind::Ident && TYPE_WORDS.contains(&tok.text.as_str()) {
            let mut words: Vec<String> = Vec::new();
            while self.peek().kind == TokenKind::Ident
                && TYPE_WORDS.contains(&self.peek().text.as_str())
            {
                words.push(self.bump().text);
                self.skip_qualifiers();
            }
            return Ok(Some(words.join(" ")));
        }

        if tok.kind == TokenKind::Ident {
            // A typedef name, or (leniently) an identifier the model may
            // still know about; the frontend reports unknown types.
            if self.fe.sym_type(&tok.text) == SymKind::EnumConstant {
                return Err(self.err(format!("'{}' is not a type name", tok.text)));
            }
            self.bump();
            return Ok(Some(tok.text));
        }

        Err(self.err(format!("expected type name, found '{}'", tok.text)))
    }

    /// Parse a struct specifier: a plain `struct tag` reference, or a
    /// definition with a member body. Returns the registry name, or `None`
    /// for an unnamed definition.
    fn parse_struct_specifier(&mut self) -> Result<Option<String>> {
        self.bump(); // struct
        let tag = if self.peek().kind == TokenKind::Ident {
            Some(self.bump().text)
        } else {
            None
        };
        let name = tag.map(|t| Frontend::struct_name(&t));
        if let Some(name) = &name {
            // Tags are resolvable from the moment they are seen, so
            // self-referential and forward-referencing members validate.
            self.fe.add_placeholder(name);
        }

        if !self.peek().is_punct("{") {
            return match name {
                Some(name) => Ok(Some(name)),
                None => Err(self.err("anonymous struct without a body")),
            };
        }

        self.bump(); // {
        self.fe.capture(true);
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Eof => return Err(self.err("unterminated struct body")),
                TokenKind::Punct if tok.text == "}" => break,
                TokenKind::Punct if tok.text == ";" => {
                    self.bump();
                }
                TokenKind::Pragma => {
                    self.bump();
                    self.fe.handle_pragma(&tok.text);
                }
                TokenKind::Ident if tok.text == "_Pragma" => {
                    self.parse_pragma_operator()?;
                }
                _ => self.parse_member_declaration()?,
            }
        }
        self.bump(); // }

        if let Some(name) = &name {
            self.fe.set_name(name);
        }
        self.fe.end_capture(true)?;
        Ok(name)
    }

    fn parse_enum_specifier(&mut self) -> Result<()> {
        self.bump(); // enum
        if self.peek().kind == TokenKind::Ident {
            self.bump(); // tag
        }
        if !self.peek().is_punct("{") {
            return Ok(());
        }
        self.bump();
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Eof => return Err(self.err("unterminated enum body")),
                TokenKind::Punct if tok.text == "}" => break,
                TokenKind::Punct if tok.text == "," => {
                    self.bump();
                }
                TokenKind::Ident => {
                    self.bump();
                    self.fe.add_enum_constant(&tok.text);
                    // Skip over an initializer expression, if any.
                    if self.peek().is_punct("=") {
                        let mut depth = 0usize;
                        loop {
                            let t = self.peek();
                            if t.kind == TokenKind::Eof {
                                break;
                            }
                            if depth == 0 && (t.is_punct(",") || t.is_punct("}")) {
                                break;
                            }
                            if t.is_punct("(") {
                                depth += 1;
                            } else if t.is_punct(")") {
                                depth = depth.saturating_sub(1);
                            }
                            self.bump();
                        }
                    }
                }
                _ => return Err(self.err(format!("unexpected '{}' in enum body", tok.text))),
            }
        }
        self.bump(); // }
        Ok(())
    }

    //
    // Members
    //

    fn parse_member_declaration(&mut self) -> Result<()> {
        let tok = self.peek().clone();
        self.fe.set_line(tok.line);

        if tok.is_ident("union") {
            warn!(line = tok.line, "skipping unsupported union member");
            self.skip_declaration();
            self.fe.reset_info();
            return Ok(());
        }

        let base = if tok.is_ident("struct") {
            match self.parse_struct_specifier()? {
                Some(name) => Some(name),
                None => {
                    // Unnamed struct members are not supported; leave the
                    // base unset so the frontend warns and moves on.
                    self.fe.drop_unnamed();
                    None
                }
            }
        } else {
            match self.parse_type_specifier() {
                Ok(base) => base,
                Err(_) => {
                    warn!(line = tok.line, "skipping unsupported member declaration");
                    self.skip_declaration();
                    self.fe.reset_info();
                    return Ok(());
                }
            }
        };
        if let Some(base) = &base {
            self.fe.set_type(base);
        }

        loop {
            match self.parse_declarator()? {
                Declarator::Function => {
                    warn!(
                        line = self.peek().line,
                        "skipping unsupported function member"
                    );
                    self.skip_declaration();
                    self.fe.reset_info();
                    return Ok(());
                }
                Declarator::Named(_) | Declarator::Unnamed => {}
            }
            // Bit-field width; the value does not affect serialization.
            if self.peek().is_punct(":") {
                self.bump();
                while !self.at_eof()
                    && !self.peek().is_punct(",")
                    && !self.peek().is_punct(";")
                {
                    self.bump();
                }
            }
            self.fe.capture_member()?;
            if self.peek().is_punct(",") {
                self.bump();
                if let Some(base) = &base {
                    self.fe.set_type(base);
                }
                continue;
            }
            break;
        }
        self.expect_punct(";")?;
        Ok(())
    }

    //
    // Declarators
    //

    fn parse_declarator(&mut self) -> Result<Declarator> {
        loop {
            if self.peek().is_punct("*") {
                self.bump();
                self.fe.note_pointer();
                self.skip_qualifiers();
                continue;
            }
            break;
        }

        if self.peek().is_punct("(") {
            return Ok(Declarator::Function);
        }

        let name = if self.peek().kind == TokenKind::Ident {
            let name = self.bump().text;
            self.fe.set_name(&name);
            Some(name)
        } else {
            None
        };

        if self.peek().is_punct("(") {
            return Ok(Declarator::Function);
        }

        while self.peek().is_punct("[") {
            self.bump();
            let expr = self.array_extent_text()?;
            self.fe.note_array_size(&expr);
        }

        Ok(match name {
            Some(name) => Declarator::Named(name),
            None => Declarator::Unnamed,
        })
    }

    /// Collect the raw text of an array extent up to the matching `]`.
    fn array_extent_text(&mut self) -> Result<String> {
        let mut out = String::new();
        let mut depth = 0usize;
        loop {
            let tok = self.peek().clone();
            match tok.kind {
                TokenKind::Eof => return Err(self.err("unterminated array extent")),
                TokenKind::Punct if tok.text == "[" => {
                    depth += 1;
                }
                TokenKind::Punct if tok.text == "]" => {
                    if depth == 0 {
                        self.bump();
                        if out.is_empty() {
                            return Err(self.err("array extent is empty"));
                        }
                        return Ok(out);
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.bump();
            // Two word-like tokens in a row must stay separated.
            let alnum_boundary = out
                .chars()
                .last()
                .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
                && tok
                    .text
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
            if alnum_boundary {
                out.push(' ');
            }
            out.push_str(&tok.text);
        }
    }
}
