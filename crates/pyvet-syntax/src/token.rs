//! Indentation-aware tokenizer shared by both dialect grammars.
//!
//! Produces a flat token stream with synthetic `Indent`/`Dedent`/`Newline`
//! tokens, the way the analyzed language's own tokenizer does: physical
//! lines join inside brackets or after a trailing backslash, blank and
//! comment-only lines vanish, and tab stops advance to multiples of eight.
//! Dialect-divergent lexemes (string prefixes, `:=`, `<>`, backticks,
//! numeric suffixes and separators) are rejected here so each grammar only
//! ever sees tokens it can own.

use crate::{Dialect, SyntaxError};

/// One lexeme. Keywords are plain `Name` tokens; the grammars decide which
/// names are reserved.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Number(String),
    Str { prefix: String, value: String },
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

/// Multi-character operators, longest first so prefixes never win.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", ":=", "==", "!=", ">=", "<=", "<>", "<<", ">>", "**",
    "//", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "+", "-", "*", "/", "%", "&", "|",
    "^", "~", "<", ">", "=", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "@", "`",
];

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    depth: usize,
    indents: Vec<usize>,
    dialect: Dialect,
    tokens: Vec<Token>,
}

/// Tokenize a whole source file under one dialect's lexical rules.
pub fn tokenize(source: &str, dialect: Dialect) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        depth: 0,
        indents: vec![0],
        dialect,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn run(&mut self) -> Result<(), SyntaxError> {
        loop {
            self.handle_line_start()?;
            if self.pos >= self.chars.len() {
                break;
            }
            self.scan_logical_line()?;
        }
        // Close the final logical line and any open indentation.
        if !matches!(self.tokens.last().map(|t| &t.tok), None | Some(Tok::Newline)) {
            self.push(Tok::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Tok::Dedent);
        }
        self.push(Tok::EndMarker);
        Ok(())
    }

    /// Measure indentation at the start of a logical line, swallowing
    /// blank and comment-only lines, and emit Indent/Dedent tokens.
    fn handle_line_start(&mut self) -> Result<(), SyntaxError> {
        loop {
            let mut col = 0usize;
            while let Some(&c) = self.chars.get(self.pos) {
                match c {
                    ' ' => col += 1,
                    '\t' => col = col / 8 * 8 + 8,
                    '\x0c' => col = 0,
                    _ => break,
                }
                self.pos += 1;
            }
            match self.chars.get(self.pos) {
                None => return Ok(()),
                Some('\n') => {
                    self.pos += 1;
                    self.line += 1;
                }
                Some('\r') => {
                    self.pos += 1;
                }
                Some('#') => {
                    self.skip_comment();
                }
                Some(_) => {
                    let current = *self.indents.last().unwrap_or(&0);
                    if col > current {
                        self.indents.push(col);
                        self.push(Tok::Indent);
                    } else if col < current {
                        while col < *self.indents.last().unwrap_or(&0) {
                            self.indents.pop();
                            self.push(Tok::Dedent);
                        }
                        if col != *self.indents.last().unwrap_or(&0) {
                            return Err(self.err("unindent does not match any outer level"));
                        }
                    }
                    return Ok(());
                }
            }
        }
    }

    /// Scan tokens up to and including the logical end of line.
    fn scan_logical_line(&mut self) -> Result<(), SyntaxError> {
        while let Some(&c) = self.chars.get(self.pos) {
            match c {
                '\n' => {
                    self.pos += 1;
                    self.line += 1;
                    if self.depth == 0 {
                        self.push_at(Tok::Newline, self.line - 1);
                        return Ok(());
                    }
                }
                '\r' | ' ' | '\t' | '\x0c' => {
                    self.pos += 1;
                }
                '#' => {
                    self.skip_comment();
                }
                '\\' if matches!(self.chars.get(self.pos + 1), Some('\n'))
                    || matches!(
                        (self.chars.get(self.pos + 1), self.chars.get(self.pos + 2)),
                        (Some('\r'), Some('\n'))
                    ) =>
                {
                    while self.chars.get(self.pos) != Some(&'\n') {
                        self.pos += 1;
                    }
                    self.pos += 1;
                    self.line += 1;
                }
                '"' | '\'' => {
                    self.scan_string(String::new())?;
                }
                c if c.is_alphabetic() || c == '_' => {
                    self.scan_name_or_prefixed_string()?;
                }
                c if c.is_ascii_digit() => {
                    self.scan_number()?;
                }
                '.' if matches!(self.chars.get(self.pos + 1), Some(d) if d.is_ascii_digit()) => {
                    self.scan_number()?;
                }
                _ => {
                    self.scan_operator()?;
                }
            }
        }
        Ok(())
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.chars.get(self.pos) {
            if c == '\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn scan_name_or_prefixed_string(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        while let Some(&c) = self.chars.get(self.pos) {
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        if word.len() <= 2
            && word.chars().all(|c| "rbufRBUF".contains(c))
            && matches!(self.chars.get(self.pos), Some('"') | Some('\''))
        {
            if word.to_ascii_lowercase().contains('f') && self.dialect.is_legacy() {
                return Err(self.err("invalid string prefix"));
            }
            if word.to_ascii_lowercase().contains('u') && word.len() == 2 && self.dialect.is_modern()
            {
                // ur'' / ru'' combinations only ever existed in the legacy line.
                return Err(self.err("invalid string prefix"));
            }
            return self.scan_string(word);
        }
        self.push(Tok::Name(word));
        Ok(())
    }

    fn scan_string(&mut self, prefix: String) -> Result<(), SyntaxError> {
        let quote = self.chars[self.pos];
        let start_line = self.line;
        let triple = self.chars.get(self.pos + 1) == Some(&quote)
            && self.chars.get(self.pos + 2) == Some(&quote);
        self.pos += if triple { 3 } else { 1 };
        let mut value = String::new();
        loop {
            match self.chars.get(self.pos) {
                None => {
                    return Err(SyntaxError {
                        line: start_line,
                        message: if triple {
                            "EOF in multi-line string".into()
                        } else {
                            "EOL while scanning string literal".into()
                        },
                    });
                }
                Some('\\') => {
                    value.push('\\');
                    self.pos += 1;
                    if let Some(&next) = self.chars.get(self.pos) {
                        value.push(next);
                        self.pos += 1;
                        if next == '\n' {
                            self.line += 1;
                        }
                    }
                }
                Some(&c) if c == quote => {
                    if !triple {
                        self.pos += 1;
                        break;
                    }
                    if self.chars.get(self.pos + 1) == Some(&quote)
                        && self.chars.get(self.pos + 2) == Some(&quote)
                    {
                        self.pos += 3;
                        break;
                    }
                    value.push(c);
                    self.pos += 1;
                }
                Some('\n') if !triple => {
                    return Err(SyntaxError {
                        line: start_line,
                        message: "EOL while scanning string literal".into(),
                    });
                }
                Some(&c) => {
                    value.push(c);
                    self.pos += 1;
                    if c == '\n' {
                        self.line += 1;
                    }
                }
            }
        }
        self.push_at(Tok::Str { prefix, value }, start_line);
        Ok(())
    }

    fn scan_number(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        let radix_prefixed = self.chars[self.pos] == '0'
            && matches!(
                self.chars.get(self.pos + 1),
                Some('x') | Some('X') | Some('o') | Some('O') | Some('b') | Some('B')
            );
        if radix_prefixed {
            self.pos += 2;
            while matches!(self.chars.get(self.pos), Some(c) if c.is_ascii_alphanumeric() || *c == '_')
            {
                self.pos += 1;
            }
        } else {
            self.consume_digits();
            if self.chars.get(self.pos) == Some(&'.') {
                self.pos += 1;
                self.consume_digits();
            }
            if matches!(self.chars.get(self.pos), Some('e') | Some('E'))
                && matches!(self.chars.get(self.pos + 1), Some(c) if c.is_ascii_digit() || *c == '+' || *c == '-')
            {
                self.pos += 1;
                if matches!(self.chars.get(self.pos), Some('+') | Some('-')) {
                    self.pos += 1;
                }
                self.consume_digits();
            }
            if matches!(
                self.chars.get(self.pos),
                Some('j') | Some('J') | Some('l') | Some('L')
            ) {
                self.pos += 1;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if text.contains('_') && self.dialect.is_legacy() {
            return Err(self.err("invalid syntax in numeric literal"));
        }
        if (text.ends_with('l') || text.ends_with('L')) && self.dialect.is_modern() {
            return Err(self.err("invalid numeric literal suffix"));
        }
        self.push(Tok::Number(text));
        Ok(())
    }

    fn consume_digits(&mut self) {
        while matches!(self.chars.get(self.pos), Some(c) if c.is_ascii_digit() || *c == '_') {
            self.pos += 1;
        }
    }

    fn scan_operator(&mut self) -> Result<(), SyntaxError> {
        for op in OPERATORS {
            if self.matches_at(op) {
                match *op {
                    ":=" if self.dialect.is_legacy() => {
                        return Err(self.err("invalid syntax"));
                    }
                    "<>" if self.dialect.is_modern() => {
                        return Err(self.err("invalid syntax"));
                    }
                    "->" if self.dialect.is_legacy() => {
                        return Err(self.err("invalid syntax"));
                    }
                    "`" if self.dialect.is_modern() => {
                        return Err(self.err("invalid syntax"));
                    }
                    "(" | "[" | "{" => self.depth += 1,
                    ")" | "]" | "}" => self.depth = self.depth.saturating_sub(1),
                    _ => {}
                }
                self.pos += op.chars().count();
                self.push(Tok::Op(op));
                return Ok(());
            }
        }
        Err(self.err("invalid character"))
    }

    fn matches_at(&self, op: &str) -> bool {
        op.chars()
            .enumerate()
            .all(|(i, c)| self.chars.get(self.pos + i) == Some(&c))
    }

    fn push(&mut self, tok: Tok) {
        self.push_at(tok, self.line);
    }

    fn push_at(&mut self, tok: Tok, line: usize) {
        self.tokens.push(Token { tok, line });
    }

    fn err(&self, message: &str) -> SyntaxError {
        SyntaxError {
            line: self.line,
            message: message.into(),
        }
    }
}
