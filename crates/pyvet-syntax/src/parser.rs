//! Recursive-descent statement and expression grammars.
//!
//! One parser drives both dialects; every point where the two grammar
//! lines diverge (statement-form `print`/`exec`, comma except-targets,
//! annotations, `async`, walrus, tuple parameters, ...) is gated on the
//! dialect so that each grammar rejects the other's exclusive syntax.
//! Constructs outside the analyses' interest parse fully but collapse to
//! `Other` nodes.

use crate::ast::{Alias, Dialect, ExceptHandler, Expr, Keyword, Literal, Stmt, WithItem};
use crate::token::{tokenize, Tok, Token};
use crate::{SyntaxError, SyntaxTree};

const COMMON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "not", "or", "pass",
    "raise", "return", "try", "while", "with", "yield",
];

const AUG_OPS: &[&str] = &[
    "+=", "-=", "*=", "/=", "//=", "%=", "**=", ">>=", "<<=", "&=", "|=", "^=", "@=",
];

pub(crate) fn parse_module(source: &str, dialect: Dialect) -> Result<SyntaxTree, SyntaxError> {
    let tokens = tokenize(source, dialect)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        dialect,
    };
    let body = parser.parse_file()?;
    Ok(SyntaxTree { dialect, body })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    dialect: Dialect,
}

impl Parser {
    // ---- token plumbing ----

    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek2(&self) -> &Tok {
        let next = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[next].tok
    }

    fn at2_op(&self, op: &str) -> bool {
        matches!(self.peek2(), Tok::Op(o) if *o == op)
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn bump(&mut self) -> Tok {
        let tok = self.tokens[self.pos].tok.clone();
        if !matches!(tok, Tok::EndMarker) {
            self.pos += 1;
        }
        tok
    }

    fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Tok::Op(o) if *o == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<(), SyntaxError> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.err(&format!("expected {op:?}")))
        }
    }

    fn peek_name(&self) -> Option<&str> {
        match self.peek() {
            Tok::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    fn at_kw(&self, word: &str) -> bool {
        self.peek_name() == Some(word)
    }

    fn eat_kw(&mut self, word: &str) -> bool {
        if self.at_kw(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_kw(&mut self, word: &str) -> Result<(), SyntaxError> {
        if self.eat_kw(word) {
            Ok(())
        } else {
            Err(self.err(&format!("expected {word:?}")))
        }
    }

    fn expect_name(&mut self) -> Result<String, SyntaxError> {
        match self.bump() {
            Tok::Name(n) => Ok(n),
            _ => Err(self.err("expected name")),
        }
    }

    fn err(&self, message: &str) -> SyntaxError {
        SyntaxError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn is_reserved(&self, name: &str) -> bool {
        if COMMON_KEYWORDS.contains(&name) {
            return true;
        }
        match self.dialect {
            Dialect::Legacy => matches!(name, "print" | "exec"),
            Dialect::Modern => matches!(name, "nonlocal" | "async" | "await"),
        }
    }

    /// Whether the current token can begin an expression.
    fn starts_test(&self) -> bool {
        match self.peek() {
            Tok::Name(n) => {
                !self.is_reserved(n)
                    || matches!(n.as_str(), "lambda" | "not")
                    || (self.dialect.is_modern() && n == "await")
            }
            Tok::Number(_) | Tok::Str { .. } => true,
            Tok::Op(op) => {
                matches!(*op, "(" | "[" | "{" | "-" | "+" | "~" | "*" | "...")
                    || (*op == "`" && self.dialect.is_legacy())
            }
            _ => false,
        }
    }

    fn at_stmt_end(&self) -> bool {
        matches!(self.peek(), Tok::Newline | Tok::EndMarker) || self.at_op(";")
    }

    // ---- file / statements ----

    fn parse_file(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                Tok::Newline => {
                    self.bump();
                }
                Tok::EndMarker => break,
                _ => body.extend(self.parse_statement()?),
            }
        }
        Ok(body)
    }

    fn parse_statement(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if self.at_op("@") {
            return Ok(vec![self.parse_decorated()?]);
        }
        if let Some(word) = self.peek_name() {
            match word {
                "if" => return Ok(vec![self.parse_if_chain()?]),
                "while" => return Ok(vec![self.parse_while()?]),
                "for" => return Ok(vec![self.parse_for()?]),
                "try" => return Ok(vec![self.parse_try()?]),
                "with" => return Ok(vec![self.parse_with()?]),
                "def" => return Ok(vec![self.parse_funcdef()?]),
                "class" => return Ok(vec![self.parse_classdef()?]),
                "async" if self.dialect.is_modern() => {
                    return Ok(vec![self.parse_async_stmt()?]);
                }
                _ => {}
            }
        }
        self.parse_simple_line()
    }

    fn parse_simple_line(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut stmts = vec![self.parse_small_stmt()?];
        while self.eat_op(";") {
            if matches!(self.peek(), Tok::Newline | Tok::EndMarker) {
                break;
            }
            stmts.push(self.parse_small_stmt()?);
        }
        match self.peek() {
            Tok::Newline => {
                self.bump();
            }
            Tok::EndMarker => {}
            _ => return Err(self.err("invalid syntax")),
        }
        Ok(stmts)
    }

    fn parse_small_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        if let Some(word) = self.peek_name() {
            match word {
                "pass" | "break" | "continue" => {
                    self.bump();
                    return Ok(Stmt::Other);
                }
                "global" => return self.parse_name_list_stmt(),
                "nonlocal" if self.dialect.is_modern() => return self.parse_name_list_stmt(),
                "del" => {
                    self.bump();
                    self.parse_testlist(true)?;
                    return Ok(Stmt::Other);
                }
                "assert" => {
                    self.bump();
                    self.parse_test()?;
                    if self.eat_op(",") {
                        self.parse_test()?;
                    }
                    return Ok(Stmt::Other);
                }
                "print" if self.dialect.is_legacy() => return self.parse_print_stmt(),
                "exec" if self.dialect.is_legacy() => return self.parse_exec_stmt(),
                "return" => return self.parse_return(),
                "raise" => return self.parse_raise(),
                "import" => return self.parse_import(),
                "from" => return self.parse_from_import(),
                "yield" => {
                    let value = self.parse_yield_expr()?;
                    return Ok(Stmt::Expr { value });
                }
                _ => {}
            }
        }
        self.parse_expr_stmt()
    }

    fn parse_name_list_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        self.expect_name()?;
        while self.eat_op(",") {
            self.expect_name()?;
        }
        Ok(Stmt::Other)
    }

    fn parse_print_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        if self.at_stmt_end() {
            return Ok(Stmt::Other);
        }
        self.eat_op(">>");
        self.parse_test()?;
        while self.eat_op(",") {
            if self.at_stmt_end() {
                break;
            }
            self.parse_test()?;
        }
        Ok(Stmt::Other)
    }

    fn parse_exec_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        self.parse_test()?;
        if self.eat_kw("in") {
            self.parse_test()?;
            if self.eat_op(",") {
                self.parse_test()?;
            }
        }
        Ok(Stmt::Other)
    }

    fn parse_return(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        let value = if self.at_stmt_end() {
            None
        } else {
            Some(self.parse_testlist(true)?)
        };
        Ok(Stmt::Return { value })
    }

    fn parse_raise(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        if self.at_stmt_end() {
            return Ok(Stmt::Raise { exc: None });
        }
        let exc = self.parse_test()?;
        match self.dialect {
            Dialect::Modern => {
                if self.eat_kw("from") {
                    self.parse_test()?;
                }
            }
            Dialect::Legacy => {
                if self.eat_op(",") {
                    self.parse_test()?;
                    if self.eat_op(",") {
                        self.parse_test()?;
                    }
                }
            }
        }
        Ok(Stmt::Raise { exc: Some(exc) })
    }

    fn parse_import(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        let mut names = vec![self.parse_dotted_as_name()?];
        while self.eat_op(",") {
            names.push(self.parse_dotted_as_name()?);
        }
        Ok(Stmt::Import { names })
    }

    fn parse_dotted_as_name(&mut self) -> Result<Alias, SyntaxError> {
        let name = self.parse_dotted_name()?;
        let asname = if self.eat_kw("as") {
            Some(self.expect_name()?)
        } else {
            None
        };
        Ok(Alias { name, asname })
    }

    fn parse_dotted_name(&mut self) -> Result<String, SyntaxError> {
        let mut name = self.expect_name()?;
        while self.at_op(".") {
            self.bump();
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn parse_from_import(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        let mut level = 0u32;
        loop {
            if self.eat_op(".") {
                level += 1;
            } else if self.eat_op("...") {
                level += 3;
            } else {
                break;
            }
        }
        let module = if self.peek_name().is_some() && !self.at_kw("import") {
            Some(self.parse_dotted_name()?)
        } else {
            None
        };
        if module.is_none() && level == 0 {
            return Err(self.err("expected module name"));
        }
        self.expect_kw("import")?;
        let names = if self.eat_op("*") {
            vec![Alias {
                name: "*".into(),
                asname: None,
            }]
        } else if self.eat_op("(") {
            let names = self.parse_import_as_names(true)?;
            self.expect_op(")")?;
            names
        } else {
            self.parse_import_as_names(false)?
        };
        Ok(Stmt::ImportFrom {
            module,
            names,
            level,
        })
    }

    fn parse_import_as_names(&mut self, parenthesized: bool) -> Result<Vec<Alias>, SyntaxError> {
        let mut names = vec![self.parse_import_as_name()?];
        while self.eat_op(",") {
            if parenthesized && self.at_op(")") {
                break;
            }
            names.push(self.parse_import_as_name()?);
        }
        Ok(names)
    }

    fn parse_import_as_name(&mut self) -> Result<Alias, SyntaxError> {
        let name = self.expect_name()?;
        let asname = if self.eat_kw("as") {
            Some(self.expect_name()?)
        } else {
            None
        };
        Ok(Alias { name, asname })
    }

    fn parse_expr_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let first = self.parse_testlist(true)?;
        if self.at_op("=") {
            let mut targets = vec![first];
            let mut value = None;
            while self.eat_op("=") {
                let rhs = if self.at_kw("yield") {
                    self.parse_yield_expr()?
                } else {
                    self.parse_testlist(true)?
                };
                if self.at_op("=") {
                    targets.push(rhs);
                } else {
                    value = Some(rhs);
                }
            }
            return Ok(Stmt::Assign {
                targets,
                value: value.unwrap_or(Expr::Other),
            });
        }
        if let Tok::Op(op) = self.peek() {
            if AUG_OPS.contains(op) {
                let op = *op;
                if op == "@=" && self.dialect.is_legacy() {
                    return Err(self.err("invalid syntax"));
                }
                self.bump();
                if self.at_kw("yield") {
                    self.parse_yield_expr()?;
                } else {
                    self.parse_testlist(true)?;
                }
                return Ok(Stmt::Other);
            }
        }
        if self.at_op(":") {
            // Variable annotation, modern only.
            if self.dialect.is_legacy() {
                return Err(self.err("invalid syntax"));
            }
            self.bump();
            self.parse_test()?;
            if self.eat_op("=") {
                self.parse_testlist(true)?;
            }
            return Ok(Stmt::Other);
        }
        Ok(Stmt::Expr { value: first })
    }

    // ---- compound statements ----

    fn parse_suite(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        if matches!(self.peek(), Tok::Newline) {
            self.bump();
            if !matches!(self.bump(), Tok::Indent) {
                return Err(self.err("expected an indented block"));
            }
            let mut body = Vec::new();
            loop {
                match self.peek() {
                    Tok::Dedent => {
                        self.bump();
                        break;
                    }
                    Tok::EndMarker => return Err(self.err("expected dedent")),
                    _ => body.extend(self.parse_statement()?),
                }
            }
            Ok(body)
        } else {
            self.parse_simple_line()
        }
    }

    fn parse_if_chain(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump(); // `if` or `elif`
        let test = self.parse_namedexpr_test()?;
        self.expect_op(":")?;
        let body = self.parse_suite()?;
        let orelse = if self.at_kw("elif") {
            vec![self.parse_if_chain()?]
        } else if self.eat_kw("else") {
            self.expect_op(":")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::If { test, body, orelse })
    }

    fn parse_while(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        let test = self.parse_namedexpr_test()?;
        self.expect_op(":")?;
        let body = self.parse_suite()?;
        let orelse = if self.eat_kw("else") {
            self.expect_op(":")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::While { test, body, orelse })
    }

    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        self.parse_testlist(true)?; // target
        self.expect_kw("in")?;
        let iter = self.parse_testlist(false)?;
        self.expect_op(":")?;
        let body = self.parse_suite()?;
        let orelse = if self.eat_kw("else") {
            self.expect_op(":")?;
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt::For { iter, body, orelse })
    }

    fn parse_try(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        self.expect_op(":")?;
        let body = self.parse_suite()?;
        let mut handlers = Vec::new();
        let mut orelse = Vec::new();
        let mut finalbody = Vec::new();
        if self.at_kw("except") {
            while self.eat_kw("except") {
                let test = if self.at_op(":") {
                    None
                } else {
                    let t = Some(self.parse_test()?);
                    if self.eat_kw("as") {
                        self.expect_name()?;
                    } else if self.eat_op(",") {
                        if self.dialect.is_modern() {
                            return Err(self.err("invalid syntax"));
                        }
                        self.parse_testlist(false)?;
                    }
                    t
                };
                self.expect_op(":")?;
                let hbody = self.parse_suite()?;
                handlers.push(ExceptHandler { test, body: hbody });
            }
            if self.eat_kw("else") {
                self.expect_op(":")?;
                orelse = self.parse_suite()?;
            }
            if self.eat_kw("finally") {
                self.expect_op(":")?;
                finalbody = self.parse_suite()?;
            }
        } else {
            self.expect_kw("finally")?;
            self.expect_op(":")?;
            finalbody = self.parse_suite()?;
        }
        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finalbody,
        })
    }

    fn parse_with(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        let mut items = vec![self.parse_with_item()?];
        while self.eat_op(",") {
            items.push(self.parse_with_item()?);
        }
        self.expect_op(":")?;
        let body = self.parse_suite()?;
        Ok(Stmt::With { items, body })
    }

    fn parse_with_item(&mut self) -> Result<WithItem, SyntaxError> {
        let context_expr = self.parse_test()?;
        if self.eat_kw("as") {
            self.parse_test_or_star()?;
        }
        Ok(WithItem { context_expr })
    }

    fn parse_funcdef(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        let name = self.expect_name()?;
        self.expect_op("(")?;
        self.parse_params(")", true)?;
        self.expect_op(")")?;
        if self.dialect.is_modern() && self.eat_op("->") {
            self.parse_test()?;
        }
        self.expect_op(":")?;
        let body = self.parse_suite()?;
        Ok(Stmt::FunctionDef { name, body })
    }

    fn parse_classdef(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump();
        let name = self.expect_name()?;
        if self.eat_op("(") {
            self.parse_call_args()?;
        }
        self.expect_op(":")?;
        let body = self.parse_suite()?;
        Ok(Stmt::ClassDef { name, body })
    }

    fn parse_decorated(&mut self) -> Result<Stmt, SyntaxError> {
        while self.eat_op("@") {
            self.parse_test()?;
            if !matches!(self.bump(), Tok::Newline) {
                return Err(self.err("expected newline after decorator"));
            }
        }
        if self.at_kw("def") {
            self.parse_funcdef()
        } else if self.at_kw("class") {
            self.parse_classdef()
        } else if self.dialect.is_modern() && self.at_kw("async") {
            self.parse_async_stmt()
        } else {
            Err(self.err("expected def or class after decorator"))
        }
    }

    fn parse_async_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        self.bump(); // `async`
        if self.at_kw("def") {
            self.parse_funcdef()
        } else if self.at_kw("for") {
            self.parse_for()
        } else if self.at_kw("with") {
            self.parse_with()
        } else {
            Err(self.err("invalid syntax"))
        }
    }

    /// Parameter list for `def` (terminator `)`) or `lambda` (terminator `:`).
    fn parse_params(&mut self, terminator: &str, def_style: bool) -> Result<(), SyntaxError> {
        loop {
            if self.at_op(terminator) {
                return Ok(());
            }
            if self.eat_op("**") {
                self.parse_param_name(def_style)?;
            } else if self.eat_op("*") {
                if self.peek_name().is_some() {
                    self.parse_param_name(def_style)?;
                } else if self.dialect.is_modern() {
                    // Bare `*` keyword-only marker.
                } else {
                    return Err(self.err("invalid syntax"));
                }
            } else if self.at_op("/") {
                if self.dialect.is_legacy() {
                    return Err(self.err("invalid syntax"));
                }
                self.bump();
            } else if self.at_op("(") {
                if self.dialect.is_modern() {
                    return Err(self.err("invalid syntax"));
                }
                self.parse_tuple_param()?;
            } else if self.peek_name().is_some() {
                self.parse_param_name(def_style)?;
            } else {
                return Err(self.err("invalid parameter list"));
            }
            if self.eat_op("=") {
                self.parse_test()?;
            }
            if !self.eat_op(",") {
                if self.at_op(terminator) {
                    return Ok(());
                }
                return Err(self.err("invalid parameter list"));
            }
        }
    }

    fn parse_param_name(&mut self, def_style: bool) -> Result<(), SyntaxError> {
        self.expect_name()?;
        // A colon after a `def` parameter is an annotation; after a lambda
        // parameter it terminates the parameter list and stays unconsumed.
        if def_style && self.at_op(":") {
            if !self.dialect.is_modern() {
                return Err(self.err("invalid syntax"));
            }
            self.bump();
            self.parse_test()?;
        }
        Ok(())
    }

    /// Legacy-only nested tuple parameter: `def f((a, (b, c))): ...`
    fn parse_tuple_param(&mut self) -> Result<(), SyntaxError> {
        self.expect_op("(")?;
        loop {
            if self.at_op("(") {
                self.parse_tuple_param()?;
            } else {
                self.expect_name()?;
            }
            if !self.eat_op(",") {
                break;
            }
            if self.at_op(")") {
                break;
            }
        }
        self.expect_op(")")
    }

    // ---- expressions ----

    fn parse_namedexpr_test(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.parse_test()?;
        if self.dialect.is_modern() && self.eat_op(":=") {
            self.parse_test()?;
            return Ok(Expr::Other);
        }
        Ok(expr)
    }

    fn parse_test(&mut self) -> Result<Expr, SyntaxError> {
        if self.at_kw("lambda") {
            return self.parse_lambda();
        }
        let expr = self.parse_or_test()?;
        if self.at_kw("if") {
            self.bump();
            self.parse_or_test()?;
            self.expect_kw("else")?;
            self.parse_test()?;
            return Ok(Expr::Other);
        }
        Ok(expr)
    }

    fn parse_lambda(&mut self) -> Result<Expr, SyntaxError> {
        self.bump();
        self.parse_params(":", false)?;
        self.expect_op(":")?;
        self.parse_test()?;
        Ok(Expr::Other)
    }

    fn parse_or_test(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.parse_and_test()?;
        if !self.at_kw("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_kw("or") {
            values.push(self.parse_and_test()?);
        }
        Ok(Expr::BoolOp { values })
    }

    fn parse_and_test(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.parse_not_test()?;
        if !self.at_kw("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_kw("and") {
            values.push(self.parse_not_test()?);
        }
        Ok(Expr::BoolOp { values })
    }

    fn parse_not_test(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat_kw("not") {
            self.parse_not_test()?;
            return Ok(Expr::Other);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.parse_bit_or()?;
        let mut comparators = Vec::new();
        loop {
            let is_cmp_op = ["<", ">", "==", ">=", "<=", "!=", "<>"]
                .iter()
                .any(|o| self.at_op(o));
            if is_cmp_op {
                self.bump();
            } else if self.at_kw("in") {
                self.bump();
            } else if self.at_kw("is") {
                self.bump();
                self.eat_kw("not");
            } else if self.at_kw("not") {
                self.bump();
                self.expect_kw("in")?;
            } else {
                break;
            }
            comparators.push(self.parse_bit_or()?);
        }
        if comparators.is_empty() {
            Ok(left)
        } else {
            Ok(Expr::Compare {
                left: Box::new(left),
                comparators,
            })
        }
    }

    fn parse_bit_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_bit_xor()?;
        while self.eat_op("|") {
            self.parse_bit_xor()?;
            expr = Expr::Other;
        }
        Ok(expr)
    }

    fn parse_bit_xor(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_bit_and()?;
        while self.eat_op("^") {
            self.parse_bit_and()?;
            expr = Expr::Other;
        }
        Ok(expr)
    }

    fn parse_bit_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_shift()?;
        while self.eat_op("&") {
            self.parse_shift()?;
            expr = Expr::Other;
        }
        Ok(expr)
    }

    fn parse_shift(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_arith()?;
        while self.at_op("<<") || self.at_op(">>") {
            self.bump();
            self.parse_arith()?;
            expr = Expr::Other;
        }
        Ok(expr)
    }

    fn parse_arith(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_term()?;
        while self.at_op("+") || self.at_op("-") {
            self.bump();
            self.parse_term()?;
            expr = Expr::Other;
        }
        Ok(expr)
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.parse_factor()?;
        loop {
            let matmul = self.at_op("@") && self.dialect.is_modern();
            if self.at_op("*") || self.at_op("/") || self.at_op("//") || self.at_op("%") || matmul {
                self.bump();
                self.parse_factor()?;
                expr = Expr::Other;
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_factor(&mut self) -> Result<Expr, SyntaxError> {
        if self.at_op("+") || self.at_op("-") || self.at_op("~") {
            self.bump();
            self.parse_factor()?;
            return Ok(Expr::Other);
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Expr, SyntaxError> {
        let base = self.parse_atom_expr()?;
        if self.eat_op("**") {
            self.parse_factor()?;
            return Ok(Expr::Other);
        }
        Ok(base)
    }

    fn parse_atom_expr(&mut self) -> Result<Expr, SyntaxError> {
        if self.dialect.is_modern() && self.at_kw("await") {
            self.bump();
            self.parse_atom()?;
            self.parse_trailers(Expr::Other)?;
            return Ok(Expr::Other);
        }
        let atom = self.parse_atom()?;
        self.parse_trailers(atom)
    }

    fn parse_trailers(&mut self, mut expr: Expr) -> Result<Expr, SyntaxError> {
        loop {
            if self.eat_op("(") {
                let (args, keywords) = self.parse_call_args()?;
                expr = Expr::Call {
                    func: Box::new(expr),
                    args,
                    keywords,
                };
            } else if self.eat_op("[") {
                self.parse_subscript_list()?;
                expr = Expr::Subscript {
                    value: Box::new(expr),
                };
            } else if self.at_op(".") {
                self.bump();
                let attr = self.expect_name()?;
                expr = Expr::Attribute {
                    value: Box::new(expr),
                    attr,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }

    /// Arguments of a call, after the opening paren; consumes the `)`.
    fn parse_call_args(&mut self) -> Result<(Vec<Expr>, Vec<Keyword>), SyntaxError> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        if self.eat_op(")") {
            return Ok((args, keywords));
        }
        loop {
            if self.eat_op("*") {
                self.parse_test()?;
                args.push(Expr::Other);
            } else if self.eat_op("**") {
                let value = self.parse_test()?;
                keywords.push(Keyword { arg: None, value });
            } else if let Tok::Name(n) = self.peek() {
                if self.at2_op("=") && !self.is_reserved(n) {
                    let arg = self.expect_name()?;
                    self.expect_op("=")?;
                    let value = self.parse_test()?;
                    keywords.push(Keyword {
                        arg: Some(arg),
                        value,
                    });
                } else {
                    let value = self.parse_arg_value()?;
                    args.push(value);
                }
            } else {
                let value = self.parse_arg_value()?;
                args.push(value);
            }
            if !self.eat_op(",") {
                break;
            }
            if self.at_op(")") {
                break;
            }
        }
        self.expect_op(")")?;
        Ok((args, keywords))
    }

    /// A positional argument, possibly a generator expression.
    fn parse_arg_value(&mut self) -> Result<Expr, SyntaxError> {
        let value = self.parse_namedexpr_test()?;
        if self.at_comprehension_head() {
            self.consume_comprehension()?;
            return Ok(Expr::Other);
        }
        Ok(value)
    }

    fn at_comprehension_head(&self) -> bool {
        self.at_kw("for") || (self.dialect.is_modern() && self.at_kw("async"))
    }

    fn consume_comprehension(&mut self) -> Result<(), SyntaxError> {
        loop {
            if self.dialect.is_modern() && self.at_kw("async") && matches!(self.peek2(), Tok::Name(n) if n == "for")
            {
                self.bump();
            }
            if self.eat_kw("for") {
                self.parse_testlist(true)?;
                self.expect_kw("in")?;
                self.parse_or_test()?;
            } else if self.eat_kw("if") {
                self.parse_or_test()?;
            } else {
                return Ok(());
            }
        }
    }

    fn parse_subscript_list(&mut self) -> Result<(), SyntaxError> {
        loop {
            if self.starts_test() {
                self.parse_test()?;
            }
            while self.eat_op(":") {
                if self.starts_test() {
                    self.parse_test()?;
                }
            }
            if !self.eat_op(",") {
                break;
            }
            if self.at_op("]") {
                break;
            }
        }
        self.expect_op("]")
    }

    fn parse_yield_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.bump(); // `yield`
        if self.eat_kw("from") {
            if self.dialect.is_legacy() {
                return Err(self.err("invalid syntax"));
            }
            self.parse_test()?;
        } else if self.starts_test() {
            self.parse_testlist(false)?;
        }
        Ok(Expr::Other)
    }

    fn parse_test_or_star(&mut self) -> Result<Expr, SyntaxError> {
        if self.eat_op("*") {
            self.parse_or_test()?;
            return Ok(Expr::Other);
        }
        self.parse_test()
    }

    fn parse_testlist(&mut self, allow_star: bool) -> Result<Expr, SyntaxError> {
        let first = if allow_star {
            self.parse_test_or_star()?
        } else {
            self.parse_test()?
        };
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut elts = vec![first];
        while self.eat_op(",") {
            if !self.starts_test() {
                break;
            }
            if allow_star {
                elts.push(self.parse_test_or_star()?);
            } else {
                elts.push(self.parse_test()?);
            }
        }
        Ok(Expr::Tuple { elts })
    }

    fn parse_atom(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek().clone() {
            Tok::Name(n) => match n.as_str() {
                "None" => {
                    self.bump();
                    Ok(Expr::Constant(Literal::None))
                }
                "True" => {
                    self.bump();
                    Ok(Expr::Constant(Literal::Bool(true)))
                }
                "False" => {
                    self.bump();
                    Ok(Expr::Constant(Literal::Bool(false)))
                }
                _ if self.is_reserved(&n) => Err(self.err("invalid syntax")),
                _ => {
                    self.bump();
                    Ok(Expr::Name { id: n })
                }
            },
            Tok::Number(n) => {
                self.bump();
                Ok(Expr::Constant(Literal::Number(n)))
            }
            Tok::Str { .. } => self.parse_string_atom(),
            Tok::Op("(") => self.parse_paren_atom(),
            Tok::Op("[") => self.parse_bracket_atom(),
            Tok::Op("{") => self.parse_brace_atom(),
            Tok::Op("`") if self.dialect.is_legacy() => {
                self.bump();
                self.parse_testlist(false)?;
                self.expect_op("`")?;
                Ok(Expr::Other)
            }
            Tok::Op("...") => {
                self.bump();
                Ok(Expr::Constant(Literal::Ellipsis))
            }
            _ => Err(self.err("invalid syntax")),
        }
    }

    /// Adjacent string literals concatenate into one constant.
    fn parse_string_atom(&mut self) -> Result<Expr, SyntaxError> {
        let mut text = String::new();
        let mut bytes = false;
        while let Tok::Str { prefix, value } = self.peek() {
            if prefix.to_ascii_lowercase().contains('b') {
                bytes = true;
            }
            text.push_str(value);
            self.bump();
        }
        if bytes {
            Ok(Expr::Constant(Literal::Bytes))
        } else {
            Ok(Expr::Constant(Literal::Str(text)))
        }
    }

    fn parse_paren_atom(&mut self) -> Result<Expr, SyntaxError> {
        self.bump();
        if self.eat_op(")") {
            return Ok(Expr::Tuple { elts: Vec::new() });
        }
        if self.at_kw("yield") {
            let expr = self.parse_yield_expr()?;
            self.expect_op(")")?;
            return Ok(expr);
        }
        let first = if self.at_op("*") {
            self.parse_test_or_star()?
        } else {
            self.parse_namedexpr_test()?
        };
        if self.at_comprehension_head() {
            self.consume_comprehension()?;
            self.expect_op(")")?;
            return Ok(Expr::Other);
        }
        if self.at_op(",") {
            let mut elts = vec![first];
            while self.eat_op(",") {
                if self.at_op(")") {
                    break;
                }
                elts.push(self.parse_test_or_star()?);
            }
            self.expect_op(")")?;
            return Ok(Expr::Tuple { elts });
        }
        self.expect_op(")")?;
        Ok(first)
    }

    fn parse_bracket_atom(&mut self) -> Result<Expr, SyntaxError> {
        self.bump();
        if self.eat_op("]") {
            return Ok(Expr::Other);
        }
        self.parse_test_or_star()?;
        if self.at_comprehension_head() {
            self.consume_comprehension()?;
        } else {
            while self.eat_op(",") {
                if self.at_op("]") {
                    break;
                }
                self.parse_test_or_star()?;
            }
        }
        self.expect_op("]")?;
        Ok(Expr::Other)
    }

    fn parse_brace_atom(&mut self) -> Result<Expr, SyntaxError> {
        self.bump();
        if self.eat_op("}") {
            return Ok(Expr::Other);
        }
        if self.at_op("**") {
            // Dict display with unpacking, modern only.
            if self.dialect.is_legacy() {
                return Err(self.err("invalid syntax"));
            }
            self.bump();
            self.parse_or_test()?;
            self.consume_dict_rest()?;
            return Ok(Expr::Other);
        }
        self.parse_test()?;
        if self.eat_op(":") {
            self.parse_test()?;
            if self.at_comprehension_head() {
                self.consume_comprehension()?;
            } else {
                self.consume_dict_rest()?;
                return Ok(Expr::Other);
            }
        } else if self.at_comprehension_head() {
            self.consume_comprehension()?;
        } else {
            while self.eat_op(",") {
                if self.at_op("}") {
                    break;
                }
                self.parse_test_or_star()?;
            }
        }
        self.expect_op("}")?;
        Ok(Expr::Other)
    }

    /// Remaining `key: value` pairs of a dict display; stops before `}`.
    fn consume_dict_rest(&mut self) -> Result<(), SyntaxError> {
        while self.eat_op(",") {
            if self.at_op("}") {
                break;
            }
            if self.at_op("**") {
                if self.dialect.is_legacy() {
                    return Err(self.err("invalid syntax"));
                }
                self.bump();
                self.parse_or_test()?;
            } else {
                self.parse_test()?;
                self.expect_op(":")?;
                self.parse_test()?;
            }
        }
        self.expect_op("}")
    }
}
