//! Uniform syntax-tree node kinds shared by both dialect grammars.
//!
//! The two grammars model some constructs differently (legacy try/except,
//! single-item `with`, statement-form `print`); the node set here is the
//! normalized view downstream analyses consume. Constructs no analysis
//! inspects are collapsed to [`Stmt::Other`] / [`Expr::Other`] instead of
//! failing the parse.

/// The grammar family a tree was parsed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// The 3.x grammar line.
    Modern,
    /// The 2.x grammar line.
    Legacy,
}

impl Dialect {
    pub fn is_modern(self) -> bool {
        matches!(self, Dialect::Modern)
    }

    pub fn is_legacy(self) -> bool {
        matches!(self, Dialect::Legacy)
    }
}

/// A parsed module: the dialect that accepted it plus its top-level body.
///
/// Value object; immutable after construction and discarded once the
/// consuming analysis completes.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxTree {
    pub dialect: Dialect,
    pub body: Vec<Stmt>,
}

/// One name bound by an import statement, with its optional rebinding.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub asname: Option<String>,
}

/// An `except` clause. Both dialects' handler shapes normalize to this.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptHandler {
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
}

/// One context manager of a `with` statement. The legacy grammar's nested
/// single-item form is flattened into the item list.
#[derive(Debug, Clone, PartialEq)]
pub struct WithItem {
    pub context_expr: Expr,
}

/// A keyword argument in a call; `arg` is `None` for `**` expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: Option<String>,
    pub value: Expr,
}

/// Statement kinds exposed to analyses.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import {
        names: Vec<Alias>,
    },
    ImportFrom {
        /// `None` for `from . import x` style dot-only sources.
        module: Option<String>,
        names: Vec<Alias>,
        /// Relative-import level; 0 means absolute.
        level: u32,
    },
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    For {
        iter: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    Try {
        body: Vec<Stmt>,
        handlers: Vec<ExceptHandler>,
        orelse: Vec<Stmt>,
        finalbody: Vec<Stmt>,
    },
    FunctionDef {
        name: String,
        body: Vec<Stmt>,
    },
    ClassDef {
        name: String,
        body: Vec<Stmt>,
    },
    With {
        items: Vec<WithItem>,
        body: Vec<Stmt>,
    },
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    Return {
        value: Option<Expr>,
    },
    Raise {
        exc: Option<Expr>,
    },
    Expr {
        value: Expr,
    },
    /// Any statement no analysis inspects (pass, del, assert, augmented
    /// assignment, annotation, print/exec statements, ...).
    Other,
}

/// Expression kinds exposed to analyses.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Name {
        id: String,
    },
    Constant(Literal),
    Subscript {
        value: Box<Expr>,
    },
    Compare {
        left: Box<Expr>,
        comparators: Vec<Expr>,
    },
    BoolOp {
        values: Vec<Expr>,
    },
    Tuple {
        elts: Vec<Expr>,
    },
    /// Any expression no analysis inspects (arithmetic, displays, lambdas,
    /// comprehensions, unary/starred forms, ...).
    Other,
}

/// Literal payloads carried by [`Expr::Constant`].
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Bytes,
    Number(String),
    Bool(bool),
    None,
    Ellipsis,
}

impl Expr {
    /// The dotted name of a call target or attribute chain, when the chain
    /// bottoms out in a plain name: `pkg.mod.func(...)` -> `"pkg.mod.func"`.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expr::Call { func, .. } => func.dotted_name(),
            Expr::Attribute { value, attr } => {
                let base = value.dotted_name()?;
                Some(format!("{base}.{attr}"))
            }
            Expr::Name { id } => Some(id.clone()),
            _ => None,
        }
    }
}
