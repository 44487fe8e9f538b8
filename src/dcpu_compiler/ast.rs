// Abstract Syntax Tree definitions for the DCPU-16 source language

use std::fmt;

/// Line/column of a node in the source text (both 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePos {
    pub line: usize,
    pub column: usize,
}

impl SourcePos {
    pub fn new(line: usize, column: usize) -> Self {
        SourcePos { line, column }
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "line {} column {}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub body: Vec<Stmt>,
}

// Statements
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    FunctionDef {
        name: String,
        body: Vec<Stmt>,
    },
    Return(Option<Expr>),
    If {
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>, // a lone If here is an else-if
    },
    While {
        test: Expr,
        body: Vec<Stmt>,
    },
    For {
        init: Box<Stmt>,
        test: Expr,
        step: Box<Stmt>,
        body: Vec<Stmt>,
    },
    // a = b = value
    Assign {
        targets: Vec<Expr>,
        value: Expr,
    },
    Expr(Expr),
}

// Expressions
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: SourcePos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Num(u16),
    Name(String),

    // base[index]
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },

    Call {
        func: String,
    },

    BinOp {
        left: Box<Expr>,
        op: BinOp,
        right: Box<Expr>,
    },

    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
    },

    BoolOp {
        op: BoolOp,
        values: Vec<Expr>,
    },

    // left op0 c0 op1 c1 ...
    Compare {
        left: Box<Expr>,
        comparisons: Vec<(CmpOp, Expr)>,
    },
}

impl ExprKind {
    /// Human-readable node kind, used in diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            ExprKind::Num(_) => "an integer literal",
            ExprKind::Name(_) => "a name",
            ExprKind::Subscript { .. } => "an indexed access",
            ExprKind::Call { .. } => "a call",
            ExprKind::BinOp { .. } => "an arithmetic expression",
            ExprKind::UnaryOp { .. } => "a unary expression",
            ExprKind::BoolOp { .. } => "a boolean expression",
            ExprKind::Compare { .. } => "a comparison",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mult => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::Pow => "**",
        };
        write!(f, "{}", symbol)
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "not"),
            UnaryOp::Neg => write!(f, "-"),
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            CmpOp::Eq => "==",
            CmpOp::NotEq => "!=",
            CmpOp::Lt => "<",
            CmpOp::LtE => "<=",
            CmpOp::Gt => ">",
            CmpOp::GtE => ">=",
        };
        write!(f, "{}", symbol)
    }
}

impl Stmt {
    pub fn new(kind: StmtKind, pos: SourcePos) -> Self {
        Stmt { kind, pos }
    }
}

impl Expr {
    pub fn new(kind: ExprKind, pos: SourcePos) -> Self {
        Expr { kind, pos }
    }

    pub fn name(name: &str, pos: SourcePos) -> Self {
        Expr::new(ExprKind::Name(name.to_string()), pos)
    }

    pub fn num(value: u16, pos: SourcePos) -> Self {
        Expr::new(ExprKind::Num(value), pos)
    }
}
