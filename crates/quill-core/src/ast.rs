//! Compiled template trees.
//!
//! Two closed node families: [`Stat`] for directives and text, [`Expr`] for
//! the expression language inside directive parentheses. Extension
//! directives plug in through [`Stat::Custom`]. A compiled tree is read-only
//! and shared by every render of its template.

use crate::{
    directive::Directive, error::EvalResult, error::RenderErrorKind, location::Location,
    scope::Assignment, value::Value,
};

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A literal scalar.
    Const(Value),
    /// A variable reference.
    Id(String),
    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `[a..b]`
    Range(Box<Expr>, Box<Expr>),
    /// `{key: value, "other": value}`
    Map(Vec<(String, Expr)>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    /// Short-circuiting operators.
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Ternary {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `target = value` and the compound forms. The target is an [`Expr::Id`],
    /// [`Expr::Field`] or [`Expr::Index`].
    Assign {
        op: AssignOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    /// `++x`, `x++`, `--x`, `x--`
    IncDec {
        op: IncDecOp,
        prefix: bool,
        target: Box<Expr>,
    },
    /// `target.name` or `target?.name`
    Field {
        target: Box<Expr>,
        name: String,
        null_safe: bool,
    },
    /// `target[index]`
    Index { target: Box<Expr>, index: Box<Expr> },
    /// `target.name(args)` or `target?.name(args)`
    Method {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
        null_safe: bool,
    },
    /// `name(args)`, resolved against the engine's shared methods.
    SharedMethod { name: String, args: Vec<Expr> },
}

impl Expr {
    /// Whether this expression may appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(self, Expr::Id(_) | Expr::Field { .. } | Expr::Index { .. })
    }

    /// Whether this is an assignment expression.
    pub fn is_assignment(&self) -> bool {
        matches!(self, Expr::Assign { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    /// `a ?? b`
    Coalesce,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl AssignOp {
    /// The arithmetic operator of a compound assignment.
    pub fn binary(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    Inc,
    Dec,
}

/// A comma-separated expression list, as found in most directive parameters.
#[derive(Debug, Clone, Default)]
pub struct ExprList(Vec<Expr>);

impl ExprList {
    pub fn new(exprs: Vec<Expr>) -> Self {
        Self(exprs)
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expr> {
        self.0.iter()
    }

    pub fn last(&self) -> Option<&Expr> {
        self.0.last()
    }

    pub fn into_inner(self) -> Vec<Expr> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ExprList {
    type Item = &'a Expr;
    type IntoIter = std::slice::Iter<'a, Expr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A statement node.
#[derive(Debug)]
pub enum Stat {
    Text(Text),
    Output(Output),
    If(If),
    For(For),
    Switch(Switch),
    Call(Call),
    Include(Include),
    Set(Set),
    Break(Location),
    Continue(Location),
    Return(Location),
    List(StatList),
    Custom(Custom),
}

impl Stat {
    /// Where this statement starts.
    pub fn location(&self) -> &Location {
        match self {
            Stat::Text(stat) => &stat.location,
            Stat::Output(stat) => &stat.location,
            Stat::If(stat) => &stat.location,
            Stat::For(stat) => &stat.location,
            Stat::Switch(stat) => &stat.location,
            Stat::Call(stat) => &stat.location,
            Stat::Include(stat) => &stat.location,
            Stat::Set(stat) => &stat.location,
            Stat::Break(location) | Stat::Continue(location) | Stat::Return(location) => location,
            Stat::List(stat) => &stat.location,
            Stat::Custom(stat) => &stat.location,
        }
    }
}

/// Literal template text.
#[derive(Debug)]
pub struct Text {
    pub text: String,
    pub location: Location,
}

/// `#(expr)`
#[derive(Debug)]
pub struct Output {
    pub expr: Expr,
    pub location: Location,
}

/// `#if(cond) ... [#elseif(cond) ...] [#else ...] #end`
#[derive(Debug)]
pub struct If {
    pub cond: ExprList,
    pub then: Box<Stat>,
    pub otherwise: Option<ElseBranch>,
    pub location: Location,
}

/// What follows the body of an `#if`.
#[derive(Debug)]
pub enum ElseBranch {
    ElseIf(Box<If>),
    Else(Box<Stat>),
}

/// `#for(item : source)` or `#for(init; cond; update)`, with optional `#else`.
#[derive(Debug)]
pub struct For {
    pub form: ForForm,
    pub body: Box<Stat>,
    pub otherwise: Option<Box<Stat>>,
    pub location: Location,
}

#[derive(Debug)]
pub enum ForForm {
    Each {
        var: String,
        source: Expr,
    },
    Counter {
        init: ExprList,
        cond: Option<Expr>,
        update: ExprList,
    },
}

/// `#switch(value) #case(a, b) ... #default ... #end`
#[derive(Debug)]
pub struct Switch {
    pub value: Expr,
    pub cases: Vec<Case>,
    pub default: Option<Box<Stat>>,
    pub location: Location,
}

/// One `#case(...)` arm.
#[derive(Debug)]
pub struct Case {
    pub values: ExprList,
    pub body: Stat,
    pub location: Location,
}

/// A template function, `#define name(params) ... #end`.
///
/// Functions are hoisted out of the statement tree into the template's
/// function registry and looked up by name when called.
#[derive(Debug)]
pub struct Define {
    pub name: String,
    pub params: Vec<String>,
    pub body: Stat,
    pub location: Location,
}

/// `#@name(args)`, `#@name?(args)`, `#call(nameExpr, args)` or
/// `#call?(nameExpr, args)`.
#[derive(Debug)]
pub struct Call {
    pub target: CallTarget,
    pub args: ExprList,
    /// Silently skip the call when the function does not exist.
    pub if_defined: bool,
    pub location: Location,
}

#[derive(Debug)]
pub enum CallTarget {
    Named(String),
    Dynamic(Expr),
}

/// `#include("path", name = value, ...)`, parsed at compile time.
#[derive(Debug)]
pub struct Include {
    /// The resolved template name.
    pub name: String,
    /// Assignments evaluated as locals of the include frame.
    pub assigns: ExprList,
    pub body: Box<Stat>,
    pub location: Location,
}

/// `#set`, `#setLocal` and `#setGlobal`.
#[derive(Debug)]
pub struct Set {
    pub mode: Assignment,
    pub exprs: ExprList,
    pub location: Location,
}

/// An ordered statement sequence.
#[derive(Debug)]
pub struct StatList {
    pub stats: Vec<Stat>,
    pub location: Location,
}

impl StatList {
    pub fn new(stats: Vec<Stat>, location: Location) -> Self {
        Self { stats, location }
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    /// The statement at `index`.
    pub fn stat(&self, index: usize) -> EvalResult<&Stat> {
        self.stats
            .get(index)
            .ok_or(RenderErrorKind::IndexOutOfRange {
                index: index as i64,
                len: self.stats.len(),
            })
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stat> {
        self.stats.iter()
    }

    /// Collapse into a single statement: a lone statement is returned as is.
    pub fn into_stat(mut self) -> Stat {
        if self.stats.len() == 1 {
            if let Some(stat) = self.stats.pop() {
                return stat;
            }
        }
        Stat::List(self)
    }
}

/// An extension directive resolved through the directive registry.
#[derive(Debug)]
pub struct Custom {
    pub name: String,
    pub directive: Box<dyn Directive>,
    pub location: Location,
}
