//! Token types for both levels of the template language.
//!
//! The template lexer produces [`TemplateToken`]s: text runs, directive
//! markers and the raw parameter lists that follow them. Each parameter list
//! is then tokenized into expression [`Token`]s for the expression parser.

use std::fmt;

use crate::span::Span;

/// The kind of a template token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Text,
    /// `#(expr)`
    Output,
    /// `#@name(args)`; the token text is the function name.
    Call,
    /// `#@name?(args)`
    CallIfDefined,
    /// `#call(nameExpr, args)`
    DynamicCall,
    /// `#call?(nameExpr, args)`
    DynamicCallIfDefined,
    /// `#define name(params)`; the token text is the function name.
    Define,
    If,
    ElseIf,
    Else,
    End,
    For,
    Switch,
    Case,
    Default,
    Set,
    SetLocal,
    SetGlobal,
    Include,
    Break,
    Continue,
    Return,
    /// `#name(...)` for any other name; resolved through the directive
    /// registry.
    Id,
    /// The raw text between a directive's parentheses.
    Para,
    Eof,
}

impl Symbol {
    /// Keyword directives that take a parameter list.
    pub(crate) fn keyword_with_para(word: &str) -> Option<Symbol> {
        Some(match word {
            "if" => Symbol::If,
            "elseif" => Symbol::ElseIf,
            "for" => Symbol::For,
            "switch" => Symbol::Switch,
            "case" => Symbol::Case,
            "set" => Symbol::Set,
            "setLocal" => Symbol::SetLocal,
            "setGlobal" => Symbol::SetGlobal,
            "include" => Symbol::Include,
            _ => return None,
        })
    }

    /// Keyword directives without parameters.
    pub(crate) fn keyword_without_para(word: &str) -> Option<Symbol> {
        Some(match word {
            "else" => Symbol::Else,
            "end" => Symbol::End,
            "break" => Symbol::Break,
            "continue" => Symbol::Continue,
            "return" => Symbol::Return,
            "default" => Symbol::Default,
            _ => return None,
        })
    }

    /// Whether a directive token of this kind may be trimmed together with
    /// the whitespace of its line.
    pub(crate) fn is_trimmable(&self) -> bool {
        !matches!(
            self,
            Symbol::Text | Symbol::Output | Symbol::Para | Symbol::Eof
        )
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Symbol::Text => "text",
            Symbol::Output => "#(",
            Symbol::Call => "#@",
            Symbol::CallIfDefined => "#@?",
            Symbol::DynamicCall => "#call",
            Symbol::DynamicCallIfDefined => "#call?",
            Symbol::Define => "#define",
            Symbol::If => "#if",
            Symbol::ElseIf => "#elseif",
            Symbol::Else => "#else",
            Symbol::End => "#end",
            Symbol::For => "#for",
            Symbol::Switch => "#switch",
            Symbol::Case => "#case",
            Symbol::Default => "#default",
            Symbol::Set => "#set",
            Symbol::SetLocal => "#setLocal",
            Symbol::SetGlobal => "#setGlobal",
            Symbol::Include => "#include",
            Symbol::Break => "#break",
            Symbol::Continue => "#continue",
            Symbol::Return => "#return",
            Symbol::Id => "directive",
            Symbol::Para => "parameter list",
            Symbol::Eof => "end of template",
        })
    }
}

/// A token of the template layer.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateToken {
    pub symbol: Symbol,
    /// Text for [`Symbol::Text`], the raw parameters for [`Symbol::Para`],
    /// the function or directive name for calls, defines and [`Symbol::Id`].
    pub text: String,
    /// 1-based row of the token start.
    pub row: usize,
    pub span: Span,
}

impl TemplateToken {
    pub fn new(symbol: Symbol, text: impl Into<String>, row: usize, span: Span) -> Self {
        Self {
            symbol,
            text: text.into(),
            row,
            span,
        }
    }
}

/// A token of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Ident(&'a str),
    Int(i64),
    Float(f64),
    Str(String),
    True,
    False,
    Null,

    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Colon,
    Semicolon,
    Dot,
    DotDot,
    /// `?.`
    QuestionDot,
    Question,
    /// `??`
    QuestionQuestion,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusPlus,
    MinusMinus,
    Not,

    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "{name}"),
            Token::Int(value) => write!(f, "{value}"),
            Token::Float(value) => write!(f, "{value}"),
            Token::Str(value) => write!(f, "{value:?}"),
            Token::True => f.write_str("true"),
            Token::False => f.write_str("false"),
            Token::Null => f.write_str("null"),
            Token::LeftParen => f.write_str("("),
            Token::RightParen => f.write_str(")"),
            Token::LeftBracket => f.write_str("["),
            Token::RightBracket => f.write_str("]"),
            Token::LeftBrace => f.write_str("{"),
            Token::RightBrace => f.write_str("}"),
            Token::Comma => f.write_str(","),
            Token::Colon => f.write_str(":"),
            Token::Semicolon => f.write_str(";"),
            Token::Dot => f.write_str("."),
            Token::DotDot => f.write_str(".."),
            Token::QuestionDot => f.write_str("?."),
            Token::Question => f.write_str("?"),
            Token::QuestionQuestion => f.write_str("??"),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Percent => f.write_str("%"),
            Token::PlusPlus => f.write_str("++"),
            Token::MinusMinus => f.write_str("--"),
            Token::Not => f.write_str("!"),
            Token::Assign => f.write_str("="),
            Token::PlusAssign => f.write_str("+="),
            Token::MinusAssign => f.write_str("-="),
            Token::StarAssign => f.write_str("*="),
            Token::SlashAssign => f.write_str("/="),
            Token::PercentAssign => f.write_str("%="),
            Token::Eq => f.write_str("=="),
            Token::Ne => f.write_str("!="),
            Token::Lt => f.write_str("<"),
            Token::Le => f.write_str("<="),
            Token::Gt => f.write_str(">"),
            Token::Ge => f.write_str(">="),
            Token::And => f.write_str("&&"),
            Token::Or => f.write_str("||"),
        }
    }
}

/// An expression token with its span in the template source.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionedToken<'a> {
    pub token: Token<'a>,
    pub span: Span,
}

impl<'a> PositionedToken<'a> {
    pub fn new(token: Token<'a>, span: Span) -> Self {
        Self { token, span }
    }
}
