//! Tokenizer for directive parameter lists.
//!
//! Converts the raw text between a directive's parentheses into expression
//! [`Token`]s. Spans are absolute offsets into the template source. The
//! tokenizer recovers from bad characters and reports every problem in the
//! list at once.

use winnow::{
    Parser as _,
    ascii::{digit1, multispace1},
    combinator::{alt, opt, peek, preceded},
    error::{AddContext, ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stream},
    token::{literal, one_of, take_while},
};

use crate::{
    error::{Diagnostic, DiagnosticCollector, ErrorCode, ParseError},
    span::Span,
    tokens::{PositionedToken, Token},
};

/// Diagnostic details attached to winnow errors through `.context()`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    code: ErrorCode,
    message: &'static str,
    help: Option<&'static str>,
    /// The error span covers from `start` to the error position.
    start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<O> = ModalResult<O, ContextError<LexerDiagnostic>>;

fn cut(input: &Input<'_>, diagnostic: LexerDiagnostic) -> ErrMode<ContextError<LexerDiagnostic>> {
    ErrMode::Cut(ContextError::new().add_context(input, &input.checkpoint(), diagnostic))
}

fn invalid_escape(input: &Input<'_>, start: usize) -> ErrMode<ContextError<LexerDiagnostic>> {
    cut(
        input,
        LexerDiagnostic {
            code: ErrorCode::E003,
            message: "invalid escape sequence",
            help: Some(
                "valid escapes: `\\n`, `\\r`, `\\t`, `\\b`, `\\f`, `\\\\`, `\\/`, `\\'`, `\\\"`, `\\0`, `\\uXXXX`",
            ),
            start,
        },
    )
}

/// The character denoted by an escape; the backslash is already consumed.
fn string_escape(input: &mut Input<'_>, start: usize) -> IResult<char> {
    let ch = match input.next_token() {
        Some('n') => '\n',
        Some('r') => '\r',
        Some('t') => '\t',
        Some('b') => '\u{08}',
        Some('f') => '\u{0C}',
        Some('0') => '\0',
        Some(c @ ('\\' | '/' | '\'' | '"')) => c,
        Some('u') => {
            let hex: &str = take_while(4..=4, |c: char| c.is_ascii_hexdigit())
                .parse_next(input)
                .map_err(|_: ErrMode<ContextError<LexerDiagnostic>>| invalid_escape(input, start))?;
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| invalid_escape(input, start))?
        }
        _ => return Err(invalid_escape(input, start)),
    };
    Ok(ch)
}

/// A string in single or double quotes.
fn string_literal<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    let quote = one_of(['"', '\'']).parse_next(input)?;
    let mut value = String::new();
    loop {
        let position = input.current_token_start();
        match input.next_token() {
            Some(c) if c == quote => return Ok(Token::Str(value)),
            Some('\\') => value.push(string_escape(input, position)?),
            Some(c) => value.push(c),
            None => {
                return Err(cut(
                    input,
                    LexerDiagnostic {
                        code: ErrorCode::E002,
                        message: "unterminated string literal",
                        help: Some("add the closing quote"),
                        start,
                    },
                ));
            }
        }
    }
}

/// Integer and float literals. `L` marks a long, `F` and `D` a float.
fn number<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    let start = input.current_token_start();
    let int_part = digit1.parse_next(input)?;
    // `1..3` is a range, so a dot only starts a fraction before a digit.
    let fraction: Option<&str> = opt(preceded('.', digit1)).parse_next(input)?;
    let exponent: Option<&str> = opt((one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1).take())
        .parse_next(input)?;
    let suffix = opt(one_of(['L', 'l', 'F', 'f', 'D', 'd'])).parse_next(input)?;

    let invalid = |input: &Input<'a>, message: &'static str| {
        cut(
            input,
            LexerDiagnostic {
                code: ErrorCode::E005,
                message,
                help: None,
                start,
            },
        )
    };

    let trailing: Option<char> =
        peek(opt(one_of(|c: char| c.is_alphanumeric() || c == '_'))).parse_next(input)?;
    if trailing.is_some() {
        return Err(invalid(input, "invalid number literal"));
    }

    let is_long = matches!(suffix, Some('L' | 'l'));
    let is_float =
        fraction.is_some() || exponent.is_some() || matches!(suffix, Some('F' | 'f' | 'D' | 'd'));
    if is_float {
        if is_long {
            return Err(invalid(input, "a float literal cannot have an `L` suffix"));
        }
        let text = format!(
            "{int_part}.{}{}",
            fraction.unwrap_or("0"),
            exponent.unwrap_or("")
        );
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| invalid(input, "invalid float literal"))
    } else {
        int_part
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| invalid(input, "integer literal is out of range"))
    }
}

/// Identifiers and the `true`, `false` and `null` literals.
fn word<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '_')
        .verify(|s: &str| {
            s.chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        })
        .map(|s: &'a str| match s {
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            _ => Token::Ident(s),
        })
        .parse_next(input)
}

/// Multi-character operators, longest first.
fn compound_operator<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        literal("++").value(Token::PlusPlus),
        literal("--").value(Token::MinusMinus),
        literal("+=").value(Token::PlusAssign),
        literal("-=").value(Token::MinusAssign),
        literal("*=").value(Token::StarAssign),
        literal("/=").value(Token::SlashAssign),
        literal("%=").value(Token::PercentAssign),
        literal("==").value(Token::Eq),
        literal("!=").value(Token::Ne),
        literal("<=").value(Token::Le),
        literal(">=").value(Token::Ge),
        literal("&&").value(Token::And),
        literal("||").value(Token::Or),
        literal("??").value(Token::QuestionQuestion),
        literal("?.").value(Token::QuestionDot),
        literal("..").value(Token::DotDot),
    ))
    .parse_next(input)
}

fn single_char_token<'a>(input: &mut Input<'a>) -> IResult<Token<'a>> {
    alt((
        alt((
            '('.value(Token::LeftParen),
            ')'.value(Token::RightParen),
            '['.value(Token::LeftBracket),
            ']'.value(Token::RightBracket),
            '{'.value(Token::LeftBrace),
            '}'.value(Token::RightBrace),
            ','.value(Token::Comma),
            ':'.value(Token::Colon),
            ';'.value(Token::Semicolon),
            '.'.value(Token::Dot),
            '?'.value(Token::Question),
        )),
        alt((
            '+'.value(Token::Plus),
            '-'.value(Token::Minus),
            '*'.value(Token::Star),
            '/'.value(Token::Slash),
            '%'.value(Token::Percent),
            '!'.value(Token::Not),
            '='.value(Token::Assign),
            '<'.value(Token::Lt),
            '>'.value(Token::Gt),
        )),
    ))
    .parse_next(input)
}

/// A single token with its span, or `None` for skipped whitespace.
fn positioned_token<'a>(input: &mut Input<'a>) -> IResult<Option<PositionedToken<'a>>> {
    if multispace1::<_, ContextError<LexerDiagnostic>>
        .parse_next(input)
        .is_ok()
    {
        return Ok(None);
    }

    let start_pos = input.current_token_start();
    let token = alt((
        string_literal,    // Must come before any single char
        number,            // Must come before `.`
        word,              // Identifiers and literal keywords
        compound_operator, // Must come before single char operators
        single_char_token,
    ))
    .parse_next(input)?;
    let end_pos = input.current_token_start();

    Ok(Some(PositionedToken::new(token, Span::new(start_pos..end_pos))))
}

/// Lexer that accumulates tokens and diagnostics.
struct Lexer<'a> {
    offset: usize,
    tokens: Vec<PositionedToken<'a>>,
    diagnostics: DiagnosticCollector,
}

impl<'a> Lexer<'a> {
    fn new(offset: usize) -> Self {
        Self {
            offset,
            tokens: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
        }
    }

    fn tokenize(&mut self, mut input: Input<'a>) {
        while !input.is_empty() {
            match positioned_token(&mut input) {
                Ok(Some(mut token)) => {
                    token.span = token.span.shift(self.offset);
                    self.tokens.push(token);
                }
                Ok(None) => {}
                Err(e) => {
                    let error_pos = input.current_token_start();
                    let diagnostic = self.convert_err_mode(e, error_pos);
                    self.diagnostics.emit(diagnostic);
                    if !input.is_empty() {
                        input.next_token();
                    }
                }
            }
        }
    }

    fn finish(self) -> Result<Vec<PositionedToken<'a>>, ParseError> {
        self.diagnostics.finish().map(|()| self.tokens)
    }

    /// Convert a winnow error to a [`Diagnostic`]. Falls back to E004
    /// (unexpected character) when no context is attached.
    fn convert_err_mode(
        &self,
        err: ErrMode<ContextError<LexerDiagnostic>>,
        error_pos: usize,
    ) -> Diagnostic {
        let context_error = match err {
            ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
            ErrMode::Incomplete(_) => ContextError::new(),
        };

        if let Some(LexerDiagnostic {
            code,
            message,
            help,
            start,
        }) = context_error.context().next()
        {
            let span = Span::new(*start..error_pos.max(*start + 1)).shift(self.offset);
            let mut diag = Diagnostic::error(*message)
                .with_code(*code)
                .with_label(span, code.description());
            if let Some(h) = help {
                diag = diag.with_help(*h);
            }
            return diag;
        }

        let span = Span::new(error_pos..error_pos + 1).shift(self.offset);
        Diagnostic::error("unexpected character in expression")
            .with_code(ErrorCode::E004)
            .with_label(span, ErrorCode::E004.description())
    }
}

/// Tokenize a parameter list that starts at byte `offset` of the template.
pub fn tokenize(input: &str, offset: usize) -> Result<Vec<PositionedToken<'_>>, ParseError> {
    let mut lexer = Lexer::new(offset);
    lexer.tokenize(LocatingSlice::new(input));
    lexer.finish()
}
