//! Parser for directive parameter lists.
//!
//! This module turns the expression tokens produced by
//! [`expr_lexer`](super::expr_lexer) into [`Expr`] trees. The entry points
//! parse a whole parameter list: [`parse_expr_list`] for the comma lists
//! most directives take, [`parse_for_header`] for the two `#for` forms and
//! [`parse_param_names`] for `#define` headers.

use winnow::{
    Parser as _,
    combinator::{delimited, opt, separated},
    error::{AddContext, ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use quill_core::{
    Value,
    ast::{AssignOp, BinaryOp, Expr, ExprList, ForForm, IncDecOp, LogicalOp, UnaryOp},
};

use crate::{
    error::{Diagnostic, ErrorCode, ParseError},
    expr_lexer,
    span::Span,
    tokens::{PositionedToken, Token},
};

/// Context type for parser errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Context {
    /// Description of what is currently being parsed
    Label(&'static str),
    /// Remaining token count (`eof_offset()`) at error start position
    StartOffset(usize),
    /// The expression left of an assignment or `++`/`--` cannot be assigned.
    InvalidTarget,
}

type Input<'src> = TokenSlice<'src, PositionedToken<'src>>;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;
type Operand<'src> = fn(&mut Input<'src>) -> IResult<Expr>;

fn error_with(input: &Input<'_>, contexts: &[Context]) -> ContextError<Context> {
    contexts
        .iter()
        .fold(ContextError::new(), |e, context| {
            e.add_context(input, &input.checkpoint(), context.clone())
        })
}

/// Run `f`, turning any failure into a cut that remembers where `f` started.
fn cut_err<'src, O, F>(input: &mut Input<'src>, f: F) -> IResult<O>
where
    F: FnOnce(&mut Input<'src>) -> IResult<O>,
{
    let start_remaining = input.eof_offset();

    match f(input) {
        Ok(o) => Ok(o),
        Err(ErrMode::Backtrack(e)) | Err(ErrMode::Cut(e)) => {
            let input: &Input<'src> = input;
            Err(ErrMode::Cut(e.add_context(
                input,
                &input.checkpoint(),
                Context::StartOffset(start_remaining),
            )))
        }
        Err(e) => Err(e),
    }
}

/// A cut error for an unassignable expression that started at `start_offset`.
fn invalid_target(input: &Input<'_>, start_offset: usize) -> ErrMode<ContextError<Context>> {
    ErrMode::Cut(error_with(
        input,
        &[Context::InvalidTarget, Context::StartOffset(start_offset)],
    ))
}

fn peek<'src>(input: &Input<'src>) -> Option<&'src Token<'src>> {
    input.peek_token().map(|t| &t.token)
}

fn peek_is(input: &Input<'_>, expected: &Token<'_>) -> bool {
    peek(input).is_some_and(|token| token == expected)
}

/// Consume one token equal to `expected`.
fn expect<'src>(
    input: &mut Input<'src>,
    expected: Token<'static>,
    label: &'static str,
) -> IResult<Span> {
    any.verify_map(|t: &PositionedToken<'src>| (t.token == expected).then_some(t.span))
        .context(Context::Label(label))
        .parse_next(input)
}

fn comma<'src>(input: &mut Input<'src>) -> IResult<Span> {
    expect(input, Token::Comma, "`,`")
}

fn identifier<'src>(input: &mut Input<'src>) -> IResult<&'src str> {
    any.verify_map(|t: &PositionedToken<'src>| match t.token {
        Token::Ident(name) => Some(name),
        _ => None,
    })
    .context(Context::Label("identifier"))
    .parse_next(input)
}

/// A full expression, assignments included.
pub(crate) fn expr(input: &mut Input<'_>) -> IResult<Expr> {
    assignment(input)
}

fn assign_op(token: &Token<'_>) -> Option<AssignOp> {
    Some(match token {
        Token::Assign => AssignOp::Assign,
        Token::PlusAssign => AssignOp::Add,
        Token::MinusAssign => AssignOp::Sub,
        Token::StarAssign => AssignOp::Mul,
        Token::SlashAssign => AssignOp::Div,
        Token::PercentAssign => AssignOp::Rem,
        _ => return None,
    })
}

fn assignment(input: &mut Input<'_>) -> IResult<Expr> {
    let start = input.eof_offset();
    let target = ternary(input)?;
    let Some(op) = peek(input).and_then(assign_op) else {
        return Ok(target);
    };
    if !target.is_assignable() {
        return Err(invalid_target(input, start));
    }
    input.next_token();
    let value = cut_err(input, assignment)?;
    Ok(Expr::Assign {
        op,
        target: Box::new(target),
        value: Box::new(value),
    })
}

fn ternary(input: &mut Input<'_>) -> IResult<Expr> {
    let cond = coalesce(input)?;
    if !peek_is(input, &Token::Question) {
        return Ok(cond);
    }
    input.next_token();
    let then = cut_err(input, expr)?;
    cut_err(input, |input| expect(input, Token::Colon, "`:` of the ternary"))?;
    let otherwise = cut_err(input, ternary)?;
    Ok(Expr::Ternary {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    })
}

/// Parse a left-associative level: `operand (op operand)*`.
fn left_assoc<'src, Op: Copy>(
    input: &mut Input<'src>,
    operand: Operand<'src>,
    operator: fn(&Token<'_>) -> Option<Op>,
    build: fn(Op, Expr, Expr) -> Expr,
) -> IResult<Expr> {
    let mut lhs = operand(input)?;
    while let Some(op) = peek(input).and_then(operator) {
        input.next_token();
        let rhs = cut_err(input, operand)?;
        lhs = build(op, lhs, rhs);
    }
    Ok(lhs)
}

fn logical(op: LogicalOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Logical(op, Box::new(lhs), Box::new(rhs))
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Binary(op, Box::new(lhs), Box::new(rhs))
}

fn coalesce(input: &mut Input<'_>) -> IResult<Expr> {
    left_assoc(
        input,
        or,
        |t| matches!(t, Token::QuestionQuestion).then_some(LogicalOp::Coalesce),
        logical,
    )
}

fn or(input: &mut Input<'_>) -> IResult<Expr> {
    left_assoc(
        input,
        and,
        |t| matches!(t, Token::Or).then_some(LogicalOp::Or),
        logical,
    )
}

fn and(input: &mut Input<'_>) -> IResult<Expr> {
    left_assoc(
        input,
        equality,
        |t| matches!(t, Token::And).then_some(LogicalOp::And),
        logical,
    )
}

fn equality(input: &mut Input<'_>) -> IResult<Expr> {
    left_assoc(
        input,
        relational,
        |t| match t {
            Token::Eq => Some(BinaryOp::Eq),
            Token::Ne => Some(BinaryOp::Ne),
            _ => None,
        },
        binary,
    )
}

fn relational(input: &mut Input<'_>) -> IResult<Expr> {
    left_assoc(
        input,
        additive,
        |t| match t {
            Token::Lt => Some(BinaryOp::Lt),
            Token::Le => Some(BinaryOp::Le),
            Token::Gt => Some(BinaryOp::Gt),
            Token::Ge => Some(BinaryOp::Ge),
            _ => None,
        },
        binary,
    )
}

fn additive(input: &mut Input<'_>) -> IResult<Expr> {
    left_assoc(
        input,
        multiplicative,
        |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            _ => None,
        },
        binary,
    )
}

fn multiplicative(input: &mut Input<'_>) -> IResult<Expr> {
    left_assoc(
        input,
        unary,
        |t| match t {
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            Token::Percent => Some(BinaryOp::Rem),
            _ => None,
        },
        binary,
    )
}

fn unary(input: &mut Input<'_>) -> IResult<Expr> {
    let op = match peek(input) {
        Some(Token::Not) => UnaryOp::Not,
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Plus) => UnaryOp::Plus,
        Some(Token::PlusPlus) => return prefix_inc_dec(input, IncDecOp::Inc),
        Some(Token::MinusMinus) => return prefix_inc_dec(input, IncDecOp::Dec),
        _ => return postfix(input),
    };
    input.next_token();
    let operand = cut_err(input, unary)?;
    // Fold negative literals so `-5` is a constant.
    Ok(match (op, operand) {
        (UnaryOp::Neg, Expr::Const(Value::Int(n))) => Expr::Const(Value::Int(-n)),
        (UnaryOp::Neg, Expr::Const(Value::Float(f))) => Expr::Const(Value::Float(-f)),
        (op, operand) => Expr::Unary(op, Box::new(operand)),
    })
}

fn prefix_inc_dec(input: &mut Input<'_>, op: IncDecOp) -> IResult<Expr> {
    input.next_token();
    let start = input.eof_offset();
    let target = cut_err(input, postfix)?;
    if !target.is_assignable() {
        return Err(invalid_target(input, start));
    }
    Ok(Expr::IncDec {
        op,
        prefix: true,
        target: Box::new(target),
    })
}

fn args(input: &mut Input<'_>) -> IResult<Vec<Expr>> {
    delimited(
        |input: &mut Input<'_>| expect(input, Token::LeftParen, "`(`"),
        separated(0.., expr, comma),
        |input: &mut Input<'_>| cut_err(input, |input| expect(input, Token::RightParen, "`)`")),
    )
    .parse_next(input)
}

/// Member access, indexing and postfix `++`/`--`.
fn postfix(input: &mut Input<'_>) -> IResult<Expr> {
    let start = input.eof_offset();
    let mut target = primary(input)?;
    loop {
        let null_safe = match peek(input) {
            Some(Token::Dot) => false,
            Some(Token::QuestionDot) => true,
            Some(Token::LeftBracket) => {
                input.next_token();
                let index = cut_err(input, expr)?;
                cut_err(input, |input| expect(input, Token::RightBracket, "`]`"))?;
                target = Expr::Index {
                    target: Box::new(target),
                    index: Box::new(index),
                };
                continue;
            }
            Some(token @ (Token::PlusPlus | Token::MinusMinus)) => {
                if !target.is_assignable() {
                    return Err(invalid_target(input, start));
                }
                let op = if matches!(token, Token::PlusPlus) {
                    IncDecOp::Inc
                } else {
                    IncDecOp::Dec
                };
                input.next_token();
                return Ok(Expr::IncDec {
                    op,
                    prefix: false,
                    target: Box::new(target),
                });
            }
            _ => return Ok(target),
        };
        input.next_token();
        let name = cut_err(input, identifier)?.to_string();
        target = if peek_is(input, &Token::LeftParen) {
            Expr::Method {
                target: Box::new(target),
                name,
                args: cut_err(input, args)?,
                null_safe,
            }
        } else {
            Expr::Field {
                target: Box::new(target),
                name,
                null_safe,
            }
        };
    }
}

fn primary(input: &mut Input<'_>) -> IResult<Expr> {
    let Some(token) = peek(input) else {
        return Err(ErrMode::Backtrack(error_with(
            input,
            &[Context::Label("expression")],
        )));
    };
    let value = match token {
        Token::Int(n) => Value::Int(*n),
        Token::Float(f) => Value::Float(*f),
        Token::Str(s) => Value::str(s),
        Token::True => Value::Bool(true),
        Token::False => Value::Bool(false),
        Token::Null => Value::Null,
        Token::Ident(name) => {
            input.next_token();
            if peek_is(input, &Token::LeftParen) {
                return Ok(Expr::SharedMethod {
                    name: name.to_string(),
                    args: cut_err(input, args)?,
                });
            }
            return Ok(Expr::Id(name.to_string()));
        }
        Token::LeftParen => {
            input.next_token();
            let inner = cut_err(input, expr)?;
            cut_err(input, |input| expect(input, Token::RightParen, "`)`"))?;
            return Ok(inner);
        }
        Token::LeftBracket => return list_or_range(input),
        Token::LeftBrace => return map(input),
        _ => {
            return Err(ErrMode::Backtrack(error_with(
                input,
                &[Context::Label("expression")],
            )));
        }
    };
    input.next_token();
    Ok(Expr::Const(value))
}

/// `[a, b, c]` or `[a..b]`.
fn list_or_range(input: &mut Input<'_>) -> IResult<Expr> {
    input.next_token();
    if peek_is(input, &Token::RightBracket) {
        input.next_token();
        return Ok(Expr::List(Vec::new()));
    }
    let first = cut_err(input, expr)?;
    if peek_is(input, &Token::DotDot) {
        input.next_token();
        let last = cut_err(input, expr)?;
        cut_err(input, |input| expect(input, Token::RightBracket, "`]`"))?;
        return Ok(Expr::Range(Box::new(first), Box::new(last)));
    }
    let mut items = vec![first];
    while opt(comma).parse_next(input)?.is_some() {
        items.push(cut_err(input, expr)?);
    }
    cut_err(input, |input| expect(input, Token::RightBracket, "`]`"))?;
    Ok(Expr::List(items))
}

fn map_key(input: &mut Input<'_>) -> IResult<String> {
    any.verify_map(|t: &PositionedToken<'_>| match &t.token {
        Token::Ident(name) => Some(name.to_string()),
        Token::Str(s) => Some(s.clone()),
        Token::Int(n) => Some(n.to_string()),
        _ => None,
    })
    .context(Context::Label("map key"))
    .parse_next(input)
}

fn map_entry(input: &mut Input<'_>) -> IResult<(String, Expr)> {
    let key = map_key(input)?;
    cut_err(input, |input| expect(input, Token::Colon, "`:` after map key"))?;
    let value = cut_err(input, expr)?;
    Ok((key, value))
}

/// `{key: value, "key": value}`.
fn map(input: &mut Input<'_>) -> IResult<Expr> {
    input.next_token();
    let entries = separated(0.., map_entry, comma).parse_next(input)?;
    cut_err(input, |input| expect(input, Token::RightBrace, "`}`"))?;
    Ok(Expr::Map(entries))
}

/// A comma list that must consume every token.
fn expr_list(input: &mut Input<'_>) -> IResult<Vec<Expr>> {
    let exprs: Vec<Expr> = separated(0.., expr, comma).parse_next(input)?;
    if input.eof_offset() > 0 {
        return Err(ErrMode::Cut(error_with(
            input,
            &[Context::Label("`,` or end of parameters")],
        )));
    }
    Ok(exprs)
}

fn convert_error(
    error: ErrMode<ContextError<Context>>,
    tokens: &[PositionedToken<'_>],
    current_remaining: usize,
    whole: Span,
) -> Diagnostic {
    let e = match error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    let start_remaining = e.context().find_map(|ctx| match ctx {
        Context::StartOffset(n) => Some(*n),
        _ => None,
    });
    let end_offset = tokens.len() - current_remaining;
    let start_offset = start_remaining.map_or(end_offset, |r| tokens.len() - r);

    let span_of = |range: std::ops::Range<usize>| {
        let slice = &tokens[range];
        match (slice.first(), slice.last()) {
            (Some(first), Some(last)) => first.span.union(last.span),
            _ => whole,
        }
    };

    if e.context().any(|ctx| matches!(ctx, Context::InvalidTarget)) {
        return Diagnostic::error("invalid assignment target")
            .with_code(ErrorCode::E102)
            .with_label(span_of(start_offset..end_offset), "cannot be assigned")
            .with_help("only variables, fields and indexes can be assigned");
    }

    let expected: Vec<String> = e
        .context()
        .filter_map(|ctx| match ctx {
            Context::Label(label) => Some(format!("expected {label}")),
            _ => None,
        })
        .collect();
    let expected = if expected.is_empty() {
        "expected expression".to_string()
    } else {
        expected.join(" → ")
    };

    match tokens.get(end_offset) {
        Some(token) => Diagnostic::error(format!("unexpected token `{}`: {expected}", token.token))
            .with_code(ErrorCode::E100)
            .with_label(token.span, "unexpected token"),
        None => {
            let end = tokens.last().map_or(whole.end(), |t| t.span.end());
            let mut diag = Diagnostic::error(format!("incomplete expression: {expected}"))
                .with_code(ErrorCode::E101)
                .with_label(Span::new(end..end), "parameters end here");
            if start_offset < end_offset {
                diag = diag.with_secondary_label(
                    span_of(start_offset..end_offset),
                    "while parsing this",
                );
            }
            diag
        }
    }
}

/// Run `parser` over `tokens`, converting failures to diagnostics.
fn run<'src, O>(
    tokens: &'src [PositionedToken<'src>],
    whole: Span,
    parser: impl FnOnce(&mut Input<'src>) -> IResult<O>,
) -> Result<O, ParseError> {
    let mut token_slice = TokenSlice::new(tokens);
    parser(&mut token_slice).map_err(|e| {
        let current_remaining = token_slice.eof_offset();
        convert_error(e, tokens, current_remaining, whole).into()
    })
}

fn blob_span(src: &str, offset: usize) -> Span {
    Span::new(offset..offset + src.len())
}

/// Parse a comma-separated expression list starting at byte `offset` of the
/// template. An empty or blank list yields an empty [`ExprList`].
pub fn parse_expr_list(src: &str, offset: usize) -> Result<ExprList, ParseError> {
    let tokens = expr_lexer::tokenize(src, offset)?;
    run(&tokens, blob_span(src, offset), expr_list).map(ExprList::new)
}

fn invalid_for(span: Span) -> ParseError {
    Diagnostic::error("invalid `#for` header")
        .with_code(ErrorCode::E206)
        .with_label(span, "expected `item : items` or `init; cond; update`")
        .into()
}

/// Parse the header of a `#for`: either `name : expr` or
/// `init; cond; update` where each part may be empty.
pub fn parse_for_header(src: &str, offset: usize) -> Result<ForForm, ParseError> {
    let whole = blob_span(src, offset);
    let tokens = expr_lexer::tokenize(src, offset)?;

    let parts: Vec<&[PositionedToken<'_>]> = tokens
        .split(|t| matches!(t.token, Token::Semicolon))
        .collect();
    match parts.as_slice() {
        [single] => match single {
            [
                PositionedToken {
                    token: Token::Ident(var),
                    ..
                },
                PositionedToken {
                    token: Token::Colon,
                    ..
                },
                rest @ ..,
            ] if !rest.is_empty() => {
                let source = run(rest, whole, |input| {
                    let source = expr(input)?;
                    expr_list_end(input)?;
                    Ok(source)
                })?;
                Ok(ForForm::Each {
                    var: var.to_string(),
                    source,
                })
            }
            _ => Err(invalid_for(whole)),
        },
        [init, cond, update] => {
            let init = run(init, whole, expr_list)?;
            let cond = run(cond, whole, |input| {
                let cond = opt(expr).parse_next(input)?;
                expr_list_end(input)?;
                Ok(cond)
            })?;
            let update = run(update, whole, expr_list)?;
            Ok(ForForm::Counter {
                init: ExprList::new(init),
                cond,
                update: ExprList::new(update),
            })
        }
        _ => Err(invalid_for(whole)),
    }
}

fn expr_list_end(input: &mut Input<'_>) -> IResult<()> {
    if input.eof_offset() > 0 {
        return Err(ErrMode::Cut(error_with(
            input,
            &[Context::Label("end of parameters")],
        )));
    }
    Ok(())
}

/// Parse the parameter names of a `#define` header: distinct identifiers
/// separated by commas.
pub fn parse_param_names(src: &str, offset: usize) -> Result<Vec<String>, ParseError> {
    let whole = blob_span(src, offset);
    let tokens = expr_lexer::tokenize(src, offset)?;

    let mut names: Vec<String> = Vec::new();
    let mut expect_name = true;
    for token in &tokens {
        match (&token.token, expect_name) {
            (Token::Ident(name), true) => {
                if names.iter().any(|n| n == name) {
                    return Err(Diagnostic::error(format!("duplicate parameter `{name}`"))
                        .with_code(ErrorCode::E204)
                        .with_label(token.span, "already declared")
                        .into());
                }
                names.push(name.to_string());
                expect_name = false;
            }
            (Token::Comma, false) => expect_name = true,
            _ => {
                return Err(Diagnostic::error("invalid function parameters")
                    .with_code(ErrorCode::E204)
                    .with_label(token.span, "expected a parameter name")
                    .with_help("parameters are identifiers separated by commas")
                    .into());
            }
        }
    }
    if expect_name && !names.is_empty() {
        return Err(Diagnostic::error("trailing `,` in function parameters")
            .with_code(ErrorCode::E204)
            .with_label(whole, "parameter expected")
            .into());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Expr {
        let list = parse_expr_list(src, 0).expect("expression should parse");
        assert_eq!(list.len(), 1, "expected a single expression in {src:?}");
        list.into_inner().remove(0)
    }

    fn error_code(src: &str) -> Option<ErrorCode> {
        parse_expr_list(src, 0).unwrap_err().diagnostics()[0].code()
    }

    #[test]
    fn test_empty_list() {
        assert!(parse_expr_list("", 0).unwrap().is_empty());
        assert!(parse_expr_list("   ", 0).unwrap().is_empty());
    }

    #[test]
    fn test_precedence() {
        let Expr::Binary(BinaryOp::Add, lhs, rhs) = parse("1 + 2 * 3") else {
            panic!("expected addition at the root");
        };
        assert!(matches!(*lhs, Expr::Const(Value::Int(1))));
        assert!(matches!(*rhs, Expr::Binary(BinaryOp::Mul, _, _)));

        assert!(matches!(
            parse("a || b && c"),
            Expr::Logical(LogicalOp::Or, _, _)
        ));
        assert!(matches!(
            parse("a ?? b || c"),
            Expr::Logical(LogicalOp::Coalesce, _, _)
        ));
    }

    #[test]
    fn test_left_associative() {
        let Expr::Binary(BinaryOp::Sub, lhs, _) = parse("10 - 4 - 3") else {
            panic!("expected subtraction");
        };
        assert!(matches!(*lhs, Expr::Binary(BinaryOp::Sub, _, _)));
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let Expr::Assign { target, value, .. } = parse("a = b = 3") else {
            panic!("expected assignment");
        };
        assert!(matches!(*target, Expr::Id(ref n) if n == "a"));
        assert!(matches!(*value, Expr::Assign { .. }));
    }

    #[test]
    fn test_compound_assignment_and_targets() {
        assert!(matches!(
            parse("user.name += '!'"),
            Expr::Assign {
                op: AssignOp::Add,
                ..
            }
        ));
        assert!(matches!(
            parse("items[0] = 1"),
            Expr::Assign {
                op: AssignOp::Assign,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_assignment_target() {
        assert_eq!(error_code("1 = 2"), Some(ErrorCode::E102));
        assert_eq!(error_code("a + b = 2"), Some(ErrorCode::E102));
        assert_eq!(error_code("++3"), Some(ErrorCode::E102));
        assert_eq!(error_code("f()++"), Some(ErrorCode::E102));
    }

    #[test]
    fn test_ternary() {
        let Expr::Ternary { otherwise, .. } = parse("a ? 1 : b ? 2 : 3") else {
            panic!("expected ternary");
        };
        assert!(matches!(*otherwise, Expr::Ternary { .. }));
    }

    #[test]
    fn test_postfix_chain() {
        let Expr::Method {
            target,
            name,
            args,
            null_safe,
        } = parse("user?.tags[0].substring(1, 2)")
        else {
            panic!("expected method call");
        };
        assert_eq!(name, "substring");
        assert_eq!(args.len(), 2);
        assert!(!null_safe);
        let Expr::Index { target, .. } = *target else {
            panic!("expected index");
        };
        assert!(matches!(
            *target,
            Expr::Field {
                null_safe: true,
                ..
            }
        ));
    }

    #[test]
    fn test_inc_dec() {
        assert!(matches!(
            parse("i++"),
            Expr::IncDec {
                op: IncDecOp::Inc,
                prefix: false,
                ..
            }
        ));
        assert!(matches!(
            parse("--count"),
            Expr::IncDec {
                op: IncDecOp::Dec,
                prefix: true,
                ..
            }
        ));
    }

    #[test]
    fn test_literals_and_collections() {
        assert!(matches!(parse("-5"), Expr::Const(Value::Int(-5))));
        assert!(matches!(parse("[]"), Expr::List(ref items) if items.is_empty()));
        assert!(matches!(parse("[1, 2, 3]"), Expr::List(ref items) if items.len() == 3));
        assert!(matches!(parse("[1..n]"), Expr::Range(_, _)));
        let Expr::Map(entries) = parse("{a: 1, \"b c\": 2}") else {
            panic!("expected map");
        };
        assert_eq!(entries[0].0, "a");
        assert_eq!(entries[1].0, "b c");
    }

    #[test]
    fn test_shared_method_call() {
        assert!(matches!(
            parse("now()"),
            Expr::SharedMethod { ref name, ref args } if name == "now" && args.is_empty()
        ));
    }

    #[test]
    fn test_comma_list() {
        let list = parse_expr_list("a = 1, b = a + 1", 0).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(Expr::is_assignment));
    }

    #[test]
    fn test_unexpected_and_incomplete() {
        assert_eq!(error_code("a b"), Some(ErrorCode::E100));
        assert_eq!(error_code("1 +"), Some(ErrorCode::E101));
        assert_eq!(error_code("(1, 2"), Some(ErrorCode::E100));
        assert_eq!(error_code("[1, 2"), Some(ErrorCode::E101));
        assert_eq!(error_code("a,"), Some(ErrorCode::E100));
    }

    #[test]
    fn test_lexer_errors_pass_through() {
        assert_eq!(error_code("'open"), Some(ErrorCode::E002));
    }

    #[test]
    fn test_error_spans_are_absolute() {
        let err = parse_expr_list("a b", 20).unwrap_err();
        assert_eq!(err.diagnostics()[0].labels()[0].span(), Span::new(22..23));
    }

    #[test]
    fn test_for_each_header() {
        let ForForm::Each { var, source } = parse_for_header("item : items.values()", 0).unwrap()
        else {
            panic!("expected for-each form");
        };
        assert_eq!(var, "item");
        assert!(matches!(source, Expr::Method { .. }));
    }

    #[test]
    fn test_for_counter_header() {
        let ForForm::Counter { init, cond, update } =
            parse_for_header("i = 0, j = 10; i < j; i++, j--", 0).unwrap()
        else {
            panic!("expected counter form");
        };
        assert_eq!(init.len(), 2);
        assert!(cond.is_some());
        assert_eq!(update.len(), 2);

        let ForForm::Counter { init, cond, update } = parse_for_header(";;", 0).unwrap() else {
            panic!("expected counter form");
        };
        assert!(init.is_empty() && cond.is_none() && update.is_empty());
    }

    #[test]
    fn test_invalid_for_header() {
        for src in ["items", "x :", "a; b", "1 : items", "a;b;c;d"] {
            let err = parse_for_header(src, 0).unwrap_err();
            assert_eq!(
                err.diagnostics()[0].code(),
                Some(ErrorCode::E206),
                "for header {src:?}"
            );
        }
    }

    #[test]
    fn test_param_names() {
        assert_eq!(
            parse_param_names("a, b ,c", 0).unwrap(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(parse_param_names("", 0).unwrap().is_empty());
        for src in ["a, a", "a b", "a,", "1", "a.b"] {
            let err = parse_param_names(src, 0).unwrap_err();
            assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E204), "{src:?}");
        }
    }
}
