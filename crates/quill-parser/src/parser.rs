//! Statement parser for Quill templates.
//!
//! This module consumes the token stream from the [`lexer`](super::lexer)
//! and builds a [`Stat`] tree, delegating every parameter list to the
//! [`expr_parser`](super::expr_parser). `#define`d functions are hoisted out
//! of the tree and `#include`s are resolved and compiled in place, so a
//! [`ParsedTemplate`] is self-contained. The public entry point is
//! [`parse`].

use std::{iter::Peekable, path::Path, sync::Arc, vec};

use log::{debug, trace};

use quill_core::{
    Location, Value,
    ast::{
        Call, CallTarget, Case, Custom, Define, ElseBranch, Expr, ExprList, For, If, Include,
        Output, Set, Stat, StatList, Switch, Text,
    },
    directive::DirectiveRegistry,
    scope::Assignment,
    source::{Source, SourceFactory},
};

use crate::{
    error::{Diagnostic, ErrorCode, ParseError},
    expr_parser, lexer,
    span::Span,
    tokens::{Symbol, TemplateToken},
};

type Result<T> = std::result::Result<T, ParseError>;

/// What the parser needs from the engine.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Extension directives available as `#name(...)`.
    pub directives: &'a DirectiveRegistry,
    /// Resolves `#include` targets.
    pub factory: &'a dyn SourceFactory,
    /// Root against which template names are resolved.
    pub base_path: Option<&'a Path>,
    /// Maximum `#include` nesting; `None` is unbounded.
    pub max_include_depth: Option<usize>,
}

/// A compiled template.
#[derive(Debug)]
pub struct ParsedTemplate {
    pub body: Stat,
    /// Functions defined by the template and everything it includes, in
    /// definition order.
    pub defines: Vec<Define>,
    /// The template's source followed by every included source.
    pub sources: Vec<Arc<dyn Source>>,
}

/// State shared by a template and all of its includes.
#[derive(Debug, Default)]
struct Hoisted {
    defines: Vec<Define>,
    /// Where each entry of `defines` was written.
    spans: Vec<Span>,
    sources: Vec<Arc<dyn Source>>,
}

impl Hoisted {
    fn define(&mut self, define: Define, span: Span) -> Result<()> {
        let found = self.defines.iter().zip(&self.spans).find(|(d, _)| d.name == define.name);
        if let Some((existing, existing_span)) = found {
            // The same file included twice defines its functions twice.
            if existing.location == define.location && *existing_span == span {
                return Ok(());
            }
            return Err(Diagnostic::error(format!(
                "function `{}` is already defined at {}",
                define.name, existing.location
            ))
            .with_code(ErrorCode::E204)
            .with_label(span, "defined again here")
            .with_location(define.location)
            .with_help("rename one of the functions")
            .into());
        }
        trace!(function = define.name.as_str(), params = define.params.len(); "Hoisted function");
        self.defines.push(define);
        self.spans.push(span);
        Ok(())
    }
}

/// Compile `source` and everything it includes.
pub fn parse(source: Arc<dyn Source>, ctx: &ParseContext<'_>) -> Result<ParsedTemplate> {
    let mut hoisted = Hoisted::default();
    let body = compile_source(source, ctx, &mut hoisted, 0)?;
    debug!(
        functions = hoisted.defines.len(),
        sources = hoisted.sources.len();
        "Parsed template"
    );
    Ok(ParsedTemplate {
        body,
        defines: hoisted.defines,
        sources: hoisted.sources,
    })
}

fn compile_source(
    source: Arc<dyn Source>,
    ctx: &ParseContext<'_>,
    hoisted: &mut Hoisted,
    include_depth: usize,
) -> Result<Stat> {
    let name: Arc<str> = Arc::from(source.name());
    let text = source.content().map_err(|err| {
        ParseError::from(
            Diagnostic::error(format!("cannot read template `{name}`: {err}"))
                .with_code(ErrorCode::E300)
                .with_location(Location::new(Arc::clone(&name), 1)),
        )
    })?;
    hoisted.sources.push(Arc::clone(&source));

    let attach = |err: ParseError| err.with_source(Arc::clone(&name), text.as_str());
    let tokens = lexer::tokenize(&text, Arc::clone(&name)).map_err(|d| attach(d.into()))?;
    let parser = Parser {
        tokens: tokens.into_iter().peekable(),
        name: Arc::clone(&name),
        ctx,
        hoisted,
        include_depth,
        block_depth: 0,
        loop_depth: 0,
    };
    parser.template().map_err(attach)
}

struct Parser<'p, 'c> {
    tokens: Peekable<vec::IntoIter<TemplateToken>>,
    name: Arc<str>,
    ctx: &'p ParseContext<'c>,
    hoisted: &'p mut Hoisted,
    include_depth: usize,
    /// Number of enclosing block directives.
    block_depth: usize,
    /// Number of enclosing `#for`s within the current function.
    loop_depth: usize,
}

impl Parser<'_, '_> {
    fn location(&self, token: &TemplateToken) -> Location {
        Location::new(Arc::clone(&self.name), token.row)
    }

    fn peek_symbol(&mut self) -> Symbol {
        self.tokens.peek().map_or(Symbol::Eof, |t| t.symbol)
    }

    fn bump(&mut self) -> Option<TemplateToken> {
        match self.tokens.peek() {
            Some(token) if token.symbol != Symbol::Eof => self.tokens.next(),
            _ => None,
        }
    }

    fn next_if(&mut self, symbol: Symbol) -> Option<TemplateToken> {
        self.tokens.next_if(|t| t.symbol == symbol)
    }

    /// The span of the current token, or an empty span at the end.
    fn here(&mut self) -> Span {
        self.tokens.peek().map_or_else(Span::default, |t| t.span)
    }

    fn template(mut self) -> Result<Stat> {
        let body = self.block()?;
        let symbol = self.peek_symbol();
        match symbol {
            Symbol::Eof => Ok(body.into_stat()),
            Symbol::End => {
                let token = self.bump();
                Err(self.stray(token, ErrorCode::E201, "unmatched `#end`"))
            }
            _ => {
                let token = self.bump();
                Err(self.stray(
                    token,
                    ErrorCode::E203,
                    &format!("`{symbol}` outside of its block"),
                ))
            }
        }
    }

    fn stray(&self, token: Option<TemplateToken>, code: ErrorCode, message: &str) -> ParseError {
        let mut diag = Diagnostic::error(message).with_code(code);
        if let Some(token) = token {
            diag = diag
                .with_label(token.span, code.description())
                .with_location(self.location(&token));
        }
        diag.into()
    }

    /// Statements up to the next `#end`, branch marker or the end of input.
    /// The terminator is left in the stream.
    fn block(&mut self) -> Result<StatList> {
        let row = self.tokens.peek().map_or(1, |t| t.row);
        let location = Location::new(Arc::clone(&self.name), row);
        let mut stats = Vec::new();
        loop {
            match self.peek_symbol() {
                Symbol::End
                | Symbol::Else
                | Symbol::ElseIf
                | Symbol::Case
                | Symbol::Default
                | Symbol::Eof => break,
                _ => {}
            }
            let Some(token) = self.bump() else { break };
            if let Some(stat) = self.statement(token)? {
                stats.push(stat);
            }
        }
        Ok(StatList::new(stats, location))
    }

    /// Parse the statement introduced by `token`. Hoisted definitions
    /// produce no statement.
    fn statement(&mut self, token: TemplateToken) -> Result<Option<Stat>> {
        let location = self.location(&token);
        let stat = match token.symbol {
            Symbol::Text => Stat::Text(Text {
                text: token.text,
                location,
            }),
            Symbol::Output => {
                let mut exprs = self.exprs(&token, &location)?.into_inner();
                let Some(expr) = exprs.pop().filter(|_| exprs.is_empty()) else {
                    return Err(arity(&token, &location, "`#(...)` takes exactly one expression"));
                };
                Stat::Output(Output { expr, location })
            }
            Symbol::If => Stat::If(self.if_chain(token, location)?),
            Symbol::For => self.for_loop(token, location)?,
            Symbol::Switch => self.switch(token, location)?,
            Symbol::Define => {
                self.define(token, location)?;
                return Ok(None);
            }
            Symbol::Call | Symbol::CallIfDefined => {
                let args = self.exprs(&token, &location)?;
                Stat::Call(Call {
                    if_defined: token.symbol == Symbol::CallIfDefined,
                    target: CallTarget::Named(token.text),
                    args,
                    location,
                })
            }
            Symbol::DynamicCall | Symbol::DynamicCallIfDefined => {
                let mut args = self.exprs(&token, &location)?.into_inner().into_iter();
                let Some(target) = args.next() else {
                    return Err(arity(
                        &token,
                        &location,
                        "`#call` needs the function name as its first argument",
                    ));
                };
                Stat::Call(Call {
                    target: CallTarget::Dynamic(target),
                    args: ExprList::new(args.collect()),
                    if_defined: token.symbol == Symbol::DynamicCallIfDefined,
                    location,
                })
            }
            Symbol::Set | Symbol::SetLocal | Symbol::SetGlobal => {
                let mode = match token.symbol {
                    Symbol::SetLocal => Assignment::Local,
                    Symbol::SetGlobal => Assignment::Global,
                    _ => Assignment::Wisdom,
                };
                let (exprs, span) = self.exprs_with_span(&token, &location)?;
                if exprs.is_empty() || !exprs.iter().all(Expr::is_assignment) {
                    return Err(Diagnostic::error(format!(
                        "`{}` arguments must be assignments",
                        token.symbol
                    ))
                    .with_code(ErrorCode::E207)
                    .with_label(span, "expected `name = value, ...`")
                    .with_location(location)
                    .into());
                }
                Stat::Set(Set {
                    mode,
                    exprs,
                    location,
                })
            }
            Symbol::Include => self.include(token, location)?,
            Symbol::Break | Symbol::Continue => {
                if self.loop_depth == 0 {
                    return Err(Diagnostic::error(format!("`{}` outside of `#for`", token.symbol))
                        .with_code(ErrorCode::E210)
                        .with_label(token.span, ErrorCode::E210.description())
                        .with_location(location)
                        .into());
                }
                if token.symbol == Symbol::Break {
                    Stat::Break(location)
                } else {
                    Stat::Continue(location)
                }
            }
            Symbol::Return => Stat::Return(location),
            Symbol::Id => self.custom(token, location)?,
            Symbol::End
            | Symbol::Else
            | Symbol::ElseIf
            | Symbol::Case
            | Symbol::Default
            | Symbol::Para
            | Symbol::Eof => {
                return Err(self.stray(
                    Some(token),
                    ErrorCode::E100,
                    "unexpected token in statement position",
                ));
            }
        };
        Ok(Some(stat))
    }

    /// The raw parameter token following `owner`.
    fn para(&mut self, owner: &TemplateToken, location: &Location) -> Result<TemplateToken> {
        match self.tokens.next_if(|t| t.symbol == Symbol::Para) {
            Some(para) => Ok(para),
            None => Err(Diagnostic::error(format!("`{}` is missing its parameters", owner.symbol))
                .with_code(ErrorCode::E001)
                .with_label(owner.span, "expected `(...)`")
                .with_location(location.clone())
                .into()),
        }
    }

    fn exprs(&mut self, owner: &TemplateToken, location: &Location) -> Result<ExprList> {
        self.exprs_with_span(owner, location).map(|(exprs, _)| exprs)
    }

    fn exprs_with_span(
        &mut self,
        owner: &TemplateToken,
        location: &Location,
    ) -> Result<(ExprList, Span)> {
        let para = self.para(owner, location)?;
        let exprs = expr_parser::parse_expr_list(&para.text, para.span.start())
            .map_err(|e| e.with_location(location))?;
        Ok((exprs, owner.span.union(para.span)))
    }

    /// Parse a block body and require the `#end` that closes `opener`.
    fn body_to_end(&mut self, opener: &TemplateToken, location: &Location) -> Result<Stat> {
        let body = self.nested_block()?;
        self.expect_end(opener, location)?;
        Ok(body.into_stat())
    }

    fn nested_block(&mut self) -> Result<StatList> {
        self.block_depth += 1;
        let body = self.block();
        self.block_depth -= 1;
        body
    }

    fn expect_end(&mut self, opener: &TemplateToken, location: &Location) -> Result<()> {
        match self.peek_symbol() {
            Symbol::End => {
                self.bump();
                Ok(())
            }
            Symbol::Eof => {
                let end = self.here();
                Err(Diagnostic::error(format!("`{}` is missing its `#end`", opener.symbol))
                    .with_code(ErrorCode::E202)
                    .with_label(end, "template ends here")
                    .with_secondary_label(opener.span, "block opened here")
                    .with_location(location.clone())
                    .with_help("close the block with `#end`")
                    .into())
            }
            symbol => {
                let token = self.bump();
                Err(self.stray(
                    token,
                    ErrorCode::E203,
                    &format!("`{symbol}` is not allowed inside `{}`", opener.symbol),
                ))
            }
        }
    }

    /// `#if`, its `#elseif` chain and `#else`, closed by a single `#end`.
    fn if_chain(&mut self, token: TemplateToken, location: Location) -> Result<If> {
        let (cond, _) = self.exprs_with_span(&token, &location)?;
        if cond.is_empty() {
            return Err(arity(&token, &location, "`#if` needs a condition"));
        }
        let then = Box::new(self.nested_block()?.into_stat());
        let otherwise = if let Some(elseif) = self.next_if(Symbol::ElseIf) {
            let elseif_location = self.location(&elseif);
            Some(ElseBranch::ElseIf(Box::new(
                self.if_chain(elseif, elseif_location)?,
            )))
        } else if self.next_if(Symbol::Else).is_some() {
            let body = self.body_to_end(&token, &location)?;
            Some(ElseBranch::Else(Box::new(body)))
        } else {
            self.expect_end(&token, &location)?;
            None
        };
        Ok(If {
            cond,
            then,
            otherwise,
            location,
        })
    }

    fn for_loop(&mut self, token: TemplateToken, location: Location) -> Result<Stat> {
        let para = self.para(&token, &location)?;
        let form = expr_parser::parse_for_header(&para.text, para.span.start())
            .map_err(|e| e.with_location(&location))?;

        self.loop_depth += 1;
        let body = self.nested_block();
        self.loop_depth -= 1;
        let body = Box::new(body?.into_stat());

        let otherwise = if self.next_if(Symbol::Else).is_some() {
            Some(Box::new(self.body_to_end(&token, &location)?))
        } else {
            self.expect_end(&token, &location)?;
            None
        };
        Ok(Stat::For(For {
            form,
            body,
            otherwise,
            location,
        }))
    }

    fn switch(&mut self, token: TemplateToken, location: Location) -> Result<Stat> {
        let mut values = self.exprs(&token, &location)?.into_inner();
        let Some(value) = values.pop().filter(|_| values.is_empty()) else {
            return Err(arity(&token, &location, "`#switch` takes exactly one expression"));
        };

        // Only blank text may precede the first `#case`.
        while let Some(text) = self
            .tokens
            .next_if(|t| t.symbol == Symbol::Text && t.text.trim().is_empty())
        {
            trace!(row = text.row; "Skipped blank text in switch");
        }

        let mut cases = Vec::new();
        let mut default: Option<Box<Stat>> = None;
        loop {
            match self.peek_symbol() {
                Symbol::Case => {
                    let Some(case) = self.bump() else { break };
                    let case_location = self.location(&case);
                    let values = self.exprs(&case, &case_location)?;
                    if values.is_empty() {
                        return Err(arity(&case, &case_location, "`#case` needs a value"));
                    }
                    let body = self.nested_block()?.into_stat();
                    cases.push(Case {
                        values,
                        body,
                        location: case_location,
                    });
                }
                Symbol::Default => {
                    let Some(marker) = self.bump() else { break };
                    if default.is_some() {
                        return Err(Diagnostic::error("`#switch` has more than one `#default`")
                            .with_code(ErrorCode::E208)
                            .with_label(marker.span, "second `#default`")
                            .with_location(self.location(&marker))
                            .into());
                    }
                    default = Some(Box::new(self.nested_block()?.into_stat()));
                }
                Symbol::End | Symbol::Eof | Symbol::Else | Symbol::ElseIf => {
                    self.expect_end(&token, &location)?;
                    break;
                }
                _ => {
                    let span = self.here();
                    return Err(Diagnostic::error(
                        "only `#case` and `#default` may appear directly inside `#switch`",
                    )
                    .with_code(ErrorCode::E208)
                    .with_label(span, "not a `#case`")
                    .with_secondary_label(token.span, "in this switch")
                    .with_location(location)
                    .into());
                }
            }
        }
        Ok(Stat::Switch(Switch {
            value,
            cases,
            default,
            location,
        }))
    }

    fn define(&mut self, token: TemplateToken, location: Location) -> Result<()> {
        if self.block_depth > 0 {
            return Err(Diagnostic::error("`#define` must be at the top level of a template")
                .with_code(ErrorCode::E204)
                .with_label(token.span, "nested definition")
                .with_location(location)
                .into());
        }
        let para = self.para(&token, &location)?;
        let params = expr_parser::parse_param_names(&para.text, para.span.start())
            .map_err(|e| e.with_location(&location))?;

        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.body_to_end(&token, &location);
        self.loop_depth = outer_loops;

        let define = Define {
            name: token.text,
            params,
            body: body?,
            location,
        };
        self.hoisted.define(define, token.span)
    }

    fn include(&mut self, token: TemplateToken, location: Location) -> Result<Stat> {
        let (exprs, span) = self.exprs_with_span(&token, &location)?;
        let invalid = |message: &str| -> ParseError {
            Diagnostic::error(message.to_string())
                .with_code(ErrorCode::E205)
                .with_label(span, ErrorCode::E205.description())
                .with_location(location.clone())
                .with_help("write `#include(\"file\", name = value, ...)`")
                .into()
        };

        let mut exprs = exprs.into_inner().into_iter();
        let target = match exprs.next() {
            Some(Expr::Const(Value::Str(target))) => target,
            _ => return Err(invalid("`#include` needs a string literal naming the template")),
        };
        let assigns: Vec<Expr> = exprs.collect();
        let plain_assign =
            |e: &Expr| matches!(e, Expr::Assign { target, .. } if matches!(**target, Expr::Id(_)));
        if !assigns.iter().all(plain_assign) {
            return Err(invalid("extra `#include` arguments must be `name = value`"));
        }

        let depth = self.include_depth + 1;
        if let Some(max) = self.ctx.max_include_depth.filter(|&max| depth > max) {
            return Err(Diagnostic::error(format!(
                "include depth limit of {max} exceeded including `{target}`"
            ))
            .with_code(ErrorCode::E301)
            .with_label(span, "included here")
            .with_location(location)
            .with_help("check for templates that include each other")
            .into());
        }

        let name = resolve_include(&self.name, &target);
        let source = self
            .ctx
            .factory
            .source(self.ctx.base_path, &name)
            .map_err(|err| -> ParseError {
                Diagnostic::error(format!("cannot include `{name}`: {err}"))
                    .with_code(ErrorCode::E300)
                    .with_label(span, "included here")
                    .with_location(location.clone())
                    .into()
            })?;
        trace!(template = &*self.name, include = name.as_str(), depth; "Including template");

        let body = compile_source(source, self.ctx, self.hoisted, depth)
            .map_err(|e| e.with_location(&location))?;
        Ok(Stat::Include(Include {
            name,
            assigns: ExprList::new(assigns),
            body: Box::new(body),
            location,
        }))
    }

    fn custom(&mut self, token: TemplateToken, location: Location) -> Result<Stat> {
        let Some(mut directive) = self.ctx.directives.create(&token.text) else {
            return Err(Diagnostic::error(format!("unknown directive `#{}`", token.text))
                .with_code(ErrorCode::E200)
                .with_label(token.span, ErrorCode::E200.description())
                .with_location(location)
                .with_help("register the directive on the engine builder")
                .into());
        };
        let (exprs, span) = self.exprs_with_span(&token, &location)?;
        directive.set_expr(exprs).map_err(|message| -> ParseError {
            Diagnostic::error(format!("`#{}`: {message}", token.text))
                .with_code(ErrorCode::E209)
                .with_label(span, "rejected parameters")
                .with_location(location.clone())
                .into()
        })?;
        if directive.has_end() {
            let body = self.body_to_end(&token, &location)?;
            directive.set_body(body);
        }
        Ok(Stat::Custom(Custom {
            name: token.text,
            directive,
            location,
        }))
    }
}

fn arity(token: &TemplateToken, location: &Location, message: &str) -> ParseError {
    Diagnostic::error(message)
        .with_code(ErrorCode::E209)
        .with_label(token.span, ErrorCode::E209.description())
        .with_location(location.clone())
        .into()
}

/// Resolve an include target against the including template's name.
///
/// A leading `/` is relative to the engine's base path; anything else is
/// relative to the directory of `current`. `.` and `..` segments are folded.
pub(crate) fn resolve_include(current: &str, target: &str) -> String {
    let joined = match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => match current.rfind('/') {
            Some(slash) => format!("{}/{target}", &current[..slash]),
            None => target.to_string(),
        },
    };
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}
