//! Template lexer.
//!
//! Splits template source into text runs and directive tokens. At every `#`
//! the lexer tries the regions of [`Region::ESCALATION`] in order; a region
//! that does not match leaves the cursor on the `#` and the next one is
//! tried. [`Region::Text`] always matches, so anything that is not a
//! well-formed directive or comment stays in the output verbatim.
//!
//! # Line trimming
//!
//! A directive (other than `#(...)`) or comment that sits alone on its line
//! takes the line with it: when only horizontal whitespace and other such
//! directives precede it since the last line break, and only horizontal
//! whitespace follows it up to a line break or the end of input, the
//! leading whitespace is dropped from the pending text and the trailing
//! whitespace plus one line break (`\n` or `\r\n`) is skipped.

use std::sync::Arc;

use log::trace;

use quill_core::Location;

use crate::{
    error::{Diagnostic, ErrorCode, Result},
    span::Span,
    tokens::{Symbol, TemplateToken},
};

/// The lexer states tried at a `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// `#(...)`, `#@name(...)`, `#name(...)` and parameterless keywords.
    Directive,
    /// `### ...` up to and including the line break.
    LineComment,
    /// `#-- ... --#`
    BlockComment,
    /// `#[[ ... ]]#`, copied to the output unparsed.
    RawBlock,
    /// A literal `#`.
    Text,
}

impl Region {
    const ESCALATION: [Region; 5] = [
        Region::Directive,
        Region::LineComment,
        Region::BlockComment,
        Region::RawBlock,
        Region::Text,
    ];
}

/// Byte offsets of a parameter list's contents, without the parentheses.
#[derive(Debug, Clone, Copy)]
struct Para {
    start: usize,
    end: usize,
}

struct Lexer<'a> {
    src: &'a str,
    name: Arc<str>,
    pos: usize,
    newlines: Vec<usize>,
    tokens: Vec<TemplateToken>,
    /// Pending text, flushed as one token at the next directive.
    text: String,
    text_start: usize,
    /// Only horizontal whitespace and trimmable directives since the last
    /// line break.
    line_clean: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str, name: Arc<str>) -> Self {
        Self {
            src,
            name,
            pos: 0,
            newlines: src.match_indices('\n').map(|(i, _)| i).collect(),
            tokens: Vec::new(),
            text: String::new(),
            text_start: 0,
            line_clean: true,
        }
    }

    fn row(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }

    fn location(&self, offset: usize) -> Location {
        Location::new(Arc::clone(&self.name), self.row(offset))
    }

    fn run(mut self) -> Result<Vec<TemplateToken>> {
        let src = self.src;
        while self.pos < src.len() {
            match src[self.pos..].find('#') {
                Some(0) => self.lex_hash()?,
                Some(offset) => {
                    let end = self.pos + offset;
                    self.push_text(self.pos, end);
                    self.pos = end;
                }
                None => {
                    self.push_text(self.pos, src.len());
                    self.pos = src.len();
                }
            }
        }
        self.flush_text();
        let end = src.len();
        self.tokens.push(TemplateToken::new(
            Symbol::Eof,
            "",
            self.row(end),
            Span::new(end..end),
        ));
        trace!(template = &*self.name, tokens = self.tokens.len(); "Lexed template");
        Ok(self.tokens)
    }

    fn lex_hash(&mut self) -> Result<()> {
        for region in Region::ESCALATION {
            let matched = match region {
                Region::Directive => self.directive()?,
                Region::LineComment => self.line_comment(),
                Region::BlockComment => self.block_comment(),
                Region::RawBlock => self.raw_block(),
                Region::Text => {
                    self.push_text(self.pos, self.pos + 1);
                    self.pos += 1;
                    true
                }
            };
            if matched {
                break;
            }
        }
        Ok(())
    }

    fn directive(&mut self) -> Result<bool> {
        let src = self.src;
        let bytes = src.as_bytes();
        let start = self.pos;
        let cursor = start + 1;

        match bytes.get(cursor) {
            Some(b'(') => {
                let para = self.scan_para(cursor)?;
                self.emit(Symbol::Output, "", start, para.end + 1, Some(para));
                Ok(true)
            }
            Some(b'@') => {
                let name_end = scan_ident(src, cursor + 1);
                if name_end == cursor + 1 {
                    return Ok(false);
                }
                let (symbol, open) = if bytes.get(name_end) == Some(&b'?') {
                    (Symbol::CallIfDefined, name_end + 1)
                } else {
                    (Symbol::Call, name_end)
                };
                if bytes.get(open) != Some(&b'(') {
                    return Ok(false);
                }
                let para = self.scan_para(open)?;
                self.emit(symbol, &src[cursor + 1..name_end], start, para.end + 1, Some(para));
                Ok(true)
            }
            Some(&b) if is_ident_start(b) => {
                let word_end = scan_ident(src, cursor);
                let word = &src[cursor..word_end];
                match word {
                    "define" => self.define(start, word_end),
                    "call" => {
                        let (symbol, open) = if bytes.get(word_end) == Some(&b'?') {
                            (Symbol::DynamicCallIfDefined, word_end + 1)
                        } else {
                            (Symbol::DynamicCall, word_end)
                        };
                        if bytes.get(open) != Some(&b'(') {
                            return Ok(false);
                        }
                        let para = self.scan_para(open)?;
                        self.emit(symbol, "", start, para.end + 1, Some(para));
                        Ok(true)
                    }
                    _ => {
                        if let Some(symbol) = Symbol::keyword_without_para(word) {
                            let end = if src[word_end..].starts_with("()") {
                                word_end + 2
                            } else {
                                word_end
                            };
                            self.emit(symbol, "", start, end, None);
                            return Ok(true);
                        }
                        if bytes.get(word_end) != Some(&b'(') {
                            return Ok(false);
                        }
                        let (symbol, text) = match Symbol::keyword_with_para(word) {
                            Some(symbol) => (symbol, ""),
                            None => (Symbol::Id, word),
                        };
                        let para = self.scan_para(word_end)?;
                        self.emit(symbol, text, start, para.end + 1, Some(para));
                        Ok(true)
                    }
                }
            }
            _ => Ok(false),
        }
    }

    /// `#define name(params)`; `word_end` points just past `define`.
    fn define(&mut self, start: usize, word_end: usize) -> Result<bool> {
        let src = self.src;
        let name_start = skip_hws(src, word_end);
        let name_end = scan_ident(src, name_start);
        let open = skip_hws(src, name_end);
        if name_start == word_end || name_end == name_start || src.as_bytes().get(open) != Some(&b'(')
        {
            return Err(Diagnostic::error("malformed function definition")
                .with_code(ErrorCode::E204)
                .with_label(Span::new(start..name_end.max(word_end)), "expected a name and parameters")
                .with_location(self.location(start))
                .with_help("write `#define name(param, ...)`"));
        }
        let para = self.scan_para(open)?;
        self.emit(
            Symbol::Define,
            &src[name_start..name_end],
            start,
            para.end + 1,
            Some(para),
        );
        Ok(true)
    }

    fn line_comment(&mut self) -> bool {
        let src = self.src;
        if !src[self.pos..].starts_with("###") {
            return false;
        }
        let end = src[self.pos..]
            .find('\n')
            .map_or(src.len(), |offset| self.pos + offset + 1);
        if self.line_clean {
            self.drop_line_indent();
        }
        self.pos = end;
        self.line_clean = true;
        true
    }

    fn block_comment(&mut self) -> bool {
        let src = self.src;
        if !src[self.pos..].starts_with("#--") {
            return false;
        }
        let Some(close) = src[self.pos + 3..].find("--#") else {
            return false;
        };
        let end = self.pos + 3 + close + 3;
        self.pos = self.trim(end);
        true
    }

    fn raw_block(&mut self) -> bool {
        let src = self.src;
        if !src[self.pos..].starts_with("#[[") {
            return false;
        }
        let content_start = self.pos + 3;
        let Some(close) = src[content_start..].find("]]#") else {
            return false;
        };
        let content_end = content_start + close;
        self.push_text(content_start, content_end);
        self.pos = content_end + 3;
        true
    }

    /// Scan a parameter list starting at the `(` at `open`.
    fn scan_para(&self, open: usize) -> Result<Para> {
        let bytes = self.src.as_bytes();
        let mut depth = 0usize;
        let mut i = open;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Para {
                            start: open + 1,
                            end: i,
                        });
                    }
                }
                quote @ (b'"' | b'\'') => {
                    i = self.skip_string(i, quote)?;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
        Err(Diagnostic::error("parameter list is never closed")
            .with_code(ErrorCode::E001)
            .with_label(Span::new(open..bytes.len()), ErrorCode::E001.description())
            .with_location(self.location(open))
            .with_help("add the missing `)`"))
    }

    /// Index just past the closing quote of the string starting at `start`.
    fn skip_string(&self, start: usize, quote: u8) -> Result<usize> {
        let bytes = self.src.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b if b == quote => return Ok(i + 1),
                _ => i += 1,
            }
        }
        Err(Diagnostic::error("string literal is never closed")
            .with_code(ErrorCode::E002)
            .with_label(Span::new(start..bytes.len()), ErrorCode::E002.description())
            .with_location(self.location(start))
            .with_help(format!("add the closing `{}`", quote as char)))
    }

    /// Push a directive token (plus its parameter list) ending at `end`.
    fn emit(&mut self, symbol: Symbol, text: &str, start: usize, end: usize, para: Option<Para>) {
        let resume = if symbol.is_trimmable() {
            self.trim(end)
        } else {
            self.line_clean = false;
            end
        };
        self.flush_text();
        self.tokens.push(TemplateToken::new(
            symbol,
            text,
            self.row(start),
            Span::new(start..end),
        ));
        if let Some(para) = para {
            self.tokens.push(TemplateToken::new(
                Symbol::Para,
                &self.src[para.start..para.end],
                self.row(para.start),
                Span::new(para.start..para.end),
            ));
        }
        self.pos = resume;
    }

    /// Apply line trimming to a trimmable construct ending at `end`. Returns
    /// where lexing resumes.
    fn trim(&mut self, end: usize) -> usize {
        if !self.line_clean {
            return end;
        }
        match line_break_after(self.src, end) {
            Some(resume) => {
                self.drop_line_indent();
                resume
            }
            None => end,
        }
    }

    /// Drop pending text after its last line break.
    fn drop_line_indent(&mut self) {
        let keep = self.text.rfind('\n').map_or(0, |i| i + 1);
        self.text.truncate(keep);
    }

    fn push_text(&mut self, start: usize, end: usize) {
        let src = self.src;
        let text = &src[start..end];
        if text.is_empty() {
            return;
        }
        if self.text.is_empty() {
            self.text_start = start;
        }
        self.text.push_str(text);
        match text.rfind('\n') {
            Some(i) => self.line_clean = is_hws(&text[i + 1..]),
            None => self.line_clean &= is_hws(text),
        }
    }

    fn flush_text(&mut self) {
        if self.text.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.text);
        let span = Span::new(self.text_start..self.text_start + text.len());
        self.tokens.push(TemplateToken::new(
            Symbol::Text,
            text,
            self.row(self.text_start),
            span,
        ));
    }
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn scan_ident(src: &str, from: usize) -> usize {
    let bytes = src.as_bytes();
    if !bytes.get(from).is_some_and(|&b| is_ident_start(b)) {
        return from;
    }
    from + bytes[from..]
        .iter()
        .take_while(|&&b| b.is_ascii_alphanumeric() || b == b'_')
        .count()
}

fn skip_hws(src: &str, from: usize) -> usize {
    from + src.as_bytes()[from..]
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count()
}

fn is_hws(s: &str) -> bool {
    s.bytes().all(|b| b == b' ' || b == b'\t')
}

/// Where the line containing `from` ends, if only horizontal whitespace is
/// left on it.
fn line_break_after(src: &str, from: usize) -> Option<usize> {
    let after_ws = skip_hws(src, from);
    let rest = &src[after_ws..];
    if rest.is_empty() {
        Some(src.len())
    } else if rest.starts_with("\r\n") {
        Some(after_ws + 2)
    } else if rest.starts_with('\n') {
        Some(after_ws + 1)
    } else {
        None
    }
}

/// Tokenize template source. The token stream always ends with
/// [`Symbol::Eof`].
pub fn tokenize(src: &str, name: impl Into<Arc<str>>) -> Result<Vec<TemplateToken>> {
    Lexer::new(src, name.into()).run()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn lex(src: &str) -> Vec<TemplateToken> {
        tokenize(src, "test").expect("template should lex")
    }

    fn symbols(src: &str) -> Vec<Symbol> {
        lex(src).into_iter().map(|t| t.symbol).collect()
    }

    fn text_of(src: &str) -> String {
        lex(src)
            .into_iter()
            .filter(|t| t.symbol == Symbol::Text)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_output_with_para() {
        let tokens = lex("Hello #(name)!");
        let kinds: Vec<_> = tokens.iter().map(|t| t.symbol).collect();
        assert_eq!(
            kinds,
            vec![
                Symbol::Text,
                Symbol::Output,
                Symbol::Para,
                Symbol::Text,
                Symbol::Eof
            ]
        );
        assert_eq!(tokens[0].text, "Hello ");
        assert_eq!(tokens[2].text, "name");
        assert_eq!(tokens[3].text, "!");
    }

    #[test]
    fn test_nested_parens_and_strings_in_para() {
        let tokens = lex(r#"#(f(a, ")") + ('(' + "\")"))"#);
        assert_eq!(tokens[1].symbol, Symbol::Para);
        assert_eq!(tokens[1].text, r#"f(a, ")") + ('(' + "\")")"#);
    }

    #[test]
    fn test_call_forms() {
        let tokens = lex("#@row(1)#@row?(2)#call(\"row\", 3)#call?(n)");
        let calls: Vec<_> = tokens
            .iter()
            .filter(|t| t.symbol != Symbol::Para && t.symbol != Symbol::Eof)
            .map(|t| (t.symbol, t.text.as_str()))
            .collect();
        assert_eq!(
            calls,
            vec![
                (Symbol::Call, "row"),
                (Symbol::CallIfDefined, "row"),
                (Symbol::DynamicCall, ""),
                (Symbol::DynamicCallIfDefined, ""),
            ]
        );
    }

    #[test]
    fn test_define_header() {
        let tokens = lex("#define card(title, body)x#end");
        assert_eq!(tokens[0].symbol, Symbol::Define);
        assert_eq!(tokens[0].text, "card");
        assert_eq!(tokens[1].text, "title, body");
    }

    #[test]
    fn test_malformed_define_is_error() {
        let err = tokenize("#define (x)", "t").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::E204));
    }

    #[test]
    fn test_keywords_and_extensions() {
        assert_eq!(
            symbols("#if(a)#elseif(b)#else#end"),
            vec![
                Symbol::If,
                Symbol::Para,
                Symbol::ElseIf,
                Symbol::Para,
                Symbol::Else,
                Symbol::End,
                Symbol::Eof
            ]
        );
        let tokens = lex("#widget(1)");
        assert_eq!(tokens[0].symbol, Symbol::Id);
        assert_eq!(tokens[0].text, "widget");
    }

    #[test]
    fn test_parameterless_accepts_empty_parens() {
        assert_eq!(
            symbols("#for(x : y)#break()#end()"),
            vec![
                Symbol::For,
                Symbol::Para,
                Symbol::Break,
                Symbol::End,
                Symbol::Eof
            ]
        );
    }

    #[test]
    fn test_hash_without_directive_is_text() {
        assert_eq!(text_of("color: #fff; #ending #"), "color: #fff; #ending #");
        assert_eq!(text_of("#include is a word"), "#include is a word");
    }

    #[test]
    fn test_comments_and_raw() {
        assert_eq!(text_of("a ### note\nb"), "a b");
        assert_eq!(text_of("a#-- gone --#b"), "ab");
        assert_eq!(text_of("#[[#(raw) #if]]#"), "#(raw) #if");
    }

    #[test]
    fn test_unterminated_regions_fall_back_to_text() {
        assert_eq!(text_of("a #-- open"), "a #-- open");
        assert_eq!(text_of("#[[ open"), "#[[ open");
    }

    #[test]
    fn test_unclosed_para_is_error() {
        let err = tokenize("line\n#if(a", "t").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::E001));
        assert_eq!(err.location().map(|l| l.row()), Some(2));
    }

    #[test]
    fn test_unclosed_string_in_para_is_error() {
        let err = tokenize("#(\"abc)", "t").unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::E002));
    }

    #[test]
    fn test_standalone_directive_lines_are_trimmed() {
        let src = "<ul>\n  #for(x : xs)\n  <li>\n  #end\n</ul>\n";
        assert_eq!(text_of(src), "<ul>\n  <li>\n</ul>\n");
    }

    #[test]
    fn test_crlf_line_is_trimmed() {
        assert_eq!(text_of("a\r\n #if(x) \r\nb\r\n#end"), "a\r\nb\r\n");
    }

    #[test]
    fn test_inline_directive_is_not_trimmed() {
        assert_eq!(text_of("a #if(x) b\n"), "a  b\n");
        assert_eq!(text_of("  #(x)\n"), "  \n");
    }

    #[test]
    fn test_outer_edges_untouched() {
        assert_eq!(text_of("  lead\n#set(a = 1)\ntrail  "), "  lead\ntrail  ");
    }

    #[test]
    fn test_rows() {
        let tokens = lex("a\nb\n#(x)\n");
        let output = tokens.iter().find(|t| t.symbol == Symbol::Output).unwrap();
        assert_eq!(output.row, 3);
    }

    proptest! {
        #[test]
        fn prop_text_without_hash_is_single_token(s in "[^#]{1,64}") {
            let tokens = lex(&s);
            prop_assert_eq!(tokens.len(), 2);
            prop_assert_eq!(&tokens[0].text, &s);
        }
    }
}
