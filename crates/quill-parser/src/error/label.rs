//! Labeled source spans for diagnostic messages.

use crate::span::Span;

/// A message attached to a span of template source.
///
/// Primary labels mark where the problem is; secondary labels point at
/// related places, such as the directive that opened an unclosed block.
///
/// ```text
/// error[E202]: `#if` is missing its `#end`
///   --> page.html:2
///    |
///  2 | #if(user)
///    | --------- block opened here
///  9 |
///    | ^ template ends here
/// ```
#[derive(Debug, Clone)]
pub struct Label {
    span: Span,
    message: String,
    is_primary: bool,
}

impl Label {
    pub fn primary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            is_primary: true,
        }
    }

    pub fn secondary(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
            is_primary: false,
        }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_primary(&self) -> bool {
        self.is_primary
    }

    pub fn is_secondary(&self) -> bool {
        !self.is_primary
    }
}
