//! Collector for accumulating diagnostics during a processing phase.
//!
//! The expression lexer keeps going after a bad character so that a single
//! run reports every problem in a parameter list; the
//! [`DiagnosticCollector`] gathers what it finds.

use crate::error::{Diagnostic, ParseError};

#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// `Err` with every diagnostic if any was emitted.
    pub fn finish(self) -> Result<(), ParseError> {
        if self.diagnostics.is_empty() {
            Ok(())
        } else {
            Err(ParseError::new(self.diagnostics))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorCode, span::Span};

    #[test]
    fn test_collector_empty_is_ok() {
        assert!(DiagnosticCollector::new().finish().is_ok());
    }

    #[test]
    fn test_collector_keeps_every_diagnostic() {
        let mut collector = DiagnosticCollector::new();
        collector.emit(
            Diagnostic::error("unexpected character `$`")
                .with_code(ErrorCode::E004)
                .with_label(Span::new(3..4), "here"),
        );
        collector.emit(Diagnostic::error("unexpected character `§`").with_code(ErrorCode::E004));

        let err = collector.finish().unwrap_err();
        assert_eq!(err.diagnostics().len(), 2);
        assert_eq!(err.diagnostics()[0].code(), Some(ErrorCode::E004));
    }
}
