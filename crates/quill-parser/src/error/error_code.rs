//! Error codes for the Quill diagnostic system.
//!
//! Error codes are organized by phase:
//! - `E0xx` - Lexer errors
//! - `E1xx` - Expression parser errors
//! - `E2xx` - Statement parser errors
//! - `E3xx` - Resource errors

use std::fmt;

/// Error codes for categorizing diagnostic errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // =========================================================================
    // Lexer Errors (E0xx)
    // =========================================================================
    /// Unterminated parameter list.
    ///
    /// A directive opened `(` but the matching `)` was never found.
    E001,

    /// Unterminated string literal.
    ///
    /// A string inside a parameter list was opened but never closed.
    E002,

    /// Invalid escape sequence.
    ///
    /// Valid escapes are: `\n`, `\r`, `\t`, `\b`, `\f`, `\\`, `\/`, `\'`,
    /// `\"`, `\0` and `\uXXXX`.
    E003,

    /// Unexpected character in an expression.
    E004,

    /// Invalid number literal.
    ///
    /// The literal is malformed, has a misplaced suffix, or does not fit in
    /// a 64-bit integer.
    E005,

    // =========================================================================
    // Expression Parser Errors (E1xx)
    // =========================================================================
    /// Unexpected token.
    E100,

    /// Incomplete expression.
    ///
    /// The parameter list ended before a complete expression was parsed.
    E101,

    /// Invalid assignment target.
    ///
    /// Only variables, fields (`a.b`) and indexes (`a[i]`) can be assigned
    /// or incremented.
    E102,

    // =========================================================================
    // Statement Parser Errors (E2xx)
    // =========================================================================
    /// Unknown directive.
    ///
    /// `#name(...)` was used but no directive named `name` is registered.
    E200,

    /// Unmatched `#end`.
    E201,

    /// Missing `#end`.
    ///
    /// A block directive reached the end of the template without being
    /// closed.
    E202,

    /// Misplaced branch marker.
    ///
    /// `#else`, `#elseif`, `#case` or `#default` appeared outside the block
    /// they belong to.
    E203,

    /// Invalid `#define`.
    ///
    /// The function header is malformed, a parameter is repeated, the
    /// function is already defined, or the definition is nested inside
    /// another directive.
    E204,

    /// Invalid `#include` argument.
    ///
    /// The first argument must be a string literal and the remaining ones
    /// assignments to plain variables.
    E205,

    /// Invalid `#for` header.
    ///
    /// Expected `#for(x : items)` or `#for(init; cond; update)`.
    E206,

    /// Invalid `#set` argument.
    ///
    /// Every argument of `#set`, `#setLocal` and `#setGlobal` must be an
    /// assignment.
    E207,

    /// Invalid `#switch` body.
    ///
    /// Only `#case` and `#default` may appear directly inside `#switch`, and
    /// `#default` at most once.
    E208,

    /// Wrong number of parameters for a directive.
    E209,

    /// `#break` or `#continue` outside of `#for`.
    E210,

    // =========================================================================
    // Resource Errors (E3xx)
    // =========================================================================
    /// Include target not found.
    E300,

    /// Include depth exceeded.
    ///
    /// Includes are nested deeper than the configured limit, usually because
    /// a template includes itself.
    E301,
}

impl ErrorCode {
    /// Returns the numeric code as a string (e.g., "E001").
    pub fn as_str(&self) -> &'static str {
        match self {
            // Lexer errors
            ErrorCode::E001 => "E001",
            ErrorCode::E002 => "E002",
            ErrorCode::E003 => "E003",
            ErrorCode::E004 => "E004",
            ErrorCode::E005 => "E005",
            // Expression parser errors
            ErrorCode::E100 => "E100",
            ErrorCode::E101 => "E101",
            ErrorCode::E102 => "E102",
            // Statement parser errors
            ErrorCode::E200 => "E200",
            ErrorCode::E201 => "E201",
            ErrorCode::E202 => "E202",
            ErrorCode::E203 => "E203",
            ErrorCode::E204 => "E204",
            ErrorCode::E205 => "E205",
            ErrorCode::E206 => "E206",
            ErrorCode::E207 => "E207",
            ErrorCode::E208 => "E208",
            ErrorCode::E209 => "E209",
            ErrorCode::E210 => "E210",
            // Resource errors
            ErrorCode::E300 => "E300",
            ErrorCode::E301 => "E301",
        }
    }

    /// Returns a short description of what this error code means.
    pub fn description(&self) -> &'static str {
        match self {
            // Lexer errors
            ErrorCode::E001 => "unterminated parameter list",
            ErrorCode::E002 => "unterminated string literal",
            ErrorCode::E003 => "invalid escape sequence",
            ErrorCode::E004 => "unexpected character",
            ErrorCode::E005 => "invalid number literal",
            // Expression parser errors
            ErrorCode::E100 => "unexpected token",
            ErrorCode::E101 => "incomplete expression",
            ErrorCode::E102 => "invalid assignment target",
            // Statement parser errors
            ErrorCode::E200 => "unknown directive",
            ErrorCode::E201 => "unmatched #end",
            ErrorCode::E202 => "missing #end",
            ErrorCode::E203 => "misplaced branch marker",
            ErrorCode::E204 => "invalid #define",
            ErrorCode::E205 => "invalid #include argument",
            ErrorCode::E206 => "invalid #for header",
            ErrorCode::E207 => "invalid #set argument",
            ErrorCode::E208 => "invalid #switch body",
            ErrorCode::E209 => "wrong parameter count",
            ErrorCode::E210 => "loop control outside #for",
            // Resource errors
            ErrorCode::E300 => "include target not found",
            ErrorCode::E301 => "include depth exceeded",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::E001.to_string(), "E001");
        assert_eq!(ErrorCode::E100.to_string(), "E100");
        assert_eq!(ErrorCode::E210.to_string(), "E210");
        assert_eq!(ErrorCode::E300.to_string(), "E300");
    }

    #[test]
    fn test_error_code_description() {
        assert_eq!(ErrorCode::E001.description(), "unterminated parameter list");
        assert_eq!(ErrorCode::E201.description(), "unmatched #end");
        assert_eq!(ErrorCode::E301.description(), "include depth exceeded");
    }
}
