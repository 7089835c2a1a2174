//! Source locations attached to statements and errors.

use std::{fmt, sync::Arc};

/// A position inside a template: the template's identity and a 1-based row.
///
/// Every statement node carries one, and every compile-time or render-time
/// error reports the location of the directive that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    template: Arc<str>,
    row: usize,
}

impl Location {
    /// Create a location for `row` (1-based) in the template named `template`.
    pub fn new(template: impl Into<Arc<str>>, row: usize) -> Self {
        Self {
            template: template.into(),
            row,
        }
    }

    /// The identity of the template this location points into.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The shared template name, cheap to clone into new locations.
    pub fn template_arc(&self) -> &Arc<str> {
        &self.template
    }

    /// The 1-based source row.
    pub fn row(&self) -> usize {
        self.row
    }

    /// Another location in the same template.
    pub fn with_row(&self, row: usize) -> Self {
        Self {
            template: Arc::clone(&self.template),
            row,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.template, self.row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display() {
        let location = Location::new("index.html", 12);
        assert_eq!(location.to_string(), "index.html:12");
    }

    #[test]
    fn test_with_row_keeps_template() {
        let location = Location::new("layout.html", 1);
        let moved = location.with_row(7);
        assert_eq!(moved.template(), "layout.html");
        assert_eq!(moved.row(), 7);
    }
}
