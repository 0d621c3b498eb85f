//! Problems found while introspecting a layer.
//!
//! Introspection never fails construction; each problem is logged and
//! recorded here so hosts can surface it next to the layer.

use std::fmt;

use log::warn;

/// One recovered problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Setting, step or column the problem concerns.
    pub field: String,
    /// What went wrong.
    pub issue: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.issue)
    }
}

/// Ordered list of [`Diagnostic`] records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Log and record a problem.
    pub fn record(&mut self, field: impl Into<String>, issue: impl Into<String>) {
        let diagnostic = Diagnostic {
            field: field.into(),
            issue: issue.into(),
        };
        warn!("postgis: {diagnostic}");
        self.entries.push(diagnostic);
    }

    /// Recorded problems in order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Whether any problem concerns `field`.
    #[must_use]
    pub fn mentions(&self, field: &str) -> bool {
        self.entries.iter().any(|entry| entry.field == field)
    }

    /// Number of recorded problems.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether introspection was clean.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
