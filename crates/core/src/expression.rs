//! `depends_on` conditional-visibility expressions.
//!
//! The authored language is a single comparison,
//! `<identifier> (== | !=) <literal>`, with the literal optionally wrapped in
//! single or double quotes. Expressions are parsed once into an [`Expr`] tree
//! and then evaluated against any number of records.
//!
//! Visibility always fails open: an absent expression, a record that has not
//! loaded yet, or an expression that does not parse all mean "visible".

use std::sync::OnceLock;

use regex::Regex;

use crate::types::{is_truthy_flag, value_as_text, FormRecord};

/// Errors raised while parsing a `depends_on` expression.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExpressionError {
    #[error("Invalid depends_on condition format: {0:?}")]
    InvalidFormat(String),
}

// ---------------------------------------------------------------------------
// AST
// ---------------------------------------------------------------------------

/// Parsed expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Literal(String),
    FieldRef(String),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Operand value of this node against `record`.
    ///
    /// Missing and `null` fields have no value and never equal a literal.
    fn value(&self, record: &FormRecord) -> Option<String> {
        match self {
            Self::Literal(s) => Some(s.clone()),
            Self::FieldRef(name) => record
                .get(name)
                .filter(|v| !v.is_null())
                .map(value_as_text),
            Self::Eq(..) | Self::NotEq(..) => Some(self.truth(record).to_string()),
        }
    }

    /// Boolean result of this node against `record`.
    pub fn truth(&self, record: &FormRecord) -> bool {
        match self {
            Self::Eq(lhs, rhs) => lhs.value(record) == rhs.value(record),
            Self::NotEq(lhs, rhs) => lhs.value(record) != rhs.value(record),
            Self::Literal(s) => !s.is_empty(),
            Self::FieldRef(name) => is_truthy_flag(record.get(name)),
        }
    }
}

fn comparison_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^\s*(\w+)\s*(==|!=)\s*(?:'([^']*)'|"([^"]*)"|(.*?))\s*$"#)
            .unwrap_or_else(|e| panic!("depends_on pattern must compile: {e}"))
    })
}

/// Parse an authored expression into an [`Expr`].
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let caps = comparison_pattern()
        .captures(source)
        .ok_or_else(|| ExpressionError::InvalidFormat(source.to_string()))?;

    let field = Expr::FieldRef(caps[1].to_string());
    let literal = caps
        .get(3)
        .or_else(|| caps.get(4))
        .or_else(|| caps.get(5))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let literal = Expr::Literal(literal);

    Ok(match &caps[2] {
        "==" => Expr::Eq(Box::new(field), Box::new(literal)),
        _ => Expr::NotEq(Box::new(field), Box::new(literal)),
    })
}

// ---------------------------------------------------------------------------
// DependsOn
// ---------------------------------------------------------------------------

/// A compiled `depends_on` attribute of a tab, section, column or field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DependsOn {
    /// No expression authored.
    #[default]
    Always,
    When(Expr),
    /// Expression that failed to parse; kept for diagnostics.
    Malformed { source: String },
}

impl DependsOn {
    /// Compile an optional authored expression. Blank strings count as absent.
    pub fn compile(source: Option<&str>) -> Self {
        let Some(source) = source.filter(|s| !s.trim().is_empty()) else {
            return Self::Always;
        };
        match parse(source) {
            Ok(expr) => Self::When(expr),
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring malformed depends_on expression");
                Self::Malformed {
                    source: source.to_string(),
                }
            }
        }
    }

    /// Decide visibility against the current form record.
    ///
    /// `None` means the record has not been loaded yet.
    pub fn is_visible(&self, record: Option<&FormRecord>) -> bool {
        match (self, record) {
            (Self::When(expr), Some(record)) => expr.truth(record),
            _ => true,
        }
    }
}

/// One-shot helper: compile and evaluate in a single call.
pub fn evaluate(source: Option<&str>, record: Option<&FormRecord>) -> bool {
    DependsOn::compile(source).is_visible(record)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
