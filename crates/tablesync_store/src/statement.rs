//! Parameterized SQL statements.

use std::fmt;
use tablesync_protocol::Value;

/// SQL text with positional `?` parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Statement {
    /// SQL text.
    pub sql: String,
    /// Parameter values, in placeholder order.
    pub params: Vec<Value>,
}

impl Statement {
    /// Creates a statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends one parameter.
    #[must_use]
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Appends several parameters.
    #[must_use]
    pub fn bind_all<I>(mut self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.params.is_empty() {
            write!(f, " [")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{param}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
