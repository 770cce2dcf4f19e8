//! Column values as they arrive from the server, before display.

use crate::error::{SshqError, SshqResult};
use mysql_async::Value;

/// Text shown for SQL `NULL`.
pub const NULL_DISPLAY: &str = "NULL";

/// A column value in its native storage form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue<'a> {
    /// Textual value.
    Text(&'a str),
    /// Raw byte sequence that is not valid UTF-8.
    Bytes(&'a [u8]),
    /// SQL `NULL`.
    Null,
    /// Any other native type; carries the server's type name.
    Unsupported(String),
}

impl<'a> RawValue<'a> {
    /// Classify a wire value. `type_name` is the column's declared type and is
    /// only kept for values that cannot be displayed.
    ///
    /// The text protocol delivers every non-NULL value as bytes. The binary
    /// protocol delivers numbers, dates and times natively.
    pub fn from_wire(value: &'a Value, type_name: &str) -> Self {
        match value {
            Value::NULL => Self::Null,
            Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(text) => Self::Text(text),
                Err(_) => Self::Bytes(bytes),
            },
            _ => Self::Unsupported(type_name.to_string()),
        }
    }
}

impl RawValue<'_> {
    /// Coerce to display text. `column` names the column in the error.
    pub fn coerce(&self, column: &str) -> SshqResult<String> {
        match self {
            Self::Text(s) => Ok((*s).to_string()),
            Self::Bytes(b) => Ok(String::from_utf8_lossy(b).into_owned()),
            Self::Null => Ok(NULL_DISPLAY.to_string()),
            Self::Unsupported(type_name) => Err(SshqError::coercion(column, type_name.as_str())),
        }
    }
}
