//! Column-aligned table output.
//!
//! Rows are buffered until [`TableWriter::finish`] so every column can be
//! padded to its widest value, then written with a `|` before each column
//! after the first and a dash rule under the header:
//!
//! ```text
//! id |name
//! --------
//! 1  |alice
//! 22 |bob
//! ```

use crate::error::{SshqError, SshqResult};
use std::io::Write;
use tabled::builder::Builder;
use tabled::settings::{Padding, Style};

/// Character drawn between columns.
pub const COLUMN_SEPARATOR: char = '|';

/// Buffers a header and rows, then writes them aligned.
pub struct TableWriter<W: Write> {
    out: W,
    columns: Option<usize>,
    builder: Builder,
}

impl<W: Write> TableWriter<W> {
    /// Create a writer over `out`.
    pub fn new(out: W) -> Self {
        Self { out, columns: None, builder: Builder::new() }
    }

    /// Set the column names. Only one header per table.
    pub fn write_header<S: AsRef<str>>(&mut self, columns: &[S]) -> SshqResult<()> {
        if self.columns.is_some() {
            return Err(SshqError::render("Only one result set can be rendered"));
        }
        self.columns = Some(columns.len());
        self.builder.push_record(columns.iter().map(|c| sanitize(c.as_ref())));
        Ok(())
    }

    /// Append a row; it must have exactly as many values as the header.
    pub fn write_row(&mut self, values: Vec<String>) -> SshqResult<()> {
        let columns =
            self.columns.ok_or_else(|| SshqError::render("Row received before column names"))?;

        if values.len() != columns {
            return Err(SshqError::render(format!(
                "Row has {} values but the result set has {} columns",
                values.len(),
                columns
            )));
        }

        self.builder.push_record(values.iter().map(|v| sanitize(v)));
        Ok(())
    }

    /// Write the table, flush, and hand back the output.
    ///
    /// Without a header nothing is written.
    pub fn finish(mut self) -> SshqResult<W> {
        if self.columns.is_some() {
            let mut table = self.builder.build();
            table.with(Style::empty().vertical(COLUMN_SEPARATOR)).with(Padding::new(0, 1, 0, 0));
            let rendered = table.to_string();

            let mut lines = rendered.lines().map(str::trim_end);
            if let Some(header) = lines.next() {
                writeln!(self.out, "{header}")?;
                writeln!(self.out, "{}", "-".repeat(header.chars().count()))?;
            }
            for line in lines {
                writeln!(self.out, "{line}")?;
            }
        }

        self.out.flush()?;
        Ok(self.out)
    }
}

/// Escape characters that would break the line layout.
fn sanitize(value: &str) -> String {
    if !value.contains(['\n', '\r', '\t']) {
        return value.to_string();
    }
    value.replace('\n', "\\n").replace('\r', "\\r").replace('\t', "\\t")
}
