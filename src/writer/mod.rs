//! CIF serialization.
//!
//! Serializes structure trees (or single category tables) back to CIF
//! text. Values are normalized per column dtype, string values are
//! delimited only when CIF requires it (choosing the first safe delimiter
//! from the configured preference), and categories render as name-value
//! lists or `loop_` tables in one of several layout styles.
//!
//! Unrepresentable values — a multiline string containing a line that
//! starts with `;` — are detected while normalizing, before anything is
//! emitted to the sink.

use std::fmt::{self, Write as _};

use thiserror::Error;

use crate::parser::Variant;
use crate::structure::{Category, CifBlock, CifFile};
use crate::table::{format_float, Cell, CategoryTable, Column, Container, Dtype};
use crate::validator::{Stringifier, StringifierOptions};

/// Errors raised while writing.
#[derive(Debug, Clone, Error)]
pub enum WriteError {
    /// CIF 1.1 text fields cannot carry a line whose first character is
    /// `;`; there is no escaping mechanism.
    #[error(
        "column '{column}', row {row}: multiline value contains a line starting with ';' \
         and cannot be represented as a CIF 1.1 text field"
    )]
    Unrepresentable {
        column: String,
        row: usize,
        value: String,
    },

    /// The table still contains a column the writer cannot emit; it must
    /// be stringified first.
    #[error("column '{column}' has unsupported dtype {dtype} for writing")]
    UnsupportedDtype { column: String, dtype: String },

    /// The sink failed.
    #[error("format error: {0}")]
    Fmt(#[from] fmt::Error),
}

/// Symbol standing in for null-ish cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullSymbol {
    /// `.` (inapplicable)
    Dot,
    /// `?` (unknown)
    Question,
}

impl NullSymbol {
    fn as_str(self) -> &'static str {
        match self {
            NullSymbol::Dot => ".",
            NullSymbol::Question => "?",
        }
    }
}

/// Layout for single-row categories rendered as name-value pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStyle {
    /// All pairs on one line.
    Horizontal,
    /// One pair per line, values column-aligned.
    #[default]
    Tabular,
    /// Every token on its own line.
    Vertical,
}

/// Layout for multi-row categories rendered as `loop_` tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableStyle {
    /// Everything on one line after `loop_`.
    Horizontal,
    /// Header line plus one aligned line per row.
    #[default]
    TabularHorizontal,
    /// One tag per line, then one aligned line per row.
    TabularVertical,
    /// Every token on its own line.
    Vertical,
}

/// String delimiters, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Single,
    Double,
    Semicolon,
}

/// Configuration of the writer.
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub bool_true: String,
    pub bool_false: String,
    pub null_str: NullSymbol,
    pub null_float: NullSymbol,
    pub null_int: NullSymbol,
    pub null_bool: NullSymbol,
    /// Symbol for empty strings in string columns.
    pub empty_str: NullSymbol,
    /// Symbol for NaN in float columns.
    pub nan_float: NullSymbol,
    /// Render single-row categories as tables anyway.
    pub always_table: bool,
    pub list_style: ListStyle,
    pub table_style: TableStyle,
    /// Spaces between name-value pairs in horizontal lists.
    pub space_items: usize,
    /// Minimum spaces between columns in tabular layouts.
    pub min_space_columns: usize,
    /// Indentation of every line of the category.
    pub indent: usize,
    /// Additional indentation of lines inside a loop construct.
    pub indent_inner: usize,
    pub delimiter_preference: Vec<Delimiter>,
    /// Reverse-casting configuration for typed columns.
    pub stringify: StringifierOptions,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            bool_true: "YES".to_string(),
            bool_false: "NO".to_string(),
            null_str: NullSymbol::Question,
            null_float: NullSymbol::Question,
            null_int: NullSymbol::Question,
            null_bool: NullSymbol::Question,
            empty_str: NullSymbol::Dot,
            nan_float: NullSymbol::Dot,
            always_table: false,
            list_style: ListStyle::Tabular,
            table_style: TableStyle::TabularHorizontal,
            space_items: 2,
            min_space_columns: 2,
            indent: 0,
            indent_inner: 0,
            delimiter_preference: vec![
                Delimiter::Single,
                Delimiter::Double,
                Delimiter::Semicolon,
            ],
            stringify: StringifierOptions::default(),
        }
    }
}

/// Serialize a whole file. The output is rendered completely before the
/// first byte reaches the sink, so an unrepresentable value never leaves
/// partial output behind.
pub fn write_file(
    file: &mut CifFile,
    sink: &mut dyn fmt::Write,
    options: &WriteOptions,
) -> Result<(), WriteError> {
    let variant = file.variant();
    let mut out = String::new();
    for block in file.blocks() {
        render_block(block, variant, options, &mut out)?;
    }
    sink.write_str(&out)?;
    Ok(())
}

/// Serialize one block (with its frames).
pub fn write_block(
    block: &mut CifBlock,
    variant: Variant,
    sink: &mut dyn fmt::Write,
    options: &WriteOptions,
) -> Result<(), WriteError> {
    let mut out = String::new();
    render_block(block, variant, options, &mut out)?;
    sink.write_str(&out)?;
    Ok(())
}

/// Serialize one category.
pub fn write_category(
    category: &mut Category,
    variant: Variant,
    sink: &mut dyn fmt::Write,
    options: &WriteOptions,
) -> Result<(), WriteError> {
    let mut out = String::new();
    render_category(category, variant, options, &mut out)?;
    sink.write_str(&out)?;
    Ok(())
}

fn render_block(
    block: &mut CifBlock,
    variant: Variant,
    options: &WriteOptions,
    out: &mut String,
) -> Result<(), WriteError> {
    writeln!(out, "data_{}", block.code())?;
    for category in block.categories_mut() {
        render_category(category, variant, options, out)?;
    }
    for frame in block.frames_mut() {
        writeln!(out, "save_{}", frame.code())?;
        for category in frame.categories_mut() {
            render_category(category, variant, options, out)?;
        }
        writeln!(out, "save_")?;
    }
    Ok(())
}

fn render_category(
    category: &mut Category,
    variant: Variant,
    options: &WriteOptions,
    out: &mut String,
) -> Result<(), WriteError> {
    let stringifier = Stringifier::new(options.stringify.clone());
    let lowered = stringifier.stringify_table(category.table());

    let tags: Vec<String> = lowered
        .column_names()
        .map(|keyword| match variant {
            Variant::MmCif => format!("_{}.{}", category.code(), keyword),
            Variant::Cif1 => format!("_{keyword}"),
        })
        .collect();

    render_table(&tags, &lowered, options, out)
}

/// Render a normalized (writer-native) table under the given tags.
pub fn render_table(
    tags: &[String],
    table: &CategoryTable,
    options: &WriteOptions,
    out: &mut String,
) -> Result<(), WriteError> {
    if table.is_empty() {
        return Ok(());
    }
    let mut columns: Vec<Vec<String>> = Vec::with_capacity(table.width());
    for (name, column) in table.columns() {
        columns.push(normalize_column(name, column, options)?);
    }

    if table.height() == 1 && !options.always_table {
        render_list(tags, &columns, options, out)?;
    } else {
        render_loop(tags, &columns, table.height(), options, out)?;
    }
    Ok(())
}

fn render_list(
    tags: &[String],
    columns: &[Vec<String>],
    options: &WriteOptions,
    out: &mut String,
) -> Result<(), WriteError> {
    let indent = " ".repeat(options.indent);
    match options.list_style {
        ListStyle::Horizontal => {
            let pairs: Vec<String> = tags
                .iter()
                .zip(columns)
                .map(|(tag, column)| format!("{tag} {}", column[0]))
                .collect();
            writeln!(out, "{indent}{}", pairs.join(&" ".repeat(options.space_items)))?;
        }
        ListStyle::Tabular => {
            let width = tags.iter().map(String::len).max().unwrap_or(0);
            for (tag, column) in tags.iter().zip(columns) {
                let pad = " ".repeat(width - tag.len() + options.min_space_columns);
                writeln!(out, "{indent}{tag}{pad}{}", column[0])?;
            }
        }
        ListStyle::Vertical => {
            for (tag, column) in tags.iter().zip(columns) {
                writeln!(out, "{indent}{tag}")?;
                writeln!(out, "{indent}{}", column[0])?;
            }
        }
    }
    Ok(())
}

fn render_loop(
    tags: &[String],
    columns: &[Vec<String>],
    height: usize,
    options: &WriteOptions,
    out: &mut String,
) -> Result<(), WriteError> {
    let indent = " ".repeat(options.indent);
    let inner = " ".repeat(options.indent + options.indent_inner);
    writeln!(out, "{indent}loop_")?;

    // Column widths: the max of tag and token widths; tokens carrying
    // newlines (text fields) are left out of the calculation.
    let visible = |token: &String| {
        if token.contains('\n') {
            0
        } else {
            token.len()
        }
    };
    let widths: Vec<usize> = tags
        .iter()
        .zip(columns)
        .map(|(tag, column)| {
            column
                .iter()
                .map(visible)
                .max()
                .unwrap_or(0)
                .max(tag.len())
        })
        .collect();
    let gap = " ".repeat(options.min_space_columns);

    let write_aligned_row = |out: &mut String, cells: Vec<&String>| -> fmt::Result {
        let mut line = inner.clone();
        for (idx, cell) in cells.iter().enumerate() {
            line.push_str(cell);
            if idx + 1 < cells.len() {
                let pad = widths[idx].saturating_sub(visible(cell));
                line.push_str(&" ".repeat(pad));
                line.push_str(&gap);
            }
        }
        writeln!(out, "{line}")
    };

    match options.table_style {
        TableStyle::Horizontal => {
            let mut tokens: Vec<&String> = tags.iter().collect();
            for row in 0..height {
                for column in columns {
                    tokens.push(&column[row]);
                }
            }
            let joined = tokens
                .iter()
                .map(|token| token.as_str())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(out, "{inner}{joined}")?;
        }
        TableStyle::TabularHorizontal => {
            write_aligned_row(out, tags.iter().collect())?;
            for row in 0..height {
                write_aligned_row(out, columns.iter().map(|column| &column[row]).collect())?;
            }
        }
        TableStyle::TabularVertical => {
            for tag in tags {
                writeln!(out, "{inner}{tag}")?;
            }
            for row in 0..height {
                write_aligned_row(out, columns.iter().map(|column| &column[row]).collect())?;
            }
        }
        TableStyle::Vertical => {
            for tag in tags {
                writeln!(out, "{inner}{tag}")?;
            }
            for row in 0..height {
                for column in columns {
                    writeln!(out, "{inner}{}", column[row])?;
                }
            }
        }
    }
    Ok(())
}

/// Normalize a column into CIF-ready tokens.
fn normalize_column(
    name: &str,
    column: &Column,
    options: &WriteOptions,
) -> Result<Vec<String>, WriteError> {
    if column.container != Container::None {
        return Err(WriteError::UnsupportedDtype {
            column: name.to_string(),
            dtype: format!("{}[{:?}]", column.dtype.family(), column.container),
        });
    }
    let mut tokens = Vec::with_capacity(column.len());
    for (row, cell) in column.cells().iter().enumerate() {
        let token = match (&column.dtype, cell) {
            (Dtype::Bool, Cell::Null) => options.null_bool.as_str().to_string(),
            (Dtype::Bool, Cell::Bool(true)) => options.bool_true.clone(),
            (Dtype::Bool, Cell::Bool(false)) => options.bool_false.clone(),
            (Dtype::Int, Cell::Null) => options.null_int.as_str().to_string(),
            (Dtype::Int, Cell::Int(v)) => v.to_string(),
            (Dtype::Float, Cell::Null) => options.null_float.as_str().to_string(),
            (Dtype::Float, Cell::Float(v)) if v.is_nan() => {
                options.nan_float.as_str().to_string()
            }
            (Dtype::Float, Cell::Float(v)) => format_float(*v),
            (Dtype::Str, Cell::Null) => options.null_str.as_str().to_string(),
            (Dtype::Str, Cell::Str(s)) if s.is_empty() => {
                options.empty_str.as_str().to_string()
            }
            (Dtype::Str, Cell::Str(s)) => delimit_string(name, row, s, options)?,
            (dtype, _) => {
                return Err(WriteError::UnsupportedDtype {
                    column: name.to_string(),
                    dtype: dtype.family().to_string(),
                });
            }
        };
        tokens.push(token);
    }
    Ok(tokens)
}

/// Wrap a string value in the first safe delimiter if CIF requires
/// delimiting; leave simple values bare.
fn delimit_string(
    column: &str,
    row: usize,
    value: &str,
    options: &WriteOptions,
) -> Result<String, WriteError> {
    let multiline = value.contains('\n') || value.contains('\r');

    if multiline {
        if has_semicolon_line_start(value) {
            return Err(WriteError::Unrepresentable {
                column: column.to_string(),
                row,
                value: value.to_string(),
            });
        }
        return Ok(text_field(value));
    }

    if !needs_delimiting(value) {
        return Ok(value.to_string());
    }

    for delimiter in &options.delimiter_preference {
        match delimiter {
            Delimiter::Single if quote_safe(value, '\'') => {
                return Ok(format!("'{value}'"));
            }
            Delimiter::Double if quote_safe(value, '"') => {
                return Ok(format!("\"{value}\""));
            }
            Delimiter::Semicolon => return Ok(text_field(value)),
            _ => {}
        }
    }
    // No configured delimiter fits; a text field always does for
    // single-line values.
    Ok(text_field(value))
}

/// Whether a value can stand unquoted as a CIF simple value.
fn needs_delimiting(value: &str) -> bool {
    if value.contains(char::is_whitespace) {
        return true;
    }
    if let Some(first) = value.chars().next() {
        if matches!(first, '_' | '#' | '$' | '\'' | '"' | '[' | ']' | ';') {
            return true;
        }
    }
    let lower = value.to_lowercase();
    if lower.starts_with("data_") || lower.starts_with("save_") {
        return true;
    }
    matches!(lower.as_str(), "loop_" | "stop_" | "global_")
}

/// A quote wrapping is safe iff no embedded quote character is followed by
/// whitespace or the end of the value.
fn quote_safe(value: &str, quote: char) -> bool {
    let chars: Vec<char> = value.chars().collect();
    for (idx, &c) in chars.iter().enumerate() {
        if c == quote {
            match chars.get(idx + 1) {
                None => return false,
                Some(next) if next.is_whitespace() => return false,
                Some(_) => {}
            }
        }
    }
    true
}

/// Whether any line of a multiline value starts with `;`.
fn has_semicolon_line_start(value: &str) -> bool {
    value.split('\n').any(|line| line.starts_with(';'))
}

fn text_field(value: &str) -> String {
    format!("\n;{value}\n;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_delimiting() {
        assert!(!needs_delimiting("simple"));
        assert!(!needs_delimiting("1.5(3)"));
        assert!(needs_delimiting("two words"));
        assert!(needs_delimiting("_name"));
        assert!(needs_delimiting("#comment"));
        assert!(needs_delimiting("data_x"));
        assert!(needs_delimiting("DATA_x"));
        assert!(needs_delimiting("loop_"));
        assert!(needs_delimiting("LOOP_"));
        assert!(!needs_delimiting("looper"));
        assert!(needs_delimiting("[bracket"));
        assert!(needs_delimiting("]bracket"));
    }

    #[test]
    fn test_quote_safety() {
        assert!(quote_safe("a dog's life", '\''));
        assert!(!quote_safe("ends with'", '\''));
        assert!(!quote_safe("mid' space", '\''));
        assert!(quote_safe("no quotes here", '\''));
        assert!(!quote_safe("say \"hi\" there", '"'));
    }

    #[test]
    fn test_delimiter_preference_fallback() {
        let options = WriteOptions::default();
        // Contains a bare single quote followed by space: single unsafe,
        // double safe.
        let token = delimit_string("c", 0, "don' t", &options).unwrap();
        assert_eq!(token, "\"don' t\"");
        // Both quotes unsafe: falls back to a text field.
        let token = delimit_string("c", 0, "a' \"b\" c", &options).unwrap();
        assert_eq!(token, "\n;a' \"b\" c\n;");
    }

    #[test]
    fn test_unrepresentable_multiline() {
        let options = WriteOptions::default();
        let err = delimit_string("c", 3, "ok\n;bad", &options).unwrap_err();
        match err {
            WriteError::Unrepresentable { column, row, .. } => {
                assert_eq!(column, "c");
                assert_eq!(row, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_multiline_becomes_text_field() {
        let options = WriteOptions::default();
        let token = delimit_string("c", 0, "line one\nline two", &options).unwrap();
        assert_eq!(token, "\n;line one\nline two\n;");
    }
}
