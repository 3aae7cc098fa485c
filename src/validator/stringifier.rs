//! Reverse casting: typed columns back to CIF strings.
//!
//! The stringifier undoes the caster's work ahead of writing: ESD columns
//! merge back into parenthesized notation, ranges collapse to `min-max`
//! (or a single endpoint when both agree), dates format with configurable
//! strftime strings, lists rejoin on their delimiter, and enum columns
//! fall back to plain strings. Scalar string, integer, float, and boolean
//! columns are left for the writer's own value normalization.

use crate::table::{format_float, Cell, CategoryTable, Column, Container, Dtype};

/// Configuration for the stringifier.
#[derive(Debug, Clone)]
pub struct StringifierOptions {
    /// Suffix identifying ESD companion columns to merge and consume.
    pub esd_col_suffix: String,
    pub bool_true: String,
    pub bool_false: String,
    /// strftime format for date columns.
    pub date_format: String,
    /// strftime format for datetime columns.
    pub datetime_format: String,
    /// Delimiter when rejoining list columns.
    pub list_delimiter: char,
    /// String standing in for NaN and empty-list values.
    pub nan_string: String,
    /// Replace null cells with the NaN string instead of keeping them null.
    pub null_to_dot: bool,
}

impl Default for StringifierOptions {
    fn default() -> Self {
        Self {
            esd_col_suffix: "_esd_digits".to_string(),
            bool_true: "YES".to_string(),
            bool_false: "NO".to_string(),
            date_format: "%Y-%m-%d".to_string(),
            datetime_format: "%Y-%m-%d:%H:%M".to_string(),
            list_delimiter: ',',
            nan_string: ".".to_string(),
            null_to_dot: false,
        }
    }
}

/// Converts typed columns back to their CIF string representation.
pub struct Stringifier {
    options: StringifierOptions,
}

impl Stringifier {
    pub fn new(options: StringifierOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &StringifierOptions {
        &self.options
    }

    /// Stringify one column, merging an optional ESD companion.
    pub fn stringify_column(&self, column: &Column, esd: Option<&Column>) -> Vec<Option<String>> {
        let mut out: Vec<Option<String>> = (0..column.len())
            .map(|row| self.cell_to_string(column, esd, row))
            .collect();
        if self.options.null_to_dot {
            for slot in &mut out {
                if slot.is_none() {
                    *slot = Some(self.options.nan_string.clone());
                }
            }
        }
        out
    }

    /// Lower every column the writer cannot emit natively, merging and
    /// consuming ESD companions. Scalar string/int/float/bool columns pass
    /// through untouched.
    pub fn stringify_table(&self, table: &CategoryTable) -> CategoryTable {
        let suffix = &self.options.esd_col_suffix;

        // An ESD companion is consumed when its base column is float-family.
        let consumed: Vec<String> = table
            .columns()
            .filter_map(|(name, _)| {
                let base = name.strip_suffix(suffix.as_str())?;
                let base_col = table.column(base)?;
                (base_col.dtype == Dtype::Float).then(|| name.to_string())
            })
            .collect();

        let mut out = CategoryTable::new();
        for (name, column) in table.columns() {
            if consumed.iter().any(|c| c == name) {
                continue;
            }
            let esd_name = format!("{name}{suffix}");
            let esd = if consumed.iter().any(|c| *c == esd_name) {
                table.column(&esd_name)
            } else {
                None
            };
            if esd.is_none() && is_writer_native(column) {
                out.set_column(name, column.clone());
                continue;
            }
            let strings = self.stringify_column(column, esd);
            out.set_column(name, Column::from_strings(strings));
        }
        out
    }

    fn cell_to_string(
        &self,
        column: &Column,
        esd: Option<&Column>,
        row: usize,
    ) -> Option<String> {
        let cell = column.get(row)?;
        if cell.is_null() {
            return None;
        }

        // ESD merge first; it covers scalar floats and float ranges.
        if let Some(esd_col) = esd {
            return self.merge_with_esd(cell, esd_col.get(row), column.container);
        }

        match column.container {
            Container::None => self.leaf_to_string(cell),
            Container::List | Container::ArrayList(_) => self.join_container(cell),
            Container::Array(2) => self.range_to_string(cell, &column.dtype),
            Container::Array(_) => self.join_container(cell),
        }
    }

    fn leaf_to_string(&self, cell: &Cell) -> Option<String> {
        match cell {
            Cell::Null => None,
            // An empty enum/string category stands for "inapplicable" and
            // maps back to null.
            Cell::Str(s) if s.is_empty() => None,
            Cell::Str(s) => Some(s.clone()),
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) if v.is_nan() => Some(self.options.nan_string.clone()),
            Cell::Float(v) => Some(format_float(*v)),
            Cell::Bool(true) => Some(self.options.bool_true.clone()),
            Cell::Bool(false) => Some(self.options.bool_false.clone()),
            Cell::Date(d) => Some(d.format(&self.options.date_format).to_string()),
            Cell::DateTime(dt) => Some(dt.format(&self.options.datetime_format).to_string()),
            Cell::List(_) | Cell::Array(_) => self.join_container(cell),
        }
    }

    fn join_container(&self, cell: &Cell) -> Option<String> {
        match cell {
            Cell::List(items) | Cell::Array(items) => {
                if items.is_empty() {
                    return Some(self.options.nan_string.clone());
                }
                let parts: Vec<String> = items
                    .iter()
                    .map(|item| {
                        self.leaf_to_string(item)
                            .unwrap_or_else(|| self.options.nan_string.clone())
                    })
                    .collect();
                Some(parts.join(&self.options.list_delimiter.to_string()))
            }
            other => self.leaf_to_string(other),
        }
    }

    /// `min-max` with collapse to a single endpoint when both endpoints
    /// agree; an all-NaN float pair maps to the NaN string.
    fn range_to_string(&self, cell: &Cell, dtype: &Dtype) -> Option<String> {
        let Cell::Array(items) = cell else {
            return self.leaf_to_string(cell);
        };
        let (first, second) = match (items.first(), items.get(1)) {
            (Some(a), Some(b)) => (a, b),
            _ => return None,
        };
        if *dtype == Dtype::Float {
            if let (Cell::Float(a), Cell::Float(b)) = (first, second) {
                if a.is_nan() && b.is_nan() {
                    return Some(self.options.nan_string.clone());
                }
            }
        }
        let first_str = self.leaf_to_string(first)?;
        if first == second {
            return Some(first_str);
        }
        let second_str = self.leaf_to_string(second)?;
        Some(format!("{first_str}-{second_str}"))
    }

    fn merge_with_esd(
        &self,
        value: &Cell,
        esd: Option<&Cell>,
        container: Container,
    ) -> Option<String> {
        let format_endpoint = |value: &Cell, esd: Option<&Cell>| -> Option<String> {
            let value_str = self.leaf_to_string(value)?;
            match esd {
                Some(Cell::Int(digits)) => Some(format!("{value_str}({digits})")),
                _ => Some(value_str),
            }
        };

        match container {
            Container::Array(2) => {
                let Cell::Array(values) = value else {
                    return None;
                };
                let esd_items: Vec<&Cell> = match esd {
                    Some(Cell::Array(items)) => items.iter().collect(),
                    _ => Vec::new(),
                };
                let (a, b) = match (values.first(), values.get(1)) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return None,
                };
                if let (Cell::Float(x), Cell::Float(y)) = (a, b) {
                    if x.is_nan() && y.is_nan() {
                        return Some(self.options.nan_string.clone());
                    }
                }
                let esd_a = esd_items.first().copied();
                let esd_b = esd_items.get(1).copied();
                let first = format_endpoint(a, esd_a)?;
                if a == b && esd_a == esd_b {
                    return Some(first);
                }
                let second = format_endpoint(b, esd_b)?;
                Some(format!("{first}-{second}"))
            }
            // Scalar: NaN renders as the NaN string inside the endpoint,
            // so a present ESD is still appended (".(5)").
            _ => format_endpoint(value, esd),
        }
    }
}

/// Columns the writer's own value normalization handles directly.
fn is_writer_native(column: &Column) -> bool {
    column.container == Container::None
        && matches!(
            column.dtype,
            Dtype::Str | Dtype::Int | Dtype::Float | Dtype::Bool
        )
}
