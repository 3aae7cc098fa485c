//! Category views: pivoted tables of data items.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::StructureError;
use crate::table::{Cell, CategoryTable, Column};

/// Metadata attached to a category by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub description: Option<String>,
    /// Category groups this category belongs to, keyed by group id.
    pub groups: BTreeMap<String, GroupInfo>,
    /// Key item names of the category.
    pub keys: Vec<String>,
}

/// A category group definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub description: Option<String>,
    pub parent_id: Option<String>,
}

/// Metadata attached to a single data item (column) by the validator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub description: Option<String>,
    pub mandatory: bool,
    pub default: Option<String>,
    /// Allowed values with their optional descriptions.
    pub enumeration: Option<BTreeMap<String, Option<String>>>,
    /// DDL2 type code of the item.
    pub type_code: Option<String>,
    /// Union of allowed ranges; bounds are exclusive unless equal.
    pub range: Option<Vec<(Option<f64>, Option<f64>)>>,
    pub units: Option<String>,
}

/// Duplicate-key policy for [`Category::to_id_map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiRow {
    #[default]
    First,
    Last,
    List,
}

/// Options for [`Category::to_id_map`].
#[derive(Debug, Clone)]
pub struct IdMapOptions {
    /// Compose multiple id columns into a single dotted key instead of
    /// nesting one map level per id column.
    pub flat: bool,
    /// With exactly one non-id column, map keys directly to that column's
    /// values instead of to single-entry maps.
    pub single_col: bool,
    /// Store single-row groups as scalars instead of one-element lists.
    pub single_row: bool,
    /// Policy for groups sharing the same key.
    pub multi_row: MultiRow,
}

impl Default for IdMapOptions {
    fn default() -> Self {
        Self {
            flat: false,
            single_col: true,
            single_row: true,
            multi_row: MultiRow::First,
        }
    }
}

/// A pivoted category: one column per keyword, one row per loop entry.
///
/// The pivot is built lazily from the raw keyword/value pairs collected out
/// of the flat table and cached; the validator replaces the cached table
/// with a typed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    code: String,
    raw: Vec<(String, Vec<String>)>,
    table: Option<CategoryTable>,
    /// Category metadata, present after validation with `add_category_info`.
    pub info: Option<CategoryInfo>,
    /// Per-item metadata, present after validation with `add_item_info`.
    pub item_info: BTreeMap<String, ItemInfo>,
}

impl Category {
    pub(crate) fn new(code: String, raw: Vec<(String, Vec<String>)>) -> Self {
        Self {
            code,
            raw,
            table: None,
            info: None,
            item_info: BTreeMap::new(),
        }
    }

    pub(crate) fn push_raw(&mut self, keyword: String, values: Vec<String>) {
        self.raw.push((keyword, values));
        // A new raw column invalidates any cached pivot.
        self.table = None;
    }

    /// Category name.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Keyword (column) names in declaration order.
    pub fn item_names(&self) -> Vec<String> {
        match &self.table {
            Some(table) => table.column_names().map(String::from).collect(),
            None => self.raw.iter().map(|(name, _)| name.clone()).collect(),
        }
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        match &self.table {
            Some(table) => table.height(),
            None => self.raw.first().map_or(0, |(_, values)| values.len()),
        }
    }

    /// The pivoted table, materializing and caching it on first access.
    ///
    /// All columns start as nullable strings; rows shorter than the
    /// category height (which the parser invariants rule out) are padded
    /// with nulls.
    pub fn table(&mut self) -> &CategoryTable {
        self.ensure_table();
        self.table.as_ref().unwrap_or_else(|| unreachable!())
    }

    /// Mutable access to the pivoted table.
    pub fn table_mut(&mut self) -> &mut CategoryTable {
        self.ensure_table();
        self.table.as_mut().unwrap_or_else(|| unreachable!())
    }

    fn ensure_table(&mut self) {
        if self.table.is_some() {
            return;
        }
        let height = self
            .raw
            .iter()
            .map(|(_, values)| values.len())
            .max()
            .unwrap_or(0);
        let mut table = CategoryTable::new();
        for (keyword, values) in &self.raw {
            // Ragged value lists violate the parser's output invariant;
            // a category built that way is a programmer error, not data.
            assert_eq!(
                values.len(),
                height,
                "category '{}': column '{}' has {} values, expected {}",
                self.code,
                keyword,
                values.len(),
                height
            );
            let cells: Vec<Option<String>> = values.iter().cloned().map(Some).collect();
            table.set_column(keyword.clone(), Column::from_strings(cells));
        }
        self.table = Some(table);
    }

    /// Replace the table with a (typically typed) new one, discarding the
    /// cached materialization.
    pub fn set_table(&mut self, table: CategoryTable) {
        self.table = Some(table);
    }

    /// Whether the table has been materialized (or replaced).
    pub fn is_materialized(&self) -> bool {
        self.table.is_some()
    }

    /// Build a (possibly nested) JSON map keyed by one or more id columns.
    ///
    /// Mirrors the dictionary-compilation helper of the validator: the id
    /// columns become map keys (nested one level per id, or composed with
    /// `.` when `flat`), the remaining columns become the leaf payload.
    pub fn to_id_map(
        &mut self,
        ids: &[&str],
        options: &IdMapOptions,
    ) -> Result<Value, StructureError> {
        if ids.is_empty() {
            return Err(StructureError::NoIdColumns {
                category: self.code.clone(),
            });
        }
        let code = self.code.clone();
        let table = self.table();
        for id in ids {
            if !table.has_column(id) {
                return Err(StructureError::UnknownColumn {
                    category: code,
                    column: (*id).to_string(),
                });
            }
        }

        let value_cols: Vec<&str> = table
            .column_names()
            .filter(|name| !ids.contains(name))
            .collect();
        let height = table.height();

        // Group row indices by key path, preserving first-seen order.
        let mut order: Vec<Vec<String>> = Vec::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for row in 0..height {
            let key: Vec<String> = ids
                .iter()
                .map(|id| {
                    table
                        .column(id)
                        .and_then(|col| col.get(row))
                        .map(cell_key)
                        .unwrap_or_default()
                })
                .collect();
            match order.iter().position(|k| *k == key) {
                Some(idx) => groups[idx].push(row),
                None => {
                    order.push(key);
                    groups.push(vec![row]);
                }
            }
        }

        let mut root = Map::new();
        for (key, rows) in order.iter().zip(&groups) {
            let rows: Vec<usize> = match options.multi_row {
                MultiRow::First => vec![rows[0]],
                MultiRow::Last => vec![rows[rows.len() - 1]],
                MultiRow::List => rows.clone(),
            };
            let payload = group_payload(table, &value_cols, &rows, options);
            if options.flat {
                root.insert(key.join("."), payload);
            } else {
                insert_nested(&mut root, key, payload);
            }
        }
        Ok(Value::Object(root))
    }
}

fn group_payload(
    table: &CategoryTable,
    value_cols: &[&str],
    rows: &[usize],
    options: &IdMapOptions,
) -> Value {
    let column_value = |name: &str| -> Value {
        let cells: Vec<Value> = rows
            .iter()
            .map(|&row| {
                table
                    .column(name)
                    .and_then(|col| col.get(row))
                    .map(cell_to_json)
                    .unwrap_or(Value::Null)
            })
            .collect();
        if options.single_row && cells.len() == 1 {
            cells.into_iter().next().unwrap_or(Value::Null)
        } else {
            Value::Array(cells)
        }
    };

    if options.single_col && value_cols.len() == 1 {
        return column_value(value_cols[0]);
    }
    let mut map = Map::new();
    for name in value_cols {
        map.insert((*name).to_string(), column_value(name));
    }
    Value::Object(map)
}

fn insert_nested(root: &mut Map<String, Value>, key: &[String], payload: Value) {
    match key {
        [] => {}
        [last] => {
            root.insert(last.clone(), payload);
        }
        [head, rest @ ..] => {
            let entry = root
                .entry(head.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = entry {
                insert_nested(map, rest, payload);
            }
        }
    }
}

/// String form of a cell used as a map key.
fn cell_key(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::Str(s) => s.clone(),
        Cell::Int(v) => v.to_string(),
        Cell::Float(v) => v.to_string(),
        Cell::Bool(v) => v.to_string(),
        Cell::Date(d) => d.to_string(),
        Cell::DateTime(d) => d.to_string(),
        Cell::List(_) | Cell::Array(_) => String::new(),
    }
}

/// JSON form of a cell (NaN floats become null).
pub(crate) fn cell_to_json(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Str(s) => Value::String(s.clone()),
        Cell::Int(v) => Value::Number((*v).into()),
        Cell::Float(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
        Cell::Bool(v) => Value::Bool(*v),
        Cell::Date(d) => Value::String(d.to_string()),
        Cell::DateTime(d) => Value::String(d.format("%Y-%m-%dT%H:%M:%S").to_string()),
        Cell::List(items) | Cell::Array(items) => {
            Value::Array(items.iter().map(cell_to_json).collect())
        }
    }
}
