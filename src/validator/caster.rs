//! Cast-plan producers: DDL2 type codes to typed columns.
//!
//! Each type code maps to one or more [`CastPlan`]s. A plan names the cast
//! to perform ([`CastExpr`]), the leaf dtype and container of its output,
//! the suffix appended to the input column name, and whether the output
//! carries main values (subject to enum and range checks) or auxiliary ones
//! (estimated standard deviations).
//!
//! All casts preserve nulls and map the literal `.` to the type-appropriate
//! inapplicable marker: NaN for floats, the empty string for strings, the
//! empty list for lists, and null for integers, booleans, and dates.

use regex::Regex;
use thiserror::Error;

use crate::table::{Cell, Column, Container, Dtype};

/// Hard cast failures: programmer-level or strict-mode data errors,
/// distinct from the collected validation findings.
#[derive(Debug, Clone, Error)]
pub enum CastError {
    /// Strict integer cast met a non-integer value.
    #[error("column '{column}': cannot cast '{value}' to integer")]
    IntCast { column: String, value: String },

    /// An enumeration was specified for a main output that is not a
    /// string column.
    #[error("item '{item}': enumeration specified but output '{column}' has leaf dtype {dtype}")]
    EnumOnNonString {
        item: String,
        column: String,
        dtype: String,
    },

    /// A range was specified for a non-numeric item.
    #[error("item '{item}': range specified for non-numeric item")]
    RangeOnNonNumeric { item: String },

    /// A range was specified but the produced column is not numeric.
    #[error("item '{item}': range specified but output '{column}' has leaf dtype {dtype}")]
    RangeOnNonNumericColumn {
        item: String,
        column: String,
        dtype: String,
    },

    /// Two producers of the same output disagree on dtype or container.
    #[error("cannot merge output column '{column}': incompatible dtype or container")]
    MergeIncompatible { column: String },

    /// A producer emitted the same output name twice for one item.
    #[error("duplicate output name '{column}' produced for item '{item}'")]
    DuplicateOutput { item: String, column: String },

    /// A cast was applied to a column that is not a raw string column.
    #[error("column '{column}' is not a raw string column")]
    NotStringColumn { column: String },
}

/// Requested output type for the partial-date producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatetimeOutput {
    /// Date when no cell carries a time part, datetime otherwise (the
    /// common supertype promotes date rows to midnight).
    #[default]
    Auto,
    Date,
    DateTime,
}

/// The concrete cast a plan performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastExpr {
    /// Keep strings as strings (`.` becomes the empty string).
    Identity,
    /// Configured true/false vocabularies to nullable bool.
    Bool,
    /// Decimal integer.
    Int,
    /// Float value with the parenthesized ESD group stripped.
    FloatValue,
    /// The parenthesized ESD digits of a float, as an integer.
    FloatEsd,
    /// `a-b` signed integer pair.
    IntRange,
    /// Float range endpoints (a single endpoint is duplicated).
    FloatRangeValue,
    /// Per-endpoint ESD digits of a float range.
    FloatRangeEsd,
    /// Delimiter-separated list.
    List { element: Dtype },
    /// Whitespace-separated list of strings.
    ListWhitespace,
    /// Partial date / datetime.
    Date,
}

/// One planned output column of a cast producer.
#[derive(Debug, Clone, PartialEq)]
pub struct CastPlan {
    pub expr: CastExpr,
    /// Declared leaf dtype (`Auto` date plans resolve at apply time).
    pub dtype: Dtype,
    pub container: Container,
    /// Appended to the input column name to form the output name.
    pub suffix: String,
    /// Main outputs are subject to enum and range checks; auxiliary ones
    /// are not.
    pub main: bool,
}

impl CastPlan {
    fn main(expr: CastExpr, dtype: Dtype, container: Container) -> Self {
        Self {
            expr,
            dtype,
            container,
            suffix: String::new(),
            main: true,
        }
    }

    fn aux(expr: CastExpr, dtype: Dtype, container: Container, suffix: &str) -> Self {
        Self {
            expr,
            dtype,
            container,
            suffix: suffix.to_string(),
            main: false,
        }
    }
}

/// Configuration for the caster.
#[derive(Debug, Clone)]
pub struct CasterOptions {
    pub esd_col_suffix: String,
    pub cast_strict: bool,
    pub bool_true: Vec<String>,
    pub bool_false: Vec<String>,
    pub bool_strip: bool,
    pub bool_case_insensitive: bool,
    pub datetime_output: DatetimeOutput,
    pub list_delimiter: char,
}

impl Default for CasterOptions {
    fn default() -> Self {
        Self {
            esd_col_suffix: "_esd_digits".to_string(),
            cast_strict: true,
            bool_true: vec!["YES".to_string()],
            bool_false: vec!["NO".to_string()],
            bool_strip: true,
            bool_case_insensitive: true,
            datetime_output: DatetimeOutput::Auto,
            list_delimiter: ',',
        }
    }
}

/// Type-code driven caster: produces plans and applies them to raw string
/// columns. All grammars are compiled once at construction.
pub struct Caster {
    options: CasterOptions,
    re_float: Regex,
    re_int_range: Regex,
    re_float_range: Regex,
    re_date: Regex,
}

const FLOAT_NUM: &str = r"(-?(?:[0-9]+\.?|[0-9]*\.[0-9]+))(?:\(([0-9]+)\))?([eE][+-]?[0-9]+)?";

/// Endpoint of a float range. The mantissa requires a decimal point, which
/// keeps the `-` range separator unambiguous.
const FLOAT_RANGE_NUM: &str =
    r"(-?(?:[0-9]+\.[0-9]*|\.[0-9]+))(?:\(([0-9]+)\))?([eE][+-]?[0-9]+)?";

impl Caster {
    pub fn new(options: CasterOptions) -> Self {
        // Static grammars; compilation cannot fail.
        let re_float = Regex::new(&format!("^{FLOAT_NUM}$")).expect("float grammar");
        let re_int_range = Regex::new(r"^(-?[0-9]+)-(-?[0-9]+)$").expect("int-range grammar");
        let re_float_range = Regex::new(&format!("^{FLOAT_RANGE_NUM}(?:-{FLOAT_RANGE_NUM})?$"))
            .expect("float-range grammar");
        let re_date = Regex::new(
            r"^([0-9]{2,4})(?:-([0-9]{1,2})(?:-([0-9]{1,2}))?)?(?::([0-9]{1,2})(?::([0-9]{1,2}))?)?$",
        )
        .expect("date grammar");
        Self {
            options,
            re_float,
            re_int_range,
            re_float_range,
            re_date,
        }
    }

    pub fn options(&self) -> &CasterOptions {
        &self.options
    }

    /// The plans for a type code. Unknown codes (and the plain text family,
    /// including the matrix placeholders) fall back to the identity string
    /// plan.
    pub fn plans_for(&self, type_code: &str) -> Vec<CastPlan> {
        let esd = self.options.esd_col_suffix.as_str();
        match type_code {
            "boolean" => vec![CastPlan::main(CastExpr::Bool, Dtype::Bool, Container::None)],
            "int" => vec![CastPlan::main(CastExpr::Int, Dtype::Int, Container::None)],
            "float" => vec![
                CastPlan::main(CastExpr::FloatValue, Dtype::Float, Container::None),
                CastPlan::aux(CastExpr::FloatEsd, Dtype::Int, Container::None, esd),
            ],
            "int-range" => vec![CastPlan::main(
                CastExpr::IntRange,
                Dtype::Int,
                Container::Array(2),
            )],
            "float-range" => vec![
                CastPlan::main(CastExpr::FloatRangeValue, Dtype::Float, Container::Array(2)),
                CastPlan::aux(CastExpr::FloatRangeEsd, Dtype::Int, Container::Array(2), esd),
            ],
            "id_list" | "entity_id_list" | "ucode-alphanum-csv" | "symmetry_operation" => {
                vec![CastPlan::main(
                    CastExpr::List {
                        element: Dtype::Str,
                    },
                    Dtype::Str,
                    Container::List,
                )]
            }
            "int_list" => vec![CastPlan::main(
                CastExpr::List {
                    element: Dtype::Int,
                },
                Dtype::Int,
                Container::List,
            )],
            "id_list_spc" => vec![CastPlan::main(
                CastExpr::ListWhitespace,
                Dtype::Str,
                Container::List,
            )],
            "yyyy-mm-dd" | "yyyy-mm-dd:hh:mm" | "yyyy-mm-dd:hh:mm-flex" | "date_dep" => {
                let dtype = match self.options.datetime_output {
                    DatetimeOutput::Date => Dtype::Date,
                    _ => Dtype::DateTime,
                };
                vec![CastPlan::main(CastExpr::Date, dtype, Container::None)]
            }
            _ => vec![CastPlan::main(CastExpr::Identity, Dtype::Str, Container::None)],
        }
    }

    /// Apply a plan to a raw string column. `column_name` only feeds error
    /// messages.
    pub fn apply(
        &self,
        plan: &CastPlan,
        input: &Column,
        column_name: &str,
    ) -> Result<Column, CastError> {
        if !input.is_raw_str() {
            return Err(CastError::NotStringColumn {
                column: column_name.to_string(),
            });
        }
        match &plan.expr {
            CastExpr::Identity => Ok(self.cast_identity(input)),
            CastExpr::Bool => Ok(self.cast_bool(input)),
            CastExpr::Int => self.cast_int(input, column_name),
            CastExpr::FloatValue => Ok(self.cast_float_value(input)),
            CastExpr::FloatEsd => Ok(self.cast_float_esd(input)),
            CastExpr::IntRange => Ok(self.cast_int_range(input)),
            CastExpr::FloatRangeValue => Ok(self.cast_float_range(input, true)),
            CastExpr::FloatRangeEsd => Ok(self.cast_float_range(input, false)),
            CastExpr::List { element } => self.cast_list(input, element, column_name),
            CastExpr::ListWhitespace => Ok(self.cast_list_whitespace(input)),
            CastExpr::Date => Ok(self.cast_date(input)),
        }
    }

    fn cast_identity(&self, input: &Column) -> Column {
        let cells = input
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Str(s) if s == "." => Cell::Str(String::new()),
                other => other.clone(),
            })
            .collect();
        Column::new(Dtype::Str, Container::None, cells)
    }

    fn cast_bool(&self, input: &Column) -> Column {
        let normalize = |s: &str| -> String {
            let s = if self.options.bool_strip { s.trim() } else { s };
            if self.options.bool_case_insensitive {
                s.to_lowercase()
            } else {
                s.to_string()
            }
        };
        let truthy: Vec<String> = self.options.bool_true.iter().map(|s| normalize(s)).collect();
        let falsy: Vec<String> = self.options.bool_false.iter().map(|s| normalize(s)).collect();
        let cells = input
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Str(s) if s == "." => Cell::Null,
                Cell::Str(s) => {
                    let probe = normalize(s);
                    if truthy.contains(&probe) {
                        Cell::Bool(true)
                    } else if falsy.contains(&probe) {
                        Cell::Bool(false)
                    } else {
                        Cell::Null
                    }
                }
                _ => Cell::Null,
            })
            .collect();
        Column::new(Dtype::Bool, Container::None, cells)
    }

    fn cast_int(&self, input: &Column, column_name: &str) -> Result<Column, CastError> {
        let mut cells = Vec::with_capacity(input.len());
        for cell in input.cells() {
            let out = match cell {
                Cell::Str(s) if s == "." => Cell::Null,
                Cell::Str(s) => match s.trim().parse::<i64>() {
                    Ok(v) => Cell::Int(v),
                    Err(_) if self.options.cast_strict => {
                        return Err(CastError::IntCast {
                            column: column_name.to_string(),
                            value: s.clone(),
                        });
                    }
                    Err(_) => Cell::Null,
                },
                _ => Cell::Null,
            };
            cells.push(out);
        }
        Ok(Column::new(Dtype::Int, Container::None, cells))
    }

    fn cast_float_value(&self, input: &Column) -> Column {
        let cells = input
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Str(s) if s == "." => Cell::Float(f64::NAN),
                Cell::Str(s) => match self.re_float.captures(s.trim()) {
                    Some(caps) => {
                        let mantissa = caps.get(1).map_or("", |m| m.as_str());
                        let exponent = caps.get(3).map_or("", |m| m.as_str());
                        format!("{mantissa}{exponent}")
                            .parse::<f64>()
                            .map_or(Cell::Null, Cell::Float)
                    }
                    None => Cell::Null,
                },
                _ => Cell::Null,
            })
            .collect();
        Column::new(Dtype::Float, Container::None, cells)
    }

    fn cast_float_esd(&self, input: &Column) -> Column {
        let cells = input
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Str(s) if s == "." => Cell::Null,
                Cell::Str(s) => self
                    .re_float
                    .captures(s.trim())
                    .and_then(|caps| caps.get(2))
                    .and_then(|m| m.as_str().parse::<i64>().ok())
                    .map_or(Cell::Null, Cell::Int),
                _ => Cell::Null,
            })
            .collect();
        Column::new(Dtype::Int, Container::None, cells)
    }

    fn cast_int_range(&self, input: &Column) -> Column {
        let cells = input
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Str(s) if s == "." => Cell::Array(vec![Cell::Null, Cell::Null]),
                Cell::Str(s) => match self.re_int_range.captures(s.trim()) {
                    Some(caps) => {
                        let parse = |idx: usize| {
                            caps.get(idx)
                                .and_then(|m| m.as_str().parse::<i64>().ok())
                                .map_or(Cell::Null, Cell::Int)
                        };
                        Cell::Array(vec![parse(1), parse(2)])
                    }
                    None => Cell::Null,
                },
                _ => Cell::Null,
            })
            .collect();
        Column::new(Dtype::Int, Container::Array(2), cells)
    }

    /// Float range: `<num>` or `<num>-<num>`; a missing second endpoint
    /// duplicates the first, including its ESD presence.
    fn cast_float_range(&self, input: &Column, values: bool) -> Column {
        let (dtype, nan, null) = if values {
            (Dtype::Float, Cell::Float(f64::NAN), Cell::Float(f64::NAN))
        } else {
            (Dtype::Int, Cell::Null, Cell::Null)
        };
        let cells = input
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Str(s) if s == "." => Cell::Array(vec![nan.clone(), null.clone()]),
                Cell::Str(s) => match self.re_float_range.captures(s.trim()) {
                    Some(caps) => {
                        let endpoint = |base: usize| -> Cell {
                            if values {
                                let mantissa = caps.get(base).map_or("", |m| m.as_str());
                                let exponent = caps.get(base + 2).map_or("", |m| m.as_str());
                                format!("{mantissa}{exponent}")
                                    .parse::<f64>()
                                    .map_or(Cell::Null, Cell::Float)
                            } else {
                                caps.get(base + 1)
                                    .and_then(|m| m.as_str().parse::<i64>().ok())
                                    .map_or(Cell::Null, Cell::Int)
                            }
                        };
                        let first = endpoint(1);
                        let second = if caps.get(4).is_some() {
                            endpoint(4)
                        } else {
                            first.clone()
                        };
                        Cell::Array(vec![first, second])
                    }
                    None => Cell::Null,
                },
                _ => Cell::Null,
            })
            .collect();
        Column::new(dtype, Container::Array(2), cells)
    }

    fn cast_list(
        &self,
        input: &Column,
        element: &Dtype,
        column_name: &str,
    ) -> Result<Column, CastError> {
        let delimiter = self.options.list_delimiter;
        let mut cells = Vec::with_capacity(input.len());
        for cell in input.cells() {
            let out = match cell {
                Cell::Str(s) if s == "." => Cell::List(Vec::new()),
                Cell::Str(s) => {
                    let mut items = Vec::new();
                    for token in s.split(delimiter) {
                        let token = token.trim();
                        let item = match element {
                            Dtype::Int => match token.parse::<i64>() {
                                Ok(v) => Cell::Int(v),
                                Err(_) if self.options.cast_strict => {
                                    return Err(CastError::IntCast {
                                        column: column_name.to_string(),
                                        value: token.to_string(),
                                    });
                                }
                                Err(_) => Cell::Null,
                            },
                            _ => Cell::Str(token.to_string()),
                        };
                        items.push(item);
                    }
                    Cell::List(items)
                }
                _ => Cell::Null,
            };
            cells.push(out);
        }
        Ok(Column::new(element.clone(), Container::List, cells))
    }

    fn cast_list_whitespace(&self, input: &Column) -> Column {
        let cells = input
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Str(s) if s == "." => Cell::List(Vec::new()),
                Cell::Str(s) => Cell::List(
                    s.split_whitespace()
                        .map(|token| Cell::Str(token.to_string()))
                        .collect(),
                ),
                _ => Cell::Null,
            })
            .collect();
        Column::new(Dtype::Str, Container::List, cells)
    }

    /// Partial dates: `y{2,4}[-m[-d]][:h[:min]]`. Two-digit years get a
    /// `20` prefix; three-digit years a `2` when starting with `0`, else a
    /// `1`. Missing month and day default to 01, missing time to 00:00.
    fn cast_date(&self, input: &Column) -> Column {
        use chrono::{NaiveDate, NaiveDateTime};

        struct Parsed {
            date: NaiveDate,
            time: Option<(u32, u32)>,
        }

        let parse = |s: &str| -> Option<Parsed> {
            let caps = self.re_date.captures(s.trim())?;
            let year_raw = caps.get(1)?.as_str();
            let year: i32 = match year_raw.len() {
                2 => format!("20{year_raw}").parse().ok()?,
                3 => {
                    let prefix = if year_raw.starts_with('0') { "2" } else { "1" };
                    format!("{prefix}{year_raw}").parse().ok()?
                }
                _ => year_raw.parse().ok()?,
            };
            let month: u32 = caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok())?;
            let day: u32 = caps.get(3).map_or(Some(1), |m| m.as_str().parse().ok())?;
            let date = NaiveDate::from_ymd_opt(year, month, day)?;
            let time = match caps.get(4) {
                Some(hour) => {
                    let hour: u32 = hour.as_str().parse().ok()?;
                    let minute: u32 = caps.get(5).map_or(Some(0), |m| m.as_str().parse().ok())?;
                    if hour > 23 || minute > 59 {
                        return None;
                    }
                    Some((hour, minute))
                }
                None => None,
            };
            Some(Parsed { date, time })
        };

        let parsed: Vec<Option<Parsed>> = input
            .cells()
            .iter()
            .map(|cell| match cell {
                Cell::Str(s) if s != "." => parse(s),
                _ => None,
            })
            .collect();

        let want_datetime = match self.options.datetime_output {
            DatetimeOutput::Date => false,
            DatetimeOutput::DateTime => true,
            DatetimeOutput::Auto => parsed
                .iter()
                .flatten()
                .any(|p| p.time.is_some()),
        };

        let cells = parsed
            .into_iter()
            .map(|p| match p {
                Some(p) if want_datetime => {
                    let (hour, minute) = p.time.unwrap_or((0, 0));
                    p.date
                        .and_hms_opt(hour, minute, 0)
                        .map_or(Cell::Null, |dt: NaiveDateTime| Cell::DateTime(dt))
                }
                Some(p) => Cell::Date(p.date),
                None => Cell::Null,
            })
            .collect();

        let dtype = if want_datetime {
            Dtype::DateTime
        } else {
            Dtype::Date
        };
        Column::new(dtype, Container::None, cells)
    }
}
