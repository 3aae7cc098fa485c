//! DDL2 dictionary-driven validation.
//!
//! The validator walks a file, block, or single category and checks every
//! category table against its dictionary definitions: mandatory categories
//! and items, type constructs (regexes), enumerations, and numeric ranges.
//! String columns are replaced in place by typed ones via the cast plans of
//! [`caster`].
//!
//! Findings are collected into a [`ValidationReport`] in discovery order
//! and never abort validation. Hard errors ([`CastError`]) are reserved for
//! programmer-level conditions: strict-cast failures, enumerations on
//! non-string outputs, ranges on non-numeric items, and merge conflicts.

pub mod caster;
pub mod stringifier;

pub use caster::{CastError, CastExpr, CastPlan, Caster, CasterOptions, DatetimeOutput};
pub use stringifier::{Stringifier, StringifierOptions};

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dictionary::{DictionaryData, DictionaryError, ItemDef, Primitive};
use crate::parser::CaseNormalization;
use crate::structure::{Category, CategoryInfo, CifBlock, CifFile, ItemInfo};
use crate::table::{Cell, Column, Dtype};

/// Configuration of the validator.
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    /// Convert enumerations whose values form a boolean vocabulary into
    /// boolean columns.
    pub enum_to_bool: bool,
    /// Boolean-like enumeration vocabulary for true (case-insensitive).
    pub enum_true: Vec<String>,
    /// Boolean-like enumeration vocabulary for false (case-insensitive).
    pub enum_false: Vec<String>,
    /// Suffix of auxiliary ESD columns.
    pub esd_col_suffix: String,
    /// Raise on invalid integers instead of nulling them.
    pub cast_strict: bool,
    /// Strings cast to `true` by the `boolean` type code.
    pub bool_true: Vec<String>,
    /// Strings cast to `false` by the `boolean` type code.
    pub bool_false: Vec<String>,
    pub bool_strip: bool,
    pub bool_case_insensitive: bool,
    /// Case normalization applied to `uchar` columns before casting.
    pub case_normalization: CaseNormalization,
    pub datetime_output: DatetimeOutput,
    /// Advisory time zone recorded with datetime output; cells are naive.
    pub datetime_time_zone: Option<String>,
    /// Delimiter of the delimited-list type codes.
    pub list_delimiter: char,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            enum_to_bool: true,
            enum_true: vec!["yes".into(), "y".into(), "true".into()],
            enum_false: vec!["no".into(), "n".into(), "false".into()],
            esd_col_suffix: "_esd_digits".into(),
            cast_strict: true,
            bool_true: vec!["YES".into()],
            bool_false: vec!["NO".into()],
            bool_strip: true,
            bool_case_insensitive: true,
            case_normalization: CaseNormalization::Lower,
            datetime_output: DatetimeOutput::Auto,
            datetime_time_zone: None,
            list_delimiter: ',',
        }
    }
}

/// Kinds of validation findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    UndefinedCategory,
    UndefinedItem,
    MissingCategory,
    MissingItem,
    MissingValue,
    RegexViolation,
    EnumViolation,
    RangeViolation,
    AuxiliaryMismatch,
}

/// One validation finding with its structural address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub block: Option<String>,
    pub frame: Option<String>,
    pub category: Option<String>,
    pub item: Option<String>,
    /// The specific produced column, when an item yields several.
    pub column: Option<String>,
    /// Affected row indices, for per-cell findings.
    pub rows: Option<Vec<usize>>,
}

/// Findings collected by a validation run, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, finding: ValidationFinding) {
        self.findings.push(finding);
    }

    pub fn findings(&self) -> &[ValidationFinding] {
        &self.findings
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationFinding> {
        self.findings.iter()
    }

    /// Findings of one kind.
    pub fn of_kind(&self, kind: FindingKind) -> Vec<&ValidationFinding> {
        self.findings.iter().filter(|f| f.kind == kind).collect()
    }

    /// Serialize the findings as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.findings)
    }
}

/// Address of the category currently being validated.
#[derive(Clone, Copy, Default)]
struct At<'a> {
    block: Option<&'a str>,
    frame: Option<&'a str>,
    category: Option<&'a str>,
}

impl At<'_> {
    fn finding(&self, kind: FindingKind) -> ValidationFinding {
        ValidationFinding {
            kind,
            block: self.block.map(String::from),
            frame: self.frame.map(String::from),
            category: self.category.map(String::from),
            item: None,
            column: None,
            rows: None,
        }
    }

    fn item_finding(
        &self,
        kind: FindingKind,
        item: &str,
        column: &str,
        rows: Vec<usize>,
    ) -> ValidationFinding {
        ValidationFinding {
            item: Some(item.to_string()),
            column: Some(column.to_string()),
            rows: Some(rows),
            ..self.finding(kind)
        }
    }
}

/// One produced (temporary) column from one cast plan of one input item.
struct Produced {
    item: String,
    out: String,
    column: Column,
    main: bool,
}

/// A DDL2 validator bound to a compiled dictionary.
pub struct Ddl2Validator {
    dict: DictionaryData,
    options: ValidatorOptions,
    caster: Caster,
    constructs: HashMap<String, Regex>,
}

impl Ddl2Validator {
    /// Build a validator; compiles every construct of the dictionary's
    /// item-type list up front.
    pub fn new(
        dict: DictionaryData,
        options: ValidatorOptions,
    ) -> Result<Self, DictionaryError> {
        let mut constructs = HashMap::new();
        for (code, type_def) in &dict.item_types {
            let anchored = format!("^(?:{})$", type_def.regex);
            let re = Regex::new(&anchored).map_err(|err| DictionaryError::BadConstruct {
                code: code.clone(),
                message: err.to_string(),
            })?;
            constructs.insert(code.clone(), re);
        }
        let caster = Caster::new(CasterOptions {
            esd_col_suffix: options.esd_col_suffix.clone(),
            cast_strict: options.cast_strict,
            bool_true: options.bool_true.clone(),
            bool_false: options.bool_false.clone(),
            bool_strip: options.bool_strip,
            bool_case_insensitive: options.bool_case_insensitive,
            datetime_output: options.datetime_output,
            list_delimiter: options.list_delimiter,
        });
        Ok(Self {
            dict,
            options,
            caster,
            constructs,
        })
    }

    pub fn dictionary(&self) -> &DictionaryData {
        &self.dict
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Validate every block of a file, replacing each visited category's
    /// table with its typed version.
    pub fn validate_file(
        &self,
        file: &mut CifFile,
        add_category_info: bool,
        add_item_info: bool,
    ) -> Result<ValidationReport, CastError> {
        let mut report = ValidationReport::new();
        for block in file.blocks() {
            self.validate_block_into(block, add_category_info, add_item_info, &mut report)?;
        }
        Ok(report)
    }

    /// Validate a single block.
    pub fn validate_block(
        &self,
        block: &mut CifBlock,
        add_category_info: bool,
        add_item_info: bool,
    ) -> Result<ValidationReport, CastError> {
        let mut report = ValidationReport::new();
        self.validate_block_into(block, add_category_info, add_item_info, &mut report)?;
        Ok(report)
    }

    /// Validate a single category without block/frame context.
    pub fn validate_category(
        &self,
        category: &mut Category,
        add_category_info: bool,
        add_item_info: bool,
    ) -> Result<ValidationReport, CastError> {
        let mut report = ValidationReport::new();
        self.validate_category_into(
            category,
            At::default(),
            add_category_info,
            add_item_info,
            &mut report,
        )?;
        Ok(report)
    }

    fn validate_block_into(
        &self,
        block: &mut CifBlock,
        add_category_info: bool,
        add_item_info: bool,
        report: &mut ValidationReport,
    ) -> Result<(), CastError> {
        let block_code = block.code().to_string();

        for cat_id in &self.dict.mandatory_categories {
            if !block.has_category(cat_id) {
                report.push(ValidationFinding {
                    category: Some(cat_id.clone()),
                    ..At {
                        block: Some(&block_code),
                        frame: None,
                        category: None,
                    }
                    .finding(FindingKind::MissingCategory)
                });
            }
        }

        for frame in block.frames_mut() {
            let frame_code = frame.code().to_string();
            for category in frame.categories_mut() {
                let at = At {
                    block: Some(&block_code),
                    frame: Some(&frame_code),
                    category: None,
                };
                self.validate_category_into(category, at, add_category_info, add_item_info, report)?;
            }
        }
        for category in block.categories_mut() {
            let at = At {
                block: Some(&block_code),
                frame: None,
                category: None,
            };
            self.validate_category_into(category, at, add_category_info, add_item_info, report)?;
        }
        Ok(())
    }

    fn validate_category_into(
        &self,
        category: &mut Category,
        at: At<'_>,
        add_category_info: bool,
        add_item_info: bool,
        report: &mut ValidationReport,
    ) -> Result<(), CastError> {
        let cat_code = category.code().to_string();
        let at = At {
            category: Some(&cat_code),
            ..at
        };

        // Category-level checks and info.
        match self.dict.get_category(&cat_code) {
            None => report.push(at.finding(FindingKind::UndefinedCategory)),
            Some(catdef) => {
                let present = category.item_names();
                for full in &catdef.mandatory_items {
                    let keyword = full.split_once('.').map_or(full.as_str(), |(_, kw)| kw);
                    if !present.iter().any(|name| name == keyword) {
                        report.push(ValidationFinding {
                            item: Some(full.clone()),
                            ..at.finding(FindingKind::MissingItem)
                        });
                    }
                }
                if add_category_info {
                    category.info = Some(CategoryInfo {
                        description: catdef.description.clone(),
                        groups: catdef
                            .group_ids
                            .iter()
                            .map(|gid| {
                                (
                                    gid.clone(),
                                    self.dict
                                        .category_groups
                                        .get(gid)
                                        .cloned()
                                        .unwrap_or_default(),
                                )
                            })
                            .collect(),
                        keys: catdef.keys.clone(),
                    });
                }
            }
        }

        // Item definitions per column; undefined items are reported only
        // for raw columns (typed ones were produced by a previous run).
        let mut item_defs: Vec<(String, ItemDef)> = Vec::new();
        {
            let table = category.table();
            let columns: Vec<(String, bool)> = table
                .columns()
                .map(|(name, col)| (name.to_string(), col.is_raw_str()))
                .collect();
            for (keyword, is_raw) in columns {
                let full = format!("{cat_code}.{keyword}");
                match self
                    .dict
                    .get_item(&full)
                    .or_else(|| self.dict.get_item(&keyword))
                {
                    Some(def) => item_defs.push((keyword, def.clone())),
                    None if is_raw => report.push(ValidationFinding {
                        item: Some(keyword),
                        ..at.finding(FindingKind::UndefinedItem)
                    }),
                    None => {}
                }
            }
        }

        let mut df = category.table().clone();

        let true_ci: HashSet<String> = self
            .options
            .enum_true
            .iter()
            .map(|s| s.to_lowercase())
            .collect();
        let false_ci: HashSet<String> = self
            .options
            .enum_false
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        let mut produced: Vec<(String, Vec<Produced>)> = Vec::new();
        let mut processed: Vec<String> = Vec::new();

        for (keyword, idef) in &item_defs {
            let Some(col_ref) = df.column(keyword) else {
                continue;
            };
            if !col_ref.is_raw_str() {
                // Already typed by a previous validation; re-running is a
                // no-op for this column.
                continue;
            }
            processed.push(keyword.clone());
            let mut col = col_ref.clone();

            // Step 1: missing values ("?") become the default, or null with
            // a finding.
            let miss_rows: Vec<usize> = col
                .cells()
                .iter()
                .enumerate()
                .filter(|(_, cell)| matches!(cell, Cell::Str(s) if s == "?"))
                .map(|(idx, _)| idx)
                .collect();
            if !miss_rows.is_empty() {
                match &idef.default {
                    Some(default) => {
                        for &row in &miss_rows {
                            col.cells_mut()[row] = Cell::Str(default.clone());
                        }
                    }
                    None => {
                        report.push(at.item_finding(
                            FindingKind::MissingValue,
                            keyword,
                            keyword,
                            miss_rows.clone(),
                        ));
                        for &row in &miss_rows {
                            col.cells_mut()[row] = Cell::Null;
                        }
                    }
                }
            }

            // Step 2: construct check on everything except null and ".".
            if let Some(construct) = self.constructs.get(&idef.type_code) {
                let bad_rows: Vec<usize> = col
                    .cells()
                    .iter()
                    .enumerate()
                    .filter(|(_, cell)| {
                        matches!(cell, Cell::Str(s) if s != "." && !construct.is_match(s))
                    })
                    .map(|(idx, _)| idx)
                    .collect();
                if !bad_rows.is_empty() {
                    report.push(at.item_finding(
                        FindingKind::RegexViolation,
                        keyword,
                        keyword,
                        bad_rows,
                    ));
                }
            }

            // Step 3: case normalization for case-insensitive items.
            if idef.type_primitive == Primitive::Uchar {
                match self.options.case_normalization {
                    CaseNormalization::Lower => col.lowercase_in_place(),
                    CaseNormalization::Upper => col.uppercase_in_place(),
                    CaseNormalization::None => {}
                }
            }

            // Step 4: cast into one or more produced columns.
            let plans = self.caster.plans_for(&idef.type_code);
            let mut outs_seen: HashSet<String> = HashSet::new();
            let mut entries: Vec<Produced> = Vec::new();
            for plan in &plans {
                let out = format!("{keyword}{}", plan.suffix);
                if !outs_seen.insert(out.clone()) {
                    return Err(CastError::DuplicateOutput {
                        item: keyword.clone(),
                        column: out,
                    });
                }
                let out_col = self.caster.apply(plan, &col, keyword)?;
                entries.push(Produced {
                    item: keyword.clone(),
                    out,
                    column: out_col,
                    main: plan.main,
                });
            }

            // Step 5: enumeration check and conversion on main outputs.
            if let Some(enumeration) = &idef.enumeration {
                let mut enum_vals: Vec<String> = enumeration.keys().cloned().collect();
                if idef.type_primitive == Primitive::Uchar {
                    enum_vals = enum_vals
                        .iter()
                        .map(|v| self.options.case_normalization.apply(v))
                        .collect();
                    enum_vals.dedup();
                }
                let enum_ci: HashSet<String> =
                    enum_vals.iter().map(|v| v.to_lowercase()).collect();
                let bool_like = self.options.enum_to_bool
                    && !enum_ci.is_empty()
                    && enum_ci
                        .iter()
                        .all(|v| true_ci.contains(v) || false_ci.contains(v));

                for entry in entries.iter_mut().filter(|entry| entry.main) {
                    if bool_like {
                        let violations = entry.column.rows_with_any_leaf(&|leaf| {
                            matches!(leaf, Cell::Str(s)
                                if !s.is_empty() && !enum_ci.contains(&s.to_lowercase()))
                        });
                        if !violations.is_empty() {
                            report.push(at.item_finding(
                                FindingKind::EnumViolation,
                                keyword,
                                &entry.out,
                                violations,
                            ));
                        } else {
                            entry.column.map_leaves(&|leaf| match leaf {
                                Cell::Str(s) if !s.is_empty() => {
                                    let ci = s.to_lowercase();
                                    if true_ci.contains(&ci) {
                                        Cell::Bool(true)
                                    } else if false_ci.contains(&ci) {
                                        Cell::Bool(false)
                                    } else {
                                        Cell::Null
                                    }
                                }
                                Cell::Str(_) => Cell::Null,
                                other => other,
                            });
                            entry.column.dtype = Dtype::Bool;
                        }
                    } else {
                        if entry.column.dtype != Dtype::Str {
                            return Err(CastError::EnumOnNonString {
                                item: keyword.clone(),
                                column: entry.out.clone(),
                                dtype: entry.column.dtype.family().to_string(),
                            });
                        }
                        let violations = entry.column.rows_with_any_leaf(&|leaf| {
                            matches!(leaf, Cell::Str(s)
                                if !s.is_empty() && !enum_vals.iter().any(|v| v == s))
                        });
                        if !violations.is_empty() {
                            report.push(at.item_finding(
                                FindingKind::EnumViolation,
                                keyword,
                                &entry.out,
                                violations,
                            ));
                        } else {
                            entry.column.dtype = Dtype::Enum(enum_vals.clone());
                        }
                    }
                }
            }

            // Step 6: range check on main outputs (numeric items only; the
            // bounds are exclusive, an equal pair tests equality).
            if let Some(ranges) = &idef.range {
                if idef.type_primitive != Primitive::Numb {
                    return Err(CastError::RangeOnNonNumeric {
                        item: keyword.clone(),
                    });
                }
                for entry in entries.iter().filter(|entry| entry.main) {
                    match entry.column.dtype {
                        Dtype::Float | Dtype::Int => {}
                        _ => {
                            return Err(CastError::RangeOnNonNumericColumn {
                                item: keyword.clone(),
                                column: entry.out.clone(),
                                dtype: entry.column.dtype.family().to_string(),
                            });
                        }
                    }
                    let violations = entry.column.rows_with_any_leaf(&|leaf| {
                        match leaf.as_f64() {
                            Some(v) if !v.is_nan() => !in_ranges(v, ranges),
                            _ => false,
                        }
                    });
                    if !violations.is_empty() {
                        report.push(at.item_finding(
                            FindingKind::RangeViolation,
                            keyword,
                            &entry.out,
                            violations,
                        ));
                    }
                }
            }

            for entry in entries {
                match produced.iter_mut().find(|(out, _)| *out == entry.out) {
                    Some((_, list)) => list.push(entry),
                    None => produced.push((entry.out.clone(), vec![entry])),
                }
            }
        }

        // Step 7: merge produced columns into the table. When several
        // producers share an output name, the one whose input item equals
        // the output name wins ties; remaining producers fill nullish rows
        // and disagreements are recorded as auxiliary mismatches.
        let final_outs: HashSet<String> = produced.iter().map(|(out, _)| out.clone()).collect();
        for (out, mut prods) in produced {
            prods.sort_by_key(|p| p.item != out);
            let mut iter = prods.into_iter();
            let Some(first) = iter.next() else {
                continue;
            };
            let rest: Vec<Produced> = iter.collect();
            if rest.is_empty() {
                df.set_column(out, first.column);
                continue;
            }

            let first_shape = (first.column.dtype.family(), first.column.container);
            for p in &rest {
                if (p.column.dtype.family(), p.column.container) != first_shape {
                    return Err(CastError::MergeIncompatible { column: out });
                }
            }
            let mismatch_item = if first.item == out {
                out.clone()
            } else {
                first.item.clone()
            };

            let mut merged = first.column;
            for next in rest {
                let mut mismatch_rows = Vec::new();
                for row in 0..merged.len() {
                    if !merged.is_merge_nullish(row)
                        && !next.column.is_merge_nullish(row)
                        && !merged.merge_equal(row, &next.column)
                    {
                        mismatch_rows.push(row);
                    }
                }
                if !mismatch_rows.is_empty() {
                    report.push(at.item_finding(
                        FindingKind::AuxiliaryMismatch,
                        &mismatch_item,
                        &out,
                        mismatch_rows,
                    ));
                }
                for row in 0..merged.len() {
                    if merged.is_merge_nullish(row) {
                        if let Some(cell) = next.column.get(row) {
                            merged.cells_mut()[row] = cell.clone();
                        }
                    }
                }
            }
            df.set_column(out, merged);
        }

        // Drop processed inputs that no producer re-emitted.
        for keyword in &processed {
            if !final_outs.contains(keyword) {
                df.drop_column(keyword);
            }
        }

        category.set_table(df);

        if add_item_info {
            for (keyword, idef) in &item_defs {
                category.item_info.insert(
                    keyword.clone(),
                    ItemInfo {
                        description: idef.description.clone(),
                        mandatory: idef.mandatory,
                        default: idef.default.clone(),
                        enumeration: idef.enumeration.clone(),
                        type_code: Some(idef.type_code.clone()),
                        range: idef.range.clone(),
                        units: idef.units.clone(),
                    },
                );
            }
        }
        Ok(())
    }
}

/// Union-of-intervals membership with exclusive bounds; an interval whose
/// bounds are equal tests exact equality.
fn in_ranges(value: f64, ranges: &[(Option<f64>, Option<f64>)]) -> bool {
    ranges.iter().any(|(lo, hi)| match (lo, hi) {
        (None, None) => true,
        (Some(a), Some(b)) if a == b => value == *a,
        _ => {
            lo.map_or(true, |bound| value > bound) && hi.map_or(true, |bound| value < bound)
        }
    })
}
