//! Normalized DDL2 dictionary data.
//!
//! The loader compiles a parsed dictionary file into these records; they
//! are read-only after construction. All category and item names are stored
//! lowercase and looked up case-insensitively, with legacy aliases resolved
//! through the alias map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::structure::GroupInfo;

/// Coarse classification of an item's surface type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    /// Numerically interpretable string.
    Numb,
    /// Case-sensitive character or text string.
    #[default]
    Char,
    /// Case-insensitive character or text string.
    Uchar,
}

impl Primitive {
    /// Parse a DDL2 primitive code (case-insensitive); unknown codes fall
    /// back to `Char`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "numb" => Self::Numb,
            "uchar" => Self::Uchar,
            _ => Self::Char,
        }
    }
}

/// One entry of the dictionary's `item_type_list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTypeDef {
    pub primitive: Primitive,
    /// The type's construct (regex), normalized for the Rust regex engine.
    pub regex: String,
    pub detail: Option<String>,
}

/// A category definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub description: Option<String>,
    pub mandatory: bool,
    /// Ids of the category groups this category belongs to.
    pub group_ids: Vec<String>,
    /// Key item names.
    pub keys: Vec<String>,
    /// Names of mandatory items in this category (derived at load time).
    pub mandatory_items: Vec<String>,
}

/// A data item definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    /// Full item name, `category.keyword`, without the underscore.
    pub name: String,
    pub category: String,
    pub keyword: String,
    pub mandatory: bool,
    pub description: Option<String>,
    pub default: Option<String>,
    /// Allowed values with their optional descriptions.
    pub enumeration: Option<BTreeMap<String, Option<String>>>,
    pub sub_categories: Vec<String>,
    /// DDL2 type code (key into the item-type table).
    pub type_code: String,
    /// Primitive resolved from the item-type table.
    pub type_primitive: Primitive,
    /// Construct resolved from the item-type table, normalized.
    pub type_regex: String,
    /// Union of allowed ranges; both bounds exclusive unless equal; `None`
    /// bounds are unbounded. Only legal for `numb` items.
    pub range: Option<Vec<(Option<f64>, Option<f64>)>>,
    pub units: Option<String>,
}

/// A compiled DDL2 dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DictionaryData {
    pub title: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    /// Categories keyed by lowercase id.
    pub categories: BTreeMap<String, CategoryDef>,
    /// Items keyed by lowercase `category.keyword` name.
    pub items: BTreeMap<String, ItemDef>,
    /// Item types keyed by type code.
    pub item_types: BTreeMap<String, ItemTypeDef>,
    /// Category groups keyed by group id.
    pub category_groups: BTreeMap<String, GroupInfo>,
    /// Sub-category descriptions keyed by id.
    pub sub_categories: BTreeMap<String, String>,
    /// Alias (lowercase, no underscore) to canonical item name.
    pub aliases: BTreeMap<String, String>,
    /// Ids of mandatory categories (derived at load time).
    pub mandatory_categories: Vec<String>,
}

impl DictionaryData {
    /// Resolve an item name or alias to its canonical lowercase form.
    pub fn resolve_name(&self, name: &str) -> String {
        let lower = name.trim_start_matches('_').to_lowercase();
        self.aliases.get(&lower).cloned().unwrap_or(lower)
    }

    /// Look up an item definition (alias-aware, case-insensitive).
    pub fn get_item(&self, name: &str) -> Option<&ItemDef> {
        self.items.get(&self.resolve_name(name))
    }

    /// Look up a category definition (case-insensitive).
    pub fn get_category(&self, id: &str) -> Option<&CategoryDef> {
        self.categories.get(&id.to_lowercase())
    }
}

/// Normalize a DDL2 construct for the Rust regex engine.
///
/// DDL2 dictionaries carry POSIX-ERE character classes that open with an
/// unescaped `[][` run; the Rust engine requires the brackets escaped.
pub fn normalize_construct(regex: &str) -> String {
    regex.replace(r"[][", r"[\]\[")
}
