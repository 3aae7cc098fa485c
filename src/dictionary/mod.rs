//! DDL2 dictionary model and loader.

mod loader;
mod types;

pub use loader::load_dictionary;
pub use types::{
    normalize_construct, CategoryDef, DictionaryData, ItemDef, ItemTypeDef, Primitive,
};

use thiserror::Error;

/// Errors while compiling a dictionary file.
#[derive(Debug, Clone, Error)]
pub enum DictionaryError {
    /// Dictionary files carry exactly one data block.
    #[error("dictionary file must contain exactly one data block, found {count}")]
    NotSingleBlock { count: usize },

    /// A required part of the dictionary is absent.
    #[error("dictionary is missing {what}")]
    MissingDefinitions { what: &'static str },

    /// An item definition references a type code absent from the
    /// item-type list.
    #[error("definition frame '{item}' references undefined type code '{code}'")]
    UndefinedTypeCode { item: String, code: String },

    /// A construct from the item-type list does not compile even after
    /// normalization.
    #[error("construct for type code '{code}' does not compile: {message}")]
    BadConstruct { code: String, message: String },
}
