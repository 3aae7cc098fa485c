//! Hierarchical views over the parsed flat table.
//!
//! A [`CifFile`] owns the flat rows; [`CifBlock`], [`CifFrame`], and
//! [`Category`] are materialized lazily on first access and cached.
//! Categories pivot their rows into nullable-string tables that the DDL2
//! validator later replaces with typed ones.

mod block;
mod category;
mod file;
mod frame;

pub use block::{BlockKind, CifBlock};
pub use category::{
    Category, CategoryInfo, GroupInfo, IdMapOptions, ItemInfo, MultiRow,
};
pub use file::{CifFile, FileKind, FilePart};
pub use frame::CifFrame;

use thiserror::Error;

/// Errors from structure-level operations.
#[derive(Debug, Clone, Error)]
pub enum StructureError {
    /// A requested id column does not exist in the category.
    #[error("category '{category}' has no column '{column}'")]
    UnknownColumn { category: String, column: String },

    /// `to_id_map` called without id columns.
    #[error("category '{category}': at least one id column is required")]
    NoIdColumns { category: String },
}
