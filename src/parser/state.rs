//! Parser states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the CIF parser finite-state machine.
///
/// The `Just*` states mark positions immediately after a structural header
/// where no data item has been seen yet; the `*Name` states hold a pending
/// data name awaiting its value; the `*LoopValue` states fill loop columns
/// round-robin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum State {
    /// Before any data block.
    InFile,
    /// Directly after a `data_X` header.
    JustInData,
    /// Directly after a `save_X` header.
    JustInSave,
    /// Directly after a `loop_` header in a block.
    JustInLoop,
    /// A block-level data name awaits its value.
    InName,
    /// Directly after a `loop_` header in a save frame.
    JustInSaveLoop,
    /// A frame-level data name awaits its value.
    InSaveName,
    /// Collecting loop column names in a block.
    InLoopName,
    /// Inside a block, after at least one complete data item.
    InData,
    /// Collecting loop column names in a save frame.
    InSaveLoopName,
    /// Inside a save frame, after at least one complete data item.
    InSave,
    /// Filling loop values in a block.
    InLoopValue,
    /// Filling loop values in a save frame.
    InSaveLoopValue,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
