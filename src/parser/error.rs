//! Parse error records.
//!
//! Parsing collects errors instead of raising them; the reader entry point
//! decides, via its raise level, whether a collected list aborts the read.
//! Each record carries the token index, the byte span in the (normalized)
//! input, the machine state, and the structural address at the point of
//! discovery; duplicate-code errors additionally carry the location of the
//! prior occurrence.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::State;
use crate::token::TokenKind;

/// Kinds of errors detected while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    /// A block code already declared earlier in the file.
    BlockCodeDuplicate,
    /// A `data_` header with no code.
    BlockCodeEmpty,
    /// A frame code already declared in the enclosing block.
    FrameCodeDuplicate,
    /// Never produced: a `save_` token with no code is by definition the
    /// frame terminator (a misplaced one reports as `TokenUnexpected`).
    /// Kept so the enum mirrors the full error taxonomy.
    FrameCodeEmpty,
    /// A bare `_` data name.
    DataNameEmpty,
    /// An mmCIF data name without a `category.` prefix.
    DataNameMissingCategory,
    /// A data name already declared in the enclosing block or frame.
    DataNameDuplicate,
    /// A `loop_` directive carrying a name.
    LoopNamed,
    /// A loop whose value count is not a multiple of its column count.
    TableIncomplete,
    /// A token matching no CIF pattern.
    TokenBad,
    /// A STAR-reserved token (`stop_`, `global_`, `$ref`, `[...]`).
    TokenReserved,
    /// A valid token in a state that does not accept it.
    TokenUnexpected,
    /// End of input reached in a non-terminal state.
    FileIncomplete,
}

impl ParseErrorKind {
    /// Severity level: 1 recoverable, 2 invalid but parseable, 3 ambiguous.
    pub fn severity(self) -> u8 {
        match self {
            ParseErrorKind::BlockCodeDuplicate | ParseErrorKind::FrameCodeDuplicate => 1,
            ParseErrorKind::BlockCodeEmpty
            | ParseErrorKind::FrameCodeEmpty
            | ParseErrorKind::DataNameEmpty
            | ParseErrorKind::DataNameMissingCategory
            | ParseErrorKind::TableIncomplete
            | ParseErrorKind::TokenBad
            | ParseErrorKind::TokenReserved
            | ParseErrorKind::TokenUnexpected
            | ParseErrorKind::FileIncomplete => 2,
            ParseErrorKind::DataNameDuplicate | ParseErrorKind::LoopNamed => 3,
        }
    }
}

/// Location of a previously seen block code, frame code, or data name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenInfo {
    /// Index of the token where the code was first declared.
    pub token_idx: usize,
    /// Byte range of the first declaration.
    pub start: usize,
    pub end: usize,
}

/// A single collected parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Index of the offending token in the token stream.
    pub token_idx: usize,
    /// Byte range of the offending token.
    pub start: usize,
    pub end: usize,
    /// Machine state when the error was discovered.
    pub state: State,
    /// Kind of the offending token.
    pub token_kind: TokenKind,
    /// Raw text of the offending token.
    pub token_text: String,
    /// Structural address at the point of discovery.
    pub block_code: Option<String>,
    pub frame_code: Option<String>,
    pub data_name: Option<String>,
    /// Prior occurrence, for duplicate-code errors.
    pub prior: Option<SeenInfo>,
}

impl ParseError {
    /// Severity level of this error (1..=3).
    pub fn severity(&self) -> u8 {
        self.kind.severity()
    }

    fn address(&self) -> String {
        match (&self.block_code, &self.frame_code) {
            (None, _) => "in file".to_string(),
            (Some(block), None) => format!("in data block 'data_{block}'"),
            (Some(block), Some(frame)) => {
                format!("in data block 'data_{block}', save frame 'save_{frame}'")
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = format!(
            "at token index {} (byte range {}-{})",
            self.token_idx, self.start, self.end
        );
        let address = self.address();
        let prior = |p: &Option<SeenInfo>| match p {
            Some(seen) => format!(
                " is already declared at token index {} (byte range {}-{})",
                seen.token_idx, seen.start, seen.end
            ),
            None => " is a duplicate".to_string(),
        };
        match self.kind {
            ParseErrorKind::BlockCodeDuplicate => write!(
                f,
                "Duplicated block code: 'data_{}' {at}{}",
                self.token_text,
                prior(&self.prior)
            ),
            ParseErrorKind::FrameCodeDuplicate => write!(
                f,
                "Duplicated frame code: 'save_{}' {address}, {at}{}",
                self.token_text,
                prior(&self.prior)
            ),
            ParseErrorKind::DataNameDuplicate => write!(
                f,
                "Duplicated data name: '_{}' {address}, {at}{}",
                self.token_text,
                prior(&self.prior)
            ),
            ParseErrorKind::BlockCodeEmpty => {
                write!(f, "Empty block code: the block code {at} is empty")
            }
            ParseErrorKind::FrameCodeEmpty => {
                write!(f, "Empty frame code: the frame code {address}, {at} is empty")
            }
            ParseErrorKind::DataNameEmpty => {
                write!(f, "Empty data name: the data name {address}, {at} is empty")
            }
            ParseErrorKind::DataNameMissingCategory => write!(
                f,
                "Data name without category: '_{}' {address}, {at} has no '<category>.' prefix",
                self.token_text
            ),
            ParseErrorKind::LoopNamed => write!(
                f,
                "Named loop: the loop directive {address}, {at} carries a name '{}'",
                self.token_text
            ),
            ParseErrorKind::TableIncomplete => write!(
                f,
                "Incomplete table: the loop {address} ended {at} before all expected \
                 data values were found"
            ),
            ParseErrorKind::TokenBad => write!(
                f,
                "Bad token: the token {address}, {at} matches no CIF token pattern: '{}'",
                self.token_text
            ),
            ParseErrorKind::TokenReserved => write!(
                f,
                "Reserved token: the token {address}, {at} is a reserved STAR token of kind \
                 {:?}: '{}'",
                self.token_kind, self.token_text
            ),
            ParseErrorKind::TokenUnexpected => write!(
                f,
                "Unexpected token: the token {address}, {at} is of kind {:?} ('{}'), which is \
                 not expected in state {}",
                self.token_kind, self.token_text, self.state
            ),
            ParseErrorKind::FileIncomplete => write!(
                f,
                "Incomplete file: end of input reached in state {} {address}",
                self.state
            ),
        }
    }
}

impl std::error::Error for ParseError {}
