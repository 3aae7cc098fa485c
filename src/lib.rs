//! # ciffile
//!
//! Reader, DDL2 validator, and writer for CIF 1.1 and mmCIF
//! (Crystallographic Information File) data.
//!
//! ## What is CIF?
//!
//! CIF is a STAR-derived text format used across crystallography and
//! structural biology. Files contain named data blocks holding name-value
//! pairs and loops (tables); dictionary files additionally use save frames
//! to carry DDL2 definitions of every category and item.
//!
//! ## Pipeline
//!
//! ```text
//! bytes
//!   │  tokenizer (token)          classified tokens with byte spans
//!   ▼
//! parser (parser)                 flat rows + collected parse errors
//!   │
//!   ▼
//! structure (structure)           lazy File → Block → Frame → Category views
//!   │
//!   ▼
//! validator (dictionary, validator)
//!   │                             typed category tables + findings
//!   ▼
//! writer (writer)                 CIF text with safe delimiting
//! ```
//!
//! Parsing **collects** errors instead of raising them; the reader decides
//! from the configured [`ReadOptions::raise_level`] whether the collected
//! list aborts the read. Validation likewise returns a table of findings
//! and leaves the structure usable.
//!
//! ## Reading
//!
//! ```
//! use ciffile::{read_str, ReadOptions};
//!
//! let cif = "data_example\n_cell.length_a 10.5\n_cell.volume 1210.0\n";
//! let mut file = read_str(cif, &ReadOptions::default())?;
//!
//! let block = file.first_block().unwrap();
//! assert_eq!(block.code(), "example");
//! let cell = block.category_mut("cell").unwrap();
//! assert_eq!(cell.table().height(), 1);
//! assert_eq!(cell.item_names(), vec!["length_a", "volume"]);
//! # Ok::<(), ciffile::ReadError>(())
//! ```
//!
//! ## Working with loops
//!
//! ```
//! use ciffile::{read_str, ReadOptions};
//!
//! let cif = "data_atoms\nloop_\n_atom_site.label\n_atom_site.x\nC1 0.1\nN1 0.2\n";
//! let mut file = read_str(cif, &ReadOptions::default()).unwrap();
//! let atoms = file.first_block().unwrap().category_mut("atom_site").unwrap();
//! assert_eq!(atoms.table().height(), 2);
//! ```
//!
//! ## Writing
//!
//! ```
//! use ciffile::{read_str, write_file, ReadOptions, WriteOptions};
//!
//! let mut file = read_str("data_t\n_x.y 'hello world'\n", &ReadOptions::default()).unwrap();
//! let mut out = String::new();
//! write_file(&mut file, &mut out, &WriteOptions::default()).unwrap();
//! assert!(out.starts_with("data_t"));
//! ```

use std::path::Path;

// ===== Core modules =====

pub mod dictionary;
pub mod error;
pub mod parser;
pub mod structure;
pub mod table;
pub mod token;
pub mod validator;
pub mod writer;

// ===== Re-exports =====

pub use dictionary::{load_dictionary, DictionaryData, DictionaryError};
pub use error::ReadError;
pub use parser::error::{ParseError, ParseErrorKind};
pub use parser::{CaseNormalization, FlatRow, Variant};
pub use structure::{
    BlockKind, Category, CategoryInfo, CifBlock, CifFile, CifFrame, FileKind, FilePart,
    GroupInfo, IdMapOptions, ItemInfo, MultiRow, StructureError,
};
pub use table::{Cell, CategoryTable, Column, Container, Dtype};
pub use token::{Token, TokenKind, Tokenizer};
pub use validator::{
    CastError, Ddl2Validator, DatetimeOutput, FindingKind, Stringifier, StringifierOptions,
    ValidationFinding, ValidationReport, ValidatorOptions,
};
pub use writer::{write_block, write_category, write_file, WriteError, WriteOptions};

// ===== Reader entry points =====

/// Options for the reader entry points.
///
/// ```
/// use ciffile::{CaseNormalization, ReadOptions, Variant};
///
/// let options = ReadOptions::new()
///     .variant(Variant::Cif1)
///     .raise_level(3)
///     .case_normalization(CaseNormalization::None);
/// ```
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// CIF dialect (controls data-name splitting).
    pub variant: Variant,
    /// Minimum severity at which collected parse errors abort the read:
    /// 1 recoverable, 2 invalid-but-parseable, 3 ambiguous. 0 behaves like
    /// 1; values above 3 never abort.
    pub raise_level: u8,
    /// Case normalization applied to block, frame, category, and keyword
    /// names.
    pub case_normalization: CaseNormalization,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            variant: Variant::MmCif,
            raise_level: 2,
            case_normalization: CaseNormalization::Lower,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variant(mut self, variant: Variant) -> Self {
        self.variant = variant;
        self
    }

    pub fn raise_level(mut self, raise_level: u8) -> Self {
        self.raise_level = raise_level;
        self
    }

    pub fn case_normalization(mut self, case: CaseNormalization) -> Self {
        self.case_normalization = case;
        self
    }
}

/// Read a CIF file from text.
///
/// Line endings are normalized to LF before tokenizing; the byte spans of
/// retained parse errors refer to the normalized text.
pub fn read_str(text: &str, options: &ReadOptions) -> Result<CifFile, ReadError> {
    let normalized = normalize_line_endings(text);
    let (rows, errors) = parser::parse(&normalized, options.variant, options.case_normalization);
    if options.raise_level <= 3 {
        let threshold = options.raise_level.max(1);
        if errors.iter().any(|error| error.severity() >= threshold) {
            return Err(ReadError::Parse { errors });
        }
    }
    Ok(CifFile::from_parse(options.variant, rows, errors))
}

/// Read a CIF file from UTF-8 bytes.
pub fn read_bytes(bytes: &[u8], options: &ReadOptions) -> Result<CifFile, ReadError> {
    let text = std::str::from_utf8(bytes)?;
    read_str(text, options)
}

/// Read a CIF file from a filesystem path.
pub fn read_file<P: AsRef<Path>>(path: P, options: &ReadOptions) -> Result<CifFile, ReadError> {
    let bytes = std::fs::read(path)?;
    read_bytes(&bytes, options)
}

/// Normalize CRLF and lone CR line endings to LF.
fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_minimal() {
        let file = read_str("data_t\n_x.y 'hello'\n", &ReadOptions::default()).unwrap();
        assert_eq!(file.block_count(), 1);
        assert!(file.parse_errors().is_empty());
    }

    #[test]
    fn test_raise_level_gates_errors() {
        // A duplicate block code has severity 1.
        let input = "data_x\n_a.b 1\ndata_x\n_a.c 2\n";
        let lenient = read_str(input, &ReadOptions::default()).unwrap();
        assert_eq!(lenient.parse_errors().len(), 1);

        let strict = read_str(input, &ReadOptions::new().raise_level(1));
        let err = strict.unwrap_err();
        assert_eq!(err.parse_errors().len(), 1);
    }

    #[test]
    fn test_raise_level_zero_behaves_like_one() {
        let input = "data_x\n_a.b 1\ndata_x\n_a.c 2\n";
        assert!(read_str(input, &ReadOptions::new().raise_level(0)).is_err());
    }

    #[test]
    fn test_raise_level_above_three_never_raises() {
        let input = "data_d\nstop_\n_a.b 1\n";
        let file = read_str(input, &ReadOptions::new().raise_level(4)).unwrap();
        assert_eq!(file.parse_errors().len(), 1);
    }

    #[test]
    fn test_crlf_normalization() {
        let file = read_str("data_t\r\n_x.y 1\r\n", &ReadOptions::default()).unwrap();
        assert_eq!(file.rows()[0].values, vec!["1"]);
    }

    #[test]
    fn test_read_bytes_rejects_invalid_utf8() {
        let err = read_bytes(&[0x64, 0xff, 0xfe], &ReadOptions::default()).unwrap_err();
        assert!(matches!(err, ReadError::Encoding(_)));
    }
}
