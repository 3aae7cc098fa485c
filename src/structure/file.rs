//! The file view: flat table ownership plus the lazily built block tree.

use serde::{Deserialize, Serialize};

use super::CifBlock;
use crate::parser::error::ParseError;
use crate::parser::{FlatRow, Variant};

/// Whether a file contains save frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// No save frames anywhere.
    Data,
    /// At least one row sits inside a save frame.
    Dict,
}

/// A part of a CIF file selectable with [`CifFile::part`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilePart {
    /// Rows directly under a block (no save frame).
    Data,
    /// Rows inside any save frame.
    Dict,
    /// Rows inside save frames whose code has no dot (category
    /// definitions in DDL2 dictionaries).
    DictCat,
    /// Rows inside save frames whose code contains a dot (item
    /// definitions in DDL2 dictionaries).
    DictKey,
}

/// A parsed CIF file.
///
/// Owns the normalized flat table and the parse errors retained by the
/// reader. The hierarchical views (blocks, frames, categories) are built
/// once on first access and cached; category tables pivot lazily inside
/// the tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CifFile {
    variant: Variant,
    rows: Vec<FlatRow>,
    errors: Vec<ParseError>,
    tree: Option<Vec<CifBlock>>,
}

impl CifFile {
    pub(crate) fn from_parse(
        variant: Variant,
        rows: Vec<FlatRow>,
        errors: Vec<ParseError>,
    ) -> Self {
        Self {
            variant,
            rows,
            errors,
            tree: None,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn kind(&self) -> FileKind {
        if self.rows.iter().any(|row| row.frame_code.is_some()) {
            FileKind::Dict
        } else {
            FileKind::Data
        }
    }

    /// Parse errors retained from reading (below the raise level).
    pub fn parse_errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// The flat table as emitted by the parser.
    pub fn rows(&self) -> &[FlatRow] {
        &self.rows
    }

    /// Block codes in first-occurrence order.
    pub fn block_codes(&self) -> Vec<&str> {
        let mut codes: Vec<&str> = Vec::new();
        for row in &self.rows {
            if !codes.contains(&row.block_code.as_str()) {
                codes.push(&row.block_code);
            }
        }
        codes
    }

    pub fn block_count(&self) -> usize {
        self.block_codes().len()
    }

    /// All blocks, building the view tree on first access.
    pub fn blocks(&mut self) -> &mut [CifBlock] {
        self.ensure_tree();
        self.tree.as_mut().map(Vec::as_mut_slice).unwrap_or(&mut [])
    }

    /// A block by code.
    pub fn block(&mut self, code: &str) -> Option<&mut CifBlock> {
        self.blocks().iter_mut().find(|block| block.code() == code)
    }

    /// The first block, if any.
    pub fn first_block(&mut self) -> Option<&mut CifBlock> {
        self.blocks().iter_mut().next()
    }

    /// Filter the flat table into a sub-file.
    ///
    /// Operates on the parsed rows: typed tables installed by a validator
    /// into this file's views are not carried over.
    pub fn part(&self, part: FilePart) -> CifFile {
        let keep = |row: &FlatRow| -> bool {
            match (&row.frame_code, part) {
                (None, FilePart::Data) => true,
                (Some(_), FilePart::Dict) => true,
                (Some(frame), FilePart::DictCat) => !frame.contains('.'),
                (Some(frame), FilePart::DictKey) => frame.contains('.'),
                _ => false,
            }
        };
        CifFile {
            variant: self.variant,
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
            errors: Vec::new(),
            tree: None,
        }
    }

    fn ensure_tree(&mut self) {
        if self.tree.is_some() {
            return;
        }
        let mut blocks: Vec<CifBlock> = Vec::new();
        for row in &self.rows {
            let block = match blocks
                .iter()
                .position(|block| block.code() == row.block_code)
            {
                Some(idx) => &mut blocks[idx],
                None => {
                    blocks.push(CifBlock::new(row.block_code.clone()));
                    let last = blocks.len() - 1;
                    &mut blocks[last]
                }
            };
            let category = match &row.frame_code {
                Some(frame_code) => block.frame_entry(frame_code).category_entry(&row.category),
                None => block.category_entry(&row.category),
            };
            category.push_raw(row.keyword.clone(), row.values.clone());
        }
        self.tree = Some(blocks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, CaseNormalization};

    fn read(input: &str) -> CifFile {
        let (rows, errors) = parse(input, Variant::MmCif, CaseNormalization::Lower);
        CifFile::from_parse(Variant::MmCif, rows, errors)
    }

    #[test]
    fn test_block_order_is_first_occurrence() {
        let file = read("data_b2\n_a.x 1\ndata_a1\n_a.x 2\n");
        assert_eq!(file.block_codes(), vec!["b2", "a1"]);
    }

    #[test]
    fn test_kind() {
        assert_eq!(read("data_d\n_a.x 1\n").kind(), FileKind::Data);
        assert_eq!(
            read("data_d\nsave_f\n_a.x 1\nsave_\n").kind(),
            FileKind::Dict
        );
    }

    #[test]
    fn test_tree_shape() {
        let mut file = read(
            "data_d\n_cell.length_a 1\n_cell.length_b 2\nsave_f\n_item.name x\nsave_\n",
        );
        let block = file.first_block().unwrap();
        assert_eq!(block.categories().len(), 1);
        assert_eq!(block.categories()[0].code(), "cell");
        assert_eq!(block.frames().len(), 1);
        assert_eq!(block.frames()[0].code(), "f");
        assert_eq!(block.frames()[0].categories()[0].code(), "item");
    }

    #[test]
    fn test_part_filters() {
        let file = read(
            "data_d\n_x.y 1\nsave_cat\n_category.id c\nsave_\nsave_cat.key\n_item.name k\nsave_\n",
        );
        assert_eq!(file.part(FilePart::Data).rows().len(), 1);
        assert_eq!(file.part(FilePart::Dict).rows().len(), 2);
        let cat = file.part(FilePart::DictCat);
        assert_eq!(cat.rows().len(), 1);
        assert_eq!(cat.rows()[0].category, "category");
        let key = file.part(FilePart::DictKey);
        assert_eq!(key.rows().len(), 1);
        assert_eq!(key.rows()[0].category, "item");
    }

    #[test]
    fn test_category_pivot_height() {
        let mut file = read("data_d\nloop_\n_s.a _s.b\n1 2\n3 4\n5 6\n");
        let block = file.first_block().unwrap();
        let cat = block.category_mut("s").unwrap();
        assert_eq!(cat.table().height(), 3);
        assert_eq!(cat.item_names(), vec!["a", "b"]);
    }
}
