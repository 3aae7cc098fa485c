//! Data-block views.

use serde::{Deserialize, Serialize};

use super::{Category, CifFrame};

/// Whether a block carries save frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// No save frames; all items sit directly under the block.
    Data,
    /// At least one save frame (dictionary-style block).
    Dict,
}

/// A data block: direct categories plus any save frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CifBlock {
    code: String,
    categories: Vec<Category>,
    frames: Vec<CifFrame>,
}

impl CifBlock {
    pub(crate) fn new(code: String) -> Self {
        Self {
            code,
            categories: Vec::new(),
            frames: Vec::new(),
        }
    }

    /// Block code (without the `data_` prefix).
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn kind(&self) -> BlockKind {
        if self.frames.is_empty() {
            BlockKind::Data
        } else {
            BlockKind::Dict
        }
    }

    /// Categories directly under the block (not inside save frames).
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn categories_mut(&mut self) -> &mut [Category] {
        &mut self.categories
    }

    pub fn category(&self, code: &str) -> Option<&Category> {
        self.categories.iter().find(|cat| cat.code() == code)
    }

    pub fn category_mut(&mut self, code: &str) -> Option<&mut Category> {
        self.categories.iter_mut().find(|cat| cat.code() == code)
    }

    pub fn has_category(&self, code: &str) -> bool {
        self.category(code).is_some()
    }

    pub fn frames(&self) -> &[CifFrame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [CifFrame] {
        &mut self.frames
    }

    pub fn frame(&self, code: &str) -> Option<&CifFrame> {
        self.frames.iter().find(|frame| frame.code() == code)
    }

    pub(crate) fn category_entry(&mut self, code: &str) -> &mut Category {
        if let Some(idx) = self.categories.iter().position(|cat| cat.code() == code) {
            &mut self.categories[idx]
        } else {
            self.categories.push(Category::new(code.to_string(), Vec::new()));
            let last = self.categories.len() - 1;
            &mut self.categories[last]
        }
    }

    pub(crate) fn frame_entry(&mut self, code: &str) -> &mut CifFrame {
        if let Some(idx) = self.frames.iter().position(|frame| frame.code() == code) {
            &mut self.frames[idx]
        } else {
            self.frames.push(CifFrame::new(code.to_string()));
            let last = self.frames.len() - 1;
            &mut self.frames[last]
        }
    }
}
