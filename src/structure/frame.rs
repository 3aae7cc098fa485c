//! Save-frame views.

use serde::{Deserialize, Serialize};

use super::Category;

/// A save frame: a named second-level container of categories, used almost
/// exclusively by dictionary files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CifFrame {
    code: String,
    categories: Vec<Category>,
}

impl CifFrame {
    pub(crate) fn new(code: String) -> Self {
        Self {
            code,
            categories: Vec::new(),
        }
    }

    /// Frame code (without the `save_` prefix or a leading underscore).
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Part of the frame code before the first dot. For dictionary files
    /// this is the defined category (category definition frames) or the
    /// category of the defined item (item definition frames).
    pub fn code_category(&self) -> &str {
        match self.code.split_once('.') {
            Some((category, _)) => category,
            None => &self.code,
        }
    }

    /// Part of the frame code after the first dot, if any. Present exactly
    /// for item definition frames.
    pub fn code_keyword(&self) -> Option<&str> {
        self.code.split_once('.').map(|(_, keyword)| keyword)
    }

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

    pub(crate) fn category_entry(&mut self, code: &str) -> &mut Category {
        if let Some(idx) = self.categories.iter().position(|cat| cat.code() == code) {
            &mut self.categories[idx]
        } else {
            self.categories.push(Category::new(code.to_string(), Vec::new()));
            let last = self.categories.len() - 1;
            &mut self.categories[last]
        }
    }
}
