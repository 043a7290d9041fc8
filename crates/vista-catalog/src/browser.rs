//! Selection + paging state that turns a catalog into texture requests.

use crate::catalog::{SelectionAction, StyleCatalog};

/// Browsing state over a [`StyleCatalog`]: the current selection and a
/// 1-based page into the selected position's images.
#[derive(Debug, Clone)]
pub struct Browser {
    catalog: StyleCatalog,
    page: usize,
}

impl Browser {
    /// Start browsing at the first image of whatever the catalog has selected.
    pub fn new(catalog: StyleCatalog) -> Self {
        let mut browser = Self { catalog, page: 0 };
        browser.page = browser.clamp(1);
        browser
    }

    pub fn catalog(&self) -> &StyleCatalog {
        &self.catalog
    }

    /// Current 1-based page. Zero only when the selection has no images.
    pub fn page(&self) -> usize {
        self.page
    }

    /// Number of images in the selected position.
    pub fn total(&self) -> usize {
        self.catalog.selected_images().len()
    }

    /// Select a style; browsing restarts at its first image.
    pub fn select_style(&mut self, name: &str) {
        self.catalog.apply(&SelectionAction::SelectStyle {
            name: name.to_string(),
        });
        self.page = self.clamp(1);
    }

    /// Select a position; the page is kept but clamped into the new range.
    pub fn select_position(&mut self, name: &str, parent: &str) {
        self.catalog.apply(&SelectionAction::SelectPosition {
            name: name.to_string(),
            parent: parent.to_string(),
        });
        self.page = self.clamp(self.page as isize);
    }

    /// Move `delta` pages forward (negative for backward), clamped to the image range.
    pub fn step(&mut self, delta: isize) -> usize {
        self.page = self.clamp(self.page as isize + delta);
        self.page
    }

    /// Source the scene should display, or `""` when nothing is selected.
    pub fn current_source(&self) -> &str {
        self.page
            .checked_sub(1)
            .and_then(|index| self.catalog.selected_images().get(index))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Pager caption: `"page/total"`, or `"0"` for an empty selection.
    pub fn page_label(&self) -> String {
        match self.total() {
            0 => "0".to_string(),
            total => format!("{}/{}", self.page, total),
        }
    }

    fn clamp(&self, page: isize) -> usize {
        let total = self.total() as isize;
        page.max(1).min(total).max(0) as usize
    }
}
