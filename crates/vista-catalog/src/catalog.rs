//! Catalog data model, JSON loading and the selection reducer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// One camera position inside a style, e.g. "living room".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    pub name: String,
    #[serde(default)]
    pub selected: bool,
    /// Panorama image sources, in browsing order.
    #[serde(default)]
    pub images: Vec<String>,
}

/// An interior design style and its positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleInfo {
    pub name: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub parts: Vec<PartInfo>,
}

/// Selection changes the browsing UI can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionAction {
    /// Select a style by name and its first position.
    SelectStyle { name: String },
    /// Select a position by name inside the style named `parent`.
    ///
    /// Unknown position names fall back to the style's first position.
    SelectPosition { name: String, parent: String },
}

/// Ordered list of styles as delivered by the catalog feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StyleCatalog {
    styles: Vec<StyleInfo>,
}

impl StyleCatalog {
    pub fn new(styles: Vec<StyleInfo>) -> Self {
        Self { styles }
    }

    /// Parse a catalog from its JSON representation (an array of styles).
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a catalog file.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            styles = catalog.styles.len(),
            "loaded style catalog"
        );
        Ok(catalog)
    }

    pub fn styles(&self) -> &[StyleInfo] {
        &self.styles
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    pub fn selected_style(&self) -> Option<&StyleInfo> {
        self.styles.iter().find(|style| style.selected)
    }

    pub fn selected_part(&self) -> Option<&PartInfo> {
        self.selected_style()?.parts.iter().find(|part| part.selected)
    }

    /// Images of the selected position, empty when nothing is selected.
    pub fn selected_images(&self) -> &[String] {
        self.selected_part()
            .map(|part| part.images.as_slice())
            .unwrap_or(&[])
    }

    /// Pure selection reducer: returns the catalog with `action` applied.
    pub fn reduce(mut self, action: &SelectionAction) -> Self {
        self.apply(action);
        self
    }

    /// In-place form of [`reduce`](Self::reduce).
    pub fn apply(&mut self, action: &SelectionAction) {
        match action {
            SelectionAction::SelectStyle { name } => {
                for style in &mut self.styles {
                    style.selected = style.name == *name;
                    let style_selected = style.selected;
                    for (index, part) in style.parts.iter_mut().enumerate() {
                        part.selected = style_selected && index == 0;
                    }
                }
            }
            SelectionAction::SelectPosition { name, parent } => {
                for style in &mut self.styles {
                    style.selected = style.name == *parent;
                    let target = if style.selected {
                        style
                            .parts
                            .iter()
                            .find(|part| part.name == *name)
                            .or_else(|| style.parts.first())
                            .map(|part| part.name.clone())
                    } else {
                        None
                    };
                    for part in &mut style.parts {
                        part.selected = target.as_deref() == Some(part.name.as_str());
                    }
                }
            }
        }
    }
}
