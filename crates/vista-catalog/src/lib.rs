//! Interior style catalog: the data feed the panorama browses.
//!
//! A catalog is an ordered list of styles, each with named positions (parts)
//! holding an ordered list of panorama image sources. [`Browser`] tracks the
//! current selection and 1-based page and derives the texture source the
//! scene should show next.

mod browser;
mod catalog;
mod error;

pub use browser::Browser;
pub use catalog::{PartInfo, SelectionAction, StyleCatalog, StyleInfo};
pub use error::CatalogError;
