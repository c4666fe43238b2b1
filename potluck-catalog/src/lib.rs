pub mod menu;
pub mod matching;
pub mod pricing;
pub mod catalog;

pub use menu::{DefaultOption, MenuItem, MenuOption, OptionSet, Restaurant};
pub use catalog::{CatalogError, InMemoryCatalog, MenuCatalog};
pub use pricing::format_cents;
