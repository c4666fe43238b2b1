use serde::{Deserialize, Serialize};

/// A single selectable option inside an option set (e.g. "Large", "Extra Cheese")
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuOption {
    pub name: String,
    #[serde(default)]
    pub price_cents: i32,
}

/// Group of options shown together on an item.
///
/// An exclusive set is a radio group (pick at most one); a non-exclusive set
/// is a checkbox group (pick any number).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OptionSet {
    pub name: String,
    pub exclusive: bool,
    #[serde(default)]
    pub options: Vec<MenuOption>,
}

/// An option the website pre-selects for an item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DefaultOption {
    pub option_set: String,
    pub option: String,
}

/// Menu item with its base price and option sets
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MenuItem {
    pub name: String,
    pub price_cents: i32,
    #[serde(default)]
    pub option_sets: Vec<OptionSet>,
    #[serde(default)]
    pub default_options: Vec<DefaultOption>,
}

impl MenuItem {
    pub fn new(name: impl Into<String>, price_cents: i32) -> Self {
        Self {
            name: name.into(),
            price_cents,
            option_sets: Vec::new(),
            default_options: Vec::new(),
        }
    }

    /// Add an option set, optionally marking one of its options as the default
    pub fn with_option_set(mut self, set: OptionSet, default: Option<&str>) -> Self {
        if let Some(option) = default {
            self.default_options.push(DefaultOption {
                option_set: set.name.clone(),
                option: option.to_string(),
            });
        }
        self.option_sets.push(set);
        self
    }

    pub fn option_set(&self, name: &str) -> Option<&OptionSet> {
        self.option_sets.iter().find(|s| s.name == name)
    }

    /// Look up the option a default points at.
    ///
    /// Defaults referencing options that no longer exist on the menu are
    /// treated as free rather than rejected.
    pub fn default_option(&self, default: &DefaultOption) -> Option<&MenuOption> {
        self.option_set(&default.option_set)?
            .options
            .iter()
            .find(|o| o.name == default.option)
    }

    pub fn default_option_price(&self, default: &DefaultOption) -> i32 {
        self.default_option(default).map(|o| o.price_cents).unwrap_or(0)
    }
}

impl OptionSet {
    pub fn exclusive(name: impl Into<String>, options: Vec<MenuOption>) -> Self {
        Self { name: name.into(), exclusive: true, options }
    }

    pub fn any_of(name: impl Into<String>, options: Vec<MenuOption>) -> Self {
        Self { name: name.into(), exclusive: false, options }
    }
}

impl MenuOption {
    pub fn new(name: impl Into<String>, price_cents: i32) -> Self {
        Self { name: name.into(), price_cents }
    }
}

/// A restaurant's scraped menu. Owned by the menu population job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Restaurant {
    pub name: String,
    #[serde(default)]
    pub delivery_minimum_cents: i32,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub items: Vec<MenuItem>,
}

impl Restaurant {
    pub fn new(name: impl Into<String>, delivery_minimum_cents: i32) -> Self {
        Self {
            name: name.into(),
            delivery_minimum_cents,
            url: None,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: MenuItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn item_names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|i| i.name.as_str())
    }
}
