use potluck_catalog::matching::{best_match, nearest_within};
use potluck_catalog::{DefaultOption, MenuItem, MenuOption, Restaurant};
use potluck_core::{ItemOutcome, OptionStatus, ResolvedOption, ResolvedOrderItem};

use crate::models::RawOrderLine;

/// Largest edit distance (exclusive) at which an unmatched item gets a
/// "did you mean" suggestion
pub const DEFAULT_SUGGESTION_THRESHOLD: usize = 10;

/// Resolves parsed order lines against a restaurant's menu.
///
/// Resolution is pure: the same line and menu always resolve the same way.
#[derive(Debug, Clone)]
pub struct ItemResolver {
    suggestion_threshold: usize,
}

impl Default for ItemResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SUGGESTION_THRESHOLD)
    }
}

impl ItemResolver {
    pub fn new(suggestion_threshold: usize) -> Self {
        Self { suggestion_threshold }
    }

    pub fn resolve_all(&self, lines: &[RawOrderLine], restaurant: &Restaurant) -> Vec<ResolvedOrderItem> {
        lines.iter().map(|line| self.resolve(line, restaurant)).collect()
    }

    pub fn resolve(&self, line: &RawOrderLine, restaurant: &Restaurant) -> ResolvedOrderItem {
        match best_match(&line.item_name, restaurant.item_names()) {
            Some((idx, _)) => resolve_options(line, &restaurant.items[idx]),
            None => self.unmatched(line, restaurant),
        }
    }

    fn unmatched(&self, line: &RawOrderLine, restaurant: &Restaurant) -> ResolvedOrderItem {
        let suggestion = nearest_within(&line.item_name, restaurant.item_names(), self.suggestion_threshold)
            .map(str::to_string);

        ResolvedOrderItem {
            requested_name: line.item_name.clone(),
            item: None,
            suggestion,
            options: line.option_names.iter().map(|name| ignored(name)).collect(),
            defaults: Vec::new(),
            subtotal_cents: 0,
            outcome: ItemOutcome::Unmatched,
        }
    }
}

fn resolve_options(line: &RawOrderLine, item: &MenuItem) -> ResolvedOrderItem {
    let mut remaining: Vec<&str> = line.option_names.iter().map(String::as_str).collect();
    let mut options: Vec<ResolvedOption> = Vec::new();
    let mut defaults: Vec<&DefaultOption> = item.default_options.iter().collect();

    for set in &item.option_sets {
        let names = || set.options.iter().map(|o| o.name.as_str());

        if set.exclusive {
            // first requested name that fits the radio group wins it
            let found = remaining
                .iter()
                .enumerate()
                .find_map(|(pos, raw)| best_match(raw, names()).map(|(idx, _)| (pos, idx)));
            if let Some((pos, idx)) = found {
                remaining.remove(pos);
                options.push(selected(&set.options[idx]));
                defaults.retain(|d| d.option_set != set.name);
            }
        } else {
            let mut pos = 0;
            while pos < remaining.len() {
                match best_match(remaining[pos], names()) {
                    Some((idx, _)) => {
                        remaining.remove(pos);
                        let option = &set.options[idx];
                        // ticking a pre-ticked box keeps one charge
                        defaults.retain(|d| !(d.option_set == set.name && d.option == option.name));
                        options.push(selected(option));
                    }
                    None => pos += 1,
                }
            }
        }
    }

    let outcome = if remaining.is_empty() {
        ItemOutcome::Matched
    } else {
        ItemOutcome::PartialOptions
    };
    options.extend(remaining.into_iter().map(ignored));

    let defaults: Vec<ResolvedOption> = defaults
        .into_iter()
        .map(|d| ResolvedOption {
            name: d.option.clone(),
            price_cents: item.default_option_price(d),
            status: OptionStatus::Default,
        })
        .collect();

    let subtotal_cents = item.price_cents
        + options
            .iter()
            .filter(|o| o.status == OptionStatus::Selected)
            .map(|o| o.price_cents)
            .sum::<i32>()
        + defaults.iter().map(|d| d.price_cents).sum::<i32>();

    ResolvedOrderItem {
        requested_name: line.item_name.clone(),
        item: Some(item.clone()),
        suggestion: None,
        options,
        defaults,
        subtotal_cents,
        outcome,
    }
}

fn selected(option: &MenuOption) -> ResolvedOption {
    ResolvedOption {
        name: option.name.clone(),
        price_cents: option.price_cents,
        status: OptionStatus::Selected,
    }
}

fn ignored(name: &str) -> ResolvedOption {
    ResolvedOption {
        name: name.to_string(),
        price_cents: 0,
        status: OptionStatus::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_order_text;
    use potluck_catalog::OptionSet;

    fn newa() -> Restaurant {
        Restaurant::new("Newa", 1700)
            .with_item(
                MenuItem::new("Chicken Momo Jhol", 800).with_option_set(
                    OptionSet::exclusive(
                        "Size",
                        vec![MenuOption::new("Small", 0), MenuOption::new("Large", 100)],
                    ),
                    Some("Small"),
                ),
            )
            .with_item(MenuItem::new("Aquafina", 150))
            .with_item(MenuItem::new("Chicken Pesto Sub", 950))
    }

    fn pizza_place() -> Restaurant {
        Restaurant::new("Pizza Place", 0).with_item(
            MenuItem::new("Cheese Pizza", 1200)
                .with_option_set(
                    OptionSet::exclusive(
                        "Crust",
                        vec![MenuOption::new("Thin", 0), MenuOption::new("Deep Dish", 200)],
                    ),
                    Some("Deep Dish"),
                )
                .with_option_set(
                    OptionSet::any_of(
                        "Toppings",
                        vec![
                            MenuOption::new("Green Peppers", 75),
                            MenuOption::new("Chicken", 150),
                            MenuOption::new("Extra Cheese", 100),
                        ],
                    ),
                    Some("Extra Cheese"),
                ),
        )
    }

    fn resolve(text: &str, restaurant: &Restaurant) -> Vec<ResolvedOrderItem> {
        ItemResolver::default().resolve_all(&parse_order_text(text), restaurant)
    }

    #[test]
    fn test_defaults_and_exclusive_override_price() {
        let items = resolve("chicken momo, chicken momo (large)", &newa());

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].display_name(), "Chicken Momo Jhol");
        assert_eq!(items[0].subtotal_cents, 800);
        assert_eq!(items[0].defaults.len(), 1);
        assert_eq!(items[0].defaults[0].name, "Small");
        assert_eq!(items[0].outcome, ItemOutcome::Matched);

        assert_eq!(items[1].subtotal_cents, 900);
        assert!(items[1].defaults.is_empty());
        assert_eq!(items[1].selected_options().map(|o| o.name.as_str()).collect::<Vec<_>>(), vec!["Large"]);
        assert_eq!(items[1].outcome, ItemOutcome::Matched);
    }

    #[test]
    fn test_priced_defaults_are_charged_without_overrides() {
        let items = resolve("cheese pizza", &pizza_place());
        let item = &items[0];

        assert_eq!(item.outcome, ItemOutcome::Matched);
        assert!(item.options.is_empty());
        let defaults: Vec<_> = item.defaults.iter().map(|o| (o.name.as_str(), o.price_cents)).collect();
        assert_eq!(defaults, vec![("Deep Dish", 200), ("Extra Cheese", 100)]);
        assert_eq!(item.subtotal_cents, 1200 + 200 + 100);
    }

    #[test]
    fn test_unmatched_item_suggests_close_name() {
        let menu = Restaurant::new("Sub Shop", 0)
            .with_item(MenuItem::new("Aquafina", 150))
            .with_item(MenuItem::new("Chicken Pesto Sub", 950));
        let items = resolve("chicken choila (spicy)", &menu);

        assert_eq!(items[0].outcome, ItemOutcome::Unmatched);
        assert!(!items[0].is_billable());
        assert_eq!(items[0].subtotal_cents, 0);
        assert_eq!(items[0].suggestion.as_deref(), Some("Chicken Pesto Sub"));
        assert_eq!(items[0].ignored_options().count(), 1);
    }

    #[test]
    fn test_no_suggestion_when_nothing_is_close() {
        let menu = Restaurant::new("Water Bar", 0).with_item(MenuItem::new("Aquafina", 150));
        let items = resolve("chicken choila", &menu);

        assert_eq!(items[0].outcome, ItemOutcome::Unmatched);
        assert_eq!(items[0].suggestion, None);
    }

    #[test]
    fn test_non_exclusive_set_takes_every_match() {
        let items = resolve("cheese pizza (green peppers, chicken, thin)", &pizza_place());
        let item = &items[0];

        let selected: Vec<_> = item.selected_options().map(|o| o.name.as_str()).collect();
        assert_eq!(selected, vec!["Thin", "Green Peppers", "Chicken"]);
        // Deep Dish default replaced, Extra Cheese default kept
        assert_eq!(item.defaults.len(), 1);
        assert_eq!(item.defaults[0].name, "Extra Cheese");
        assert_eq!(item.subtotal_cents, 1200 + 75 + 150 + 100);
    }

    #[test]
    fn test_selecting_a_default_checkbox_charges_once() {
        let items = resolve("cheese pizza (extra cheese)", &pizza_place());
        let item = &items[0];

        assert_eq!(item.defaults.len(), 1);
        assert_eq!(item.defaults[0].name, "Deep Dish");
        assert_eq!(item.subtotal_cents, 1200 + 200 + 100);
    }

    #[test]
    fn test_unknown_option_is_ignored_not_fatal() {
        let items = resolve("chicken momo (large, xyz)", &newa());

        assert_eq!(items[0].outcome, ItemOutcome::PartialOptions);
        assert!(items[0].is_billable());
        assert_eq!(items[0].subtotal_cents, 900);
        assert_eq!(items[0].ignored_options().map(|o| o.name.as_str()).collect::<Vec<_>>(), vec!["xyz"]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let menu = newa();
        let lines = parse_order_text("aquafina, chicken momo (large), chicken choila");
        let resolver = ItemResolver::default();
        assert_eq!(resolver.resolve_all(&lines, &menu), resolver.resolve_all(&lines, &menu));
    }
}
