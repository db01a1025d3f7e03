use std::collections::{HashMap, HashSet};

use chrono::{DateTime, TimeZone};

use crate::error::Result;
use crate::lifecycle;
use crate::models::{DinnerEvent, GroceryList, Ingredient, NewGroceryListItem};
use crate::repository::Repository;
use crate::window::compute_window;

/// A scheduled dinner with the ingredients it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMeal {
    /// Template name when one was found, otherwise the event title.
    pub name: String,
    pub ingredients: Vec<Ingredient>,
}

/// Lowercased names of always-on-hand pantry items.
pub fn pantry_set<R: Repository>(repo: &R) -> Result<HashSet<String>> {
    Ok(repo
        .find_pantry_items(true)?
        .into_iter()
        .map(|item| item.name.to_lowercase())
        .collect())
}

/// Work out which ingredients an event contributes.
///
/// A linked template wins. Otherwise the title is matched case-insensitively
/// against the catalog; an event with no match contributes nothing.
pub fn resolve_meal<R: Repository>(repo: &R, event: &DinnerEvent) -> Result<ResolvedMeal> {
    let template = match &event.meal_template {
        Some(template) => Some(template.clone()),
        None => repo.find_meal_template_by_name(&event.title, true)?,
    };
    Ok(match template {
        Some(template) => ResolvedMeal {
            name: template.name,
            ingredients: template.ingredients,
        },
        None => ResolvedMeal {
            name: event.title.clone(),
            ingredients: Vec::new(),
        },
    })
}

/// Merge the meals' ingredients into list items.
///
/// Items are keyed by lowercase name and come out in first-seen order. The
/// first occurrence fixes name and category. Anything in `pantry` is dropped.
#[must_use]
pub fn aggregate(meals: &[ResolvedMeal], pantry: &HashSet<String>) -> Vec<NewGroceryListItem> {
    let mut items: Vec<NewGroceryListItem> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for meal in meals {
        for ingredient in &meal.ingredients {
            let key = ingredient.key();
            if pantry.contains(&key) {
                continue;
            }
            let slot = *index.entry(key).or_insert_with(|| {
                items.push(NewGroceryListItem {
                    name: ingredient.name.clone(),
                    category: ingredient.category.clone(),
                    from_meals: Vec::new(),
                });
                items.len() - 1
            });
            let from_meals = &mut items[slot].from_meals;
            if !from_meals.contains(&meal.name) {
                from_meals.push(meal.name.clone());
            }
        }
    }

    items
}

/// Rebuild the grocery list for the window containing `now` and make it the
/// active list.
pub fn regenerate<R: Repository, Tz: TimeZone>(
    repo: &R,
    now: &DateTime<Tz>,
) -> Result<GroceryList> {
    let window = compute_window(now);
    let events = repo.find_dinner_events_in_range(window.start, window.end)?;
    let pantry = pantry_set(repo)?;

    let meals = events
        .iter()
        .map(|event| resolve_meal(repo, event))
        .collect::<Result<Vec<_>>>()?;
    let items = aggregate(&meals, &pantry);

    tracing::debug!(
        start = %window.start,
        end = %window.end,
        events = events.len(),
        pantry = pantry.len(),
        items = items.len(),
        "aggregated grocery items"
    );

    lifecycle::activate(repo, &window, &items)
}
