use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::window::PlanningWindow;

/// A named, unquantified ingredient. Shared by meal templates and grocery items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub category: String,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
        }
    }

    /// Case-insensitive identity used for pantry lookups and list deduplication.
    #[must_use]
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

// --- Meal catalog ---

#[derive(Debug, Clone, Serialize)]
pub struct MealTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub ingredients: Vec<Ingredient>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewMealTemplate {
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub ingredients: Vec<Ingredient>,
}

#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateMealTemplate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub ingredients: Option<Vec<Ingredient>>,
}

// --- Dinner events ---

/// Where a dinner event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Webhook,
    Manual,
}

impl EventSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "webhook" => Ok(Self::Webhook),
            "manual" => Ok(Self::Manual),
            other => Err(Error::Validation(format!(
                "Invalid event source '{other}'. Must be one of: webhook, manual"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DinnerEvent {
    pub id: i64,
    pub date: NaiveDate,
    pub title: String,
    pub notes: Option<String>,
    pub external_id: Option<String>,
    pub meal_template_id: Option<i64>,
    pub source: EventSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meal_template: Option<MealTemplate>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewDinnerEvent {
    pub date: NaiveDate,
    pub title: String,
    pub notes: Option<String>,
    pub external_id: Option<String>,
    pub source: EventSource,
}

/// A window's scheduled dinners.
#[derive(Debug, Clone, Serialize)]
pub struct DinnerSchedule {
    pub window: PlanningWindow,
    pub events: Vec<DinnerEvent>,
}

/// Outcome of ingesting one calendar event.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarIngest {
    pub dinner_event: DinnerEvent,
    pub matched: bool,
    pub matched_meal: Option<String>,
    pub grocery_list_item_count: usize,
}

// --- Pantry ---

#[derive(Debug, Clone, Serialize)]
pub struct PantryItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub always_on_hand: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct NewPantryItem {
    pub name: String,
    pub category: String,
    pub always_on_hand: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdatePantryItem {
    pub name: Option<String>,
    pub category: Option<String>,
    pub always_on_hand: Option<bool>,
}

// --- Grocery lists ---

#[derive(Debug, Clone, Serialize)]
pub struct GroceryList {
    pub id: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub is_active: bool,
    pub created_at: String,
    pub items: Vec<GroceryListItem>,
}

impl GroceryList {
    /// Items grouped by category for display. Categories are sorted; items keep
    /// the list's order. An empty category is grouped under `"other"`.
    #[must_use]
    pub fn grouped_by_category(&self) -> BTreeMap<String, Vec<GroceryListItem>> {
        let mut groups: BTreeMap<String, Vec<GroceryListItem>> = BTreeMap::new();
        for item in &self.items {
            let category = if item.category.trim().is_empty() {
                "other".to_string()
            } else {
                item.category.clone()
            };
            groups.entry(category).or_default().push(item.clone());
        }
        groups
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroceryListItem {
    pub id: i64,
    pub list_id: i64,
    pub name: String,
    pub category: String,
    pub from_meals: Vec<String>,
    pub is_checked: bool,
}

/// A list item before it has been persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGroceryListItem {
    pub name: String,
    pub category: String,
    pub from_meals: Vec<String>,
}

// --- Suggestions ---

#[derive(Debug, Clone, Serialize)]
pub struct MealSuggestion {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub pantry_match_count: usize,
    pub ingredient_overlap_count: usize,
    pub score: usize,
    pub reason: String,
}

// --- Write-side normalisation ---

/// Trim a required free-text field, rejecting blanks.
pub fn require_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Trim an optional field; blank values become `None`.
#[must_use]
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate ingredients before they are stored on a template: every name and
/// category must be present. Values are trimmed; order is preserved.
pub fn normalize_ingredients(ingredients: Vec<Ingredient>) -> Result<Vec<Ingredient>> {
    ingredients
        .into_iter()
        .enumerate()
        .map(|(i, ing)| {
            let name = require_text(&ing.name, &format!("ingredients[{i}].name"))?;
            let category = require_text(&ing.category, &format!("ingredients[{i}].category"))?;
            Ok(Ingredient { name, category })
        })
        .collect()
}

/// Pantry names and categories are stored trimmed and lowercase.
pub fn normalize_pantry_field(value: &str, field: &str) -> Result<String> {
    require_text(value, field).map(|v| v.to_lowercase())
}

impl NewMealTemplate {
    pub fn normalized(self) -> Result<Self> {
        Ok(Self {
            name: require_text(&self.name, "Name")?,
            description: optional_text(self.description),
            tags: self.tags,
            ingredients: normalize_ingredients(self.ingredients)?,
        })
    }
}

impl UpdateMealTemplate {
    pub fn normalized(self) -> Result<Self> {
        Ok(Self {
            name: self
                .name
                .as_deref()
                .map(|n| require_text(n, "Name"))
                .transpose()?,
            description: self.description.map(optional_text),
            tags: self.tags,
            ingredients: self.ingredients.map(normalize_ingredients).transpose()?,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.ingredients.is_none()
    }
}

impl NewPantryItem {
    pub fn normalized(self) -> Result<Self> {
        Ok(Self {
            name: normalize_pantry_field(&self.name, "Name")?,
            category: normalize_pantry_field(&self.category, "Category")?,
            always_on_hand: self.always_on_hand,
        })
    }
}

impl UpdatePantryItem {
    pub fn normalized(self) -> Result<Self> {
        Ok(Self {
            name: self
                .name
                .as_deref()
                .map(|n| normalize_pantry_field(n, "Name"))
                .transpose()?,
            category: self
                .category
                .as_deref()
                .map(|c| normalize_pantry_field(c, "Category"))
                .transpose()?,
            always_on_hand: self.always_on_hand,
        })
    }
}

impl NewDinnerEvent {
    pub fn normalized(self) -> Result<Self> {
        Ok(Self {
            date: self.date,
            title: require_text(&self.title, "Title")?,
            notes: optional_text(self.notes),
            external_id: optional_text(self.external_id),
            source: self.source,
        })
    }
}
