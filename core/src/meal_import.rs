use std::collections::HashSet;
use std::io::Read;

use anyhow::{Context, Result};

use crate::db::Database;
use crate::models::{
    Ingredient, NewMealTemplate, NewPantryItem, UpdateMealTemplate, UpdatePantryItem,
};
use crate::repository::Repository;

/// A single recipe row parsed from a meal catalog CSV.
#[derive(Debug, Clone)]
pub struct MealRow {
    pub name: String,
    pub category: String,
    pub url: Option<String>,
    pub ingredients: Vec<String>,
    pub tags: Vec<String>,
}

/// Summary of what a catalog import would do / did.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MealImportSummary {
    pub rows_parsed: usize,
    pub meals_created: usize,
    pub meals_updated: usize,
}

const DEFAULT_CATEGORY: &str = "Dinner Ideas";

/// Staples every kitchen is assumed to keep: (name, category).
pub const DEFAULT_STAPLES: [(&str, &str); 5] = [
    ("salt", "pantry"),
    ("black pepper", "pantry"),
    ("olive oil", "pantry"),
    ("garlic", "produce"),
    ("butter", "dairy"),
];

const MEAT: &[&str] = &[
    "fish", "halibut", "salmon", "shrimp", "chicken", "beef", "pork", "sirloin", "steak",
    "bacon", "sausage", "turkey", "cod", "tilapia", "mussels", "ribs", "andouille", "pepperoni",
    "ham", "deli meat", "hot dog",
];
const DAIRY: &[&str] = &[
    "cheese", "butter", "cream", "milk", "yogurt", "ricotta", "mozzarella", "parmesan", "feta",
    "mascarpone", "provolone", "cheddar", "asiago", "romano", "monterey",
];
const PRODUCE: &[&str] = &[
    "tomato", "onion", "pepper", "garlic", "lime", "lemon", "avocado", "cilantro", "parsley",
    "cucumber", "jalape", "cabbage", "mushroom", "zucchini", "lettuce", "spinach", "broccoli",
    "carrot", "celery", "basil", "mint", "dill", "rosemary", "thyme", "asparagus", "squash",
    "potato", "beet", "peach", "apple", "strawberr", "kale", "snap peas", "edamame", "corn",
    "brussels", "ginger",
];
const FROZEN: &[&str] = &["frozen", "ice cream"];
const BAKERY: &[&str] = &[
    "bread", "baguette", "roll", "bun", "pita", "flatbread", "pizza dough", "ciabatta",
];

/// Guess a shopping category from an ingredient name. Checked in order:
/// meat, dairy, produce, frozen, bakery; anything else is `pantry`.
#[must_use]
pub fn guess_category(ingredient: &str) -> &'static str {
    let lower = ingredient.to_lowercase();
    let hit = |words: &[&str]| words.iter().any(|w| lower.contains(w));
    if hit(MEAT) {
        "meat"
    } else if hit(DAIRY) {
        "dairy"
    } else if hit(PRODUCE) {
        "produce"
    } else if hit(FROZEN) {
        "frozen"
    } else if hit(BAKERY) {
        "bakery"
    } else {
        "pantry"
    }
}

fn split_pipes(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a meal catalog CSV from any reader.
///
/// Lines before the `Recipe Name,Category,Recipe URL,Ingredients,Tags` header
/// are ignored. Ingredients and tags are pipe-separated.
pub fn parse_meal_csv<R: Read>(reader: R) -> Result<Vec<MealRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut in_table = false;

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 1))?;

        if !in_table {
            in_table = record.get(0) == Some("Recipe Name");
            continue;
        }

        if record.len() < 4 {
            continue;
        }

        let field = |i: usize| record.get(i).unwrap_or("").trim();
        let name = field(0);
        if name.is_empty() {
            continue;
        }
        let category = match field(1) {
            "" => DEFAULT_CATEGORY,
            c => c,
        };
        let url = match field(2) {
            "" | "-" | "\u{2014}" => None,
            u => Some(u.to_string()),
        };

        rows.push(MealRow {
            name: name.to_string(),
            category: category.to_string(),
            url,
            ingredients: split_pipes(field(3)),
            tags: split_pipes(field(4)),
        });
    }

    Ok(rows)
}

impl MealRow {
    #[must_use]
    pub fn description(&self) -> String {
        match &self.url {
            Some(url) => format!("{} - {url}", self.category),
            None => self.category.clone(),
        }
    }

    #[must_use]
    pub fn ingredients(&self) -> Vec<Ingredient> {
        self.ingredients
            .iter()
            .map(|name| Ingredient::new(name.clone(), guess_category(name)))
            .collect()
    }
}

/// Write parsed rows to the catalog. A row naming an existing meal
/// (case-insensitively) replaces its description, tags and ingredients.
/// A name repeated within the file counts as an update of the earlier row.
/// When `dry_run` is true, nothing is written.
pub fn import_meals(db: &Database, rows: &[MealRow], dry_run: bool) -> Result<MealImportSummary> {
    let mut meals_created = 0;
    let mut meals_updated = 0;
    let mut planned: HashSet<String> = HashSet::new();

    for row in rows {
        let first_in_file = planned.insert(row.name.trim().to_lowercase());
        let existing = db.find_meal_template_by_name(&row.name, true)?;
        match existing {
            Some(meal) => {
                if !dry_run {
                    db.update_meal_template(
                        meal.id,
                        &UpdateMealTemplate {
                            name: None,
                            description: Some(Some(row.description())),
                            tags: Some(row.tags.clone()),
                            ingredients: Some(row.ingredients()),
                        },
                    )
                    .with_context(|| format!("Failed to update meal '{}'", row.name))?;
                }
                meals_updated += 1;
            }
            // only a dry run gets here: a real run already wrote the earlier row
            None if !first_in_file => meals_updated += 1,
            None => {
                if !dry_run {
                    db.insert_meal_template(&NewMealTemplate {
                        name: row.name.clone(),
                        description: Some(row.description()),
                        tags: row.tags.clone(),
                        ingredients: row.ingredients(),
                    })
                    .with_context(|| format!("Failed to create meal '{}'", row.name))?;
                }
                meals_created += 1;
            }
        }
        tracing::debug!(
            meal = %row.name,
            ingredients = row.ingredients.len(),
            dry_run,
            "imported meal row"
        );
    }

    Ok(MealImportSummary {
        rows_parsed: rows.len(),
        meals_created,
        meals_updated,
    })
}

/// Ensure the default staples exist and are marked always-on-hand.
/// Returns how many items were added or changed.
pub fn seed_default_staples(db: &Database) -> Result<usize> {
    let mut changed = 0;
    for (name, category) in DEFAULT_STAPLES {
        match db.find_pantry_item_by_name(name)? {
            Some(item) if item.always_on_hand => {}
            Some(item) => {
                db.update_pantry_item(
                    item.id,
                    &UpdatePantryItem {
                        always_on_hand: Some(true),
                        ..UpdatePantryItem::default()
                    },
                )?;
                changed += 1;
            }
            None => {
                db.insert_pantry_item(&NewPantryItem {
                    name: name.to_string(),
                    category: category.to_string(),
                    always_on_hand: true,
                })?;
                changed += 1;
            }
        }
    }
    Ok(changed)
}
