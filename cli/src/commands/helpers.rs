use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use supper_core::meal_import::guess_category;
use supper_core::models::{GroceryList, Ingredient, MealSuggestion, MealTemplate, PantryItem};

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

/// Parse `name:category`. Without a category one is guessed from the name.
pub(crate) fn parse_ingredient(s: &str) -> Result<Ingredient> {
    let (name, category) = match s.rsplit_once(':') {
        Some((name, category)) => (name.trim(), category.trim()),
        None => (s.trim(), ""),
    };
    if name.is_empty() {
        bail!("Invalid ingredient '{s}'. Use 'name' or 'name:category'");
    }
    let category = if category.is_empty() {
        guess_category(name)
    } else {
        category
    };
    Ok(Ingredient::new(name, category))
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing record and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn print_meal_table(meals: &[MealTemplate]) {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Ingredients")]
        ingredients: usize,
        #[tabled(rename = "Tags")]
        tags: String,
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.id,
            name: truncate(&m.name, 35),
            ingredients: m.ingredients.len(),
            tags: truncate(&m.tags.join(", "), 30),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_meal_detail(meal: &MealTemplate) {
    println!("{} (#{})", meal.name, meal.id);
    if let Some(ref description) = meal.description {
        println!("  {description}");
    }
    if !meal.tags.is_empty() {
        println!("  Tags: {}", meal.tags.join(", "));
    }
    if meal.ingredients.is_empty() {
        println!("  No ingredients");
    } else {
        println!("  Ingredients:");
        for ingredient in &meal.ingredients {
            println!("    - {} [{}]", ingredient.name, ingredient.category);
        }
    }
}

pub(crate) fn print_pantry_table(items: &[PantryItem]) {
    #[derive(Tabled)]
    struct PantryRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Always on hand")]
        always_on_hand: &'static str,
    }

    let rows: Vec<PantryRow> = items
        .iter()
        .map(|p| PantryRow {
            id: p.id,
            name: truncate(&p.name, 30),
            category: p.category.clone(),
            always_on_hand: if p.always_on_hand { "yes" } else { "no" },
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_suggestion_table(suggestions: &[MealSuggestion]) {
    #[derive(Tabled)]
    struct SuggestionRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Score")]
        score: usize,
        #[tabled(rename = "Pantry")]
        pantry: usize,
        #[tabled(rename = "Overlap")]
        overlap: usize,
        #[tabled(rename = "Why")]
        reason: String,
    }

    let rows: Vec<SuggestionRow> = suggestions
        .iter()
        .map(|s| SuggestionRow {
            id: s.id,
            name: truncate(&s.name, 30),
            score: s.score,
            pantry: s.pantry_match_count,
            overlap: s.ingredient_overlap_count,
            reason: s.reason.clone(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_grocery_list(list: &GroceryList) {
    println!(
        "Grocery list #{} for {} to {}",
        list.id, list.start_date, list.end_date
    );
    if list.items.is_empty() {
        println!("  Nothing to buy");
        return;
    }
    for (category, items) in list.grouped_by_category() {
        println!("\n{category}:");
        for item in items {
            let mark = if item.is_checked { "x" } else { " " };
            println!(
                "  [{mark}] {:<4} {} ({})",
                item.id,
                item.name,
                item.from_meals.join(", ")
            );
        }
    }
}
