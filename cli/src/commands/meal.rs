use anyhow::{Result, bail};
use std::path::Path;

use supper_core::Error;
use supper_core::models::{MealTemplate, NewMealTemplate, UpdateMealTemplate};
use supper_core::service::PlannerService;

use super::helpers::{exit_not_found, parse_ingredient, print_meal_detail, print_meal_table};

/// Look a meal up by ID or by name.
fn resolve_meal(svc: &PlannerService, meal: &str, json: bool) -> Result<MealTemplate> {
    let found = match meal.parse::<i64>() {
        Ok(id) => match svc.get_meal(id) {
            Ok(m) => Some(m),
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e.into()),
        },
        Err(_) => svc.find_meal_by_name(meal)?,
    };
    match found {
        Some(m) => Ok(m),
        None => exit_not_found(&format!("Meal '{meal}' not found"), json),
    }
}

pub(crate) fn cmd_meal_add(
    svc: &PlannerService,
    name: String,
    description: Option<String>,
    tags: Vec<String>,
    ingredients: &[String],
    json: bool,
) -> Result<()> {
    let ingredients = ingredients
        .iter()
        .map(|s| parse_ingredient(s))
        .collect::<Result<Vec<_>>>()?;
    let meal = svc.create_meal(&NewMealTemplate {
        name,
        description,
        tags,
        ingredients,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        println!(
            "Created meal '{}' (#{}) with {} ingredients",
            meal.name,
            meal.id,
            meal.ingredients.len()
        );
    }
    Ok(())
}

pub(crate) fn cmd_meal_list(svc: &PlannerService, json: bool) -> Result<()> {
    let meals = svc.list_meals()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meals)?);
    } else if meals.is_empty() {
        println!("No meals yet. Add one with `supper meal add` or `supper meal import`.");
    } else {
        print_meal_table(&meals);
    }
    Ok(())
}

pub(crate) fn cmd_meal_show(svc: &PlannerService, meal: &str, json: bool) -> Result<()> {
    let meal = resolve_meal(svc, meal, json)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        print_meal_detail(&meal);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_meal_edit(
    svc: &PlannerService,
    meal: &str,
    name: Option<String>,
    description: Option<String>,
    clear_description: bool,
    tags: Option<Vec<String>>,
    ingredients: Option<Vec<String>>,
    json: bool,
) -> Result<()> {
    let description = if clear_description {
        Some(None)
    } else {
        description.map(Some)
    };
    let ingredients = ingredients
        .map(|list| {
            list.iter()
                .map(|s| parse_ingredient(s))
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?;
    let update = UpdateMealTemplate {
        name,
        description,
        tags,
        ingredients,
    };
    if update.is_empty() {
        bail!(
            "Nothing to update. Provide at least one of --name, --description, --clear-description, --tag, or --ingredient"
        );
    }

    let existing = resolve_meal(svc, meal, json)?;
    let meal = svc.update_meal(existing.id, &update)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meal)?);
    } else {
        println!("Updated meal #{}", meal.id);
        print_meal_detail(&meal);
    }
    Ok(())
}

pub(crate) fn cmd_meal_delete(svc: &PlannerService, meal: &str, json: bool) -> Result<()> {
    let existing = resolve_meal(svc, meal, json)?;
    svc.delete_meal(existing.id)?;
    if json {
        println!("{}", serde_json::json!({ "deleted": existing.id }));
    } else {
        println!("Deleted meal '{}' (#{})", existing.name, existing.id);
    }
    Ok(())
}

pub(crate) fn cmd_meal_import(
    svc: &PlannerService,
    file: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let summary = svc.import_meals_csv(file, dry_run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let prefix = if dry_run { "[dry run] " } else { "" };
        println!("{prefix}Meal catalog import");
        println!("  Rows parsed:   {}", summary.rows_parsed);
        println!("  Meals created: {}", summary.meals_created);
        println!("  Meals updated: {}", summary.meals_updated);
        if dry_run {
            println!("\nNo changes were made. Remove --dry-run to import.");
        }
    }
    Ok(())
}
