use anyhow::{Result, bail};

use supper_core::Error;
use supper_core::models::{NewPantryItem, UpdatePantryItem};
use supper_core::service::PlannerService;

use super::helpers::{exit_not_found, print_pantry_table};

pub(crate) fn cmd_pantry_add(
    svc: &PlannerService,
    name: String,
    category: String,
    occasional: bool,
    json: bool,
) -> Result<()> {
    let item = svc.create_pantry_item(&NewPantryItem {
        name,
        category,
        always_on_hand: !occasional,
    })?;
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("Added '{}' to the pantry (#{})", item.name, item.id);
    }
    Ok(())
}

pub(crate) fn cmd_pantry_list(svc: &PlannerService, json: bool) -> Result<()> {
    let items = svc.list_pantry_items()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if items.is_empty() {
        println!("Pantry is empty. Try `supper pantry seed` for the basics.");
    } else {
        print_pantry_table(&items);
    }
    Ok(())
}

pub(crate) fn cmd_pantry_edit(
    svc: &PlannerService,
    id: i64,
    name: Option<String>,
    category: Option<String>,
    always_on_hand: Option<bool>,
    json: bool,
) -> Result<()> {
    if name.is_none() && category.is_none() && always_on_hand.is_none() {
        bail!("Nothing to update. Provide at least one of --name, --category, or --always-on-hand");
    }
    let update = UpdatePantryItem {
        name,
        category,
        always_on_hand,
    };
    match svc.update_pantry_item(id, &update) {
        Ok(item) if json => println!("{}", serde_json::to_string_pretty(&item)?),
        Ok(item) => println!("Updated pantry item '{}' (#{})", item.name, item.id),
        Err(Error::NotFound(_)) => exit_not_found(&format!("Pantry item {id} not found"), json),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub(crate) fn cmd_pantry_delete(svc: &PlannerService, id: i64, json: bool) -> Result<()> {
    match svc.delete_pantry_item(id) {
        Ok(()) if json => println!("{}", serde_json::json!({ "deleted": id })),
        Ok(()) => println!("Deleted pantry item {id}"),
        Err(Error::NotFound(_)) => exit_not_found(&format!("Pantry item {id} not found"), json),
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub(crate) fn cmd_pantry_seed(svc: &PlannerService, json: bool) -> Result<()> {
    let changed = svc.seed_default_staples()?;
    if json {
        println!("{}", serde_json::json!({ "changed": changed }));
    } else {
        println!("Pantry staples ready ({changed} added or updated)");
    }
    Ok(())
}
