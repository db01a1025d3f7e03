use anyhow::Result;
use chrono::Local;

use supper_core::service::PlannerService;

use super::helpers::{exit_not_found, print_grocery_list};

pub(crate) fn cmd_grocery_refresh(svc: &PlannerService, json: bool) -> Result<()> {
    let list = svc.regenerate_grocery_list(&Local::now())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        print_grocery_list(&list);
    }
    Ok(())
}

pub(crate) fn cmd_grocery_show(svc: &PlannerService, json: bool) -> Result<()> {
    let active = svc.get_active_grocery_list()?;
    match active {
        Some(list) if json => println!("{}", serde_json::to_string_pretty(&list)?),
        Some(list) => print_grocery_list(&list),
        None if json => println!("{}", serde_json::json!({ "grocery_list": null })),
        None => println!("No active grocery list. Run `supper grocery refresh` to build one."),
    }
    Ok(())
}

pub(crate) fn cmd_grocery_toggle(svc: &PlannerService, item_id: i64, json: bool) -> Result<()> {
    let Some(item) = svc.toggle_grocery_item(item_id)? else {
        exit_not_found(&format!("Item {item_id} not found"), json);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        let state = if item.is_checked { "checked" } else { "unchecked" };
        println!("{} {state}", item.name);
    }
    Ok(())
}
