use anyhow::Result;
use chrono::Local;

use supper_core::service::PlannerService;

use super::helpers::print_suggestion_table;

pub(crate) fn cmd_suggest(svc: &PlannerService, limit: usize, json: bool) -> Result<()> {
    let suggestions = svc.get_meal_suggestions(limit, &Local::now())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
    } else if suggestions.is_empty() {
        println!("No suggestions. Add meals with `supper meal add` or `supper meal import`.");
    } else {
        print_suggestion_table(&suggestions);
    }
    Ok(())
}
