use anyhow::Result;
use chrono::Local;

use supper_core::models::{EventSource, NewDinnerEvent};
use supper_core::service::PlannerService;

use super::helpers::parse_date;

pub(crate) fn cmd_dinner_set(
    svc: &PlannerService,
    date: String,
    title: String,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(Some(date))?;
    let event = svc.upsert_dinner_event(&NewDinnerEvent {
        date,
        title,
        notes,
        external_id: None,
        source: EventSource::Manual,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&event)?);
    } else {
        match event.meal_template {
            Some(ref meal) => println!("{}: {} (meal #{})", event.date, event.title, meal.id),
            None => println!("{}: {} (no matching meal)", event.date, event.title),
        }
    }
    Ok(())
}

pub(crate) fn cmd_dinner_list(svc: &PlannerService, json: bool) -> Result<()> {
    let schedule = svc.list_dinners(&Local::now())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        return Ok(());
    }

    println!(
        "Dinners for {} to {}",
        schedule.window.start, schedule.window.end
    );
    if schedule.events.is_empty() {
        println!("  Nothing planned");
    }
    for event in &schedule.events {
        let weekday = event.date.format("%a");
        let linked = if event.meal_template.is_some() { "" } else { " *" };
        println!("  {weekday} {}  {}{linked}", event.date, event.title);
        if let Some(ref notes) = event.notes {
            println!("      {notes}");
        }
    }
    if schedule.events.iter().any(|e| e.meal_template.is_none()) {
        println!("\n* not linked to a meal");
    }
    Ok(())
}
