use std::path::Path;

use chrono::{DateTime, TimeZone};

use crate::db::Database;
use crate::error::Result;
use crate::meal_import::{self, MealImportSummary};
use crate::models::{
    CalendarIngest, DinnerEvent, DinnerSchedule, EventSource, GroceryList, GroceryListItem,
    MealSuggestion, MealTemplate, NewDinnerEvent, NewMealTemplate, NewPantryItem, PantryItem,
    UpdateMealTemplate, UpdatePantryItem,
};
use crate::repository::Repository;
use crate::window::compute_window;
use crate::{grocery, lifecycle, suggestions};

/// Entry point for the CLI and the HTTP server.
///
/// Owns the database handle for its whole lifetime; call [`PlannerService::close`]
/// at shutdown to release it.
pub struct PlannerService {
    db: Database,
}

impl PlannerService {
    pub fn open(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self { db })
    }

    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { db })
    }

    pub fn close(self) -> Result<()> {
        self.db.close()
    }

    // --- Grocery list ---

    pub fn regenerate_grocery_list<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<GroceryList> {
        grocery::regenerate(&self.db, now)
    }

    pub fn get_active_grocery_list(&self) -> Result<Option<GroceryList>> {
        lifecycle::get_active(&self.db)
    }

    pub fn toggle_grocery_item(&self, item_id: i64) -> Result<Option<GroceryListItem>> {
        lifecycle::toggle(&self.db, item_id)
    }

    // --- Suggestions ---

    pub fn get_meal_suggestions<Tz: TimeZone>(
        &self,
        limit: usize,
        now: &DateTime<Tz>,
    ) -> Result<Vec<MealSuggestion>> {
        suggestions::suggest(&self.db, limit, now)
    }

    // --- Meal catalog ---

    pub fn create_meal(&self, meal: &NewMealTemplate) -> Result<MealTemplate> {
        self.db.insert_meal_template(meal)
    }

    pub fn list_meals(&self) -> Result<Vec<MealTemplate>> {
        self.db.list_meal_templates()
    }

    pub fn get_meal(&self, id: i64) -> Result<MealTemplate> {
        self.db.get_meal_template(id)
    }

    pub fn find_meal_by_name(&self, name: &str) -> Result<Option<MealTemplate>> {
        self.db.find_meal_template_by_name(name.trim(), true)
    }

    pub fn update_meal(&self, id: i64, update: &UpdateMealTemplate) -> Result<MealTemplate> {
        self.db.update_meal_template(id, update)
    }

    pub fn delete_meal(&self, id: i64) -> Result<()> {
        self.db.delete_meal_template(id)
    }

    pub fn import_meals_csv(
        &self,
        path: &Path,
        dry_run: bool,
    ) -> anyhow::Result<MealImportSummary> {
        use anyhow::Context;
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let rows = meal_import::parse_meal_csv(file)?;
        meal_import::import_meals(&self.db, &rows, dry_run)
    }

    // --- Pantry ---

    pub fn create_pantry_item(&self, item: &NewPantryItem) -> Result<PantryItem> {
        self.db.insert_pantry_item(item)
    }

    pub fn list_pantry_items(&self) -> Result<Vec<PantryItem>> {
        self.db.list_pantry_items()
    }

    pub fn update_pantry_item(&self, id: i64, update: &UpdatePantryItem) -> Result<PantryItem> {
        self.db.update_pantry_item(id, update)
    }

    pub fn delete_pantry_item(&self, id: i64) -> Result<()> {
        self.db.delete_pantry_item(id)
    }

    pub fn seed_default_staples(&self) -> anyhow::Result<usize> {
        meal_import::seed_default_staples(&self.db)
    }

    // --- Dinner events ---

    /// Record the dinner for `event.date`, replacing any existing one. The
    /// template is linked when the title names one (case-insensitively).
    pub fn upsert_dinner_event(&self, event: &NewDinnerEvent) -> Result<DinnerEvent> {
        let event = event.clone().normalized()?;
        let template = self.db.find_meal_template_by_name(&event.title, true)?;
        self.db
            .upsert_dinner_event(&event, template.map(|t| t.id))
    }

    /// Store a dinner pushed from the family calendar, then rebuild the
    /// grocery list so it reflects the change.
    pub fn ingest_calendar_event<Tz: TimeZone>(
        &self,
        event: &NewDinnerEvent,
        now: &DateTime<Tz>,
    ) -> Result<CalendarIngest> {
        let event = NewDinnerEvent {
            source: EventSource::Webhook,
            ..event.clone()
        };
        let dinner_event = self.upsert_dinner_event(&event)?;
        let list = self.regenerate_grocery_list(now)?;

        let matched_meal = dinner_event.meal_template.as_ref().map(|t| t.name.clone());
        tracing::info!(
            date = %dinner_event.date,
            title = %dinner_event.title,
            matched = matched_meal.is_some(),
            in_window = compute_window(now).contains(dinner_event.date),
            "ingested calendar event"
        );

        Ok(CalendarIngest {
            matched: matched_meal.is_some(),
            matched_meal,
            grocery_list_item_count: list.items.len(),
            dinner_event,
        })
    }

    pub fn list_dinners<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DinnerSchedule> {
        let window = compute_window(now);
        let events = self
            .db
            .find_dinner_events_in_range(window.start, window.end)?;
        Ok(DinnerSchedule { window, events })
    }
}
