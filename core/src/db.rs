use std::collections::HashSet;
use std::path::Path;

use chrono::{Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use serde::de::DeserializeOwned;

use crate::error::{Error, Result};
use crate::models::{
    DinnerEvent, EventSource, GroceryList, GroceryListItem, Ingredient, MealTemplate,
    NewDinnerEvent, NewGroceryListItem, NewMealTemplate, NewPantryItem, PantryItem,
    UpdateMealTemplate, UpdatePantryItem,
};
use crate::repository::Repository;
use crate::window::PlanningWindow;

const MEAL_COLUMNS: &str = "id, name, description, tags, ingredients, created_at, updated_at";
const PANTRY_COLUMNS: &str = "id, name, category, always_on_hand, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, list_id, name, category, from_meals, is_checked";

const DUPLICATE_MEAL: &str = "A meal with this name already exists";
const DUPLICATE_PANTRY_ITEM: &str = "A pantry item with this name already exists";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Close the underlying connection, reporting any error from SQLite.
    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| Error::Database(e))
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            tracing::debug!("creating schema version 1");
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS meal_templates (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    name_key TEXT NOT NULL UNIQUE,
                    description TEXT,
                    tags TEXT NOT NULL DEFAULT '[]',
                    ingredients TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS dinner_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    date TEXT NOT NULL UNIQUE,
                    title TEXT NOT NULL,
                    notes TEXT,
                    external_id TEXT,
                    meal_template_id INTEGER REFERENCES meal_templates(id) ON DELETE SET NULL,
                    source TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS pantry_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    category TEXT NOT NULL,
                    always_on_hand INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS grocery_lists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    start_date TEXT NOT NULL,
                    end_date TEXT NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS grocery_list_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    list_id INTEGER NOT NULL REFERENCES grocery_lists(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    category TEXT NOT NULL,
                    from_meals TEXT NOT NULL DEFAULT '[]',
                    is_checked INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_dinner_events_template ON dinner_events(meal_template_id);
                CREATE INDEX IF NOT EXISTS idx_pantry_items_on_hand ON pantry_items(always_on_hand);
                CREATE INDEX IF NOT EXISTS idx_grocery_lists_active ON grocery_lists(is_active);
                CREATE INDEX IF NOT EXISTS idx_grocery_list_items_list ON grocery_list_items(list_id);

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
        let raw: String = row.get(idx)?;
        serde_json::from_str(&raw)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn date_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDate> {
        let raw: String = row.get(idx)?;
        NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn source_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<EventSource> {
        let raw: String = row.get(idx)?;
        raw.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    // Expects MEAL_COLUMNS starting at `offset`.
    fn meal_template_at(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<MealTemplate> {
        Ok(MealTemplate {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            description: row.get(offset + 2)?,
            tags: Self::json_column(row, offset + 3)?,
            ingredients: Self::json_column(row, offset + 4)?,
            created_at: row.get(offset + 5)?,
            updated_at: row.get(offset + 6)?,
        })
    }

    fn meal_template_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealTemplate> {
        Self::meal_template_at(row, 0)
    }

    // Expects columns:
    // 0: de.id, 1: de.date, 2: de.title, 3: de.notes, 4: de.external_id,
    // 5: de.meal_template_id, 6: de.source, 7: de.created_at, 8: de.updated_at,
    // 9..=15: MEAL_COLUMNS of the joined template (all NULL when unlinked)
    fn dinner_event_from_row(row: &rusqlite::Row) -> rusqlite::Result<DinnerEvent> {
        let joined_id: Option<i64> = row.get(9)?;
        let meal_template = match joined_id {
            Some(_) => Some(Self::meal_template_at(row, 9)?),
            None => None,
        };
        Ok(DinnerEvent {
            id: row.get(0)?,
            date: Self::date_column(row, 1)?,
            title: row.get(2)?,
            notes: row.get(3)?,
            external_id: row.get(4)?,
            meal_template_id: row.get(5)?,
            source: Self::source_column(row, 6)?,
            meal_template,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn pantry_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<PantryItem> {
        Ok(PantryItem {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            always_on_hand: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn grocery_item_from_row(row: &rusqlite::Row) -> rusqlite::Result<GroceryListItem> {
        Ok(GroceryListItem {
            id: row.get(0)?,
            list_id: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            from_meals: Self::json_column(row, 4)?,
            is_checked: row.get(5)?,
        })
    }

    // --- Meal templates ---

    pub fn insert_meal_template(&self, meal: &NewMealTemplate) -> Result<MealTemplate> {
        let meal = meal.clone().normalized()?;
        let now = Local::now().to_rfc3339();
        let tags = serde_json::to_string(&meal.tags)?;
        let ingredients = serde_json::to_string(&meal.ingredients)?;
        self.conn
            .execute(
                "INSERT INTO meal_templates (name, name_key, description, tags, ingredients, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    meal.name,
                    meal.name.to_lowercase(),
                    meal.description,
                    tags,
                    ingredients,
                    now,
                    now,
                ],
            )
            .map_err(|e| Error::conflict_on_unique(e, DUPLICATE_MEAL))?;
        let id = self.conn.last_insert_rowid();
        self.get_meal_template(id)
    }

    pub fn get_meal_template(&self, id: i64) -> Result<MealTemplate> {
        self.conn
            .query_row(
                &format!("SELECT {MEAL_COLUMNS} FROM meal_templates WHERE id = ?1"),
                params![id],
                Self::meal_template_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Meal {id}")))
    }

    /// All templates ordered by name, case-insensitively.
    pub fn list_meal_templates(&self) -> Result<Vec<MealTemplate>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEAL_COLUMNS} FROM meal_templates ORDER BY name_key, id"
        ))?;
        let meals = stmt
            .query_map([], Self::meal_template_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(meals)
    }

    pub fn update_meal_template(
        &self,
        id: i64,
        update: &UpdateMealTemplate,
    ) -> Result<MealTemplate> {
        let update = update.clone().normalized()?;
        let existing = self.get_meal_template(id)?;

        let name = update.name.unwrap_or(existing.name);
        let description = update.description.unwrap_or(existing.description);
        let tags: Vec<String> = update.tags.unwrap_or(existing.tags);
        let ingredients: Vec<Ingredient> = update.ingredients.unwrap_or(existing.ingredients);
        let now = Local::now().to_rfc3339();

        self.conn
            .execute(
                "UPDATE meal_templates
                 SET name = ?1, name_key = ?2, description = ?3, tags = ?4, ingredients = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    name,
                    name.to_lowercase(),
                    description,
                    serde_json::to_string(&tags)?,
                    serde_json::to_string(&ingredients)?,
                    now,
                    id,
                ],
            )
            .map_err(|e| Error::conflict_on_unique(e, DUPLICATE_MEAL))?;
        self.get_meal_template(id)
    }

    /// Delete a template. Dinner events linked to it fall back to no template.
    pub fn delete_meal_template(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM meal_templates WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("Meal {id}")));
        }
        Ok(())
    }

    // --- Pantry ---

    pub fn insert_pantry_item(&self, item: &NewPantryItem) -> Result<PantryItem> {
        let item = item.clone().normalized()?;
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO pantry_items (name, category, always_on_hand, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![item.name, item.category, item.always_on_hand, now, now],
            )
            .map_err(|e| Error::conflict_on_unique(e, DUPLICATE_PANTRY_ITEM))?;
        let id = self.conn.last_insert_rowid();
        self.get_pantry_item(id)
    }

    pub fn get_pantry_item(&self, id: i64) -> Result<PantryItem> {
        self.conn
            .query_row(
                &format!("SELECT {PANTRY_COLUMNS} FROM pantry_items WHERE id = ?1"),
                params![id],
                Self::pantry_item_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Pantry item {id}")))
    }

    pub fn find_pantry_item_by_name(&self, name: &str) -> Result<Option<PantryItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {PANTRY_COLUMNS} FROM pantry_items WHERE name = ?1"),
                params![name.trim().to_lowercase()],
                Self::pantry_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    /// All pantry items ordered by category, then name.
    pub fn list_pantry_items(&self) -> Result<Vec<PantryItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PANTRY_COLUMNS} FROM pantry_items ORDER BY category, name"
        ))?;
        let items = stmt
            .query_map([], Self::pantry_item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    pub fn update_pantry_item(&self, id: i64, update: &UpdatePantryItem) -> Result<PantryItem> {
        let update = update.clone().normalized()?;
        let existing = self.get_pantry_item(id)?;
        let now = Local::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE pantry_items SET name = ?1, category = ?2, always_on_hand = ?3, updated_at = ?4
                 WHERE id = ?5",
                params![
                    update.name.unwrap_or(existing.name),
                    update.category.unwrap_or(existing.category),
                    update.always_on_hand.unwrap_or(existing.always_on_hand),
                    now,
                    id,
                ],
            )
            .map_err(|e| Error::conflict_on_unique(e, DUPLICATE_PANTRY_ITEM))?;
        self.get_pantry_item(id)
    }

    pub fn delete_pantry_item(&self, id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM pantry_items WHERE id = ?1", params![id])?;
        if rows == 0 {
            return Err(Error::NotFound(format!("Pantry item {id}")));
        }
        Ok(())
    }

    // --- Dinner events ---

    fn dinner_event_query(filter: &str) -> String {
        format!(
            "SELECT de.id, de.date, de.title, de.notes, de.external_id, de.meal_template_id,
                    de.source, de.created_at, de.updated_at,
                    mt.id, mt.name, mt.description, mt.tags, mt.ingredients, mt.created_at, mt.updated_at
             FROM dinner_events de
             LEFT JOIN meal_templates mt ON mt.id = de.meal_template_id
             {filter}
             ORDER BY de.date"
        )
    }

    /// Create or replace the dinner event on `event.date`.
    pub fn upsert_dinner_event(
        &self,
        event: &NewDinnerEvent,
        meal_template_id: Option<i64>,
    ) -> Result<DinnerEvent> {
        let event = event.clone().normalized()?;
        let now = Local::now().to_rfc3339();
        let date_str = event.date.format("%Y-%m-%d").to_string();
        self.conn.execute(
            "INSERT INTO dinner_events (date, title, notes, external_id, meal_template_id, source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(date) DO UPDATE SET
                title = excluded.title,
                notes = excluded.notes,
                external_id = excluded.external_id,
                meal_template_id = excluded.meal_template_id,
                source = excluded.source,
                updated_at = excluded.updated_at",
            params![
                date_str,
                event.title,
                event.notes,
                event.external_id,
                meal_template_id,
                event.source.as_str(),
                now,
                now,
            ],
        )?;
        self.get_dinner_event(event.date)?
            .ok_or_else(|| Error::NotFound(format!("Dinner event on {date_str}")))
    }

    pub fn get_dinner_event(&self, date: NaiveDate) -> Result<Option<DinnerEvent>> {
        let date_str = date.format("%Y-%m-%d").to_string();
        let event = self
            .conn
            .query_row(
                &Self::dinner_event_query("WHERE de.date = ?1"),
                params![date_str],
                Self::dinner_event_from_row,
            )
            .optional()?;
        Ok(event)
    }

    // --- Grocery lists ---

    // Loads the list row only; `items` is left empty for the caller to fill.
    fn grocery_list_row<P: rusqlite::Params>(
        &self,
        where_clause: &str,
        params: P,
    ) -> Result<Option<GroceryList>> {
        let list = self
            .conn
            .query_row(
                &format!(
                    "SELECT id, start_date, end_date, is_active, created_at FROM grocery_lists
                     {where_clause} ORDER BY id DESC LIMIT 1"
                ),
                params,
                |row| {
                    Ok(GroceryList {
                        id: row.get(0)?,
                        start_date: Self::date_column(row, 1)?,
                        end_date: Self::date_column(row, 2)?,
                        is_active: row.get(3)?,
                        created_at: row.get(4)?,
                        items: Vec::new(),
                    })
                },
            )
            .optional()?;
        Ok(list)
    }

    fn grocery_items(&self, list_id: i64, order_by: &str) -> Result<Vec<GroceryListItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM grocery_list_items WHERE list_id = ?1 ORDER BY {order_by}"
        ))?;
        let items = stmt
            .query_map(params![list_id], Self::grocery_item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// A list with its items in generation order.
    pub fn get_grocery_list(&self, id: i64) -> Result<GroceryList> {
        let mut list = self
            .grocery_list_row("WHERE id = ?1", params![id])?
            .ok_or_else(|| Error::NotFound(format!("Grocery list {id}")))?;
        list.items = self.grocery_items(list.id, "position, id")?;
        Ok(list)
    }
}

impl Repository for Database {
    fn find_dinner_events_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DinnerEvent>> {
        let mut stmt = self
            .conn
            .prepare(&Self::dinner_event_query("WHERE de.date BETWEEN ?1 AND ?2"))?;
        let events = stmt
            .query_map(
                params![
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string()
                ],
                Self::dinner_event_from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(events)
    }

    fn find_meal_template_by_name(
        &self,
        name: &str,
        case_insensitive: bool,
    ) -> Result<Option<MealTemplate>> {
        let (column, value) = if case_insensitive {
            ("name_key", name.to_lowercase())
        } else {
            ("name", name.to_string())
        };
        let meal = self
            .conn
            .query_row(
                &format!("SELECT {MEAL_COLUMNS} FROM meal_templates WHERE {column} = ?1"),
                params![value],
                Self::meal_template_from_row,
            )
            .optional()?;
        Ok(meal)
    }

    fn find_all_meal_templates(&self, excluding: &HashSet<i64>) -> Result<Vec<MealTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {MEAL_COLUMNS} FROM meal_templates ORDER BY id"))?;
        let meals = stmt
            .query_map([], Self::meal_template_from_row)?
            .filter(|meal| meal.as_ref().map_or(true, |m| !excluding.contains(&m.id)))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(meals)
    }

    fn find_pantry_items(&self, always_on_hand: bool) -> Result<Vec<PantryItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {PANTRY_COLUMNS} FROM pantry_items WHERE always_on_hand = ?1 ORDER BY id"
        ))?;
        let items = stmt
            .query_map(params![always_on_hand], Self::pantry_item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn deactivate_all_grocery_lists(&self) -> Result<usize> {
        let rows = self
            .conn
            .execute("UPDATE grocery_lists SET is_active = 0 WHERE is_active = 1", [])?;
        Ok(rows)
    }

    fn create_grocery_list(
        &self,
        window: &PlanningWindow,
        items: &[NewGroceryListItem],
    ) -> Result<GroceryList> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO grocery_lists (start_date, end_date, is_active, created_at)
             VALUES (?1, ?2, 1, ?3)",
            params![
                window.start.format("%Y-%m-%d").to_string(),
                window.end.format("%Y-%m-%d").to_string(),
                now,
            ],
        )?;
        let list_id = self.conn.last_insert_rowid();

        let mut stmt = self.conn.prepare(
            "INSERT INTO grocery_list_items (list_id, position, name, category, from_meals, is_checked)
             VALUES (?1, ?2, ?3, ?4, ?5, 0)",
        )?;
        for (position, item) in items.iter().enumerate() {
            stmt.execute(params![
                list_id,
                position as i64,
                item.name,
                item.category,
                serde_json::to_string(&item.from_meals)?,
            ])?;
        }

        self.get_grocery_list(list_id)
    }

    fn find_active_grocery_list(&self) -> Result<Option<GroceryList>> {
        let Some(mut list) = self.grocery_list_row("WHERE is_active = 1", [])? else {
            return Ok(None);
        };
        list.items = self.grocery_items(list.id, "category, name, id")?;
        Ok(Some(list))
    }

    fn find_grocery_list_item(&self, id: i64) -> Result<Option<GroceryListItem>> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM grocery_list_items WHERE id = ?1"),
                params![id],
                Self::grocery_item_from_row,
            )
            .optional()?;
        Ok(item)
    }

    fn update_grocery_list_item_checked(&self, id: i64, checked: bool) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE grocery_list_items SET is_checked = ?1 WHERE id = ?2",
            params![checked, id],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(format!("Grocery item {id}")));
        }
        Ok(())
    }

    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        // IMMEDIATE takes the write lock up front, so another connection waits
        // out the busy timeout instead of failing halfway. Dropping the
        // transaction without committing rolls it back.
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(self)?;
        tx.commit()?;
        Ok(value)
    }
}
