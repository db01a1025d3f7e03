use crate::error::Result;
use crate::models::{GroceryList, GroceryListItem, NewGroceryListItem};
use crate::repository::Repository;
use crate::window::PlanningWindow;

/// Retire every active list and create a new active one for `window`.
///
/// Both steps run in a single transaction: if creating the new list fails the
/// previously active list stays active.
pub fn activate<R: Repository>(
    repo: &R,
    window: &PlanningWindow,
    items: &[NewGroceryListItem],
) -> Result<GroceryList> {
    let list = repo.with_transaction(|tx| {
        let retired = tx.deactivate_all_grocery_lists()?;
        tracing::debug!(retired, "deactivated previous grocery lists");
        tx.create_grocery_list(window, items)
    })?;
    tracing::info!(
        list_id = list.id,
        items = list.items.len(),
        start = %list.start_date,
        end = %list.end_date,
        "activated grocery list"
    );
    Ok(list)
}

/// The active list, items ordered by category then name.
pub fn get_active<R: Repository>(repo: &R) -> Result<Option<GroceryList>> {
    repo.find_active_grocery_list()
}

/// Flip an item's checked state. `None` when no such item exists.
pub fn toggle<R: Repository>(repo: &R, item_id: i64) -> Result<Option<GroceryListItem>> {
    repo.with_transaction(|tx| {
        let Some(mut item) = tx.find_grocery_list_item(item_id)? else {
            return Ok(None);
        };
        item.is_checked = !item.is_checked;
        tx.update_grocery_list_item_checked(item.id, item.is_checked)?;
        Ok(Some(item))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::error::Error;
    use chrono::NaiveDate;

    fn window(day: u32) -> PlanningWindow {
        PlanningWindow::starting(NaiveDate::from_ymd_opt(2024, 6, day).unwrap())
    }

    fn item(name: &str) -> NewGroceryListItem {
        NewGroceryListItem {
            name: name.to_string(),
            category: "produce".to_string(),
            from_meals: vec!["Salad".to_string()],
        }
    }

    #[test]
    fn test_activate_replaces_previous_list() {
        let db = Database::open_in_memory().unwrap();
        let first = activate(&db, &window(3), &[item("lettuce")]).unwrap();
        let second = activate(&db, &window(4), &[item("tomato")]).unwrap();

        let active = get_active(&db).unwrap().unwrap();
        assert_eq!(active.id, second.id);
        assert_eq!(active.start_date, window(4).start);
        assert!(!db.get_grocery_list(first.id).unwrap().is_active);
        // superseded lists are kept
        assert_eq!(db.get_grocery_list(first.id).unwrap().items.len(), 1);
    }

    #[test]
    fn test_only_latest_list_active_after_many_regenerations() {
        let db = Database::open_in_memory().unwrap();
        let mut last = None;
        for day in 1..=5 {
            last = Some(activate(&db, &window(day), &[]).unwrap().id);
        }
        let lists: Vec<GroceryList> = (1..=5).map(|id| db.get_grocery_list(id).unwrap()).collect();
        let active: Vec<i64> = lists.iter().filter(|l| l.is_active).map(|l| l.id).collect();
        assert_eq!(active, vec![last.unwrap()]);
    }

    #[test]
    fn test_concurrent_activation_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planner.db");
        let handles: Vec<Database> = (0..2).map(|_| Database::open(&path).unwrap()).collect();

        let workers: Vec<_> = handles
            .into_iter()
            .enumerate()
            .map(|(n, db)| {
                std::thread::spawn(move || {
                    for day in 1..=10 {
                        let name = format!("item-{n}-{day}");
                        activate(&db, &window(day), &[item(&name)]).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let conn = rusqlite::Connection::open(&path).unwrap();
        let active: i64 = conn
            .query_row("SELECT COUNT(*) FROM grocery_lists WHERE is_active = 1", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(active, 1);
        let newest: i64 = conn
            .query_row("SELECT MAX(id) FROM grocery_lists", [], |row| row.get(0))
            .unwrap();
        assert_eq!(newest, 20);

        let reader = Database::open(&path).unwrap();
        assert_eq!(get_active(&reader).unwrap().unwrap().id, newest);
    }

    #[test]
    fn test_get_active_none_before_first_activation() {
        let db = Database::open_in_memory().unwrap();
        assert!(get_active(&db).unwrap().is_none());
    }

    #[test]
    fn test_failed_create_keeps_previous_list_active() {
        let db = Database::open_in_memory().unwrap();
        let original = activate(&db, &window(3), &[item("lettuce")]).unwrap();

        let result: Result<GroceryList> = db.with_transaction(|tx| {
            tx.deactivate_all_grocery_lists()?;
            Err(Error::Validation("simulated create failure".to_string()))
        });
        assert!(result.is_err());

        let active = get_active(&db).unwrap().unwrap();
        assert_eq!(active.id, original.id);
    }

    #[test]
    fn test_toggle_twice_restores_state() {
        let db = Database::open_in_memory().unwrap();
        let list = activate(&db, &window(3), &[item("lettuce")]).unwrap();
        let id = list.items[0].id;

        let once = toggle(&db, id).unwrap().unwrap();
        assert!(once.is_checked);
        let twice = toggle(&db, id).unwrap().unwrap();
        assert!(!twice.is_checked);
        assert!(!db.find_grocery_list_item(id).unwrap().unwrap().is_checked);
    }

    #[test]
    fn test_toggle_missing_item() {
        let db = Database::open_in_memory().unwrap();
        assert!(toggle(&db, 404).unwrap().is_none());
    }
}
