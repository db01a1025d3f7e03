use std::collections::HashSet;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{
    DinnerEvent, GroceryList, GroceryListItem, MealTemplate, NewGroceryListItem, PantryItem,
};
use crate::window::PlanningWindow;

/// Storage operations the grocery aggregator, list lifecycle and suggestion
/// scorer depend on.
///
/// `Database` is the production implementation. Every method surfaces storage
/// failures to the caller; none of them swallow errors.
pub trait Repository {
    /// Dinner events dated within `[start, end]`, each carrying its linked
    /// template when it has one. Ordered by date.
    fn find_dinner_events_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DinnerEvent>>;

    fn find_meal_template_by_name(
        &self,
        name: &str,
        case_insensitive: bool,
    ) -> Result<Option<MealTemplate>>;

    /// Every template whose id is not in `excluding`, in catalog order.
    fn find_all_meal_templates(&self, excluding: &HashSet<i64>) -> Result<Vec<MealTemplate>>;

    fn find_pantry_items(&self, always_on_hand: bool) -> Result<Vec<PantryItem>>;

    /// Mark every active list inactive, returning how many were changed.
    fn deactivate_all_grocery_lists(&self) -> Result<usize>;

    /// Persist a new active list for `window` with `items` in the given order.
    fn create_grocery_list(
        &self,
        window: &PlanningWindow,
        items: &[NewGroceryListItem],
    ) -> Result<GroceryList>;

    /// The active list with items ordered by category then name.
    fn find_active_grocery_list(&self) -> Result<Option<GroceryList>>;

    fn find_grocery_list_item(&self, id: i64) -> Result<Option<GroceryListItem>>;

    fn update_grocery_list_item_checked(&self, id: i64, checked: bool) -> Result<()>;

    /// Run `f` as one atomic unit: its writes are committed when it returns
    /// `Ok` and rolled back when it returns `Err`.
    fn with_transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>;
}
