mod dinner;
mod grocery;
mod helpers;
mod meal;
mod pantry;
mod suggest;

pub(crate) use dinner::{cmd_dinner_list, cmd_dinner_set};
pub(crate) use grocery::{cmd_grocery_refresh, cmd_grocery_show, cmd_grocery_toggle};
pub(crate) use meal::{
    cmd_meal_add, cmd_meal_delete, cmd_meal_edit, cmd_meal_import, cmd_meal_list, cmd_meal_show,
};
pub(crate) use pantry::{
    cmd_pantry_add, cmd_pantry_delete, cmd_pantry_edit, cmd_pantry_list, cmd_pantry_seed,
};
pub(crate) use suggest::cmd_suggest;
