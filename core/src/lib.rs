pub mod db;
pub mod error;
pub mod grocery;
pub mod lifecycle;
pub mod meal_import;
pub mod models;
pub mod repository;
pub mod service;
pub mod suggestions;
pub mod window;

pub use error::{Error, Result};
