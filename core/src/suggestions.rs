use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, TimeZone};

use crate::error::Result;
use crate::grocery::pantry_set;
use crate::models::{MealSuggestion, MealTemplate};
use crate::repository::Repository;
use crate::window::compute_window;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 3;

const PANTRY_WEIGHT: usize = 2;

/// Why a meal was suggested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionReason {
    PantryAndOverlap { pantry: usize, overlap: usize },
    Pantry(usize),
    Overlap(usize),
    Variety,
}

impl SuggestionReason {
    #[must_use]
    pub fn from_counts(pantry: usize, overlap: usize) -> Self {
        match (pantry, overlap) {
            (0, 0) => Self::Variety,
            (p, 0) => Self::Pantry(p),
            (0, o) => Self::Overlap(o),
            (p, o) => Self::PantryAndOverlap {
                pantry: p,
                overlap: o,
            },
        }
    }
}

impl fmt::Display for SuggestionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PantryAndOverlap { pantry, overlap } => write!(
                f,
                "Uses {pantry} pantry item(s) and shares {overlap} ingredient(s) with this week's meals"
            ),
            Self::Pantry(n) => write!(f, "Uses {n} pantry item(s) you already have"),
            Self::Overlap(n) => write!(f, "Shares {n} ingredient(s) with this week's meals"),
            Self::Variety => f.write_str("Good for variety"),
        }
    }
}

/// Score each candidate and return the best `limit`. A pantry match is worth
/// twice a shared ingredient.
///
/// Ties keep the candidates' incoming order.
#[must_use]
pub fn score_candidates(
    candidates: Vec<MealTemplate>,
    pantry: &HashSet<String>,
    week_ingredients: &HashSet<String>,
    limit: usize,
) -> Vec<MealSuggestion> {
    let mut scored: Vec<MealSuggestion> = candidates
        .into_iter()
        .map(|meal| {
            let keys: Vec<String> = meal.ingredients.iter().map(|i| i.key()).collect();
            let pantry_match_count = keys.iter().filter(|k| pantry.contains(*k)).count();
            let ingredient_overlap_count =
                keys.iter().filter(|k| week_ingredients.contains(*k)).count();
            let reason =
                SuggestionReason::from_counts(pantry_match_count, ingredient_overlap_count);
            MealSuggestion {
                id: meal.id,
                name: meal.name,
                description: meal.description,
                tags: meal.tags,
                pantry_match_count,
                ingredient_overlap_count,
                score: pantry_match_count * PANTRY_WEIGHT + ingredient_overlap_count,
                reason: reason.to_string(),
            }
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(limit);
    scored
}

/// Suggest up to `limit` meals not already scheduled in the window around `now`.
///
/// Only events linked to a template count as scheduled; title-only matches
/// affect neither the exclusion set nor the week's ingredients.
pub fn suggest<R: Repository, Tz: TimeZone>(
    repo: &R,
    limit: usize,
    now: &DateTime<Tz>,
) -> Result<Vec<MealSuggestion>> {
    let window = compute_window(now);
    let pantry = pantry_set(repo)?;
    let events = repo.find_dinner_events_in_range(window.start, window.end)?;

    let mut week_meal_ids = HashSet::new();
    let mut week_ingredients = HashSet::new();
    for template in events.iter().filter_map(|e| e.meal_template.as_ref()) {
        week_meal_ids.insert(template.id);
        week_ingredients.extend(template.ingredients.iter().map(|i| i.key()));
    }

    let candidates = repo.find_all_meal_templates(&week_meal_ids)?;
    tracing::debug!(
        candidates = candidates.len(),
        scheduled = week_meal_ids.len(),
        week_ingredients = week_ingredients.len(),
        "scoring meal suggestions"
    );

    Ok(score_candidates(candidates, &pantry, &week_ingredients, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{EventSource, Ingredient, NewDinnerEvent, NewMealTemplate, NewPantryItem};
    use chrono::{NaiveDate, Utc};

    fn template(id: i64, ingredients: &[&str]) -> MealTemplate {
        MealTemplate {
            id,
            name: format!("Meal {id}"),
            description: None,
            tags: Vec::new(),
            ingredients: ingredients
                .iter()
                .map(|n| Ingredient::new(*n, "produce"))
                .collect(),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 18, 0, 0).unwrap()
    }

    fn add_template(db: &Database, name: &str, ingredients: &[&str]) -> i64 {
        db.insert_meal_template(&NewMealTemplate {
            name: name.to_string(),
            ingredients: ingredients
                .iter()
                .map(|n| Ingredient::new(*n, "produce"))
                .collect(),
            ..NewMealTemplate::default()
        })
        .unwrap()
        .id
    }

    fn schedule(db: &Database, day: u32, title: &str, template: Option<i64>) {
        db.upsert_dinner_event(
            &NewDinnerEvent {
                date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
                title: title.to_string(),
                notes: None,
                external_id: None,
                source: EventSource::Manual,
            },
            template,
        )
        .unwrap();
    }

    #[test]
    fn test_reason_branches() {
        assert_eq!(
            SuggestionReason::from_counts(2, 1).to_string(),
            "Uses 2 pantry item(s) and shares 1 ingredient(s) with this week's meals"
        );
        assert_eq!(
            SuggestionReason::from_counts(3, 0).to_string(),
            "Uses 3 pantry item(s) you already have"
        );
        assert_eq!(
            SuggestionReason::from_counts(0, 4).to_string(),
            "Shares 4 ingredient(s) with this week's meals"
        );
        assert_eq!(SuggestionReason::from_counts(0, 0), SuggestionReason::Variety);
        assert_eq!(SuggestionReason::Variety.to_string(), "Good for variety");
    }

    #[test]
    fn test_counts_not_mutually_exclusive() {
        let out = score_candidates(
            vec![template(1, &["Garlic", "rice"])],
            &set(&["garlic"]),
            &set(&["garlic", "rice"]),
            3,
        );
        assert_eq!(out[0].pantry_match_count, 1);
        assert_eq!(out[0].ingredient_overlap_count, 2);
        assert_eq!(out[0].score, 4);
    }

    #[test]
    fn test_ties_keep_catalog_order() {
        // scores: 1 -> 2, 2 -> 5, 3 -> 5
        let out = score_candidates(
            vec![
                template(1, &["a"]),
                template(2, &["b", "c", "d"]),
                template(3, &["b", "e", "f"]),
            ],
            &set(&["a", "b"]),
            &set(&["c", "d", "e", "f", "b"]),
            3,
        );
        let ids: Vec<i64> = out.iter().map(|s| s.id).collect();
        let scores: Vec<usize> = out.iter().map(|s| s.score).collect();
        assert_eq!(scores, vec![5, 5, 2]);
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_limit_takes_highest_scores() {
        // scores: 6, 0, 4, 6, 2
        let pantry = set(&["p1", "p2", "p3"]);
        let candidates = vec![
            template(1, &["p1", "p2", "p3"]),
            template(2, &["x"]),
            template(3, &["p1", "p2"]),
            template(4, &["p1", "p2", "p3"]),
            template(5, &["p1"]),
        ];
        let out = score_candidates(candidates, &pantry, &HashSet::new(), 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out.iter().map(|s| s.score).collect::<Vec<_>>(), vec![6, 6, 4]);
        assert_eq!(out.iter().map(|s| s.id).collect::<Vec<_>>(), vec![1, 4, 3]);
    }

    #[test]
    fn test_fewer_candidates_than_limit() {
        let out = score_candidates(vec![template(1, &[])], &HashSet::new(), &HashSet::new(), 3);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].reason, "Good for variety");
        assert!(score_candidates(Vec::new(), &HashSet::new(), &HashSet::new(), 3).is_empty());
    }

    #[test]
    fn test_suggest_excludes_scheduled_meals() {
        let db = Database::open_in_memory().unwrap();
        let tacos = add_template(&db, "Tacos", &["beef", "tortilla", "onion"]);
        let chili = add_template(&db, "Chili", &["beef", "beans", "onion"]);
        let salad = add_template(&db, "Salad", &["lettuce"]);
        schedule(&db, 4, "Tacos", Some(tacos));

        let out = suggest(&db, DEFAULT_SUGGESTION_LIMIT, &now()).unwrap();
        let ids: Vec<i64> = out.iter().map(|s| s.id).collect();
        assert!(!ids.contains(&tacos));
        assert_eq!(ids, vec![chili, salad]);
        assert_eq!(out[0].ingredient_overlap_count, 2);
        assert_eq!(out[0].reason, "Shares 2 ingredient(s) with this week's meals");
    }

    #[test]
    fn test_suggest_ignores_title_only_matches() {
        let db = Database::open_in_memory().unwrap();
        let tacos = add_template(&db, "Tacos", &["beef"]);
        let burgers = add_template(&db, "Burgers", &["beef"]);
        schedule(&db, 4, "tacos", None);

        let out = suggest(&db, 5, &now()).unwrap();
        let ids: Vec<i64> = out.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![tacos, burgers]);
        assert!(out.iter().all(|s| s.ingredient_overlap_count == 0));
    }

    #[test]
    fn test_suggest_weights_pantry_matches() {
        let db = Database::open_in_memory().unwrap();
        let pasta = add_template(&db, "Pasta", &["noodles", "garlic"]);
        let stew = add_template(&db, "Stew", &["carrot", "potato"]);
        let tacos = add_template(&db, "Tacos", &["carrot"]);
        schedule(&db, 5, "Tacos", Some(tacos));
        db.insert_pantry_item(&NewPantryItem {
            name: "garlic".to_string(),
            category: "produce".to_string(),
            always_on_hand: true,
        })
        .unwrap();

        let out = suggest(&db, 3, &now()).unwrap();
        // pasta: 1 pantry * 2 = 2, stew: 1 overlap = 1
        assert_eq!(out.iter().map(|s| s.id).collect::<Vec<_>>(), vec![pasta, stew]);
        assert_eq!(out[0].score, 2);
        assert_eq!(out[0].reason, "Uses 1 pantry item(s) you already have");
        assert_eq!(out[1].score, 1);
    }

    #[test]
    fn test_suggest_zero_limit_and_empty_catalog() {
        let db = Database::open_in_memory().unwrap();
        assert!(suggest(&db, 3, &now()).unwrap().is_empty());
        add_template(&db, "Tacos", &["beef"]);
        assert!(suggest(&db, 0, &now()).unwrap().is_empty());
    }
}
