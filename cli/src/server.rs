use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tower_http::limit::RequestBodyLimitLayer;

use supper_core::models::{
    EventSource, GroceryList, Ingredient, NewDinnerEvent, NewMealTemplate, NewPantryItem,
    UpdateMealTemplate, UpdatePantryItem,
};
use supper_core::service::PlannerService;
use supper_core::suggestions::DEFAULT_SUGGESTION_LIMIT;

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

#[derive(Clone)]
struct AppState {
    service: Arc<Mutex<PlannerService>>,
    api_key: Option<String>,
    webhook_secret: Option<String>,
}

impl AppState {
    fn service(&self) -> MutexGuard<'_, PlannerService> {
        self.service
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct CreateMealRequest {
    #[serde(default)]
    name: String,
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    ingredients: Vec<Ingredient>,
}

#[derive(Deserialize)]
#[allow(clippy::option_option)]
struct UpdateMealRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    description: Option<Option<String>>,
    tags: Option<Vec<String>>,
    ingredients: Option<Vec<Ingredient>>,
}

#[derive(Deserialize)]
struct CreatePantryRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: String,
    #[serde(default = "default_true")]
    always_on_hand: bool,
}

#[derive(Deserialize)]
struct UpdatePantryRequest {
    name: Option<String>,
    category: Option<String>,
    always_on_hand: Option<bool>,
}

#[derive(Deserialize)]
struct SuggestionsQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct IngestCalendarRequest {
    secret: Option<String>,
    date: Option<String>,
    title: Option<String>,
    notes: Option<String>,
    external_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// A grocery list with its items also grouped by category.
fn grocery_list_json(list: &GroceryList) -> serde_json::Value {
    json!({
        "id": list.id,
        "start_date": list.start_date,
        "end_date": list.end_date,
        "is_active": list.is_active,
        "created_at": list.created_at,
        "items": list.items,
        "grouped_items": list.grouped_by_category(),
    })
}

// --- Error handling ---

#[derive(Debug)]
enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Unauthorized(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            Self::Internal(err) => {
                tracing::error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<supper_core::Error> for ApiError {
    fn from(err: supper_core::Error) -> Self {
        use supper_core::Error;
        match err {
            Error::NotFound(what) => Self::NotFound(format!("{what} not found")),
            Error::Conflict(msg) => Self::Conflict(msg),
            Error::Validation(msg) => Self::BadRequest(msg),
            other => Self::Internal(other.into()),
        }
    }
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return ApiError::Unauthorized("Invalid or missing API key".to_string())
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Grocery list ---

async fn get_grocery_list(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let active = state.service().get_active_grocery_list()?;
    Ok(Json(match active {
        Some(list) => json!({ "grocery_list": grocery_list_json(&list) }),
        None => json!({
            "grocery_list": null,
            "message": "No active grocery list found",
        }),
    }))
}

async fn refresh_grocery_list(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let list = state.service().regenerate_grocery_list(&Local::now())?;
    Ok(Json(json!({
        "success": true,
        "grocery_list": grocery_list_json(&list),
    })))
}

async fn toggle_grocery_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let item = state
        .service()
        .toggle_grocery_item(id)?
        .ok_or_else(|| ApiError::NotFound("Item not found".to_string()))?;
    Ok(Json(json!({ "item": item })))
}

// --- Suggestions ---

async fn get_suggestions(
    State(state): State<AppState>,
    Query(query): Query<SuggestionsQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT);
    let suggestions = state.service().get_meal_suggestions(limit, &Local::now())?;
    Ok(Json(json!({ "suggestions": suggestions })))
}

// --- Meals ---

async fn list_meals(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let meals = state.service().list_meals()?;
    Ok(Json(json!({ "meals": meals })))
}

async fn create_meal(
    State(state): State<AppState>,
    Json(req): Json<CreateMealRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let meal = state.service().create_meal(&NewMealTemplate {
        name: req.name,
        description: req.description,
        tags: req.tags,
        ingredients: req.ingredients,
    })?;
    Ok((StatusCode::CREATED, Json(json!({ "meal": meal }))))
}

async fn get_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let meal = state.service().get_meal(id)?;
    Ok(Json(json!({ "meal": meal })))
}

async fn update_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateMealRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let update = UpdateMealTemplate {
        name: req.name,
        description: req.description,
        tags: req.tags,
        ingredients: req.ingredients,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one field must be provided".to_string(),
        ));
    }
    let meal = state.service().update_meal(id, &update)?;
    Ok(Json(json!({ "meal": meal })))
}

async fn delete_meal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.service().delete_meal(id)?;
    Ok(Json(json!({ "success": true })))
}

// --- Pantry ---

async fn list_pantry(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let items = state.service().list_pantry_items()?;
    Ok(Json(json!({ "pantry_items": items })))
}

async fn create_pantry_item(
    State(state): State<AppState>,
    Json(req): Json<CreatePantryRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let item = state.service().create_pantry_item(&NewPantryItem {
        name: req.name,
        category: req.category,
        always_on_hand: req.always_on_hand,
    })?;
    Ok((StatusCode::CREATED, Json(json!({ "pantry_item": item }))))
}

async fn update_pantry_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<UpdatePantryRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let item = state.service().update_pantry_item(
        id,
        &UpdatePantryItem {
            name: req.name,
            category: req.category,
            always_on_hand: req.always_on_hand,
        },
    )?;
    Ok(Json(json!({ "pantry_item": item })))
}

async fn delete_pantry_item(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.service().delete_pantry_item(id)?;
    Ok(Json(json!({ "success": true })))
}

// --- Dinners ---

async fn list_dinners(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let schedule = state.service().list_dinners(&Local::now())?;
    Ok(Json(json!({
        "dinners": schedule.events,
        "date_range": schedule.window,
    })))
}

/// Accepts a bare `YYYY-MM-DD` or an RFC 3339 timestamp, which is reduced to
/// its local calendar date.
fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Local).date_naive())
    })
}

async fn ingest_calendar(
    State(state): State<AppState>,
    Json(req): Json<IngestCalendarRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let authorized = match (&state.webhook_secret, &req.secret) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };
    if !authorized {
        return Err(ApiError::Unauthorized("Invalid webhook secret".to_string()));
    }

    let (Some(date), Some(title)) = (req.date.as_deref(), req.title) else {
        return Err(ApiError::BadRequest(
            "Missing required fields: date and title".to_string(),
        ));
    };
    let date = parse_event_date(date)
        .ok_or_else(|| ApiError::BadRequest("Invalid date format".to_string()))?;

    let outcome = state.service().ingest_calendar_event(
        &NewDinnerEvent {
            date,
            title,
            notes: req.notes,
            external_id: req.external_id,
            source: EventSource::Webhook,
        },
        &Local::now(),
    )?;

    Ok(Json(json!({
        "success": true,
        "message": "Dinner event processed",
        "dinner_event": {
            "id": outcome.dinner_event.id,
            "date": outcome.dinner_event.date,
            "title": outcome.dinner_event.title,
            "matched": outcome.matched,
            "matched_meal": outcome.matched_meal,
        },
        "grocery_list_item_count": outcome.grocery_list_item_count,
    })))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/grocery-list", get(get_grocery_list))
        .route("/api/grocery-list/refresh", post(refresh_grocery_list))
        .route("/api/grocery-list/items/{id}", patch(toggle_grocery_item))
        .route("/api/suggestions", get(get_suggestions))
        .route("/api/meals", get(list_meals).post(create_meal))
        .route(
            "/api/meals/{id}",
            get(get_meal).put(update_meal).delete(delete_meal),
        )
        .route("/api/pantry", get(list_pantry).post(create_pantry_item))
        .route(
            "/api/pantry/{id}",
            put(update_pantry_item).delete(delete_pantry_item),
        )
        .route("/api/dinners", get(list_dinners))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // The calendar webhook authenticates with its own shared secret.
    let webhook = Router::new().route("/api/ingest-calendar", post(ingest_calendar));

    api.merge(webhook)
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

pub async fn start_server(
    service: PlannerService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
    webhook_secret: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(Mutex::new(service)),
        api_key: api_key.clone(),
        webhook_secret: webhook_secret.clone(),
    };

    let app = build_router(state.clone());

    if let Some(ref key) = api_key {
        let prefix = key.get(..4).unwrap_or(key);
        let suffix = key.get(key.len().saturating_sub(4)..).unwrap_or_default();
        eprintln!("API key: {prefix}...{suffix} (see api_key file in data directory)");
    } else {
        eprintln!("Warning: Authentication disabled (--no-auth). API is open to anyone.");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        eprintln!(
            "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
        );
    }

    if webhook_secret.is_none() {
        tracing::warn!(
            "SUPPER_WEBHOOK_SECRET is not set; calendar ingest will reject every request"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!("listening on http://{bind}:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Release the database once the server has stopped.
    if let Ok(mutex) = Arc::try_unwrap(state.service) {
        mutex
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .close()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const SECRET: &str = "calendar-secret";

    fn test_state(api_key: Option<String>) -> AppState {
        AppState {
            service: Arc::new(Mutex::new(PlannerService::open_in_memory().unwrap())),
            api_key,
            webhook_secret: Some(SECRET.to_string()),
        }
    }

    fn test_app(api_key: Option<String>) -> Router {
        build_router(test_state(api_key))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn json_request(
        method: &str,
        uri: &str,
        body: &serde_json::Value,
    ) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn today() -> String {
        Local::now().date_naive().format("%Y-%m-%d").to_string()
    }

    fn seed_tacos(state: &AppState) -> i64 {
        state
            .service()
            .create_meal(&NewMealTemplate {
                name: "Tacos".to_string(),
                ingredients: vec![
                    Ingredient::new("beef", "meat"),
                    Ingredient::new("tortilla", "bakery"),
                    Ingredient::new("cheese", "dairy"),
                ],
                ..NewMealTemplate::default()
            })
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn auth_missing_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app.oneshot(get_request("/api/meals")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid or missing API key");
    }

    #[tokio::test]
    async fn auth_wrong_key_returns_401() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/meals")
                    .header("Authorization", "Bearer wrong-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn auth_correct_key_succeeds() {
        let app = test_app(Some("test-key-abc123".to_string()));

        let response = app
            .oneshot(
                axum::http::Request::get("/api/meals")
                    .header("Authorization", "Bearer test-key-abc123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = test_app(Some("secret".to_string()));

        let response = app.oneshot(get_request("/api/meals")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = test_app(None);

        let big_body = vec![0u8; BODY_LIMIT + 1];
        let response = app
            .oneshot(
                axum::http::Request::post("/api/meals")
                    .header("content-type", "application/json")
                    .body(Body::from(big_body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error =
            ApiError::Internal(anyhow::anyhow!("secret database path /home/user/supper.db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal server error");
    }

    #[tokio::test]
    async fn create_meal_returns_201_and_409_on_duplicate() {
        let app = test_app(None);
        let body = json!({
            "name": "Tacos",
            "tags": ["mexican"],
            "ingredients": [{ "name": "beef", "category": "meat" }],
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/meals", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["meal"]["name"], "Tacos");
        assert_eq!(json["meal"]["ingredients"][0]["category"], "meat");

        let dup = json!({ "name": "tacos" });
        let response = app
            .oneshot(json_request("POST", "/api/meals", &dup))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"], "A meal with this name already exists");
    }

    #[tokio::test]
    async fn create_meal_without_name_is_400() {
        let app = test_app(None);
        let response = app
            .oneshot(json_request("POST", "/api/meals", &json!({ "tags": [] })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Name is required");
    }

    #[tokio::test]
    async fn update_and_delete_missing_meal_is_404() {
        let app = test_app(None);
        let response = app
            .clone()
            .oneshot(json_request("PUT", "/api/meals/99", &json!({ "name": "Chili" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .oneshot(
                axum::http::Request::delete("/api/meals/99")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Meal 99 not found");
    }

    #[tokio::test]
    async fn pantry_create_requires_name_and_category() {
        let app = test_app(None);
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/pantry", &json!({ "name": "salt" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(json_request(
                "POST",
                "/api/pantry",
                &json!({ "name": "Salt", "category": "Pantry" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["pantry_item"]["name"], "salt");
        assert_eq!(json["pantry_item"]["always_on_hand"], true);
    }

    #[tokio::test]
    async fn grocery_list_empty_before_refresh() {
        let app = test_app(None);
        let response = app.oneshot(get_request("/api/grocery-list")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert!(json["grocery_list"].is_null());
    }

    #[tokio::test]
    async fn refresh_builds_list_from_todays_dinner() {
        let state = test_state(None);
        let tacos = seed_tacos(&state);
        state
            .service()
            .upsert_dinner_event(&NewDinnerEvent {
                date: Local::now().date_naive(),
                title: "Tacos".to_string(),
                notes: None,
                external_id: None,
                source: EventSource::Manual,
            })
            .unwrap();
        state
            .service()
            .create_pantry_item(&NewPantryItem {
                name: "cheese".to_string(),
                category: "dairy".to_string(),
                always_on_hand: true,
            })
            .unwrap();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::post("/api/grocery-list/refresh")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["grocery_list"]["items"].as_array().unwrap().len(), 2);
        assert_eq!(json["grocery_list"]["grouped_items"]["meat"][0]["name"], "beef");
        assert!(json["grocery_list"]["grouped_items"]["dairy"].is_null());

        let response = app.oneshot(get_request("/api/suggestions")).await.unwrap();
        let json = body_json(response).await;
        let ids: Vec<i64> = json["suggestions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_i64().unwrap())
            .collect();
        assert!(!ids.contains(&tacos));
    }

    #[tokio::test]
    async fn toggle_item_and_missing_item() {
        let state = test_state(None);
        seed_tacos(&state);
        state
            .service()
            .upsert_dinner_event(&NewDinnerEvent {
                date: Local::now().date_naive(),
                title: "tacos".to_string(),
                notes: None,
                external_id: None,
                source: EventSource::Manual,
            })
            .unwrap();
        let list = state
            .service()
            .regenerate_grocery_list(&Local::now())
            .unwrap();
        let item_id = list.items[0].id;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::patch(format!("/api/grocery-list/items/{item_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["item"]["is_checked"], true);

        let response = app
            .oneshot(
                axum::http::Request::patch("/api/grocery-list/items/9999")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Item not found");
    }

    #[tokio::test]
    async fn suggestions_respect_limit() {
        let state = test_state(None);
        for name in ["Chili", "Soup", "Salad"] {
            state
                .service()
                .create_meal(&NewMealTemplate {
                    name: name.to_string(),
                    ..NewMealTemplate::default()
                })
                .unwrap();
        }
        let app = build_router(state);

        let response = app
            .oneshot(get_request("/api/suggestions?limit=2"))
            .await
            .unwrap();
        let json = body_json(response).await;
        let suggestions = json["suggestions"].as_array().unwrap();
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0]["reason"], "Good for variety");
    }

    #[tokio::test]
    async fn ingest_calendar_bypasses_api_key_but_checks_secret() {
        let state = test_state(Some("api-key".to_string()));
        seed_tacos(&state);
        let app = build_router(state);

        let bad = json!({ "secret": "nope", "date": today(), "title": "Tacos" });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/ingest-calendar", &bad))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid webhook secret");

        let good = json!({ "secret": SECRET, "date": today(), "title": " tacos " });
        let response = app
            .oneshot(json_request("POST", "/api/ingest-calendar", &good))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["dinner_event"]["title"], "tacos");
        assert_eq!(json["dinner_event"]["matched"], true);
        assert_eq!(json["dinner_event"]["matched_meal"], "Tacos");
        assert_eq!(json["grocery_list_item_count"], 3);
    }

    #[tokio::test]
    async fn ingest_calendar_missing_fields_is_400() {
        let app = test_app(None);
        let body = json!({ "secret": SECRET, "title": "Tacos" });
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/ingest-calendar", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json!({ "secret": SECRET, "date": "next tuesday", "title": "Tacos" });
        let response = app
            .oneshot(json_request("POST", "/api/ingest-calendar", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid date format");
    }

    #[tokio::test]
    async fn ingest_calendar_without_configured_secret_is_401() {
        let mut state = test_state(None);
        state.webhook_secret = None;
        let app = build_router(state);
        let body = json!({ "secret": "", "date": today(), "title": "Tacos" });
        let response = app
            .oneshot(json_request("POST", "/api/ingest-calendar", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn dinners_lists_current_window() {
        let state = test_state(None);
        state
            .service()
            .upsert_dinner_event(&NewDinnerEvent {
                date: Local::now().date_naive(),
                title: "Leftovers".to_string(),
                notes: Some("clear the fridge".to_string()),
                external_id: None,
                source: EventSource::Manual,
            })
            .unwrap();
        let app = build_router(state);

        let response = app.oneshot(get_request("/api/dinners")).await.unwrap();
        let json = body_json(response).await;
        assert_eq!(json["dinners"].as_array().unwrap().len(), 1);
        assert_eq!(json["dinners"][0]["source"], "manual");
        assert_eq!(json["date_range"]["start"], today());
    }

    #[test]
    fn parse_event_date_accepts_date_and_timestamp() {
        assert_eq!(
            parse_event_date("2024-06-04"),
            NaiveDate::from_ymd_opt(2024, 6, 4)
        );
        assert!(parse_event_date("2024-06-04T12:00:00Z").is_some());
        assert!(parse_event_date("June 4th").is_none());
    }
}
