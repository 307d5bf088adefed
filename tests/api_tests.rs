use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use aurora_bot::api::{router, ApiState};
use aurora_bot::catalog::{KnowledgeBase, Product};
use aurora_bot::db::Database;

async fn app() -> (Router, Database) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.run_migrations().await.unwrap();
    (router(ApiState::new(db.clone())), db)
}

async fn seeded_app() -> (Router, Database) {
    let (app, db) = app().await;
    let mut omega = Product::new("Омега-3", "Сердце и сосуды", "Рыбий жир для сердца");
    omega.price = Some(1200.0);
    let kb = KnowledgeBase::from_products(vec![
        omega,
        Product::new("Солберри-H", "Иммунитет", "Облепиха для иммунитета"),
        Product::new("Аргент-Макс", "Иммунитет", "Серебро для иммунитета"),
    ]);
    db.import_catalog(&kb).await.unwrap();
    (app, db)
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_and_root() {
    let (app, _) = app().await;
    let (status, body) = call(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (_, body) = call(&app, "GET", "/", None).await;
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn product_crud() {
    let (app, _) = app().await;

    let (status, created) = call(
        &app,
        "POST",
        "/api/v1/products",
        Some(json!({ "name": "Магний B6", "category": "Нервная система", "price": 650.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(created["is_available"].as_bool().unwrap());

    let (status, _) = call(&app, "POST", "/api/v1/products", Some(json!({ "id": id, "name": "Магний B6" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = call(
        &app,
        "PUT",
        &format!("/api/v1/products/{}", id),
        Some(json!({ "price": 700.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 700.0);
    assert_eq!(updated["category"], "Нервная система");

    let (status, body) = call(&app, "DELETE", &format!("/api/v1/products/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (status, body) = call(&app, "GET", &format!("/api/v1/products/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Продукт не найден");
}

#[tokio::test]
async fn product_listing_paginates_and_filters() {
    let (app, _) = seeded_app().await;

    let (status, page) = call(&app, "GET", "/api/v1/products?page=1&size=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 3);
    assert_eq!(page["pages"], 2);
    assert_eq!(page["products"].as_array().unwrap().len(), 2);

    let (_, page) = call(&app, "GET", "/api/v1/products?category=%D0%B8%D0%BC%D0%BC%D1%83%D0%BD", None).await;
    assert_eq!(page["total"], 2);

    let (status, _) = call(&app, "GET", "/api/v1/products?size=500", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        "GET",
        "/api/v1/products?page=9223372036854775807&size=100",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "page is out of range");

    let (status, _) = call(&app, "GET", "/api/v1/users?page=9223372036854775807&size=100", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = call(&app, "GET", "/api/v1/products?page=50&size=100", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(page["products"].as_array().unwrap().is_empty());

    let (_, categories) = call(&app, "GET", "/api/v1/products/categories/list", None).await;
    assert_eq!(categories, json!(["Иммунитет", "Сердце и сосуды"]));
}

#[tokio::test]
async fn search_endpoints() {
    let (app, _) = seeded_app().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/search/query",
        Some(json!({ "query": "иммунитет", "limit": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_found"], 2);
    assert_eq!(body["search_type"], "database_search");

    let (_, body) = call(
        &app,
        "POST",
        "/api/v1/search/query",
        Some(json!({ "query": "омега", "price_max": 1000.0 })),
    )
    .await;
    assert_eq!(body["total_found"], 0);

    let (_, names) = call(&app, "GET", "/api/v1/search/suggestions?query=%D1%81%D0%BE%D0%BB", None).await;
    assert_eq!(names, json!(["Солберри-H"]));

    let (status, _) = call(&app, "GET", "/api/v1/search/suggestions?query=a", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, quick) = call(&app, "GET", "/api/v1/search/quick?q=%D0%BE%D0%BC%D0%B5%D0%B3%D0%B0", None).await;
    assert_eq!(quick.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn user_lifecycle_and_actions() {
    let (app, _) = app().await;

    let (status, user) = call(
        &app,
        "POST",
        "/api/v1/users",
        Some(json!({ "user_id": 42, "username": "anna", "full_name": "Anna" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["user_id"], 42);

    let (status, _) = call(&app, "POST", "/api/v1/users", Some(json!({ "user_id": 42 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for action in ["asked: омега", "asked: омега", "start"] {
        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/users/42/action",
            Some(json!({ "action": action })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (_, stats) = call(&app, "GET", "/api/v1/users/42/stats", None).await;
    assert_eq!(stats["total_queries"], 3);
    assert_eq!(stats["popular_actions"][0]["action"], "asked: омега");
    assert_eq!(stats["popular_actions"][0]["count"], 2);

    let (_, queries) = call(&app, "GET", "/api/v1/analytics/queries/stats", None).await;
    assert_eq!(queries["total_questions"], 2);
    assert_eq!(queries["top_questions"][0]["action"], "омега");

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/users/7/action",
        Some(json!({ "action": "start" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, updated) = call(&app, "PUT", "/api/v1/users/42", Some(json!({ "is_active": false }))).await;
    assert_eq!(updated["is_active"], false);
    assert_eq!(updated["username"], "anna");

    let (status, _) = call(&app, "DELETE", "/api/v1/users/42", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = call(&app, "GET", "/api/v1/users/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Пользователь не найден");
}

#[tokio::test]
async fn analytics_overview() {
    let (app, db) = seeded_app().await;
    db.upsert_user(1, Some("anna"), None).await.unwrap();
    db.upsert_user(2, None, Some("Boris")).await.unwrap();

    let (status, stats) = call(&app, "GET", "/api/v1/analytics/stats?days=7", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["total_users"], 2);
    assert_eq!(stats["total_products"], 3);

    let (_, products) = call(&app, "GET", "/api/v1/analytics/products/stats", None).await;
    assert_eq!(products["category_distribution"]["Иммунитет"], 2);

    let (status, _) = call(&app, "GET", "/api/v1/analytics/stats?days=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
