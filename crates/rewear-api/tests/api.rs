//! End-to-end tests over the served application with an in-memory database.
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use tower_http::normalize_path::NormalizePath;
use uuid::Uuid;

use rewear_api::auth::{AppStateInner, create_token};
use rewear_db::Database;

type App = NormalizePath<Router>;

const SECRET: &str = "test-secret";

fn uploads_dir() -> PathBuf {
    std::env::temp_dir().join(format!("rewear-test-{}", Uuid::new_v4()))
}

fn app() -> App {
    let db = Database::open_in_memory().unwrap();
    rewear_api::app(Arc::new(AppStateInner {
        db,
        jwt_secret: SECRET.into(),
        uploads_dir: uploads_dir(),
    }))
}

/// Sends a raw body and returns status, headers and the body bytes.
async fn call_raw(
    app: &App,
    method: Method,
    uri: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    body: Vec<u8>,
) -> (StatusCode, HeaderMap, Bytes) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let res = app.clone().oneshot(builder.body(Body::from(body)).unwrap()).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes)
}

async fn call(app: &App, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, value)
}

/// Registers a user and returns (user id, token).
async fn register(app: &App, username: &str) -> (String, String) {
    let (status, body) = call(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": "correct horse battery",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["user"]["id"].as_str().unwrap().to_string(),
        body["token"].as_str().unwrap().to_string(),
    )
}

async fn create_listing(app: &App, token: &str, body: Value) -> Value {
    let (status, listing) = call(app, Method::POST, "/listings", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{listing}");
    listing
}

#[tokio::test]
async fn register_then_login() {
    let app = app();
    let (user_id, _) = register(&app, "alice").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], user_id);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["token"].as_str().is_some());

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid credentials.");
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let app = app();
    register(&app, "alice").await;
    let (status, _) = call(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "username": "alice", "email": "a@b.c", "password": "another password" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn owner_routes_require_token() {
    let app = app();
    let (status, _) = call(&app, Method::GET, "/listings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Method::GET, "/inbox", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app, Method::GET, "/public-listings", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn registration_creates_wardrobe() {
    let app = app();
    let (user_id, token) = register(&app, "alice").await;

    let (status, body) = call(&app, Method::GET, "/wardrobes", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let wardrobes = body.as_array().unwrap();
    assert_eq!(wardrobes.len(), 1);
    assert_eq!(wardrobes[0]["user_id"], user_id);

    let (status, body) = call(&app, Method::POST, "/wardrobes", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], wardrobes[0]["id"]);
}

#[tokio::test]
async fn listing_gets_computed_eco_impact_and_location() {
    let app = app();
    let (user_id, token) = register(&app, "alice").await;

    let listing = create_listing(
        &app,
        &token,
        json!({
            "title": "Fleece jacket",
            "description": "Barely worn",
            "condition": "new",
            "category": "synthetic",
            "location": "12.34,56.78",
        }),
    )
    .await;
    assert_eq!(listing["eco_impact"], 9.0);
    assert_eq!(listing["location"], "12.34,56.78");
    assert_eq!(listing["owner_id"], user_id);
    assert_eq!(listing["owner_username"], "alice");
    assert_eq!(listing["is_public"], true);

    let listing = create_listing(
        &app,
        &token,
        json!({ "title": "Tee", "condition": "fair", "category": "cotton", "eco_impact": 0.0 }),
    )
    .await;
    assert_eq!(listing["eco_impact"], 0.0);
    assert_eq!(listing["location"], Value::Null);

    let (_, mine) = call(&app, Method::GET, "/listings", Some(&token), None).await;
    assert_eq!(mine.as_array().unwrap().len(), 2);
    assert_eq!(mine[0]["title"], "Tee");
}

#[tokio::test]
async fn listing_validation_errors_are_field_level() {
    let app = app();
    let (_, token) = register(&app, "alice").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/listings",
        Some(&token),
        Some(json!({ "title": "  ", "condition": "good" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "title");

    let (status, _) = call(
        &app,
        Method::POST,
        "/listings",
        Some(&token),
        Some(json!({ "title": "Shirt", "condition": "tattered" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        &app,
        Method::POST,
        "/listings",
        Some(&token),
        Some(json!({ "title": "Shirt", "condition": "good", "location": "200,10" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::POST,
        "/listings",
        Some(&token),
        Some(json!({ "title": "Shirt", "condition": "good", "eco_impact": -2.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "eco_impact");
}

#[tokio::test]
async fn public_feed_hides_private_listings() {
    let app = app();
    let (_, token) = register(&app, "alice").await;
    create_listing(&app, &token, json!({ "title": "Shown", "condition": "good" })).await;
    create_listing(&app, &token, json!({ "title": "Hidden", "condition": "good", "is_public": false })).await;

    let (status, body) = call(&app, Method::GET, "/public-listings", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body.as_array().unwrap().iter().map(|l| l["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Shown"]);
}

#[tokio::test]
async fn nearby_listings_filter_and_sort() {
    let app = app();
    let (_, token) = register(&app, "alice").await;
    // Minneapolis origin: lon -93.27, lat 44.98
    create_listing(&app, &token, json!({ "title": "St Paul", "condition": "good", "location": "-93.09,44.95" })).await;
    create_listing(&app, &token, json!({ "title": "Downtown", "condition": "good", "location": "-93.265,44.978" })).await;
    create_listing(
        &app,
        &token,
        json!({ "title": "Private", "condition": "good", "location": "-93.27,44.98", "is_public": false }),
    )
    .await;
    create_listing(&app, &token, json!({ "title": "Duluth", "condition": "good", "location": "-92.10,46.79" })).await;

    // Default radius is 10 km.
    let (status, body) = call(&app, Method::GET, "/nearby-listings?lat=44.98&lon=-93.27", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body.as_array().unwrap().iter().map(|l| l["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Downtown"]);

    let (_, body) = call(
        &app,
        Method::GET,
        "/nearby-listings?lat=44.98&lon=-93.27&radius=25",
        Some(&token),
        None,
    )
    .await;
    let results = body.as_array().unwrap();
    let titles: Vec<&str> = results.iter().map(|l| l["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Downtown", "St Paul"]);
    let distances: Vec<f64> = results.iter().map(|l| l["distance_km"].as_f64().unwrap()).collect();
    assert!(distances[0] <= distances[1]);
    assert!(distances.iter().all(|d| *d <= 25.0));
}

#[tokio::test]
async fn nearby_without_origin_is_empty_and_bad_input_is_rejected() {
    let app = app();
    let (_, token) = register(&app, "alice").await;
    create_listing(&app, &token, json!({ "title": "Here", "condition": "good", "location": "0,0" })).await;

    let (status, body) = call(&app, Method::GET, "/nearby-listings", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = call(&app, Method::GET, "/nearby-listings?lat=abc&lon=0", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "lat");

    let (status, body) = call(&app, Method::GET, "/nearby-listings?lat=0&lon=0&radius=-1", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "radius");
}

#[tokio::test]
async fn messaging_flow() {
    let app = app();
    let (alice_id, alice) = register(&app, "alice").await;
    let (bob_id, bob) = register(&app, "bob").await;
    let listing = create_listing(&app, &alice, json!({ "title": "Wool coat", "condition": "like_new" })).await;
    let listing_id = listing["id"].as_str().unwrap();

    // Owners can't message themselves.
    let (status, _) = call(
        &app,
        Method::POST,
        "/messages",
        Some(&alice),
        Some(json!({ "listing": listing_id, "content": "note to self" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, message) = call(
        &app,
        Method::POST,
        "/messages",
        Some(&bob),
        Some(json!({ "listing": listing_id, "content": "Is this still available?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{message}");
    assert_eq!(message["receiver_id"], alice_id);
    assert_eq!(message["sender_id"], bob_id);
    assert_eq!(message["is_read"], false);
    assert_eq!(message["listing"]["title"], "Wool coat");

    let (_, inbox) = call(&app, Method::GET, "/inbox", Some(&alice), None).await;
    assert_eq!(inbox.as_array().unwrap().len(), 1);
    let (_, bob_inbox) = call(&app, Method::GET, "/inbox", Some(&bob), None).await;
    assert_eq!(bob_inbox, json!([]));

    // Both sides see the thread.
    let (_, threads) = call(&app, Method::GET, "/messages", Some(&bob), None).await;
    assert_eq!(threads.as_array().unwrap().len(), 1);

    let uri = format!("/messages/{}", message["id"].as_str().unwrap());
    let (status, _) = call(&app, Method::PATCH, &uri, Some(&bob), Some(json!({ "is_read": true }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = call(&app, Method::PATCH, &uri, Some(&alice), Some(json!({ "is_read": true }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["is_read"], true);

    let (_, inbox) = call(&app, Method::GET, "/inbox", Some(&alice), None).await;
    assert_eq!(inbox, json!([]));
}

#[tokio::test]
async fn message_requires_existing_listing_and_content() {
    let app = app();
    let (_, bob) = register(&app, "bob").await;

    let (status, _) = call(
        &app,
        Method::POST,
        "/messages",
        Some(&bob),
        Some(json!({ "listing": "00000000-0000-0000-0000-000000000000", "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        Method::POST,
        "/messages",
        Some(&bob),
        Some(json!({ "listing": "00000000-0000-0000-0000-000000000000", "content": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["field"], "content");
}

#[tokio::test]
async fn user_location_roundtrip() {
    let app = app();
    let (user_id, token) = register(&app, "alice").await;

    let (status, _) = call(&app, Method::GET, "/user-location", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(
        &app,
        Method::POST,
        "/user-location",
        Some(&token),
        Some(json!({ "location": "1,2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(
        &app,
        Method::POST,
        "/user-location",
        Some(&token),
        Some(json!({ "location": "12.34,56.78" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user_id);

    let (status, body) = call(&app, Method::GET, "/user-location", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["location"], "12.34,56.78");

    let (status, _) = call(
        &app,
        Method::POST,
        "/user-location",
        Some(&token),
        Some(json!({ "location": "not a point" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn trailing_slash_paths_are_accepted() {
    let app = app();
    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/register/",
        None,
        Some(json!({ "username": "alice", "email": "alice@example.com", "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        Method::POST,
        "/listings/",
        Some(&token),
        Some(json!({ "title": "Scarf", "condition": "good" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = call(&app, Method::GET, "/listings/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, body) = call(&app, Method::GET, "/public-listings/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "Scarf");
}

#[tokio::test]
async fn token_for_missing_user_is_unauthorized() {
    let app = app();
    let token = create_token(SECRET, Uuid::new_v4(), "ghost").unwrap();

    let (status, _) = call(
        &app,
        Method::POST,
        "/listings",
        Some(&token),
        Some(json!({ "title": "Coat", "condition": "good" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(
        &app,
        Method::POST,
        "/user-location",
        Some(&token),
        Some(json!({ "location": "1,2" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_trims_username_like_register() {
    let app = app();
    register(&app, " bob ").await;

    let (status, body) = call(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": " bob ", "password": "correct horse battery" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["username"], "bob");
}

#[tokio::test]
async fn listing_image_upload_and_download() {
    let app = app();
    let (_, alice) = register(&app, "alice").await;
    let (_, bob) = register(&app, "bob").await;
    let listing = create_listing(&app, &alice, json!({ "title": "Wool coat", "condition": "good" })).await;
    assert_eq!(listing["image"], Value::Null);
    let uri = format!("/listings/{}/image", listing["id"].as_str().unwrap());
    let png = b"\x89PNG\r\n\x1a\nnot really a png".to_vec();

    let (status, _, _) = call_raw(&app, Method::PUT, &uri, Some(&bob), Some("image/png"), png.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = call_raw(&app, Method::PUT, &uri, Some(&alice), Some("text/plain"), png.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = call_raw(&app, Method::PUT, &uri, Some(&alice), Some("image/png"), vec![]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = call_raw(&app, Method::PUT, &uri, None, Some("image/png"), png.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, body) = call_raw(&app, Method::PUT, &uri, Some(&alice), Some("image/png"), png.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let updated: Value = serde_json::from_slice(&body).unwrap();
    let image_url = updated["image"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/media/listings/") && image_url.ends_with(".png"), "{image_url}");

    // The public feed carries the image URL, and the file is served without a token.
    let (_, feed) = call(&app, Method::GET, "/public-listings", None, None).await;
    assert_eq!(feed[0]["image"], image_url.as_str());

    let (status, headers, body) = call_raw(&app, Method::GET, &image_url, None, None, vec![]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(body.as_ref(), png.as_slice());

    // Replacing the photo removes the old file.
    let jpeg = b"\xff\xd8\xff not really a jpeg".to_vec();
    let (status, _, body) = call_raw(&app, Method::PUT, &uri, Some(&alice), Some("image/jpeg"), jpeg).await;
    assert_eq!(status, StatusCode::OK);
    let replaced: Value = serde_json::from_slice(&body).unwrap();
    assert!(replaced["image"].as_str().unwrap().ends_with(".jpg"));
    let (status, _, _) = call_raw(&app, Method::GET, &image_url, None, None, vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = call_raw(&app, Method::GET, "/media/listings/..%2Frewear.db", None, None, vec![]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn listing_image_upload_is_size_capped() {
    let app = app();
    let (_, alice) = register(&app, "alice").await;
    let listing = create_listing(&app, &alice, json!({ "title": "Boots", "condition": "fair" })).await;
    let uri = format!("/listings/{}/image", listing["id"].as_str().unwrap());

    let too_big = vec![0u8; rewear_api::images::MAX_IMAGE_BYTES + 1];
    let (status, _, _) = call_raw(&app, Method::PUT, &uri, Some(&alice), Some("image/jpeg"), too_big).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

    let (status, _, _) = call_raw(
        &app,
        Method::PUT,
        &format!("/listings/{}/image", Uuid::new_v4()),
        Some(&alice),
        Some("image/jpeg"),
        vec![1, 2, 3],
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
