//! API integration tests
//!
//! Require a running server whose bootstrap super user is admin/admin123
//! (LIBRIS_AUTH__ADMIN_USERNAME, LIBRIS_AUTH__ADMIN_PASSWORD) on a freshly
//! seeded database.

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

async fn sign_in(client: &Client, username: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/auth/sign-in", BASE_URL))
        .json(&json!({
            "username": username,
            "password": password
        }))
        .send()
        .await
        .expect("Failed to send sign-in request");

    let body: Value = response.json().await.expect("Failed to parse sign-in response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Helper to get a super user token
async fn get_auth_token(client: &Client) -> String {
    sign_in(client, "admin", "admin123").await
}

/// Register a fresh normal user and return (id, token)
async fn new_reader(client: &Client) -> (i64, String) {
    let username = format!("reader{}", chrono::Utc::now().timestamp_micros());

    let response = client
        .post(format!("{}/auth/sign-up", BASE_URL))
        .json(&json!({
            "username": username,
            "email": format!("{}@libris.local", username),
            "password": "secret123"
        }))
        .send()
        .await
        .expect("Failed to send sign-up request");

    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["role"], "NORMAL_USER");
    let id = body["id"].as_i64().expect("No user ID");

    (id, sign_in(client, &username, "secret123").await)
}

async fn book_available(client: &Client, token: &str, book_id: i64) -> i64 {
    let response = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    let body: Value = response.json().await.expect("Failed to parse response");
    body["available"].as_i64().expect("No available count")
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_sign_in() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/sign-in", BASE_URL))
        .json(&json!({
            "username": "admin",
            "password": "admin123"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["token"].is_string());
    assert_eq!(body["tokenType"], "Bearer");
    assert!(body["expiresIn"].is_number());
}

#[tokio::test]
#[ignore]
async fn test_sign_in_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/sign-in", BASE_URL))
        .json(&json!({
            "username": "admin",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_get_current_user() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/auth/me", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["username"], "admin");
    assert_eq!(body["role"], "SUPER_USER");
}

#[tokio::test]
#[ignore]
async fn test_list_books() {
    let client = Client::new();
    let token = get_auth_token(&client).await;

    let response = client
        .get(format!("{}/books?categoryId=3&pageSize=2", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["items"].as_array().map(Vec::len), Some(2));
    assert!(body["totalCount"].as_i64().unwrap_or(0) >= 5);
    assert_eq!(body["items"][0]["category"], "Science Fiction");
}

#[tokio::test]
#[ignore]
async fn test_create_and_delete_book() {
    let client = Client::new();
    let token = get_auth_token(&client).await;
    let isbn = format!("979-{}", chrono::Utc::now().timestamp_micros());

    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "title": "Test Book",
            "author": "Test Author",
            "isbn": isbn,
            "publicationDate": "2020-01-01",
            "quantity": 3,
            "categoryId": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 201);

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["available"], 3);
    let book_id = body["id"].as_i64().expect("No book ID");

    // Same ISBN again
    let response = client
        .post(format!("{}/books", BASE_URL))
        .header("Authorization", format!("Bearer {}", token))
        .json(&json!({
            "title": "Copy",
            "author": "Test Author",
            "isbn": isbn,
            "publicationDate": "2020-01-01",
            "quantity": 1,
            "categoryId": 1
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);

    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 204);
}

#[tokio::test]
#[ignore]
async fn test_submit_and_reject_borrowing_request() {
    let client = Client::new();
    let admin = get_auth_token(&client).await;
    let (reader_id, reader) = new_reader(&client).await;
    let before = book_available(&client, &admin, 11).await;

    let response = client
        .post(format!("{}/borrowing-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", reader))
        .json(&json!({ "requestDetails": [{ "bookId": 11 }] }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    let request_id = body["id"].as_i64().expect("No request ID");
    assert_eq!(book_available(&client, &admin, 11).await, before - 1);

    let response = client
        .get(format!(
            "{}/borrowing-requests/month-request?requestorId={}",
            BASE_URL, reader_id
        ))
        .header("Authorization", format!("Bearer {}", reader))
        .send()
        .await
        .expect("Failed to send request");

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["count"], 1);
    assert_eq!(body["limit"], 3);

    let response = client
        .put(format!(
            "{}/borrowing-requests/{}/update-status",
            BASE_URL, request_id
        ))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({ "status": "Rejected" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 204);
    assert_eq!(book_available(&client, &admin, 11).await, before);

    // Already decided
    let response = client
        .put(format!(
            "{}/borrowing-requests/{}/update-status",
            BASE_URL, request_id
        ))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&json!({ "status": "Approved" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["message"], "Request is not in Waiting status");
}

#[tokio::test]
#[ignore]
async fn test_unavailable_book_is_reported() {
    let client = Client::new();
    let (_, reader) = new_reader(&client).await;

    // Seed book 4 has no copies left
    let response = client
        .post(format!("{}/borrowing-requests", BASE_URL))
        .header("Authorization", format!("Bearer {}", reader))
        .json(&json!({ "requestDetails": [{ "bookId": 4 }, { "bookId": 9999 }] }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(
        body["message"],
        "The following book IDs are invalid or unavailable: 4, 9999"
    );
}

#[tokio::test]
#[ignore]
async fn test_normal_user_cannot_update_status() {
    let client = Client::new();
    let (_, reader) = new_reader(&client).await;

    let response = client
        .put(format!("{}/borrowing-requests/1/update-status", BASE_URL))
        .header("Authorization", format!("Bearer {}", reader))
        .json(&json!({ "status": "Approved" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/borrowing-requests", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}
