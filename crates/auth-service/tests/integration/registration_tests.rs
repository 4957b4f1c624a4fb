//! E2E tests for account registration and the OAuth2 password grant.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use auth_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;

async fn register(
    server: &TestAuthServer,
    email: &str,
    password: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.auth_url("register"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await?)
}

async fn token(
    server: &TestAuthServer,
    email: &str,
    password: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.auth_url("token"))
        .form(&[
            ("grant_type", "password"),
            ("username", email),
            ("password", password),
        ])
        .send()
        .await?)
}

// ============================================================================
// Register Tests
// ============================================================================

#[tokio::test]
async fn test_register_creates_active_user() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;

    // Act
    let response = register(&server, TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["email"], TEST_EMAIL_ALICE);
    assert_eq!(body["role"], ROLE_USER);

    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    assert_eq!(body["id"], pair.subject.to_string());
    Ok(())
}

#[tokio::test]
async fn test_register_duplicate_email_conflict() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, Some(ROLE_ADMIN))
        .await?;

    let response = register(&server, TEST_EMAIL_ALICE, TEST_PASSWORD_NEW).await?;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "EMAIL_ALREADY_REGISTERED");

    // The existing account is untouched
    server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    Ok(())
}

// ============================================================================
// Token (OAuth2 password grant) Tests
// ============================================================================

#[tokio::test]
async fn test_token_form_returns_access_token() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let principal = server
        .seed_principal(TEST_EMAIL_BOB, TEST_PASSWORD, None)
        .await?;

    let response = token(&server, TEST_EMAIL_BOB, TEST_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["token_type"], "bearer");
    assert!(body.get("refresh_token").is_none());
    let access = body["access_token"].as_str().unwrap_or_default().to_string();
    access
        .assert_valid_jwt()
        .assert_kind("access")
        .assert_for_subject(&principal.id.to_string())
        .assert_expires_in(server.settings().access_token_ttl.as_secs());

    let me = server
        .client()
        .get(server.auth_url("me"))
        .bearer_auth(&access)
        .send()
        .await?;
    assert_eq!(me.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_token_form_wrong_password_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_BOB, TEST_PASSWORD, None)
        .await?;

    let response = token(&server, TEST_EMAIL_BOB, "not-the-password").await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILED");
    Ok(())
}
