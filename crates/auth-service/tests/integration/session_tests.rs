//! E2E tests for refresh, password change and bearer-authenticated access.
//!
//! ## Test Categories
//!
//! - **Refresh**: Access token reissue from a refresh token
//! - **Change Password**: Revocation of outstanding sessions
//! - **Bearer**: `GET /me` gate
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use auth_service::models::TokenKind;
use auth_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

async fn refresh(
    server: &TestAuthServer,
    refresh_token: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.auth_url("refresh-token"))
        .json(&json!({ "refresh_token": refresh_token }))
        .send()
        .await?)
}

async fn me(
    server: &TestAuthServer,
    access_token: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .get(server.auth_url("me"))
        .bearer_auth(access_token)
        .send()
        .await?)
}

async fn change_password(
    server: &TestAuthServer,
    access_token: &str,
    current: &str,
    new: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.auth_url("change-password"))
        .bearer_auth(access_token)
        .json(&json!({ "current": current, "new": new }))
        .send()
        .await?)
}

async fn assert_generic_forbidden(response: reqwest::Response) -> Result<(), anyhow::Error> {
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "FORBIDDEN");
    assert_eq!(body["error"]["message"], "Could not validate credentials");
    Ok(())
}

// ============================================================================
// Refresh Tests
// ============================================================================

#[tokio::test]
async fn test_refresh_happy_path_returns_new_access_token() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let principal = server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = refresh(&server, &pair.refresh_token).await?;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["token_type"], "bearer");
    let access = body["access_token"].as_str().unwrap_or_default().to_string();
    access
        .assert_valid_jwt()
        .assert_kind("access")
        .assert_for_subject(&principal.id.to_string())
        .assert_distinct_from(&pair.access_token);
    Ok(())
}

#[tokio::test]
async fn test_refresh_with_access_token_forbidden() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    assert_generic_forbidden(refresh(&server, &pair.access_token).await?).await
}

#[tokio::test]
async fn test_refresh_garbage_token_forbidden() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    assert_generic_forbidden(refresh(&server, "not.a.jwt").await?).await
}

#[tokio::test]
async fn test_refresh_expired_token_forbidden() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let principal = server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let expired = server
        .codec()
        .issue(principal.id, TokenKind::Refresh, Duration::ZERO)?;

    assert_generic_forbidden(refresh(&server, &expired).await?).await
}

#[tokio::test]
async fn test_refresh_inactive_subject_not_found() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let principal = server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    server.directory().set_active(principal.id, false).await;

    let response = refresh(&server, &pair.refresh_token).await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "SUBJECT_NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn test_refresh_store_unavailable_service_unavailable() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    server.store().set_unavailable(true).await;

    let response = refresh(&server, &pair.refresh_token).await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

// ============================================================================
// Change Password Tests
// ============================================================================

#[tokio::test]
async fn test_change_password_revokes_previous_tokens() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    let principal = server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let old = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    // Act
    let response =
        change_password(&server, &old.access_token, TEST_PASSWORD, TEST_PASSWORD_NEW).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["subject"], principal.id.to_string());
    let new_access = body["access_token"].as_str().unwrap_or_default().to_string();
    let new_refresh = body["refresh_token"].as_str().unwrap_or_default().to_string();

    assert_generic_forbidden(me(&server, &old.access_token).await?).await?;
    assert_generic_forbidden(refresh(&server, &old.refresh_token).await?).await?;

    assert_eq!(me(&server, &new_access).await?.status(), StatusCode::OK);
    assert_eq!(
        refresh(&server, &new_refresh).await?.status(),
        StatusCode::CREATED
    );

    // Only the new password works from now on
    assert!(server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await.is_err());
    server.login(TEST_EMAIL_ALICE, TEST_PASSWORD_NEW).await?;
    Ok(())
}

#[tokio::test]
async fn test_change_password_wrong_current_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response =
        change_password(&server, &pair.access_token, "wrong-current", TEST_PASSWORD_NEW).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILED");

    // Nothing changed: the old password and token still work
    assert!(server.store().keys().await.is_empty());
    assert_eq!(me(&server, &pair.access_token).await?.status(), StatusCode::OK);
    server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    Ok(())
}

#[tokio::test]
async fn test_change_password_same_password_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response =
        change_password(&server, &pair.access_token, TEST_PASSWORD, TEST_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "PASSWORD_UNCHANGED");
    Ok(())
}

#[tokio::test]
async fn test_change_password_without_token_forbidden() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;

    let response = server
        .client()
        .post(server.auth_url("change-password"))
        .json(&json!({ "current": TEST_PASSWORD, "new": TEST_PASSWORD_NEW }))
        .send()
        .await?;

    assert_generic_forbidden(response).await
}

// ============================================================================
// Bearer Tests
// ============================================================================

#[tokio::test]
async fn test_me_returns_principal() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let principal = server
        .seed_principal_with_id(
            TEST_USER_CHARLIE,
            TEST_EMAIL_CHARLIE,
            TEST_PASSWORD,
            Some(ROLE_MANAGER),
        )
        .await?;
    let pair = server.login(TEST_EMAIL_CHARLIE, TEST_PASSWORD).await?;

    let response = me(&server, &pair.access_token).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["id"], principal.id.to_string());
    assert_eq!(body["email"], TEST_EMAIL_CHARLIE);
    assert_eq!(body["role"], ROLE_MANAGER);
    Ok(())
}

#[tokio::test]
async fn test_me_with_refresh_token_forbidden() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    assert_generic_forbidden(me(&server, &pair.refresh_token).await?).await
}

#[tokio::test]
async fn test_me_inactive_principal_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    let principal = server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let pair = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    server.directory().set_active(principal.id, false).await;

    let response = me(&server, &pair.access_token).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "ACCOUNT_INACTIVE");
    Ok(())
}
