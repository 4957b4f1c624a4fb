//! E2E tests for credential login.
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use auth_service::models::TokenKind;
use auth_service::services::session_registry::SessionRegistry;
use auth_test_utils::*;
use reqwest::StatusCode;
use serde_json::json;

async fn login_response(
    server: &TestAuthServer,
    email: &str,
    password: &str,
) -> Result<reqwest::Response, anyhow::Error> {
    Ok(server
        .client()
        .post(server.auth_url("login"))
        .json(&json!({ "email": email, "password": password }))
        .send()
        .await?)
}

#[tokio::test]
async fn test_login_happy_path_returns_token_pair() -> Result<(), anyhow::Error> {
    // Arrange
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal_with_id(TEST_USER_ALICE, TEST_EMAIL_ALICE, TEST_PASSWORD, Some(ROLE_USER))
        .await?;

    // Act
    let response = login_response(&server, TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["subject"], TEST_USER_ALICE.to_string());

    let access = body["access_token"].as_str().unwrap_or_default().to_string();
    let refresh = body["refresh_token"].as_str().unwrap_or_default().to_string();
    let subject = TEST_USER_ALICE.to_string();

    access
        .assert_valid_jwt()
        .assert_kind("access")
        .assert_for_subject(&subject)
        .assert_expires_in(server.settings().access_token_ttl.as_secs());
    refresh
        .assert_valid_jwt()
        .assert_kind("refresh")
        .assert_for_subject(&subject)
        .assert_expires_in(server.settings().refresh_token_ttl.as_secs());

    Ok(())
}

#[tokio::test]
async fn test_login_wrong_password_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;

    let response = login_response(&server, TEST_EMAIL_ALICE, "not-the-password").await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "AUTHENTICATION_FAILED");
    Ok(())
}

#[tokio::test]
async fn test_login_unknown_email_indistinguishable_from_wrong_password(
) -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;

    let unknown = login_response(&server, TEST_EMAIL_UNKNOWN, TEST_PASSWORD).await?;
    let wrong = login_response(&server, TEST_EMAIL_ALICE, "not-the-password").await?;

    assert_eq!(unknown.status(), wrong.status());
    let unknown_body: serde_json::Value = unknown.json().await?;
    let wrong_body: serde_json::Value = wrong.json().await?;
    assert_eq!(unknown_body, wrong_body);
    Ok(())
}

#[tokio::test]
async fn test_login_inactive_account_rejected() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal_with_id(TEST_USER_BOB, TEST_EMAIL_BOB, TEST_PASSWORD, Some(ROLE_ADMIN))
        .await?;
    server.directory().set_active(TEST_USER_BOB, false).await;

    let response = login_response(&server, TEST_EMAIL_BOB, TEST_PASSWORD).await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["error"]["code"], "ACCOUNT_INACTIVE");
    Ok(())
}

#[tokio::test]
async fn test_login_first_time_leaves_registry_untouched() -> Result<(), anyhow::Error> {
    let server = TestAuthServer::spawn().await?;
    server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;

    server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;
    server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    assert!(
        server.store().keys().await.is_empty(),
        "Untracked principals must not gain session sets on login"
    );
    Ok(())
}

#[tokio::test]
async fn test_login_after_password_change_registers_tokens() -> Result<(), anyhow::Error> {
    // Arrange: a password change creates the session sets
    let server = TestAuthServer::spawn().await?;
    let principal = server
        .seed_principal(TEST_EMAIL_ALICE, TEST_PASSWORD, None)
        .await?;
    let first = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD).await?;

    let response = server
        .client()
        .post(server.auth_url("change-password"))
        .bearer_auth(&first.access_token)
        .json(&json!({ "current": TEST_PASSWORD, "new": TEST_PASSWORD_NEW }))
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // Act
    let second = server.login(TEST_EMAIL_ALICE, TEST_PASSWORD_NEW).await?;

    // Assert: both new tokens are members of their sets
    let access_key = SessionRegistry::token_key(principal.id, TokenKind::Access);
    let refresh_key = SessionRegistry::token_key(principal.id, TokenKind::Refresh);
    let keys = server.store().keys().await;
    assert!(keys.contains(&access_key));
    assert!(keys.contains(&refresh_key));

    let me = server
        .client()
        .get(server.auth_url("me"))
        .bearer_auth(&second.access_token)
        .send()
        .await?;
    assert_eq!(me.status(), StatusCode::OK);
    Ok(())
}
