//! Principal directory: account lookup and password updates.

use crate::errors::AuthError;
use crate::models::{Principal, Role};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Source of truth for accounts. Emails are unique.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError>;

    /// Create an active account. Fails with `EmailAlreadyRegistered` if the
    /// email is taken.
    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Principal, AuthError>;

    /// Round-trip check used by the readiness probe.
    async fn ping(&self) -> Result<(), AuthError>;
}

/// Postgres-backed directory over the `users` and `roles` tables.
#[derive(Clone)]
pub struct PgPrincipalDirectory {
    pool: PgPool,
}

impl PgPrincipalDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalDirectory for PgPrincipalDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT
                u.id, u.email, u.hashed_password AS password_hash,
                u.is_active, r.name AS role
            FROM users u
            LEFT JOIN roles r ON r.id = u.role_id
            WHERE u.email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Database(format!("Failed to fetch user by email: {}", e)))?;

        Ok(principal)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT
                u.id, u.email, u.hashed_password AS password_hash,
                u.is_active, r.name AS role
            FROM users u
            LEFT JOIN roles r ON r.id = u.role_id
            WHERE u.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Database(format!("Failed to fetch user by id: {}", e)))?;

        Ok(principal)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET hashed_password = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Database(format!("Failed to update password: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::SubjectNotFound);
        }
        Ok(())
    }

    async fn create(
        &self,
        email: &str,
        password_hash: &str,
        role: Role,
    ) -> Result<Principal, AuthError> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            WITH inserted AS (
                INSERT INTO users (email, hashed_password, is_active, role_id)
                VALUES ($1, $2, TRUE, (SELECT id FROM roles WHERE name = $3))
                RETURNING id, email, hashed_password, is_active, role_id
            )
            SELECT
                i.id, i.email, i.hashed_password AS password_hash,
                i.is_active, r.name AS role
            FROM inserted i
            LEFT JOIN roles r ON r.id = i.role_id
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().as_deref() == Some("23505") {
                    return AuthError::EmailAlreadyRegistered;
                }
            }
            AuthError::Database(format!("Failed to create user: {}", e))
        })?;

        Ok(principal)
    }

    async fn ping(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Database(format!("Database ping failed: {}", e)))?;
        Ok(())
    }
}

/// In-memory directory for tests and local runs.
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, Default)]
    pub struct InMemoryDirectory {
        principals: Arc<Mutex<HashMap<Uuid, Principal>>>,
    }

    impl InMemoryDirectory {
        pub fn new() -> Self {
            Self::default()
        }

        /// Insert or replace a principal.
        pub async fn insert(&self, principal: Principal) {
            self.principals.lock().await.insert(principal.id, principal);
        }

        pub async fn get(&self, id: Uuid) -> Option<Principal> {
            self.principals.lock().await.get(&id).cloned()
        }

        pub async fn set_active(&self, id: Uuid, is_active: bool) {
            if let Some(p) = self.principals.lock().await.get_mut(&id) {
                p.is_active = is_active;
            }
        }

        pub async fn remove(&self, id: Uuid) {
            self.principals.lock().await.remove(&id);
        }
    }

    #[async_trait]
    impl PrincipalDirectory for InMemoryDirectory {
        async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AuthError> {
            Ok(self
                .principals
                .lock()
                .await
                .values()
                .find(|p| p.email == email)
                .cloned())
        }

        async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AuthError> {
            Ok(self.get(id).await)
        }

        async fn update_password_hash(
            &self,
            id: Uuid,
            password_hash: &str,
        ) -> Result<(), AuthError> {
            match self.principals.lock().await.get_mut(&id) {
                Some(p) => {
                    p.password_hash = password_hash.to_string();
                    Ok(())
                }
                None => Err(AuthError::SubjectNotFound),
            }
        }

        async fn create(
            &self,
            email: &str,
            password_hash: &str,
            role: Role,
        ) -> Result<Principal, AuthError> {
            let mut principals = self.principals.lock().await;
            if principals.values().any(|p| p.email == email) {
                return Err(AuthError::EmailAlreadyRegistered);
            }
            let principal = Principal {
                id: Uuid::new_v4(),
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                is_active: true,
                role: Some(role.as_str().to_string()),
            };
            principals.insert(principal.id, principal.clone());
            Ok(principal)
        }

        async fn ping(&self) -> Result<(), AuthError> {
            Ok(())
        }
    }
}
