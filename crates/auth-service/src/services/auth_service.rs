//! Auth workflows: login, refresh, password change and OTP password reset.
//!
//! Composes the token codec, the session registry and the principal
//! directory. Within one request the registry is read and validated before
//! it is mutated. Nothing is locked across requests, and the directory and
//! the registry are separate systems, so a request cancelled midway is not
//! rolled back.

use crate::config::AuthSettings;
use crate::crypto::{self, codec::TokenCodec};
use crate::errors::AuthError;
use crate::models::{
    has_required_role, AccessTokenResponse, Principal, ResetTokenResponse, Role, SubjectResponse,
    TokenKind, TokenPair,
};
use crate::observability::metrics::{record_auth_operation, record_otp_delivery};
use crate::observability::{hash_for_correlation, ErrorCategory};
use crate::repositories::principals::PrincipalDirectory;
use crate::services::notification::NotificationSender;
use crate::services::session_registry::SessionRegistry;
use common::secret::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Role given to self-registered accounts.
pub const DEFAULT_ROLE: Role = Role::User;

#[derive(Clone)]
pub struct AuthService {
    directory: Arc<dyn PrincipalDirectory>,
    registry: SessionRegistry,
    codec: TokenCodec,
    notifier: Arc<dyn NotificationSender>,
    settings: AuthSettings,
}

impl AuthService {
    pub fn new(
        directory: Arc<dyn PrincipalDirectory>,
        registry: SessionRegistry,
        codec: TokenCodec,
        notifier: Arc<dyn NotificationSender>,
        settings: AuthSettings,
    ) -> Self {
        Self {
            directory,
            registry,
            codec,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &AuthSettings {
        &self.settings
    }

    pub fn directory(&self) -> &Arc<dyn PrincipalDirectory> {
        &self.directory
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Exchange credentials for an access + refresh pair.
    ///
    /// Tokens are registered only for kinds that already have a session set,
    /// so a principal that never changed their password holds untracked tokens.
    #[instrument(skip_all, fields(email_hash = %hash_for_correlation(email)))]
    pub async fn login(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<TokenPair, AuthError> {
        observed("login", async {
            let principal = self.check_credentials(email, password).await?;

            let access_token = self.issue(principal.id, TokenKind::Access)?;
            let refresh_token = self.issue(principal.id, TokenKind::Refresh)?;

            self.register_if_tracked(principal.id, TokenKind::Access, &access_token)
                .await?;
            self.register_if_tracked(principal.id, TokenKind::Refresh, &refresh_token)
                .await?;

            info!(target: "auth.service", "Login succeeded");
            Ok(TokenPair::bearer(principal.id, access_token, refresh_token))
        })
        .await
    }

    /// OAuth2 password grant: exchange credentials for an access token only.
    ///
    /// Registration follows the same rule as `login`.
    #[instrument(skip_all, fields(email_hash = %hash_for_correlation(email)))]
    pub async fn issue_access_token(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<AccessTokenResponse, AuthError> {
        observed("token", async {
            let principal = self.check_credentials(email, password).await?;

            let access_token = self.issue(principal.id, TokenKind::Access)?;
            self.register_if_tracked(principal.id, TokenKind::Access, &access_token)
                .await?;

            Ok(AccessTokenResponse {
                access_token,
                token_type: "bearer".to_string(),
            })
        })
        .await
    }

    /// Create an active account with the default role.
    ///
    /// No tokens are issued; the new principal logs in separately.
    #[instrument(skip_all, fields(email_hash = %hash_for_correlation(email)))]
    pub async fn register(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, AuthError> {
        observed("register", async {
            if self.directory.find_by_email(email).await?.is_some() {
                return Err(AuthError::EmailAlreadyRegistered);
            }

            let password_hash = crypto::hash_password(password, self.settings.bcrypt_cost)?;
            let principal = self
                .directory
                .create(email, &password_hash, DEFAULT_ROLE)
                .await?;

            info!(target: "auth.service", subject = %principal.id, "Account registered");
            Ok(principal)
        })
        .await
    }

    /// Issue a new access token from a refresh token. The refresh token is
    /// not rotated.
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> Result<AccessTokenResponse, AuthError> {
        observed("refresh", async {
            let verified = self.codec.verify(refresh_token)?;
            expect_kind(TokenKind::Refresh, verified.kind)?;

            if !self
                .registry
                .is_usable(verified.subject, TokenKind::Refresh, refresh_token)
                .await?
            {
                return Err(AuthError::TokenRevoked);
            }

            let principal = self
                .directory
                .find_by_id(verified.subject)
                .await?
                .filter(|p| p.is_active)
                .ok_or(AuthError::SubjectNotFound)?;

            let access_token = self.issue(principal.id, TokenKind::Access)?;
            self.register_if_tracked(principal.id, TokenKind::Access, &access_token)
                .await?;

            Ok(AccessTokenResponse {
                access_token,
                token_type: "bearer".to_string(),
            })
        })
        .await
    }

    /// Change the password of an authenticated principal.
    ///
    /// Every access and refresh token issued so far stops working, and a
    /// fresh registered pair is returned.
    #[instrument(skip_all, fields(subject = %principal.id))]
    pub async fn change_password(
        &self,
        principal: &Principal,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<TokenPair, AuthError> {
        observed("change_password", async {
            if !crypto::verify_password(current_password, &principal.password_hash)? {
                return Err(AuthError::AuthenticationFailed);
            }
            if current_password.expose_secret() == new_password.expose_secret() {
                return Err(AuthError::PasswordUnchanged);
            }

            let password_hash = crypto::hash_password(new_password, self.settings.bcrypt_cost)?;
            self.directory
                .update_password_hash(principal.id, &password_hash)
                .await?;

            self.registry.revoke_all(principal.id, TokenKind::Access).await?;
            self.registry.revoke_all(principal.id, TokenKind::Refresh).await?;

            let access_token = self.issue(principal.id, TokenKind::Access)?;
            let refresh_token = self.issue(principal.id, TokenKind::Refresh)?;
            self.registry
                .add_token(
                    principal.id,
                    TokenKind::Access,
                    &access_token,
                    self.settings.access_token_ttl,
                )
                .await?;
            self.registry
                .add_token(
                    principal.id,
                    TokenKind::Refresh,
                    &refresh_token,
                    self.settings.refresh_token_ttl,
                )
                .await?;

            info!(target: "auth.service", "Password changed, sessions revoked");
            Ok(TokenPair::bearer(principal.id, access_token, refresh_token))
        })
        .await
    }

    /// Issue a one-time code and hand it to the notification sender.
    ///
    /// Codes from earlier requests are discarded first. Delivery runs on its
    /// own task, so the request returns as soon as the code is stored. A
    /// delivery failure is logged and counted there.
    #[instrument(skip_all, fields(email_hash = %hash_for_correlation(email)))]
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        observed("forgot_password", async {
            let principal = self
                .directory
                .find_by_email(email)
                .await?
                .ok_or(AuthError::EmailNotFound)?;

            let otp = crypto::generate_otp(self.settings.otp_length)?;

            self.registry.revoke_otps(principal.id).await?;
            self.registry
                .add_otp(principal.id, otp.expose_secret(), self.settings.otp_ttl)
                .await?;

            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                match notifier.send_otp(&principal.email, &otp).await {
                    Ok(()) => record_otp_delivery("success"),
                    Err(e) => {
                        warn!(target: "auth.service", error = %e, "OTP delivery failed");
                        record_otp_delivery("error");
                    }
                }
            });

            Ok::<(), AuthError>(())
        })
        .await
    }

    /// Trade a valid one-time code for a reset token.
    ///
    /// On success every outstanding code and every earlier reset token for
    /// the principal is discarded. A wrong code leaves the codes untouched.
    #[instrument(skip_all, fields(email_hash = %hash_for_correlation(email)))]
    pub async fn verify_otp(
        &self,
        email: &str,
        code: &SecretString,
    ) -> Result<ResetTokenResponse, AuthError> {
        observed("verify_otp", async {
            let principal = self
                .directory
                .find_by_email(email)
                .await?
                .ok_or(AuthError::EmailNotFound)?;

            let valid = self.registry.valid_otps(principal.id).await?;
            if !valid.contains(code.expose_secret()) {
                return Err(AuthError::InvalidOtp);
            }

            self.registry.revoke_otps(principal.id).await?;
            self.registry.revoke_all(principal.id, TokenKind::Reset).await?;

            let reset_token = self.issue(principal.id, TokenKind::Reset)?;
            self.registry
                .add_token(
                    principal.id,
                    TokenKind::Reset,
                    &reset_token,
                    self.settings.reset_token_ttl,
                )
                .await?;

            debug!(target: "auth.service", "OTP accepted, reset token issued");
            Ok(ResetTokenResponse { reset_token })
        })
        .await
    }

    /// Set a new password using a reset token.
    ///
    /// Reset tokens must be registered. After a successful reset the token
    /// (and any sibling reset token) is revoked so it cannot be replayed.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &SecretString,
    ) -> Result<SubjectResponse, AuthError> {
        observed("reset_password", async {
            let verified = self.codec.verify(reset_token)?;
            expect_kind(TokenKind::Reset, verified.kind)?;

            let registered = self
                .registry
                .valid_tokens(verified.subject, TokenKind::Reset)
                .await?;
            if !registered.contains(reset_token) {
                return Err(AuthError::TokenRevoked);
            }

            let principal = self
                .directory
                .find_by_id(verified.subject)
                .await?
                .filter(|p| p.is_active)
                .ok_or(AuthError::SubjectNotFound)?;

            let password_hash = crypto::hash_password(new_password, self.settings.bcrypt_cost)?;
            self.directory
                .update_password_hash(principal.id, &password_hash)
                .await?;
            self.registry.revoke_all(principal.id, TokenKind::Reset).await?;

            info!(target: "auth.service", "Password reset completed");
            Ok(SubjectResponse {
                subject: principal.id,
            })
        })
        .await
    }

    /// Resolve the principal behind an access token and check its role.
    ///
    /// An empty `required_roles` admits any active principal.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        access_token: &str,
        required_roles: &[Role],
    ) -> Result<Principal, AuthError> {
        observed("authenticate", async {
            let verified = self.codec.verify(access_token)?;
            expect_kind(TokenKind::Access, verified.kind)?;

            if !self
                .registry
                .is_usable(verified.subject, TokenKind::Access, access_token)
                .await?
            {
                return Err(AuthError::TokenRevoked);
            }

            let principal = self
                .directory
                .find_by_id(verified.subject)
                .await?
                .ok_or(AuthError::SubjectNotFound)?;

            if !principal.is_active {
                return Err(AuthError::AccountInactive);
            }
            if !has_required_role(required_roles, principal.role()) {
                return Err(AuthError::InsufficientRole);
            }

            Ok(principal)
        })
        .await
    }

    /// Look up an account by credentials. Unknown emails and wrong passwords
    /// fail identically, and an unknown email still costs one bcrypt check.
    async fn check_credentials(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Principal, AuthError> {
        let principal = match self.directory.find_by_email(email).await? {
            Some(p) => p,
            None => {
                crypto::verify_dummy_password(password);
                return Err(AuthError::AuthenticationFailed);
            }
        };

        if !crypto::verify_password(password, &principal.password_hash)? {
            return Err(AuthError::AuthenticationFailed);
        }
        if !principal.is_active {
            return Err(AuthError::AccountInactive);
        }
        Ok(principal)
    }

    fn ttl_for(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.settings.access_token_ttl,
            TokenKind::Refresh => self.settings.refresh_token_ttl,
            TokenKind::Reset => self.settings.reset_token_ttl,
        }
    }

    fn issue(&self, subject: Uuid, kind: TokenKind) -> Result<String, AuthError> {
        Ok(self.codec.issue(subject, kind, self.ttl_for(kind))?)
    }

    async fn register_if_tracked(
        &self,
        subject: Uuid,
        kind: TokenKind,
        token: &str,
    ) -> Result<(), AuthError> {
        if self.registry.valid_tokens(subject, kind).await?.is_empty() {
            return Ok(());
        }
        self.registry
            .add_token(subject, kind, token, self.ttl_for(kind))
            .await?;
        Ok(())
    }
}

fn expect_kind(expected: TokenKind, actual: TokenKind) -> Result<(), AuthError> {
    if expected != actual {
        return Err(AuthError::WrongTokenKind { expected, actual });
    }
    Ok(())
}

/// Run a workflow and record its duration and outcome.
async fn observed<T, F>(operation: &'static str, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    let start = Instant::now();
    let result = fut.await;
    match &result {
        Ok(_) => record_auth_operation(operation, "success", None, start.elapsed()),
        Err(e) => {
            debug!(target: "auth.service", operation, error = %e, "Operation failed");
            record_auth_operation(
                operation,
                "error",
                Some(ErrorCategory::from(e).as_str()),
                start.elapsed(),
            );
        }
    }
    result
}
