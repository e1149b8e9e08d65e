use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::OnceCell;

const DECOY_PASSWORD: &str = "easeread-decoy-password";

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    refresh_guard: Arc<dyn RefreshTokenGuard>,
    // Verified against when the email is unknown so that path costs one hash check too.
    decoy_hash: OnceCell<String>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        refresh_guard: Arc<dyn RefreshTokenGuard>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            token_codec,
            refresh_guard,
            decoy_hash: OnceCell::new(),
        }
    }

    async fn decoy_hash(&self) -> Result<&str, AuthError> {
        let hash = self
            .decoy_hash
            .get_or_try_init(|| self.credential_hasher.hash_password(DECOY_PASSWORD))
            .await?;
        Ok(hash.as_str())
    }

    fn ttl_secs(until: DateTime<Utc>) -> u64 {
        let now = Utc::now();
        let secs = (until - now).num_seconds();
        if secs <= 0 { 1 } else { secs as u64 }
    }

    /// Sign a fresh access/refresh pair and make its token id the user's only live one.
    async fn issue_tokens(&self, user_id: UserId) -> Result<AuthTokens, AuthError> {
        let jti = TokenId::generate();

        let (access_token, access_exp) = self.token_codec.issue_access_token(user_id).await?;
        let (refresh_token, refresh_exp) = self
            .token_codec
            .issue_refresh_token(user_id, &jti)
            .await?;

        self.refresh_guard
            .issue(user_id, &jti, Self::ttl_secs(refresh_exp))
            .await?;

        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn sign_up(&self, request: SignUpInput) -> Result<UserId, AuthError> {
        let SignUpInput {
            username,
            email,
            name,
            password,
        } = request;

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user_id = UserId::new_random();

        self.user_repo
            .create(NewUser {
                user_id,
                username,
                email,
                name,
                password_hash,
            })
            .await?;

        info!(%user_id, "user signed up");
        Ok(user_id)
    }

    async fn sign_in(&self, request: SignInInput) -> Result<LoginResult, AuthError> {
        let SignInInput { email, password } = request;

        let Some(rec) = self.user_repo.get_by_email(&email).await? else {
            let decoy = self.decoy_hash().await?;
            self.credential_hasher
                .verify_password(&password, decoy)
                .await?;
            return Err(AuthError::InvalidCredentials);
        };

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok || !rec.is_active {
            return Err(AuthError::InvalidCredentials);
        }

        // Record the login first: a failed write must not leave a live refresh id behind.
        self.user_repo
            .touch_last_login(rec.user_id, Utc::now())
            .await?;
        let tokens = self.issue_tokens(rec.user_id).await?;

        info!(user_id = %rec.user_id, "user signed in");
        Ok(LoginResult {
            user_id: rec.user_id,
            tokens,
        })
    }

    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        let verify_result = self
            .token_codec
            .verify_access_token(&AccessToken(token.to_string()))
            .await?;

        Ok(verify_result.user_id)
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<AuthTokens, AuthError> {
        let TokenVerifyResult { user_id, jti } = self
            .token_codec
            .verify_refresh_token(&RefreshToken(refresh_token.to_string()))
            .await?;

        // Rotation: the presented id is consumed here or the refresh is denied.
        if let Err(e) = self
            .refresh_guard
            .validate_and_invalidate(user_id, &jti)
            .await
        {
            if matches!(e, RefreshGuardError::TokenReuseOrInvalid) {
                warn!(%user_id, "refresh token rejected, possible replay");
            }
            return Err(e.into());
        }

        match self.user_repo.get_by_id(user_id).await? {
            Some(rec) if rec.is_active => {}
            _ => return Err(AuthError::UserNotFound),
        }

        let tokens = self.issue_tokens(user_id).await?;
        info!(%user_id, "refresh token rotated");
        Ok(tokens)
    }

    async fn sign_out(&self, user_id: UserId) -> Result<(), AuthError> {
        self.refresh_guard.revoke(user_id).await?;
        info!(%user_id, "user signed out");
        Ok(())
    }
}
