use crate::domain_model::*;

/// Single-use refresh token ids, one live id per user.
///
/// Implementations must execute `validate_and_invalidate` as one atomic
/// read-compare-delete on the backing store. Two concurrent redemptions of
/// the same id yield exactly one `Ok`.
#[async_trait::async_trait]
pub trait RefreshTokenGuard: Send + Sync {
    /// Store `token_id` as the current id for `user_id`, replacing any previous one.
    /// A `ttl_secs` of zero is stored as one second.
    async fn issue(
        &self,
        user_id: UserId,
        token_id: &TokenId,
        ttl_secs: u64,
    ) -> Result<(), RefreshGuardError>;

    /// Consume `token_id` if and only if it is the current id for `user_id`.
    /// On mismatch or absence nothing is mutated.
    async fn validate_and_invalidate(
        &self,
        user_id: UserId,
        token_id: &TokenId,
    ) -> Result<(), RefreshGuardError>;

    /// Drop the current id for `user_id`. Idempotent.
    async fn revoke(&self, user_id: UserId) -> Result<(), RefreshGuardError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshGuardError {
    #[error("refresh token invalid or already used")]
    TokenReuseOrInvalid,
    #[error("session store unavailable: {0}")]
    InfrastructureUnavailable(String),
}
