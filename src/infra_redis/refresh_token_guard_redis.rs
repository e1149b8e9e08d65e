use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisError, RedisWrite, Script, ToRedisArgs};

const REFRESH_VALIDATE: &str = include_str!("refresh_validate.lua");

pub const DEFAULT_KEY_PREFIX: &str = "refresh-session";

/// Refresh guard backed by a shared Redis instance.
///
/// One string key per user holds the current token id, expiring with the refresh
/// token. Validation runs server side as a Lua script, so the compare and the
/// delete cannot interleave with another caller, whichever process it runs in.
pub struct RedisRefreshTokenGuard {
    conn: ConnectionManager,
    prefix: String,
    validate: Script,
}

impl RedisRefreshTokenGuard {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRefreshTokenGuard {
            conn,
            prefix: prefix.into(),
            validate: Script::new(REFRESH_VALIDATE),
        }
    }

    fn key(&self, user_id: UserId) -> String {
        format!("{}:{}", self.prefix, user_id)
    }
}

impl ToRedisArgs for TokenId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.as_str().as_bytes())
    }
}

fn unavailable(e: RedisError) -> RefreshGuardError {
    RefreshGuardError::InfrastructureUnavailable(e.to_string())
}

#[async_trait::async_trait]
impl RefreshTokenGuard for RedisRefreshTokenGuard {
    async fn issue(
        &self,
        user_id: UserId,
        token_id: &TokenId,
        ttl_secs: u64,
    ) -> Result<(), RefreshGuardError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, token_id, ttl_secs.max(1))
            .await
            .map_err(unavailable)?;
        debug!(%user_id, ttl_secs, "refresh token id issued");
        Ok(())
    }

    async fn validate_and_invalidate(
        &self,
        user_id: UserId,
        token_id: &TokenId,
    ) -> Result<(), RefreshGuardError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let deleted: i64 = self
            .validate
            .key(&key)
            .arg(token_id)
            .invoke_async(&mut conn)
            .await
            .map_err(unavailable)?;

        match deleted {
            1 => Ok(()),
            _ => {
                debug!(%user_id, "refresh token id mismatch");
                Err(RefreshGuardError::TokenReuseOrInvalid)
            }
        }
    }

    async fn revoke(&self, user_id: UserId) -> Result<(), RefreshGuardError> {
        let key = self.key(user_id);
        let mut conn = self.conn.clone();
        let _: () = conn.del(&key).await.map_err(unavailable)?;
        debug!(%user_id, "refresh token id revoked");
        Ok(())
    }
}

