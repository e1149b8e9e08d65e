use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::anyhow;
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

/// Owns every long-lived connection and hands out the wired services.
pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pool: Option<Pool<MySql>>,
    ephemeral: bool,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let refresh_guard: Arc<dyn RefreshTokenGuard> = match settings.session.backend.as_str() {
            "memory" => Arc::new(MemoryRefreshTokenGuard::new()),
            "redis" => {
                let url = settings
                    .session
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("session.redis_url is required for the redis backend"))?;
                let redis_client = redis::Client::open(url)?;
                let mut redis_manager = redis_client.get_connection_manager().await?;
                let pong: String = redis::cmd("PING").query_async(&mut redis_manager).await?;
                debug!(%pong, "redis reachable");

                let prefix = settings
                    .session
                    .key_prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_string());
                Arc::new(RedisRefreshTokenGuard::new(redis_manager, prefix))
            }
            other => return Err(anyhow!("Unknown session backend: {}", other)),
        };

        let mut pool = None;
        let user_repo: Arc<dyn UserRepo> = match settings.user.backend.as_str() {
            "memory" => Arc::new(MemoryUserRepo::new()),
            "mysql" => {
                let url = settings
                    .user
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow!("user.database_url is required for the mysql backend"))?;
                let mysql = Pool::<MySql>::connect(url).await?;
                pool = Some(mysql.clone());
                Arc::new(MySqlUserRepo::new(mysql))
            }
            other => return Err(anyhow!("Unknown user backend: {}", other)),
        };

        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.jwt.issuer.clone(),
            audience: settings.jwt.audience.clone(),
            access_ttl: Duration::from_secs(settings.jwt.access_ttl_secs),
            refresh_ttl: Duration::from_secs(settings.jwt.refresh_ttl_secs),
            signing_key: settings.jwt.signing_key.clone().into_bytes(),
        }));

        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            token_codec,
            refresh_guard,
        ));

        info!(
            session = %settings.session.backend,
            user = %settings.user.backend,
            "server started"
        );

        let ephemeral = settings.session.backend == "memory" || settings.user.backend == "memory";
        Ok(Self {
            auth_service,
            pool,
            ephemeral,
        })
    }

    /// True when some state lives only in this process.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
