/// Fires concurrent redemptions of one refresh token id against a live Redis
/// and reports how many of them won. Exactly one should, every round.
///
/// $ REDIS_URL=redis://127.0.0.1:6379 cargo run --bin rotation_demo -- 20 8
use easeread_auth::domain_model::*;
use easeread_auth::domain_port::*;
use easeread_auth::infra_redis::*;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::new("rotation_demo=debug,easeread_auth=info");

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let rounds: usize = args.next().map(|s| s.parse::<usize>()).transpose()?.unwrap_or(10);
    let racers: usize = args.next().map(|s| s.parse::<usize>()).transpose()?.unwrap_or(4);

    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let redis_client = redis::Client::open(url.as_str())?;
    let redis_manager = redis_client.get_connection_manager().await?;

    let guard = Arc::new(RedisRefreshTokenGuard::new(
        redis_manager,
        "refresh-session-demo",
    ));

    let mut anomalies = 0;
    for round in 0..rounds {
        let user = UserId::new_random();
        let token = TokenId::generate();
        guard.issue(user, &token, 30).await?;

        let attempts = (0..racers).map(|_| {
            let guard = guard.clone();
            let token = token.clone();
            tokio::spawn(async move { guard.validate_and_invalidate(user, &token).await })
        });

        let mut wins = 0;
        for joined in join_all(attempts).await {
            match joined? {
                Ok(()) => wins += 1,
                Err(RefreshGuardError::TokenReuseOrInvalid) => {}
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(round, racers, wins, "round finished");
        if wins != 1 {
            anomalies += 1;
        }
    }

    println!("{} rounds, {} anomalies", rounds, anomalies);
    Ok(())
}
